//! Configuration types for the pool converter and liquidity protection engine

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::constants::{PPM_RESOLUTION, SECONDS_PER_DAY};
use crate::{Address, Error, Result};

/// Liquidity protection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Seconds before any impermanent loss is compensated
    #[serde(default = "default_min_protection_delay")]
    pub min_protection_delay: u64,

    /// Seconds until impermanent loss is fully compensated
    #[serde(default = "default_max_protection_delay")]
    pub max_protection_delay: u64,

    /// Seconds network token compensation stays locked
    #[serde(default = "default_lock_duration")]
    pub lock_duration: u64,

    /// Network token reserve required before base deposits can mint against it
    #[serde(default = "default_min_network_token_liquidity_for_minting")]
    pub min_network_token_liquidity_for_minting: u128,

    /// Minting limit applied to pools without an explicit limit
    #[serde(default)]
    pub default_network_token_minting_limit: u128,

    /// Network compensation below this amount is not paid out
    #[serde(default = "default_min_network_compensation")]
    pub min_network_compensation: u128,

    /// Max deviation of the average rate from the spot rate, in PPM
    #[serde(default = "default_average_rate_max_deviation")]
    pub average_rate_max_deviation: u32,
}

fn default_min_protection_delay() -> u64 {
    30 * SECONDS_PER_DAY
}

fn default_max_protection_delay() -> u64 {
    100 * SECONDS_PER_DAY
}

fn default_lock_duration() -> u64 {
    SECONDS_PER_DAY
}

fn default_min_network_token_liquidity_for_minting() -> u128 {
    1_000 * 10u128.pow(18)
}

fn default_min_network_compensation() -> u128 {
    10u128.pow(16)
}

fn default_average_rate_max_deviation() -> u32 {
    5_000
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            min_protection_delay: default_min_protection_delay(),
            max_protection_delay: default_max_protection_delay(),
            lock_duration: default_lock_duration(),
            min_network_token_liquidity_for_minting:
                default_min_network_token_liquidity_for_minting(),
            default_network_token_minting_limit: 0,
            min_network_compensation: default_min_network_compensation(),
            average_rate_max_deviation: default_average_rate_max_deviation(),
        }
    }
}

impl ProtectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_protection_delay >= self.max_protection_delay {
            return Err(Error::InvalidProtectionDelays {
                min: self.min_protection_delay,
                max: self.max_protection_delay,
            });
        }
        if self.average_rate_max_deviation == 0
            || self.average_rate_max_deviation > PPM_RESOLUTION
        {
            return Err(Error::InvalidPortion);
        }
        Ok(())
    }
}

/// Network fee parameters shared by every converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Wallet receiving settled network fees
    pub network_fee_wallet: Address,

    /// Share of the conversion fee kept by the network, in PPM
    #[serde(default)]
    pub network_fee: u32,

    /// Upper bound for a converter's conversion fee, in PPM
    #[serde(default = "default_max_conversion_fee")]
    pub max_conversion_fee: u32,
}

fn default_max_conversion_fee() -> u32 {
    30_000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_fee_wallet: Address::from_bytes(&[0xfe; 20]),
            network_fee: 0,
            max_conversion_fee: default_max_conversion_fee(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.network_fee_wallet.is_zero() {
            return Err(Error::InvalidAddress {
                address: self.network_fee_wallet.clone(),
            });
        }
        if self.network_fee > PPM_RESOLUTION {
            return Err(Error::InvalidFee {
                fee: self.network_fee,
            });
        }
        if self.max_conversion_fee > PPM_RESOLUTION {
            return Err(Error::InvalidConversionFee {
                fee: self.max_conversion_fee,
            });
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub protection: ProtectionConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.protection.validate()?;
        self.network.validate()
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = AppConfig::from_json(&raw)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}
