//! Network settings
//!
//! Fee wallet and network fee shared by every converter.

use amm_core::constants::PPM_RESOLUTION;
use amm_core::{Address, Error, NetworkConfig, Ownable, Result, Updated};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    ownership: Ownable,
    network_fee_wallet: Address,
    /// Share of conversion fees kept by the network, in PPM
    network_fee: u32,
    max_conversion_fee: u32,
}

impl NetworkSettings {
    pub fn new(owner: Address, network_fee_wallet: Address, network_fee: u32) -> Result<Self> {
        validate_wallet(&network_fee_wallet)?;
        validate_fee(network_fee)?;
        Ok(Self {
            ownership: Ownable::new(owner),
            network_fee_wallet,
            network_fee,
            max_conversion_fee: NetworkConfig::default().max_conversion_fee,
        })
    }

    pub fn from_config(owner: Address, config: &NetworkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ownership: Ownable::new(owner),
            network_fee_wallet: config.network_fee_wallet.clone(),
            network_fee: config.network_fee,
            max_conversion_fee: config.max_conversion_fee,
        })
    }

    pub fn ownership(&self) -> &Ownable {
        &self.ownership
    }

    pub fn ownership_mut(&mut self) -> &mut Ownable {
        &mut self.ownership
    }

    pub fn network_fee_wallet(&self) -> &Address {
        &self.network_fee_wallet
    }

    pub fn network_fee(&self) -> u32 {
        self.network_fee
    }

    /// Wallet and fee in one read
    pub fn network_fee_params(&self) -> (&Address, u32) {
        (&self.network_fee_wallet, self.network_fee)
    }

    pub fn max_conversion_fee(&self) -> u32 {
        self.max_conversion_fee
    }

    pub fn set_network_fee_wallet(
        &mut self,
        caller: &Address,
        wallet: Address,
    ) -> Result<Updated<Address>> {
        self.ownership.ensure_owner(caller)?;
        validate_wallet(&wallet)?;
        let previous = std::mem::replace(&mut self.network_fee_wallet, wallet.clone());
        tracing::info!(previous = %previous, current = %wallet, "Network fee wallet updated");
        Ok(Updated::new(previous, wallet))
    }

    pub fn set_network_fee(&mut self, caller: &Address, fee: u32) -> Result<Updated<u32>> {
        self.ownership.ensure_owner(caller)?;
        validate_fee(fee)?;
        let previous = std::mem::replace(&mut self.network_fee, fee);
        tracing::info!(previous, current = fee, "Network fee updated");
        Ok(Updated::new(previous, fee))
    }
}

fn validate_wallet(wallet: &Address) -> Result<()> {
    if wallet.is_zero() {
        return Err(Error::InvalidAddress {
            address: wallet.clone(),
        });
    }
    Ok(())
}

fn validate_fee(fee: u32) -> Result<()> {
    if fee > PPM_RESOLUTION {
        return Err(Error::InvalidFee { fee });
    }
    Ok(())
}
