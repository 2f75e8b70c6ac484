//! Protection settings
//!
//! Owner-managed parameters of the protection engine: the pool whitelist,
//! per-reserve deposit switches, network token minting limits, protection
//! delays and the rate deviation guard.

use std::collections::{HashMap, HashSet};

use amm_core::constants::PPM_RESOLUTION;
use amm_core::{Address, Error, Ownable, ProtectionConfig, Result, TokenId, Updated};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionSettings {
    ownership: Ownable,
    network_token: TokenId,
    /// Whitelisted pool anchors in insertion order
    pool_whitelist: Vec<TokenId>,
    add_liquidity_disabled: HashSet<(TokenId, TokenId)>,
    min_protection_delay: u64,
    max_protection_delay: u64,
    lock_duration: u64,
    min_network_token_liquidity_for_minting: BigUint,
    default_network_token_minting_limit: BigUint,
    network_token_minting_limits: HashMap<TokenId, BigUint>,
    /// In PPM
    average_rate_max_deviation: u32,
    min_network_compensation: BigUint,
}

impl ProtectionSettings {
    pub fn new(owner: Address, network_token: TokenId) -> Self {
        let config = ProtectionConfig::default();
        Self {
            ownership: Ownable::new(owner),
            network_token,
            pool_whitelist: Vec::new(),
            add_liquidity_disabled: HashSet::new(),
            min_protection_delay: config.min_protection_delay,
            max_protection_delay: config.max_protection_delay,
            lock_duration: config.lock_duration,
            min_network_token_liquidity_for_minting: BigUint::from(
                config.min_network_token_liquidity_for_minting,
            ),
            default_network_token_minting_limit: BigUint::from(
                config.default_network_token_minting_limit,
            ),
            network_token_minting_limits: HashMap::new(),
            average_rate_max_deviation: config.average_rate_max_deviation,
            min_network_compensation: BigUint::from(config.min_network_compensation),
        }
    }

    pub fn from_config(
        owner: Address,
        network_token: TokenId,
        config: &ProtectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            min_protection_delay: config.min_protection_delay,
            max_protection_delay: config.max_protection_delay,
            lock_duration: config.lock_duration,
            min_network_token_liquidity_for_minting: BigUint::from(
                config.min_network_token_liquidity_for_minting,
            ),
            default_network_token_minting_limit: BigUint::from(
                config.default_network_token_minting_limit,
            ),
            average_rate_max_deviation: config.average_rate_max_deviation,
            min_network_compensation: BigUint::from(config.min_network_compensation),
            ..Self::new(owner, network_token)
        })
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn ownership(&self) -> &Ownable {
        &self.ownership
    }

    pub fn ownership_mut(&mut self) -> &mut Ownable {
        &mut self.ownership
    }

    pub fn network_token(&self) -> &TokenId {
        &self.network_token
    }

    pub fn pool_whitelist(&self) -> &[TokenId] {
        &self.pool_whitelist
    }

    pub fn is_pool_whitelisted(&self, pool: &TokenId) -> bool {
        self.pool_whitelist.contains(pool)
    }

    pub fn add_liquidity_disabled(&self, pool: &TokenId, reserve: &TokenId) -> bool {
        self.add_liquidity_disabled
            .contains(&(pool.clone(), reserve.clone()))
    }

    pub fn min_protection_delay(&self) -> u64 {
        self.min_protection_delay
    }

    pub fn max_protection_delay(&self) -> u64 {
        self.max_protection_delay
    }

    pub fn lock_duration(&self) -> u64 {
        self.lock_duration
    }

    pub fn min_network_token_liquidity_for_minting(&self) -> &BigUint {
        &self.min_network_token_liquidity_for_minting
    }

    pub fn default_network_token_minting_limit(&self) -> &BigUint {
        &self.default_network_token_minting_limit
    }

    /// Minting limit of `pool`; an unset or zero limit falls back to the default
    pub fn network_token_minting_limit(&self, pool: &TokenId) -> &BigUint {
        match self.network_token_minting_limits.get(pool) {
            Some(limit) if !limit.is_zero() => limit,
            _ => &self.default_network_token_minting_limit,
        }
    }

    pub fn average_rate_max_deviation(&self) -> u32 {
        self.average_rate_max_deviation
    }

    pub fn min_network_compensation(&self) -> &BigUint {
        &self.min_network_compensation
    }

    // ---------------------------------------------------------------------
    // Whitelist
    // ---------------------------------------------------------------------

    pub fn add_pool_to_whitelist(&mut self, caller: &Address, pool: TokenId) -> Result<()> {
        self.ownership.ensure_owner(caller)?;
        if self.is_pool_whitelisted(&pool) {
            return Err(Error::AlreadyWhitelisted { pool });
        }
        info!(pool = %pool, "Pool whitelisted");
        self.pool_whitelist.push(pool);
        Ok(())
    }

    pub fn remove_pool_from_whitelist(&mut self, caller: &Address, pool: &TokenId) -> Result<()> {
        self.ownership.ensure_owner(caller)?;
        let index = self
            .pool_whitelist
            .iter()
            .position(|p| p == pool)
            .ok_or_else(|| Error::NotWhitelisted { pool: pool.clone() })?;
        self.pool_whitelist.remove(index);
        info!(pool = %pool, "Pool removed from whitelist");
        Ok(())
    }

    /// Block or allow new deposits of `reserve` into `pool`
    pub fn disable_add_liquidity(
        &mut self,
        caller: &Address,
        pool: &TokenId,
        reserve: &TokenId,
        disable: bool,
    ) -> Result<Updated<bool>> {
        self.ownership.ensure_owner(caller)?;
        let key = (pool.clone(), reserve.clone());
        let previous = if disable {
            !self.add_liquidity_disabled.insert(key)
        } else {
            self.add_liquidity_disabled.remove(&key)
        };
        info!(pool = %pool, reserve = %reserve, disabled = disable, "Add liquidity switch updated");
        Ok(Updated::new(previous, disable))
    }

    // ---------------------------------------------------------------------
    // Limits and parameters
    // ---------------------------------------------------------------------

    pub fn set_min_network_token_liquidity_for_minting(
        &mut self,
        caller: &Address,
        amount: BigUint,
    ) -> Result<Updated<BigUint>> {
        self.ownership.ensure_owner(caller)?;
        let previous = std::mem::replace(
            &mut self.min_network_token_liquidity_for_minting,
            amount.clone(),
        );
        info!(previous = %previous, current = %amount, "Min network token liquidity for minting updated");
        Ok(Updated::new(previous, amount))
    }

    pub fn set_default_network_token_minting_limit(
        &mut self,
        caller: &Address,
        limit: BigUint,
    ) -> Result<Updated<BigUint>> {
        self.ownership.ensure_owner(caller)?;
        let previous =
            std::mem::replace(&mut self.default_network_token_minting_limit, limit.clone());
        info!(previous = %previous, current = %limit, "Default network token minting limit updated");
        Ok(Updated::new(previous, limit))
    }

    pub fn set_network_token_minting_limit(
        &mut self,
        caller: &Address,
        pool: &TokenId,
        limit: BigUint,
    ) -> Result<Updated<BigUint>> {
        self.ownership.ensure_owner(caller)?;
        let previous = self
            .network_token_minting_limits
            .insert(pool.clone(), limit.clone())
            .unwrap_or_default();
        info!(pool = %pool, previous = %previous, current = %limit, "Network token minting limit updated");
        Ok(Updated::new(previous, limit))
    }

    pub fn set_protection_delays(
        &mut self,
        caller: &Address,
        min: u64,
        max: u64,
    ) -> Result<Updated<(u64, u64)>> {
        self.ownership.ensure_owner(caller)?;
        if min >= max {
            return Err(Error::InvalidProtectionDelays { min, max });
        }
        let previous = (self.min_protection_delay, self.max_protection_delay);
        self.min_protection_delay = min;
        self.max_protection_delay = max;
        info!(min, max, "Protection delays updated");
        Ok(Updated::new(previous, (min, max)))
    }

    pub fn set_lock_duration(&mut self, caller: &Address, duration: u64) -> Result<Updated<u64>> {
        self.ownership.ensure_owner(caller)?;
        let previous = std::mem::replace(&mut self.lock_duration, duration);
        info!(previous, current = duration, "Lock duration updated");
        Ok(Updated::new(previous, duration))
    }

    pub fn set_average_rate_max_deviation(
        &mut self,
        caller: &Address,
        deviation: u32,
    ) -> Result<Updated<u32>> {
        self.ownership.ensure_owner(caller)?;
        if deviation == 0 || deviation > PPM_RESOLUTION {
            return Err(Error::InvalidPortion);
        }
        let previous = std::mem::replace(&mut self.average_rate_max_deviation, deviation);
        info!(previous, current = deviation, "Average rate max deviation updated");
        Ok(Updated::new(previous, deviation))
    }

    pub fn set_min_network_compensation(
        &mut self,
        caller: &Address,
        amount: BigUint,
    ) -> Result<Updated<BigUint>> {
        self.ownership.ensure_owner(caller)?;
        let previous = std::mem::replace(&mut self.min_network_compensation, amount.clone());
        info!(previous = %previous, current = %amount, "Min network compensation updated");
        Ok(Updated::new(previous, amount))
    }
}
