//! System store
//!
//! Pool tokens owned by the protocol itself, and network tokens minted into
//! each pool. Writes are restricted to the owner.

use std::collections::HashMap;

use amm_core::{checked_sub, Address, Ownable, Result, TokenId, Updated};
use num_bigint::BigUint;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStore {
    ownership: Ownable,
    system_balances: HashMap<TokenId, BigUint>,
    network_tokens_minted: HashMap<TokenId, BigUint>,
}

impl SystemStore {
    pub fn new(owner: Address) -> Self {
        Self {
            ownership: Ownable::new(owner),
            system_balances: HashMap::new(),
            network_tokens_minted: HashMap::new(),
        }
    }

    pub fn ownership(&self) -> &Ownable {
        &self.ownership
    }

    pub fn system_balance(&self, pool_token: &TokenId) -> BigUint {
        self.system_balances
            .get(pool_token)
            .cloned()
            .unwrap_or_default()
    }

    pub fn network_tokens_minted(&self, pool: &TokenId) -> BigUint {
        self.network_tokens_minted
            .get(pool)
            .cloned()
            .unwrap_or_default()
    }

    pub fn inc_system_balance(
        &mut self,
        caller: &Address,
        pool_token: &TokenId,
        amount: &BigUint,
    ) -> Result<Updated<BigUint>> {
        self.ownership.ensure_owner(caller)?;
        let previous = self.system_balance(pool_token);
        let current = &previous + amount;
        self.system_balances.insert(pool_token.clone(), current.clone());
        debug!(pool_token = %pool_token, previous = %previous, current = %current, "System balance updated");
        Ok(Updated::new(previous, current))
    }

    pub fn dec_system_balance(
        &mut self,
        caller: &Address,
        pool_token: &TokenId,
        amount: &BigUint,
    ) -> Result<Updated<BigUint>> {
        self.ownership.ensure_owner(caller)?;
        let previous = self.system_balance(pool_token);
        let current = checked_sub(&previous, amount)?;
        self.system_balances.insert(pool_token.clone(), current.clone());
        debug!(pool_token = %pool_token, previous = %previous, current = %current, "System balance updated");
        Ok(Updated::new(previous, current))
    }

    pub fn inc_network_tokens_minted(
        &mut self,
        caller: &Address,
        pool: &TokenId,
        amount: &BigUint,
    ) -> Result<Updated<BigUint>> {
        self.ownership.ensure_owner(caller)?;
        let previous = self.network_tokens_minted(pool);
        let current = &previous + amount;
        self.network_tokens_minted.insert(pool.clone(), current.clone());
        debug!(pool = %pool, previous = %previous, current = %current, "Network tokens minted updated");
        Ok(Updated::new(previous, current))
    }

    pub fn dec_network_tokens_minted(
        &mut self,
        caller: &Address,
        pool: &TokenId,
        amount: &BigUint,
    ) -> Result<Updated<BigUint>> {
        self.ownership.ensure_owner(caller)?;
        let previous = self.network_tokens_minted(pool);
        let current = checked_sub(&previous, amount)?;
        self.network_tokens_minted.insert(pool.clone(), current.clone());
        debug!(pool = %pool, previous = %previous, current = %current, "Network tokens minted updated");
        Ok(Updated::new(previous, current))
    }
}
