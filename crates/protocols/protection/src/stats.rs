//! Protection statistics
//!
//! Running totals of protected liquidity per pool, per pool reserve and per
//! provider, plus the pools each provider participates in. Only the owner
//! (the protection engine) may write.

use std::collections::HashMap;

use amm_core::{checked_sub, Address, Ownable, Result, TokenId};
use num_bigint::BigUint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionStats {
    ownership: Ownable,
    total_pool_amounts: HashMap<TokenId, BigUint>,
    total_reserve_amounts: HashMap<(TokenId, TokenId), BigUint>,
    total_provider_amounts: HashMap<(Address, TokenId, TokenId), BigUint>,
    /// Pools per provider in insertion order
    provider_pools: HashMap<Address, Vec<TokenId>>,
}

impl ProtectionStats {
    pub fn new(owner: Address) -> Self {
        Self {
            ownership: Ownable::new(owner),
            total_pool_amounts: HashMap::new(),
            total_reserve_amounts: HashMap::new(),
            total_provider_amounts: HashMap::new(),
            provider_pools: HashMap::new(),
        }
    }

    pub fn ownership(&self) -> &Ownable {
        &self.ownership
    }

    pub fn increase_total_amounts(
        &mut self,
        caller: &Address,
        provider: &Address,
        pool: &TokenId,
        reserve: &TokenId,
        pool_amount: &BigUint,
        reserve_amount: &BigUint,
    ) -> Result<()> {
        self.ownership.ensure_owner(caller)?;
        *self.total_pool_amounts.entry(pool.clone()).or_default() += pool_amount;
        *self
            .total_reserve_amounts
            .entry((pool.clone(), reserve.clone()))
            .or_default() += reserve_amount;
        *self
            .total_provider_amounts
            .entry((provider.clone(), pool.clone(), reserve.clone()))
            .or_default() += reserve_amount;
        Ok(())
    }

    /// Fails with `SubtractionOverflow` before touching any total
    pub fn decrease_total_amounts(
        &mut self,
        caller: &Address,
        provider: &Address,
        pool: &TokenId,
        reserve: &TokenId,
        pool_amount: &BigUint,
        reserve_amount: &BigUint,
    ) -> Result<()> {
        self.ownership.ensure_owner(caller)?;
        let pool_total = checked_sub(&self.total_pool_amount(pool), pool_amount)?;
        let reserve_total = checked_sub(&self.total_reserve_amount(pool, reserve), reserve_amount)?;
        let provider_total = checked_sub(
            &self.total_provider_amount(provider, pool, reserve),
            reserve_amount,
        )?;

        self.total_pool_amounts.insert(pool.clone(), pool_total);
        self.total_reserve_amounts
            .insert((pool.clone(), reserve.clone()), reserve_total);
        self.total_provider_amounts
            .insert((provider.clone(), pool.clone(), reserve.clone()), provider_total);
        Ok(())
    }

    /// Returns false when the pool was already listed
    pub fn add_provider_pool(&mut self, caller: &Address, provider: &Address, pool: &TokenId) -> Result<bool> {
        self.ownership.ensure_owner(caller)?;
        let pools = self.provider_pools.entry(provider.clone()).or_default();
        if pools.contains(pool) {
            return Ok(false);
        }
        pools.push(pool.clone());
        Ok(true)
    }

    /// Returns false when the pool was not listed
    pub fn remove_provider_pool(
        &mut self,
        caller: &Address,
        provider: &Address,
        pool: &TokenId,
    ) -> Result<bool> {
        self.ownership.ensure_owner(caller)?;
        let Some(pools) = self.provider_pools.get_mut(provider) else {
            return Ok(false);
        };
        let Some(index) = pools.iter().position(|p| p == pool) else {
            return Ok(false);
        };
        pools.remove(index);
        if pools.is_empty() {
            self.provider_pools.remove(provider);
        }
        Ok(true)
    }

    pub fn total_pool_amount(&self, pool: &TokenId) -> BigUint {
        self.total_pool_amounts.get(pool).cloned().unwrap_or_default()
    }

    pub fn total_reserve_amount(&self, pool: &TokenId, reserve: &TokenId) -> BigUint {
        self.total_reserve_amounts
            .get(&(pool.clone(), reserve.clone()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_provider_amount(
        &self,
        provider: &Address,
        pool: &TokenId,
        reserve: &TokenId,
    ) -> BigUint {
        self.total_provider_amounts
            .get(&(provider.clone(), pool.clone(), reserve.clone()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn provider_pools(&self, provider: &Address) -> &[TokenId] {
        self.provider_pools
            .get(provider)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm_core::Error;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn engine() -> Address {
        Address::new("engine")
    }

    #[test]
    fn test_totals() {
        let mut stats = ProtectionStats::new(engine());
        let alice = Address::new("alice");
        let pool = TokenId::new("pool");
        let tkn = TokenId::new("tkn");

        stats
            .increase_total_amounts(&engine(), &alice, &pool, &tkn, &big(10), &big(100))
            .unwrap();
        stats
            .increase_total_amounts(&engine(), &Address::new("bob"), &pool, &tkn, &big(5), &big(50))
            .unwrap();
        assert_eq!(stats.total_pool_amount(&pool), big(15));
        assert_eq!(stats.total_reserve_amount(&pool, &tkn), big(150));
        assert_eq!(stats.total_provider_amount(&alice, &pool, &tkn), big(100));

        let overflow =
            stats.decrease_total_amounts(&engine(), &alice, &pool, &tkn, &big(1), &big(101));
        assert!(matches!(overflow, Err(Error::SubtractionOverflow { .. })));
        // nothing changed on failure
        assert_eq!(stats.total_pool_amount(&pool), big(15));

        stats
            .decrease_total_amounts(&engine(), &alice, &pool, &tkn, &big(10), &big(100))
            .unwrap();
        assert_eq!(stats.total_pool_amount(&pool), big(5));
        assert_eq!(stats.total_provider_amount(&alice, &pool, &tkn), big(0));
    }

    #[test]
    fn test_provider_pools_keep_insertion_order() {
        let mut stats = ProtectionStats::new(engine());
        let alice = Address::new("alice");
        for pool in ["p2", "p1", "p2", "p3"] {
            stats
                .add_provider_pool(&engine(), &alice, &TokenId::new(pool))
                .unwrap();
        }
        assert_eq!(
            stats.provider_pools(&alice),
            &[TokenId::new("p2"), TokenId::new("p1"), TokenId::new("p3")]
        );
        assert!(stats
            .remove_provider_pool(&engine(), &alice, &TokenId::new("p1"))
            .unwrap());
        assert!(!stats
            .remove_provider_pool(&engine(), &alice, &TokenId::new("p1"))
            .unwrap());
        assert_eq!(stats.provider_pools(&alice), &[TokenId::new("p2"), TokenId::new("p3")]);
    }

    #[test]
    fn test_owner_only() {
        let mut stats = ProtectionStats::new(engine());
        let other = Address::new("other");
        let pool = TokenId::new("pool");
        assert_eq!(
            stats.increase_total_amounts(&other, &other, &pool, &pool, &big(1), &big(1)),
            Err(Error::AccessDenied)
        );
        assert_eq!(
            stats.add_provider_pool(&other, &other, &pool),
            Err(Error::AccessDenied)
        );
    }
}
