//! Position store
//!
//! Protected positions keyed by id, each provider's position ids, and the
//! locked network token balances awaiting release.

use std::collections::{BTreeMap, HashMap};

use amm_core::{Address, Error, PositionId, Result, Timestamp, TokenId};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::FIRST_POSITION_ID;
use crate::state::{LockedBalance, Position};

/// Fields of a position about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPosition {
    pub provider: Address,
    pub pool_token: TokenId,
    pub reserve_token: TokenId,
    pub pool_amount: BigUint,
    pub reserve_amount: BigUint,
    pub reserve_rate_n: BigUint,
    pub reserve_rate_d: BigUint,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionStore {
    next_id: PositionId,
    positions: BTreeMap<PositionId, Position>,
    provider_positions: HashMap<Address, Vec<PositionId>>,
    locked_balances: HashMap<Address, Vec<LockedBalance>>,
}

impl Default for PositionStore {
    fn default() -> Self {
        Self {
            next_id: FIRST_POSITION_ID,
            positions: BTreeMap::new(),
            provider_positions: HashMap::new(),
            locked_balances: HashMap::new(),
        }
    }
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Positions
    // ---------------------------------------------------------------------

    pub fn add_position(&mut self, new: NewPosition) -> PositionId {
        let id = self.next_id;
        self.next_id += 1;
        self.provider_positions
            .entry(new.provider.clone())
            .or_default()
            .push(id);
        let position = Position {
            id,
            provider: new.provider,
            pool_token: new.pool_token,
            reserve_token: new.reserve_token,
            pool_amount: new.pool_amount,
            reserve_amount: new.reserve_amount,
            reserve_rate_n: new.reserve_rate_n,
            reserve_rate_d: new.reserve_rate_d,
            timestamp: new.timestamp,
        };
        debug!(id, provider = %position.provider, pool = %position.pool_token, "Position stored");
        self.positions.insert(id, position);
        id
    }

    pub fn update_position_amounts(
        &mut self,
        id: PositionId,
        pool_amount: BigUint,
        reserve_amount: BigUint,
    ) -> Result<()> {
        let position = self
            .positions
            .get_mut(&id)
            .ok_or(Error::InvalidId { id })?;
        position.pool_amount = pool_amount;
        position.reserve_amount = reserve_amount;
        Ok(())
    }

    pub fn remove_position(&mut self, id: PositionId) -> Result<Position> {
        let position = self.positions.remove(&id).ok_or(Error::InvalidId { id })?;
        if let Some(ids) = self.provider_positions.get_mut(&position.provider) {
            if let Some(index) = ids.iter().position(|p| *p == id) {
                ids.swap_remove(index);
            }
            if ids.is_empty() {
                self.provider_positions.remove(&position.provider);
            }
        }
        debug!(id, provider = %position.provider, "Position removed");
        Ok(position)
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn provider_positions(&self, provider: &Address) -> &[PositionId] {
        self.provider_positions
            .get(provider)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn provider_position_count(&self, provider: &Address) -> usize {
        self.provider_positions(provider).len()
    }

    // ---------------------------------------------------------------------
    // Locked balances
    // ---------------------------------------------------------------------

    pub fn add_locked_balance(
        &mut self,
        provider: &Address,
        amount: BigUint,
        expiration_time: Timestamp,
    ) -> usize {
        let balances = self.locked_balances.entry(provider.clone()).or_default();
        balances.push(LockedBalance {
            amount,
            expiration_time,
        });
        balances.len() - 1
    }

    pub fn locked_balance(&self, provider: &Address, index: usize) -> Option<&LockedBalance> {
        self.locked_balances.get(provider)?.get(index)
    }

    pub fn locked_balance_count(&self, provider: &Address) -> usize {
        self.locked_balances.get(provider).map_or(0, Vec::len)
    }

    /// Locked balances in `[start, end)`, with `end` clamped to the count
    pub fn locked_balance_range(
        &self,
        provider: &Address,
        start: usize,
        end: usize,
    ) -> Result<Vec<LockedBalance>> {
        let balances = self
            .locked_balances
            .get(provider)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let end = end.min(balances.len());
        if start >= end {
            return Err(Error::InvalidIndices);
        }
        Ok(balances[start..end].to_vec())
    }

    /// Remove by swapping the last entry into `index`
    pub fn remove_locked_balance(&mut self, provider: &Address, index: usize) -> Result<LockedBalance> {
        let balances = self
            .locked_balances
            .get_mut(provider)
            .filter(|balances| index < balances.len())
            .ok_or(Error::InvalidIndices)?;
        let removed = balances.swap_remove(index);
        if balances.is_empty() {
            self.locked_balances.remove(provider);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn alice() -> Address {
        Address::new("alice")
    }

    fn new_position(provider: Address, amount: u64) -> NewPosition {
        NewPosition {
            provider,
            pool_token: TokenId::new("pool"),
            reserve_token: TokenId::new("tkn"),
            pool_amount: big(amount),
            reserve_amount: big(amount),
            reserve_rate_n: big(1),
            reserve_rate_d: big(1),
            timestamp: 100,
        }
    }

    #[test]
    fn test_ids_start_at_one() {
        let mut store = PositionStore::new();
        assert_eq!(store.add_position(new_position(alice(), 10)), 1);
        assert_eq!(store.add_position(new_position(alice(), 20)), 2);
        assert_eq!(store.provider_positions(&alice()), &[1, 2]);
        assert_eq!(store.position(2).unwrap().pool_amount, big(20));
        assert!(store.position(0).is_none());
    }

    #[test]
    fn test_update_and_remove() {
        let mut store = PositionStore::new();
        let id = store.add_position(new_position(alice(), 10));
        store.update_position_amounts(id, big(4), big(5)).unwrap();
        assert_eq!(store.position(id).unwrap().reserve_amount, big(5));

        let removed = store.remove_position(id).unwrap();
        assert_eq!(removed.pool_amount, big(4));
        assert_eq!(store.provider_position_count(&alice()), 0);
        assert_eq!(store.remove_position(id), Err(Error::InvalidId { id }));
        assert_eq!(
            store.update_position_amounts(id, big(1), big(1)),
            Err(Error::InvalidId { id })
        );
        // ids are never reused
        assert_eq!(store.add_position(new_position(alice(), 1)), 2);
    }

    #[test]
    fn test_locked_balance_range() {
        let mut store = PositionStore::new();
        for (amount, expiration) in [(1, 10), (2, 20), (3, 30)] {
            store.add_locked_balance(&alice(), big(amount), expiration);
        }
        assert_eq!(store.locked_balance_count(&alice()), 3);

        let range = store.locked_balance_range(&alice(), 1, 10).unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].amount, big(2));
        assert_eq!(
            store.locked_balance_range(&alice(), 3, 10),
            Err(Error::InvalidIndices)
        );
        assert_eq!(
            store.locked_balance_range(&Address::new("bob"), 0, 1),
            Err(Error::InvalidIndices)
        );
    }

    #[test]
    fn test_snapshot_json() {
        let mut store = PositionStore::new();
        store.add_position(new_position(alice(), 10));
        store.add_locked_balance(&alice(), big(7), 50);

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["nextId"], 2);
        assert!(json["providerPositions"]["alice"].is_array());
        assert_eq!(json["lockedBalances"]["alice"][0]["expirationTime"], 50);

        let restored: PositionStore = serde_json::from_value(json).unwrap();
        assert_eq!(restored, store);
    }

    #[test]
    fn test_remove_locked_balance_swaps_last() {
        let mut store = PositionStore::new();
        for amount in [1, 2, 3] {
            store.add_locked_balance(&alice(), big(amount), 0);
        }
        let removed = store.remove_locked_balance(&alice(), 0).unwrap();
        assert_eq!(removed.amount, big(1));
        assert_eq!(store.locked_balance(&alice(), 0).unwrap().amount, big(3));
        assert_eq!(store.locked_balance_count(&alice()), 2);
        assert_eq!(
            store.remove_locked_balance(&alice(), 5),
            Err(Error::InvalidIndices)
        );
    }
}
