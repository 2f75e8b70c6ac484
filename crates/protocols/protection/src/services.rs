//! External services used by the protection engine
//!
//! The engine records the last removal time of each provider in a
//! [`CheckpointStore`] and reports every liquidity change to registered
//! [`LiquidityEventsSubscriber`]s.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use amm_core::{Address, Timestamp};

use crate::state::LiquidityChange;

/// Last liquidity removal time per provider
pub trait CheckpointStore {
    fn set_checkpoint(&mut self, provider: &Address, time: Timestamp);

    /// Zero when the provider never removed liquidity
    fn checkpoint(&self, provider: &Address) -> Timestamp;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: HashMap<Address, Timestamp>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn set_checkpoint(&mut self, provider: &Address, time: Timestamp) {
        self.checkpoints.insert(provider.clone(), time);
    }

    fn checkpoint(&self, provider: &Address) -> Timestamp {
        self.checkpoints.get(provider).copied().unwrap_or(0)
    }
}

/// Receives a notification for every position added or (partially) removed
pub trait LiquidityEventsSubscriber {
    fn on_liquidity_changed(&mut self, change: &LiquidityChange);
}

/// Subscriber that keeps every notification; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct LiquidityEventLog {
    events: Rc<RefCell<Vec<LiquidityChange>>>,
}

impl LiquidityEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LiquidityChange> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl LiquidityEventsSubscriber for LiquidityEventLog {
    fn on_liquidity_changed(&mut self, change: &LiquidityChange) {
        self.events.borrow_mut().push(change.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm_core::TokenId;
    use num_bigint::BigUint;

    #[test]
    fn test_checkpoints() {
        let mut store = InMemoryCheckpointStore::new();
        let alice = Address::new("alice");
        assert_eq!(store.checkpoint(&alice), 0);
        store.set_checkpoint(&alice, 42);
        assert_eq!(store.checkpoint(&alice), 42);
    }

    #[test]
    fn test_event_log_shares_entries() {
        let log = LiquidityEventLog::new();
        let mut subscriber = log.clone();
        subscriber.on_liquidity_changed(&LiquidityChange {
            id: 0,
            provider: Address::new("alice"),
            pool_anchor: TokenId::new("pool"),
            reserve_token: TokenId::new("tkn"),
            pool_amount: BigUint::from(1u32),
            reserve_amount: BigUint::from(2u32),
            adding: true,
        });
        assert_eq!(log.len(), 1);
        assert!(log.events()[0].adding);
    }
}
