//! Liquidity Protection
//!
//! Single-sided liquidity provision into standard pools with impermanent
//! loss compensation. The [`LiquidityProtection`] engine drives the position
//! store, statistics, system balances and settings defined here on top of
//! the pool converter crate.

pub mod calculator;
pub mod constants;
pub mod protection;
pub mod services;
pub mod settings;
pub mod state;
pub mod stats;
pub mod store;
pub mod system_store;

// Re-exports
pub use protection::{LiquidityProtection, ProtectionAccounts};
pub use services::{
    CheckpointStore, InMemoryCheckpointStore, LiquidityEventLog, LiquidityEventsSubscriber,
};
pub use settings::ProtectionSettings;
pub use state::{AvailableSpace, LiquidityChange, LockedBalance, Position, RemovalReturn};
pub use stats::ProtectionStats;
pub use store::{NewPosition, PositionStore};
pub use system_store::SystemStore;
