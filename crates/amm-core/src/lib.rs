//! amm-core: Shared types, errors, math, and configuration
//!
//! This crate provides the foundational pieces used by the pool converter and
//! the liquidity protection engine: big-integer rational math, token and
//! clock services, two-phase ownership, and the error vocabulary.

pub mod clock;
pub mod config;
pub mod errors;
pub mod math;
pub mod ownership;
pub mod tokens;
pub mod types;

pub use clock::*;
pub use config::*;
pub use errors::*;
pub use ownership::Ownable;
pub use tokens::{TokenLedger, TokenService};
pub use types::*;
