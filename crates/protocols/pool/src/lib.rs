//! Standard Pool Converter
//!
//! This crate implements equal-weight two-reserve pools: swap pricing, the
//! recent average rate oracle, network fee accounting, the converter
//! registry and conversion path finding across pools.

pub mod average_rate;
pub mod calculator;
pub mod constants;
pub mod converter;
pub mod legacy;
pub mod network;
pub mod network_fee;
pub mod registry;
pub mod router;
pub mod settings;
pub mod standard;

// Re-exports
pub use average_rate::AverageRateRecord;
pub use calculator::{source_amount_and_fee, target_amount_and_fee};
pub use constants::{converter_types, AVERAGE_RATE_PERIOD};
pub use converter::Converter;
pub use legacy::LegacyConverter;
pub use network::{ConversionNetwork, PathStep};
pub use network_fee::{split_fee, NetworkFeeAccountant};
pub use registry::ConverterRegistry;
pub use router::{merge_paths, ConversionPathFinder};
pub use settings::NetworkSettings;
pub use standard::{Conversion, Reserve, StandardPoolConverter};
