// Domain layer - Core data types and invariants
pub mod error;
pub mod filter;
pub mod metric;
pub mod sample;
pub mod snapshot;
pub mod time_series;
