// Application layer - Use cases and capabilities
pub mod dashboard_core;
pub mod filter_state;
pub mod publisher;
pub mod sample_source;
pub mod scheduler;
