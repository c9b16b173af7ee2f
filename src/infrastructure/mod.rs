// Infrastructure layer - Adapters for configuration, feeds and HTTP encoding
pub mod config;
pub mod http_response;
pub mod random_source;
pub mod snapshot_stream;
