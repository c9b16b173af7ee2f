// Sample source capability for periodic feeds
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Produce the next value for every name this source feeds.
    async fn next_values(&self) -> anyhow::Result<HashMap<String, f64>>;

    /// Timestamp stamped on a sample built from the last `next_values` call.
    fn sample_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
