// Dashboard error taxonomy
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// A sample's timestamp regressed past the buffer tail.
    #[error("sample at {attempted} is older than the latest stored sample at {last}")]
    OutOfOrderSample {
        last: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("unknown series '{0}'")]
    UnknownSeries(String),

    #[error("sample has no value for series '{0}'")]
    MissingSeries(String),

    #[error("metric '{0}' is registered more than once")]
    DuplicateMetric(String),

    #[error("invalid value '{value}' for filter '{field}'")]
    InvalidFilterValue { field: &'static str, value: String },

    #[error("observer {token} failed: {reason}")]
    ObserverFailure { token: u64, reason: String },

    #[error("time series capacity must be at least 1")]
    InvalidCapacity,

    #[error("backfill of {count} samples spaced {spacing} apart is out of range")]
    BackfillOutOfRange { count: usize, spacing: chrono::Duration },

    #[error("unknown cadence '{0}'")]
    UnknownCadence(String),

    #[error("sample source failed: {0}")]
    Source(#[source] anyhow::Error),
}
