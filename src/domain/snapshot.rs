// Immutable point-in-time view of the dashboard state
use super::filter::FilterSelection;
use super::metric::Metric;
use super::sample::Sample;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Built fresh for every state-changing tick and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sequence: u64,
    pub generated_at: DateTime<Utc>,
    pub series: Vec<Sample>,
    pub metrics: Vec<Metric>,
}

impl Snapshot {
    pub fn new(
        sequence: u64,
        generated_at: DateTime<Utc>,
        series: Vec<Sample>,
        metrics: Vec<Metric>,
    ) -> Self {
        Self {
            sequence,
            generated_at,
            series,
            metrics,
        }
    }

    /// Derive the filtered read model a renderer displays.
    ///
    /// The date range trims series samples older than `generated_at`
    /// minus the window, and the category narrows the metric list. Region
    /// is echoed in `filters` only: samples and metrics carry no region,
    /// so there is nothing for it to narrow.
    pub fn view(&self, filters: FilterSelection) -> SnapshotView {
        let cutoff = self.generated_at - filters.date_range.window();

        let series = self
            .series
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect();

        let metrics = self
            .metrics
            .iter()
            .filter(|m| filters.category.matches(m.category))
            .cloned()
            .collect();

        SnapshotView {
            sequence: self.sequence,
            generated_at: self.generated_at,
            filters,
            series,
            metrics,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
    pub sequence: u64,
    pub generated_at: DateTime<Utc>,
    pub filters: FilterSelection,
    pub series: Vec<Sample>,
    pub metrics: Vec<Metric>,
}
