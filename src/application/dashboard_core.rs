// Dashboard core - Single mutation path for series and metrics
use crate::domain::error::DashboardError;
use crate::domain::metric::MetricSet;
use crate::domain::sample::Sample;
use crate::domain::snapshot::Snapshot;
use crate::domain::time_series::TimeSeriesBuffer;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One state change produced by a tick.
#[derive(Debug, Clone)]
pub enum CoreChange {
    Metrics(HashMap<String, f64>),
    Sample(Sample),
    Backfill(Vec<Sample>),
}

struct CoreState {
    series: TimeSeriesBuffer,
    metrics: MetricSet,
    sequence: u64,
}

pub struct DashboardCore {
    state: Mutex<CoreState>,
}

impl DashboardCore {
    pub fn new(series: TimeSeriesBuffer, metrics: MetricSet) -> Self {
        Self {
            state: Mutex::new(CoreState {
                series,
                metrics,
                sequence: 0,
            }),
        }
    }

    /// Apply `change` and build the resulting snapshot.
    ///
    /// `is_current` is evaluated under the state lock right before the
    /// mutation; when it returns false nothing is applied and `Ok(None)`
    /// is returned. A failing change leaves the state untouched.
    pub fn apply(
        &self,
        change: CoreChange,
        is_current: impl FnOnce() -> bool,
    ) -> Result<Option<Arc<Snapshot>>, DashboardError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !is_current() {
            return Ok(None);
        }

        match change {
            CoreChange::Metrics(values) => state.metrics.update(&values)?,
            CoreChange::Sample(sample) => state.series.append(sample)?,
            CoreChange::Backfill(samples) => {
                let mut series = state.series.clone();
                for sample in samples {
                    series.append(sample)?;
                }
                state.series = series;
            }
        }

        state.sequence += 1;
        Ok(Some(Arc::new(Snapshot::new(
            state.sequence,
            Utc::now(),
            state.series.snapshot(),
            state.metrics.list(),
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::Category;
    use crate::domain::metric::{MetricFormat, MetricSpec};
    use chrono::{DateTime, TimeZone};

    fn core() -> DashboardCore {
        let metrics = MetricSet::new(vec![MetricSpec {
            name: "revenue".to_string(),
            title: "Revenue".to_string(),
            category: Category::Sales,
            format: MetricFormat::Currency,
            precision: 0,
            initial: 100.0,
        }])
        .unwrap();
        DashboardCore::new(TimeSeriesBuffer::new(3, ["users"]).unwrap(), metrics)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample(secs: i64) -> Sample {
        Sample::new(at(secs), HashMap::from([("users".to_string(), secs as f64)]))
    }

    #[test]
    fn test_each_change_yields_next_sequence() {
        let core = core();
        let first = core.apply(CoreChange::Sample(sample(1)), || true).unwrap().unwrap();
        let second = core
            .apply(
                CoreChange::Metrics(HashMap::from([("revenue".to_string(), 110.0)])),
                || true,
            )
            .unwrap()
            .unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.series.len(), 1);
        assert_eq!(second.metrics[0].current_value, "$110");
        // Earlier snapshot is untouched by later changes
        assert_eq!(first.metrics[0].current_value, "$100");
    }

    #[test]
    fn test_stale_change_is_not_applied() {
        let core = core();
        assert!(core.apply(CoreChange::Sample(sample(1)), || false).unwrap().is_none());

        let next = core.apply(CoreChange::Sample(sample(2)), || true).unwrap().unwrap();
        assert_eq!(next.sequence, 1);
        assert_eq!(next.series.len(), 1);
    }

    #[test]
    fn test_failed_backfill_is_all_or_nothing() {
        let core = core();
        core.apply(CoreChange::Sample(sample(5)), || true).unwrap();

        let err = core
            .apply(CoreChange::Backfill(vec![sample(6), sample(2)]), || true)
            .unwrap_err();
        assert!(matches!(err, DashboardError::OutOfOrderSample { .. }));

        let next = core.apply(CoreChange::Sample(sample(7)), || true).unwrap().unwrap();
        assert_eq!(next.sequence, 2);
        let times: Vec<_> = next.series.iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![at(5), at(7)]);
    }
}
