// Fixed-capacity ring of timestamped samples
use super::error::DashboardError;
use super::sample::Sample;
use std::collections::{BTreeSet, VecDeque};

/// FIFO buffer holding at most `capacity` samples in timestamp order.
///
/// Appending at capacity evicts the oldest sample. Timestamps never
/// decrease from head to tail, and every sample carries exactly the
/// registered series.
#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    series: BTreeSet<String>,
}

impl TimeSeriesBuffer {
    pub fn new<I, S>(capacity: usize, series: I) -> Result<Self, DashboardError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if capacity == 0 {
            return Err(DashboardError::InvalidCapacity);
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            series: series.into_iter().map(Into::into).collect(),
        })
    }

    /// Append at the tail, evicting one sample from the head when full.
    /// A sample older than the current tail, or one whose names differ
    /// from the registered series, is rejected and the buffer is left
    /// untouched.
    pub fn append(&mut self, sample: Sample) -> Result<(), DashboardError> {
        if let Some(unknown) = sample.values.keys().find(|name| !self.series.contains(*name)) {
            return Err(DashboardError::UnknownSeries(unknown.clone()));
        }
        if let Some(missing) = self.series.iter().find(|name| sample.value(name).is_none()) {
            return Err(DashboardError::MissingSeries(missing.clone()));
        }

        if let Some(last) = self.latest() {
            if sample.timestamp < last.timestamp {
                return Err(DashboardError::OutOfOrderSample {
                    last: last.timestamp,
                    attempted: sample.timestamp,
                });
            }
        }

        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        Ok(())
    }

    /// Ordered copy of the retained samples, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn users(secs: i64, value: f64) -> Sample {
        Sample::new(at(secs), HashMap::from([("users".to_string(), value)]))
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let mut buffer = TimeSeriesBuffer::new(3, ["users"]).unwrap();
        for (t, v) in [(1, 10.0), (2, 20.0), (3, 30.0), (4, 40.0)] {
            buffer.append(users(t, v)).unwrap();
        }

        let retained = buffer.snapshot();
        assert_eq!(retained.len(), 3);
        let times: Vec<_> = retained.iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![at(2), at(3), at(4)]);
        assert_eq!(retained[0].value("users"), Some(20.0));
        assert_eq!(retained[2].value("users"), Some(40.0));
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut buffer = TimeSeriesBuffer::new(5, ["users"]).unwrap();
        for t in 0..50 {
            buffer.append(users(t, t as f64)).unwrap();
            assert!(buffer.snapshot().len() <= 5);
        }

        // Exactly the five most recent, in order
        let values: Vec<_> = buffer
            .snapshot()
            .iter()
            .map(|s| s.value("users").unwrap())
            .collect();
        assert_eq!(values, vec![45.0, 46.0, 47.0, 48.0, 49.0]);
    }

    #[test]
    fn test_out_of_order_sample_leaves_buffer_unchanged() {
        let mut buffer = TimeSeriesBuffer::new(3, ["users"]).unwrap();
        buffer.append(users(5, 1.0)).unwrap();
        buffer.append(users(6, 2.0)).unwrap();
        let before = buffer.snapshot();

        let err = buffer.append(users(4, 3.0)).unwrap_err();
        assert!(matches!(err, DashboardError::OutOfOrderSample { .. }));
        assert_eq!(buffer.snapshot(), before);
    }

    #[test]
    fn test_equal_timestamps_are_accepted() {
        let mut buffer = TimeSeriesBuffer::new(2, ["users"]).unwrap();
        buffer.append(users(7, 1.0)).unwrap();
        buffer.append(users(7, 2.0)).unwrap();
        let values: Vec<_> = buffer
            .snapshot()
            .iter()
            .map(|s| s.value("users").unwrap())
            .collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_sample_must_carry_exactly_the_registered_series() {
        let mut buffer = TimeSeriesBuffer::new(3, ["users", "revenue"]).unwrap();
        buffer
            .append(Sample::new(
                at(1),
                HashMap::from([("users".to_string(), 1.0), ("revenue".to_string(), 2.0)]),
            ))
            .unwrap();
        let before = buffer.snapshot();

        let err = buffer.append(users(2, 3.0)).unwrap_err();
        assert!(matches!(err, DashboardError::MissingSeries(name) if name == "revenue"));

        let extra = Sample::new(
            at(3),
            HashMap::from([
                ("users".to_string(), 1.0),
                ("revenue".to_string(), 2.0),
                ("churn".to_string(), 0.5),
            ]),
        );
        let err = buffer.append(extra).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownSeries(name) if name == "churn"));
        assert_eq!(buffer.snapshot(), before);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(matches!(
            TimeSeriesBuffer::new(0, ["users"]),
            Err(DashboardError::InvalidCapacity)
        ));
    }
}
