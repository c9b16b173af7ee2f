// Timestamped sample of named values
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, values: HashMap<String, f64>) -> Self {
        Self {
            timestamp,
            values: values.into_iter().collect(),
        }
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}
