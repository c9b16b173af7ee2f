// KPI metrics with change tracking
use super::error::DashboardError;
use super::filter::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display rule declared at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricFormat {
    Currency,
    Percentage,
    Count,
}

impl MetricFormat {
    pub fn format(&self, value: f64, precision: usize) -> String {
        let digits = group_thousands(value.abs(), precision);
        let sign = if value < 0.0 && digits.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
            "-"
        } else {
            ""
        };

        match self {
            MetricFormat::Currency => format!("{}${}", sign, digits),
            MetricFormat::Percentage => format!("{}{}%", sign, digits),
            MetricFormat::Count => format!("{}{}", sign, digits),
        }
    }
}

/// Format a non-negative number with `,` between thousands groups.
fn group_thousands(value: f64, precision: usize) -> String {
    let fixed = format!("{:.*}", precision, value);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{}.{}", grouped, frac),
        None => grouped,
    }
}

#[derive(Debug, Clone)]
pub struct MetricSpec {
    pub name: String,
    pub title: String,
    pub category: Category,
    pub format: MetricFormat,
    pub precision: usize,
    pub initial: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub name: String,
    pub title: String,
    pub value: f64,
    pub current_value: String,
    pub change_percent: f64,
    pub category: Category,
    pub format: MetricFormat,
    #[serde(skip)]
    precision: usize,
}

impl Metric {
    fn from_spec(spec: MetricSpec) -> Self {
        Self {
            current_value: spec.format.format(spec.initial, spec.precision),
            name: spec.name,
            title: spec.title,
            value: spec.initial,
            change_percent: 0.0,
            category: spec.category,
            format: spec.format,
            precision: spec.precision,
        }
    }

    fn apply(&mut self, new_value: f64) {
        self.change_percent = change_percent(self.value, new_value);
        self.value = new_value;
        self.current_value = self.format.format(new_value, self.precision);
    }
}

/// Percentage change from `previous` to `current`; zero when there is
/// no previous magnitude to compare against.
pub fn change_percent(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

/// Ordered set of metrics fixed at construction.
#[derive(Debug, Clone)]
pub struct MetricSet {
    metrics: Vec<Metric>,
    index: HashMap<String, usize>,
}

impl MetricSet {
    pub fn new(specs: Vec<MetricSpec>) -> Result<Self, DashboardError> {
        let mut metrics = Vec::with_capacity(specs.len());
        let mut index = HashMap::with_capacity(specs.len());

        for spec in specs {
            if index.contains_key(&spec.name) {
                return Err(DashboardError::DuplicateMetric(spec.name));
            }
            index.insert(spec.name.clone(), metrics.len());
            metrics.push(Metric::from_spec(spec));
        }

        Ok(Self { metrics, index })
    }

    /// Apply one tick of new values. All names are checked before any
    /// metric is touched, so an unknown name leaves the set unchanged.
    pub fn update(&mut self, tick_values: &HashMap<String, f64>) -> Result<(), DashboardError> {
        if let Some(unknown) = tick_values.keys().find(|name| !self.index.contains_key(*name)) {
            return Err(DashboardError::UnknownMetric(unknown.clone()));
        }

        for (name, value) in tick_values {
            let idx = self.index[name];
            self.metrics[idx].apply(*value);
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<Metric> {
        self.metrics.clone()
    }
}
