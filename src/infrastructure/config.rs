use crate::domain::filter::Category;
use crate::domain::metric::{MetricFormat, MetricSpec};
use crate::application::scheduler::CadenceConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

// Ten years; keeps every backfilled timestamp representable
const MAX_BACKFILL_WINDOW_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub server: ServerSettings,
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub listen: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerSettings {
    pub metrics_interval_ms: u64,
    pub series_interval_ms: u64,
    pub series_capacity: usize,
    #[serde(default = "default_backfill_spacing")]
    pub backfill_spacing_secs: i64,
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
    pub seed: Option<u64>,
}

fn default_backfill_spacing() -> i64 {
    3600
}

fn default_stream_buffer() -> usize {
    16
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricConfig {
    pub name: String,
    pub title: String,
    pub category: Category,
    pub format: MetricFormat,
    #[serde(default)]
    pub precision: usize,
    pub initial: f64,
    pub min: f64,
    pub max: f64,
    pub step_pct: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesConfig {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl DashboardConfig {
    pub fn cadences(&self) -> CadenceConfig {
        CadenceConfig {
            metrics_interval: Duration::from_millis(self.scheduler.metrics_interval_ms),
            series_interval: Duration::from_millis(self.scheduler.series_interval_ms),
        }
    }

    pub fn metric_specs(&self) -> Vec<MetricSpec> {
        self.metrics
            .iter()
            .map(|m| MetricSpec {
                name: m.name.clone(),
                title: m.title.clone(),
                category: m.category,
                format: m.format,
                precision: m.precision,
                initial: m.initial,
            })
            .collect()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.scheduler;
        if s.metrics_interval_ms == 0 || s.series_interval_ms == 0 {
            anyhow::bail!("scheduler intervals must be greater than zero");
        }
        if s.series_capacity == 0 {
            anyhow::bail!("series_capacity must be at least 1");
        }
        if s.backfill_spacing_secs <= 0 {
            anyhow::bail!("backfill_spacing_secs must be positive");
        }
        let window = i64::try_from(s.series_capacity)
            .ok()
            .and_then(|capacity| capacity.checked_mul(s.backfill_spacing_secs));
        match window {
            Some(secs) if secs <= MAX_BACKFILL_WINDOW_SECS => {}
            _ => anyhow::bail!(
                "backfill window of {} samples every {}s exceeds {}s",
                s.series_capacity,
                s.backfill_spacing_secs,
                MAX_BACKFILL_WINDOW_SECS
            ),
        }
        for m in &self.metrics {
            if m.min > m.max {
                anyhow::bail!("metric '{}' has min {} above max {}", m.name, m.min, m.max);
            }
            if m.step_pct < 0.0 {
                anyhow::bail!("metric '{}' has a negative step_pct", m.name);
            }
        }
        let mut names = HashSet::new();
        for series in &self.series {
            if !names.insert(series.name.as_str()) {
                anyhow::bail!("series '{}' is configured more than once", series.name);
            }
            if series.min > series.max {
                anyhow::bail!(
                    "series '{}' has min {} above max {}",
                    series.name,
                    series.min,
                    series.max
                );
            }
        }
        Ok(())
    }
}

pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard"))
        .build()?;

    let config: DashboardConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
listen = "127.0.0.1:9000"

[scheduler]
metrics_interval_ms = 5000
series_interval_ms = 10000
series_capacity = 24

[[metrics]]
name = "conversion_rate"
title = "Conversion Rate"
category = "marketing"
format = "percentage"
precision = 2
initial = 3.24
min = 1.0
max = 6.0
step_pct = 3.0

[[series]]
name = "users"
min = 1500.0
max = 2000.0
"#;

    fn parse(toml: &str) -> anyhow::Result<DashboardConfig> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    #[test]
    fn test_parse_dashboard_config() {
        let config = parse(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.scheduler.backfill_spacing_secs, 3600);
        assert_eq!(config.scheduler.stream_buffer, 16);
        assert_eq!(config.cadences().metrics_interval, Duration::from_secs(5));

        let specs = config.metric_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].category, Category::Marketing);
        assert_eq!(specs[0].format, MetricFormat::Percentage);
        assert_eq!(specs[0].precision, 2);
        assert_eq!(config.series[0].name, "users");
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = parse(SAMPLE).unwrap();
        config.series[0].min = 3000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = parse(SAMPLE).unwrap();
        config.scheduler.series_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_backfill_window() {
        let mut config = parse(SAMPLE).unwrap();
        config.scheduler.backfill_spacing_secs = 10_000_000_000_000;
        assert!(config.validate().is_err());

        config.scheduler.backfill_spacing_secs = i64::MAX;
        assert!(config.validate().is_err());

        // 24 samples a day apart is fine
        config.scheduler.backfill_spacing_secs = 86_400;
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicate_series() {
        let mut config = parse(SAMPLE).unwrap();
        config.series.push(config.series[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_category_fails_to_parse() {
        let broken = SAMPLE.replace("\"marketing\"", "\"finance\"");
        assert!(parse(&broken).is_err());
    }
}
