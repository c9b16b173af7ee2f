// Synthetic sample sources backed by a seedable RNG
use crate::application::sample_source::SampleSource;
use crate::infrastructure::config::{MetricConfig, SeriesConfig};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Independent whole-number draws from `[min, max)` per series.
pub struct BoundedRandomSource {
    bounds: Vec<SeriesConfig>,
    rng: Mutex<StdRng>,
}

impl BoundedRandomSource {
    pub fn new(bounds: Vec<SeriesConfig>, seed: Option<u64>) -> Self {
        Self {
            bounds,
            rng: Mutex::new(make_rng(seed)),
        }
    }
}

#[async_trait]
impl SampleSource for BoundedRandomSource {
    async fn next_values(&self) -> anyhow::Result<HashMap<String, f64>> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .bounds
            .iter()
            .map(|b| {
                let value = if b.max > b.min {
                    (rng.random::<f64>() * (b.max - b.min) + b.min).floor()
                } else {
                    b.min
                };
                (b.name.clone(), value)
            })
            .collect())
    }
}

struct Walk {
    name: String,
    value: f64,
    min: f64,
    max: f64,
    step_pct: f64,
}

/// Each metric drifts by at most `step_pct` percent per tick, clamped
/// to its configured range.
pub struct RandomWalkSource {
    walks: Mutex<Vec<Walk>>,
    rng: Mutex<StdRng>,
}

impl RandomWalkSource {
    pub fn new(metrics: &[MetricConfig], seed: Option<u64>) -> Self {
        let walks = metrics
            .iter()
            .map(|m| Walk {
                name: m.name.clone(),
                value: m.initial.clamp(m.min, m.max),
                min: m.min,
                max: m.max,
                step_pct: m.step_pct,
            })
            .collect();

        Self {
            walks: Mutex::new(walks),
            rng: Mutex::new(make_rng(seed)),
        }
    }
}

#[async_trait]
impl SampleSource for RandomWalkSource {
    async fn next_values(&self) -> anyhow::Result<HashMap<String, f64>> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut walks = self.walks.lock().unwrap_or_else(|e| e.into_inner());

        Ok(walks
            .iter_mut()
            .map(|w| {
                let step = w.step_pct / 100.0;
                let factor = if step > 0.0 {
                    1.0 + rng.random_range(-step..=step)
                } else {
                    1.0
                };
                w.value = (w.value * factor).clamp(w.min, w.max);
                (w.name.clone(), w.value)
            })
            .collect())
    }
}
