// Update scheduler - Two independent cadences with a stale-tick guard
use crate::application::dashboard_core::{CoreChange, DashboardCore};
use crate::application::publisher::SnapshotPublisher;
use crate::application::sample_source::SampleSource;
use crate::domain::error::DashboardError;
use crate::domain::sample::Sample;
use crate::domain::snapshot::Snapshot;
use serde::Serialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// Fast cadence updating the KPI metrics.
    Metrics,
    /// Slow cadence appending to the time series.
    Series,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Metrics => "metrics",
            Cadence::Series => "series",
        }
    }
}

impl FromStr for Cadence {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metrics" => Ok(Cadence::Metrics),
            "series" => Ok(Cadence::Series),
            other => Err(DashboardError::UnknownCadence(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Published(Arc<Snapshot>),
    /// Applied, but a newer snapshot had already been published.
    Superseded,
    /// The scheduler stopped or restarted while the tick was in flight.
    Stale,
}

#[derive(Debug, Clone, Copy)]
pub struct CadenceConfig {
    pub metrics_interval: Duration,
    pub series_interval: Duration,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            metrics_interval: Duration::from_secs(5),
            series_interval: Duration::from_secs(10),
        }
    }
}

struct Running {
    stop_tx: watch::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

/// Everything a tick needs, cheap to clone into cadence tasks.
#[derive(Clone)]
struct TickContext {
    core: Arc<DashboardCore>,
    publisher: Arc<SnapshotPublisher>,
    metrics_source: Arc<dyn SampleSource>,
    series_source: Arc<dyn SampleSource>,
    generation: Arc<AtomicU64>,
}

impl TickContext {
    fn source(&self, cadence: Cadence) -> &Arc<dyn SampleSource> {
        match cadence {
            Cadence::Metrics => &self.metrics_source,
            Cadence::Series => &self.series_source,
        }
    }

    async fn tick(&self, cadence: Cadence, generation: u64) -> Result<TickOutcome, DashboardError> {
        let source = self.source(cadence);
        let values = source.next_values().await.map_err(DashboardError::Source)?;

        let change = match cadence {
            Cadence::Metrics => CoreChange::Metrics(values),
            Cadence::Series => CoreChange::Sample(Sample::new(source.sample_time(), values)),
        };

        let applied = self.core.apply(change, || self.is_current(generation))?;
        self.publish(applied, generation)
    }

    fn publish(
        &self,
        applied: Option<Arc<Snapshot>>,
        generation: u64,
    ) -> Result<TickOutcome, DashboardError> {
        let Some(snapshot) = applied else {
            return Ok(TickOutcome::Stale);
        };
        if !self.is_current(generation) {
            return Ok(TickOutcome::Stale);
        }

        match self.publisher.publish(snapshot.clone()) {
            Some(_) => Ok(TickOutcome::Published(snapshot)),
            None => Ok(TickOutcome::Superseded),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

pub struct UpdateScheduler {
    ctx: TickContext,
    cadences: CadenceConfig,
    running: Mutex<Option<Running>>,
}

impl UpdateScheduler {
    pub fn new(
        core: Arc<DashboardCore>,
        publisher: Arc<SnapshotPublisher>,
        metrics_source: Arc<dyn SampleSource>,
        series_source: Arc<dyn SampleSource>,
        cadences: CadenceConfig,
    ) -> Self {
        Self {
            ctx: TickContext {
                core,
                publisher,
                metrics_source,
                series_source,
                generation: Arc::new(AtomicU64::new(0)),
            },
            cadences,
            running: Mutex::new(None),
        }
    }

    /// Begin ticking both cadences. Calling it while running is a no-op.
    /// Returns the active generation.
    pub fn start(&self) -> u64 {
        let mut running = self.lock_running();
        if running.is_some() {
            tracing::debug!("Scheduler already running");
            return self.generation();
        }

        let generation = self.ctx.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop_tx, stop_rx) = watch::channel(());

        let tasks = [
            (Cadence::Metrics, self.cadences.metrics_interval),
            (Cadence::Series, self.cadences.series_interval),
        ]
        .into_iter()
        .map(|(cadence, period)| {
            tokio::spawn(run_cadence(
                self.ctx.clone(),
                cadence,
                period,
                generation,
                stop_rx.clone(),
            ))
        })
        .collect();

        *running = Some(Running { stop_tx, tasks });
        tracing::info!(
            "Scheduler started (generation {}, metrics every {:?}, series every {:?})",
            generation,
            self.cadences.metrics_interval,
            self.cadences.series_interval
        );
        generation
    }

    /// Cancel pending ticks. A tick already in flight finishes but its
    /// result is discarded. Returns false if the scheduler was not running.
    pub fn stop(&self) -> bool {
        self.halt().is_some()
    }

    /// Stop and wait for both cadence tasks to exit.
    pub async fn shutdown(&self) {
        if let Some(tasks) = self.halt() {
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::warn!("Cadence task ended abnormally: {}", e);
                }
            }
        }
    }

    fn halt(&self) -> Option<Vec<JoinHandle<()>>> {
        // The generation must move while the slot is still locked, or a
        // concurrent start() could spawn tasks for a generation about to
        // be retired.
        let mut slot = self.lock_running();
        let running = slot.take()?;
        let generation = self.ctx.generation.fetch_add(1, Ordering::SeqCst) + 1;
        drop(slot);

        // Dropping the sender wakes both cadence loops
        drop(running.stop_tx);
        tracing::info!("Scheduler stopped (generation now {})", generation);
        Some(running.tasks)
    }

    /// Run one tick of `cadence` right away, under the current generation.
    pub async fn tick_now(&self, cadence: Cadence) -> Result<TickOutcome, DashboardError> {
        let generation = self.generation();
        self.ctx.tick(cadence, generation).await
    }

    /// Fill the series with `count` samples spaced `spacing` apart and
    /// ending now, then publish one snapshot.
    pub async fn backfill(
        &self,
        count: usize,
        spacing: chrono::Duration,
    ) -> Result<TickOutcome, DashboardError> {
        let generation = self.generation();
        let source = &self.ctx.series_source;
        let end = source.sample_time();

        let timestamp_at = |steps_back: usize| {
            i32::try_from(steps_back)
                .ok()
                .and_then(|steps| spacing.checked_mul(steps))
                .and_then(|offset| end.checked_sub_signed(offset))
                .ok_or(DashboardError::BackfillOutOfRange { count, spacing })
        };
        // The oldest sample is the furthest back; if it fits, all do
        timestamp_at(count.saturating_sub(1))?;

        let mut samples = Vec::with_capacity(count);
        for i in 0..count {
            let values = source.next_values().await.map_err(DashboardError::Source)?;
            samples.push(Sample::new(timestamp_at(count - 1 - i)?, values));
        }

        tracing::debug!("Backfilling {} samples", samples.len());
        let applied = self
            .ctx
            .core
            .apply(CoreChange::Backfill(samples), || self.ctx.is_current(generation))?;
        self.ctx.publish(applied, generation)
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = if self.lock_running().is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        };
        SchedulerStatus {
            state,
            generation: self.generation(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.ctx.generation.load(Ordering::SeqCst)
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.halt();
    }
}

async fn run_cadence(
    ctx: TickContext,
    cadence: Cadence,
    period: Duration,
    generation: u64,
    mut stop_rx: watch::Receiver<()>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop_rx.changed() => break,
        }

        match ctx.tick(cadence, generation).await {
            Ok(TickOutcome::Published(snapshot)) => {
                tracing::debug!("{} tick published snapshot {}", cadence.as_str(), snapshot.sequence);
            }
            Ok(TickOutcome::Superseded) => {
                tracing::debug!("{} tick superseded by a newer snapshot", cadence.as_str());
            }
            Ok(TickOutcome::Stale) => break,
            Err(e) => {
                tracing::warn!("{} tick aborted: {}", cadence.as_str(), e);
            }
        }
    }

    tracing::debug!("{} cadence exited (generation {})", cadence.as_str(), generation);
}
