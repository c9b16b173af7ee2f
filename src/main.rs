// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;

use crate::application::dashboard_core::DashboardCore;
use crate::application::filter_state::FilterState;
use crate::application::publisher::SnapshotPublisher;
use crate::application::scheduler::UpdateScheduler;
use crate::domain::metric::MetricSet;
use crate::domain::time_series::TimeSeriesBuffer;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::random_source::{BoundedRandomSource, RandomWalkSource};
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_filter_domains, get_filters, get_snapshot, health_check, put_filters, scheduler_status,
    start_scheduler, stop_scheduler, stream_snapshots, tick_cadence,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = load_dashboard_config().context("Failed to load config/dashboard")?;

    // Core state (domain + application layers)
    let series = TimeSeriesBuffer::new(
        config.scheduler.series_capacity,
        config.series.iter().map(|s| s.name.clone()),
    )?;
    let metrics = MetricSet::new(config.metric_specs())?;
    let core = Arc::new(DashboardCore::new(series, metrics));
    let publisher = Arc::new(SnapshotPublisher::new());
    let filters = Arc::new(FilterState::default());

    // Synthetic feeds (infrastructure layer)
    let seed = config.scheduler.seed;
    let metrics_source = Arc::new(RandomWalkSource::new(&config.metrics, seed));
    let series_source = Arc::new(BoundedRandomSource::new(
        config.series.clone(),
        seed.map(|s| s.wrapping_add(1)),
    ));

    let scheduler = Arc::new(UpdateScheduler::new(
        core,
        publisher.clone(),
        metrics_source,
        series_source,
        config.cadences(),
    ));

    // Pre-populate the chart window before the first series tick
    let spacing = chrono::Duration::try_seconds(config.scheduler.backfill_spacing_secs)
        .context("backfill_spacing_secs is out of range")?;
    scheduler
        .backfill(config.scheduler.series_capacity, spacing)
        .await
        .context("Failed to backfill time series")?;
    scheduler.start();

    let state = Arc::new(AppState {
        publisher,
        filters,
        scheduler: scheduler.clone(),
        stream_buffer: config.scheduler.stream_buffer,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/snapshot", get(get_snapshot))
        .route("/stream", get(stream_snapshots))
        .route("/filters", get(get_filters).put(put_filters))
        .route("/filters/domains", get(get_filter_domains))
        .route("/scheduler", get(scheduler_status))
        .route("/scheduler/start", post(start_scheduler))
        .route("/scheduler/stop", post(stop_scheduler))
        .route("/scheduler/tick/:cadence", post(tick_cadence))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.server.listen))?;
    tracing::info!("Starting ops-dashboard service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    scheduler.shutdown().await;
    tracing::info!("ops-dashboard stopped");

    Ok(())
}
