// HTTP request handlers
use crate::application::scheduler::{Cadence, SchedulerStatus, TickOutcome};
use crate::domain::error::DashboardError;
use crate::domain::filter::{FilterDomains, FilterRequest, FilterSelection};
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::infrastructure::snapshot_stream::snapshot_stream;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Optional per-request filter override; missing fields fall back to the
/// active selection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub date_range: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
}

impl FilterQuery {
    fn resolve(&self, active: FilterSelection) -> Result<FilterSelection, DashboardError> {
        let request = FilterRequest::new(
            self.date_range.as_deref().unwrap_or(active.date_range.as_str()),
            self.category.as_deref().unwrap_or(active.category.as_str()),
            self.region.as_deref().unwrap_or(active.region.as_str()),
        );
        FilterSelection::try_from(&request)
    }
}

#[derive(Debug, Serialize)]
pub struct TickReport {
    pub outcome: &'static str,
    pub sequence: Option<u64>,
}

impl From<TickOutcome> for TickReport {
    fn from(outcome: TickOutcome) -> Self {
        match outcome {
            TickOutcome::Published(snapshot) => Self {
                outcome: "published",
                sequence: Some(snapshot.sequence),
            },
            TickOutcome::Superseded => Self {
                outcome: "superseded",
                sequence: None,
            },
            TickOutcome::Stale => Self {
                outcome: "stale",
                sequence: None,
            },
        }
    }
}

fn error_response(status: StatusCode, error: DashboardError) -> Response {
    (status, Json(serde_json::json!({ "error": error.to_string() }))).into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Latest snapshot rendered through the active (or overriding) filters
pub async fn get_snapshot(
    Query(query): Query<FilterQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let filters = match query.resolve(state.filters.current()) {
        Ok(filters) => filters,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let Some(snapshot) = state.publisher.latest_snapshot() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let view = snapshot.view(filters);
    match json_response(StatusCode::OK, &view, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

pub async fn get_filters(State(state): State<Arc<AppState>>) -> Json<FilterSelection> {
    Json(state.filters.current())
}

pub async fn put_filters(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FilterRequest>,
) -> Response {
    match state.filters.set(&request) {
        Ok(selection) => Json(selection).into_response(),
        Err(e) => {
            tracing::debug!("Rejected filter update: {}", e);
            error_response(StatusCode::BAD_REQUEST, e)
        }
    }
}

pub async fn get_filter_domains(State(state): State<Arc<AppState>>) -> Json<FilterDomains> {
    Json(state.filters.domains())
}

/// Stream snapshots as they are published (progressive updates)
pub async fn stream_snapshots(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    snapshot_stream(
        state.publisher.clone(),
        state.filters.clone(),
        state.stream_buffer,
        accepts_brotli(&headers),
    )
}

pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

pub async fn start_scheduler(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    state.scheduler.start();
    Json(state.scheduler.status())
}

pub async fn stop_scheduler(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    state.scheduler.stop();
    Json(state.scheduler.status())
}

/// Run one tick of a cadence immediately
pub async fn tick_cadence(
    Path(cadence): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let cadence = match cadence.parse::<Cadence>() {
        Ok(cadence) => cadence,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    match state.scheduler.tick_now(cadence).await {
        Ok(outcome) => Json(TickReport::from(outcome)).into_response(),
        Err(e) => {
            tracing::warn!("Manual {} tick failed: {}", cadence.as_str(), e);
            error_response(StatusCode::CONFLICT, e)
        }
    }
}
