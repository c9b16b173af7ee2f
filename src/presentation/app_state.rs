// Application state for HTTP handlers
use crate::application::filter_state::FilterState;
use crate::application::publisher::SnapshotPublisher;
use crate::application::scheduler::UpdateScheduler;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<SnapshotPublisher>,
    pub filters: Arc<FilterState>,
    pub scheduler: Arc<UpdateScheduler>,
    pub stream_buffer: usize,
}
