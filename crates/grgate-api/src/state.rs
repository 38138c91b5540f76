//! Application state.

use std::sync::Arc;

use grgate_config::MainConfig;
use grgate_core::Platform;
use grgate_scheduler::Job;
use tokio::sync::mpsc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub platform: Arc<dyn Platform>,
    pub config: Arc<MainConfig>,
    /// Sender side of the worker pool job queue.
    pub job_queue: mpsc::Sender<Job>,
}

impl AppState {
    pub fn new(
        platform: Arc<dyn Platform>,
        config: Arc<MainConfig>,
        job_queue: mpsc::Sender<Job>,
    ) -> Self {
        Self {
            platform,
            config,
            job_queue,
        }
    }
}
