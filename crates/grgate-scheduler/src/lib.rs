//! Job processing for GRGate.
//!
//! A [`Job`] gates the draft releases of one repository. Jobs are queued on
//! a [`WorkerPool`] which runs a fixed number of them at once.

pub mod dashboard;
pub mod error;
pub mod job;
pub mod pool;
pub mod release_note;
pub mod worker;

pub use dashboard::{DashboardData, format_execution_time, render_dashboard, upsert_dashboard};
pub use error::{SchedulerError, SchedulerResult};
pub use job::{Job, JobSummary};
pub use pool::{JOB_QUEUE_CAPACITY, WorkerPool};
pub use release_note::{MARKER_END, MARKER_START, ReleaseNoteData, render_release_note, strip_report};
pub use worker::Worker;
