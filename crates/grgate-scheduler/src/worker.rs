//! Worker that processes jobs handed over by the pool.

use metrics::counter;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::job::Job;

/// Resolve once cancellation is requested.
/// A dropped sender counts as cancellation.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

/// A worker processes one job at a time.
///
/// While idle it registers its private slot on the shared worker queue and
/// waits for the dispatcher to put a job in it.
pub struct Worker {
    id: usize,
    slot: mpsc::Sender<Job>,
    jobs: mpsc::Receiver<Job>,
    worker_queue: mpsc::Sender<mpsc::Sender<Job>>,
    cancel: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        id: usize,
        worker_queue: mpsc::Sender<mpsc::Sender<Job>>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let (slot, jobs) = mpsc::channel(1);
        Self {
            id,
            slot,
            jobs,
            worker_queue,
            cancel,
        }
    }

    /// Run the worker loop until cancelled. A job in progress is finished first.
    pub async fn run(mut self) {
        info!(worker_id = self.id, "Starting worker");

        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => break,
                registered = self.worker_queue.send(self.slot.clone()) => {
                    if registered.is_err() {
                        break;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => break,
                job = self.jobs.recv() => match job {
                    Some(job) => self.handle(job).await,
                    None => break,
                },
            }
        }

        info!(worker_id = self.id, "Stopping worker");
    }

    async fn handle(&self, job: Job) {
        info!(worker_id = self.id, job_id = %job.id, owner = %job.owner, repository = %job.repository, "Picked up job");

        counter!("grgate_jobs_processed_total").increment(1);
        match job.process().await {
            Ok(summary) => {
                counter!("grgate_releases_published_total").increment(summary.published.len() as u64);
                info!(
                    worker_id = self.id,
                    job_id = %job.id,
                    owner = %job.owner,
                    repository = %job.repository,
                    published = ?summary.published,
                    pending = ?summary.pending,
                    "Job done"
                );
            }
            Err(e) => {
                counter!("grgate_jobs_failed_total").increment(1);
                error!(
                    worker_id = self.id,
                    job_id = %job.id,
                    owner = %job.owner,
                    repository = %job.repository,
                    error = %e,
                    "Job failed"
                );
            }
        }
    }
}
