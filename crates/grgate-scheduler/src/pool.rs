//! Fixed-size worker pool fed by a bounded job queue.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::job::Job;
use crate::worker::{Worker, cancelled};

/// Jobs that can wait for a worker before producers see back-pressure.
pub const JOB_QUEUE_CAPACITY: usize = 100;

type Slot = mpsc::Sender<Job>;

/// Runs at most `size` jobs at once.
pub struct WorkerPool {
    workers: Vec<Worker>,
    worker_queue: mpsc::Receiver<Slot>,
    job_tx: mpsc::Sender<Job>,
    job_rx: mpsc::Receiver<Job>,
    cancel: watch::Receiver<bool>,
}

impl WorkerPool {
    /// Create a pool of `size` workers (at least one) stopped by `cancel`.
    pub fn new(size: usize, cancel: watch::Receiver<bool>) -> Self {
        let size = size.max(1);
        let (queue_tx, queue_rx) = mpsc::channel(size);
        let workers = (0..size)
            .map(|id| Worker::new(id, queue_tx.clone(), cancel.clone()))
            .collect();
        let (job_tx, job_rx) = mpsc::channel(JOB_QUEUE_CAPACITY);

        Self {
            workers,
            worker_queue: queue_rx,
            job_tx,
            job_rx,
            cancel,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Sender side of the job queue. Producers should `try_send` and treat
    /// a full queue as back-pressure.
    pub fn job_queue(&self) -> mpsc::Sender<Job> {
        self.job_tx.clone()
    }

    /// Spawn the workers and the dispatcher, returning their handles.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        info!(workers = self.workers.len(), "Starting worker pool");

        let mut handles: Vec<_> = self
            .workers
            .into_iter()
            .map(|worker| tokio::spawn(worker.run()))
            .collect();
        handles.push(tokio::spawn(dispatch(
            self.job_rx,
            self.worker_queue,
            self.cancel,
        )));

        handles
    }
}

/// Hand queued jobs to idle workers.
///
/// An idle worker is claimed before a job is taken off the queue, so jobs
/// only leave the bounded queue when a worker can start them right away.
async fn dispatch(
    mut jobs: mpsc::Receiver<Job>,
    mut worker_queue: mpsc::Receiver<Slot>,
    mut cancel: watch::Receiver<bool>,
) {
    // Job taken for a worker that stopped before receiving it.
    let mut held: Option<Job> = None;

    loop {
        let slot = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            slot = worker_queue.recv() => match slot {
                Some(slot) => slot,
                None => {
                    warn!("No worker left");
                    break;
                }
            },
        };

        let job = match held.take() {
            Some(job) => job,
            None => tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            },
        };

        debug!(job_id = %job.id, owner = %job.owner, repository = %job.repository, "Dispatching job");
        if let Err(mpsc::error::SendError(job)) = slot.send(job).await {
            held = Some(job);
        }
    }

    if let Some(job) = held {
        warn!(job_id = %job.id, owner = %job.owner, repository = %job.repository, "Dropping undispatched job");
    }
    info!("Stopping dispatcher");
}
