use super::job::{JobKey, JobRunner, RenditionJob};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Accepted,
    /// A job with the same key is queued or running; nothing was added.
    AlreadyInFlight,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
    #[error("failed to serialize job: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to publish job: {0}")]
    Publish(String),
    #[error("failed to take job lease: {0}")]
    Lease(#[from] redis::RedisError),
}

/// Accepts rendition jobs for execution off the request path.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: RenditionJob) -> Result<Enqueued, QueueError>;
}

type InFlight = Arc<Mutex<HashSet<JobKey>>>;

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashSet<JobKey>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Worker pool inside this process, fed through an unbounded channel.
pub struct InProcessQueue {
    sender: async_channel::Sender<RenditionJob>,
    in_flight: InFlight,
    workers: Vec<JoinHandle<()>>,
}

impl InProcessQueue {
    /// Spawns `workers` tasks on the current runtime.
    pub fn start(runner: Arc<JobRunner>, workers: usize) -> Self {
        let (sender, receiver) = async_channel::unbounded::<RenditionJob>();
        let in_flight: InFlight = Arc::default();
        let workers = workers.max(1);

        let handles = (0..workers)
            .map(|worker| {
                let receiver = receiver.clone();
                let runner = runner.clone();
                let in_flight = in_flight.clone();
                tokio::spawn(async move {
                    debug!(worker, "Transcode worker started");
                    while let Ok(job) = receiver.recv().await {
                        let key = job.key();
                        let runner = runner.clone();
                        // A panicking job must not take the worker down with it.
                        let task = tokio::spawn(async move { runner.run(&job).await });
                        if let Err(e) = task.await {
                            error!(%key, "❌ Rendition job aborted: {}", e);
                        }
                        lock(&in_flight).remove(&key);
                    }
                    debug!(worker, "Transcode worker stopped");
                })
            })
            .collect();

        info!("🎥 In-process transcode queue running with {} worker(s)", workers);
        Self {
            sender,
            in_flight,
            workers: handles,
        }
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Stops accepting jobs. Already queued jobs still run.
    pub fn close(&self) {
        self.sender.close();
    }

    /// Closes the queue, lets the workers drain what is queued, and waits for them.
    pub async fn shutdown(self) {
        self.close();
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("Transcode worker ended abnormally: {}", e);
            }
        }
    }
}

#[async_trait]
impl JobQueue for InProcessQueue {
    async fn enqueue(&self, job: RenditionJob) -> Result<Enqueued, QueueError> {
        let key = job.key();
        if !lock(&self.in_flight).insert(key) {
            debug!(%key, "Job already in flight");
            return Ok(Enqueued::AlreadyInFlight);
        }

        if self.sender.send(job).await.is_err() {
            lock(&self.in_flight).remove(&key);
            return Err(QueueError::Closed);
        }

        debug!(%key, "Job enqueued");
        Ok(Enqueued::Accepted)
    }
}
