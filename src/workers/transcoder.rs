use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::redis::client::RedisService;
use crate::transcoding::job::{JobRunner, RenditionJob};
use crate::transcoding::queue::{Enqueued, JobQueue, QueueError};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::BasicAckOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const TRANSCODE_QUEUE: &str = "transcoding_tasks";

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Publishes rendition jobs to RabbitMQ. A Redis lease per job key keeps at
/// most one job per (record, profile) in flight across all producers.
pub struct RabbitJobQueue {
    mq: RabbitMqService,
    leases: RedisService,
    lease_ttl_secs: u64,
}

impl RabbitJobQueue {
    pub fn new(mq: RabbitMqService, leases: RedisService, lease_ttl_secs: u64) -> Self {
        Self {
            mq,
            leases,
            lease_ttl_secs,
        }
    }

    async fn release(&self, key: &str) {
        if let Err(e) = self.leases.release_lease(key).await {
            warn!("Failed to release job lease {}: {}", key, e);
        }
    }
}

#[async_trait]
impl JobQueue for RabbitJobQueue {
    async fn enqueue(&self, job: RenditionJob) -> Result<Enqueued, QueueError> {
        let key = job.key().to_string();
        if !self.leases.acquire_lease(&key, self.lease_ttl_secs).await? {
            debug!(%key, "Job already in flight");
            return Ok(Enqueued::AlreadyInFlight);
        }

        let payload = match serde_json::to_vec(&job) {
            Ok(payload) => payload,
            Err(e) => {
                self.release(&key).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.mq.publish(TRANSCODE_QUEUE, &payload).await {
            self.release(&key).await;
            return Err(QueueError::Publish(e.to_string()));
        }

        debug!(%key, "Job published to '{}'", TRANSCODE_QUEUE);
        Ok(Enqueued::Accepted)
    }
}

/// Consumes `transcoding_tasks` forever, reconnecting when the broker drops us.
pub async fn start_transcoder_worker(
    mq: RabbitMqService,
    runner: Arc<JobRunner>,
    leases: RedisService,
    concurrency: u16,
) {
    info!("🎥 Starting Transcoder Worker...");

    loop {
        if let Err(e) = consume(&mq, &runner, &leases, concurrency).await {
            error!("Transcoder worker stopped: {}", e);
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
        if let Err(e) = mq.reconnect().await {
            error!("RabbitMQ reconnect failed: {}", e);
        }
    }
}

async fn consume(
    mq: &RabbitMqService,
    runner: &Arc<JobRunner>,
    leases: &RedisService,
    concurrency: u16,
) -> anyhow::Result<()> {
    // Prefetch bounds how many encoder processes this node runs at once.
    let mut consumer = mq
        .consumer(TRANSCODE_QUEUE, "transcoder_worker", concurrency)
        .await?;

    info!("🎥 Transcoder Worker listening on '{}'", TRANSCODE_QUEUE);

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("Failed to receive delivery: {}", e);
                continue;
            }
        };

        let runner = runner.clone();
        let leases = leases.clone();
        tokio::spawn(async move {
            match serde_json::from_slice::<RenditionJob>(&delivery.data) {
                Ok(job) => {
                    runner.run(&job).await;
                    let key = job.key().to_string();
                    if let Err(e) = leases.release_lease(&key).await {
                        warn!("Failed to release job lease {}: {}", key, e);
                    }
                }
                // Unreadable payloads are dropped; no automatic retry.
                Err(e) => error!("❌ Failed to parse job: {}", e),
            }

            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                error!("Failed to ack message: {}", e);
            }
        });
    }

    warn!("Transcoder consumer stream ended");
    Ok(())
}
