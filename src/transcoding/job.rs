use super::encoder::{EncodeError, Encoder};
use super::profile::Resolution;
use super::reconcile::{ReconcileError, ReconcileOutcome, Reconciler, RenditionCompleted};
use crate::infrastructure::storage::local::{MediaStorage, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One rendition of one record. Travels through the queue as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionJob {
    pub video_id: Uuid,
    /// Original upload, relative to the media root.
    pub source: String,
    pub resolution: Resolution,
}

impl RenditionJob {
    pub fn new(video_id: Uuid, source: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            video_id,
            source: source.into(),
            resolution,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey {
            video_id: self.video_id,
            resolution: self.resolution,
        }
    }
}

/// Deduplication key: at most one job per (record, profile) is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub video_id: Uuid,
    pub resolution: Resolution,
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rendition:{}:{}", self.video_id, self.resolution)
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodeError),
    #[error("source {0} is no longer on storage")]
    SourceMissing(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Worker-side execution of rendition jobs.
pub struct JobRunner {
    encoder: Arc<dyn Encoder>,
    reconciler: Arc<Reconciler>,
    storage: MediaStorage,
}

impl JobRunner {
    pub fn new(encoder: Arc<dyn Encoder>, reconciler: Arc<Reconciler>, storage: MediaStorage) -> Self {
        Self {
            encoder,
            reconciler,
            storage,
        }
    }

    /// Encode, then hand the result to the reconciler. Nothing is reconciled
    /// when encoding fails.
    pub async fn execute(&self, job: &RenditionJob) -> Result<ReconcileOutcome, JobError> {
        let source = self.storage.resolve(&job.source)?;
        if !self.storage.exists(&job.source).await? {
            return Err(JobError::SourceMissing(job.source.clone()));
        }

        let output = self.encoder.encode(&source, job.resolution.profile()).await?;

        let event = RenditionCompleted {
            video_id: job.video_id,
            resolution: job.resolution,
            output,
        };
        Ok(self.reconciler.on_completed(&event).await?)
    }

    /// Runs the job and reports the result. Failures stay local to this job.
    pub async fn run(&self, job: &RenditionJob) -> Option<ReconcileOutcome> {
        info!(video_id = %job.video_id, profile = %job.resolution, "📦 Processing rendition job");

        match self.execute(job).await {
            Ok(outcome) => {
                info!(
                    video_id = %job.video_id,
                    profile = %job.resolution,
                    "✅ Rendition job finished: {:?}",
                    outcome
                );
                Some(outcome)
            }
            Err(JobError::SourceMissing(source)) => {
                warn!(
                    video_id = %job.video_id,
                    profile = %job.resolution,
                    source = %source,
                    "Skipping rendition job, source removed"
                );
                None
            }
            Err(e) => {
                error!(
                    video_id = %job.video_id,
                    profile = %job.resolution,
                    source = %job.source,
                    "❌ Rendition job failed: {}",
                    e
                );
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeEncoder;
    use super::*;
    use crate::modules::content::model::NewVideo;
    use crate::modules::content::repository::VideoStore;
    use crate::modules::content::repository::memory::MemoryVideoStore;

    async fn setup(encoder: FakeEncoder) -> (tempfile::TempDir, Arc<MemoryVideoStore>, JobRunner, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path()).await.unwrap();
        std::fs::write(storage.resolve("videos/movie.mp4").unwrap(), b"src").unwrap();
        let store = Arc::new(MemoryVideoStore::new());
        let id = store
            .insert(NewVideo {
                title: "Movie".into(),
                description: String::new(),
                category: "Drama".into(),
                video_file: Some("videos/movie.mp4".into()),
            })
            .await
            .unwrap()
            .id;
        let reconciler = Arc::new(Reconciler::new(store.clone(), storage.clone()));
        let runner = JobRunner::new(Arc::new(encoder), reconciler, storage);
        (dir, store, runner, id)
    }

    #[tokio::test]
    async fn execute_encodes_and_attaches() {
        let (dir, store, runner, id) = setup(FakeEncoder::new()).await;

        let outcome = runner
            .execute(&RenditionJob::new(id, "videos/movie.mp4", Resolution::P720))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Attached);
        assert!(dir.path().join("videos/movie_720p.mp4").exists());
        let video = store.fetch(id).await.unwrap().unwrap();
        assert_eq!(video.video_720p.as_deref(), Some("videos/movie_720p.mp4"));
    }

    #[tokio::test]
    async fn execute_twice_is_idempotent() {
        let (_dir, store, runner, id) = setup(FakeEncoder::new()).await;
        let job = RenditionJob::new(id, "videos/movie.mp4", Resolution::P480);

        assert_eq!(runner.execute(&job).await.unwrap(), ReconcileOutcome::Attached);
        assert_eq!(runner.execute(&job).await.unwrap(), ReconcileOutcome::AlreadyPopulated);
        let video = store.fetch(id).await.unwrap().unwrap();
        assert_eq!(video.video_480p.as_deref(), Some("videos/movie_480p.mp4"));
    }

    #[tokio::test]
    async fn encoding_failure_leaves_slot_empty() {
        let (_dir, store, runner, id) = setup(FakeEncoder::failing(&[Resolution::P480])).await;
        let job = RenditionJob::new(id, "videos/movie.mp4", Resolution::P480);

        let err = runner.execute(&job).await.unwrap_err();
        assert!(matches!(err, JobError::Encoding(EncodeError::NonZeroExit { .. })));
        assert_eq!(runner.run(&job).await, None);
        assert_eq!(store.fetch(id).await.unwrap().unwrap().video_480p, None);
    }

    #[tokio::test]
    async fn missing_source_skips_encoder() {
        let (dir, _store, runner, id) = setup(FakeEncoder::new()).await;
        std::fs::remove_file(dir.path().join("videos/movie.mp4")).unwrap();

        let err = runner
            .execute(&RenditionJob::new(id, "videos/movie.mp4", Resolution::P480))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::SourceMissing(_)));
    }

    #[test]
    fn job_round_trips_as_json() {
        let id = Uuid::new_v4();
        let job = RenditionJob::new(id, "videos/movie.mp4", Resolution::P720);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["resolution"], "720p");
        assert_eq!(serde_json::from_value::<RenditionJob>(json).unwrap(), job);
        assert_eq!(job.key().to_string(), format!("rendition:{}:720p", id));
    }
}
