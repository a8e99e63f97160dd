use super::job::RenditionJob;
use super::profile::{PROFILES, Resolution};
use super::queue::{Enqueued, JobQueue};
use crate::infrastructure::storage::local::MediaStorage;
use crate::modules::content::model::Video;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DispatchReport {
    #[schema(value_type = Vec<String>)]
    pub enqueued: Vec<Resolution>,
    #[schema(value_type = Vec<String>)]
    pub already_in_flight: Vec<Resolution>,
    #[schema(value_type = Vec<String>)]
    pub failed: Vec<Resolution>,
}

/// Reacts to video lifecycle events: creation fans out rendition jobs,
/// deletion clears every file the record owned.
pub struct UploadEventDispatcher {
    queue: Arc<dyn JobQueue>,
    storage: MediaStorage,
}

impl UploadEventDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>, storage: MediaStorage) -> Self {
        Self { queue, storage }
    }

    /// Enqueues one job per profile and returns without waiting for any of them.
    pub async fn on_video_created(&self, video: &Video) -> DispatchReport {
        self.dispatch(video, &Resolution::ALL).await
    }

    /// Re-enqueues only the profiles whose slot is still empty.
    pub async fn requeue_missing(&self, video: &Video) -> DispatchReport {
        self.dispatch(video, &video.missing_renditions()).await
    }

    async fn dispatch(&self, video: &Video, resolutions: &[Resolution]) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(source) = video.video_file.as_deref() else {
            warn!(video_id = %video.id, "Video has no original file, nothing to transcode");
            return report;
        };

        for resolution in resolutions.iter().copied() {
            let job = RenditionJob::new(video.id, source, resolution);
            match self.queue.enqueue(job).await {
                Ok(Enqueued::Accepted) => report.enqueued.push(resolution),
                Ok(Enqueued::AlreadyInFlight) => report.already_in_flight.push(resolution),
                Err(e) => {
                    error!(
                        video_id = %video.id,
                        profile = %resolution,
                        source = %source,
                        "❌ Failed to enqueue rendition job: {}",
                        e
                    );
                    report.failed.push(resolution);
                }
            }
        }

        info!(video_id = %video.id, "Dispatched rendition jobs: {:?}", report);
        report
    }

    /// Removes the original, every populated rendition, and any rendition that
    /// landed on storage without being attached. Returns the removed references.
    pub async fn on_video_deleted(&self, video: &Video) -> Vec<String> {
        let mut targets = BTreeSet::new();
        if let Some(original) = video.video_file.as_deref() {
            targets.insert(original.to_string());
            for profile in PROFILES.iter() {
                targets.insert(profile.derived_reference(original));
            }
        }
        for resolution in Resolution::ALL {
            if let Some(reference) = video.rendition(resolution) {
                targets.insert(reference.to_string());
            }
        }

        let mut removed = Vec::new();
        for reference in targets {
            match self.storage.remove(&reference).await {
                Ok(true) => removed.push(reference),
                Ok(false) => {}
                Err(e) => error!(video_id = %video.id, "Failed to remove {}: {}", reference, e),
            }
        }

        info!(video_id = %video.id, "🗑️ Removed {} file(s) for deleted video", removed.len());
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::content::model::NewVideo;
    use crate::modules::content::repository::VideoStore;
    use crate::modules::content::repository::memory::MemoryVideoStore;
    use crate::transcoding::job::JobRunner;
    use crate::transcoding::job::testing::FakeEncoder;
    use crate::transcoding::queue::{InProcessQueue, QueueError};
    use crate::transcoding::reconcile::Reconciler;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records jobs instead of running them.
    #[derive(Default)]
    struct RecordingQueue {
        jobs: Mutex<Vec<RenditionJob>>,
    }

    #[async_trait]
    impl JobQueue for RecordingQueue {
        async fn enqueue(&self, job: RenditionJob) -> Result<Enqueued, QueueError> {
            self.jobs.lock().unwrap().push(job);
            Ok(Enqueued::Accepted)
        }
    }

    struct BrokenQueue;

    #[async_trait]
    impl JobQueue for BrokenQueue {
        async fn enqueue(&self, _job: RenditionJob) -> Result<Enqueued, QueueError> {
            Err(QueueError::Publish("broker unreachable".into()))
        }
    }

    async fn stored_movie(dir: &tempfile::TempDir, store: &MemoryVideoStore) -> Video {
        std::fs::write(dir.path().join("videos/movie.mp4"), b"src").unwrap();
        store
            .insert(NewVideo {
                title: "Movie".into(),
                description: "A test video description.".into(),
                category: "Test Category".into(),
                video_file: Some("videos/movie.mp4".into()),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_enqueues_one_job_per_profile() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path()).await.unwrap();
        let store = MemoryVideoStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let dispatcher = UploadEventDispatcher::new(queue.clone(), storage);
        let video = stored_movie(&dir, &store).await;

        let report = dispatcher.on_video_created(&video).await;

        assert_eq!(report.enqueued, vec![Resolution::P480, Resolution::P720]);
        let jobs = queue.jobs.lock().unwrap();
        assert_eq!(
            *jobs,
            vec![
                RenditionJob::new(video.id, "videos/movie.mp4", Resolution::P480),
                RenditionJob::new(video.id, "videos/movie.mp4", Resolution::P720),
            ]
        );
    }

    #[tokio::test]
    async fn enqueue_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path()).await.unwrap();
        let store = MemoryVideoStore::new();
        let dispatcher = UploadEventDispatcher::new(Arc::new(BrokenQueue), storage);
        let video = stored_movie(&dir, &store).await;

        let report = dispatcher.on_video_created(&video).await;
        assert!(report.enqueued.is_empty());
        assert_eq!(report.failed, vec![Resolution::P480, Resolution::P720]);
    }

    #[tokio::test]
    async fn record_without_file_enqueues_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path()).await.unwrap();
        let queue = Arc::new(RecordingQueue::default());
        let dispatcher = UploadEventDispatcher::new(queue.clone(), storage);
        let video = MemoryVideoStore::new()
            .insert(NewVideo {
                title: "Empty".into(),
                description: String::new(),
                category: "Test".into(),
                video_file: None,
            })
            .await
            .unwrap();

        assert_eq!(dispatcher.on_video_created(&video).await, DispatchReport::default());
        assert!(queue.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn requeue_only_targets_empty_slots() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path()).await.unwrap();
        let store = MemoryVideoStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let dispatcher = UploadEventDispatcher::new(queue.clone(), storage);
        let mut video = stored_movie(&dir, &store).await;
        video.video_720p = Some("videos/movie_720p.mp4".into());

        let report = dispatcher.requeue_missing(&video).await;
        assert_eq!(report.enqueued, vec![Resolution::P480]);
    }

    #[tokio::test]
    async fn delete_removes_original_and_renditions() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path()).await.unwrap();
        let store = MemoryVideoStore::new();
        let dispatcher = UploadEventDispatcher::new(Arc::new(RecordingQueue::default()), storage);
        let mut video = stored_movie(&dir, &store).await;
        std::fs::write(dir.path().join("videos/movie_480p.mp4"), b"480").unwrap();
        std::fs::write(dir.path().join("videos/movie_720p.mp4"), b"720").unwrap();
        std::fs::write(dir.path().join("videos/other.mp4"), b"keep").unwrap();
        video.video_480p = Some("videos/movie_480p.mp4".into());

        let removed = dispatcher.on_video_deleted(&video).await;

        assert_eq!(removed.len(), 3);
        assert!(!dir.path().join("videos/movie.mp4").exists());
        assert!(!dir.path().join("videos/movie_480p.mp4").exists());
        // Landed on disk but never attached.
        assert!(!dir.path().join("videos/movie_720p.mp4").exists());
        assert!(dir.path().join("videos/other.mp4").exists());
    }

    #[tokio::test]
    async fn delete_with_missing_files_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path()).await.unwrap();
        let store = MemoryVideoStore::new();
        let dispatcher = UploadEventDispatcher::new(Arc::new(RecordingQueue::default()), storage);
        let video = stored_movie(&dir, &store).await;
        std::fs::remove_file(dir.path().join("videos/movie.mp4")).unwrap();

        assert!(dispatcher.on_video_deleted(&video).await.is_empty());
    }

    // End-to-end through the in-process queue and the in-memory store.

    struct Pipeline {
        dir: tempfile::TempDir,
        store: Arc<MemoryVideoStore>,
        queue: Arc<InProcessQueue>,
        dispatcher: UploadEventDispatcher,
        reconciler: Arc<Reconciler>,
    }

    async fn pipeline(encoder: FakeEncoder) -> Pipeline {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path()).await.unwrap();
        let store = Arc::new(MemoryVideoStore::new());
        let reconciler = Arc::new(Reconciler::new(store.clone(), storage.clone()));
        let runner = Arc::new(JobRunner::new(Arc::new(encoder), reconciler.clone(), storage.clone()));
        let queue = Arc::new(InProcessQueue::start(runner, 2));
        let dispatcher = UploadEventDispatcher::new(queue.clone(), storage);
        Pipeline {
            dir,
            store,
            queue,
            dispatcher,
            reconciler,
        }
    }

    async fn drain(queue: Arc<InProcessQueue>) {
        match Arc::try_unwrap(queue) {
            Ok(queue) => queue.shutdown().await,
            Err(_) => panic!("queue still shared"),
        }
    }

    #[tokio::test]
    async fn upload_produces_both_renditions() {
        let p = pipeline(FakeEncoder::new()).await;
        let video = stored_movie(&p.dir, &p.store).await;

        let report = p.dispatcher.on_video_created(&video).await;
        assert_eq!(report.enqueued.len(), 2);
        drop(p.dispatcher);
        drain(p.queue).await;

        let video = p.store.fetch(video.id).await.unwrap().unwrap();
        assert_eq!(video.video_480p.as_deref(), Some("videos/movie_480p.mp4"));
        assert_eq!(video.video_720p.as_deref(), Some("videos/movie_720p.mp4"));

        let again = p.reconciler.reconcile(video.id).await.unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(p.store.fetch(video.id).await.unwrap().unwrap(), video);
    }

    #[tokio::test]
    async fn failed_480p_leaves_partial_completion() {
        let p = pipeline(FakeEncoder::failing(&[Resolution::P480])).await;
        let video = stored_movie(&p.dir, &p.store).await;

        p.dispatcher.on_video_created(&video).await;
        drop(p.dispatcher);
        drain(p.queue).await;

        let video = p.store.fetch(video.id).await.unwrap().unwrap();
        assert_eq!(video.video_480p, None);
        assert_eq!(video.video_720p.as_deref(), Some("videos/movie_720p.mp4"));
        assert!(!p.dir.path().join("videos/movie_480p.mp4").exists());
    }

    #[tokio::test]
    async fn reconcile_after_delete_is_noop() {
        let p = pipeline(FakeEncoder::new()).await;
        let video = stored_movie(&p.dir, &p.store).await;
        let deleted = p.store.delete(video.id).await.unwrap().unwrap();
        p.dispatcher.on_video_deleted(&deleted).await;

        assert!(p.reconciler.reconcile(video.id).await.unwrap().is_empty());
        assert!(p.store.fetch(video.id).await.unwrap().is_none());
        drop(p.dispatcher);
        drain(p.queue).await;
    }
}
