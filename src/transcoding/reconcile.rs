use super::profile::{PROFILES, Resolution};
use crate::infrastructure::storage::local::{MediaStorage, StorageError};
use crate::modules::content::cache::CatalogCache;
use crate::modules::content::repository::{AttachOutcome, StoreError, VideoStore};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Posted by a job once its rendition is on storage.
#[derive(Debug, Clone)]
pub struct RenditionCompleted {
    pub video_id: Uuid,
    pub resolution: Resolution,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Attached,
    AlreadyPopulated,
    /// The record went away while the job was running.
    RecordNotFound,
    /// No derived file on storage for this profile yet.
    MissingArtifact,
}

impl From<AttachOutcome> for ReconcileOutcome {
    fn from(outcome: AttachOutcome) -> Self {
        match outcome {
            AttachOutcome::Attached => ReconcileOutcome::Attached,
            AttachOutcome::AlreadyPopulated => ReconcileOutcome::AlreadyPopulated,
            AttachOutcome::RecordNotFound => ReconcileOutcome::RecordNotFound,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("rendition {0} lies outside the media root")]
    OutsideMediaRoot(PathBuf),
}

/// Attaches finished renditions to their records, at most once per slot.
pub struct Reconciler {
    store: Arc<dyn VideoStore>,
    storage: MediaStorage,
    cache: Option<CatalogCache>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn VideoStore>, storage: MediaStorage) -> Self {
        Self {
            store,
            storage,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: CatalogCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn on_completed(&self, event: &RenditionCompleted) -> Result<ReconcileOutcome, ReconcileError> {
        let reference = self
            .storage
            .reference_for(&event.output)
            .ok_or_else(|| ReconcileError::OutsideMediaRoot(event.output.clone()))?;

        let outcome = self.attach(event.video_id, event.resolution, &reference).await?;

        if outcome == ReconcileOutcome::RecordNotFound {
            // Deleted mid-flight; nothing owns this file any more.
            info!(
                video_id = %event.video_id,
                profile = %event.resolution,
                "Record gone before rendition landed, removing {}",
                reference
            );
            self.storage.remove(&reference).await?;
        }

        Ok(outcome)
    }

    /// Scans storage for every profile's derived file and attaches the ones whose
    /// slot is still empty. A missing record is a no-op.
    pub async fn reconcile(&self, video_id: Uuid) -> Result<Vec<(Resolution, ReconcileOutcome)>, ReconcileError> {
        let Some(video) = self.store.fetch(video_id).await? else {
            debug!(video_id = %video_id, "Reconcile skipped, record not found");
            return Ok(Vec::new());
        };
        let Some(original) = video.video_file.as_deref() else {
            return Ok(Vec::new());
        };

        let mut outcomes = Vec::with_capacity(PROFILES.len());
        for profile in PROFILES.iter() {
            let resolution = profile.resolution;
            if video.rendition(resolution).is_some() {
                outcomes.push((resolution, ReconcileOutcome::AlreadyPopulated));
                continue;
            }

            let derived = profile.derived_reference(original);
            let outcome = if self.storage.exists(&derived).await? {
                self.attach(video_id, resolution, &derived).await?
            } else {
                ReconcileOutcome::MissingArtifact
            };
            outcomes.push((resolution, outcome));
        }

        Ok(outcomes)
    }

    async fn attach(
        &self,
        video_id: Uuid,
        resolution: Resolution,
        reference: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let outcome: ReconcileOutcome = self
            .store
            .attach_rendition(video_id, resolution.profile(), reference)
            .await?
            .into();

        match outcome {
            ReconcileOutcome::Attached => {
                info!(video_id = %video_id, profile = %resolution, "✅ Attached rendition {}", reference);
                if let Some(cache) = &self.cache {
                    cache.invalidate().await;
                }
            }
            ReconcileOutcome::AlreadyPopulated => {
                debug!(video_id = %video_id, profile = %resolution, "Slot already populated");
            }
            ReconcileOutcome::RecordNotFound | ReconcileOutcome::MissingArtifact => {
                warn!(video_id = %video_id, profile = %resolution, "Rendition not attached: {:?}", outcome);
            }
        }

        Ok(outcome)
    }
}
