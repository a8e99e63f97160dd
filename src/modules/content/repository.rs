use super::model::{NewVideo, Video};
use crate::transcoding::profile::ResolutionProfile;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a conditional slot update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    AlreadyPopulated,
    RecordNotFound,
}

/// Persistence port used by the pipeline and the HTTP layer.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn insert(&self, video: NewVideo) -> Result<Video, StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<Video>, StoreError>;

    async fn list(&self) -> Result<Vec<Video>, StoreError>;

    /// Sets the profile's slot to `reference` only if the slot is currently empty.
    /// The emptiness check and the write are a single atomic step.
    async fn attach_rendition(
        &self,
        id: Uuid,
        profile: &ResolutionProfile,
        reference: &str,
    ) -> Result<AttachOutcome, StoreError>;

    /// Deletes the record and hands back its last state.
    async fn delete(&self, id: Uuid) -> Result<Option<Video>, StoreError>;
}

#[derive(Clone)]
pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for PgVideoRepository {
    async fn insert(&self, video: NewVideo) -> Result<Video, StoreError> {
        let video = sqlx::query_as::<_, Video>(
            r#"
            INSERT INTO videos (title, description, category, video_file)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(video.title)
        .bind(video.description)
        .bind(video.category)
        .bind(video.video_file)
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        let video = sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    async fn list(&self) -> Result<Vec<Video>, StoreError> {
        let videos = sqlx::query_as::<_, Video>(
            "SELECT * FROM videos ORDER BY created_at DESC, title ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }

    async fn attach_rendition(
        &self,
        id: Uuid,
        profile: &ResolutionProfile,
        reference: &str,
    ) -> Result<AttachOutcome, StoreError> {
        // `slot` comes from the static profile table, never from input.
        let sql = format!(
            "UPDATE videos SET {slot} = $1 WHERE id = $2 AND {slot} IS NULL",
            slot = profile.slot
        );
        let result = sqlx::query(&sql)
            .bind(reference)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(AttachOutcome::Attached);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM videos WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(if exists {
            AttachOutcome::AlreadyPopulated
        } else {
            AttachOutcome::RecordNotFound
        })
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        let video = sqlx::query_as::<_, Video>("DELETE FROM videos WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use time::OffsetDateTime;
    use tokio::sync::Mutex;

    /// Map-backed store; every operation holds the lock, which gives the same
    /// per-statement atomicity as the conditional SQL update.
    #[derive(Default)]
    pub struct MemoryVideoStore {
        rows: Mutex<HashMap<Uuid, Video>>,
    }

    impl MemoryVideoStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl VideoStore for MemoryVideoStore {
        async fn insert(&self, video: NewVideo) -> Result<Video, StoreError> {
            let row = Video {
                id: Uuid::new_v4(),
                title: video.title,
                description: video.description,
                category: video.category,
                created_at: OffsetDateTime::now_utc().date(),
                video_file: video.video_file,
                video_480p: None,
                video_720p: None,
            };
            self.rows.lock().await.insert(row.id, row.clone());
            Ok(row)
        }

        async fn fetch(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
            Ok(self.rows.lock().await.get(&id).cloned())
        }

        async fn list(&self) -> Result<Vec<Video>, StoreError> {
            let mut videos: Vec<Video> = self.rows.lock().await.values().cloned().collect();
            videos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.title.cmp(&b.title)));
            Ok(videos)
        }

        async fn attach_rendition(
            &self,
            id: Uuid,
            profile: &ResolutionProfile,
            reference: &str,
        ) -> Result<AttachOutcome, StoreError> {
            let mut rows = self.rows.lock().await;
            let Some(video) = rows.get_mut(&id) else {
                return Ok(AttachOutcome::RecordNotFound);
            };
            let slot = video.rendition_mut(profile.resolution);
            if slot.is_some() {
                return Ok(AttachOutcome::AlreadyPopulated);
            }
            *slot = Some(reference.to_string());
            Ok(AttachOutcome::Attached)
        }

        async fn delete(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
            Ok(self.rows.lock().await.remove(&id))
        }
    }
}
