use super::model::Video;
use crate::infrastructure::redis::client::RedisService;
use redis::AsyncCommands;
use tracing::{debug, warn};

const VIDEO_LIST_KEY: &str = "videos:list";

/// Redis copy of the catalog listing. Cache failures are logged and otherwise ignored.
#[derive(Clone)]
pub struct CatalogCache {
    redis: Option<RedisService>,
    ttl_secs: u64,
}

impl CatalogCache {
    /// A zero TTL disables caching.
    pub fn new(redis: RedisService, ttl_secs: u64) -> Self {
        Self {
            redis: (ttl_secs > 0).then_some(redis),
            ttl_secs,
        }
    }

    pub fn disabled() -> Self {
        Self {
            redis: None,
            ttl_secs: 0,
        }
    }

    pub async fn get(&self) -> Option<Vec<Video>> {
        let redis = self.redis.as_ref()?;
        let cached: Option<String> = match redis.get_conn().await {
            Ok(mut conn) => match conn.get(VIDEO_LIST_KEY).await {
                Ok(value) => value,
                Err(e) => {
                    warn!("Video list cache read failed: {}", e);
                    return None;
                }
            },
            Err(e) => {
                warn!("Redis unavailable for cache read: {}", e);
                return None;
            }
        };

        let videos = serde_json::from_str(&cached?)
            .inspect_err(|e| warn!("Discarding unreadable video list cache: {}", e))
            .ok()?;
        debug!("Video list served from cache");
        Some(videos)
    }

    pub async fn put(&self, videos: &[Video]) {
        let Some(redis) = &self.redis else {
            return;
        };
        let payload = match serde_json::to_string(videos) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to serialize video list for cache: {}", e);
                return;
            }
        };
        let result: Result<(), redis::RedisError> = async {
            let mut conn = redis.get_conn().await?;
            let _: () = conn.set_ex(VIDEO_LIST_KEY, payload, self.ttl_secs).await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            warn!("Video list cache write failed: {}", e);
        }
    }

    pub async fn invalidate(&self) {
        let Some(redis) = &self.redis else {
            return;
        };
        let result: Result<(), redis::RedisError> = async {
            let mut conn = redis.get_conn().await?;
            let _: () = conn.del(VIDEO_LIST_KEY).await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            warn!("Video list cache invalidation failed: {}", e);
        }
    }
}
