use super::dto::{CreateVideoRequest, VideoResponse};
use super::model::NewVideo;
use crate::state::AppState;
use crate::transcoding::dispatcher::DispatchReport;
use crate::transcoding::profile::Resolution;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

pub struct VideoService;

impl VideoService {
    pub async fn list_videos(state: AppState) -> Result<Vec<VideoResponse>> {
        let videos = match state.cache.get().await {
            Some(videos) => videos,
            None => {
                let videos = state.videos.list().await.context("Failed to list videos")?;
                state.cache.put(&videos).await;
                videos
            }
        };

        Ok(videos.into_iter().map(VideoResponse::from).collect())
    }

    pub async fn get_video(state: AppState, id: Uuid) -> Result<Option<VideoResponse>> {
        let video = state.videos.fetch(id).await?;
        Ok(video.map(VideoResponse::from))
    }

    /// Persists the record, then fires the created hook. Transcoding problems
    /// show up in the report, never as an error.
    pub async fn create_video(
        state: AppState,
        req: CreateVideoRequest,
        video_file: String,
    ) -> Result<(VideoResponse, DispatchReport)> {
        let video = state
            .videos
            .insert(NewVideo {
                title: req.title,
                description: req.description,
                category: req.category,
                video_file: Some(video_file),
            })
            .await
            .context("Failed to save video")?;

        info!(video_id = %video.id, "New video created");
        state.cache.invalidate().await;

        let report = state.dispatcher.on_video_created(&video).await;
        Ok((VideoResponse::from(video), report))
    }

    /// Returns `false` when there was no such video.
    pub async fn delete_video(state: AppState, id: Uuid) -> Result<bool> {
        let Some(video) = state.videos.delete(id).await? else {
            return Ok(false);
        };

        state.dispatcher.on_video_deleted(&video).await;
        state.cache.invalidate().await;
        Ok(true)
    }

    /// Operator retry: attach whatever already landed on storage, then enqueue
    /// jobs for the slots that are still empty.
    pub async fn requeue_renditions(state: AppState, id: Uuid) -> Result<Option<DispatchReport>> {
        state.reconciler.reconcile(id).await?;

        let Some(video) = state.videos.fetch(id).await? else {
            return Ok(None);
        };
        Ok(Some(state.dispatcher.requeue_missing(&video).await))
    }

    /// Absolute path of the original (`None` quality) or of an attached rendition.
    pub async fn media_path(
        state: AppState,
        id: Uuid,
        quality: Option<Resolution>,
    ) -> Result<Option<PathBuf>> {
        let Some(video) = state.videos.fetch(id).await? else {
            return Ok(None);
        };

        let reference = match quality {
            Some(resolution) => video.rendition(resolution),
            None => video.video_file.as_deref(),
        };

        match reference {
            Some(reference) => Ok(Some(state.storage.resolve(reference)?)),
            None => Ok(None),
        }
    }
}
