use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;
use super::model::Video;
use crate::transcoding::dispatcher::DispatchReport;

// --- VIDEO DTOs ---

/// Text fields of the multipart upload form.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateVideoRequest {
    #[validate(length(min = 1, max = 80, message = "Title must be 1-80 characters"))]
    pub title: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
    #[validate(length(min = 1, max = 40, message = "Category must be 1-40 characters"))]
    pub category: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoResponse {
    pub video: Video,
    /// Renditions not attached yet.
    pub pending_renditions: Vec<String>,
}

impl From<Video> for VideoResponse {
    fn from(video: Video) -> Self {
        let pending_renditions = video
            .missing_renditions()
            .into_iter()
            .map(|r| r.to_string())
            .collect();
        Self {
            video,
            pending_renditions,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateVideoResponse {
    pub video: VideoResponse,
    pub transcoding: DispatchReport,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StreamQuery {
    /// `480p` or `720p`; omitted streams the original upload.
    pub quality: Option<String>,
}
