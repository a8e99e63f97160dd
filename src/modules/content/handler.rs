use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::stream_to_storage;
use crate::infrastructure::storage::local::MediaStorage;
use crate::state::AppState;
use crate::modules::content::dto::*;
use crate::modules::content::service::VideoService;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

// --- VIDEO HANDLERS ---

#[utoipa::path(
    get,
    path = "/api/v1/videos",
    responses(
        (status = 200, description = "List Videos", body = ApiResponse<Vec<VideoResponse>>),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn list_videos(State(state): State<AppState>) -> impl IntoResponse {
    match VideoService::list_videos(state).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Videos retrieved successfully"), StatusCode::OK).into_response(),
        Err(e) => ApiError::internal(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Get Video", body = ApiResponse<VideoResponse>),
        (status = 404, description = "Video Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::get_video(state, id).await {
        Ok(Some(res)) => ApiSuccess(ApiResponse::success(res, "Video retrieved successfully"), StatusCode::OK).into_response(),
        Ok(None) => ApiError::not_found("Video").into_response(),
        Err(e) => ApiError::internal(e).into_response(),
    }
}

/// Upload Video
/// Multipart form with `title`, `description`, `category` and the `video_file` itself.
/// Transcoding starts in the background; the response does not wait for it.
#[utoipa::path(
    post,
    path = "/api/v1/videos",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Video Created", body = ApiResponse<CreateVideoResponse>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn create_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut req = CreateVideoRequest::default();
    let mut video_file: Option<String> = None;

    let outcome = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "video_file" => {
                    if video_file.is_some() {
                        return Err(ApiError::bad_request("Only one video_file is allowed"));
                    }
                    let reference = stream_to_storage(&state.storage, field)
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Upload failed: {}", e)))?;
                    video_file = Some(reference);
                }
                "title" | "description" | "category" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid field {}: {}", name, e)))?;
                    match name.as_str() {
                        "title" => req.title = text,
                        "description" => req.description = text,
                        _ => req.category = text,
                    }
                }
                other => warn!("Ignoring unexpected multipart field '{}'", other),
            }
        }
        Ok::<_, ApiError>(())
    }
    .await;

    let result = match (outcome, video_file.clone()) {
        (Err(e), _) => Err(e),
        (Ok(()), None) => Err(ApiError::bad_request("No video_file field found in multipart request")),
        (Ok(()), Some(reference)) => match req.validate() {
            Err(e) => Err(ApiError::bad_request(e.to_string())),
            Ok(()) => {
                info!("Creating video '{}' from {}", req.title, reference);
                VideoService::create_video(state.clone(), req, reference)
                    .await
                    .map_err(ApiError::internal)
            }
        },
    };

    match result {
        Ok((video, transcoding)) => ApiSuccess(
            ApiResponse::success(CreateVideoResponse { video, transcoding }, "Video created successfully"),
            StatusCode::CREATED,
        )
        .into_response(),
        Err(e) => {
            // The record was never saved, so the upload has no owner.
            if let Some(reference) = video_file {
                discard_upload(&state.storage, &reference).await;
            }
            e.into_response()
        }
    }
}

/// Returns whether a file was removed; failures are logged, never raised.
async fn discard_upload(storage: &MediaStorage, reference: &str) -> bool {
    match storage.remove(reference).await {
        Ok(removed) => removed,
        Err(e) => {
            warn!("Failed to remove rejected upload {}: {}", reference, e);
            false
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/videos/{id}",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video deleted", body = ApiResponse<String>),
        (status = 404, description = "Video Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::delete_video(state, id).await {
        Ok(true) => ApiSuccess(ApiResponse::success((), "Video deleted successfully"), StatusCode::OK).into_response(),
        Ok(false) => ApiError::not_found("Video").into_response(),
        Err(e) => ApiError::internal(e).into_response(),
    }
}

/// Re-queue Renditions
/// Attaches renditions already on storage and enqueues jobs for the slots still empty.
#[utoipa::path(
    post,
    path = "/api/v1/videos/{id}/renditions",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 202, description = "Jobs enqueued", body = ApiResponse<crate::transcoding::dispatcher::DispatchReport>),
        (status = 404, description = "Video Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn requeue_renditions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::requeue_renditions(state, id).await {
        Ok(Some(report)) => ApiSuccess(ApiResponse::success(report, "Renditions re-queued"), StatusCode::ACCEPTED).into_response(),
        Ok(None) => ApiError::not_found("Video").into_response(),
        Err(e) => ApiError::internal(e).into_response(),
    }
}
