use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use axum_extra::{headers::Range, TypedHeader};
use axum_range::{KnownSize, Ranged};
use crate::common::response::ApiError;
use crate::modules::content::dto::StreamQuery;
use crate::modules::content::service::VideoService;
use crate::state::AppState;
use crate::transcoding::profile::Resolution;
use std::io;
use tokio::fs::File;
use uuid::Uuid;

/// Stream the original upload or one of its renditions from media storage.
/// Honors `Range` so players can seek.
#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/stream",
    params(
        ("id" = Uuid, Path, description = "Video ID"),
        StreamQuery
    ),
    responses(
        (status = 200, description = "Stream Content"),
        (status = 206, description = "Partial Content"),
        (status = 400, description = "Unknown quality"),
        (status = 404, description = "Not Found"),
        (status = 416, description = "Range Not Satisfiable"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Content"
)]
pub async fn stream_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
    range: Option<TypedHeader<Range>>,
) -> impl IntoResponse {
    let quality = match query.quality.as_deref().map(str::parse::<Resolution>).transpose() {
        Ok(q) => q,
        Err(e) => return ApiError::bad_request(e).into_response(),
    };

    let path = match VideoService::media_path(state, id, quality).await {
        Ok(Some(path)) => path,
        Ok(None) => return ApiError::not_found("Video file").into_response(),
        Err(e) => return ApiError::internal(e).into_response(),
    };

    match ranged_file(&path, range.map(|TypedHeader(range)| range)).await {
        Ok(response) => response,
        Err(e) if e.kind() == io::ErrorKind::NotFound => ApiError::not_found("Video file").into_response(),
        Err(e) => ApiError::internal(e.into()).into_response(),
    }
}

async fn ranged_file(path: &std::path::Path, range: Option<Range>) -> io::Result<Response> {
    let file = File::open(path).await?;
    let body = KnownSize::file(file).await?;
    let content_type = mime_guess::from_path(path).first_or_octet_stream().to_string();

    Ok(([(header::CONTENT_TYPE, content_type)], Ranged::new(range, body)).into_response())
}
