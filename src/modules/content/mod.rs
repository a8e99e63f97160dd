use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, MethodRouter};
use crate::state::AppState;
use std::convert::Infallible;
use tower_http::limit::RequestBodyLimitLayer;

pub mod cache;
pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;
pub mod stream_handler;

pub fn router(upload_limit: usize) -> Router<AppState> {
    // Uploads bypass axum's default 2 MB cap and use the configured limit instead.
    let upload: MethodRouter<AppState> = post(handler::create_video)
        .layer::<_, Infallible>(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit));

    Router::new()
        .route("/videos", get(handler::list_videos).merge(upload))
        .route("/videos/{id}", get(handler::get_video).delete(handler::delete_video))
        .route("/videos/{id}/stream", get(stream_handler::stream_video))
        .route("/videos/{id}/renditions", post(handler::requeue_renditions))
}
