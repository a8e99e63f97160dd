use utoipa::OpenApi;
use crate::modules::content::dto::*;
use crate::modules::content::model::Video;
use crate::transcoding::dispatcher::DispatchReport;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::content::handler::list_videos,
        crate::modules::content::handler::get_video,
        crate::modules::content::handler::create_video,
        crate::modules::content::handler::delete_video,
        crate::modules::content::handler::requeue_renditions,
        crate::modules::content::stream_handler::stream_video,
    ),
    components(
        schemas(
            Video, VideoResponse, CreateVideoRequest, CreateVideoResponse, DispatchReport,
        )
    ),
    tags(
        (name = "Content", description = "Video catalog and rendition pipeline")
    )
)]
pub struct ApiDoc;
