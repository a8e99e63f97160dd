use crate::config::settings::AppConfig;
use crate::infrastructure::storage::local::MediaStorage;
use crate::modules::content::cache::CatalogCache;
use crate::modules::content::repository::VideoStore;
use crate::transcoding::dispatcher::UploadEventDispatcher;
use crate::transcoding::reconcile::Reconciler;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub videos: Arc<dyn VideoStore>,
    pub storage: MediaStorage,
    pub cache: CatalogCache,
    pub dispatcher: Arc<UploadEventDispatcher>,
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        videos: Arc<dyn VideoStore>,
        storage: MediaStorage,
        cache: CatalogCache,
        dispatcher: Arc<UploadEventDispatcher>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            config,
            videos,
            storage,
            cache,
            dispatcher,
            reconciler,
        }
    }
}
