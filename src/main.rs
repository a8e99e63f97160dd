use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use videoflix::app;
use videoflix::config::settings::AppConfig;
use videoflix::infrastructure::db::pool::{connect_to_db, run_migrations};
use videoflix::infrastructure::queue::rabbitmq::RabbitMqService;
use videoflix::infrastructure::redis::client::RedisService;
use videoflix::infrastructure::storage::local::MediaStorage;
use videoflix::modules::content::cache::CatalogCache;
use videoflix::modules::content::repository::{PgVideoRepository, VideoStore};
use videoflix::state::AppState;
use videoflix::transcoding::dispatcher::UploadEventDispatcher;
use videoflix::transcoding::encoder::FfmpegEncoder;
use videoflix::transcoding::job::JobRunner;
use videoflix::transcoding::queue::{InProcessQueue, JobQueue};
use videoflix::transcoding::reconcile::Reconciler;
use videoflix::workers::transcoder::{start_transcoder_worker, RabbitJobQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("missing required environment variable")?;

    let pool = connect_to_db(&config.database_url, config.db_max_connections)
        .await
        .context("failed to connect to PostgreSQL")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let redis = RedisService::new(&config.redis_url)
        .await
        .context("failed to connect to Redis")?;

    let storage = MediaStorage::new(&config.media_root)
        .await
        .context("failed to prepare media root")?;

    let videos: Arc<dyn VideoStore> = Arc::new(PgVideoRepository::new(pool));
    let cache = CatalogCache::new(redis.clone(), config.cache_ttl_secs);
    let reconciler = Arc::new(Reconciler::new(videos.clone(), storage.clone()).with_cache(cache.clone()));

    let encoder = Arc::new(FfmpegEncoder::new(&config.ffmpeg_binary, config.transcode_timeout()));
    let runner = Arc::new(JobRunner::new(encoder, reconciler.clone(), storage.clone()));

    let queue: Arc<dyn JobQueue> = match &config.rabbitmq_url {
        Some(url) => {
            let mq = RabbitMqService::new(url).await?;
            if config.transcode_workers > 0 {
                tokio::spawn(start_transcoder_worker(
                    mq.clone(),
                    runner.clone(),
                    redis.clone(),
                    config.transcode_workers,
                ));
            } else {
                info!("Local transcoder disabled, jobs are left to other nodes");
            }
            Arc::new(RabbitJobQueue::new(mq, redis.clone(), config.job_lease_secs))
        }
        None => {
            if config.transcode_workers == 0 {
                warn!("TRANSCODE_WORKERS=0 without RABBITMQ_URL, running one local worker anyway");
            }
            Arc::new(InProcessQueue::start(runner.clone(), config.transcode_workers.into()))
        }
    };

    let dispatcher = Arc::new(UploadEventDispatcher::new(queue, storage.clone()));
    let port = config.server_port;
    let state = AppState::new(config, videos, storage, cache, dispatcher, reconciler);

    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
