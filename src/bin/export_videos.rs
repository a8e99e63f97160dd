//! Dumps every video record to a JSON file.
//!
//! Usage: `export_videos [OUTPUT]` (defaults to `videos_export.json`).

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use videoflix::config::env::{self, EnvKey};
use videoflix::infrastructure::db::pool::connect_to_db;
use videoflix::modules::content::repository::{PgVideoRepository, VideoStore};

const DEFAULT_OUTPUT: &str = "videos_export.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let output = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    let database_url = env::get(EnvKey::DatabaseUrl).context("DATABASE_URL is not set")?;

    let pool = connect_to_db(&database_url, 1).await?;
    let videos = PgVideoRepository::new(pool).list().await?;

    let json = serde_json::to_string_pretty(&videos)?;
    tokio::fs::write(&output, json)
        .await
        .with_context(|| format!("failed to write {}", output))?;

    info!("Exported {} video(s) to {}", videos.len(), output);
    Ok(())
}
