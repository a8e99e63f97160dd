use crate::infrastructure::storage::local::MediaStorage;
use anyhow::{anyhow, Context, Result};
use axum::extract::multipart::Field;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info};

/// Streams a multipart file field into the media upload directory and returns
/// its storage reference. Nothing is left behind on failure.
pub async fn stream_to_storage(storage: &MediaStorage, field: Field<'_>) -> Result<String> {
    let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();

    // Validate request mime
    if !content_type.starts_with("video/") {
        return Err(anyhow!("Invalid content type: only video/* allowed"));
    }

    let file_name = field.file_name().unwrap_or("video.mp4").to_string();
    let reference = storage.allocate_upload(&file_name).await?;
    let path = storage.resolve(&reference)?;

    match write_field(&path, field).await {
        Ok(bytes) => {
            info!("⬆️ Stored upload {} ({} bytes)", reference, bytes);
            Ok(reference)
        }
        Err(e) => {
            error!("Upload error: {:#}", e);
            let _ = fs::remove_file(&path).await;
            Err(e)
        }
    }
}

async fn write_field(path: &std::path::Path, mut field: Field<'_>) -> Result<u64> {
    let file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await.context("Stream interrupted")? {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    writer.flush().await?;
    if written == 0 {
        return Err(anyhow!("Uploaded file is empty"));
    }
    Ok(written)
}
