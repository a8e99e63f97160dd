use serde::Deserialize;
use std::time::Duration;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_url: String,
    /// Unset runs jobs on the in-process worker pool.
    pub rabbitmq_url: Option<String>,
    pub media_root: String,
    pub ffmpeg_binary: String,
    /// Concurrent encoder runs on this node; 0 disables the local worker.
    pub transcode_workers: u16,
    pub transcode_timeout_secs: u64,
    pub job_lease_secs: u64,
    pub cache_ttl_secs: u64,
    pub upload_limit_mb: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        let transcode_timeout_secs = env::get_parsed(EnvKey::TranscodeTimeoutSecs, 3600);
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            db_max_connections: env::get_parsed(EnvKey::DbMaxConnections, 20),
            redis_url: env::get(EnvKey::RedisUrl)?,
            rabbitmq_url: env::get_opt(EnvKey::RabbitMqUrl),
            media_root: env::get_or(EnvKey::MediaRoot, "media"),
            ffmpeg_binary: env::get_or(EnvKey::FfmpegBinary, "ffmpeg"),
            transcode_workers: env::get_parsed(EnvKey::TranscodeWorkers, 2),
            transcode_timeout_secs,
            job_lease_secs: env::get_parsed(EnvKey::JobLeaseSecs, default_lease_secs(transcode_timeout_secs)),
            cache_ttl_secs: env::get_parsed(EnvKey::CacheTtlSecs, 900),
            upload_limit_mb: env::get_parsed(EnvKey::UploadLimitMb, 2048),
        })
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    pub fn upload_limit_bytes(&self) -> usize {
        self.upload_limit_mb.saturating_mul(1024 * 1024)
    }
}

/// Twice the encoder timeout.
fn default_lease_secs(transcode_timeout_secs: u64) -> u64 {
    transcode_timeout_secs.saturating_mul(2)
}
