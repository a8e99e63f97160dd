use super::profile::ResolutionProfile;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

const STDERR_TAIL_LINES: usize = 15;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to start encoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("encoder exited with {code}: {stderr}")]
    NonZeroExit { code: String, stderr: String },
    #[error("encoder timed out after {0:?}")]
    TimedOut(Duration),
    #[error("encoder reported success but produced no file at {0}")]
    MissingOutput(PathBuf),
    #[error("encoder io error: {0}")]
    Io(#[from] io::Error),
}

/// Produces one rendition of `source` at `profile.derived_path(source)`.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, source: &Path, profile: &ResolutionProfile) -> Result<PathBuf, EncodeError>;
}

/// Shells out to ffmpeg. The command line may carry a prefix, e.g. `nice -n 10 ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: String,
    leading_args: Vec<String>,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(command_line: &str, timeout: Duration) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "ffmpeg".to_string());
        Self {
            program,
            leading_args: parts.collect(),
            timeout,
        }
    }

    fn command(&self, source: &Path, output: &Path, profile: &ResolutionProfile) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-s", profile.frame_size])
            .args(["-c:v", profile.video_codec])
            .arg("-crf")
            .arg(profile.crf.to_string())
            .args(["-c:a", profile.audio_codec])
            .args(["-strict", "-2"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, source: &Path, profile: &ResolutionProfile) -> Result<PathBuf, EncodeError> {
        let partial = profile.partial_path(source);
        let target = profile.derived_path(source);

        info!(
            source = %source.display(),
            profile = profile.name(),
            "🎬 Encoding rendition"
        );

        let child = self
            .command(source, &partial, profile)
            .spawn()
            .map_err(|e| EncodeError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        // Dropping the child on timeout kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                discard(&partial).await;
                return Err(EncodeError::TimedOut(self.timeout));
            }
        };

        if !output.status.success() {
            discard(&partial).await;
            let code = output
                .status
                .code()
                .map(|c| format!("status {}", c))
                .unwrap_or_else(|| "signal".to_string());
            return Err(EncodeError::NonZeroExit {
                code,
                stderr: stderr_tail(&output.stderr),
            });
        }

        if !fs::try_exists(&partial).await? {
            return Err(EncodeError::MissingOutput(partial));
        }

        fs::rename(&partial, &target).await?;
        debug!(output = %target.display(), "Rendition written");
        Ok(target)
    }
}

async fn discard(partial: &Path) {
    match fs::remove_file(partial).await {
        Ok(()) => debug!(path = %partial.display(), "Removed partial rendition"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %partial.display(), "Failed to remove partial rendition: {}", e),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoding::profile::Resolution;

    // Scripts run through `sh` so the test never execs a file it just wrote.
    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        format!("sh {}", path.display())
    }

    const COPY_INPUT: &str = "for last; do :; done\ncp \"$3\" \"$last\"";

    fn source_in(dir: &Path) -> PathBuf {
        let source = dir.join("movie.mp4");
        std::fs::write(&source, b"original").unwrap();
        source
    }

    #[tokio::test]
    async fn success_writes_derived_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_in(dir.path());
        let encoder = FfmpegEncoder::new(&script(dir.path(), "ok.sh", COPY_INPUT), Duration::from_secs(10));

        let out = encoder.encode(&source, Resolution::P480.profile()).await.unwrap();

        assert_eq!(out, dir.path().join("movie_480p.mp4"));
        assert_eq!(std::fs::read(&out).unwrap(), b"original");
        assert!(!dir.path().join("movie_480p.partial.mp4").exists());
    }

    #[tokio::test]
    async fn rerun_overwrites_same_target() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_in(dir.path());
        let encoder = FfmpegEncoder::new(&script(dir.path(), "ok.sh", COPY_INPUT), Duration::from_secs(10));
        let profile = Resolution::P720.profile();

        let first = encoder.encode(&source, profile).await.unwrap();
        std::fs::write(&source, b"changed").unwrap();
        let second = encoder.encode(&source, profile).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"changed");
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_failure_and_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_in(dir.path());
        let body = "for last; do :; done\necho partial > \"$last\"\necho 'Invalid data found' >&2\nexit 1";
        let encoder = FfmpegEncoder::new(&script(dir.path(), "fail.sh", body), Duration::from_secs(10));

        let err = encoder.encode(&source, Resolution::P480.profile()).await.unwrap_err();

        match err {
            EncodeError::NonZeroExit { code, stderr } => {
                assert_eq!(code, "status 1");
                assert!(stderr.contains("Invalid data found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dir.path().join("movie_480p.mp4").exists());
        assert!(!dir.path().join("movie_480p.partial.mp4").exists());
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_in(dir.path());
        let encoder = FfmpegEncoder::new("/nonexistent/bin/ffmpeg", Duration::from_secs(10));

        let err = encoder.encode(&source, Resolution::P480.profile()).await.unwrap_err();
        assert!(matches!(err, EncodeError::Spawn { .. }));
    }

    #[tokio::test]
    async fn timeout_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_in(dir.path());
        let encoder = FfmpegEncoder::new(&script(dir.path(), "slow.sh", "sleep 5"), Duration::from_millis(200));

        let err = encoder.encode(&source, Resolution::P720.profile()).await.unwrap_err();
        assert!(matches!(err, EncodeError::TimedOut(_)));
        assert!(!dir.path().join("movie_720p.mp4").exists());
    }

    #[tokio::test]
    async fn success_without_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_in(dir.path());
        let encoder = FfmpegEncoder::new(&script(dir.path(), "noop.sh", "exit 0"), Duration::from_secs(10));

        let err = encoder.encode(&source, Resolution::P480.profile()).await.unwrap_err();
        assert!(matches!(err, EncodeError::MissingOutput(_)));
    }

    #[test]
    fn command_line_prefix_is_split() {
        let encoder = FfmpegEncoder::new("nice -n 10 ffmpeg", Duration::from_secs(1));
        assert_eq!(encoder.program, "nice");
        assert_eq!(encoder.leading_args, vec!["-n", "10", "ffmpeg"]);
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let text: String = (0..40).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(text.as_bytes());
        assert!(tail.starts_with("line 25"));
        assert!(tail.ends_with("line 39"));
    }
}
