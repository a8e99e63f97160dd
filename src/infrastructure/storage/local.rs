use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Sub-directory of the media root that receives uploaded originals.
pub const UPLOAD_DIR: &str = "videos";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage reference '{0}'")]
    InvalidReference(String),
    #[error("storage io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Shared media directory. Records hold `/`-separated references relative to
/// the root; workers and handlers resolve them to absolute paths.
#[derive(Clone, Debug)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let uploads = root.join(UPLOAD_DIR);
        fs::create_dir_all(&uploads)
            .await
            .map_err(|e| StorageError::io(&uploads, e))?;

        info!("✅ Media storage ready at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, reference: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(reference);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if reference.is_empty() || escapes {
            return Err(StorageError::InvalidReference(reference.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Inverse of [`resolve`](Self::resolve).
    pub fn reference_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    pub async fn exists(&self, reference: &str) -> Result<bool, StorageError> {
        let path = self.resolve(reference)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))
    }

    /// Removes the file behind `reference`. Returns `false` when there was nothing to remove.
    pub async fn remove(&self, reference: &str) -> Result<bool, StorageError> {
        let path = self.resolve(reference)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed media file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Picks a free reference under the upload directory for an incoming file.
    ///
    /// Every upload gets its own uuid prefix, so no original can ever share a
    /// name with another record's derived or partial files.
    pub async fn allocate_upload(&self, file_name: &str) -> Result<String, StorageError> {
        let (stem, ext) = sanitize_file_name(file_name);
        loop {
            let tag = Uuid::new_v4().as_simple().to_string();
            let reference = format!("{}/{}_{}{}", UPLOAD_DIR, tag, stem, ext);
            if !self.exists(&reference).await? {
                return Ok(reference);
            }
        }
    }
}

fn sanitize_file_name(file_name: &str) -> (String, String) {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => base.split_at(idx),
        _ => (base, ""),
    };
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    };
    let stem = clean(stem);
    let stem = if stem.is_empty() { "upload".to_string() } else { stem };
    let ext = if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", clean(&ext[1..]).to_lowercase())
    };
    (stem, ext)
}
