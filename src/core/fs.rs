use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{ResourceError, ResourceResult};

/// How a stored resource gets materialized inside an instance. Imports are
/// always copied into the content area, so a stored file never shares an
/// inode with a file the user can still edit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    /// Hard link, falling back to a copy when linking is not possible
    /// (different volume, unsupported filesystem).
    #[default]
    Link,
    Copy,
}

/// Materialize `src` at `dest`. Returns the mode that was actually used.
///
/// Creates parent directories as needed. `dest` must not exist yet.
pub async fn link_or_copy(src: &Path, dest: &Path, mode: DeployMode) -> ResourceResult<DeployMode> {
    if let Some(parent) = dest.parent() {
        create_dir_safe(parent).await?;
    }

    if mode == DeployMode::Link {
        match tokio::fs::hard_link(src, dest).await {
            Ok(()) => return Ok(DeployMode::Link),
            Err(e) => debug!("Hard link {:?} -> {:?} failed ({}), copying", src, dest, e),
        }
    }

    tokio::fs::copy(src, dest)
        .await
        .map_err(|e| ResourceError::io(dest, e))?;
    Ok(DeployMode::Copy)
}

/// Write `bytes` to a sibling temp file, then rename over `path`, so readers
/// never observe a half-written file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> ResourceResult<()> {
    if let Some(parent) = path.parent() {
        create_dir_safe(parent).await?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| ResourceError::io(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ResourceError::io(path, e));
    }
    Ok(())
}

/// Remove a file or directory tree. Missing targets are not an error.
pub async fn remove_path(path: &Path) -> ResourceResult<bool> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ResourceError::io(path, e)),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ResourceError::io(path, e)),
    }
}

pub async fn create_dir_safe(path: &Path) -> ResourceResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| ResourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Recursively copy a directory tree. Existing destination files are replaced.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(destination)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            if dst_path.exists() {
                std::fs::remove_file(&dst_path)?;
            }
            std::fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

/// Identity of a file on the local machine: device and inode. Inode numbers
/// alone collide across mounts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    pub dev: u64,
    pub ino: u64,
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

/// `None` where the platform has no inode numbers.
#[cfg(unix)]
pub fn file_id(metadata: &std::fs::Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    match metadata.ino() {
        0 => None,
        ino => Some(FileId {
            dev: metadata.dev(),
            ino,
        }),
    }
}

#[cfg(not(unix))]
pub fn file_id(_metadata: &std::fs::Metadata) -> Option<FileId> {
    None
}

/// What a file looked like when it was last read: identity, size and
/// modification time. A file whose stamp is unchanged is assumed to hold the
/// same bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileStamp {
    pub id: FileId,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl FileStamp {
    pub fn of(metadata: &std::fs::Metadata) -> Option<Self> {
        Some(Self {
            id: file_id(metadata)?,
            size: metadata.len(),
            modified: metadata.modified().ok()?.into(),
        })
    }
}

/// Turn a display name into something safe to use as a file stem on every
/// platform.
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim().to_string();
    if cleaned.is_empty() {
        "resource".to_string()
    } else {
        cleaned
    }
}

/// Lowercased extension with its leading dot (`".jar"`), or empty.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// File name without the extension returned by [`dotted_extension`].
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Helper: canonicalize a path, keeping the input when that fails.
pub fn safe_path(path: &Path) -> PathBuf {
    match std::fs::canonicalize(path) {
        Ok(p) => p,
        Err(_) => path.to_path_buf(),
    }
}
