use std::path::PathBuf;
use thiserror::Error;

use crate::core::resource::{ResourceDomain, ResourceType};

/// Central error type for the resource backend.
/// Every module returns `Result<T, ResourceError>`.
#[derive(Debug, Error)]
pub enum ResourceError {
    // ── IO ──────────────────────────────────────────────
    #[error("Import I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not a file: {0:?}")]
    NotAFile(PathBuf),

    // ── Type registry ───────────────────────────────────
    #[error("Cannot parse as {resource_type}: {reason}")]
    Parse {
        resource_type: ResourceType,
        reason: String,
    },

    #[error("Resource type already registered: {0}")]
    DuplicateType(ResourceType),

    #[error("Incomplete resource builder: missing {0}")]
    IncompleteBuilder(&'static str),

    // ── Index ───────────────────────────────────────────
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    // ── Instance ────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceAlreadyExists(String),

    #[error("Resources of domain {0} cannot be deployed into an instance")]
    NotDeployable(ResourceDomain),

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Formats ─────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type ResourceResult<T> = Result<T, ResourceError>;

impl ResourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ResourceError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(resource_type: ResourceType, reason: impl Into<String>) -> Self {
        ResourceError::Parse {
            resource_type,
            reason: reason.into(),
        }
    }

    /// True for `NotFound` I/O failures, which several idempotent operations ignore.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ResourceError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(source: std::io::Error) -> Self {
        ResourceError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for the UI layer ──────────────────────
// Failed imports are surfaced to the frontend as plain messages.
impl serde::Serialize for ResourceError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
