use std::path::Path;
use std::sync::Arc;

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{ResourceError, ResourceResult};
use crate::core::hash::content_hash;
use crate::core::http::build_http_client;

/// Reported once a download has been written to disk.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub url: String,
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
    pub file_name: String,
}

pub type DownloadCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// SHA-1 validated HTTP downloader used by URL imports.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    on_progress: Option<DownloadCallback>,
}

impl Downloader {
    pub fn new() -> ResourceResult<Self> {
        Ok(Self {
            client: build_http_client()?,
            on_progress: None,
        })
    }

    pub fn with_progress(mut self, callback: DownloadCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Download `url` to `dest`, optionally validating SHA-1. Returns the
    /// number of bytes written.
    ///
    /// Creates parent directories as needed. Nothing is written when the
    /// checksum does not match.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> ResourceResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ResourceError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        let bytes = response.bytes().await?;

        if let Some(expected) = sha1_expected {
            let actual = content_hash(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(ResourceError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        // Scoped so the handle is closed before anyone reads the file back.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| ResourceError::io(dest, e))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| ResourceError::io(dest, e))?;
            file.flush().await.map_err(|e| ResourceError::io(dest, e))?;
        }

        if let Some(callback) = &self.on_progress {
            let file_name = dest
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            callback(DownloadProgress {
                url: url.to_string(),
                bytes_downloaded: bytes.len() as u64,
                total_bytes,
                file_name,
            });
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::core::resource::test_support::serve_once;

    #[tokio::test]
    async fn downloads_and_validates_checksum() {
        let url = serve_once(200, b"0123456789".to_vec()).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/file.bin");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let downloader = Downloader::new()
            .unwrap()
            .with_progress(Arc::new(move |p: DownloadProgress| {
                sink.lock().unwrap().push(p.bytes_downloaded)
            }));

        let expected = content_hash(b"0123456789");
        let written = downloader
            .download_file(&url, &dest, Some(&expected))
            .await
            .unwrap();
        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"0123456789");
        assert_eq!(*seen.lock().unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn checksum_mismatch_writes_nothing() {
        let url = serve_once(200, b"payload".to_vec()).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");

        let err = Downloader::new()
            .unwrap()
            .download_file(&url, &dest, Some("0000"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Sha1Mismatch { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn http_errors_surface_status() {
        let url = serve_once(404, Vec::new()).await;
        let dir = tempfile::tempdir().unwrap();
        let err = Downloader::new()
            .unwrap()
            .download_file(&url, &dir.path().join("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::DownloadFailed { status: 404, .. }));
    }
}
