use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::error::{ResourceError, ResourceResult};

/// Number of leading bytes inspected by [`sniff_type`].
pub const SNIFF_LEN: usize = 8;

/// Coarse file type guess from magic bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileTypeGuess {
    /// Zip container (covers `.jar`, `.litemod` and plain `.zip`).
    Zip,
    Gzip,
    Png,
    Unknown,
}

impl FileTypeGuess {
    pub fn is_archive(self) -> bool {
        matches!(self, FileTypeGuess::Zip)
    }
}

/// SHA-1 of the full content, lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Classify a prefix of a file by its magic bytes.
pub fn sniff_bytes(prefix: &[u8]) -> FileTypeGuess {
    match prefix {
        [0x50, 0x4b, 0x03, 0x04, ..] | [0x50, 0x4b, 0x05, 0x06, ..] | [0x50, 0x4b, 0x07, 0x08, ..] => {
            FileTypeGuess::Zip
        }
        [0x1f, 0x8b, ..] => FileTypeGuess::Gzip,
        [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, ..] => FileTypeGuess::Png,
        _ => FileTypeGuess::Unknown,
    }
}

/// Read at most [`SNIFF_LEN`] bytes from `reader` and classify them.
///
/// Read failures and short streams yield [`FileTypeGuess::Unknown`].
pub async fn sniff_type<R: AsyncRead + Unpin>(reader: &mut R) -> FileTypeGuess {
    let mut prefix = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        match reader.read(&mut prefix[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => return FileTypeGuess::Unknown,
        }
    }
    sniff_bytes(&prefix[..filled])
}

/// Read a whole file and hash it off the async runtime.
pub async fn read_and_hash(path: &Path) -> ResourceResult<(Vec<u8>, String)> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ResourceError::io(path, e))?;
    tokio::task::spawn_blocking(move || {
        let hash = content_hash(&bytes);
        (bytes, hash)
    })
    .await
    .map_err(|e| ResourceError::Other(format!("Hashing task failed: {}", e)))
}

/// Structural identity of a directory: SHA-1 over its sorted relative file
/// paths and sizes. File contents are not read.
pub fn fingerprint_directory(root: &Path) -> ResourceResult<String> {
    let mut entries = Vec::new();
    collect_files(root, root, &mut entries)?;
    entries.sort();

    let mut hasher = Sha1::new();
    for (relative, size) in &entries {
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(size.to_le_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, u64)>) -> ResourceResult<()> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| ResourceError::io(dir, e))?;
    for entry in read_dir {
        let entry = entry.map_err(|e| ResourceError::io(dir, e))?;
        let path: PathBuf = entry.path();
        let file_type = entry.file_type().map_err(|e| ResourceError::io(&path, e))?;
        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            let size = entry
                .metadata()
                .map_err(|e| ResourceError::io(&path, e))?
                .len();
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.push((relative, size));
        }
    }
    Ok(())
}
