use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::model::{Resource, ResourceDomain};
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::fs::{
    copy_dir_recursive, create_dir_safe, file_id, remove_path, sanitize_file_stem, write_atomic,
    FileStamp,
};

const SIDECAR_EXT: &str = ".json";
/// Suffix for stored content that is itself JSON, so it never shadows a sidecar.
const JSON_CONTENT_SUFFIX: &str = ".content.json";
const STAGING_DIR: &str = ".staging";

/// Stat result used to refresh volatile fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub ino: u64,
    pub size: u64,
    pub is_dir: bool,
    /// `None` where the platform has no inode numbers.
    pub stamp: Option<FileStamp>,
}

pub async fn stat(path: &Path) -> ResourceResult<FileStat> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ResourceError::io(path, e))?;
    Ok(FileStat {
        ino: file_id(&metadata).map_or(0, |id| id.ino),
        size: metadata.len(),
        is_dir: metadata.is_dir(),
        stamp: FileStamp::of(&metadata),
    })
}

/// Sidecars that could not be turned back into resources.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub resources: Vec<Resource>,
    pub skipped: Vec<PathBuf>,
}

/// On-disk layout of the managed content area:
///
/// ```text
/// <root>/<domain>/<stem><ext>   stored content (file or folder)
/// <root>/<domain>/<stem>.json   sidecar
/// <root>/.staging/              downloads waiting for import
/// ```
#[derive(Debug, Clone)]
pub struct ResourceStore {
    root: PathBuf,
}

impl ResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn domain_dir(&self, domain: ResourceDomain) -> PathBuf {
        self.root.join(domain.as_str())
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    pub fn sidecar_path(&self, resource: &Resource) -> PathBuf {
        let stem = resource
            .file_name
            .strip_suffix(JSON_CONTENT_SUFFIX)
            .unwrap_or_else(|| resource.storage_stem());
        self.domain_dir(resource.domain)
            .join(format!("{}{}", stem, SIDECAR_EXT))
    }

    pub fn content_path(&self, domain: ResourceDomain, file_name: &str) -> PathBuf {
        self.domain_dir(domain).join(file_name)
    }

    /// Pick a free stored file name for `name`. When the plain name is taken,
    /// the first 8 hex digits of the hash are appended.
    pub async fn allocate_file_name(
        &self,
        domain: ResourceDomain,
        name: &str,
        ext: &str,
        hash: &str,
    ) -> String {
        let dir = self.domain_dir(domain);
        let base = sanitize_file_stem(name);
        let short_hash = &hash[..hash.len().min(8)];

        for stem in [base.clone(), format!("{}-{}", base, short_hash)] {
            let file_name = content_file_name(&stem, ext);
            let taken = path_exists(&dir.join(&file_name)).await
                || path_exists(&dir.join(format!("{}{}", stem, SIDECAR_EXT))).await;
            if !taken {
                return file_name;
            }
        }
        content_file_name(&format!("{}-{}", base, hash), ext)
    }

    /// Copy `src` into the content area at `dest` (file or folder). Never a
    /// link: the stored bytes must keep matching their hash whatever happens
    /// to the source.
    pub async fn store_content(&self, src: &Path, dest: &Path) -> ResourceResult<()> {
        let source = stat(src).await?;
        if source.is_dir {
            let (src, dest) = (src.to_path_buf(), dest.to_path_buf());
            tokio::task::spawn_blocking(move || {
                copy_dir_recursive(&src, &dest).map_err(|e| ResourceError::io(&dest, e))
            })
            .await
            .map_err(|e| ResourceError::Other(format!("Copy task failed: {}", e)))??;
        } else {
            if let Some(parent) = dest.parent() {
                create_dir_safe(parent).await?;
            }
            tokio::fs::copy(src, dest)
                .await
                .map_err(|e| ResourceError::io(dest, e))?;
            debug!("Stored {:?} as {:?}", src, dest);
        }
        Ok(())
    }

    /// Write the sidecar for `resource`, replacing any previous version.
    pub async fn write_sidecar(&self, resource: &Resource) -> ResourceResult<PathBuf> {
        let path = self.sidecar_path(resource);
        let json = serde_json::to_vec_pretty(resource)?;
        write_atomic(&path, &json).await?;
        Ok(path)
    }

    /// Read one sidecar and re-derive the volatile fields from its content.
    pub async fn load_sidecar(&self, domain: ResourceDomain, path: &Path) -> ResourceResult<Resource> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| ResourceError::io(path, e))?;
        let mut resource: Resource = serde_json::from_slice(&raw)?;

        resource.domain = domain;
        resource.path = self.content_path(domain, &resource.file_name);
        let content = stat(&resource.path).await?;
        resource.ino = content.ino;
        resource.size = content.size;
        Ok(resource)
    }

    /// Every resource that has a readable sidecar and existing content.
    /// Anything else is logged and skipped.
    pub async fn load_all(&self) -> ResourceResult<LoadReport> {
        let mut report = LoadReport::default();

        for domain in ResourceDomain::ALL {
            let dir = self.domain_dir(domain);
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ResourceError::io(&dir, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ResourceError::io(&dir, e))?
            {
                let path = entry.path();
                if !is_sidecar(&path) {
                    continue;
                }
                match self.load_sidecar(domain, &path).await {
                    Ok(resource) => report.resources.push(resource),
                    Err(e) => {
                        warn!("Skipping sidecar {:?}: {}", path, e);
                        report.skipped.push(path);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Delete the stored content and the sidecar. Missing files are fine.
    pub async fn delete(&self, resource: &Resource) -> ResourceResult<()> {
        remove_path(&resource.path).await?;
        remove_path(&self.sidecar_path(resource)).await?;
        Ok(())
    }

    pub async fn ensure_layout(&self) -> ResourceResult<()> {
        for domain in ResourceDomain::ALL {
            create_dir_safe(&self.domain_dir(domain)).await?;
        }
        create_dir_safe(&self.staging_dir()).await
    }
}

fn content_file_name(stem: &str, ext: &str) -> String {
    if ext.eq_ignore_ascii_case(SIDECAR_EXT) {
        format!("{}{}", stem, JSON_CONTENT_SUFFIX)
    } else {
        format!("{}{}", stem, ext)
    }
}

fn is_sidecar(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.ends_with(SIDECAR_EXT) && !name.ends_with(JSON_CONTENT_SUFFIX) && path.is_file()
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::test_support::resource;

    #[tokio::test]
    async fn allocates_suffixed_name_when_taken() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(dir.path());
        store.ensure_layout().await.unwrap();

        let first = store
            .allocate_file_name(ResourceDomain::Mods, "JEI-15", ".jar", "0123456789abcdef")
            .await;
        assert_eq!(first, "JEI-15.jar");

        std::fs::write(store.domain_dir(ResourceDomain::Mods).join(&first), b"x").unwrap();
        let second = store
            .allocate_file_name(ResourceDomain::Mods, "JEI-15", ".jar", "0123456789abcdef")
            .await;
        assert_eq!(second, "JEI-15-01234567.jar");
    }

    #[tokio::test]
    async fn json_content_does_not_shadow_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(dir.path());
        let name = store
            .allocate_file_name(ResourceDomain::Unknown, "options", ".json", "ff")
            .await;
        assert_eq!(name, "options.content.json");
        assert!(!is_sidecar(Path::new("/x/options.content.json")));
    }

    #[tokio::test]
    async fn sidecars_round_trip_through_load_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(dir.path());
        store.ensure_layout().await.unwrap();

        let content = store.content_path(ResourceDomain::Mods, "a.jar");
        std::fs::write(&content, b"0123456789").unwrap();
        let mut r = resource("aaa", content.to_str().unwrap(), 0, &["file:///src/a.jar"]);
        r.file_name = "a.jar".into();
        store.write_sidecar(&r).await.unwrap();

        let report = store.load_all().await.unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(report.resources.len(), 1);
        let loaded = &report.resources[0];
        assert_eq!(loaded.hash, "aaa");
        assert_eq!(loaded.size, 10);
        assert_eq!(loaded.path, content);
        assert_eq!(loaded.source_uris, r.source_uris);
    }

    #[tokio::test]
    async fn corrupt_or_orphaned_sidecars_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(dir.path());
        store.ensure_layout().await.unwrap();

        let mods = store.domain_dir(ResourceDomain::Mods);
        std::fs::write(mods.join("broken.json"), b"{ not json").unwrap();
        let mut orphan = resource("bbb", mods.join("gone.jar").to_str().unwrap(), 0, &[]);
        orphan.file_name = "gone.jar".into();
        store.write_sidecar(&orphan).await.unwrap();

        let report = store.load_all().await.unwrap();
        assert!(report.resources.is_empty());
        assert_eq!(report.skipped.len(), 2);
    }

    #[tokio::test]
    async fn stored_content_is_a_copy_of_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(dir.path().join("store"));
        let src = dir.path().join("blob.bin");
        std::fs::write(&src, b"AAAAAAAAAA").unwrap();

        let dest = store.content_path(ResourceDomain::Unknown, "blob.bin");
        store.store_content(&src, &dest).await.unwrap();
        std::fs::write(&src, b"BBBBBBBBBB").unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"AAAAAAAAAA");
        let (src, dest) = (stat(&src).await.unwrap(), stat(&dest).await.unwrap());
        if let (Some(a), Some(b)) = (src.stamp, dest.stamp) {
            assert_ne!(a.id, b.id);
        }
    }

    #[tokio::test]
    async fn delete_removes_content_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(dir.path());
        let content = store.content_path(ResourceDomain::Mods, "a.jar");
        std::fs::create_dir_all(content.parent().unwrap()).unwrap();
        std::fs::write(&content, b"x").unwrap();
        let mut r = resource("aaa", content.to_str().unwrap(), 0, &[]);
        r.file_name = "a.jar".into();
        let sidecar = store.write_sidecar(&r).await.unwrap();

        store.delete(&r).await.unwrap();
        assert!(!content.exists());
        assert!(!sidecar.exists());
        store.delete(&r).await.unwrap();
    }
}
