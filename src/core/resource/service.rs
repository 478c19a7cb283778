use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::archive::ArchiveView;
use super::builder::ResourceBuilder;
use super::events::{report, ImportPhase, ProgressSink, ResourceEvent, ResourceEventSink};
use super::in_flight::InFlight;
use super::index::{ResourceIndex, ResourceQuery};
use super::model::{count_by_domain, CurseforgeSource, IndexKey, Resource, ResourceDomain};
use super::registry::{Resolution, TypeHint, TypeRegistry};
use super::store::{stat, ResourceStore};
use crate::core::downloader::Downloader;
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::fs::{
    copy_dir_recursive, dotted_extension, file_stem, link_or_copy, remove_path, safe_path,
    sanitize_file_stem, DeployMode, FileStamp,
};
use crate::core::hash::{fingerprint_directory, read_and_hash, sniff_type};
use crate::core::state::ResourceSettings;

/// Extension used to pick candidates for unpacked folders, which are the
/// extracted form of zip based resources.
const DIRECTORY_EXTENSION: &str = ".zip";

/// What to import and what is known about where it came from.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub path: PathBuf,
    pub source_uris: Vec<String>,
    pub curseforge: Option<CurseforgeSource>,
    pub type_hint: TypeHint,
    /// Record `file://<path>` as a source URI. Off for staged downloads.
    pub record_path_uri: bool,
}

impl ImportOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            record_path_uri: true,
            ..Default::default()
        }
    }

    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uris.push(uri.into());
        self
    }

    pub fn with_curseforge(mut self, source: CurseforgeSource) -> Self {
        self.curseforge = Some(source);
        self
    }

    pub fn with_type_hint(mut self, hint: TypeHint) -> Self {
        self.type_hint = hint;
        self
    }

    fn all_source_uris(&self) -> Vec<String> {
        let mut uris = Vec::new();
        if self.record_path_uri {
            uris.push(file_uri(&self.path));
        }
        for uri in &self.source_uris {
            if !uri.is_empty() && !uris.contains(uri) {
                uris.push(uri.clone());
            }
        }
        uris
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub resource: Arc<Resource>,
    pub was_newly_imported: bool,
}

impl ImportOutcome {
    fn existing(resource: Arc<Resource>) -> Self {
        Self {
            resource,
            was_newly_imported: false,
        }
    }
}

/// Import pipeline and query surface over the managed content area.
///
/// The index is only touched after the store has durably accepted a change,
/// so a failed import never leaves a key behind.
pub struct ResourceService {
    inner: Arc<Inner>,
    registry: Arc<TypeRegistry>,
    in_flight: InFlight<ImportOutcome>,
    downloader: Downloader,
    settings: ResourceSettings,
}

/// State that commit tasks share with the service.
struct Inner {
    store: ResourceStore,
    index: RwLock<ResourceIndex>,
    /// Serializes writes to the managed content area.
    store_lock: Mutex<()>,
    sink: Arc<dyn ResourceEventSink>,
}

impl ResourceService {
    /// Open the content area at `root` and rebuild the index from its sidecars.
    pub async fn open(
        root: impl Into<PathBuf>,
        registry: TypeRegistry,
        sink: Arc<dyn ResourceEventSink>,
        settings: ResourceSettings,
    ) -> ResourceResult<Self> {
        let store = ResourceStore::new(root);
        store.ensure_layout().await?;

        let service = Self {
            inner: Arc::new(Inner {
                store,
                index: RwLock::new(ResourceIndex::new()),
                store_lock: Mutex::new(()),
                sink,
            }),
            registry: Arc::new(registry),
            in_flight: InFlight::new(),
            downloader: Downloader::new()?,
            settings,
        };
        service.rebuild().await?;
        Ok(service)
    }

    pub fn root(&self) -> &Path {
        self.inner.store.root()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ResourceSettings {
        &self.settings
    }

    /// Replace the in-memory index with what the sidecars on disk describe.
    /// Returns the number of resources loaded.
    pub async fn rebuild(&self) -> ResourceResult<usize> {
        let report = self.inner.store.load_all().await?;
        let counts = count_by_domain(&report.resources);
        let index = ResourceIndex::from_resources(report.resources);
        let loaded = index.len();

        *self.inner.index.write().await = index;
        info!(
            "Resource index rebuilt: {} resources {:?}, {} sidecars skipped",
            loaded,
            counts,
            report.skipped.len()
        );
        Ok(loaded)
    }

    // ── Queries ─────────────────────────────────────────

    pub async fn get_by_key(&self, key: &IndexKey) -> Option<Arc<Resource>> {
        self.inner.index.read().await.get(key)
    }

    pub async fn query(&self, query: &ResourceQuery) -> Option<Arc<Resource>> {
        self.inner.index.read().await.query(query)
    }

    /// Every resource, or those of one domain, ordered by name.
    pub async fn list(&self, domain: Option<ResourceDomain>) -> Vec<Arc<Resource>> {
        let index = self.inner.index.read().await;
        let mut resources: Vec<Arc<Resource>> = match domain {
            Some(domain) => index.in_domain(domain).cloned().collect(),
            None => index.resources().cloned().collect(),
        };
        resources.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.hash.cmp(&b.hash))
        });
        resources
    }

    pub async fn len(&self) -> usize {
        self.inner.index.read().await.len()
    }

    pub async fn keys_of(&self, hash: &str) -> Vec<IndexKey> {
        self.inner.index.read().await.keys_of(hash)
    }

    // ── Import ──────────────────────────────────────────

    pub async fn import_resource(&self, options: ImportOptions) -> ResourceResult<ImportOutcome> {
        self.import_resource_with_progress(options, None).await
    }

    /// Import a single file.
    ///
    /// A file whose device, inode, size and modification time match what was
    /// recorded at its last import is returned without hashing; known content
    /// is returned with the new source URIs merged in. Concurrent imports of
    /// the same file or content share one run.
    pub async fn import_resource_with_progress(
        &self,
        options: ImportOptions,
        progress: Option<&dyn ProgressSink>,
    ) -> ResourceResult<ImportOutcome> {
        let label = options.path.display().to_string();
        report(progress, ImportPhase::Start, &label);

        let file = stat(&options.path).await?;
        if file.is_dir {
            return Err(ResourceError::NotAFile(options.path.clone()));
        }

        let source_uris = options.all_source_uris();
        let key = match file.stamp {
            Some(stamp) => format!("file:{}", stamp.id),
            None => format!("path:{}", safe_path(&options.path).display()),
        };
        // Staged downloads are deleted afterwards; their identity means nothing.
        let source_file = file.stamp.filter(|_| options.record_path_uri);

        let (outcome, leader) = self
            .in_flight
            .run(&key, || {
                self.import_file(&options, source_file, &source_uris, progress, &label)
            })
            .await?;
        let outcome = if leader {
            outcome
        } else {
            self.merge_sources(outcome.resource, &source_uris, options.curseforge, source_file)
                .await?
        };

        report(progress, ImportPhase::Persisted, &label);
        Ok(outcome)
    }

    /// Import many files, at most `import_concurrency` at a time. Results are
    /// in input order; one failure does not stop the others.
    pub async fn import_resources(
        &self,
        list: Vec<ImportOptions>,
    ) -> Vec<ResourceResult<ImportOutcome>> {
        let concurrency = self.settings.import_concurrency.max(1);
        info!(
            "Importing {} resources, concurrency={}",
            list.len(),
            concurrency
        );

        stream::iter(list)
            .map(|options| self.import_resource(options))
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn import_file(
        &self,
        options: &ImportOptions,
        source_file: Option<FileStamp>,
        source_uris: &[String],
        progress: Option<&dyn ProgressSink>,
        label: &str,
    ) -> ResourceResult<ImportOutcome> {
        if let Some(existing) = self.known_source_file(source_file).await {
            debug!("{:?} unchanged since last import, skipping hash", options.path);
            return self
                .merge_sources(existing, source_uris, options.curseforge, None)
                .await;
        }

        let (bytes, hash) = read_and_hash(&options.path).await?;
        report(progress, ImportPhase::Hashed, label);

        // A file that changed while being read is not vouched for.
        let source_file = match source_file {
            Some(before) => stat(&options.path)
                .await
                .ok()
                .and_then(|now| now.stamp)
                .filter(|now| *now == before),
            None => None,
        };

        let (outcome, leader) = self
            .in_flight
            .run(&format!("hash:{}", hash), || {
                self.import_content(options, bytes, &hash, source_uris, source_file, progress, label)
            })
            .await?;
        if leader {
            Ok(outcome)
        } else {
            self.merge_sources(outcome.resource, source_uris, options.curseforge, source_file)
                .await
        }
    }

    /// The resource last imported from this exact file, if the file has not
    /// changed since.
    async fn known_source_file(&self, stamp: Option<FileStamp>) -> Option<Arc<Resource>> {
        let stamp = stamp?;
        let existing = self.inner.index.read().await.get(&IndexKey::File(stamp.id))?;
        if existing.source_file(stamp.id) == Some(&stamp) {
            return Some(existing);
        }
        warn!(
            "File {} changed since {} was imported from it, re-hashing",
            stamp.id, existing.hash
        );
        None
    }

    #[allow(clippy::too_many_arguments)]
    async fn import_content(
        &self,
        options: &ImportOptions,
        bytes: Vec<u8>,
        hash: &str,
        source_uris: &[String],
        source_file: Option<FileStamp>,
        progress: Option<&dyn ProgressSink>,
        label: &str,
    ) -> ResourceResult<ImportOutcome> {
        let existing = self.inner.index.read().await.get_by_hash(hash);
        if let Some(existing) = existing {
            debug!("Content {} already known, merging sources", hash);
            return self
                .merge_sources(existing, source_uris, options.curseforge, source_file)
                .await;
        }

        let ext = dotted_extension(&options.path);
        let guess = sniff_type(&mut bytes.as_slice()).await;
        let resolution = if guess.is_archive() {
            let registry = self.registry.clone();
            let (ext, hint) = (ext.clone(), options.type_hint);
            tokio::task::spawn_blocking(move || registry.resolve_bytes(bytes, &ext, hint))
                .await
                .map_err(|e| ResourceError::Other(format!("Resolve task failed: {}", e)))?
        } else {
            debug!("{:?} sniffed as {:?}, not probing parsers", options.path, guess);
            Resolution::unknown()
        };
        report(progress, ImportPhase::Resolved, label);

        let mut builder = ResourceBuilder::new();
        builder
            .with_metadata(resolution)
            .with_extension(ext.clone())
            .with_source_uris(source_uris.iter().cloned())
            .with_curseforge(options.curseforge)
            .with_source_file(source_file);

        let resource = self
            .persist_new(builder, &options.path, hash, &ext)
            .await?;
        Ok(ImportOutcome {
            resource,
            was_newly_imported: true,
        })
    }

    /// Import an unpacked folder (a save, an extracted modpack).
    ///
    /// Identity is a fingerprint of the folder's file layout, so the content
    /// is never read in full.
    pub async fn import_directory(
        &self,
        path: impl AsRef<Path>,
        source_uris: Vec<String>,
        type_hint: TypeHint,
    ) -> ResourceResult<ImportOutcome> {
        let path = path.as_ref().to_path_buf();
        if !stat(&path).await?.is_dir {
            return Err(ResourceError::Other(format!("Not a directory: {:?}", path)));
        }

        let mut options = ImportOptions::new(&path).with_type_hint(type_hint);
        options.source_uris = source_uris;
        let source_uris = options.all_source_uris();

        let fingerprint = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || fingerprint_directory(&path))
                .await
                .map_err(|e| ResourceError::Other(format!("Fingerprint task failed: {}", e)))??
        };

        let (outcome, leader) = self
            .in_flight
            .run(&format!("hash:{}", fingerprint), || {
                self.import_folder(&path, &fingerprint, &source_uris, type_hint)
            })
            .await?;
        if leader {
            Ok(outcome)
        } else {
            self.merge_sources(outcome.resource, &source_uris, None, None)
                .await
        }
    }

    async fn import_folder(
        &self,
        path: &Path,
        fingerprint: &str,
        source_uris: &[String],
        type_hint: TypeHint,
    ) -> ResourceResult<ImportOutcome> {
        let existing = self.inner.index.read().await.get_by_hash(fingerprint);
        if let Some(existing) = existing {
            return self.merge_sources(existing, source_uris, None, None).await;
        }

        let registry = self.registry.clone();
        let folder = path.to_path_buf();
        let resolution = tokio::task::spawn_blocking(move || {
            let mut view = ArchiveView::from_directory(folder);
            registry.resolve(&mut view, DIRECTORY_EXTENSION, type_hint)
        })
        .await
        .map_err(|e| ResourceError::Other(format!("Resolve task failed: {}", e)))?;

        let mut builder = ResourceBuilder::new();
        builder
            .with_metadata(resolution)
            .with_extension("")
            .with_source_uris(source_uris.iter().cloned());

        let resource = self.persist_new(builder, path, fingerprint, "").await?;
        Ok(ImportOutcome {
            resource,
            was_newly_imported: true,
        })
    }

    /// Download `url` into the staging area and import it with the URL as a
    /// source URI. The staged copy is removed afterwards.
    pub async fn import_from_url(
        &self,
        url: &str,
        sha1: Option<&str>,
        type_hint: TypeHint,
        curseforge: Option<CurseforgeSource>,
    ) -> ResourceResult<ImportOutcome> {
        let staging = self.inner.store.staging_dir().join(Uuid::new_v4().to_string());
        let dest = staging.join(url_file_name(url));

        let result = async {
            self.downloader.download_file(url, &dest, sha1).await?;
            let mut options = ImportOptions::new(&dest)
                .with_source_uri(url)
                .with_type_hint(type_hint);
            options.curseforge = curseforge;
            options.record_path_uri = false;
            self.import_resource(options).await
        }
        .await;

        if let Err(e) = remove_path(&staging).await {
            warn!("Could not clean staging folder {:?}: {}", staging, e);
        }
        result
    }

    /// Run a store-and-publish step on its own task, so a caller that stops
    /// waiting cannot abort it between writing content and writing its sidecar.
    async fn commit<T, F, Fut>(&self, op: F) -> ResourceResult<T>
    where
        F: FnOnce(Arc<Inner>) -> Fut,
        Fut: Future<Output = ResourceResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(op(self.inner.clone()))
            .await
            .map_err(|e| ResourceError::Other(format!("Commit task failed: {}", e)))?
    }

    async fn persist_new(
        &self,
        builder: ResourceBuilder,
        src: &Path,
        hash: &str,
        ext: &str,
    ) -> ResourceResult<Arc<Resource>> {
        let (src, hash, ext) = (src.to_path_buf(), hash.to_string(), ext.to_string());
        self.commit(move |inner| async move { inner.persist_new(builder, &src, &hash, &ext).await })
            .await
    }

    async fn merge_sources(
        &self,
        existing: Arc<Resource>,
        source_uris: &[String],
        curseforge: Option<CurseforgeSource>,
        source_file: Option<FileStamp>,
    ) -> ResourceResult<ImportOutcome> {
        let source_uris = source_uris.to_vec();
        self.commit(move |inner| async move {
            inner
                .merge_sources(existing, &source_uris, curseforge, source_file)
                .await
        })
        .await
    }

    // ── Mutations ───────────────────────────────────────

    /// Delete a resource with its stored content. Unknown keys are a no-op.
    pub async fn remove_resource(&self, key: &IndexKey) -> ResourceResult<Option<Arc<Resource>>> {
        let _guard = self.inner.store_lock.lock().await;
        let Some(resource) = self.get_by_key(key).await else {
            debug!("Nothing to remove for {:?}", key);
            return Ok(None);
        };

        self.inner.store.delete(&resource).await?;
        self.inner.index.write().await.remove(&resource.hash);
        drop(_guard);

        info!("Removed resource {} ({})", resource.name, resource.hash);
        self.inner
            .sink
            .notify(ResourceEvent::ResourceRemoved(resource.clone()))
            .await;
        Ok(Some(resource))
    }

    /// Change the display name. The stored file keeps its name.
    pub async fn rename_resource(&self, key: &IndexKey, name: &str) -> ResourceResult<Arc<Resource>> {
        if name.trim().is_empty() {
            return Err(ResourceError::Other("Resource name cannot be empty".into()));
        }

        let renamed = {
            let _guard = self.inner.store_lock.lock().await;
            let current = self
                .get_by_key(key)
                .await
                .ok_or_else(|| ResourceError::ResourceNotFound(format!("{:?}", key)))?;

            let mut builder = ResourceBuilder::from_resource(&current);
            builder.with_name(name);
            let renamed = Arc::new(builder.finalize()?);

            self.inner.store.write_sidecar(&renamed).await?;
            self.inner.index.write().await.add(renamed.clone());
            renamed
        };

        info!("Renamed resource {} to '{}'", renamed.hash, renamed.name);
        self.inner
            .sink
            .notify(ResourceEvent::ResourceAdded(renamed.clone()))
            .await;
        Ok(renamed)
    }

    /// Re-stat the stored content. A resource whose content is gone is
    /// removed and `None` returned.
    pub async fn refresh_resource(&self, key: &IndexKey) -> ResourceResult<Option<Arc<Resource>>> {
        let _guard = self.inner.store_lock.lock().await;
        let current = self
            .get_by_key(key)
            .await
            .ok_or_else(|| ResourceError::ResourceNotFound(format!("{:?}", key)))?;

        let stored = match stat(&current.path).await {
            Ok(stored) => stored,
            Err(e) if e.is_not_found() => {
                self.inner.store.delete(&current).await?;
                self.inner.index.write().await.remove(&current.hash);
                drop(_guard);

                warn!("Content of {} is gone, dropping it", current.hash);
                self.inner
                    .sink
                    .notify(ResourceEvent::ResourceRemoved(current))
                    .await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut builder = ResourceBuilder::from_resource(&current);
        builder.with_stat_info(stored.ino, stored.size);
        let refreshed = Arc::new(builder.finalize()?);
        if refreshed == current {
            return Ok(Some(current));
        }

        self.inner.index.write().await.add(refreshed.clone());
        drop(_guard);

        debug!("Refreshed stat info of {}", refreshed.hash);
        self.inner
            .sink
            .notify(ResourceEvent::ResourceAdded(refreshed.clone()))
            .await;
        Ok(Some(refreshed))
    }

    /// Copy resources out of the managed area. The index is not touched.
    pub async fn export_resource(
        &self,
        keys: &[IndexKey],
        target_dir: &Path,
    ) -> ResourceResult<Vec<PathBuf>> {
        let mut resources = Vec::with_capacity(keys.len());
        for key in keys {
            let resource = self
                .get_by_key(key)
                .await
                .ok_or_else(|| ResourceError::ResourceNotFound(format!("{:?}", key)))?;
            resources.push(resource);
        }

        let mut exported = Vec::with_capacity(resources.len());
        for resource in resources {
            let dest = target_dir.join(export_file_name(&resource));
            if stat(&resource.path).await?.is_dir {
                let (src, dst) = (resource.path.clone(), dest.clone());
                tokio::task::spawn_blocking(move || {
                    copy_dir_recursive(&src, &dst).map_err(|e| ResourceError::io(&dst, e))
                })
                .await
                .map_err(|e| ResourceError::Other(format!("Copy task failed: {}", e)))??;
            } else {
                link_or_copy(&resource.path, &dest, DeployMode::Copy).await?;
            }
            debug!("Exported {} to {:?}", resource.hash, dest);
            exported.push(dest);
        }
        Ok(exported)
    }
}

impl Inner {
    /// Store content, write its sidecar, then publish it.
    async fn persist_new(
        &self,
        mut builder: ResourceBuilder,
        src: &Path,
        hash: &str,
        ext: &str,
    ) -> ResourceResult<Arc<Resource>> {
        let name = builder
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(src));
        let domain = builder.domain();

        let resource = {
            let _guard = self.store_lock.lock().await;

            let file_name = self
                .store
                .allocate_file_name(domain, &name, ext, hash)
                .await;
            let dest = self.store.content_path(domain, &file_name);
            if let Err(e) = self.store.store_content(src, &dest).await {
                let _ = remove_path(&dest).await;
                return Err(e);
            }

            let stored = match stat(&dest).await {
                Ok(stored) => stored,
                Err(e) => {
                    let _ = remove_path(&dest).await;
                    return Err(e);
                }
            };

            builder
                .with_name(name)
                .with_file_name(file_name)
                .with_path_and_hash(&dest, hash)
                .with_stat_info(stored.ino, stored.size);
            let resource = match builder.finalize() {
                Ok(resource) => Arc::new(resource),
                Err(e) => {
                    let _ = remove_path(&dest).await;
                    return Err(e);
                }
            };

            if let Err(e) = self.store.write_sidecar(&resource).await {
                let _ = remove_path(&dest).await;
                return Err(e);
            }
            self.index.write().await.add(resource.clone());
            resource
        };

        info!(
            "Imported {} as {} [{}] ({})",
            src.display(),
            resource.name,
            resource.resource_type,
            resource.hash
        );
        self.sink
            .notify(ResourceEvent::ResourceAdded(resource.clone()))
            .await;
        Ok(resource)
    }

    /// Fold new provenance into a known resource, superseding its record when
    /// anything changed.
    async fn merge_sources(
        &self,
        existing: Arc<Resource>,
        source_uris: &[String],
        curseforge: Option<CurseforgeSource>,
        source_file: Option<FileStamp>,
    ) -> ResourceResult<ImportOutcome> {
        let adds_uri = source_uris
            .iter()
            .any(|uri| !existing.source_uris.contains(uri));
        let adds_curseforge = curseforge.is_some() && curseforge != existing.curseforge;
        let adds_file =
            source_file.is_some_and(|stamp| existing.source_file(stamp.id) != Some(&stamp));
        if !adds_uri && !adds_curseforge && !adds_file {
            return Ok(ImportOutcome::existing(existing));
        }

        let updated = {
            let _guard = self.store_lock.lock().await;
            let current = self.index.read().await.get_by_hash(&existing.hash);
            let Some(current) = current else {
                return Ok(ImportOutcome::existing(existing));
            };

            let mut builder = ResourceBuilder::from_resource(&current);
            builder
                .with_source_uris(source_uris.iter().cloned())
                .with_curseforge(curseforge)
                .with_source_file(source_file);
            let updated = Arc::new(builder.finalize()?);
            if updated == current {
                return Ok(ImportOutcome::existing(current));
            }

            self.store.write_sidecar(&updated).await?;
            self.index.write().await.add(updated.clone());
            updated
        };

        debug!(
            "Merged sources into {}: {:?}",
            updated.hash, updated.source_uris
        );
        self.sink
            .notify(ResourceEvent::ResourceAdded(updated.clone()))
            .await;
        Ok(ImportOutcome::existing(updated))
    }
}

/// `file://` URI of a local path, canonicalized when possible.
pub fn file_uri(path: &Path) -> String {
    let path = safe_path(path);
    let display = path.to_string_lossy().replace('\\', "/");
    if display.starts_with('/') {
        format!("file://{}", display)
    } else {
        format!("file:///{}", display)
    }
}

/// Exported files carry the display name with the original extension.
fn export_file_name(resource: &Resource) -> String {
    format!("{}{}", sanitize_file_stem(&resource.name), resource.ext)
}

/// Last path segment of a URL, without query or fragment.
fn url_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    if segment.is_empty() || segment.contains(':') {
        "download".to_string()
    } else {
        segment.to_string()
    }
}
