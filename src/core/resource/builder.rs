use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::model::{CurseforgeSource, Resource, ResourceDomain, ResourceMetadata, ResourceType};
use super::registry::Resolution;
use super::types::{content_uri, ResourceParser, TypeDescriptor};
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::fs::{dotted_extension, file_stem, FileStamp};

/// Mutable accumulator for a single import or refresh. Every `with_*` step is
/// independent; [`ResourceBuilder::finalize`] turns the result into an
/// immutable [`Resource`] once hash and path are known.
#[derive(Debug, Clone, Default)]
pub struct ResourceBuilder {
    hash: Option<String>,
    path: Option<PathBuf>,
    ino: u64,
    size: u64,
    ext: Option<String>,
    source_uris: Vec<String>,
    curseforge: Option<CurseforgeSource>,
    source_files: Vec<FileStamp>,

    descriptor: Option<TypeDescriptor>,
    resource_type: Option<ResourceType>,
    domain: Option<ResourceDomain>,
    metadata: ResourceMetadata,
    icon: Option<Vec<u8>>,
    uri: Option<String>,

    name: Option<String>,
    file_name: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl ResourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record, to produce the record that supersedes it.
    pub fn from_resource(resource: &Resource) -> Self {
        Self {
            hash: Some(resource.hash.clone()),
            path: Some(resource.path.clone()),
            ino: resource.ino,
            size: resource.size,
            ext: Some(resource.ext.clone()),
            source_uris: resource.source_uris.clone(),
            curseforge: resource.curseforge,
            source_files: resource.source_files.clone(),
            descriptor: None,
            resource_type: Some(resource.resource_type),
            domain: Some(resource.domain),
            metadata: resource.metadata.clone(),
            icon: resource.icon.clone(),
            uri: Some(resource.uri.clone()),
            name: Some(resource.name.clone()),
            file_name: Some(resource.file_name.clone()),
            created_at: Some(resource.created_at),
        }
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn with_path_and_hash(&mut self, path: impl Into<PathBuf>, hash: impl Into<String>) -> &mut Self {
        self.path = Some(path.into());
        self.hash = Some(hash.into());
        self
    }

    /// Extension of the original file, when it differs from the stored path.
    pub fn with_extension(&mut self, ext: impl Into<String>) -> &mut Self {
        self.ext = Some(ext.into());
        self
    }

    /// Add source URIs, keeping first-seen order and dropping duplicates.
    pub fn with_source_uris<I, S>(&mut self, uris: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for uri in uris {
            let uri = uri.into();
            if !uri.is_empty() && !self.source_uris.contains(&uri) {
                self.source_uris.push(uri);
            }
        }
        self
    }

    pub fn with_curseforge(&mut self, source: Option<CurseforgeSource>) -> &mut Self {
        if source.is_some() {
            self.curseforge = source;
        }
        self
    }

    /// Remember the local file the content was read from. A newer stamp of the
    /// same file replaces the old one.
    pub fn with_source_file(&mut self, stamp: Option<FileStamp>) -> &mut Self {
        if let Some(stamp) = stamp {
            self.source_files.retain(|known| known.id != stamp.id);
            self.source_files.push(stamp);
        }
        self
    }

    /// Size and inode of the stored copy.
    pub fn with_stat_info(&mut self, ino: u64, size: u64) -> &mut Self {
        self.ino = ino;
        self.size = size;
        self
    }

    /// Take type, metadata and icon from a resolution. The derived URI is
    /// computed at [`finalize`](Self::finalize), once the hash is known.
    pub fn with_metadata(&mut self, resolution: Resolution) -> &mut Self {
        let suggested = resolution.suggested_name();
        if self.name.is_none() && !suggested.trim().is_empty() {
            self.name = Some(suggested.trim().to_string());
        }
        self.resource_type = Some(resolution.resource_type());
        self.domain = Some(resolution.domain());
        self.descriptor = Some(resolution.descriptor);
        self.metadata = resolution.metadata;
        self.icon = resolution.icon;
        self.uri = None;
        self
    }

    pub fn with_name(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.name = Some(name.trim().to_string());
        }
        self
    }

    /// Name of the stored file, relative to its domain folder.
    pub fn with_file_name(&mut self, file_name: impl Into<String>) -> &mut Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn domain(&self) -> ResourceDomain {
        self.domain.unwrap_or(ResourceDomain::Unknown)
    }

    /// Freeze into a [`Resource`]. Fails when hash or path were never set.
    pub fn finalize(self) -> ResourceResult<Resource> {
        let hash = self.hash.ok_or(ResourceError::IncompleteBuilder("content hash"))?;
        let path = self.path.ok_or(ResourceError::IncompleteBuilder("path"))?;

        let resource_type = self.resource_type.unwrap_or(ResourceType::Unknown);
        let uri = match (self.uri, &self.descriptor) {
            (Some(uri), _) => uri,
            (None, Some(descriptor)) => descriptor.derive_uri(&self.metadata, &hash),
            (None, None) => content_uri(resource_type, &hash),
        };

        let ext = self.ext.unwrap_or_else(|| dotted_extension(&path));
        let name = self.name.unwrap_or_else(|| default_name(&path));
        let file_name = self.file_name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        });

        Ok(Resource {
            hash,
            name,
            file_name,
            ext,
            resource_type,
            domain: self.domain.unwrap_or(ResourceDomain::Unknown),
            metadata: self.metadata,
            icon: self.icon,
            uri,
            source_uris: self.source_uris,
            curseforge: self.curseforge,
            source_files: self.source_files,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            path,
            ino: self.ino,
            size: self.size,
        })
    }
}

fn default_name(path: &Path) -> String {
    let stem = file_stem(path);
    if stem.is_empty() {
        "resource".to_string()
    } else {
        stem
    }
}
