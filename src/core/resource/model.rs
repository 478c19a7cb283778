use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{ResourceError, ResourceResult};
use crate::core::fs::{FileId, FileStamp};

/// Every kind of file the launcher knows how to classify.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    Forge,
    Fabric,
    Liteloader,
    Resourcepack,
    Save,
    Modpack,
    CommonModpack,
    Unknown,
}

impl ResourceType {
    pub const ALL: [ResourceType; 8] = [
        ResourceType::Forge,
        ResourceType::Fabric,
        ResourceType::Liteloader,
        ResourceType::Resourcepack,
        ResourceType::Save,
        ResourceType::Modpack,
        ResourceType::CommonModpack,
        ResourceType::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Forge => "forge",
            ResourceType::Fabric => "fabric",
            ResourceType::Liteloader => "liteloader",
            ResourceType::Resourcepack => "resourcepack",
            ResourceType::Save => "save",
            ResourceType::Modpack => "modpack",
            ResourceType::CommonModpack => "commonModpack",
            ResourceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ResourceError;

    fn from_str(s: &str) -> ResourceResult<Self> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ResourceError::Other(format!("Unknown resource type: {}", s)))
    }
}

/// Coarse category, also the folder a resource is stored under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ResourceDomain {
    Mods,
    Resourcepacks,
    Saves,
    Modpacks,
    Unknown,
}

impl ResourceDomain {
    pub const ALL: [ResourceDomain; 5] = [
        ResourceDomain::Mods,
        ResourceDomain::Resourcepacks,
        ResourceDomain::Saves,
        ResourceDomain::Modpacks,
        ResourceDomain::Unknown,
    ];

    /// Folder name, both in the managed content area and inside instances.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceDomain::Mods => "mods",
            ResourceDomain::Resourcepacks => "resourcepacks",
            ResourceDomain::Saves => "saves",
            ResourceDomain::Modpacks => "modpacks",
            ResourceDomain::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResourceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceDomain {
    type Err = ResourceError;

    fn from_str(s: &str) -> ResourceResult<Self> {
        ResourceDomain::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ResourceError::Other(format!("Unknown resource domain: {}", s)))
    }
}

/// CurseForge provenance, when the file came from there.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CurseforgeSource {
    pub project_id: u64,
    pub file_id: u64,
}

impl CurseforgeSource {
    pub fn uri(&self) -> String {
        format!("curseforge://id/{}/{}", self.project_id, self.file_id)
    }
}

// ── Type specific metadata ──────────────────────────────

/// What the mod loaders declare about a mod jar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub minecraft_version: Option<String>,
    /// Archive-relative path of the logo, if declared.
    #[serde(default)]
    pub icon_path: Option<String>,
}

/// `pack.mcmeta` subset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackMetadata {
    pub pack_format: Option<u32>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SaveMetadata {
    /// Folder holding `level.dat`; empty when it sits at the archive root.
    pub root: String,
}

/// CurseForge `manifest.json` subset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModpackMetadata {
    pub name: String,
    pub version: String,
    pub author: String,
    pub minecraft_version: String,
    pub file_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommonModpackMetadata {
    /// Detected root folder (`.minecraft`, or the folder holding `versions` and `mods`).
    pub root: String,
}

/// Metadata as parsed by the winning type descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResourceMetadata {
    Mod(ModMetadata),
    Pack(PackMetadata),
    Save(SaveMetadata),
    Modpack(ModpackMetadata),
    CommonModpack(CommonModpackMetadata),
    #[default]
    Unknown,
}

// ── Resource ────────────────────────────────────────────

/// Lookup keys of the resource index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKey {
    Hash(String),
    Uri(String),
    /// A local file the content was imported from.
    File(FileId),
    Path(PathBuf),
}

/// The canonical, immutable record of an imported file.
///
/// Persisted as a JSON sidecar under `<root>/<domain>/<stem>.json`. The
/// volatile `path`, `ino` and `size` fields describe the stored copy; they
/// are skipped and re-derived from a `stat` of it at load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// SHA-1 of the content, the primary identity.
    pub hash: String,
    pub name: String,
    /// Stored file (or folder) name, relative to the domain folder.
    pub file_name: String,
    pub ext: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub domain: ResourceDomain,
    pub metadata: ResourceMetadata,
    #[serde(default, with = "icon_base64", skip_serializing_if = "Option::is_none")]
    pub icon: Option<Vec<u8>>,
    /// Canonical URI derived by the type descriptor.
    pub uri: String,
    /// Where the content was imported from, in first-seen order, no duplicates.
    #[serde(default)]
    pub source_uris: Vec<String>,
    #[serde(default)]
    pub curseforge: Option<CurseforgeSource>,
    /// Local files the content was imported from, as they looked when read.
    /// A file whose stamp still matches is not hashed again.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_files: Vec<FileStamp>,
    pub created_at: DateTime<Utc>,

    #[serde(skip)]
    pub path: PathBuf,
    #[serde(skip)]
    pub ino: u64,
    #[serde(skip)]
    pub size: u64,
}

impl Resource {
    /// Every index key under which this resource is reachable.
    pub fn keys(&self) -> Vec<IndexKey> {
        let mut keys = vec![IndexKey::Hash(self.hash.clone())];
        if !self.uri.is_empty() {
            keys.push(IndexKey::Uri(self.uri.clone()));
        }
        keys.extend(self.source_uris.iter().cloned().map(IndexKey::Uri));
        if let Some(cf) = &self.curseforge {
            keys.push(IndexKey::Uri(cf.uri()));
        }
        keys.extend(self.source_files.iter().map(|stamp| IndexKey::File(stamp.id)));
        if !self.path.as_os_str().is_empty() {
            keys.push(IndexKey::Path(self.path.clone()));
        }
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn source_file(&self, id: FileId) -> Option<&FileStamp> {
        self.source_files.iter().find(|stamp| stamp.id == id)
    }

    /// Stem shared by the stored file and its sidecar.
    pub fn storage_stem(&self) -> &str {
        self.file_name
            .strip_suffix(self.ext.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.file_name)
    }
}

/// Summary used by listings.
pub fn count_by_domain<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> BTreeMap<ResourceDomain, usize> {
    let mut counts = BTreeMap::new();
    for resource in resources {
        *counts.entry(resource.domain).or_insert(0) += 1;
    }
    counts
}

mod icon_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(icon: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match icon {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
