use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::resource::{ResourceDomain, ResourceType};

/// Supported mod loaders — strongly typed, no magic strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    Vanilla,
    Forge,
    Fabric,
    NeoForge,
    Quilt,
    LiteLoader,
}

impl LoaderType {
    /// Whether mods of `resource_type` load under this loader. Non-mod
    /// types are always accepted.
    pub fn accepts(self, resource_type: ResourceType) -> bool {
        match resource_type {
            ResourceType::Forge => matches!(self, LoaderType::Forge | LoaderType::NeoForge),
            ResourceType::Fabric => matches!(self, LoaderType::Fabric | LoaderType::Quilt),
            ResourceType::Liteloader => self == LoaderType::LiteLoader,
            _ => true,
        }
    }
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderType::Vanilla => write!(f, "vanilla"),
            LoaderType::Forge => write!(f, "forge"),
            LoaderType::Fabric => write!(f, "fabric"),
            LoaderType::NeoForge => write!(f, "neoforge"),
            LoaderType::Quilt => write!(f, "quilt"),
            LoaderType::LiteLoader => write!(f, "liteloader"),
        }
    }
}

/// Game instance persisted to disk as `instance.json`.
///
/// Each instance has its own folder under `instances/<uuid>/` with:
/// - `mods/`          — deployed mods
/// - `resourcepacks/` — deployed resource packs
/// - `instance.json`  — this serialized struct
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub name: String,
    pub path: PathBuf,
    pub minecraft_version: String,
    pub loader: LoaderType,
    pub loader_version: Option<String>,

    // ── Internal state ──
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Deployed resources: content hash to the materialized file, relative
    /// to the instance folder.
    #[serde(default)]
    pub deployed: BTreeMap<String, PathBuf>,
}

impl Instance {
    pub fn new(
        name: String,
        minecraft_version: String,
        loader: LoaderType,
        loader_version: Option<String>,
        base_dir: &Path,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let instance_dir = base_dir.join(&id);

        Self {
            name,
            path: instance_dir,
            minecraft_version,
            loader,
            loader_version,
            id,
            created_at: Utc::now(),
            deployed: BTreeMap::new(),
        }
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.path.join(ResourceDomain::Mods.as_str())
    }

    pub fn resourcepacks_dir(&self) -> PathBuf {
        self.path.join(ResourceDomain::Resourcepacks.as_str())
    }

    /// Folder resources of `domain` are deployed into, if they can be.
    pub fn domain_dir(&self, domain: ResourceDomain) -> Option<PathBuf> {
        match domain {
            ResourceDomain::Mods => Some(self.mods_dir()),
            ResourceDomain::Resourcepacks => Some(self.resourcepacks_dir()),
            _ => None,
        }
    }

    /// Path to this instance's config file.
    pub fn config_path(&self) -> PathBuf {
        self.path.join("instance.json")
    }

    pub fn is_deployed(&self, hash: &str) -> bool {
        self.deployed.contains_key(hash)
    }
}
