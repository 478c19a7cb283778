//! Resource type descriptors.
//!
//! Each supported type is a zero-sized parser implementing [`ResourceParser`];
//! [`TypeDescriptor`] collects them behind one enum so the registry can hold
//! an ordered list without boxing.

pub mod common_modpack;
pub mod fabric;
pub mod forge;
pub mod liteloader;
pub mod modpack;
pub mod resourcepack;
pub mod save;
pub mod unknown;

use crate::core::error::ResourceResult;
use crate::core::resource::archive::ArchiveView;
use crate::core::resource::model::{ModMetadata, ResourceDomain, ResourceMetadata, ResourceType};

pub use common_modpack::CommonModpackParser;
pub use fabric::FabricParser;
pub use forge::ForgeParser;
pub use liteloader::LiteloaderParser;
pub use modpack::ModpackParser;
pub use resourcepack::ResourcepackParser;
pub use save::SaveParser;
pub use unknown::UnknownParser;

/// Extension affinity that matches every file.
pub const ANY_EXTENSION: &str = "*";

/// Capabilities every resource type provides.
pub trait ResourceParser: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    fn domain(&self) -> ResourceDomain;

    /// Dotted, lowercase extension this type is usually found with.
    fn extension(&self) -> &'static str;

    /// Read the type specific metadata, or reject the content with
    /// [`ResourceError::Parse`](crate::core::error::ResourceError::Parse).
    fn parse_metadata(&self, view: &mut ArchiveView) -> ResourceResult<ResourceMetadata>;

    fn parse_icon(
        &self,
        _metadata: &ResourceMetadata,
        _view: &mut ArchiveView,
    ) -> ResourceResult<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Display name; empty means "keep the original file name".
    fn suggest_name(&self, metadata: &ResourceMetadata) -> String;

    fn derive_uri(&self, metadata: &ResourceMetadata, hash: &str) -> String;
}

/// Dispatcher over the known parsers, no `Box<dyn>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDescriptor {
    Forge(ForgeParser),
    Fabric(FabricParser),
    Liteloader(LiteloaderParser),
    Modpack(ModpackParser),
    CommonModpack(CommonModpackParser),
    Save(SaveParser),
    Resourcepack(ResourcepackParser),
    Unknown(UnknownParser),
}

macro_rules! dispatch {
    ($self:ident, $parser:ident => $call:expr) => {
        match $self {
            TypeDescriptor::Forge($parser) => $call,
            TypeDescriptor::Fabric($parser) => $call,
            TypeDescriptor::Liteloader($parser) => $call,
            TypeDescriptor::Modpack($parser) => $call,
            TypeDescriptor::CommonModpack($parser) => $call,
            TypeDescriptor::Save($parser) => $call,
            TypeDescriptor::Resourcepack($parser) => $call,
            TypeDescriptor::Unknown($parser) => $call,
        }
    };
}

impl TypeDescriptor {
    /// Built-in descriptors, most specific first, unknown last.
    pub fn defaults() -> Vec<TypeDescriptor> {
        vec![
            TypeDescriptor::Forge(ForgeParser),
            TypeDescriptor::Fabric(FabricParser),
            TypeDescriptor::Liteloader(LiteloaderParser),
            TypeDescriptor::Modpack(ModpackParser),
            TypeDescriptor::CommonModpack(CommonModpackParser),
            TypeDescriptor::Save(SaveParser),
            TypeDescriptor::Resourcepack(ResourcepackParser),
            TypeDescriptor::Unknown(UnknownParser),
        ]
    }

    pub fn matches_extension(&self, ext: &str) -> bool {
        let affinity = self.extension();
        affinity == ANY_EXTENSION || affinity.eq_ignore_ascii_case(ext)
    }
}

impl ResourceParser for TypeDescriptor {
    fn resource_type(&self) -> ResourceType {
        dispatch!(self, p => p.resource_type())
    }

    fn domain(&self) -> ResourceDomain {
        dispatch!(self, p => p.domain())
    }

    fn extension(&self) -> &'static str {
        dispatch!(self, p => p.extension())
    }

    fn parse_metadata(&self, view: &mut ArchiveView) -> ResourceResult<ResourceMetadata> {
        dispatch!(self, p => p.parse_metadata(view))
    }

    fn parse_icon(
        &self,
        metadata: &ResourceMetadata,
        view: &mut ArchiveView,
    ) -> ResourceResult<Option<Vec<u8>>> {
        dispatch!(self, p => p.parse_icon(metadata, view))
    }

    fn suggest_name(&self, metadata: &ResourceMetadata) -> String {
        dispatch!(self, p => p.suggest_name(metadata))
    }

    fn derive_uri(&self, metadata: &ResourceMetadata, hash: &str) -> String {
        dispatch!(self, p => p.derive_uri(metadata, hash))
    }
}

// ── Helpers shared by the mod loaders ───────────────────

/// `<name>-<version>`, falling back to the id when no display name is declared.
pub(crate) fn mod_display_name(metadata: &ResourceMetadata) -> String {
    let ResourceMetadata::Mod(m) = metadata else {
        return String::new();
    };
    let name = if m.name.trim().is_empty() { &m.id } else { &m.name };
    if m.version.is_empty() {
        name.trim().to_string()
    } else {
        format!("{}-{}", name.trim(), m.version)
    }
}

/// `<scheme>://<id>/<version>` for mods, content addressed otherwise.
pub(crate) fn mod_uri(resource_type: ResourceType, metadata: &ResourceMetadata, hash: &str) -> String {
    match metadata {
        ResourceMetadata::Mod(ModMetadata { id, version, .. }) if !id.is_empty() => {
            format!("{}://{}/{}", resource_type, id, version)
        }
        _ => content_uri(resource_type, hash),
    }
}

pub(crate) fn content_uri(resource_type: ResourceType, hash: &str) -> String {
    format!("{}://{}", resource_type, hash)
}

/// Read an icon entry, treating an empty path as "no icon".
pub(crate) fn read_icon(view: &mut ArchiveView, path: Option<&str>) -> ResourceResult<Option<Vec<u8>>> {
    match path.map(|p| p.trim_start_matches('/')).filter(|p| !p.is_empty()) {
        Some(path) => view.read(path),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unique_and_end_with_unknown() {
        let defaults = TypeDescriptor::defaults();
        let mut types: Vec<_> = defaults.iter().map(|d| d.resource_type()).collect();
        assert_eq!(types.last(), Some(&ResourceType::Unknown));
        types.sort();
        types.dedup();
        assert_eq!(types.len(), defaults.len());
    }

    #[test]
    fn extension_affinity() {
        let forge = TypeDescriptor::Forge(ForgeParser);
        assert!(forge.matches_extension(".jar"));
        assert!(forge.matches_extension(".JAR"));
        assert!(!forge.matches_extension(".zip"));
        assert!(TypeDescriptor::Unknown(UnknownParser).matches_extension(".whatever"));
    }

    #[test]
    fn mod_names_and_uris() {
        let meta = ResourceMetadata::Mod(ModMetadata {
            id: "jei".into(),
            name: "Just Enough Items".into(),
            version: "15.2.0".into(),
            ..Default::default()
        });
        assert_eq!(mod_display_name(&meta), "Just Enough Items-15.2.0");
        assert_eq!(mod_uri(ResourceType::Forge, &meta, "ff"), "forge://jei/15.2.0");
        assert_eq!(
            mod_uri(ResourceType::Forge, &ResourceMetadata::Unknown, "ff"),
            "forge://ff"
        );
    }
}
