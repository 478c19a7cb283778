use std::collections::BTreeMap;

use serde::Deserialize;

use super::{mod_display_name, mod_uri, read_icon, ResourceParser};
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::resource::archive::ArchiveView;
use crate::core::resource::model::{ModMetadata, ResourceDomain, ResourceMetadata, ResourceType};

const FABRIC_MOD_JSON: &str = "fabric.mod.json";

/// Fabric mods, identified by `fabric.mod.json` at the jar root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FabricParser;

#[derive(Debug, Deserialize)]
struct FabricModJson {
    id: String,
    version: String,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    authors: Vec<FabricPerson>,
    icon: Option<FabricIcon>,
    #[serde(default)]
    depends: BTreeMap<String, serde_json::Value>,
}

/// Authors are either plain names or `{ "name": ..., "contact": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FabricPerson {
    Name(String),
    Detailed { name: String },
}

/// A single path, or a map from pixel size to path.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FabricIcon {
    Path(String),
    Sized(BTreeMap<String, String>),
}

impl FabricIcon {
    /// The path itself, or the largest declared size.
    fn best(self) -> Option<String> {
        match self {
            FabricIcon::Path(path) => Some(path),
            FabricIcon::Sized(sizes) => sizes
                .into_iter()
                .max_by_key(|(size, _)| size.parse::<u32>().unwrap_or(0))
                .map(|(_, path)| path),
        }
    }
}

impl ResourceParser for FabricParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Fabric
    }

    fn domain(&self) -> ResourceDomain {
        ResourceDomain::Mods
    }

    fn extension(&self) -> &'static str {
        ".jar"
    }

    fn parse_metadata(&self, view: &mut ArchiveView) -> ResourceResult<ResourceMetadata> {
        let raw = view
            .read_to_string(FABRIC_MOD_JSON)?
            .ok_or_else(|| ResourceError::parse(ResourceType::Fabric, "no fabric.mod.json"))?;
        let parsed: FabricModJson = serde_json::from_str(&raw)?;

        let minecraft_version = parsed
            .depends
            .get("minecraft")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(ResourceMetadata::Mod(ModMetadata {
            name: parsed.name.unwrap_or_else(|| parsed.id.clone()),
            id: parsed.id,
            version: parsed.version,
            description: parsed.description,
            authors: parsed
                .authors
                .into_iter()
                .map(|p| match p {
                    FabricPerson::Name(name) | FabricPerson::Detailed { name } => name,
                })
                .collect(),
            minecraft_version,
            icon_path: parsed.icon.and_then(FabricIcon::best),
        }))
    }

    fn parse_icon(
        &self,
        metadata: &ResourceMetadata,
        view: &mut ArchiveView,
    ) -> ResourceResult<Option<Vec<u8>>> {
        match metadata {
            ResourceMetadata::Mod(m) => read_icon(view, m.icon_path.as_deref()),
            _ => Ok(None),
        }
    }

    fn suggest_name(&self, metadata: &ResourceMetadata) -> String {
        mod_display_name(metadata)
    }

    fn derive_uri(&self, metadata: &ResourceMetadata, hash: &str) -> String {
        mod_uri(ResourceType::Fabric, metadata, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::test_support::zip_bytes;

    #[test]
    fn parses_fabric_mod_json() {
        let json = r#"{
            "schemaVersion": 1,
            "id": "sodium",
            "version": "0.5.8",
            "name": "Sodium",
            "authors": ["JellySquid", {"name": "IMS", "contact": {}}],
            "icon": {"16": "small.png", "128": "assets/sodium/icon.png"},
            "depends": {"minecraft": "1.20.4", "fabricloader": ">=0.12"}
        }"#;
        let bytes = zip_bytes(&[
            (FABRIC_MOD_JSON, json),
            ("assets/sodium/icon.png", "big"),
            ("small.png", "small"),
        ]);
        let mut view = ArchiveView::from_bytes(bytes).unwrap();

        let meta = FabricParser.parse_metadata(&mut view).unwrap();
        let ResourceMetadata::Mod(m) = &meta else {
            panic!("expected mod metadata");
        };
        assert_eq!(m.authors, vec!["JellySquid", "IMS"]);
        assert_eq!(m.minecraft_version.as_deref(), Some("1.20.4"));
        assert_eq!(
            FabricParser.parse_icon(&meta, &mut view).unwrap().as_deref(),
            Some(b"big".as_slice())
        );
        assert_eq!(FabricParser.suggest_name(&meta), "Sodium-0.5.8");
        assert_eq!(FabricParser.derive_uri(&meta, "abc"), "fabric://sodium/0.5.8");
    }

    #[test]
    fn missing_descriptor_is_a_parse_error() {
        let mut view = ArchiveView::from_bytes(zip_bytes(&[("META-INF/mods.toml", "")])).unwrap();
        assert!(matches!(
            FabricParser.parse_metadata(&mut view),
            Err(ResourceError::Parse { .. })
        ));
    }
}
