use serde::Deserialize;

use super::{content_uri, ResourceParser};
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::resource::archive::ArchiveView;
use crate::core::resource::model::{ModpackMetadata, ResourceDomain, ResourceMetadata, ResourceType};

const MANIFEST_JSON: &str = "manifest.json";
const MANIFEST_TYPE: &str = "minecraftModpack";

/// CurseForge modpack exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModpackParser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseforgeManifest {
    manifest_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    author: String,
    minecraft: Option<ManifestMinecraft>,
    #[serde(default)]
    files: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ManifestMinecraft {
    #[serde(default)]
    version: String,
}

impl ResourceParser for ModpackParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Modpack
    }

    fn domain(&self) -> ResourceDomain {
        ResourceDomain::Modpacks
    }

    fn extension(&self) -> &'static str {
        ".zip"
    }

    fn parse_metadata(&self, view: &mut ArchiveView) -> ResourceResult<ResourceMetadata> {
        let raw = view
            .read_to_string(MANIFEST_JSON)?
            .ok_or_else(|| ResourceError::parse(ResourceType::Modpack, "no manifest.json"))?;
        let manifest: CurseforgeManifest = serde_json::from_str(&raw)?;
        if manifest.manifest_type != MANIFEST_TYPE {
            return Err(ResourceError::parse(
                ResourceType::Modpack,
                format!("unexpected manifestType {}", manifest.manifest_type),
            ));
        }

        Ok(ResourceMetadata::Modpack(ModpackMetadata {
            name: manifest.name,
            version: manifest.version,
            author: manifest.author,
            minecraft_version: manifest.minecraft.map(|m| m.version).unwrap_or_default(),
            file_count: manifest.files.len(),
        }))
    }

    fn suggest_name(&self, metadata: &ResourceMetadata) -> String {
        match metadata {
            ResourceMetadata::Modpack(m) if !m.name.is_empty() => {
                if m.version.is_empty() {
                    m.name.clone()
                } else {
                    format!("{}-{}", m.name, m.version)
                }
            }
            _ => String::new(),
        }
    }

    fn derive_uri(&self, _metadata: &ResourceMetadata, hash: &str) -> String {
        content_uri(ResourceType::Modpack, hash)
    }
}
