use serde::Deserialize;

use super::{mod_display_name, mod_uri, ResourceParser};
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::resource::archive::ArchiveView;
use crate::core::resource::model::{ModMetadata, ResourceDomain, ResourceMetadata, ResourceType};

const LITEMOD_JSON: &str = "litemod.json";

/// LiteLoader mods (`.litemod` archives with a `litemod.json`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiteloaderParser;

#[derive(Debug, Deserialize)]
struct LitemodJson {
    name: String,
    #[serde(default)]
    version: String,
    mcversion: Option<String>,
    author: Option<String>,
    description: Option<String>,
}

impl ResourceParser for LiteloaderParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Liteloader
    }

    fn domain(&self) -> ResourceDomain {
        ResourceDomain::Mods
    }

    fn extension(&self) -> &'static str {
        ".litemod"
    }

    fn parse_metadata(&self, view: &mut ArchiveView) -> ResourceResult<ResourceMetadata> {
        let raw = view
            .read_to_string(LITEMOD_JSON)?
            .ok_or_else(|| ResourceError::parse(ResourceType::Liteloader, "no litemod.json"))?;
        let parsed: LitemodJson = serde_json::from_str(&raw)?;

        Ok(ResourceMetadata::Mod(ModMetadata {
            id: parsed.name.clone(),
            name: parsed.name,
            version: parsed.version,
            description: parsed.description,
            authors: parsed.author.into_iter().collect(),
            minecraft_version: parsed.mcversion,
            icon_path: None,
        }))
    }

    fn suggest_name(&self, metadata: &ResourceMetadata) -> String {
        mod_display_name(metadata)
    }

    fn derive_uri(&self, metadata: &ResourceMetadata, hash: &str) -> String {
        mod_uri(ResourceType::Liteloader, metadata, hash)
    }
}
