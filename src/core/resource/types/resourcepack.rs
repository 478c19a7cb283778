use serde::Deserialize;

use super::{content_uri, ResourceParser};
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::resource::archive::ArchiveView;
use crate::core::resource::model::{PackMetadata, ResourceDomain, ResourceMetadata, ResourceType};

const PACK_MCMETA: &str = "pack.mcmeta";
const PACK_PNG: &str = "pack.png";

/// Resource packs, identified by `pack.mcmeta`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourcepackParser;

#[derive(Debug, Deserialize)]
struct PackMcmeta {
    pack: PackSection,
}

#[derive(Debug, Deserialize)]
struct PackSection {
    pack_format: Option<u32>,
    #[serde(default)]
    description: serde_json::Value,
}

/// Flatten a text component (string, `{"text": ..}`, or a list of those).
fn flatten_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts.iter().map(flatten_text).collect(),
        serde_json::Value::Object(map) => {
            let mut text = map
                .get("text")
                .or_else(|| map.get("translate"))
                .map(flatten_text)
                .unwrap_or_default();
            if let Some(extra) = map.get("extra") {
                text.push_str(&flatten_text(extra));
            }
            text
        }
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl ResourceParser for ResourcepackParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Resourcepack
    }

    fn domain(&self) -> ResourceDomain {
        ResourceDomain::Resourcepacks
    }

    fn extension(&self) -> &'static str {
        ".zip"
    }

    fn parse_metadata(&self, view: &mut ArchiveView) -> ResourceResult<ResourceMetadata> {
        let raw = view
            .read_to_string(PACK_MCMETA)?
            .ok_or_else(|| ResourceError::parse(ResourceType::Resourcepack, "no pack.mcmeta"))?;
        let parsed: PackMcmeta = serde_json::from_str(&raw)?;

        Ok(ResourceMetadata::Pack(PackMetadata {
            pack_format: parsed.pack.pack_format,
            description: flatten_text(&parsed.pack.description),
        }))
    }

    fn parse_icon(
        &self,
        _metadata: &ResourceMetadata,
        view: &mut ArchiveView,
    ) -> ResourceResult<Option<Vec<u8>>> {
        view.read(PACK_PNG)
    }

    /// Packs are known by their file name.
    fn suggest_name(&self, _metadata: &ResourceMetadata) -> String {
        String::new()
    }

    fn derive_uri(&self, _metadata: &ResourceMetadata, hash: &str) -> String {
        content_uri(ResourceType::Resourcepack, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::test_support::zip_bytes;

    #[test]
    fn parses_pack_mcmeta_with_text_component() {
        let mcmeta = r#"{"pack":{"pack_format":15,"description":[{"text":"Faithful "},{"text":"32x","color":"gold"}]}}"#;
        let bytes = zip_bytes(&[(PACK_MCMETA, mcmeta), (PACK_PNG, "icon")]);
        let mut view = ArchiveView::from_bytes(bytes).unwrap();

        let meta = ResourcepackParser.parse_metadata(&mut view).unwrap();
        assert_eq!(
            meta,
            ResourceMetadata::Pack(PackMetadata {
                pack_format: Some(15),
                description: "Faithful 32x".into(),
            })
        );
        assert_eq!(
            ResourcepackParser.parse_icon(&meta, &mut view).unwrap().as_deref(),
            Some(b"icon".as_slice())
        );
        assert_eq!(ResourcepackParser.derive_uri(&meta, "ff00"), "resourcepack://ff00");
        assert!(ResourcepackParser.suggest_name(&meta).is_empty());
    }

    #[test]
    fn pack_without_section_is_rejected() {
        let mut view = ArchiveView::from_bytes(zip_bytes(&[(PACK_MCMETA, "{}")])).unwrap();
        assert!(ResourcepackParser.parse_metadata(&mut view).is_err());
    }
}
