use serde::Deserialize;

use super::{mod_display_name, mod_uri, read_icon, ResourceParser};
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::resource::archive::ArchiveView;
use crate::core::resource::model::{ModMetadata, ResourceDomain, ResourceMetadata, ResourceType};

const MODS_TOML: &str = "META-INF/mods.toml";
const NEOFORGE_MODS_TOML: &str = "META-INF/neoforge.mods.toml";
const MCMOD_INFO: &str = "mcmod.info";
const MANIFEST: &str = "META-INF/MANIFEST.MF";
const JAR_VERSION_PLACEHOLDER: &str = "${file.jarVersion}";

/// Forge mods: `META-INF/mods.toml` (1.13+) or legacy `mcmod.info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForgeParser;

/// Subset of `mods.toml`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModsToml {
    #[serde(default)]
    mods: Vec<ModsTomlEntry>,
    logo_file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModsTomlEntry {
    mod_id: String,
    version: Option<String>,
    display_name: Option<String>,
    description: Option<String>,
    authors: Option<String>,
    logo_file: Option<String>,
}

/// `mcmod.info` comes either as a bare list or wrapped in `modList`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum McmodInfo {
    List(Vec<McmodEntry>),
    Wrapped {
        #[serde(rename = "modList")]
        mod_list: Vec<McmodEntry>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct McmodEntry {
    modid: String,
    name: String,
    version: String,
    mcversion: Option<String>,
    description: Option<String>,
    #[serde(rename = "authorList")]
    author_list: Vec<String>,
    #[serde(rename = "logoFile")]
    logo_file: Option<String>,
}

impl ForgeParser {
    fn from_mods_toml(view: &mut ArchiveView, raw: &str) -> ResourceResult<ModMetadata> {
        let parsed: ModsToml = toml::from_str(raw)?;
        let entry = parsed
            .mods
            .into_iter()
            .next()
            .ok_or_else(|| ResourceError::parse(ResourceType::Forge, "mods.toml declares no mods"))?;

        let mut version = entry.version.unwrap_or_default();
        if version.contains(JAR_VERSION_PLACEHOLDER) {
            let implementation = implementation_version(view)?.unwrap_or_default();
            version = version.replace(JAR_VERSION_PLACEHOLDER, &implementation);
        }

        Ok(ModMetadata {
            name: entry.display_name.unwrap_or_else(|| entry.mod_id.clone()),
            id: entry.mod_id,
            version,
            description: entry.description.map(|d| d.trim().to_string()),
            authors: entry
                .authors
                .map(|a| {
                    a.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            minecraft_version: None,
            icon_path: entry.logo_file.or(parsed.logo_file),
        })
    }

    fn from_mcmod_info(raw: &str) -> ResourceResult<ModMetadata> {
        let info: McmodInfo = serde_json::from_str(raw)?;
        let entries = match info {
            McmodInfo::List(list) => list,
            McmodInfo::Wrapped { mod_list } => mod_list,
        };
        let entry = entries
            .into_iter()
            .find(|e| !e.modid.is_empty())
            .ok_or_else(|| ResourceError::parse(ResourceType::Forge, "mcmod.info declares no mods"))?;

        Ok(ModMetadata {
            name: if entry.name.is_empty() {
                entry.modid.clone()
            } else {
                entry.name
            },
            id: entry.modid,
            version: entry.version,
            description: entry.description,
            authors: entry.author_list,
            minecraft_version: entry.mcversion,
            icon_path: entry.logo_file,
        })
    }
}

/// `Implementation-Version` from the jar manifest.
fn implementation_version(view: &mut ArchiveView) -> ResourceResult<Option<String>> {
    let Some(manifest) = view.read_to_string(MANIFEST)? else {
        return Ok(None);
    };
    Ok(manifest.lines().find_map(|line| {
        line.strip_prefix("Implementation-Version:")
            .map(|v| v.trim().to_string())
    }))
}

impl ResourceParser for ForgeParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Forge
    }

    fn domain(&self) -> ResourceDomain {
        ResourceDomain::Mods
    }

    fn extension(&self) -> &'static str {
        ".jar"
    }

    fn parse_metadata(&self, view: &mut ArchiveView) -> ResourceResult<ResourceMetadata> {
        for toml_name in [MODS_TOML, NEOFORGE_MODS_TOML] {
            if let Some(raw) = view.read_to_string(toml_name)? {
                return Ok(ResourceMetadata::Mod(Self::from_mods_toml(view, &raw)?));
            }
        }
        if let Some(raw) = view.read_to_string(MCMOD_INFO)? {
            return Ok(ResourceMetadata::Mod(Self::from_mcmod_info(&raw)?));
        }
        Err(ResourceError::parse(
            ResourceType::Forge,
            "no mods.toml or mcmod.info",
        ))
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
        mod_uri(ResourceType::Forge, metadata, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::test_support::zip_bytes;

    const MODS_TOML_SAMPLE: &str = r#"
modLoader = "javafml"
loaderVersion = "[47,)"
license = "MIT"
logoFile = "logo.png"

[[mods]]
modId = "jei"
version = "${file.jarVersion}"
displayName = "Just Enough Items"
authors = "mezz, other"
description = '''
Item and recipe viewer.
'''
"#;

    #[test]
    fn parses_mods_toml_and_expands_jar_version() {
        let bytes = zip_bytes(&[
            (MODS_TOML, MODS_TOML_SAMPLE),
            (MANIFEST, "Manifest-Version: 1.0\r\nImplementation-Version: 15.2.0.27\r\n"),
            ("logo.png", "png-bytes"),
        ]);
        let mut view = ArchiveView::from_bytes(bytes).unwrap();

        let meta = ForgeParser.parse_metadata(&mut view).unwrap();
        let ResourceMetadata::Mod(m) = &meta else {
            panic!("expected mod metadata");
        };
        assert_eq!(m.id, "jei");
        assert_eq!(m.version, "15.2.0.27");
        assert_eq!(m.authors, vec!["mezz", "other"]);
        assert_eq!(m.description.as_deref(), Some("Item and recipe viewer."));

        let icon = ForgeParser.parse_icon(&meta, &mut view).unwrap();
        assert_eq!(icon.as_deref(), Some(b"png-bytes".as_slice()));
        assert_eq!(ForgeParser.suggest_name(&meta), "Just Enough Items-15.2.0.27");
        assert_eq!(ForgeParser.derive_uri(&meta, "abc"), "forge://jei/15.2.0.27");
    }

    #[test]
    fn parses_legacy_mcmod_info_in_both_layouts() {
        let list = r#"[{"modid":"ic2","name":"IndustrialCraft 2","version":"2.8","mcversion":"1.12.2"}]"#;
        let wrapped = r#"{"modListVersion":2,"modList":[{"modid":"ic2","name":"IndustrialCraft 2","version":"2.8"}]}"#;

        for raw in [list, wrapped] {
            let mut view = ArchiveView::from_bytes(zip_bytes(&[(MCMOD_INFO, raw)])).unwrap();
            let meta = ForgeParser.parse_metadata(&mut view).unwrap();
            assert_eq!(ForgeParser.suggest_name(&meta), "IndustrialCraft 2-2.8");
        }
    }

    #[test]
    fn rejects_jars_without_forge_metadata() {
        let bytes = zip_bytes(&[("fabric.mod.json", "{}")]);
        let mut view = ArchiveView::from_bytes(bytes).unwrap();
        let err = ForgeParser.parse_metadata(&mut view).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Parse {
                resource_type: ResourceType::Forge,
                ..
            }
        ));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let bytes = zip_bytes(&[(MODS_TOML, "[[mods]\nmodId=")]);
        let mut view = ArchiveView::from_bytes(bytes).unwrap();
        assert!(ForgeParser.parse_metadata(&mut view).is_err());
    }
}
