use super::{content_uri, ResourceParser};
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::resource::archive::ArchiveView;
use crate::core::resource::model::{
    CommonModpackMetadata, ResourceDomain, ResourceMetadata, ResourceType,
};

const DOT_MINECRAFT: &str = ".minecraft";

/// Plain zipped (or unpacked) game folders: a `.minecraft` folder, or a
/// folder holding both `versions` and `mods`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommonModpackParser;

/// Root folder of the game directory inside `view`, if there is one.
/// An empty string means the markers sit at the root itself.
fn detect_root(view: &ArchiveView) -> Option<String> {
    let names = view.entry_names();
    let has_folder = |prefix: &str| {
        let prefix = format!("{}/", prefix);
        names.iter().any(|n| n.starts_with(&prefix))
    };
    let game_root = |base: &str| -> Option<String> {
        let join = |child: &str| {
            if base.is_empty() {
                child.to_string()
            } else {
                format!("{}/{}", base, child)
            }
        };
        if has_folder(&join(DOT_MINECRAFT)) {
            Some(join(DOT_MINECRAFT))
        } else if has_folder(&join("versions")) && has_folder(&join("mods")) {
            Some(base.to_string())
        } else {
            None
        }
    };

    game_root("").or_else(|| view.single_top_folder().and_then(|folder| game_root(&folder)))
}

impl ResourceParser for CommonModpackParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::CommonModpack
    }

    fn domain(&self) -> ResourceDomain {
        ResourceDomain::Modpacks
    }

    fn extension(&self) -> &'static str {
        ".zip"
    }

    fn parse_metadata(&self, view: &mut ArchiveView) -> ResourceResult<ResourceMetadata> {
        detect_root(view)
            .map(|root| ResourceMetadata::CommonModpack(CommonModpackMetadata { root }))
            .ok_or_else(|| {
                ResourceError::parse(
                    ResourceType::CommonModpack,
                    "no .minecraft or versions+mods folders",
                )
            })
    }

    /// The top folder name, unless it is just `.minecraft`.
    fn suggest_name(&self, metadata: &ResourceMetadata) -> String {
        match metadata {
            ResourceMetadata::CommonModpack(m) => m
                .root
                .split('/')
                .next()
                .filter(|top| *top != DOT_MINECRAFT)
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        }
    }

    fn derive_uri(&self, _metadata: &ResourceMetadata, hash: &str) -> String {
        content_uri(ResourceType::Modpack, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::test_support::zip_bytes;

    fn root_of(entries: &[(&str, &str)]) -> Option<String> {
        let mut view = ArchiveView::from_bytes(zip_bytes(entries)).unwrap();
        match CommonModpackParser.parse_metadata(&mut view) {
            Ok(ResourceMetadata::CommonModpack(m)) => Some(m.root),
            _ => None,
        }
    }

    #[test]
    fn detects_dot_minecraft_at_root() {
        assert_eq!(
            root_of(&[(".minecraft/options.txt", "")]),
            Some(".minecraft".to_string())
        );
    }

    #[test]
    fn detects_versions_and_mods_under_single_folder() {
        let root = root_of(&[
            ("MyPack/versions/1.20.1/1.20.1.json", "{}"),
            ("MyPack/mods/a.jar", ""),
        ]);
        assert_eq!(root, Some("MyPack".to_string()));

        let meta = ResourceMetadata::CommonModpack(CommonModpackMetadata {
            root: "MyPack".into(),
        });
        assert_eq!(CommonModpackParser.suggest_name(&meta), "MyPack");
        assert_eq!(CommonModpackParser.derive_uri(&meta, "aa"), "modpack://aa");
    }

    #[test]
    fn mods_alone_are_not_a_modpack() {
        assert_eq!(root_of(&[("mods/a.jar", "")]), None);
    }

    #[test]
    fn dot_minecraft_root_suggests_no_name() {
        let meta = ResourceMetadata::CommonModpack(CommonModpackMetadata {
            root: ".minecraft".into(),
        });
        assert!(CommonModpackParser.suggest_name(&meta).is_empty());
    }

    #[test]
    fn works_on_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("versions/1.12.2")).unwrap();
        std::fs::create_dir_all(dir.path().join("mods")).unwrap();
        let mut view = ArchiveView::from_directory(dir.path());
        assert_eq!(
            CommonModpackParser.parse_metadata(&mut view).unwrap(),
            ResourceMetadata::CommonModpack(CommonModpackMetadata::default())
        );
    }
}
