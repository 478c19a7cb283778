use super::{content_uri, ResourceParser};
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::resource::archive::ArchiveView;
use crate::core::resource::model::{ResourceDomain, ResourceMetadata, ResourceType, SaveMetadata};

const LEVEL_DAT: &str = "level.dat";
const ICON_PNG: &str = "icon.png";

/// World saves: `level.dat` at the root, or inside a single top folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveParser;

fn in_root(root: &str, name: &str) -> String {
    if root.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", root, name)
    }
}

impl ResourceParser for SaveParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Save
    }

    fn domain(&self) -> ResourceDomain {
        ResourceDomain::Saves
    }

    fn extension(&self) -> &'static str {
        ".zip"
    }

    fn parse_metadata(&self, view: &mut ArchiveView) -> ResourceResult<ResourceMetadata> {
        if view.contains(LEVEL_DAT) {
            return Ok(ResourceMetadata::Save(SaveMetadata { root: String::new() }));
        }
        if let Some(folder) = view.single_top_folder() {
            if view.contains(&in_root(&folder, LEVEL_DAT)) {
                return Ok(ResourceMetadata::Save(SaveMetadata { root: folder }));
            }
        }
        Err(ResourceError::parse(ResourceType::Save, "no level.dat"))
    }

    fn parse_icon(
        &self,
        metadata: &ResourceMetadata,
        view: &mut ArchiveView,
    ) -> ResourceResult<Option<Vec<u8>>> {
        match metadata {
            ResourceMetadata::Save(save) => view.read(&in_root(&save.root, ICON_PNG)),
            _ => Ok(None),
        }
    }

    /// The world folder name, when the archive has one.
    fn suggest_name(&self, metadata: &ResourceMetadata) -> String {
        match metadata {
            ResourceMetadata::Save(save) => save.root.clone(),
            _ => String::new(),
        }
    }

    fn derive_uri(&self, _metadata: &ResourceMetadata, hash: &str) -> String {
        content_uri(ResourceType::Save, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::test_support::zip_bytes;

    #[test]
    fn detects_world_in_top_folder() {
        let bytes = zip_bytes(&[
            ("New World/level.dat", "nbt"),
            ("New World/icon.png", "icon"),
            ("New World/region/r.0.0.mca", ""),
        ]);
        let mut view = ArchiveView::from_bytes(bytes).unwrap();

        let meta = SaveParser.parse_metadata(&mut view).unwrap();
        assert_eq!(SaveParser.suggest_name(&meta), "New World");
        assert_eq!(
            SaveParser.parse_icon(&meta, &mut view).unwrap().as_deref(),
            Some(b"icon".as_slice())
        );
    }

    #[test]
    fn detects_world_at_root() {
        let mut view = ArchiveView::from_bytes(zip_bytes(&[("level.dat", "nbt")])).unwrap();
        let meta = SaveParser.parse_metadata(&mut view).unwrap();
        assert_eq!(meta, ResourceMetadata::Save(SaveMetadata::default()));
        assert_eq!(SaveParser.derive_uri(&meta, "aa"), "save://aa");
    }

    #[test]
    fn rejects_two_worlds_side_by_side() {
        let bytes = zip_bytes(&[("a/level.dat", ""), ("b/level.dat", "")]);
        let mut view = ArchiveView::from_bytes(bytes).unwrap();
        assert!(SaveParser.parse_metadata(&mut view).is_err());
    }
}
