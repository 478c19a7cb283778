use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::core::error::{ResourceError, ResourceResult};

/// How deep a directory view lists entries. Type detection only looks at the
/// first couple of levels, and saves or instance folders can be huge.
const DIRECTORY_LIST_DEPTH: usize = 3;

/// Read-only view over the content being classified: an in-memory zip
/// archive or a directory on disk. Entry names always use `/` separators,
/// and directory entries end with `/`.
pub enum ArchiveView {
    Zip(ZipArchive<Cursor<Vec<u8>>>),
    Directory(PathBuf),
}

impl ArchiveView {
    pub fn from_bytes(bytes: Vec<u8>) -> ResourceResult<Self> {
        Ok(ArchiveView::Zip(ZipArchive::new(Cursor::new(bytes))?))
    }

    pub fn from_directory(path: impl Into<PathBuf>) -> Self {
        ArchiveView::Directory(path.into())
    }

    /// Bytes of a single entry, `None` when the entry does not exist.
    pub fn read(&mut self, name: &str) -> ResourceResult<Option<Vec<u8>>> {
        match self {
            ArchiveView::Zip(archive) => {
                let mut file = match archive.by_name(name) {
                    Ok(file) => file,
                    Err(ZipError::FileNotFound) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let mut buf = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut buf)?;
                Ok(Some(buf))
            }
            ArchiveView::Directory(root) => {
                let Some(path) = contained_path(root, name) else {
                    return Ok(None);
                };
                if !path.is_file() {
                    return Ok(None);
                }
                std::fs::read(&path)
                    .map(Some)
                    .map_err(|e| ResourceError::io(path, e))
            }
        }
    }

    /// Entry decoded as UTF-8 (lossy, BOM stripped).
    pub fn read_to_string(&mut self, name: &str) -> ResourceResult<Option<String>> {
        Ok(self.read(name)?.map(|bytes| {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text)
        }))
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            ArchiveView::Zip(archive) => archive.index_for_name(name).is_some(),
            ArchiveView::Directory(root) => {
                contained_path(root, name.trim_end_matches('/')).is_some_and(|p| p.exists())
            }
        }
    }

    /// All entry names. Directory views stop a few levels down.
    pub fn entry_names(&self) -> Vec<String> {
        match self {
            ArchiveView::Zip(archive) => archive.file_names().map(str::to_string).collect(),
            ArchiveView::Directory(root) => {
                let mut names = Vec::new();
                list_directory(root, "", DIRECTORY_LIST_DEPTH, &mut names);
                names
            }
        }
    }

    /// Names of the folders at the root of the view, implicit zip folders included.
    pub fn top_level_folders(&self) -> BTreeSet<String> {
        self.entry_names()
            .iter()
            .filter_map(|name| name.split_once('/').map(|(head, _)| head.to_string()))
            .filter(|head| !head.is_empty())
            .collect()
    }

    /// True when the root holds only folders, exactly one of them.
    pub fn single_top_folder(&self) -> Option<String> {
        let names = self.entry_names();
        if names.iter().any(|n| !n.contains('/')) {
            return None;
        }
        let folders = self.top_level_folders();
        if folders.len() == 1 {
            folders.into_iter().next()
        } else {
            None
        }
    }
}

/// Resolve `name` under `root`, refusing anything that escapes it.
fn contained_path(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

fn list_directory(dir: &Path, prefix: &str, depth: usize, out: &mut Vec<String>) {
    if depth == 0 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            let folder = format!("{}{}/", prefix, name);
            out.push(folder.clone());
            list_directory(&entry.path(), &folder, depth - 1, out);
        } else {
            out.push(format!("{}{}", prefix, name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::test_support::zip_bytes;

    #[test]
    fn reads_zip_entries_and_reports_missing_ones() {
        let bytes = zip_bytes(&[("pack.mcmeta", "{}"), ("assets/a.png", "png")]);
        let mut view = ArchiveView::from_bytes(bytes).unwrap();

        assert_eq!(view.read("pack.mcmeta").unwrap().unwrap(), b"{}");
        assert!(view.read("missing.json").unwrap().is_none());
        assert!(view.contains("assets/a.png"));
        assert_eq!(
            view.top_level_folders().into_iter().collect::<Vec<_>>(),
            vec!["assets".to_string()]
        );
    }

    #[test]
    fn garbage_bytes_do_not_open() {
        assert!(ArchiveView::from_bytes(b"definitely not a zip".to_vec()).is_err());
    }

    #[test]
    fn directory_view_lists_and_reads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("world/region")).unwrap();
        std::fs::write(dir.path().join("world/level.dat"), b"nbt").unwrap();

        let mut view = ArchiveView::from_directory(dir.path());
        assert_eq!(view.single_top_folder(), Some("world".to_string()));
        assert!(view.contains("world/level.dat"));
        assert!(view.contains("world/region/"));
        assert_eq!(view.read("world/level.dat").unwrap().unwrap(), b"nbt");
        assert!(view.read("../escape").unwrap().is_none());
    }

    #[test]
    fn bom_is_stripped_from_text_entries() {
        let bytes = zip_bytes(&[("mcmod.info", "\u{feff}[]")]);
        let mut view = ArchiveView::from_bytes(bytes).unwrap();
        assert_eq!(view.read_to_string("mcmod.info").unwrap().unwrap(), "[]");
    }
}
