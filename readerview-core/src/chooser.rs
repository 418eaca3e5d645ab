use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "xps", "cbz", "epub", "fb2", "png", "jpe", "jpeg", "jpg", "jfif", "jfif-tbnl", "tif",
    "tiff",
];
const KEY_FILE_EXTENSIONS: &[&str] = &["pfx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Documents,
    KeyFile,
}

impl Purpose {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Purpose::Documents => DOCUMENT_EXTENSIONS,
            Purpose::KeyFile => KEY_FILE_EXTENSIONS,
        }
    }

    /// True when the file name ends in `.` plus one of the extensions, in any
    /// case. A bare dotfile such as `.pdf` counts.
    pub fn matches(self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        let name = name.to_lowercase();
        self.extensions()
            .iter()
            .any(|known| name.ends_with(&format!(".{}", known)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Dir,
    Doc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChooserItem {
    pub kind: ItemKind,
    pub name: String,
    pub full_path: PathBuf,
}

/// Lists every matching file under `root`, grouped by directory. The root's
/// own files come first, then each subdirectory in name order, depth first.
/// A directory appears only when it holds at least one match.
#[instrument]
pub fn scan(root: &Path, purpose: Purpose) -> Result<Vec<ChooserItem>> {
    let root = root
        .canonicalize()
        .with_context(|| format!("failed to resolve chooser root {:?}", root))?;
    let mut items = Vec::new();
    scan_dir(&root, purpose, &mut items);
    debug!(count = items.len(), "scan finished");
    Ok(items)
}

fn scan_dir(dir: &Path, purpose: Purpose, items: &mut Vec<ChooserItem>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(?dir, %err, "skipping unreadable directory");
            return;
        }
    };

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            dirs.push(path);
        } else if purpose.matches(&path) {
            files.push(path);
        }
    }
    files.sort_by_key(|path| sort_key(path));
    dirs.sort_by_key(|path| sort_key(path));

    if !files.is_empty() {
        items.push(ChooserItem {
            kind: ItemKind::Dir,
            name: dir.to_string_lossy().into_owned(),
            full_path: dir.to_path_buf(),
        });
        items.extend(files.into_iter().map(|path| ChooserItem {
            kind: ItemKind::Doc,
            name: file_name(&path),
            full_path: path,
        }));
    }
    for sub in dirs {
        scan_dir(&sub, purpose, items);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sort_key(path: &Path) -> String {
    file_name(path).to_lowercase()
}

#[async_trait]
pub trait DocumentLister: Send + Sync {
    async fn list(&self, root: &Path, purpose: Purpose) -> Result<Vec<ChooserItem>>;
}

/// Runs [`scan`] on the blocking pool so large trees do not stall the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDocumentLister;

#[async_trait]
impl DocumentLister for FsDocumentLister {
    async fn list(&self, root: &Path, purpose: Purpose) -> Result<Vec<ChooserItem>> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || scan(&root, purpose))
            .await
            .context("chooser scan task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    fn names(items: &[ChooserItem]) -> Vec<(ItemKind, String)> {
        items
            .iter()
            .map(|item| (item.kind, item.name.clone()))
            .collect()
    }

    #[test]
    fn root_files_come_before_subdirectories() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("b.PDF"));
        touch(&root.join("A.epub"));
        touch(&root.join("notes.txt"));
        touch(&root.join("Zeta/z.cbz"));
        touch(&root.join("alpha/x.jpg"));
        touch(&root.join("alpha/deep/y.tiff"));
        touch(&root.join("empty/readme.md"));

        let items = scan(&root, Purpose::Documents).unwrap();
        let display = |path: PathBuf| path.to_string_lossy().into_owned();
        assert_eq!(
            names(&items),
            vec![
                (ItemKind::Dir, display(root.clone())),
                (ItemKind::Doc, "A.epub".to_string()),
                (ItemKind::Doc, "b.PDF".to_string()),
                (ItemKind::Dir, display(root.join("alpha"))),
                (ItemKind::Doc, "x.jpg".to_string()),
                (ItemKind::Dir, display(root.join("alpha/deep"))),
                (ItemKind::Doc, "y.tiff".to_string()),
                (ItemKind::Dir, display(root.join("Zeta"))),
                (ItemKind::Doc, "z.cbz".to_string()),
            ]
        );
        assert_eq!(items[1].full_path, root.join("A.epub"));
    }

    #[test]
    fn key_file_purpose_only_lists_pfx() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("id.pfx"));
        touch(&dir.path().join("doc.pdf"));

        let items = scan(dir.path(), Purpose::KeyFile).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].name, "id.pfx");
    }

    #[test]
    fn extension_matching_ignores_case() {
        assert!(Purpose::Documents.matches(Path::new("scan.JFIF-TBNL")));
        assert!(!Purpose::Documents.matches(Path::new("archive.zip")));
        assert!(!Purpose::Documents.matches(Path::new("pdf")));
    }

    #[test]
    fn dotfile_named_after_an_extension_matches() {
        assert!(Purpose::Documents.matches(Path::new("/books/.pdf")));
        assert!(Purpose::Documents.matches(Path::new(".EPUB")));
        assert!(Purpose::KeyFile.matches(Path::new(".pfx")));
        assert!(!Purpose::KeyFile.matches(Path::new("pfx")));
        assert!(!Purpose::Documents.matches(Path::new("notes.mypdf")));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(scan(&dir.path().join("gone"), Purpose::Documents).is_err());
    }

    #[tokio::test]
    async fn fs_lister_matches_scan() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("one.xps"));
        let listed = FsDocumentLister
            .list(dir.path(), Purpose::Documents)
            .await
            .unwrap();
        assert_eq!(listed, scan(dir.path(), Purpose::Documents).unwrap());
    }
}
