use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RootId = Uuid;

static ROOT_NAMESPACE: Lazy<Uuid> =
    Lazy::new(|| Uuid::new_v5(&Uuid::NAMESPACE_URL, b"readerview:chooser-root"));

/// Stable identifier for a chooser root. Relative paths are resolved against
/// the working directory so the same folder always maps to the same id.
pub fn id_for_path(path: &Path) -> RootId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    Uuid::new_v5(&*ROOT_NAMESPACE, resolved.to_string_lossy().as_bytes())
}

/// Where the chooser list was last scrolled to for a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListPosition {
    pub first_visible: usize,
}

pub trait PositionStore: Send + Sync {
    fn load(&self, root: &Path) -> Result<Option<ListPosition>>;
    fn save(&self, root: &Path, position: ListPosition) -> Result<()>;
}

pub struct FilePositionStore {
    dir: PathBuf,
}

impl FilePositionStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create position directory at {:?}", dir))?;
        Ok(Self { dir })
    }

    fn position_path(&self, root: &Path) -> PathBuf {
        self.dir.join(format!("{}.json", id_for_path(root)))
    }
}

impl PositionStore for FilePositionStore {
    fn load(&self, root: &Path) -> Result<Option<ListPosition>> {
        let path = self.position_path(root);
        if !path.exists() {
            return Ok(None);
        }
        let mut file =
            File::open(&path).with_context(|| format!("failed to open position file {:?}", path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let position = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode position file {:?}", path))?;
        Ok(Some(position))
    }

    fn save(&self, root: &Path, position: ListPosition) -> Result<()> {
        let path = self.position_path(root);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(&position)?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp position file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move position file into {:?}", path))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPositionStore {
    inner: Mutex<HashMap<RootId, ListPosition>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for MemoryPositionStore {
    fn load(&self, root: &Path) -> Result<Option<ListPosition>> {
        Ok(self.inner.lock().get(&id_for_path(root)).copied())
    }

    fn save(&self, root: &Path, position: ListPosition) -> Result<()> {
        self.inner.lock().insert(id_for_path(root), position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn id_is_stable_for_equivalent_paths() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("books");
        fs::create_dir(&nested).unwrap();

        let direct = id_for_path(&nested);
        let dotted = id_for_path(&nested.join("..").join("books"));
        assert_eq!(direct, dotted);
        assert_ne!(direct, id_for_path(dir.path()));
    }

    #[test]
    fn file_store_round_trips_positions() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("library");
        fs::create_dir(&root).unwrap();
        let store = FilePositionStore::new(dir.path().join("positions")).unwrap();

        assert_eq!(store.load(&root).unwrap(), None);
        store
            .save(&root, ListPosition { first_visible: 42 })
            .unwrap();
        assert_eq!(
            store.load(&root).unwrap(),
            Some(ListPosition { first_visible: 42 })
        );

        // a fresh store over the same directory sees the saved value
        let reopened = FilePositionStore::new(dir.path().join("positions")).unwrap();
        assert_eq!(reopened.load(&root).unwrap().map(|p| p.first_visible), Some(42));
    }

    #[test]
    fn memory_store_keys_by_root() {
        let store = MemoryPositionStore::new();
        store
            .save(Path::new("/srv/a"), ListPosition { first_visible: 3 })
            .unwrap();
        assert_eq!(
            store.load(Path::new("/srv/a")).unwrap(),
            Some(ListPosition { first_visible: 3 })
        );
        assert_eq!(store.load(Path::new("/srv/b")).unwrap(), None);
    }
}
