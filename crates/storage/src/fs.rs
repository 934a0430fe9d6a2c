use crate::path::normalize_path;
use crate::record::{content_hash, StoredDocument};
use crate::traits::{DocumentStore, Expected};
use crate::StorageError;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Directory-backed store.
///
/// Writes to one path are serialized through a per-path lock; the content
/// lands in a temp file in the target directory and is renamed over the
/// target, so readers never see a partial document.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStore {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a store path.
    pub fn resolve(&self, path: &str) -> Result<(String, PathBuf), StorageError> {
        let key = normalize_path(path)?;
        let full = self.root.join(&key);
        Ok((key, full))
    }

    /// Locks only the map holds are idle and are dropped on the way in.
    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);
        locks.entry(key.to_owned()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn read_file(key: &str, full: &Path) -> Result<Option<String>, StorageError> {
    match std::fs::read_to_string(full) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(key, e)),
    }
}

impl DocumentStore for FsStore {
    fn read(&self, path: &str) -> Result<StoredDocument, StorageError> {
        let (key, full) = self.resolve(path)?;
        match read_file(&key, &full)? {
            Some(content) => Ok(StoredDocument::new(key, content)),
            None => Err(StorageError::NotFound { path: key }),
        }
    }

    fn write(
        &self,
        path: &str,
        content: &str,
        expected: &Expected,
    ) -> Result<StoredDocument, StorageError> {
        let (key, full) = self.resolve(path)?;
        let lock = self.lock_for(&key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let current = read_file(&key, &full)?.map(|c| content_hash(&c));
        expected.check(&key, current.as_deref())?;

        let dir = full.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(dir).map_err(|e| StorageError::io(&key, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::io(&key, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StorageError::io(&key, e))?;
        tmp.persist(&full)
            .map_err(|e| StorageError::io(&key, e.error))?;

        tracing::info!(path = %key, bytes = content.len(), "document stored");
        Ok(StoredDocument::new(key, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let doc = store
            .write("notes/a/b.oct.md", "===A===\n===END===\n", &Expected::Absent)
            .unwrap();
        assert_eq!(doc.path, "notes/a/b.oct.md");
        assert!(dir.path().join("notes/a/b.oct.md").is_file());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.write("x.oct.md", "one", &Expected::Any).unwrap();
        store.write("x.oct.md", "two", &Expected::Any).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("x.oct.md")]);
    }

    #[test]
    fn idle_path_locks_are_released() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        for i in 0..50 {
            store
                .write(&format!("docs/{}.oct.md", i), "one", &Expected::Absent)
                .unwrap();
        }
        assert!(store.tracked_locks() <= 1);

        // a lock held by a writer survives other writes
        let held = store.lock_for("busy.oct.md");
        store.write("other.oct.md", "x", &Expected::Any).unwrap();
        assert_eq!(store.tracked_locks(), 2);
        assert!(Arc::ptr_eq(&held, &store.lock_for("busy.oct.md")));
    }
}
