//! Byte-oriented persistence
//!
//! The document transform never touches storage. Callers read bytes from a
//! [`ByteStore`], hand the text to the transform, and write exported text
//! back. Two reference backends are provided: in-memory and one JSON file
//! per key in a directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{EngineError, Result};

/// Abstract key/bytes persistence
pub trait ByteStore: Send + Sync {
    /// Bytes stored under `key`, or `NotFound`
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Remove `key`; returns whether anything was removed
    fn delete(&self, key: &str) -> Result<bool>;

    fn contains(&self, key: &str) -> Result<bool>;

    /// Every stored key, sorted
    fn keys(&self) -> Result<Vec<String>>;
}

/// Volatile store, mostly for tests and previews
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(key.to_string()))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Stores each key as `<root>/<key>.json`
///
/// The directory is created on first write.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for `key`, rejecting anything that could escape the root
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let invalid = key.is_empty()
            || key == "."
            || key.contains("..")
            || key.contains('/')
            || key.contains('\\')
            || key.contains('\0');
        if invalid {
            return Err(EngineError::Storage(format!("Invalid store key '{}'", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl ByteStore for DirectoryStore {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(&path, bytes)?;
        log::debug!("Wrote '{}' to {:?}", key, path);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        log::debug!("Deleted '{}' from {:?}", key, path);
        Ok(true)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key)?.is_file())
    }

    fn keys(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn exercise(store: &dyn ByteStore) {
        assert!(matches!(store.read("a"), Err(EngineError::NotFound(_))));
        assert_ok!(store.write("b", b"{\"x\":2}"));
        assert_ok!(store.write("a", b"{}"));

        assert_eq!(store.read("a").unwrap(), b"{}");
        assert!(store.contains("b").unwrap());
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert!(!store.contains("a").unwrap());
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("composites"));
        assert!(store.keys().unwrap().is_empty());
        exercise(&store);
        assert!(dir.path().join("composites").join("b.json").is_file());
    }

    #[test]
    fn test_directory_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        for key in ["../escape", "a/b", "", "..", "a\\b"] {
            let err = assert_err!(store.write(key, b"{}"));
            assert_eq!(err.code(), "STORAGE_ERROR");
        }
    }
}
