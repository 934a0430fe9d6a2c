use crate::path::normalize_path;
use crate::record::{content_hash, StoredDocument};
use crate::traits::{DocumentStore, Expected};
use crate::StorageError;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory store; one lock over the whole map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, path: &str) -> Result<StoredDocument, StorageError> {
        let key = normalize_path(path)?;
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.get(&key)
            .map(|content| StoredDocument::new(key.clone(), content.clone()))
            .ok_or(StorageError::NotFound { path: key })
    }

    fn write(
        &self,
        path: &str,
        content: &str,
        expected: &Expected,
    ) -> Result<StoredDocument, StorageError> {
        let key = normalize_path(path)?;
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        let current = docs.get(&key).map(|c| content_hash(c));
        expected.check(&key, current.as_deref())?;
        docs.insert(key.clone(), content.to_owned());
        tracing::info!(path = %key, bytes = content.len(), "document stored");
        Ok(StoredDocument::new(key, content))
    }
}
