use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A document as held by the store, with the hash writers must present to
/// replace it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Normalized store-relative path.
    pub path: String,
    pub content: String,
    /// Lowercase hex SHA-256 of `content`.
    pub hash: String,
}

impl StoredDocument {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        StoredDocument {
            path: path.into(),
            hash: content_hash(&content),
            content,
        }
    }
}

pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        let doc = StoredDocument::new("a.oct.md", "x");
        assert_eq!(doc.hash.len(), 64);
        assert_eq!(doc.hash, content_hash("x"));
    }
}
