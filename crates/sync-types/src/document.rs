//! Stored documents and their composite identifiers.
//!
//! A stored object is a JSON document carrying a `libraryID` (routing key),
//! a `key` and an upstream-assigned `version`. Everything else is opaque and
//! passed through to the indexes untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// Identifier shared by both indexes: `<libraryID>/<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId {
    /// Partition key, also used as the index routing value
    pub library_id: i64,
    /// Object key within the library
    pub key: String,
}

impl DocumentId {
    /// Create an identifier from its parts.
    pub fn new(library_id: i64, key: impl Into<String>) -> Self {
        Self {
            library_id,
            key: key.into(),
        }
    }

    /// Derive the identifier from an object's storage key.
    ///
    /// Splits on the first `/` into exactly two non-empty parts. The first
    /// must be a library id in canonical decimal form (no sign, no leading
    /// zeros) so the derived id matches the storage key text.
    pub fn from_storage_key(storage_key: &str) -> Result<Self, SyncError> {
        let (library, key) = storage_key
            .split_once('/')
            .ok_or_else(|| SyncError::InvalidKey(format!("missing separator in '{storage_key}'")))?;

        if key.is_empty() {
            return Err(SyncError::InvalidKey(format!(
                "empty object key in '{storage_key}'"
            )));
        }

        let canonical = !library.is_empty()
            && library.bytes().all(|b| b.is_ascii_digit())
            && (library == "0" || !library.starts_with('0'));
        if !canonical {
            return Err(SyncError::InvalidKey(format!(
                "library id '{library}' in '{storage_key}' is not canonical"
            )));
        }

        let library_id = library.parse::<i64>().map_err(|e| {
            SyncError::InvalidKey(format!("library id '{library}' in '{storage_key}': {e}"))
        })?;

        Ok(Self::new(library_id, key))
    }

    /// Routing value sent with every write for this document.
    pub fn routing(&self) -> String {
        self.library_id.to_string()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.library_id, self.key)
    }
}

/// A stored object decoded for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Library the object belongs to
    #[serde(rename = "libraryID")]
    pub library_id: i64,

    /// Object key (redundant with the composite id once indexed)
    pub key: String,

    /// Monotonic version assigned upstream
    pub version: u64,

    /// Remaining body fields, passed through verbatim
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Decode a document from the raw bytes of a stored object.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Composite identifier of this document.
    pub fn id(&self) -> DocumentId {
        DocumentId::new(self.library_id, self.key.clone())
    }

    /// Body written to the indexes: the stored object without `key`.
    pub fn index_body(&self) -> Value {
        let mut body = self.fields.clone();
        body.insert("libraryID".to_string(), Value::from(self.library_id));
        body.insert("version".to_string(), Value::from(self.version));
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_document() {
        let bytes = br#"{"libraryID":5,"key":"ABCD1234","version":3,"title":"X","tags":["a"]}"#;
        let doc = Document::from_bytes(bytes).unwrap();

        assert_eq!(doc.library_id, 5);
        assert_eq!(doc.key, "ABCD1234");
        assert_eq!(doc.version, 3);
        assert_eq!(doc.fields.get("title"), Some(&json!("X")));
        assert_eq!(doc.fields.get("tags"), Some(&json!(["a"])));
    }

    #[test]
    fn test_decode_malformed() {
        let err = Document::from_bytes(b"{not json").unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));

        // Missing version
        let err = Document::from_bytes(br#"{"libraryID":5,"key":"A"}"#).unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }

    #[test]
    fn test_index_body_strips_key() {
        let doc = Document::from_bytes(
            br#"{"libraryID":5,"key":"ABCD1234","version":3,"title":"X"}"#,
        )
        .unwrap();

        assert_eq!(
            doc.index_body(),
            json!({"libraryID": 5, "version": 3, "title": "X"})
        );
    }

    #[test]
    fn test_composite_id() {
        let id = DocumentId::new(5, "ABCD1234");
        assert_eq!(id.to_string(), "5/ABCD1234");
        assert_eq!(id.routing(), "5");
    }

    #[test]
    fn test_from_storage_key() {
        let id = DocumentId::from_storage_key("5/ABCD1234").unwrap();
        assert_eq!(id, DocumentId::new(5, "ABCD1234"));

        // Only the first separator splits
        let id = DocumentId::from_storage_key("12/AB/CD").unwrap();
        assert_eq!(id.library_id, 12);
        assert_eq!(id.key, "AB/CD");
    }

    #[test]
    fn test_from_storage_key_invalid() {
        assert!(matches!(
            DocumentId::from_storage_key("ABCD1234"),
            Err(SyncError::InvalidKey(_))
        ));
        assert!(matches!(
            DocumentId::from_storage_key("5/"),
            Err(SyncError::InvalidKey(_))
        ));
        assert!(matches!(
            DocumentId::from_storage_key("lib/ABCD1234"),
            Err(SyncError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_from_storage_key_rejects_non_canonical_library() {
        for key in ["+5/KEY", "05/KEY", "-5/KEY", " 5/KEY", "/KEY"] {
            assert!(
                matches!(
                    DocumentId::from_storage_key(key),
                    Err(SyncError::InvalidKey(_))
                ),
                "{key} should be rejected"
            );
        }

        let id = DocumentId::from_storage_key("0/KEY").unwrap();
        assert_eq!(id.to_string(), "0/KEY");
    }
}
