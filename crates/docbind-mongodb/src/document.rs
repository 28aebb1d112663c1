//! Record trait for typed collections
//!
//! Any `Serialize + DeserializeOwned` type can be stored through a
//! [`TypedCollection`](crate::TypedCollection). Records that want a generated
//! identifier back from `save` declare an `_id` field:
//!
//! ```ignore
//! use bson::oid::ObjectId;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     id: Option<ObjectId>,
//!     name: String,
//! }
//! ```

use bson::{oid::ObjectId, Bson, Document as BsonDocument};
use docbind_common::{DocBindError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Name of the identifier field
pub const ID_FIELD: &str = "_id";

/// A value that round-trips through a BSON document
pub trait Record: Serialize + DeserializeOwned + Send + Sync + Sized {
    /// Convert record to BSON
    fn to_bson(&self) -> Result<BsonDocument> {
        bson::to_document(self).map_err(|e| DocBindError::Serialization(e.to_string()))
    }

    /// Create record from BSON
    fn from_bson(doc: BsonDocument) -> Result<Self> {
        bson::from_document(doc).map_err(|e| DocBindError::Deserialization(e.to_string()))
    }
}

impl<T> Record for T where T: Serialize + DeserializeOwned + Send + Sync {}

/// Make sure the document carries an `_id`, generating an ObjectId if needed
///
/// A null `_id` counts as missing. Returns the identifier now on the document.
pub fn ensure_id(doc: &mut BsonDocument) -> Bson {
    match doc.get(ID_FIELD) {
        Some(id) if !matches!(id, Bson::Null) => id.clone(),
        _ => {
            let id = Bson::ObjectId(ObjectId::new());
            doc.insert(ID_FIELD, id.clone());
            id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestDoc {
        #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
        id: Option<ObjectId>,
        name: String,
        value: i32,
    }

    #[test]
    fn test_to_bson() {
        let doc = TestDoc {
            id: None,
            name: "test".to_string(),
            value: 42,
        };

        let bson = doc.to_bson().unwrap();
        assert_eq!(bson.get_str("name").unwrap(), "test");
        assert_eq!(bson.get_i32("value").unwrap(), 42);
        assert!(!bson.contains_key(ID_FIELD));
    }

    #[test]
    fn test_from_bson_missing_field() {
        let err = TestDoc::from_bson(doc! { "name": "test" }).unwrap_err();
        assert!(matches!(err, DocBindError::Deserialization(_)));
    }

    #[test]
    fn test_ensure_id_generates_when_missing() {
        let mut doc = doc! { "name": "Alice" };
        let id = ensure_id(&mut doc);
        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(doc.get(ID_FIELD), Some(&id));
    }

    #[test]
    fn test_ensure_id_replaces_null() {
        let mut doc = doc! { "_id": null, "name": "Alice" };
        assert!(matches!(ensure_id(&mut doc), Bson::ObjectId(_)));
    }

    #[test]
    fn test_ensure_id_keeps_existing() {
        let mut doc = doc! { "_id": "custom-key", "name": "Alice" };
        assert_eq!(ensure_id(&mut doc), Bson::String("custom-key".to_string()));
    }
}
