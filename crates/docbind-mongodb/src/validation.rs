//! Checks applied to caller-supplied names and filters before they reach the driver

use crate::Result;
use bson::{Bson, Document as BsonDocument};
use docbind_common::DocBindError;
use tracing::warn;

/// In characters; stricter than the server's own 255-byte namespace limit
const COLLECTION_NAME_LIMIT: usize = 120;

/// In characters
const FIELD_PATH_LIMIT: usize = 1024;

/// Operators that run JavaScript on the server
const SERVER_SCRIPT_OPERATORS: &[&str] = &["$where", "$function", "$accumulator"];

fn invalid(message: String) -> DocBindError {
    DocBindError::Validation(message)
}

macro_rules! checked_name {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $ty(String);

        impl $ty {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

checked_name!(
    /// A collection name that is non-empty, at most 120 characters, free of NUL
    /// and `$`, and outside the `system.` namespace
    ValidatedCollectionName
);

checked_name!(
    /// A field path whose dotted segments are non-empty and that does not
    /// start with an operator
    ValidatedFieldName
);

impl ValidatedCollectionName {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(invalid("Collection name cannot be empty".to_string()));
        }
        if name.chars().count() > COLLECTION_NAME_LIMIT {
            return Err(invalid(format!(
                "Collection name '{}' is longer than {} characters",
                name, COLLECTION_NAME_LIMIT
            )));
        }
        if name.contains('\0') {
            return Err(invalid("Collection name cannot contain NUL".to_string()));
        }
        if name.starts_with("system.") {
            return Err(invalid(format!(
                "Collection name '{}' is in the reserved system. namespace",
                name
            )));
        }
        if name.contains('$') {
            return Err(invalid(format!("Collection name '{}' cannot contain '$'", name)));
        }

        if name.contains("..") || name.contains("//") {
            warn!(collection = name, "Collection name looks like a path");
        }
        Ok(Self(name.to_string()))
    }
}

impl ValidatedFieldName {
    pub fn new(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(invalid("Field path cannot be empty".to_string()));
        }
        if path.chars().count() > FIELD_PATH_LIMIT {
            return Err(invalid(format!(
                "Field path is longer than {} characters",
                FIELD_PATH_LIMIT
            )));
        }
        if path.contains('\0') {
            return Err(invalid("Field path cannot contain NUL".to_string()));
        }
        if path.starts_with('$') {
            return Err(invalid(format!("Field path '{}' starts with an operator", path)));
        }
        if path.split('.').any(str::is_empty) {
            return Err(invalid(format!("Field path '{}' has an empty segment", path)));
        }
        Ok(Self(path.to_string()))
    }
}

/// Reject server-side script operators anywhere inside `value`
pub fn validate_query(value: &Bson) -> Result<()> {
    match value {
        Bson::Document(doc) => validate_filter(doc),
        Bson::Array(items) => items.iter().try_for_each(validate_query),
        _ => Ok(()),
    }
}

/// Reject server-side script operators anywhere inside a filter
pub fn validate_filter(filter: &BsonDocument) -> Result<()> {
    for (key, value) in filter {
        if SERVER_SCRIPT_OPERATORS.contains(&key.as_str()) {
            return Err(invalid(format!("Operator '{}' is not allowed", key)));
        }
        validate_query(value)?;
    }
    Ok(())
}

pub fn validate_pipeline(pipeline: &[BsonDocument]) -> Result<()> {
    pipeline.iter().try_for_each(validate_filter)
}
