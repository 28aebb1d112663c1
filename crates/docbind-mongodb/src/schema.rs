//! Schema descriptors for collection bindings
//!
//! A [`Schema`] names the fields of a record, their BSON types, and the
//! constraints checked before a record is inserted. Fields not described by the
//! schema are passed through untouched.
//!
//! ```ignore
//! let schema = Schema::new()
//!     .field("name", FieldSpec::string().required().max_length(64))
//!     .field("age", FieldSpec::int().minimum(0.0))
//!     .field("team", FieldSpec::reference("teams"))
//!     .timestamps(true);
//! ```

use crate::Result;
use bson::{Bson, Document as BsonDocument};
use docbind_common::DocBindError;
use regex::Regex;

/// Field holding the insertion time when timestamps are enabled
pub const CREATED_AT: &str = "createdAt";

/// Field holding the last modification time when timestamps are enabled
pub const UPDATED_AT: &str = "updatedAt";

/// Expected BSON type of a field
#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    /// Int32 or Int64
    Int,
    Double,
    Bool,
    DateTime,
    ObjectId,
    Binary,
    Array(Box<FieldType>),
    /// Embedded document with its own schema
    Object(Schema),
    /// Null or the inner type
    Optional(Box<FieldType>),
    /// ObjectId pointing into another collection
    Reference { collection: String },
    Any,
}

impl FieldType {
    /// Get the human-readable type name
    pub fn type_name(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Int => "int".to_string(),
            FieldType::Double => "double".to_string(),
            FieldType::Bool => "bool".to_string(),
            FieldType::DateTime => "datetime".to_string(),
            FieldType::ObjectId => "objectid".to_string(),
            FieldType::Binary => "binary".to_string(),
            FieldType::Array(items) => format!("array<{}>", items.type_name()),
            FieldType::Object(_) => "object".to_string(),
            FieldType::Optional(inner) => format!("optional<{}>", inner.type_name()),
            FieldType::Reference { collection } => format!("ref<{}>", collection),
            FieldType::Any => "any".to_string(),
        }
    }

    /// Collection referenced by this type, looking through arrays and optionals
    pub fn reference_target(&self) -> Option<&str> {
        match self {
            FieldType::Reference { collection } => Some(collection),
            FieldType::Array(inner) | FieldType::Optional(inner) => inner.reference_target(),
            _ => None,
        }
    }
}

/// A field's type plus the constraints checked on save
#[derive(Debug, Clone)]
pub struct FieldSpec {
    field_type: FieldType,
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    pattern: Option<Regex>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            pattern: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn int() -> Self {
        Self::new(FieldType::Int)
    }

    pub fn double() -> Self {
        Self::new(FieldType::Double)
    }

    pub fn bool() -> Self {
        Self::new(FieldType::Bool)
    }

    pub fn datetime() -> Self {
        Self::new(FieldType::DateTime)
    }

    pub fn object_id() -> Self {
        Self::new(FieldType::ObjectId)
    }

    pub fn array(items: FieldType) -> Self {
        Self::new(FieldType::Array(Box::new(items)))
    }

    pub fn object(schema: Schema) -> Self {
        Self::new(FieldType::Object(schema))
    }

    pub fn optional(inner: FieldType) -> Self {
        Self::new(FieldType::Optional(Box::new(inner)))
    }

    pub fn reference(collection: impl Into<String>) -> Self {
        Self::new(FieldType::Reference {
            collection: collection.into(),
        })
    }

    pub fn any() -> Self {
        Self::new(FieldType::Any)
    }

    /// Field must be present and non-null
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Minimum string length, in characters
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Maximum string length, in characters
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn minimum(mut self, min: f64) -> Self {
        self.minimum = Some(min);
        self
    }

    pub fn maximum(mut self, max: f64) -> Self {
        self.maximum = Some(max);
        self
    }

    /// Regex that string values must match
    ///
    /// # Errors
    /// Returns ValidationError if the pattern does not compile
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            DocBindError::Validation(format!("Invalid pattern '{}': {}", pattern, e))
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    fn check_constraints(&self, path: &str, value: &Bson) -> Result<()> {
        if let Bson::String(s) = value {
            let len = s.chars().count();
            if let Some(min) = self.min_length {
                if len < min {
                    return Err(constraint_error(path, format!("must be at least {} characters", min)));
                }
            }
            if let Some(max) = self.max_length {
                if len > max {
                    return Err(constraint_error(path, format!("must be at most {} characters", max)));
                }
            }
            if let Some(ref pattern) = self.pattern {
                if !pattern.is_match(s) {
                    return Err(constraint_error(path, format!("must match pattern '{}'", pattern.as_str())));
                }
            }
        }

        if let Some(n) = numeric_value(value) {
            if let Some(min) = self.minimum {
                if n < min {
                    return Err(constraint_error(path, format!("must be >= {}, got {}", min, n)));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    return Err(constraint_error(path, format!("must be <= {}, got {}", max, n)));
                }
            }
        }

        Ok(())
    }
}

/// Field names, types and options for one collection binding
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, FieldSpec)>,
    timestamps: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = spec,
            None => self.fields.push((name, spec)),
        }
        self
    }

    /// Maintain `createdAt`/`updatedAt` on save and update
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, spec)| spec)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Collection a (possibly dotted) field path refers to
    pub fn reference_target(&self, path: &str) -> Option<&str> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let spec = self.get(head)?;
        match (rest, spec.field_type()) {
            (None, field_type) => field_type.reference_target(),
            (Some(rest), FieldType::Object(nested)) => nested.reference_target(rest),
            (Some(_), _) => None,
        }
    }

    /// Check a document against this schema
    ///
    /// # Errors
    /// Returns ValidationError naming the first violating field by its dotted path
    pub fn validate(&self, document: &BsonDocument) -> Result<()> {
        self.validate_at(None, document)
    }

    fn validate_at(&self, prefix: Option<&str>, document: &BsonDocument) -> Result<()> {
        for (name, spec) in &self.fields {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, name),
                None => name.clone(),
            };

            match document.get(name) {
                None | Some(Bson::Null) if spec.required => {
                    return Err(DocBindError::Validation(format!(
                        "ValidationError: field '{}' is required",
                        path
                    )));
                }
                // Absent or null optional fields are left to the store
                None | Some(Bson::Null) => {}
                Some(value) => {
                    validate_type(&path, value, &spec.field_type)?;
                    spec.check_constraints(&path, value)?;
                }
            }
        }
        Ok(())
    }
}

fn constraint_error(path: &str, message: String) -> DocBindError {
    DocBindError::Validation(format!("ValidationError: field '{}' {}", path, message))
}

fn type_error(path: &str, expected: &FieldType, value: &Bson) -> DocBindError {
    DocBindError::Validation(format!(
        "ValidationError: field '{}' expected type '{}', got '{}'",
        path,
        expected.type_name(),
        bson_type_name(value)
    ))
}

fn numeric_value(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Get the BSON type name for error messages
fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::Int32(_) => "int32",
        Bson::Int64(_) => "int64",
        Bson::Timestamp(_) => "timestamp",
        Bson::Binary(_) => "binary",
        Bson::ObjectId(_) => "objectid",
        Bson::DateTime(_) => "datetime",
        Bson::Symbol(_) => "symbol",
        Bson::Decimal128(_) => "decimal128",
        _ => "unknown",
    }
}

fn validate_type(path: &str, value: &Bson, expected: &FieldType) -> Result<()> {
    let matches = match (expected, value) {
        (FieldType::Any, _) => true,
        (FieldType::Optional(_), Bson::Null) => true,
        (FieldType::Optional(inner), _) => return validate_type(path, value, inner),
        (FieldType::String, Bson::String(_)) => true,
        (FieldType::Int, Bson::Int32(_) | Bson::Int64(_)) => true,
        (FieldType::Double, Bson::Double(_)) => true,
        (FieldType::Bool, Bson::Boolean(_)) => true,
        (FieldType::DateTime, Bson::DateTime(_)) => true,
        (FieldType::ObjectId, Bson::ObjectId(_)) => true,
        (FieldType::Reference { .. }, Bson::ObjectId(_)) => true,
        (FieldType::Binary, Bson::Binary(_)) => true,
        (FieldType::Array(items), Bson::Array(arr)) => {
            for (index, item) in arr.iter().enumerate() {
                validate_type(&format!("{}[{}]", path, index), item, items)?;
            }
            true
        }
        (FieldType::Object(schema), Bson::Document(doc)) => {
            schema.validate_at(Some(path), doc)?;
            true
        }
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(type_error(path, expected, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    fn user_schema() -> Schema {
        Schema::new()
            .field("name", FieldSpec::string().required().min_length(1).max_length(16))
            .field("age", FieldSpec::int().minimum(0.0).maximum(150.0))
            .field("email", FieldSpec::string().pattern(r"^[^@\s]+@[^@\s]+$").unwrap())
            .field("team", FieldSpec::reference("teams"))
            .field("tags", FieldSpec::array(FieldType::String))
            .field(
                "address",
                FieldSpec::object(Schema::new().field("city", FieldSpec::string().required())),
            )
    }

    #[test]
    fn test_valid_document() {
        let doc = doc! {
            "name": "Alice",
            "age": 30,
            "email": "alice@example.com",
            "team": ObjectId::new(),
            "tags": ["admin", "ops"],
            "address": { "city": "Taipei" },
            "extra": "passes through"
        };
        assert!(user_schema().validate(&doc).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let err = user_schema().validate(&doc! { "age": 3 }).unwrap_err();
        assert!(err.to_string().contains("field 'name' is required"));
    }

    #[test]
    fn test_null_required_field() {
        let err = user_schema().validate(&doc! { "name": null }).unwrap_err();
        assert!(err.to_string().contains("is required"));
    }

    #[test]
    fn test_optional_fields_may_be_absent_or_null() {
        assert!(user_schema().validate(&doc! { "name": "Bob", "age": null }).is_ok());
    }

    #[test]
    fn test_type_mismatch() {
        let err = user_schema()
            .validate(&doc! { "name": "Bob", "age": "thirty" })
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("field 'age' expected type 'int', got 'string'"));
    }

    #[test]
    fn test_string_length_constraints() {
        let schema = user_schema();
        assert!(schema.validate(&doc! { "name": "" }).is_err());
        assert!(schema.validate(&doc! { "name": "x".repeat(17) }).is_err());
    }

    #[test]
    fn test_numeric_range() {
        let err = user_schema()
            .validate(&doc! { "name": "Bob", "age": -1 })
            .unwrap_err();
        assert!(err.to_string().contains("must be >= 0"));
        assert!(user_schema()
            .validate(&doc! { "name": "Bob", "age": 151_i64 })
            .is_err());
    }

    #[test]
    fn test_pattern() {
        assert!(user_schema()
            .validate(&doc! { "name": "Bob", "email": "not-an-email" })
            .is_err());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(FieldSpec::string().pattern("(unclosed").is_err());
    }

    #[test]
    fn test_array_item_path_in_error() {
        let err = user_schema()
            .validate(&doc! { "name": "Bob", "tags": ["ok", 5] })
            .unwrap_err();
        assert!(err.to_string().contains("tags[1]"));
    }

    #[test]
    fn test_nested_object_path_in_error() {
        let err = user_schema()
            .validate(&doc! { "name": "Bob", "address": { "zip": "100" } })
            .unwrap_err();
        assert!(err.to_string().contains("field 'address.city' is required"));
    }

    #[test]
    fn test_reference_requires_object_id() {
        assert!(user_schema()
            .validate(&doc! { "name": "Bob", "team": "teams/1" })
            .is_err());
    }

    #[test]
    fn test_reference_target() {
        let schema = Schema::new()
            .field("owner", FieldSpec::reference("users"))
            .field("members", FieldSpec::array(FieldType::Reference { collection: "users".into() }))
            .field("lead", FieldSpec::optional(FieldType::Reference { collection: "people".into() }))
            .field(
                "meta",
                FieldSpec::object(Schema::new().field("reviewer", FieldSpec::reference("reviewers"))),
            )
            .field("name", FieldSpec::string());

        assert_eq!(schema.reference_target("owner"), Some("users"));
        assert_eq!(schema.reference_target("members"), Some("users"));
        assert_eq!(schema.reference_target("lead"), Some("people"));
        assert_eq!(schema.reference_target("meta.reviewer"), Some("reviewers"));
        assert_eq!(schema.reference_target("name"), None);
        assert_eq!(schema.reference_target("missing"), None);
    }

    #[test]
    fn test_field_replaces_existing() {
        let schema = Schema::new()
            .field("name", FieldSpec::string())
            .field("name", FieldSpec::int());
        assert_eq!(schema.fields().count(), 1);
        assert!(matches!(schema.get("name").unwrap().field_type(), FieldType::Int));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(FieldType::Array(Box::new(FieldType::String)).type_name(), "array<string>");
        assert_eq!(
            FieldType::Optional(Box::new(FieldType::Reference { collection: "users".into() })).type_name(),
            "optional<ref<users>>"
        );
    }
}
