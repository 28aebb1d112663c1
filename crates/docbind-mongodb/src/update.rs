//! Update documents and find-one-and-update options

use bson::{Bson, Document as BsonDocument};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

use crate::schema::{CREATED_AT, UPDATED_AT};
use crate::{DocBindError, Result};

/// Which image of the record find-one-and-update hands back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnImage {
    /// The record as it was before the update
    #[default]
    Before,
    /// The record after the update was applied
    After,
}

/// Options for [`find_one_and_update`](crate::Repository::find_one_and_update)
#[derive(Debug, Clone, Default)]
pub struct ModifyOptions {
    pub return_image: ReturnImage,
    /// Insert a new record when nothing matches
    pub upsert: bool,
    pub projection: Option<BsonDocument>,
    /// Decides which record is "first" when several match
    pub sort: Option<BsonDocument>,
}

impl ModifyOptions {
    /// Return the post-update image
    pub fn returning_new() -> Self {
        Self {
            return_image: ReturnImage::After,
            ..Default::default()
        }
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn projection(mut self, projection: BsonDocument) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, sort: BsonDocument) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Driver options for this update
    pub fn to_driver_options(&self) -> FindOneAndUpdateOptions {
        let mut options = FindOneAndUpdateOptions::default();
        options.return_document = Some(match self.return_image {
            ReturnImage::Before => ReturnDocument::Before,
            ReturnImage::After => ReturnDocument::After,
        });
        options.upsert = self.upsert.then_some(true);
        options.projection = self.projection.clone();
        options.sort = self.sort.clone();
        options
    }
}

/// Turn a partial update into an operator document
///
/// Top-level keys that are not operators are moved under `$set`, merged with
/// any `$set` already present. Operator keys are kept as given.
///
/// # Errors
/// Returns ValidationError for an empty update or a `$set` that is not a document
pub fn normalize_update(update: BsonDocument) -> Result<BsonDocument> {
    if update.is_empty() {
        return Err(DocBindError::Validation("Update document cannot be empty".to_string()));
    }

    let mut operators = BsonDocument::new();
    let mut plain = BsonDocument::new();
    for (key, value) in update {
        if key.starts_with('$') {
            operators.insert(key, value);
        } else {
            plain.insert(key, value);
        }
    }

    if !plain.is_empty() {
        let set = set_stage(&mut operators)?;
        for (key, value) in plain {
            set.insert(key, value);
        }
    }

    Ok(operators)
}

/// Stamp `updatedAt` (and `createdAt` on upsert inserts)
///
/// A field the caller already names in any operator stage (`$set`,
/// `$currentDate`, `$unset`, ...) is left alone, since the server rejects two
/// operators on the same path.
pub fn stamp_timestamps(update: &mut BsonDocument, upsert: bool) -> Result<()> {
    let now = Bson::DateTime(bson::DateTime::now());

    if !mentions(update, UPDATED_AT) {
        set_stage(update)?.insert(UPDATED_AT, now.clone());
    }

    if upsert && !mentions(update, CREATED_AT) {
        operator_stage(update, "$setOnInsert")?.insert(CREATED_AT, now);
    }
    Ok(())
}

fn mentions(update: &BsonDocument, field: &str) -> bool {
    update
        .values()
        .filter_map(Bson::as_document)
        .any(|stage| stage.contains_key(field))
}

fn set_stage(update: &mut BsonDocument) -> Result<&mut BsonDocument> {
    operator_stage(update, "$set")
}

fn operator_stage<'a>(update: &'a mut BsonDocument, operator: &str) -> Result<&'a mut BsonDocument> {
    if !update.contains_key(operator) {
        update.insert(operator, BsonDocument::new());
    }
    update.get_document_mut(operator).map_err(|_| {
        DocBindError::Validation(format!("'{}' must be a document", operator))
    })
}
