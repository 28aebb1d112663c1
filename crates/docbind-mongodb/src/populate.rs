//! Relation expansion for find results
//!
//! References are stored as identifiers. Expanding a path runs one extra
//! query per path against the referenced collection (`_id` in the collected
//! identifiers) and splices the documents it finds back into the results:
//! - a single identifier becomes the referenced document, or `null` when
//!   nothing matched
//! - an array of identifiers becomes the array of matched documents, in the
//!   original order, with unmatched entries dropped

use std::collections::{HashMap, HashSet};

use bson::{doc, Bson, Document as BsonDocument};
use futures::TryStreamExt;
use mongodb::{options::FindOptions, Database};
use tracing::debug;

use crate::document::ID_FIELD;
use crate::query::non_empty;
use crate::schema::Schema;
use crate::validation::{ValidatedCollectionName, ValidatedFieldName};
use crate::{DocBindError, Result};

/// One path to expand
#[derive(Debug, Clone)]
pub struct Populate {
    path: ValidatedFieldName,
    from: Option<ValidatedCollectionName>,
    select: Option<BsonDocument>,
    filter: Option<BsonDocument>,
}

impl Populate {
    /// Expand the field at `path` (dotted paths reach into embedded documents)
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            path: ValidatedFieldName::new(path)?,
            from: None,
            select: None,
            filter: None,
        })
    }

    /// Collection to read referenced documents from, overriding the schema
    pub fn from(mut self, collection: &str) -> Result<Self> {
        self.from = Some(ValidatedCollectionName::new(collection)?);
        Ok(self)
    }

    /// Projection applied to the referenced documents
    ///
    /// `_id` is always fetched so results can be matched back to their
    /// references. When the projection excludes it (`{"_id": 0}`), it is
    /// removed from each expanded document after matching.
    pub fn select(mut self, projection: BsonDocument) -> Self {
        self.select = non_empty(projection);
        self
    }

    /// Extra filter the referenced documents must match
    pub fn matching(mut self, filter: BsonDocument) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    pub fn get_filter(&self) -> Option<&BsonDocument> {
        self.filter.as_ref()
    }

    /// Collection the references point into
    pub fn source<'a>(&'a self, schema: &'a Schema) -> Result<&'a str> {
        if let Some(ref from) = self.from {
            return Ok(from.as_str());
        }
        schema.reference_target(self.path()).ok_or_else(|| {
            DocBindError::Validation(format!(
                "Cannot populate '{}': no collection given and the schema declares no reference",
                self.path()
            ))
        })
    }

    /// Filter for the referenced collection
    pub fn lookup_filter(&self, ids: Vec<Bson>) -> BsonDocument {
        let by_id = doc! { "_id": { "$in": ids } };
        match self.filter {
            Some(ref filter) if !filter.is_empty() => doc! { "$and": [by_id, filter.clone()] },
            _ => by_id,
        }
    }

    /// Projection for the referenced collection; `_id` is always kept for matching
    pub fn lookup_projection(&self) -> Option<BsonDocument> {
        let mut projection = self.select.clone()?;
        projection.remove(ID_FIELD);
        non_empty(projection)
    }

    /// True if the caller's projection excludes `_id`
    pub fn excludes_id(&self) -> bool {
        let Some(ref select) = self.select else {
            return false;
        };
        match select.get(ID_FIELD) {
            Some(Bson::Boolean(keep)) => !keep,
            Some(Bson::Int32(n)) => *n == 0,
            Some(Bson::Int64(n)) => *n == 0,
            Some(Bson::Double(n)) => *n == 0.0,
            _ => false,
        }
    }

    /// Key fetched documents by `_id`, dropping the id when the projection excludes it
    pub fn index_found(&self, referenced: Vec<BsonDocument>) -> HashMap<String, BsonDocument> {
        let strip_id = self.excludes_id();
        referenced
            .into_iter()
            .filter_map(|mut doc| {
                let key = ref_key(doc.get(ID_FIELD)?);
                if strip_id {
                    doc.remove(ID_FIELD);
                }
                Some((key, doc))
            })
            .collect()
    }
}

fn ref_key(value: &Bson) -> String {
    value.to_string()
}

fn value_at<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }
    Some(current)
}

fn value_at_mut<'a>(doc: &'a mut BsonDocument, path: &str) -> Option<&'a mut Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get_mut(segments.next()?)?;
    for segment in segments {
        current = current.as_document_mut()?.get_mut(segment)?;
    }
    Some(current)
}

fn is_reference(value: &Bson) -> bool {
    !matches!(value, Bson::Null | Bson::Document(_) | Bson::Array(_))
}

/// Distinct identifiers found at `path`, in first-seen order
pub fn collect_ids(docs: &[BsonDocument], path: &str) -> Vec<Bson> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    let mut push = |value: &Bson| {
        if is_reference(value) && seen.insert(ref_key(value)) {
            ids.push(value.clone());
        }
    };

    for doc in docs {
        match value_at(doc, path) {
            Some(Bson::Array(items)) => items.iter().for_each(&mut push),
            Some(value) => push(value),
            None => {}
        }
    }
    ids
}

/// Replace identifiers at `path` with the documents in `found` (keyed by `_id`)
pub fn splice(docs: &mut [BsonDocument], path: &str, found: &HashMap<String, BsonDocument>) {
    for doc in docs.iter_mut() {
        let Some(slot) = value_at_mut(doc, path) else {
            continue;
        };

        match slot {
            Bson::Array(items) => {
                let expanded = items
                    .iter()
                    .filter(|item| is_reference(item))
                    .filter_map(|item| found.get(&ref_key(item)).cloned())
                    .map(Bson::Document)
                    .collect();
                *items = expanded;
            }
            value if is_reference(value) => {
                *value = match found.get(&ref_key(value)) {
                    Some(referenced) => Bson::Document(referenced.clone()),
                    None => Bson::Null,
                };
            }
            _ => {}
        }
    }
}

/// Expand one path across `docs` using a single query on the referenced collection
pub(crate) async fn expand(
    database: &Database,
    schema: &Schema,
    docs: &mut [BsonDocument],
    populate: &Populate,
) -> Result<()> {
    let source = populate.source(schema)?;
    let ids = collect_ids(docs, populate.path());
    if ids.is_empty() {
        return Ok(());
    }

    debug!(path = populate.path(), from = source, ids = ids.len(), "Populating references");

    let mut options = FindOptions::default();
    options.projection = populate.lookup_projection();

    let cursor = database
        .collection::<BsonDocument>(source)
        .find(populate.lookup_filter(ids))
        .with_options(options)
        .await?;
    let referenced: Vec<BsonDocument> = cursor.try_collect().await?;

    let found = populate.index_found(referenced);

    splice(docs, populate.path(), &found);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType};
    use bson::oid::ObjectId;

    fn found_map(docs: Vec<BsonDocument>) -> HashMap<String, BsonDocument> {
        docs.into_iter()
            .map(|d| (ref_key(d.get(ID_FIELD).unwrap()), d))
            .collect()
    }

    #[test]
    fn test_collect_ids_dedups_and_skips_nulls() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let docs = vec![
            doc! { "team": a },
            doc! { "team": b },
            doc! { "team": a },
            doc! { "team": null },
            doc! { "name": "no team" },
        ];
        assert_eq!(collect_ids(&docs, "team"), vec![Bson::ObjectId(a), Bson::ObjectId(b)]);
    }

    #[test]
    fn test_collect_ids_from_arrays_and_nested_paths() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let docs = vec![
            doc! { "members": [a, b], "meta": { "reviewer": b } },
        ];
        assert_eq!(collect_ids(&docs, "members").len(), 2);
        assert_eq!(collect_ids(&docs, "meta.reviewer"), vec![Bson::ObjectId(b)]);
    }

    #[test]
    fn test_splice_single_reference() {
        let a = ObjectId::new();
        let missing = ObjectId::new();
        let mut docs = vec![doc! { "team": a }, doc! { "team": missing }];
        let found = found_map(vec![doc! { "_id": a, "name": "core" }]);

        splice(&mut docs, "team", &found);

        assert_eq!(docs[0].get_document("team").unwrap().get_str("name").unwrap(), "core");
        assert_eq!(docs[1].get("team"), Some(&Bson::Null));
    }

    #[test]
    fn test_splice_array_keeps_order_and_drops_unmatched() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let missing = ObjectId::new();
        let mut docs = vec![doc! { "members": [b, missing, a] }];
        let found = found_map(vec![
            doc! { "_id": a, "name": "alice" },
            doc! { "_id": b, "name": "bob" },
        ]);

        splice(&mut docs, "members", &found);

        let members = docs[0].get_array("members").unwrap();
        let names: Vec<&str> = members
            .iter()
            .map(|m| m.as_document().unwrap().get_str("name").unwrap())
            .collect();
        assert_eq!(names, vec!["bob", "alice"]);
    }

    #[test]
    fn test_splice_nested_path() {
        let r = ObjectId::new();
        let mut docs = vec![doc! { "meta": { "reviewer": r } }];
        splice(&mut docs, "meta.reviewer", &found_map(vec![doc! { "_id": r, "n": 1 }]));
        let meta = docs[0].get_document("meta").unwrap();
        assert_eq!(meta.get_document("reviewer").unwrap().get_i32("n").unwrap(), 1);
    }

    #[test]
    fn test_source_from_schema_or_override() {
        let schema = Schema::new().field("team", FieldSpec::reference("teams"));
        let populate = Populate::new("team").unwrap();
        assert_eq!(populate.source(&schema).unwrap(), "teams");

        let overridden = Populate::new("team").unwrap().from("squads").unwrap();
        assert_eq!(overridden.source(&schema).unwrap(), "squads");

        let unknown = Populate::new("owner").unwrap();
        assert!(unknown.source(&schema).is_err());

        let arrays = Schema::new().field(
            "owners",
            FieldSpec::array(FieldType::Reference { collection: "users".into() }),
        );
        assert_eq!(Populate::new("owners").unwrap().source(&arrays).unwrap(), "users");
    }

    #[test]
    fn test_invalid_populate_inputs() {
        assert!(Populate::new("$where").is_err());
        assert!(Populate::new("team").unwrap().from("system.users").is_err());
    }

    #[test]
    fn test_excluded_id_removed_after_matching() {
        let a = ObjectId::new();
        let populate = Populate::new("team")
            .unwrap()
            .select(doc! { "name": 1, "_id": 0 });
        assert!(populate.excludes_id());

        let found = populate.index_found(vec![doc! { "_id": a, "name": "core" }]);
        let mut docs = vec![doc! { "team": a }];
        splice(&mut docs, "team", &found);

        assert_eq!(docs[0].get_document("team").unwrap(), &doc! { "name": "core" });
    }

    #[test]
    fn test_id_kept_unless_excluded() {
        let a = ObjectId::new();
        for populate in [
            Populate::new("team").unwrap(),
            Populate::new("team").unwrap().select(doc! { "name": 1 }),
            Populate::new("team").unwrap().select(doc! { "_id": true }),
        ] {
            assert!(!populate.excludes_id());
            let found = populate.index_found(vec![doc! { "_id": a, "name": "core" }]);
            assert!(found.values().all(|d| d.contains_key("_id")));
        }
        assert!(Populate::new("team").unwrap().select(doc! { "_id": false }).excludes_id());
    }

    #[test]
    fn test_lookup_filter_and_projection() {
        let id = ObjectId::new();
        let populate = Populate::new("team")
            .unwrap()
            .select(doc! { "name": 1, "_id": 0 })
            .matching(doc! { "active": true });

        assert_eq!(
            populate.lookup_filter(vec![Bson::ObjectId(id)]),
            doc! { "$and": [ { "_id": { "$in": [id] } }, { "active": true } ] }
        );
        assert_eq!(populate.lookup_projection(), Some(doc! { "name": 1 }));

        let plain = Populate::new("team").unwrap().select(doc! { "_id": 1 });
        assert_eq!(plain.lookup_filter(vec![]), doc! { "_id": { "$in": [] } });
        assert_eq!(plain.lookup_projection(), None);
    }
}
