//! Query builder for find operations

use bson::Document as BsonDocument;
use mongodb::options::FindOptions;

use crate::populate::Populate;

/// Filter, projection, relation expansion and limit for a find
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    filter: BsonDocument,
    projection: Option<BsonDocument>,
    populate: Vec<Populate>,
    limit: Option<i64>,
}

impl FindQuery {
    /// Create a new query matching `filter`
    pub fn new(filter: BsonDocument) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Restrict the returned fields (`{field: 1}` includes, `{field: 0}` excludes)
    pub fn projection(mut self, projection: BsonDocument) -> Self {
        self.projection = non_empty(projection);
        self
    }

    /// Expand a referenced field inline; may be called once per path
    pub fn populate(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }

    /// Set the maximum number of documents to return; zero or less means no limit
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn get_filter(&self) -> &BsonDocument {
        &self.filter
    }

    pub fn get_projection(&self) -> Option<&BsonDocument> {
        self.projection.as_ref()
    }

    pub fn get_populate(&self) -> &[Populate] {
        &self.populate
    }

    pub fn get_limit(&self) -> Option<i64> {
        self.limit
    }

    /// Driver options for this query
    pub fn find_options(&self) -> FindOptions {
        let mut options = FindOptions::default();
        options.projection = self.projection.clone();
        options.limit = self.limit;
        options
    }

    pub(crate) fn into_parts(self) -> (BsonDocument, FindOptions, Vec<Populate>) {
        let options = self.find_options();
        (self.filter, options, self.populate)
    }
}

/// Treat an empty projection document as no projection
pub(crate) fn non_empty(doc: BsonDocument) -> Option<BsonDocument> {
    (!doc.is_empty()).then_some(doc)
}
