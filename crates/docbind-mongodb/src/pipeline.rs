//! Match-then-project aggregation pipelines

use bson::{doc, Document as BsonDocument};

use crate::query::non_empty;

/// `$match`, optional `$project`, optional `$limit`
#[derive(Debug, Clone, Default)]
pub struct AggregateQuery {
    filter: BsonDocument,
    projection: Option<BsonDocument>,
    limit: Option<i64>,
}

impl AggregateQuery {
    pub fn new(filter: BsonDocument) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn projection(mut self, projection: BsonDocument) -> Self {
        self.projection = non_empty(projection);
        self
    }

    /// Zero or less means no `$limit` stage
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn get_filter(&self) -> &BsonDocument {
        &self.filter
    }

    pub fn get_limit(&self) -> Option<i64> {
        self.limit
    }

    /// Build the pipeline stages in order
    pub fn pipeline(&self) -> Vec<BsonDocument> {
        let mut stages = vec![doc! { "$match": self.filter.clone() }];
        if let Some(ref projection) = self.projection {
            stages.push(doc! { "$project": projection.clone() });
        }
        if let Some(limit) = self.limit {
            stages.push(doc! { "$limit": limit });
        }
        stages
    }
}
