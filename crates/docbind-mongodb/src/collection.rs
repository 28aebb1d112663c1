//! Typed collections bound to a shared connection
//!
//! A [`TypedCollection`] pairs a [`CollectionBinding`] (logical name, storage
//! name, schema) with a [`ConnectionHandle`]. Every operation waits for the
//! handle to settle before it touches the store.

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document as BsonDocument};
use futures::TryStreamExt;
use tracing::{debug, instrument};

use crate::config::get_config;
use crate::connection::{ConnectionHandle, Session};
use crate::document::{ensure_id, Record};
use crate::pipeline::AggregateQuery;
use crate::populate;
use crate::query::FindQuery;
use crate::schema::{Schema, CREATED_AT, UPDATED_AT};
use crate::update::{normalize_update, stamp_timestamps, ModifyOptions};
use crate::validation::{validate_filter, validate_pipeline, ValidatedCollectionName};
use crate::Result;

/// Logical entity name, storage collection and schema for one record type
#[derive(Debug, Clone)]
pub struct CollectionBinding {
    name: String,
    storage_name: ValidatedCollectionName,
    schema: Schema,
}

impl CollectionBinding {
    /// Bind `name` to a collection of the same name
    pub fn new(name: &str, schema: Schema) -> Result<Self> {
        Self::with_plural(name, schema, None)
    }

    /// Bind `name` to the `plural` collection when given
    pub fn with_plural(name: &str, schema: Schema, plural: Option<&str>) -> Result<Self> {
        let storage_name = ValidatedCollectionName::new(plural.unwrap_or(name))?;
        Ok(Self {
            name: name.to_string(),
            storage_name,
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_name(&self) -> &str {
        self.storage_name.as_str()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Apply schema checks, timestamps and identifier generation to a new document
    pub fn prepare_insert(&self, document: &mut BsonDocument) -> Result<Bson> {
        if self.schema.has_timestamps() {
            let now = Bson::DateTime(bson::DateTime::now());
            for field in [CREATED_AT, UPDATED_AT] {
                if matches!(document.get(field), None | Some(Bson::Null)) {
                    document.insert(field, now.clone());
                }
            }
        }

        if get_config().validate_schema {
            self.schema.validate(document)?;
        }

        Ok(ensure_id(document))
    }

    /// Build the operator document sent for find-one-and-update
    pub fn prepare_update(&self, update: BsonDocument, upsert: bool) -> Result<BsonDocument> {
        let mut update = normalize_update(update)?;
        if self.schema.has_timestamps() {
            stamp_timestamps(&mut update, upsert)?;
        }
        Ok(update)
    }
}

/// Data-access operations over records of type `T`
///
/// Absence is never an error: single-record operations return `Ok(None)` and
/// sequence operations return an empty vector.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Insert the record and return it as stored, including a generated `_id`
    async fn save(&self, record: T) -> Result<T>;

    /// Records matching the query
    async fn find(&self, query: FindQuery) -> Result<Vec<T>>;

    /// First record matching the query; any limit on the query is replaced by 1
    async fn find_one(&self, query: FindQuery) -> Result<Option<T>>;

    /// Apply a partial update to the first match and return the image chosen by `options`
    async fn find_one_and_update(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
        options: ModifyOptions,
    ) -> Result<Option<T>>;

    /// Remove the first record matching `filter` and return it
    async fn find_one_and_remove(&self, filter: BsonDocument) -> Result<Option<T>>;

    /// Remove the record with the given `_id` and return it
    async fn remove_by_id(&self, id: ObjectId) -> Result<Option<T>> {
        self.find_one_and_remove(doc! { "_id": id }).await
    }

    /// Run a match/project/limit pipeline
    async fn aggregate(&self, query: AggregateQuery) -> Result<Vec<T>>;

    /// First result of the pipeline; any limit on the query is replaced by 1
    async fn aggregate_one(&self, query: AggregateQuery) -> Result<Option<T>>;

    /// Number of records matching `filter`
    async fn count(&self, filter: BsonDocument) -> Result<u64>;
}

/// MongoDB-backed repository for one collection binding
pub struct TypedCollection<T> {
    connection: ConnectionHandle,
    binding: CollectionBinding,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> TypedCollection<T> {
    /// Bind `name` (also the collection name) on a pending or settled connection
    pub fn new(connection: ConnectionHandle, name: &str, schema: Schema) -> Result<Self> {
        Ok(Self::from_binding(connection, CollectionBinding::new(name, schema)?))
    }

    /// Bind `name`, storing records in the `plural` collection
    pub fn with_plural(
        connection: ConnectionHandle,
        name: &str,
        schema: Schema,
        plural: &str,
    ) -> Result<Self> {
        Ok(Self::from_binding(
            connection,
            CollectionBinding::with_plural(name, schema, Some(plural))?,
        ))
    }

    pub fn from_binding(connection: ConnectionHandle, binding: CollectionBinding) -> Self {
        Self {
            connection,
            binding,
            _record: PhantomData,
        }
    }

    pub fn binding(&self) -> &CollectionBinding {
        &self.binding
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    fn check_filter(filter: &BsonDocument) -> Result<()> {
        if get_config().validate_queries {
            validate_filter(filter)?;
        }
        Ok(())
    }

    fn check_populate(query: &FindQuery) -> Result<()> {
        for populate in query.get_populate() {
            if let Some(filter) = populate.get_filter() {
                Self::check_filter(filter)?;
            }
        }
        Ok(())
    }

    async fn session(&self) -> Result<Session> {
        self.connection.ready().await
    }

    async fn run_find(&self, query: FindQuery) -> Result<Vec<T>> {
        Self::check_filter(query.get_filter())?;
        Self::check_populate(&query)?;

        let session = self.session().await?;
        let (filter, options, expansions) = query.into_parts();

        let cursor = session
            .collection(self.binding.storage_name())
            .find(filter)
            .with_options(options)
            .await?;
        let mut docs: Vec<BsonDocument> = cursor.try_collect().await?;

        for expansion in &expansions {
            populate::expand(session.database(), &self.binding.schema, &mut docs, expansion).await?;
        }

        debug!(returned = docs.len(), "Find complete");
        docs.into_iter().map(T::from_bson).collect()
    }

    async fn run_aggregate(&self, query: AggregateQuery) -> Result<Vec<T>> {
        let pipeline = query.pipeline();
        if get_config().validate_queries {
            validate_pipeline(&pipeline)?;
        }

        let session = self.session().await?;
        let cursor = session
            .collection(self.binding.storage_name())
            .aggregate(pipeline)
            .await?;
        let docs: Vec<BsonDocument> = cursor.try_collect().await?;

        debug!(returned = docs.len(), "Aggregate complete");
        docs.into_iter().map(T::from_bson).collect()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for TypedCollection<T> {
    #[instrument(level = "debug", skip(self, record), fields(collection = %self.binding.storage_name()))]
    async fn save(&self, record: T) -> Result<T> {
        let mut document = record.to_bson()?;
        let id = self.binding.prepare_insert(&mut document)?;

        let session = self.session().await?;
        session
            .collection(self.binding.storage_name())
            .insert_one(&document)
            .await?;

        debug!(id = %id, "Record saved");
        T::from_bson(document)
    }

    #[instrument(level = "debug", skip(self, query), fields(collection = %self.binding.storage_name()))]
    async fn find(&self, query: FindQuery) -> Result<Vec<T>> {
        self.run_find(query).await
    }

    #[instrument(level = "debug", skip(self, query), fields(collection = %self.binding.storage_name()))]
    async fn find_one(&self, query: FindQuery) -> Result<Option<T>> {
        let mut records = self.run_find(query.limit(1)).await?;
        Ok((!records.is_empty()).then(|| records.swap_remove(0)))
    }

    #[instrument(level = "debug", skip(self, filter, update, options), fields(collection = %self.binding.storage_name()))]
    async fn find_one_and_update(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
        options: ModifyOptions,
    ) -> Result<Option<T>> {
        Self::check_filter(&filter)?;
        let update = self.binding.prepare_update(update, options.upsert)?;

        let session = self.session().await?;
        let result = session
            .collection(self.binding.storage_name())
            .find_one_and_update(filter, update)
            .with_options(options.to_driver_options())
            .await?;

        result.map(T::from_bson).transpose()
    }

    #[instrument(level = "debug", skip(self, filter), fields(collection = %self.binding.storage_name()))]
    async fn find_one_and_remove(&self, filter: BsonDocument) -> Result<Option<T>> {
        Self::check_filter(&filter)?;

        let session = self.session().await?;
        let removed = session
            .collection(self.binding.storage_name())
            .find_one_and_delete(filter)
            .await?;

        debug!(removed = removed.is_some(), "Find-one-and-remove complete");
        removed.map(T::from_bson).transpose()
    }

    #[instrument(level = "debug", skip(self, query), fields(collection = %self.binding.storage_name()))]
    async fn aggregate(&self, query: AggregateQuery) -> Result<Vec<T>> {
        self.run_aggregate(query).await
    }

    #[instrument(level = "debug", skip(self, query), fields(collection = %self.binding.storage_name()))]
    async fn aggregate_one(&self, query: AggregateQuery) -> Result<Option<T>> {
        let mut records = self.run_aggregate(query.limit(1)).await?;
        Ok((!records.is_empty()).then(|| records.swap_remove(0)))
    }

    #[instrument(level = "debug", skip(self, filter), fields(collection = %self.binding.storage_name()))]
    async fn count(&self, filter: BsonDocument) -> Result<u64> {
        Self::check_filter(&filter)?;

        let session = self.session().await?;
        let count = session
            .collection(self.binding.storage_name())
            .count_documents(filter)
            .await?;
        Ok(count)
    }
}

impl<T> fmt::Debug for TypedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCollection")
            .field("binding", &self.binding)
            .field("connection", &self.connection)
            .finish()
    }
}
