//! Typed MongoDB collections over a lazily shared connection
//!
//! This crate wraps the MongoDB driver with a small, strongly typed data-access layer.
//!
//! # Features
//! - One shared connection per manager; operations wait for it to settle
//! - Standard and SRV (cloud) connection targets with encoded credentials
//! - Schema checks and automatic timestamps on write
//! - Find, find-one-and-update/remove and match/project aggregation
//! - Reference expansion (populate) across collections
//!
//! # Example
//! ```no_run
//! use bson::doc;
//! use docbind_mongodb::{
//!     ConnectOptions, ConnectionManager, FieldSpec, FindQuery, Repository, Schema, TypedCollection,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     age: i32,
//! }
//!
//! # async fn run() -> docbind_mongodb::Result<()> {
//! let manager = ConnectionManager::new("localhost", 27017, "app", ConnectOptions::default())?;
//! let schema = Schema::new().field("name", FieldSpec::string().required());
//! let users: TypedCollection<User> =
//!     TypedCollection::with_plural(manager.connection(), "User", schema, "users")?;
//!
//! users.save(User { name: "Alice".into(), age: 30 }).await?;
//! let _adults = users.find(FindQuery::new(doc! { "age": { "$gte": 18 } })).await?;
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod config;
pub mod connection;
pub mod document;
pub mod pipeline;
pub mod populate;
pub mod query;
pub mod schema;
pub mod update;
pub mod validation;

pub use collection::{CollectionBinding, Repository, TypedCollection};
pub use config::{get_config, set_config, ClientOptionsHook, ConnectOptions, SecurityConfig};
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionState, ConnectionTarget, Session};
pub use docbind_common::{DocBindError, Result};
pub use document::{ensure_id, Record, ID_FIELD};
pub use pipeline::AggregateQuery;
pub use populate::Populate;
pub use query::FindQuery;
pub use schema::{FieldSpec, FieldType, Schema, CREATED_AT, UPDATED_AT};
pub use update::{ModifyOptions, ReturnImage};
pub use validation::{
    validate_filter, validate_pipeline, validate_query, ValidatedCollectionName, ValidatedFieldName,
};
