//! Save, query and update users against a local MongoDB.
//!
//! ```sh
//! RUST_LOG=docbind_mongodb=debug cargo run -p docbind-mongodb --example users
//! ```

use bson::{doc, oid::ObjectId};
use docbind_mongodb::{
    ConnectOptions, ConnectionManager, FieldSpec, FindQuery, ModifyOptions, Repository, Schema,
    TypedCollection,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    name: String,
    age: i32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let host = std::env::var("MONGODB_HOST").unwrap_or_else(|_| "localhost".to_string());
    let manager = ConnectionManager::new(&host, 27017, "docbind_demo", ConnectOptions::default())?;

    let schema = Schema::new()
        .field("name", FieldSpec::string().required().max_length(64))
        .field("age", FieldSpec::int().minimum(0.0))
        .timestamps(true);
    let users: TypedCollection<User> =
        TypedCollection::with_plural(manager.connection(), "User", schema, "users")?;

    let alice = users
        .save(User { id: None, name: "Alice".to_string(), age: 30 })
        .await?;
    println!("saved {:?}", alice);

    let older = users
        .find_one_and_update(
            doc! { "_id": alice.id },
            doc! { "$inc": { "age": 1 } },
            ModifyOptions::returning_new(),
        )
        .await?;
    println!("updated {:?}", older);

    let adults = users
        .find(FindQuery::new(doc! { "age": { "$gte": 18 } }).limit(10))
        .await?;
    println!("{} adult(s)", adults.len());

    if let Some(id) = alice.id {
        users.remove_by_id(id).await?;
    }
    Ok(())
}
