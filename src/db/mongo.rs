//! MongoDB client and collection wrapper

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::ForumError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn metadata(&self) -> &Metadata;
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Restrict a filter to documents that are not soft-deleted
pub fn exclude_deleted(filter: &mut Document) {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
}

/// Add `metadata.updated_at = now` to the `$set` stage of an update document
pub fn with_touch(mut update: Document) -> Document {
    let now = DateTime::now();
    match update.get_document_mut("$set") {
        Ok(set) => {
            set.insert("metadata.updated_at", now);
        }
        Err(_) => {
            update.insert("$set", doc! { "metadata.updated_at": now });
        }
    }
    update
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, ForumError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast on unreachable servers instead of hanging on first use
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| ForumError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ForumError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, ForumError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing and soft deletes
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, ForumError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), ForumError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| ForumError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, ForumError> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(now);
        metadata.updated_at = Some(now);

        let result = self.inner.insert_one(item).await.map_err(|e| {
            if is_duplicate_key(&e) {
                ForumError::Conflict("Document already exists".into())
            } else {
                ForumError::Database(format!("Insert failed: {}", e))
            }
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ForumError::Database("Failed to get inserted ID".into()))
    }

    /// Find one live document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, ForumError> {
        let mut full_filter = filter;
        exclude_deleted(&mut full_filter);

        self.inner
            .find_one(full_filter)
            .await
            .map_err(|e| ForumError::Database(format!("Find failed: {}", e)))
    }

    /// Find live documents by filter with optional sort/skip/limit
    pub async fn find_many(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>, ForumError> {
        use futures_util::StreamExt;

        let mut full_filter = filter;
        exclude_deleted(&mut full_filter);

        let cursor = self
            .inner
            .find(full_filter)
            .with_options(options)
            .await
            .map_err(|e| ForumError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Count live documents matching a filter
    pub async fn count(&self, filter: Document) -> Result<u64, ForumError> {
        let mut full_filter = filter;
        exclude_deleted(&mut full_filter);

        self.inner
            .count_documents(full_filter)
            .await
            .map_err(|e| ForumError::Database(format!("Count failed: {}", e)))
    }

    /// Update one document, bumping `metadata.updated_at`
    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, ForumError> {
        self.inner
            .update_one(filter, with_touch(update))
            .await
            .map_err(|e| ForumError::Database(format!("Update failed: {}", e)))
    }

    /// Update many documents, bumping `metadata.updated_at`
    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, ForumError> {
        self.inner
            .update_many(filter, with_touch(update))
            .await
            .map_err(|e| ForumError::Database(format!("Update failed: {}", e)))
    }

    /// Atomically update one live document and return it as it is after the update
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<Option<T>, ForumError> {
        let mut full_filter = filter;
        exclude_deleted(&mut full_filter);

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.inner
            .find_one_and_update(full_filter, with_touch(update))
            .with_options(options)
            .await
            .map_err(|e| ForumError::Database(format!("Update failed: {}", e)))
    }

    /// Soft delete documents matching a filter
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult, ForumError> {
        let mut full_filter = filter;
        exclude_deleted(&mut full_filter);

        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": DateTime::now(),
            }
        };

        self.update_many(full_filter, update).await
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_touch_merges_into_set() {
        let update = with_touch(doc! { "$set": { "title": "x" }, "$inc": { "n": 1 } });
        let set = update.get_document("$set").unwrap();
        assert!(set.contains_key("title"));
        assert!(set.contains_key("metadata.updated_at"));
        assert!(update.contains_key("$inc"));
    }

    #[test]
    fn test_with_touch_adds_set_stage() {
        let update = with_touch(doc! { "$pull": { "upvotes": 1 } });
        assert!(update
            .get_document("$set")
            .unwrap()
            .contains_key("metadata.updated_at"));
    }
}
