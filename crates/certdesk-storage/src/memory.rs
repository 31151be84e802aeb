//! In-memory document store.
//!
//! Stores every document in a single `BTreeMap` keyed by
//! `<collection>/<id>` behind a `RwLock`. It is not persistent: all data is
//! lost when the process exits. Use this for unit tests, integration tests,
//! and local development.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::{
    document_id_in, new_document_id, ChangeEvent, ChangeFeed, ChangeKind, Document,
    DocumentStore, Fields, Query, StorageError,
};

/// An in-memory document store.
///
/// Thread-safe and async-compatible. Clones share the same data and the same
/// change feed.
///
/// # Examples
///
/// ```
/// # use certdesk_storage::{DocumentStore, MemoryStore, Query};
/// # #[tokio::main]
/// # async fn main() {
/// let store = MemoryStore::new();
/// let mut fields = serde_json::Map::new();
/// fields.insert("title".to_owned(), "hello".into());
/// let id = store.create("posts", fields).await.unwrap();
/// let all = store.query("posts", &Query::new()).await.unwrap();
/// assert_eq!(all[0].id, id);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, Fields>>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            feed: ChangeFeed::new(),
        }
    }

    /// Number of documents across all collections.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the store holds no documents at all.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Number of open change feed receivers, i.e. running live queries.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StorageError> {
        let id = new_document_id();
        self.data.write().await.insert(key(collection, &id), fields);
        self.feed.publish(collection, &id, ChangeKind::Created);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StorageError> {
        let previous = self.data.write().await.insert(key(collection, id), fields);
        let kind = if previous.is_some() {
            ChangeKind::Updated
        } else {
            ChangeKind::Created
        };
        self.feed.publish(collection, id, kind);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .get(&key(collection, id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StorageError> {
        {
            let mut data = self.data.write().await;
            let existing =
                data.get_mut(&key(collection, id))
                    .ok_or_else(|| StorageError::DocumentNotFound {
                        collection: collection.to_owned(),
                        id: id.to_owned(),
                    })?;
            existing.extend(fields);
        }
        self.feed.publish(collection, id, ChangeKind::Updated);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        let removed = self.data.write().await.remove(&key(collection, id));
        if removed.is_some() {
            self.feed.publish(collection, id, ChangeKind::Deleted);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StorageError> {
        let prefix = format!("{collection}/");
        let data = self.data.read().await;
        let docs = data
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, fields)| {
                document_id_in(collection, k).map(|id| Document::new(id, fields.clone()))
            });
        Ok(query.apply(docs))
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}
