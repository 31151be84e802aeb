//! `RocksDB` document store, the embedded persistent backend.
//!
//! Documents are stored as JSON under the key `<collection>/<id>`. All
//! operations are dispatched to a blocking thread via
//! [`tokio::task::spawn_blocking`] since `RocksDB` is a synchronous C++
//! library. Queries scan the collection prefix and evaluate filters and
//! ordering in-process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocksdb::{DBWithThreadMode, MultiThreaded, Options};
use tokio::sync::broadcast;

use crate::{
    document_id_in, new_document_id, ChangeEvent, ChangeFeed, ChangeKind, Document,
    DocumentStore, Fields, Query, StorageError,
};

type Db = DBWithThreadMode<MultiThreaded>;

/// A document store backed by `RocksDB`.
///
/// Thread-safe (`Arc<DB>` internally) and safe to share across async tasks.
/// The change feed is process-local: it reports writes made through this
/// handle (and its clones), not writes from other processes.
///
/// # Examples
///
/// ```no_run
/// # use certdesk_storage::RocksDbStore;
/// let store = RocksDbStore::open("/var/lib/certdesk/data").unwrap();
/// ```
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<Db>,
    path: PathBuf,
    feed: ChangeFeed,
}

impl std::fmt::Debug for RocksDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RocksDbStore {
    /// Open a `RocksDB` database at the given path.
    ///
    /// Creates the database directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if `RocksDB` fails to open or create the
    /// database at the specified path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = Db::open(&opts, path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
            feed: ChangeFeed::new(),
        })
    }

    /// Return the filesystem path of this database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_fields(&self, collection: &str, id: &str) -> Result<Option<Fields>, StorageError> {
        let db = Arc::clone(&self.db);
        let collection = collection.to_owned();
        let id = id.to_owned();
        tokio::task::spawn_blocking(move || {
            let raw = db
                .get(format!("{collection}/{id}").as_bytes())
                .map_err(|e| StorageError::Read {
                    collection: collection.clone(),
                    reason: e.to_string(),
                })?;
            raw.map(|bytes| decode(&collection, &id, &bytes)).transpose()
        })
        .await
        .map_err(|e| StorageError::Read {
            collection: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn write_fields(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
    ) -> Result<(), StorageError> {
        let value = serde_json::to_vec(fields).map_err(|e| StorageError::Corrupt {
            collection: collection.to_owned(),
            id: id.to_owned(),
            reason: e.to_string(),
        })?;
        let db = Arc::clone(&self.db);
        let collection = collection.to_owned();
        let id = id.to_owned();
        tokio::task::spawn_blocking(move || {
            db.put(format!("{collection}/{id}").as_bytes(), &value)
                .map_err(|e| StorageError::Write {
                    collection,
                    id,
                    reason: e.to_string(),
                })
        })
        .await
        .map_err(|e| StorageError::Write {
            collection: String::new(),
            id: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }
}

fn decode(collection: &str, id: &str, bytes: &[u8]) -> Result<Fields, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt {
        collection: collection.to_owned(),
        id: id.to_owned(),
        reason: e.to_string(),
    })
}

#[async_trait::async_trait]
impl DocumentStore for RocksDbStore {
    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StorageError> {
        let id = new_document_id();
        self.write_fields(collection, &id, &fields).await?;
        self.feed.publish(collection, &id, ChangeKind::Created);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StorageError> {
        let existed = self.read_fields(collection, id).await?.is_some();
        self.write_fields(collection, id, &fields).await?;
        let kind = if existed {
            ChangeKind::Updated
        } else {
            ChangeKind::Created
        };
        self.feed.publish(collection, id, kind);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        Ok(self
            .read_fields(collection, id)
            .await?
            .map(|fields| Document::new(id, fields)))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StorageError> {
        let mut existing =
            self.read_fields(collection, id)
                .await?
                .ok_or_else(|| StorageError::DocumentNotFound {
                    collection: collection.to_owned(),
                    id: id.to_owned(),
                })?;
        existing.extend(fields);
        self.write_fields(collection, id, &existing).await?;
        self.feed.publish(collection, id, ChangeKind::Updated);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let owned_collection = collection.to_owned();
        let owned_id = id.to_owned();
        let existed = tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let key = format!("{owned_collection}/{owned_id}");
            let fail = |e: rocksdb::Error| StorageError::Delete {
                collection: owned_collection.clone(),
                id: owned_id.clone(),
                reason: e.to_string(),
            };
            if db.get_pinned(key.as_bytes()).map_err(fail)?.is_none() {
                return Ok(false);
            }
            db.delete(key.as_bytes()).map_err(fail)?;
            Ok(true)
        })
        .await
        .map_err(|e| StorageError::Delete {
            collection: String::new(),
            id: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })??;
        if existed {
            self.feed.publish(collection, id, ChangeKind::Deleted);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StorageError> {
        let db = Arc::clone(&self.db);
        let collection = collection.to_owned();
        let docs = tokio::task::spawn_blocking(move || {
            let prefix = format!("{collection}/");
            let iter = db.iterator(rocksdb::IteratorMode::From(
                prefix.as_bytes(),
                rocksdb::Direction::Forward,
            ));

            let mut docs = Vec::new();
            for item in iter {
                let (k, v) = item.map_err(|e| StorageError::Read {
                    collection: collection.clone(),
                    reason: e.to_string(),
                })?;
                let key = String::from_utf8_lossy(&k);
                if !key.starts_with(&prefix) {
                    break;
                }
                if let Some(id) = document_id_in(&collection, &key) {
                    docs.push(Document::new(id, decode(&collection, id, &v)?));
                }
            }
            Ok::<_, StorageError>(docs)
        })
        .await
        .map_err(|e| StorageError::Read {
            collection: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })??;
        Ok(query.apply(docs))
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}
