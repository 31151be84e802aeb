//! PostgreSQL document store.
//!
//! Stores every document in a single `documents` table as JSONB, keyed by
//! `(collection, id)`. Equality filters are pushed down as JSONB containment
//! (`data @> $2`); ordering is applied in-process so it matches the other
//! backends exactly.
//!
//! Feature-gated behind `postgres-backend`. Uses `sqlx` with the Tokio
//! runtime for fully async operations, no `spawn_blocking` needed.

use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::broadcast;

use crate::{
    new_document_id, ChangeEvent, ChangeFeed, ChangeKind, Document, DocumentStore, Fields, Query,
    StorageError,
};

/// A document store backed by PostgreSQL.
///
/// Thread-safe via `PgPool`. The change feed is process-local.
///
/// # Examples
///
/// ```no_run
/// # use certdesk_storage::PostgresStore;
/// # #[tokio::main]
/// # async fn main() {
/// let store = PostgresStore::connect("postgres://localhost/certdesk").await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    feed: ChangeFeed,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool", &"[PgPool]")
            .finish_non_exhaustive()
    }
}

impl PostgresStore {
    /// Connect to PostgreSQL and create the `documents` table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the connection or migration fails.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let open_err = |reason: String| StorageError::Open {
            path: "[redacted]".to_owned(),
            reason,
        };

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| open_err(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (\
                collection TEXT        NOT NULL, \
                id         TEXT        NOT NULL, \
                data       JSONB       NOT NULL, \
                PRIMARY KEY (collection, id)\
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| open_err(format!("migration failed: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_data \
             ON documents USING GIN (data jsonb_path_ops)",
        )
        .execute(&pool)
        .await
        .map_err(|e| open_err(format!("index creation failed: {e}")))?;

        Ok(Self {
            pool,
            feed: ChangeFeed::new(),
        })
    }

    /// Return a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn read_err(collection: &str, e: &sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("42501") => {
            StorageError::PermissionDenied {
                collection: collection.to_owned(),
                reason: db.to_string(),
            }
        }
        _ => StorageError::Read {
            collection: collection.to_owned(),
            reason: e.to_string(),
        },
    }
}

fn write_err(collection: &str, id: &str, e: &sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("42501") => {
            StorageError::PermissionDenied {
                collection: collection.to_owned(),
                reason: db.to_string(),
            }
        }
        _ => StorageError::Write {
            collection: collection.to_owned(),
            id: id.to_owned(),
            reason: e.to_string(),
        },
    }
}

#[async_trait::async_trait]
impl DocumentStore for PostgresStore {
    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StorageError> {
        let id = new_document_id();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(&fields))
            .execute(&self.pool)
            .await
            .map_err(|e| write_err(collection, &id, &e))?;
        self.feed.publish(collection, &id, ChangeKind::Created);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StorageError> {
        let (inserted,): (bool,) = sqlx::query_as(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data \
             RETURNING (xmax = 0)",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&fields))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_err(collection, id, &e))?;
        let kind = if inserted {
            ChangeKind::Created
        } else {
            ChangeKind::Updated
        };
        self.feed.publish(collection, id, kind);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        let row: Option<(Json<Fields>,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| read_err(collection, &e))?;
        Ok(row.map(|(Json(fields),)| Document::new(id, fields)))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3 WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&fields))
        .execute(&self.pool)
        .await
        .map_err(|e| write_err(collection, id, &e))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::DocumentNotFound {
                collection: collection.to_owned(),
                id: id.to_owned(),
            });
        }
        self.feed.publish(collection, id, ChangeKind::Updated);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Delete {
                collection: collection.to_owned(),
                id: id.to_owned(),
                reason: e.to_string(),
            })?;
        if result.rows_affected() > 0 {
            self.feed.publish(collection, id, ChangeKind::Deleted);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StorageError> {
        let containment: Fields = query
            .filters()
            .iter()
            .map(|f| (f.field.clone(), f.value.clone()))
            .collect();
        let rows: Vec<(String, Json<Fields>)> = sqlx::query_as(
            "SELECT id, data FROM documents WHERE collection = $1 AND data @> $2 ORDER BY id",
        )
        .bind(collection)
        .bind(Json(Value::Object(containment)))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_err(collection, &e))?;

        // `@>` matches arrays by containment rather than equality, so the
        // in-process filter is still applied.
        Ok(query.apply(
            rows.into_iter()
                .map(|(id, Json(fields))| Document::new(id, fields)),
        ))
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}
