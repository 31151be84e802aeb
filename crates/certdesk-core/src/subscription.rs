//! Live queries over the store's change feed.
//!
//! A live query delivers the full result set once on start and again after
//! every change to its collection. The returned [`Subscription`] owns the
//! background task: dropping it (or calling [`Subscription::unsubscribe`])
//! stops delivery, so a subscription can never outlive its owner.

use certdesk_storage::{Direction, Document, Query};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::StoreError;
use crate::repository::{decode_all, Repository};

/// Handle on a running live query. Released on drop.
#[derive(Debug)]
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering updates.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the live query is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a live query on the named collection.
///
/// The change feed is subscribed before the initial query runs, so no write
/// can slip between the first snapshot and the first notification. Bursts of
/// changes are coalesced into a single re-query.
///
/// Must be called from within a Tokio runtime.
pub fn live_query<F>(repo: Repository, name: &str, query: Query, mut on_update: F) -> Subscription
where
    F: FnMut(Result<Vec<Document>, StoreError>) + Send + 'static,
{
    let mut changes = repo.store().changes();
    let name = name.to_owned();
    let path = repo.collection(&name);

    let task = tokio::spawn(async move {
        on_update(repo.query(&name, &query).await);
        loop {
            match changes.recv().await {
                Ok(event) if event.collection != path => continue,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(collection = %path, skipped, "live query lagged, re-querying");
                }
                Err(RecvError::Closed) => break,
            }
            loop {
                match changes.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
            on_update(repo.query(&name, &query).await);
        }
        debug!(collection = %path, "live query ended");
    });

    Subscription { task }
}

/// Live listing of a whole collection, newest first, decoded into records.
///
/// Documents that do not decode are skipped, as in the one-shot listings.
pub fn watch_listing<T, E, F>(
    repo: Repository,
    name: &str,
    attach_id: fn(&mut T, String),
    mut on_update: F,
) -> Subscription
where
    T: DeserializeOwned + 'static,
    E: From<StoreError> + 'static,
    F: FnMut(Result<Vec<T>, E>) + Send + 'static,
{
    let query = Query::new().order_by("createdAt", Direction::Descending);
    live_query(repo, name, query, move |result| {
        on_update(
            result
                .map(|docs| decode_all(docs, attach_id))
                .map_err(E::from),
        );
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use certdesk_storage::{DocumentStore, Fields, MemoryStore};
    use tokio::sync::mpsc;

    use crate::repository::DEFAULT_STORE_TIMEOUT;

    async fn next_len(rx: &mut mpsc::UnboundedReceiver<usize>) -> usize {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn delivers_initial_snapshot_then_changes() {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store.clone(), "ns", DEFAULT_STORE_TIMEOUT);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = live_query(repo.clone(), "items", Query::new(), move |res| {
            let _ = tx.send(res.map(|d| d.len()).unwrap_or(usize::MAX));
        });
        assert_eq!(next_len(&mut rx).await, 0);

        repo.create("items", Fields::new()).await.unwrap();
        assert_eq!(next_len(&mut rx).await, 1);
        assert!(sub.is_active());
    }

    #[tokio::test]
    async fn ignores_other_collections() {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store.clone(), "ns", DEFAULT_STORE_TIMEOUT);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _sub = live_query(repo.clone(), "items", Query::new(), move |res| {
            let _ = tx.send(res.map(|d| d.len()).unwrap_or(usize::MAX));
        });
        assert_eq!(next_len(&mut rx).await, 0);

        repo.create("other", Fields::new()).await.unwrap();
        repo.create("items", Fields::new()).await.unwrap();
        assert_eq!(next_len(&mut rx).await, 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store.clone(), "ns", DEFAULT_STORE_TIMEOUT);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = live_query(repo.clone(), "items", Query::new(), move |res| {
            let _ = tx.send(res.map(|d| d.len()).unwrap_or(usize::MAX));
        });
        assert_eq!(next_len(&mut rx).await, 0);
        sub.unsubscribe();

        store.create("ns/items", Fields::new()).await.unwrap();
        // The aborted task drops its sender, closing the channel.
        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(closed, None);
    }
}
