//! Documents, queries, and the change feed shared by every backend.
//!
//! A document is a JSON object addressed by `(collection, id)`. Queries are
//! conjunctions of equality filters plus an optional single-field ordering,
//! evaluated the same way by every backend so results never depend on which
//! store is configured.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// The field map of a document.
pub type Fields = serde_json::Map<String, Value>;

/// Capacity of the change feed buffer. Slow subscribers that fall further
/// behind than this observe a lag and re-query.
const CHANGE_FEED_CAPACITY: usize = 256;

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id, unique within its collection.
    pub id: String,
    /// Document fields.
    pub fields: Fields,
}

impl Document {
    /// Build a document from its id and fields.
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Look up a single field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// An equality filter on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

/// A query over one collection.
///
/// # Examples
///
/// ```
/// # use certdesk_storage::{Direction, Query};
/// let query = Query::new()
///     .where_eq("isApproved", true)
///     .order_by("createdAt", Direction::Descending);
/// assert_eq!(query.filters().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<Filter>,
    order: Option<(String, Direction)>,
}

impl Query {
    /// An unfiltered, unordered query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter. Filters combine with AND.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Order results by a field. Documents missing the field sort first in
    /// ascending order.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((field.into(), direction));
        self
    }

    /// The equality filters of this query.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// The ordering of this query, if any.
    #[must_use]
    pub fn ordering(&self) -> Option<(&str, Direction)> {
        self.order.as_ref().map(|(f, d)| (f.as_str(), *d))
    }

    /// Whether a document satisfies every filter.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|f| doc.fields.get(&f.field) == Some(&f.value))
    }

    /// Filter and sort a set of documents.
    ///
    /// The sort is stable, so documents with equal keys keep the order the
    /// backend produced them in.
    #[must_use]
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some((field, direction)) = &self.order {
            out.sort_by(|a, b| {
                let ord = compare_values(a.fields.get(field), b.fields.get(field));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        out
    }
}

/// Total order over optional JSON values used for query ordering.
///
/// Missing < null < bool < number < string < array < object. Values of the
/// same kind compare naturally; arrays and objects compare equal.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A single change published on a store's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
}

/// Broadcast fan-out of [`ChangeEvent`]s.
///
/// Backends own one feed each and publish after every successful write.
/// Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a feed with the default buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { tx }
    }

    /// Publish a change to every current subscriber.
    pub fn publish(&self, collection: &str, id: &str, kind: ChangeKind) {
        tracing::trace!(collection, id, ?kind, "document changed");
        let _ = self.tx.send(ChangeEvent {
            collection: collection.to_owned(),
            id: id.to_owned(),
            kind,
        });
    }

    /// Subscribe to changes published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a fresh document id (32 lowercase hex chars).
#[must_use]
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
