//! Contact form submissions.

use certdesk_storage::{Direction, Query};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;
use crate::normalize::{self, missing_fields};
use crate::repository::{decode_all, to_fields, Repository};
use crate::subscription::{watch_listing, Subscription};

/// Collection holding contact submissions.
pub const COLLECTION: &str = "contact_submissions";

const KIND: &str = "contact submission";

/// A stored contact submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[serde(with = "normalize::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Contact form input. Every field is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Stores contact submissions.
#[derive(Debug, Clone)]
pub struct SubmissionInbox {
    repo: Repository,
}

impl SubmissionInbox {
    #[must_use]
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Store a submission from the public contact form.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] if a field is blank, or a store
    /// error.
    pub async fn submit(&self, form: ContactForm) -> Result<Submission, CatalogError> {
        let missing = missing_fields(&[
            ("name", form.name.as_str()),
            ("email", form.email.as_str()),
            ("subject", form.subject.as_str()),
            ("message", form.message.as_str()),
        ]);
        if !missing.is_empty() {
            return Err(CatalogError::Validation {
                kind: KIND,
                reason: format!("missing required fields: {}", missing.join(", ")),
            });
        }

        let mut submission = Submission {
            id: String::new(),
            name: form.name.trim().to_owned(),
            email: form.email.trim().to_owned(),
            subject: form.subject.trim().to_owned(),
            message: form.message.trim().to_owned(),
            created_at: normalize::now(),
        };
        submission.id = self
            .repo
            .create(COLLECTION, to_fields(&submission)?)
            .await?;
        info!(id = %submission.id, "contact submission received");
        Ok(submission)
    }

    /// All submissions, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Submission>, CatalogError> {
        let query = Query::new().order_by("createdAt", Direction::Descending);
        let docs = self.repo.query(COLLECTION, &query).await?;
        Ok(decode_all(docs, attach_id))
    }

    /// Live variant of [`list_all`](Self::list_all).
    pub fn watch_all<F>(&self, on_update: F) -> Subscription
    where
        F: FnMut(Result<Vec<Submission>, CatalogError>) + Send + 'static,
    {
        watch_listing(self.repo.clone(), COLLECTION, attach_id, on_update)
    }

    /// Delete a submission. Deleting a missing one succeeds.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<(), CatalogError> {
        self.repo.delete(COLLECTION, id).await?;
        info!(%id, "contact submission deleted");
        Ok(())
    }
}

fn attach_id(submission: &mut Submission, id: String) {
    submission.id = id;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use certdesk_storage::MemoryStore;
    use std::time::Duration;
    use tokio::sync::mpsc;

    use crate::repository::DEFAULT_STORE_TIMEOUT;

    fn inbox() -> SubmissionInbox {
        SubmissionInbox::new(Repository::new(
            Arc::new(MemoryStore::new()),
            "ns",
            DEFAULT_STORE_TIMEOUT,
        ))
    }

    fn form() -> ContactForm {
        ContactForm {
            name: "Meera".into(),
            email: "meera@example.com".into(),
            subject: "Quote".into(),
            message: "Need a site.".into(),
        }
    }

    #[tokio::test]
    async fn submit_then_list_and_delete() {
        let inbox = inbox();
        let stored = inbox.submit(form()).await.unwrap();
        let listed = inbox.list_all().await.unwrap();
        assert_eq!(listed, vec![stored.clone()]);

        inbox.delete(&stored.id).await.unwrap();
        assert!(inbox.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_fields_are_rejected_without_write() {
        let inbox = inbox();
        let err = inbox
            .submit(ContactForm {
                message: "  ".into(),
                ..form()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref reason, .. } if reason.contains("message")));
        assert!(inbox.list_all().await.unwrap().is_empty());
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Option<T> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn watch_all_sees_new_submissions() {
        let inbox = inbox();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = inbox.watch_all(move |result| {
            let _ = tx.send(result.unwrap());
        });

        assert!(next(&mut rx).await.unwrap().is_empty());
        let stored = inbox.submit(form()).await.unwrap();
        assert_eq!(next(&mut rx).await.unwrap(), vec![stored]);

        sub.unsubscribe();
        assert!(next(&mut rx).await.is_none());
    }
}
