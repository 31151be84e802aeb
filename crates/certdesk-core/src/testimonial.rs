//! Client testimonials.
//!
//! The admin manages every testimonial; the public site shows approved ones
//! only.

use certdesk_storage::{Direction, Query};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;
use crate::normalize::{self, missing_fields, non_blank};
use crate::repository::{decode_all, from_document, to_fields, Repository};
use crate::subscription::{watch_listing, Subscription};

/// Collection holding testimonial records.
pub const COLLECTION: &str = "testimonials";

/// Rating given when the form leaves it out.
pub const DEFAULT_RATING: u8 = 5;

const KIND: &str = "testimonial";

/// The editable part of a testimonial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialDetails {
    pub quote: String,
    pub client_name: String,
    pub client_title: Option<String>,
    pub client_image_url: Option<String>,
    pub rating: u8,
    pub is_approved: bool,
}

/// A stored testimonial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(flatten)]
    pub details: TestimonialDetails,
    #[serde(with = "normalize::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Testimonial form input. Rating defaults to 5, approval to `true`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestimonialInput {
    pub quote: String,
    pub client_name: String,
    pub client_title: Option<String>,
    pub client_image_url: Option<String>,
    pub rating: Option<u8>,
    pub is_approved: Option<bool>,
}

impl TestimonialInput {
    /// Validate and normalise into storable details.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] if the quote or client name is
    /// blank, or the rating is outside 1 to 5.
    pub fn validate(self) -> Result<TestimonialDetails, CatalogError> {
        let missing = missing_fields(&[
            ("quote", self.quote.as_str()),
            ("clientName", self.client_name.as_str()),
        ]);
        if !missing.is_empty() {
            return Err(CatalogError::Validation {
                kind: KIND,
                reason: format!("missing required fields: {}", missing.join(", ")),
            });
        }

        let rating = self.rating.unwrap_or(DEFAULT_RATING);
        if !(1..=5).contains(&rating) {
            return Err(CatalogError::Validation {
                kind: KIND,
                reason: format!("rating must be between 1 and 5, got {rating}"),
            });
        }

        Ok(TestimonialDetails {
            quote: self.quote.trim().to_owned(),
            client_name: self.client_name.trim().to_owned(),
            client_title: non_blank(self.client_title.as_deref()),
            client_image_url: non_blank(self.client_image_url.as_deref()),
            rating,
            is_approved: self.is_approved.unwrap_or(true),
        })
    }
}

/// Testimonial CRUD over the document store.
#[derive(Debug, Clone)]
pub struct TestimonialCatalog {
    repo: Repository,
}

impl TestimonialCatalog {
    #[must_use]
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a testimonial.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] for bad input, or a store error.
    pub async fn create(&self, input: TestimonialInput) -> Result<Testimonial, CatalogError> {
        let mut testimonial = Testimonial {
            id: String::new(),
            details: input.validate()?,
            created_at: normalize::now(),
        };
        testimonial.id = self
            .repo
            .create(COLLECTION, to_fields(&testimonial)?)
            .await?;
        info!(id = %testimonial.id, "testimonial created");
        Ok(testimonial)
    }

    /// Replace the editable fields of a testimonial.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if it does not exist,
    /// [`CatalogError::Validation`] for bad input, or a store error.
    pub async fn update(
        &self,
        id: &str,
        input: TestimonialInput,
    ) -> Result<Testimonial, CatalogError> {
        let details = input.validate()?;
        let approved = details.is_approved;
        self.repo
            .update(COLLECTION, id, to_fields(&details)?)
            .await
            .map_err(|e| CatalogError::on_update(e, KIND, id))?;
        info!(%id, approved, "testimonial updated");
        self.get(id).await
    }

    /// Fetch one testimonial.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if it does not exist, or a store
    /// error.
    pub async fn get(&self, id: &str) -> Result<Testimonial, CatalogError> {
        let doc = self
            .repo
            .get(COLLECTION, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                kind: KIND,
                id: id.to_owned(),
            })?;
        let mut testimonial: Testimonial = from_document(doc)?;
        id.clone_into(&mut testimonial.id);
        Ok(testimonial)
    }

    /// Delete a testimonial. Deleting a missing one succeeds.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<(), CatalogError> {
        self.repo.delete(COLLECTION, id).await?;
        info!(%id, "testimonial deleted");
        Ok(())
    }

    /// Every testimonial, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Testimonial>, CatalogError> {
        self.list(Query::new()).await
    }

    /// Live variant of [`list_all`](Self::list_all).
    pub fn watch_all<F>(&self, on_update: F) -> Subscription
    where
        F: FnMut(Result<Vec<Testimonial>, CatalogError>) + Send + 'static,
    {
        watch_listing(self.repo.clone(), COLLECTION, attach_id, on_update)
    }

    /// Approved testimonials, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    pub async fn list_approved(&self) -> Result<Vec<Testimonial>, CatalogError> {
        self.list(Query::new().where_eq("isApproved", true)).await
    }

    async fn list(&self, query: Query) -> Result<Vec<Testimonial>, CatalogError> {
        let query = query.order_by("createdAt", Direction::Descending);
        let docs = self.repo.query(COLLECTION, &query).await?;
        Ok(decode_all(docs, attach_id))
    }
}

fn attach_id(testimonial: &mut Testimonial, id: String) {
    testimonial.id = id;
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

    fn catalog() -> TestimonialCatalog {
        TestimonialCatalog::new(Repository::new(
            Arc::new(MemoryStore::new()),
            "ns",
            DEFAULT_STORE_TIMEOUT,
        ))
    }

    fn input(name: &str) -> TestimonialInput {
        TestimonialInput {
            quote: "Shipped on time.".into(),
            client_name: name.into(),
            ..TestimonialInput::default()
        }
    }

    #[tokio::test]
    async fn defaults_apply() {
        let created = catalog().create(input("Ravi")).await.unwrap();
        assert_eq!(created.details.rating, DEFAULT_RATING);
        assert!(created.details.is_approved);
        assert_eq!(created.details.client_title, None);
    }

    #[tokio::test]
    async fn rating_out_of_range_is_rejected() {
        for rating in [0, 6] {
            let err = catalog()
                .create(TestimonialInput {
                    rating: Some(rating),
                    ..input("Ravi")
                })
                .await
                .unwrap_err();
            assert!(matches!(err, CatalogError::Validation { kind: "testimonial", .. }));
        }
    }

    #[tokio::test]
    async fn blank_quote_is_rejected() {
        let err = catalog()
            .create(TestimonialInput {
                quote: " ".into(),
                ..input("Ravi")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref reason, .. } if reason.contains("quote")));
    }

    #[tokio::test]
    async fn public_listing_hides_unapproved() {
        let testimonials = catalog();
        let hidden = testimonials.create(input("Hidden")).await.unwrap();
        testimonials.create(input("Shown")).await.unwrap();
        let updated = testimonials
            .update(
                &hidden.id,
                TestimonialInput {
                    is_approved: Some(false),
                    ..input("Hidden")
                },
            )
            .await
            .unwrap();
        assert!(!updated.details.is_approved);
        assert_eq!(updated.created_at, hidden.created_at);

        let approved = testimonials.list_approved().await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].details.client_name, "Shown");
        assert_eq!(testimonials.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let err = catalog().update("nope", input("x")).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Option<T> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn watch_all_includes_unapproved_and_sees_edits() {
        let testimonials = catalog();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = testimonials.watch_all(move |result| {
            let _ = tx.send(result.unwrap());
        });

        assert!(next(&mut rx).await.unwrap().is_empty());
        let created = testimonials.create(input("Ravi")).await.unwrap();
        assert_eq!(next(&mut rx).await.unwrap(), vec![created.clone()]);

        testimonials
            .update(
                &created.id,
                TestimonialInput {
                    is_approved: Some(false),
                    ..input("Ravi")
                },
            )
            .await
            .unwrap();
        let listed = next(&mut rx).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert!(!listed[0].details.is_approved);
    }
}
