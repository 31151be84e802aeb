//! Portfolio projects.

use certdesk_storage::{Direction, Query};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;
use crate::normalize::{self, missing_fields, non_blank, split_list};
use crate::repository::{decode_all, from_document, to_fields, Repository};
use crate::subscription::{watch_listing, Subscription};

/// Collection holding project records.
pub const COLLECTION: &str = "projects";

const KIND: &str = "project";

/// The editable part of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub project_url: Option<String>,
    pub technologies: Vec<String>,
    pub client_name: String,
    pub category: String,
    #[serde(default)]
    pub is_featured: bool,
}

/// A stored project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(flatten)]
    pub details: ProjectDetails,
    #[serde(with = "normalize::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Project form input. `technologies` is comma-separated text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectInput {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub project_url: Option<String>,
    pub technologies: String,
    pub client_name: String,
    pub category: String,
    pub is_featured: bool,
}

impl ProjectInput {
    /// Validate and normalise into storable details.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] naming every blank required
    /// field.
    pub fn validate(self) -> Result<ProjectDetails, CatalogError> {
        let technologies = split_list(&self.technologies);
        let mut missing = missing_fields(&[
            ("title", self.title.as_str()),
            ("description", self.description.as_str()),
            ("imageUrl", self.image_url.as_str()),
            ("clientName", self.client_name.as_str()),
            ("category", self.category.as_str()),
        ]);
        if technologies.is_empty() {
            missing.push("technologies");
        }
        if !missing.is_empty() {
            return Err(CatalogError::Validation {
                kind: KIND,
                reason: format!("missing required fields: {}", missing.join(", ")),
            });
        }

        Ok(ProjectDetails {
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            image_url: self.image_url.trim().to_owned(),
            project_url: non_blank(self.project_url.as_deref()),
            technologies,
            client_name: self.client_name.trim().to_owned(),
            category: self.category.trim().to_owned(),
            is_featured: self.is_featured,
        })
    }
}

/// Project CRUD over the document store.
#[derive(Debug, Clone)]
pub struct ProjectCatalog {
    repo: Repository,
}

impl ProjectCatalog {
    #[must_use]
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a project.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] for bad input, or a store error.
    pub async fn create(&self, input: ProjectInput) -> Result<Project, CatalogError> {
        let mut project = Project {
            id: String::new(),
            details: input.validate()?,
            created_at: normalize::now(),
        };
        project.id = self.repo.create(COLLECTION, to_fields(&project)?).await?;
        info!(id = %project.id, title = %project.details.title, "project created");
        Ok(project)
    }

    /// Replace the editable fields of a project. `createdAt` is kept.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the project does not exist,
    /// [`CatalogError::Validation`] for bad input, or a store error.
    pub async fn update(&self, id: &str, input: ProjectInput) -> Result<Project, CatalogError> {
        let details = input.validate()?;
        self.repo
            .update(COLLECTION, id, to_fields(&details)?)
            .await
            .map_err(|e| CatalogError::on_update(e, KIND, id))?;
        info!(%id, "project updated");
        self.get(id).await
    }

    /// Delete a project. Deleting a missing project succeeds.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<(), CatalogError> {
        self.repo.delete(COLLECTION, id).await?;
        info!(%id, "project deleted");
        Ok(())
    }

    /// Fetch one project.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if it does not exist, or a store
    /// error.
    pub async fn get(&self, id: &str) -> Result<Project, CatalogError> {
        let doc = self
            .repo
            .get(COLLECTION, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                kind: KIND,
                id: id.to_owned(),
            })?;
        let mut project: Project = from_document(doc)?;
        id.clone_into(&mut project.id);
        Ok(project)
    }

    /// All projects, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Project>, CatalogError> {
        self.list(Query::new()).await
    }

    /// Live variant of [`list_all`](Self::list_all).
    pub fn watch_all<F>(&self, on_update: F) -> Subscription
    where
        F: FnMut(Result<Vec<Project>, CatalogError>) + Send + 'static,
    {
        watch_listing(self.repo.clone(), COLLECTION, attach_id, on_update)
    }

    /// Featured projects, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    pub async fn list_featured(&self) -> Result<Vec<Project>, CatalogError> {
        self.list(Query::new().where_eq("isFeatured", true)).await
    }

    async fn list(&self, query: Query) -> Result<Vec<Project>, CatalogError> {
        let query = query.order_by("createdAt", Direction::Descending);
        let docs = self.repo.query(COLLECTION, &query).await?;
        Ok(decode_all(docs, attach_id))
    }
}

fn attach_id(project: &mut Project, id: String) {
    project.id = id;
}
