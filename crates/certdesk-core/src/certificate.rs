//! Certificate issuance and lookup.
//!
//! Certificates are write-once: [`CertificateStore::issue`] creates one
//! document per certificate and nothing updates or deletes it afterwards.
//! Each certificate carries a public code (see [`crate::code`]) that the
//! verification endpoint resolves with [`CertificateStore::find_by_code`].

use std::sync::Arc;

use certdesk_storage::{Direction, Query};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::code::{CodeSource, SystemCodeSource, DEFAULT_PREFIX};
use crate::error::{CertificateError, StoreError};
use crate::normalize::{self, missing_fields, split_list};
use crate::repository::{decode_all, from_document, to_fields, Repository};
use crate::subscription::{watch_listing, Subscription};

/// Collection holding certificate records.
pub const COLLECTION: &str = "certificates";

/// Generated codes tried before giving up on finding an unused one.
pub const MAX_CODE_ATTEMPTS: usize = 5;

/// Default issuing organisation.
pub const DEFAULT_ORGANIZATION: &str = "Atomicity Web Works";

/// Format of calendar dates on input and in storage.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A stored certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Store document id. Not part of the stored fields.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub certificate_id: String,
    pub intern_name: String,
    pub program_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub skills_learned: Vec<String>,
    #[serde(default)]
    pub project_worked_on: Vec<String>,
    pub issued_by: String,
    pub verification_url: String,
    #[serde(with = "normalize::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Operator input for a new certificate, as entered on the admin form.
///
/// Dates are `YYYY-MM-DD`. Skills and projects are comma-separated text.
/// An absent `issueDate` means today; a blank one is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueRequest {
    pub intern_name: String,
    pub program_name: String,
    pub start_date: String,
    pub end_date: String,
    pub issue_date: Option<String>,
    pub skills_learned: String,
    pub project_worked_on: String,
}

/// Values stamped onto every issued certificate.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Prefix of generated codes.
    pub code_prefix: String,
    /// Value of `issuedBy`.
    pub organization: String,
    /// Public origin verification links point at, e.g. `https://example.com`.
    pub public_origin: String,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            code_prefix: DEFAULT_PREFIX.to_owned(),
            organization: DEFAULT_ORGANIZATION.to_owned(),
            public_origin: "http://localhost:8080".to_owned(),
        }
    }
}

impl IssuerConfig {
    /// Public verification link for a code.
    #[must_use]
    pub fn verification_url(&self, code: &str) -> String {
        format!(
            "{}/certificates/{code}",
            self.public_origin.trim_end_matches('/')
        )
    }
}

/// Result of a successful issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCertificate {
    pub id: String,
    pub certificate_id: String,
    pub verification_url: String,
}

/// Issues, lists, and looks up certificates.
#[derive(Clone)]
pub struct CertificateStore {
    repo: Repository,
    issuer: IssuerConfig,
    codes: Arc<dyn CodeSource>,
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStore")
            .field("repo", &self.repo)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl CertificateStore {
    /// Create a certificate store that draws codes from the system clock.
    #[must_use]
    pub fn new(repo: Repository, issuer: IssuerConfig) -> Self {
        let codes = Arc::new(SystemCodeSource::new(&issuer.code_prefix));
        Self::with_code_source(repo, issuer, codes)
    }

    /// Create a certificate store with an explicit code source.
    #[must_use]
    pub fn with_code_source(
        repo: Repository,
        issuer: IssuerConfig,
        codes: Arc<dyn CodeSource>,
    ) -> Self {
        Self {
            repo,
            issuer,
            codes,
        }
    }

    /// The issuer settings in use.
    #[must_use]
    pub fn issuer(&self) -> &IssuerConfig {
        &self.issuer
    }

    /// Validate a request and write one new certificate.
    ///
    /// Nothing is written when validation fails.
    ///
    /// # Errors
    ///
    /// - [`CertificateError::Validation`] if a required field is blank or a
    ///   date does not parse.
    /// - [`CertificateError::StoreUnavailable`] if the store fails, or no
    ///   unused code turns up within [`MAX_CODE_ATTEMPTS`].
    /// - [`CertificateError::Timeout`] if the store does not answer in time.
    pub async fn issue(&self, req: IssueRequest) -> Result<IssuedCertificate, CertificateError> {
        let intern_name = req.intern_name.trim().to_owned();
        let program_name = req.program_name.trim().to_owned();

        let missing = missing_fields(&[
            ("internName", intern_name.as_str()),
            ("programName", program_name.as_str()),
            ("startDate", req.start_date.as_str()),
            ("endDate", req.end_date.as_str()),
            ("issueDate", req.issue_date.as_deref().unwrap_or("today")),
        ]);
        if !missing.is_empty() {
            return Err(CertificateError::Validation {
                reason: format!("missing required fields: {}", missing.join(", ")),
            });
        }

        let start_date = parse_date("startDate", &req.start_date)?;
        let end_date = parse_date("endDate", &req.end_date)?;
        let created_at = normalize::now();
        let issue_date = match req.issue_date.as_deref() {
            Some(raw) => parse_date("issueDate", raw)?,
            None => created_at.date_naive(),
        };

        let code = self.unused_code().await?;
        let certificate = Certificate {
            id: String::new(),
            verification_url: self.issuer.verification_url(&code),
            certificate_id: code,
            intern_name,
            program_name,
            start_date,
            end_date,
            issue_date,
            skills_learned: split_list(&req.skills_learned),
            project_worked_on: split_list(&req.project_worked_on),
            issued_by: self.issuer.organization.clone(),
            created_at,
        };

        let id = match self.repo.create(COLLECTION, to_fields(&certificate)?).await {
            Ok(id) => id,
            Err(err @ StoreError::Timeout { .. }) => {
                warn!(
                    certificate_id = %certificate.certificate_id,
                    "certificate write timed out and may still complete"
                );
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            certificate_id = %certificate.certificate_id,
            doc_id = %id,
            "certificate issued"
        );

        Ok(IssuedCertificate {
            id,
            certificate_id: certificate.certificate_id,
            verification_url: certificate.verification_url,
        })
    }

    async fn unused_code(&self) -> Result<String, CertificateError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = self.codes.next_code();
            let taken = self
                .repo
                .query(COLLECTION, &Query::new().where_eq("certificateId", code.as_str()))
                .await?;
            if taken.is_empty() {
                return Ok(code);
            }
            warn!(%code, attempt, "generated certificate code already in use");
        }
        Err(CertificateError::StoreUnavailable {
            reason: format!("no unused certificate code after {MAX_CODE_ATTEMPTS} attempts"),
        })
    }

    /// Every certificate, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::StoreUnavailable`] or
    /// [`CertificateError::Timeout`] if the store cannot answer.
    pub async fn list_all(&self) -> Result<Vec<Certificate>, CertificateError> {
        let docs = self.repo.query(COLLECTION, &listing()).await?;
        Ok(decode_all(docs, attach_id))
    }

    /// Live variant of [`list_all`](Self::list_all).
    ///
    /// `on_update` receives the full listing immediately and again after
    /// every change to the certificate collection, until the returned
    /// [`Subscription`] is dropped.
    pub fn watch_all<F>(&self, on_update: F) -> Subscription
    where
        F: FnMut(Result<Vec<Certificate>, CertificateError>) + Send + 'static,
    {
        watch_listing(self.repo.clone(), COLLECTION, attach_id, on_update)
    }

    /// The certificate carrying `code`. If several do, the oldest wins.
    ///
    /// # Errors
    ///
    /// - [`CertificateError::NotFound`] if no certificate carries the code.
    /// - [`CertificateError::StoreUnavailable`] or
    ///   [`CertificateError::Timeout`] if the store cannot answer.
    pub async fn find_by_code(&self, code: &str) -> Result<Certificate, CertificateError> {
        let query = Query::new()
            .where_eq("certificateId", code)
            .order_by("createdAt", Direction::Ascending);
        let doc = self
            .repo
            .query(COLLECTION, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CertificateError::NotFound {
                code: code.to_owned(),
            })?;

        let id = doc.id.clone();
        let mut certificate: Certificate = from_document(doc)?;
        certificate.id = id;
        Ok(certificate)
    }
}

fn listing() -> Query {
    Query::new().order_by("createdAt", Direction::Descending)
}

fn attach_id(certificate: &mut Certificate, id: String) {
    certificate.id = id;
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, CertificateError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| CertificateError::Validation {
        reason: format!("{field} must be a date in YYYY-MM-DD form, got '{}'", raw.trim()),
    })
}
