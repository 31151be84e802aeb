//! Public certificate verification.
//!
//! Resolves a code to its certificate and derives the display fields shown
//! on the verification page. Read-only; callers need no credentials.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::certificate::{Certificate, CertificateStore};
use crate::error::CertificateError;

/// A certificate together with its human-readable dates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCertificate {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub display: DisplayDates,
}

/// Long-form dates, e.g. `March 2nd, 2024`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayDates {
    pub start_date: String,
    pub end_date: String,
    pub issue_date: String,
}

impl From<Certificate> for VerifiedCertificate {
    fn from(certificate: Certificate) -> Self {
        let display = DisplayDates {
            start_date: format_long_date(certificate.start_date),
            end_date: format_long_date(certificate.end_date),
            issue_date: format_long_date(certificate.issue_date),
        };
        Self {
            certificate,
            display,
        }
    }
}

/// Look up a code for public display.
///
/// Surrounding whitespace is ignored. A blank code is simply not found.
///
/// # Errors
///
/// - [`CertificateError::NotFound`] if no certificate carries the code.
/// - [`CertificateError::StoreUnavailable`] or [`CertificateError::Timeout`]
///   if the store cannot answer. These are kept distinct from not-found so
///   a transient failure never tells a visitor the certificate is invalid.
pub async fn verify(
    store: &CertificateStore,
    code: &str,
) -> Result<VerifiedCertificate, CertificateError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(CertificateError::NotFound {
            code: String::new(),
        });
    }
    let certificate = store.find_by_code(code).await?;
    tracing::debug!(certificate_id = %certificate.certificate_id, "certificate verified");
    Ok(certificate.into())
}

/// Format a date as `Month Dth, YYYY`.
///
/// ```
/// # use certdesk_core::verify::format_long_date;
/// # use chrono::NaiveDate;
/// let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
/// assert_eq!(format_long_date(date), "March 2nd, 2024");
/// ```
#[must_use]
pub fn format_long_date(date: NaiveDate) -> String {
    let day = date.day();
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{} {day}{suffix}, {}", date.format("%B"), date.year())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use certdesk_storage::MemoryStore;

    use crate::certificate::{IssueRequest, IssuerConfig};
    use crate::repository::{Repository, DEFAULT_STORE_TIMEOUT};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ordinal_suffixes() {
        assert_eq!(format_long_date(date(2024, 1, 1)), "January 1st, 2024");
        assert_eq!(format_long_date(date(2024, 1, 3)), "January 3rd, 2024");
        assert_eq!(format_long_date(date(2024, 1, 11)), "January 11th, 2024");
        assert_eq!(format_long_date(date(2024, 1, 12)), "January 12th, 2024");
        assert_eq!(format_long_date(date(2024, 1, 13)), "January 13th, 2024");
        assert_eq!(format_long_date(date(2024, 1, 22)), "January 22nd, 2024");
        assert_eq!(format_long_date(date(2024, 1, 31)), "January 31st, 2024");
    }

    #[tokio::test]
    async fn verify_derives_display_dates() {
        let repo = Repository::new(Arc::new(MemoryStore::new()), "ns", DEFAULT_STORE_TIMEOUT);
        let store = CertificateStore::new(repo, IssuerConfig::default());
        let issued = store
            .issue(IssueRequest {
                intern_name: "Asha Rao".into(),
                program_name: "Backend Internship".into(),
                start_date: "2024-01-01".into(),
                end_date: "2024-03-01".into(),
                issue_date: Some("2024-03-02".into()),
                ..IssueRequest::default()
            })
            .await
            .unwrap();

        let verified = verify(&store, &format!("  {}  ", issued.certificate_id))
            .await
            .unwrap();
        assert_eq!(verified.display.issue_date, "March 2nd, 2024");
        assert_eq!(verified.display.start_date, "January 1st, 2024");

        let json = serde_json::to_value(&verified).unwrap();
        assert_eq!(json["internName"], "Asha Rao");
        assert_eq!(json["display"]["endDate"], "March 1st, 2024");
    }

    #[tokio::test]
    async fn blank_code_is_not_found() {
        let repo = Repository::new(Arc::new(MemoryStore::new()), "ns", DEFAULT_STORE_TIMEOUT);
        let store = CertificateStore::new(repo, IssuerConfig::default());
        let err = verify(&store, "   ").await.unwrap_err();
        assert!(matches!(err, CertificateError::NotFound { .. }));
    }
}
