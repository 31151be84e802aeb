//! Public verification routes: `/certificates/{code}` and
//! `/v1/certificates/{code}`.
//!
//! The HTML page is what a verification link opens. A missing certificate
//! gets its own 404 page; a store failure or timeout gets a "try again"
//! page, so a visitor is never told a valid certificate is invalid.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use certdesk_core::verify::{verify, VerifiedCertificate};

use crate::error::AppError;
use crate::state::AppState;

/// Build the verification page router (mounted at `/certificates`).
pub fn page_router() -> Router<Arc<AppState>> {
    Router::new().route("/{code}", get(verification_page))
}

/// Build the `/v1/certificates` router.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new().route("/{code}", get(verification_json))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Verification result as JSON.
async fn verification_json(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<VerifiedCertificate>, AppError> {
    Ok(Json(verify(&state.certificates, &code).await?))
}

/// Verification result as a rendered page.
async fn verification_page(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Response {
    match verify(&state.certificates, &code).await {
        Ok(verified) => Html(render_certificate(&verified)).into_response(),
        Err(err) => {
            let err = AppError::from(err);
            let status = err.status();
            let body = if status == StatusCode::NOT_FOUND {
                render_message(
                    "Certificate not found",
                    &format!(
                        "No certificate matches the code <code>{}</code>. Check the link or ask the issuer for a new one.",
                        escape(code.trim())
                    ),
                )
            } else {
                render_message(
                    "Verification temporarily unavailable",
                    "We could not reach the certificate records just now. Please try again in a moment.",
                )
            };
            (status, Html(body)).into_response()
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────────

fn render_certificate(verified: &VerifiedCertificate) -> String {
    let cert = &verified.certificate;
    let list = |items: &[String]| {
        if items.is_empty() {
            "<p class=\"muted\">None listed</p>".to_owned()
        } else {
            let lis: String = items
                .iter()
                .map(|i| format!("<li>{}</li>", escape(i)))
                .collect();
            format!("<ul>{lis}</ul>")
        }
    };

    let mut html = String::with_capacity(4096);
    html.push_str(&page_head(&format!("{} | Certificate", cert.intern_name)));
    html.push_str(&format!(
        r#"<main class="card">
<p class="badge">Verified certificate</p>
<h1>{intern}</h1>
<p class="lead">has completed the <strong>{program}</strong> program at {issuer}.</p>
<dl>
<dt>Program period</dt><dd>{start} to {end}</dd>
<dt>Issued on</dt><dd>{issued}</dd>
<dt>Certificate code</dt><dd><code>{code}</code></dd>
</dl>
<h2>Skills learned</h2>
{skills}
<h2>Projects worked on</h2>
{projects}
<p class="muted">Issued by {issuer}. This page is the authoritative record for this certificate.</p>
</main></body></html>"#,
        intern = escape(&cert.intern_name),
        program = escape(&cert.program_name),
        issuer = escape(&cert.issued_by),
        start = escape(&verified.display.start_date),
        end = escape(&verified.display.end_date),
        issued = escape(&verified.display.issue_date),
        code = escape(&cert.certificate_id),
        skills = list(&cert.skills_learned),
        projects = list(&cert.project_worked_on),
    ));
    html
}

fn render_message(title: &str, body_html: &str) -> String {
    let mut html = page_head(title);
    html.push_str(&format!(
        "<main class=\"card\"><h1>{}</h1><p class=\"lead\">{body_html}</p></main></body></html>",
        escape(title)
    ));
    html
}

fn page_head(title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head><meta charset="utf-8"/><meta name="viewport" content="width=device-width,initial-scale=1"/>
<meta name="robots" content="noindex"/>
<title>{}</title>
<style>
*,*::before,*::after{{box-sizing:border-box;margin:0;padding:0}}
body{{font-family:-apple-system,'Segoe UI',sans-serif;background:#f6f7fb;color:#1c2333;line-height:1.6;padding:48px 16px}}
.card{{max-width:720px;margin:0 auto;background:#fff;border:1px solid #e3e6ef;border-radius:16px;padding:40px}}
.badge{{display:inline-block;font-size:12px;font-weight:700;text-transform:uppercase;letter-spacing:.08em;color:#1a7f4b;background:#e6f6ed;border-radius:50px;padding:4px 12px;margin-bottom:16px}}
h1{{font-size:32px;margin-bottom:8px}}
h2{{font-size:16px;margin:24px 0 8px}}
.lead{{font-size:17px;color:#4a5368}}
dl{{display:grid;grid-template-columns:180px 1fr;gap:8px 16px;margin-top:24px}}
dt{{color:#6b7488;font-size:14px}}
ul{{padding-left:20px}}
.muted{{color:#8a93a6;font-size:13px;margin-top:24px}}
code{{font-family:ui-monospace,monospace;background:#f0f2f7;border-radius:6px;padding:2px 6px}}
</style></head><body>
"#,
        escape(title)
    )
}

/// Escape text for inclusion in HTML.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape;

    #[test]
    fn escape_neutralises_markup() {
        assert_eq!(
            escape(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;y&#39;"
        );
    }
}
