//! End-to-end tests for the HTTP surface, driven through the router with
//! `tower::ServiceExt::oneshot` over an in-memory store. Live listings are
//! exercised over a real socket with a `tokio-tungstenite` client.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use certdesk_core::auth::{AdminAuth, AuthConfig, LinkSender};
use certdesk_core::certificate::{CertificateStore, IssuerConfig};
use certdesk_core::error::AuthError;
use certdesk_core::repository::{Repository, DEFAULT_STORE_TIMEOUT};
use certdesk_server::state::AppState;
use certdesk_storage::{
    ChangeEvent, Document, DocumentStore, Fields, MemoryStore, Query, StorageError,
};

const ADMIN_EMAIL: &str = "admin@example.com";
const PASSWORD: &str = "correct horse";

/// Argon2id PHC string of [`PASSWORD`], at minimum cost.
static PASSWORD_HASH: LazyLock<String> = LazyLock::new(|| {
    let argon2 = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(Params::MIN_M_COST, 1, 1, None).unwrap(),
    );
    let salt = SaltString::encode_b64(b"api-test-salt").unwrap();
    argon2
        .hash_password(PASSWORD.as_bytes(), &salt)
        .unwrap()
        .to_string()
});

// ── Fixtures ─────────────────────────────────────────────────────────

fn auth_config() -> AuthConfig {
    AuthConfig {
        admin_email: Some(ADMIN_EMAIL.to_owned()),
        password_hash: Some(PASSWORD_HASH.clone()),
        link_base: "https://certs.example.com".to_owned(),
        ..AuthConfig::default()
    }
}

fn issuer() -> IssuerConfig {
    IssuerConfig {
        public_origin: "https://certs.example.com".to_owned(),
        ..IssuerConfig::default()
    }
}

fn build_app(store: Arc<dyn DocumentStore>, timeout: Duration, sender: Option<Arc<dyn LinkSender>>) -> Router {
    let repo = Repository::new(store, "test/data", timeout);
    let auth = match sender {
        Some(sender) => AdminAuth::with_sender(repo.clone(), auth_config(), sender),
        None => AdminAuth::new(repo.clone(), auth_config()),
    };
    let certificates = CertificateStore::new(repo.clone(), issuer());
    certdesk_server::app(Arc::new(AppState::from_parts(certificates, auth, repo)))
}

fn test_app() -> Router {
    build_app(Arc::new(MemoryStore::new()), DEFAULT_STORE_TIMEOUT, None)
}

#[derive(Default)]
struct CapturingSender(Mutex<Vec<String>>);

#[async_trait]
impl LinkSender for CapturingSender {
    async fn send(&self, _email: &str, url: &str) -> Result<(), AuthError> {
        self.0.lock().unwrap().push(url.to_owned());
        Ok(())
    }
}

/// A store whose every call fails.
struct FailingStore {
    inner: MemoryStore,
}

fn refused(collection: &str) -> StorageError {
    StorageError::Read {
        collection: collection.to_owned(),
        reason: "connection refused".to_owned(),
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn create(&self, collection: &str, _: Fields) -> Result<String, StorageError> {
        Err(refused(collection))
    }
    async fn set(&self, collection: &str, _: &str, _: Fields) -> Result<(), StorageError> {
        Err(refused(collection))
    }
    async fn get(&self, collection: &str, _: &str) -> Result<Option<Document>, StorageError> {
        Err(refused(collection))
    }
    async fn update(&self, collection: &str, _: &str, _: Fields) -> Result<(), StorageError> {
        Err(refused(collection))
    }
    async fn delete(&self, collection: &str, _: &str) -> Result<(), StorageError> {
        Err(refused(collection))
    }
    async fn query(&self, collection: &str, _: &Query) -> Result<Vec<Document>, StorageError> {
        Err(refused(collection))
    }
    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes()
    }
}

/// A store whose calls never complete.
struct StalledStore {
    inner: MemoryStore,
}

#[async_trait]
impl DocumentStore for StalledStore {
    async fn create(&self, _: &str, _: Fields) -> Result<String, StorageError> {
        std::future::pending().await
    }
    async fn set(&self, _: &str, _: &str, _: Fields) -> Result<(), StorageError> {
        std::future::pending().await
    }
    async fn get(&self, _: &str, _: &str) -> Result<Option<Document>, StorageError> {
        std::future::pending().await
    }
    async fn update(&self, _: &str, _: &str, _: Fields) -> Result<(), StorageError> {
        std::future::pending().await
    }
    async fn delete(&self, _: &str, _: &str) -> Result<(), StorageError> {
        std::future::pending().await
    }
    async fn query(&self, _: &str, _: &Query) -> Result<Vec<Document>, StorageError> {
        std::future::pending().await
    }
    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes()
    }
}

// ── Request helpers ──────────────────────────────────────────────────

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, String) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn call_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, text) = call(app, req).await;
    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, value)
}

async fn sign_in(app: &Router) -> String {
    let (status, body) = call_json(
        app,
        send_json(
            "POST",
            "/v1/auth/login",
            None,
            &json!({ "email": ADMIN_EMAIL, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_owned()
}

fn internship() -> Value {
    json!({
        "internName": "Asha Rao",
        "programName": "Web Development Internship",
        "startDate": "2024-01-15",
        "endDate": "2024-03-15",
        "issueDate": "2024-03-20",
        "skillsLearned": "React, Node.js, , Firebase",
        "projectWorkedOn": "Client portal"
    })
}

// ── Health and headers ───────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();
    let resp = app.clone().oneshot(get("/v1/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(resp.headers()[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-store");

    let (_, body) = call_json(&app, get("/v1/health", None)).await;
    assert_eq!(body["status"], "ok");
}

// ── Certificates ─────────────────────────────────────────────────────

#[tokio::test]
async fn issue_then_verify() {
    let app = test_app();
    let token = sign_in(&app).await;

    let (status, issued) = call_json(
        &app,
        send_json("POST", "/v1/admin/certificates", Some(&token), &internship()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{issued}");
    let code = issued["certificateId"].as_str().unwrap().to_owned();
    assert!(code.starts_with("AWW-"));
    assert_eq!(
        issued["verificationUrl"],
        format!("https://certs.example.com/certificates/{code}")
    );

    let (status, verified) = call_json(&app, get(&format!("/v1/certificates/{code}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["internName"], "Asha Rao");
    assert_eq!(verified["issuedBy"], "Atomicity Web Works");
    assert_eq!(verified["skillsLearned"], json!(["React", "Node.js", "Firebase"]));
    assert_eq!(verified["display"]["issueDate"], "March 20th, 2024");

    let (status, page) = call(&app, get(&format!("/certificates/{code}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Asha Rao"));
    assert!(page.contains("January 15th, 2024"));
    assert!(page.contains("Client portal"));

    let (status, listing) = call_json(&app, get("/v1/admin/certificates", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["certificates"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn issue_rejects_missing_fields() {
    let app = test_app();
    let token = sign_in(&app).await;
    let mut body = internship();
    body["programName"] = json!("  ");

    let (status, err) = call_json(
        &app,
        send_json("POST", "/v1/admin/certificates", Some(&token), &body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");
    assert!(err["message"].as_str().unwrap().contains("programName"));

    let (_, listing) = call_json(&app, get("/v1/admin/certificates", Some(&token))).await;
    assert!(listing["certificates"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let app = test_app();

    let (status, err) = call_json(&app, get("/v1/certificates/AWW-DOESNOTEXIST-00000", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");

    let (status, page) = call(&app, get("/certificates/AWW-DOESNOTEXIST-00000", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(page.contains("Certificate not found"));
    assert!(page.contains("AWW-DOESNOTEXIST-00000"));
}

#[tokio::test]
async fn store_failure_is_not_reported_as_missing() {
    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
    });
    let app = build_app(store, DEFAULT_STORE_TIMEOUT, None);

    let (status, err) = call_json(&app, get("/v1/certificates/AWW-LT9BH1C0-AB12C", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err["error"], "store_unavailable");
    assert!(!err["message"].as_str().unwrap().contains("connection refused"));

    let (status, page) = call(&app, get("/certificates/AWW-LT9BH1C0-AB12C", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(page.contains("temporarily unavailable"));
    assert!(!page.contains("not found"));
}

#[tokio::test(start_paused = true)]
async fn stalled_store_times_out() {
    let store = Arc::new(StalledStore {
        inner: MemoryStore::new(),
    });
    let app = build_app(store, Duration::from_secs(2), None);

    let (status, err) = call_json(&app, get("/v1/certificates/AWW-LT9BH1C0-AB12C", None)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(err["error"], "timeout");
}

// ── Admin access ─────────────────────────────────────────────────────

#[tokio::test]
async fn admin_routes_require_a_session() {
    let app = test_app();

    let (status, err) = call_json(&app, get("/v1/admin/certificates", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "unauthorized");

    let (status, _) = call_json(&app, get("/v1/admin/submissions", Some("not-a-session"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call_json(
        &app,
        send_json("POST", "/v1/admin/certificates", None, &internship()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_wrong_password_and_other_accounts() {
    let app = test_app();

    let (status, err) = call_json(
        &app,
        send_json(
            "POST",
            "/v1/auth/login",
            None,
            &json!({ "email": ADMIN_EMAIL, "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "unauthorized");

    let (status, err) = call_json(
        &app,
        send_json(
            "POST",
            "/v1/auth/login",
            None,
            &json!({ "email": "someone@example.com", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "access_denied");
}

#[tokio::test]
async fn session_lifecycle_over_email_link() {
    let sender = Arc::new(CapturingSender::default());
    let app = build_app(
        Arc::new(MemoryStore::new()),
        DEFAULT_STORE_TIMEOUT,
        Some(sender.clone()),
    );

    let (status, _) = call_json(
        &app,
        send_json("POST", "/v1/auth/link", None, &json!({ "email": ADMIN_EMAIL })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let url = sender.0.lock().unwrap().pop().unwrap();
    let link = url
        .strip_prefix("https://certs.example.com/admin/link/")
        .unwrap()
        .to_owned();

    let (status, signed_in) = call_json(
        &app,
        send_json("POST", &format!("/v1/auth/link/{link}"), None, &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{signed_in}");
    let token = signed_in["token"].as_str().unwrap().to_owned();

    // A link works once.
    let (status, _) = call_json(
        &app,
        send_json("POST", &format!("/v1/auth/link/{link}"), None, &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, session) = call_json(&app, get("/v1/auth/session", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["email"], ADMIN_EMAIL);
    assert!(session.get("token").is_none());

    let (status, _) = call_json(
        &app,
        send_json("POST", "/v1/auth/logout", Some(&token), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call_json(&app, get("/v1/auth/session", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn link_for_other_account_is_denied() {
    let sender = Arc::new(CapturingSender::default());
    let app = build_app(
        Arc::new(MemoryStore::new()),
        DEFAULT_STORE_TIMEOUT,
        Some(sender.clone()),
    );

    let (status, _) = call_json(
        &app,
        send_json(
            "POST",
            "/v1/auth/link",
            None,
            &json!({ "email": "someone@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(sender.0.lock().unwrap().is_empty());
}

// ── Catalog ──────────────────────────────────────────────────────────

fn project(title: &str, featured: bool) -> Value {
    json!({
        "title": title,
        "description": "A storefront rebuild",
        "imageUrl": "https://img.example.com/p.png",
        "technologies": "Rust, Axum",
        "clientName": "Acme",
        "category": "Web",
        "isFeatured": featured
    })
}

#[tokio::test]
async fn featured_projects_filter() {
    let app = test_app();
    let token = sign_in(&app).await;

    for (title, featured) in [("Storefront", true), ("Intranet", false)] {
        let (status, created) = call_json(
            &app,
            send_json("POST", "/v1/admin/projects", Some(&token), &project(title, featured)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        assert_eq!(created["technologies"], json!(["Rust", "Axum"]));
    }

    let (_, all) = call_json(&app, get("/v1/projects", None)).await;
    assert_eq!(all["projects"].as_array().unwrap().len(), 2);

    let (_, featured) = call_json(&app, get("/v1/projects?featured=true", None)).await;
    let featured = featured["projects"].as_array().unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0]["title"], "Storefront");
}

#[tokio::test]
async fn project_update_and_delete() {
    let app = test_app();
    let token = sign_in(&app).await;

    let (_, created) = call_json(
        &app,
        send_json("POST", "/v1/admin/projects", Some(&token), &project("Storefront", false)),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_owned();

    let (status, updated) = call_json(
        &app,
        send_json(
            "PUT",
            &format!("/v1/admin/projects/{id}"),
            Some(&token),
            &project("Storefront v2", true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Storefront v2");
    assert_eq!(updated["isFeatured"], true);

    let (status, _) = call(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/v1/admin/projects/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call_json(&app, get(&format!("/v1/projects/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call_json(
        &app,
        send_json(
            "PUT",
            &format!("/v1/admin/projects/{id}"),
            Some(&token),
            &project("Ghost", false),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_approved_testimonials_are_public() {
    let app = test_app();
    let token = sign_in(&app).await;

    let approved = json!({ "quote": "Shipped on time.", "clientName": "Meera" });
    let pending = json!({ "quote": "Pending review.", "clientName": "Ravi", "isApproved": false });
    for body in [&approved, &pending] {
        let (status, _) = call_json(
            &app,
            send_json("POST", "/v1/admin/testimonials", Some(&token), body),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, err) = call_json(
        &app,
        send_json(
            "POST",
            "/v1/admin/testimonials",
            Some(&token),
            &json!({ "quote": "Too good.", "clientName": "X", "rating": 6 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");

    let (_, public) = call_json(&app, get("/v1/testimonials", None)).await;
    let public = public["testimonials"].as_array().unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0]["clientName"], "Meera");
    assert_eq!(public[0]["rating"], 5);

    let (_, all) = call_json(&app, get("/v1/admin/testimonials", Some(&token))).await;
    assert_eq!(all["testimonials"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn contact_form_reaches_the_inbox() {
    let app = test_app();

    let (status, err) = call_json(
        &app,
        send_json("POST", "/api/contact", None, &json!({ "name": "Dev" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");

    let (status, created) = call_json(
        &app,
        send_json(
            "POST",
            "/api/contact",
            None,
            &json!({
                "name": "Dev",
                "email": "dev@example.com",
                "subject": "Quote",
                "message": "We need a site."
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!created["id"].as_str().unwrap().is_empty());

    let token = sign_in(&app).await;
    let (status, inbox) = call_json(&app, get("/v1/admin/submissions", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let submissions = inbox["submissions"].as_array().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["subject"], "Quote");
}

// ── Malformed input ──────────────────────────────────────────────────

#[tokio::test]
async fn malformed_json_gets_a_json_error() {
    let app = test_app();
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/contact")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let err: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(err["error"], "validation");

    let token = sign_in(&app).await;
    let (status, err) = call_json(
        &app,
        send_json(
            "POST",
            "/v1/admin/testimonials",
            Some(&token),
            &json!({ "quote": "Great.", "clientName": "X", "rating": 300 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");

    let (status, err) = call_json(&app, get("/v1/projects?featured=maybe", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");
}

#[tokio::test]
async fn missing_content_type_is_a_validation_error() {
    let app = test_app();
    let (status, err) = call_json(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/contact")
            .body(Body::from(r#"{"name":"Dev"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");
}

// ── Live listings ────────────────────────────────────────────────────

type LiveSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve `app` on an ephemeral port.
async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn live_request(
    addr: SocketAddr,
    path: &str,
    header: Option<(header::HeaderName, String)>,
) -> tungstenite::handshake::client::Request {
    let mut req = format!("ws://{addr}{path}").into_client_request().unwrap();
    if let Some((name, value)) = header {
        req.headers_mut().insert(name, value.parse().unwrap());
    }
    req
}

async fn next_frame(socket: &mut LiveSocket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("frame within 5s")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn wait_for_subscribers(store: &MemoryStore, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.subscriber_count() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count settles");
}

#[tokio::test]
async fn live_certificates_stream_until_closed() {
    let store = MemoryStore::new();
    let app = build_app(Arc::new(store.clone()), DEFAULT_STORE_TIMEOUT, None);
    let token = sign_in(&app).await;
    let addr = serve(app.clone()).await;

    let err = tokio_tungstenite::connect_async(live_request(addr, "/v1/admin/certificates/live", None))
        .await
        .unwrap_err();
    assert!(
        matches!(err, tungstenite::Error::Http(ref resp) if resp.status() == StatusCode::UNAUTHORIZED),
        "{err}"
    );
    assert_eq!(store.subscriber_count(), 0);

    let (mut socket, _) = tokio_tungstenite::connect_async(live_request(
        addr,
        "/v1/admin/certificates/live",
        Some((header::AUTHORIZATION, format!("Bearer {token}"))),
    ))
    .await
    .unwrap();

    let first = next_frame(&mut socket).await;
    assert_eq!(first["type"], "snapshot");
    assert_eq!(first["items"], json!([]));
    assert_eq!(store.subscriber_count(), 1);

    let (status, issued) = call_json(
        &app,
        send_json("POST", "/v1/admin/certificates", Some(&token), &internship()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let second = next_frame(&mut socket).await;
    assert_eq!(second["type"], "snapshot");
    let items = second["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["certificateId"], issued["certificateId"]);

    socket.close(None).await.unwrap();
    let mut acknowledged = false;
    while let Some(Ok(msg)) = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("socket closes within 5s")
    {
        acknowledged |= msg.is_close();
    }
    assert!(acknowledged);
    wait_for_subscribers(&store, 0).await;
}

#[tokio::test]
async fn live_projects_accept_the_token_as_subprotocol() {
    let store = MemoryStore::new();
    let app = build_app(Arc::new(store.clone()), DEFAULT_STORE_TIMEOUT, None);
    let token = sign_in(&app).await;
    let addr = serve(app.clone()).await;

    let (mut socket, resp) = tokio_tungstenite::connect_async(live_request(
        addr,
        "/v1/admin/projects/live",
        Some((header::SEC_WEBSOCKET_PROTOCOL, format!("bearer, {token}"))),
    ))
    .await
    .unwrap();
    assert_eq!(resp.headers()[header::SEC_WEBSOCKET_PROTOCOL], "bearer");
    assert_eq!(next_frame(&mut socket).await["items"], json!([]));

    let (status, _) = call_json(
        &app,
        send_json("POST", "/v1/admin/projects", Some(&token), &project("Storefront", true)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let frame = next_frame(&mut socket).await;
    assert_eq!(frame["items"][0]["title"], "Storefront");

    drop(socket);
    wait_for_subscribers(&store, 0).await;
}

#[tokio::test]
async fn live_inbox_and_testimonials_require_a_session() {
    let app = test_app();
    let addr = serve(app).await;
    for path in ["/v1/admin/submissions/live", "/v1/admin/testimonials/live"] {
        let err = tokio_tungstenite::connect_async(live_request(
            addr,
            path,
            Some((header::SEC_WEBSOCKET_PROTOCOL, "bearer, not-a-session".to_owned())),
        ))
        .await
        .unwrap_err();
        assert!(
            matches!(err, tungstenite::Error::Http(ref resp) if resp.status() == StatusCode::UNAUTHORIZED),
            "{path}: {err}"
        );
    }
}
