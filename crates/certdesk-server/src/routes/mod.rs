//! HTTP route handlers for `CertDesk`.
//!
//! Routes are organized by subsystem:
//! - `health`: Liveness probe
//! - `verify`: Public certificate verification (HTML page and JSON)
//! - `certificates`: Admin issuance, listing, and live listing
//! - `live`: WebSocket plumbing shared by the admin live listings
//! - `projects`: Public portfolio and admin project CRUD
//! - `testimonials`: Public approved testimonials and admin CRUD
//! - `submissions`: Public contact form and admin inbox
//! - `auth`: Admin sign-in, sign-in links, session, and sign-out

pub mod auth;
pub mod certificates;
pub mod health;
pub mod live;
pub mod projects;
pub mod submissions;
pub mod testimonials;
pub mod verify;
