//! Core library for `CertDesk`.
//!
//! Contains the certificate store and code generator, public verification,
//! the portfolio catalog (projects, testimonials, contact submissions), and
//! admin authentication. This crate depends on `certdesk-storage` for the
//! document store trait and knows nothing about HTTP.
//!
//! Every store call goes through a [`repository::Repository`], which bounds
//! it with a timeout and places collections under a configured namespace.

pub mod auth;
pub mod certificate;
pub mod code;
pub mod error;
pub mod normalize;
pub mod project;
pub mod repository;
pub mod submission;
pub mod subscription;
pub mod testimonial;
pub mod verify;
