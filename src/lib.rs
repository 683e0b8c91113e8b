//! # esfront
//!
//! An Elasticsearch-wire-compatible HTTP front end placed in front of an
//! embedded full-text index engine. This crate owns everything above the
//! engine boundary: index lifecycle, mapping translation, the bulk pipeline,
//! query compilation, aggregations, delete-by-query, document versioning, and
//! the ES-shaped JSON responses that come back out. What sits below the
//! `engine` module's traits — the real index engine, the real directory
//! layout, a real metadata store — is deliberately out of scope; `engine::memory`
//! ships reference implementations so the rest of the crate can run standalone.

pub mod aggregation;
pub mod bulk;
pub mod config;
pub mod delete_by_query;
pub mod engine;
pub mod error;
pub mod http;
pub mod index_lifecycle;
pub mod mapping;
pub mod query;
pub mod response;
pub mod version;

pub use error::EsError;
pub use http::state::DocumentHandler;
