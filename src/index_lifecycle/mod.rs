//! # Index Lifecycle
//!
//! Index CRUD, mapping/settings updates, and alias management, backed by a
//! `DirectoryManager` + `MetadataStore` + `IndexManager` triple. See
//! `controller` for the operations themselves and `metadata`/`validate` for
//! the types and rules they build on.

pub mod controller;
pub mod metadata;
pub mod validate;

pub use controller::IndexLifecycleController;
pub use metadata::IndexMetadata;
