//! # Engine Capability Interfaces
//!
//! ## Purpose
//! The narrow seam between this crate and everything it deliberately does not
//! implement: the embedded index engine, the on-disk directory layout, the
//! persistent metadata store, and the scripting engine used by scripted
//! aggregations. Every other module in this crate talks to those collaborators
//! only through the traits defined here.
//!
//! ## Mental model
//! A real deployment wires in implementations backed by the actual embedded
//! engine, a real filesystem layout, and a durable metadata store. `memory`
//! ships one reference implementation of each trait so the rest of the crate
//! (and its test suite) can run standalone — those are a test fixture, not a
//! product.
//!
//! ## Key types
//! | Type | Description |
//! | --- | --- |
//! | `IndexManager` | Resolves and invalidates engine handles by index name. |
//! | `DirectoryManager` | Owns the on-disk per-index directory layout. |
//! | `MetadataStore` | Persists `IndexMetadata` by name. |
//! | `EngineIndex` | One open handle to an index: batch mutation + search. |
//! | `QueryParser` | Compiles an ES query DSL object into an engine query. |
//! | `ScriptEngine` | Executes scripted-aggregation scripts. |

pub mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::mapping::EngineMapping;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("engine I/O error: {0}")]
	Io(String),
	#[error("engine storage error: {0}")]
	Storage(String),
	#[error("engine mapping validation failed: {0}")]
	Validation(String),
	#[error("script execution failed: {0}")]
	Script(String),
}

impl From<std::io::Error> for EngineError {
	fn from(e: std::io::Error) -> Self {
		EngineError::Io(e.to_string())
	}
}

/// An engine-side document value. Mirrors the dynamic JSON tree ES documents
/// are: values that don't fit the shape of an aggregation request are skipped
/// rather than rejected (see `aggregation::values`).
pub type EngineValue = serde_json::Value;

/// A compiled query handle, produced by a `QueryParser` and consumed by
/// `EngineIndex::search`. Opaque to callers above the engine boundary; the
/// concrete variants live in `crate::query` because the reference
/// `QueryParser` implementation and the reference `EngineIndex` both need to
/// agree on a representation to run the test suite without a real engine.
pub use crate::query::CompiledQuery;

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
	pub query: Option<Arc<CompiledQuery>>,
	/// Fields referenced anywhere in the aggregation tree, used by a real
	/// engine to prune field I/O. The reference engine ignores it.
	pub fields: Vec<String>,
	pub from: usize,
	pub size: usize,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
	pub id: String,
	pub score: f32,
	pub source: EngineValue,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
	pub total: usize,
	pub max_score: Option<f32>,
	pub hits: Vec<SearchHit>,
}

/// One pending mutation in an engine batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
	Index { id: String, source: EngineValue },
    Delete { id: String },
}

/// An engine batch under construction. `EngineIndex::new_batch` returns one;
/// ops are appended then submitted as a unit via `EngineIndex::batch`.
#[derive(Debug, Clone, Default)]
pub struct EngineBatch {
	pub ops: Vec<BatchOp>,
}

impl EngineBatch {
	pub fn index(&mut self, id: impl Into<String>, source: EngineValue) {
		self.ops.push(BatchOp::Index {
			id: id.into(),
			source,
		});
	}

	pub fn delete(&mut self, id: impl Into<String>) {
		self.ops.push(BatchOp::Delete { id: id.into() });
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
	/// ids that failed, with a reason, in `ops` order among the failures.
	pub failed: HashMap<String, String>,
}

/// One open handle to an index's engine-side state: document storage,
/// search, and schema validation. Analogous to ES's per-shard engine, but
/// single-node so there is exactly one handle per index.
#[async_trait]
pub trait EngineIndex: Send + Sync {
	fn new_batch(&self) -> EngineBatch {
		EngineBatch::default()
	}

	async fn batch(&self, batch: EngineBatch) -> Result<BatchResult, EngineError>;

	async fn search(&self, req: &SearchRequest) -> Result<SearchResults, EngineError>;

	async fn close(&self) -> Result<(), EngineError>;

	/// `ForceMerge` / `_forcemerge`. The reference engine treats this as a
	/// no-op since it never produces more than one in-memory segment.
	async fn force_merge(&self) -> Result<(), EngineError> {
		Ok(())
	}

	/// Validates a translated mapping before it is accepted as current.
	fn validate_mapping(&self, mapping: &EngineMapping) -> Result<(), EngineError>;

	/// Installs a (re)translated mapping as the handle's current schema.
	fn set_mapping(&self, mapping: EngineMapping);
}

/// Resolves engine handles by index name and invalidates cached status on
/// mutation. Refcounting/open-close lifecycle belongs to the implementation;
/// this crate only ever calls `get_index` / `close_index` / `invalidate_index_status`.
#[async_trait]
pub trait IndexManager: Send + Sync {
	async fn get_index(&self, name: &str) -> Option<Arc<dyn EngineIndex>>;
	async fn open_index(&self, name: &str, mapping: EngineMapping) -> Result<(), EngineError>;
	async fn close_index(&self, name: &str) -> Result<(), EngineError>;
	fn invalidate_index_status(&self, name: &str);
}

/// Owns the on-disk per-index directory layout (`<base>/<indexName>/store/`).
#[async_trait]
pub trait DirectoryManager: Send + Sync {
	async fn create_index(&self, name: &str) -> Result<String, EngineError>;
	async fn delete_index(&self, name: &str) -> Result<(), EngineError>;
	async fn index_exists(&self, name: &str) -> bool;
	async fn list_indices(&self) -> Vec<String>;
	fn get_index_path(&self, name: &str) -> String;
}

/// Persists `IndexMetadata` by name.
#[async_trait]
pub trait MetadataStore: Send + Sync {
	async fn save_index_metadata(
		&self,
		meta: &crate::index_lifecycle::IndexMetadata,
	) -> Result<(), EngineError>;
	async fn get_index_metadata(
		&self,
		name: &str,
	) -> Option<crate::index_lifecycle::IndexMetadata>;
	async fn delete_index_metadata(&self, name: &str) -> Result<(), EngineError>;
	async fn close(&self) -> Result<(), EngineError>;
}

/// Compiles an ES query DSL object (the `query` sub-object) into a
/// `CompiledQuery` the engine can execute.
pub trait QueryParser: Send + Sync {
	fn parse_query(&self, json: &serde_json::Value) -> Result<CompiledQuery, crate::EsError>;
}

#[derive(Debug, Clone)]
pub enum ScriptPhase {
	Init,
	Map,
	Combine,
	Reduce,
	BucketScript,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptContext {
	pub phase: Option<ScriptPhase>,
	pub state: serde_json::Value,
	pub params: serde_json::Value,
	pub doc: Option<serde_json::Value>,
	pub vars: HashMap<String, serde_json::Value>,
}

/// Executes scripted-aggregation scripts (`scripted_metric`, `bucket_script`).
pub trait ScriptEngine: Send + Sync {
	fn execute(
		&self,
		script: &str,
		context: &ScriptContext,
	) -> Result<serde_json::Value, EngineError>;
}
