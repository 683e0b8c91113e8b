//! # Delete-by-Query & Task Manager
//!
//! ## Purpose
//! `POST /{index}/_delete_by_query`, synchronous and asynchronous. The
//! synchronous path is a deliberate departure from ES's scroll-delete loop:
//! against the embedded engine a single batch is dramatically cheaper than
//! repeated scrolls, so it compiles the query, searches once for every
//! matching ID, and submits one delete batch. The asynchronous path spawns a
//! background worker tracked by a `DeleteTask`, processing hits in
//! 1000-document sub-batches so a cancellation request takes effect promptly.
//!
//! ## Key types
//! | Type | Description |
//! | --- | --- |
//! | `DeleteByQueryExecutor` | Drives both the sync and async paths. |
//! | `TaskManager` | Registry of in-flight/completed `DeleteTask`s. |
//! | `DeleteTask` | One async run's mutable status record. |

pub mod manager;
pub mod task;
pub mod worker;

use std::sync::Arc;

use serde_json::{Value, json};

pub use manager::TaskManager;
pub use task::DeleteTask;

use crate::EsError;
use crate::engine::{EngineIndex, IndexManager, SearchRequest};
use crate::query::CompiledQuery;
use crate::version::VersionManager;

const DEFAULT_MAX_DOCS: usize = 10_000_000;

#[derive(Debug, Clone, Default)]
pub struct DeleteByQueryResult {
	pub took_ms: u64,
	pub total: u64,
	pub deleted: u64,
	pub batches: u64,
	pub version_conflicts: u64,
}

impl DeleteByQueryResult {
	pub fn to_json(&self) -> Value {
		json!({
			"took": self.took_ms,
			"timed_out": false,
			"total": self.total,
			"deleted": self.deleted,
			"batches": self.batches,
			"version_conflicts": self.version_conflicts,
			"failures": [],
		})
	}
}

pub struct DeleteByQueryExecutor {
	index_manager: Arc<dyn IndexManager>,
	version_manager: Arc<VersionManager>,
}

impl DeleteByQueryExecutor {
	pub fn new(index_manager: Arc<dyn IndexManager>, version_manager: Arc<VersionManager>) -> Self {
		Self {
			index_manager,
			version_manager,
		}
	}

	/// Synchronous mode: one search, one batch, one response.
	pub async fn execute_sync(
		&self,
		index: &str,
		query: Arc<CompiledQuery>,
		max_docs: Option<usize>,
	) -> Result<DeleteByQueryResult, EsError> {
		let started = std::time::Instant::now();
		let handle = self
			.index_manager
			.get_index(index)
			.await
			.ok_or_else(|| EsError::IndexNotFound(index.to_string()))?;

		let results = handle
			.search(&SearchRequest {
				query: Some(query),
				fields: Vec::new(),
				from: 0,
				size: max_docs.unwrap_or(DEFAULT_MAX_DOCS),
			})
			.await?;

		let ids: Vec<String> = results.hits.iter().map(|h| h.id.clone()).collect();
		let total = ids.len() as u64;
		let (deleted, version_conflicts) =
			delete_ids(handle.as_ref(), &self.version_manager, index, &ids).await?;

		Ok(DeleteByQueryResult {
			took_ms: started.elapsed().as_millis() as u64,
			total,
			deleted,
			batches: 1,
			version_conflicts,
		})
	}

	/// Asynchronous mode: registers a `DeleteTask`, spawns the worker, and
	/// returns immediately. The caller is expected to respond with
	/// `{"task": task.id, "took": 0}`.
	pub fn spawn_async(
		&self,
		task_manager: &TaskManager,
		index: &str,
		query_json: Value,
		compiled: Arc<CompiledQuery>,
	) -> Arc<DeleteTask> {
		let task = task_manager.create(index, query_json);
		let worker_task = task.clone();
		let index_manager = self.index_manager.clone();
		let version_manager = self.version_manager.clone();
		tokio::spawn(async move {
			worker::run(worker_task, index_manager, version_manager, compiled).await;
		});
		task
	}
}

/// Deletes `ids` from `index` in a single engine batch, reconciling the
/// Version Manager afterward. Returns `(deleted_count, version_conflicts)`;
/// an id the engine batch reports as failed is treated as a version
/// conflict (the document most likely disappeared between the search and
/// the delete).
async fn delete_ids(
	handle: &dyn EngineIndex,
	version_manager: &VersionManager,
	index: &str,
	ids: &[String],
) -> Result<(u64, u64), EsError> {
	if ids.is_empty() {
		return Ok((0, 0));
	}
	let mut batch = handle.new_batch();
	for id in ids {
		batch.delete(id.clone());
	}
	let result = handle.batch(batch).await?;

	let mut deleted = 0u64;
	for id in ids {
		if result.failed.contains_key(id) {
			continue;
		}
		version_manager.apply_delete(index, id);
		deleted += 1;
	}
	let version_conflicts = result.failed.len() as u64;
	Ok((deleted, version_conflicts))
}
