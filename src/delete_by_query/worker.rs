//! The background worker behind an asynchronous `_delete_by_query` task.

use std::sync::Arc;

use crate::delete_by_query::task::DeleteTask;
use crate::engine::{IndexManager, SearchRequest};
use crate::query::CompiledQuery;
use crate::version::VersionManager;

use super::delete_ids;

const SUB_BATCH_SIZE: usize = 1000;

/// Runs to completion (or cancellation) inside its own `tokio::spawn`. Errors
/// are recorded on the task itself, never propagated: the HTTP caller that
/// started this already moved on with just the task ID.
pub async fn run(
	task: Arc<DeleteTask>,
	index_manager: Arc<dyn IndexManager>,
	version_manager: Arc<VersionManager>,
	query: Arc<CompiledQuery>,
) {
	task.mark_started();

	let Some(handle) = index_manager.get_index(&task.index).await else {
		task.mark_failed(format!("no such index [{}]", task.index));
		return;
	};

	let search_result = handle
		.search(&SearchRequest {
			query: Some(query),
			fields: Vec::new(),
			from: 0,
			size: usize::MAX,
		})
		.await;
	let hits = match search_result {
		Ok(results) => results.hits,
		Err(e) => {
			task.mark_failed(e.to_string());
			return;
		}
	};
	task.set_total(hits.len() as u64);

	for chunk in hits.chunks(SUB_BATCH_SIZE) {
		if task.is_cancel_requested() {
			task.mark_cancelled();
			return;
		}
		let ids: Vec<String> = chunk.iter().map(|h| h.id.clone()).collect();
		match delete_ids(handle.as_ref(), &version_manager, &task.index, &ids).await {
			Ok((deleted, conflicts)) => task.record_batch(deleted, conflicts),
			Err(e) => {
				task.mark_failed(e.to_string());
				return;
			}
		}
	}

	if task.is_cancel_requested() {
		task.mark_cancelled();
	} else {
		task.mark_completed();
	}
}
