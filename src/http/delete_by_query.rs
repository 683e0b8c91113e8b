//! `POST /{index}/_delete_by_query?wait_for_completion=true|false`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::Value;

use crate::EsError;
use crate::http::state::DocumentHandler;

#[derive(Debug, Deserialize)]
pub struct DeleteByQueryParams {
	#[serde(default = "default_true")]
	wait_for_completion: bool,
	max_docs: Option<usize>,
}

fn default_true() -> bool {
	true
}

pub async fn delete_by_query(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
	Query(params): Query<DeleteByQueryParams>,
	Json(body): Json<Value>,
) -> Result<Json<Value>, EsError> {
	let query_json = body.get("query").cloned().unwrap_or(Value::Null);
	let compiled = Arc::new(state.query_parser.parse_query(&query_json)?);

	if params.wait_for_completion {
		let max_docs = params.max_docs.unwrap_or(state.config.delete_by_query_max_docs);
		let result = state
			.delete_by_query
			.execute_sync(&index, compiled, Some(max_docs))
			.await?;
		Ok(Json(result.to_json()))
	} else {
		let task = state
			.delete_by_query
			.spawn_async(&state.task_manager, &index, query_json, compiled);
		Ok(Json(serde_json::json!({ "task": task.id, "took": 0 })))
	}
}
