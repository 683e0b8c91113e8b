//! `GET /_tasks/{id}` and `POST /_tasks/{id}/_cancel`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use crate::EsError;
use crate::http::state::DocumentHandler;

pub async fn get_task(
	State(state): State<Arc<DocumentHandler>>,
	Path(id): Path<String>,
) -> Result<Json<Value>, EsError> {
	let task = state.task_manager.get(&id)?;
	Ok(Json(task.to_envelope()))
}

pub async fn cancel_task(
	State(state): State<Arc<DocumentHandler>>,
	Path(id): Path<String>,
) -> Result<Json<Value>, EsError> {
	state.task_manager.request_cancel(&id)?;
	Ok(Json(json!({"acknowledged": true})))
}
