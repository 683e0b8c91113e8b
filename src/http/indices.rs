//! Index CRUD, mapping, settings, and alias routes — thin translations from
//! an axum request into one `IndexLifecycleController` call each.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::EsError;
use crate::http::state::DocumentHandler;

fn parse_optional_body(body: Bytes) -> Result<Option<Value>, EsError> {
	if body.is_empty() {
		return Ok(None);
	}
	serde_json::from_slice(&body)
		.map(Some)
		.map_err(|e| EsError::Parsing(format!("invalid JSON body: {e}")))
}

pub async fn create_index(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
	body: Bytes,
) -> Result<Json<Value>, EsError> {
	let body = parse_optional_body(body)?;
	Ok(Json(state.controller.create(&index, body).await?))
}

pub async fn get_index(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.get(&index).await?))
}

pub async fn head_index(State(state): State<Arc<DocumentHandler>>, Path(index): Path<String>) -> Response {
	if state.controller.head(&index).await {
		StatusCode::OK.into_response()
	} else {
		StatusCode::NOT_FOUND.into_response()
	}
}

pub async fn delete_index(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
) -> Result<Json<Value>, EsError> {
	let names: Vec<String> = index.split(',').map(|s| s.trim().to_string()).collect();
	Ok(Json(state.controller.delete(&names).await?))
}

pub async fn get_mapping(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.get_mapping(&index).await?))
}

pub async fn update_mapping(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
	Json(body): Json<Value>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.update_mapping(&index, body).await?))
}

pub async fn get_settings(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.get_settings(&index).await?))
}

pub async fn get_all_settings(State(state): State<Arc<DocumentHandler>>) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.get_settings("_all").await?))
}

pub async fn update_settings(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
	Json(body): Json<Value>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.update_settings(&index, body).await?))
}

pub async fn close_index(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.close(&index).await?))
}

pub async fn open_index(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.open(&index).await?))
}

pub async fn refresh_index(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.refresh(&index).await?))
}

pub async fn flush_index(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.flush(&index).await?))
}

pub async fn force_merge_index(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.force_merge(&index).await?))
}

pub async fn put_alias(
	State(state): State<Arc<DocumentHandler>>,
	Path((index, alias)): Path<(String, String)>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.put_alias(&index, &alias).await?))
}

pub async fn delete_alias(
	State(state): State<Arc<DocumentHandler>>,
	Path((index, alias)): Path<(String, String)>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.delete_alias(&index, &alias).await?))
}

pub async fn get_index_alias(
	State(state): State<Arc<DocumentHandler>>,
	Path((index, alias)): Path<(String, String)>,
) -> Result<Json<Value>, EsError> {
	let all = state.controller.get_alias(Some(&alias)).await?;
	Ok(Json(all.get(&index).cloned().unwrap_or(Value::Null)))
}

#[derive(Debug, Deserialize)]
pub struct AliasQuery {
	name: Option<String>,
}

pub async fn get_alias(
	State(state): State<Arc<DocumentHandler>>,
	Query(q): Query<AliasQuery>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.get_alias(q.name.as_deref()).await?))
}

pub async fn get_alias_named(
	State(state): State<Arc<DocumentHandler>>,
	Path(alias): Path<String>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.get_alias(Some(&alias)).await?))
}

pub async fn post_aliases(
	State(state): State<Arc<DocumentHandler>>,
	Json(body): Json<Value>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(state.controller.post_aliases(body).await?))
}
