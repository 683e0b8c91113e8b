//! `_search` and `_msearch`: compiles the query, runs it against the engine,
//! executes any requested aggregations over the returned hits, and shapes
//! the ES hit envelope.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::EsError;
use crate::aggregation::{execute_aggs, parse_aggs};
use crate::bulk::require_ndjson_content_type;
use crate::engine::SearchRequest;
use crate::http::state::DocumentHandler;
use crate::query::CompiledQuery;
use crate::response::SearchResponseBuilder;

const DEFAULT_SIZE: usize = 10;

#[derive(Debug, Deserialize, Default)]
pub struct SearchQueryParams {
	q: Option<String>,
	from: Option<usize>,
	size: Option<usize>,
}

/// Runs one search + aggregation pass over `index`. Shared by `_search` and
/// each `_msearch` pair.
async fn run_search(
	state: &DocumentHandler,
	index: &str,
	body: &Value,
	q_param: Option<&str>,
) -> Result<Value, EsError> {
	let handle = state
		.index_manager
		.get_index(index)
		.await
		.ok_or_else(|| EsError::IndexNotFound(index.to_string()))?;

	let compiled = if let Some(q) = q_param {
		CompiledQuery::QueryString { text: q.to_string() }
	} else {
		match body.get("query") {
			Some(q) => state.query_parser.parse_query(q)?,
			None => CompiledQuery::MatchAll,
		}
	};

	let from = body.get("from").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
	let size = body
		.get("size")
		.and_then(|v| v.as_u64())
		.map(|v| v as usize)
		.unwrap_or(DEFAULT_SIZE);

	let builder = SearchResponseBuilder::start();
	let results = handle
		.search(&SearchRequest {
			query: Some(Arc::new(compiled)),
			fields: Vec::new(),
			from,
			size,
		})
		.await?;

	let aggs_spec = body.get("aggs").or_else(|| body.get("aggregations"));
	let aggregations: Map<String, Value> = match aggs_spec {
		Some(spec) => {
			let nodes = parse_aggs(spec)?;
			execute_aggs(&nodes, &results.hits, &state.agg_context)?
		}
		None => Map::new(),
	};

	Ok(builder.build(index, &results, aggregations))
}

pub async fn search_post(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
	Json(body): Json<Value>,
) -> Result<Json<Value>, EsError> {
	Ok(Json(run_search(&state, &index, &body, None).await?))
}

pub async fn search_get(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
	Query(params): Query<SearchQueryParams>,
) -> Result<Json<Value>, EsError> {
	let mut body = json!({});
	if let Some(from) = params.from {
		body["from"] = json!(from);
	}
	if let Some(size) = params.size {
		body["size"] = json!(size);
	}
	Ok(Json(
		run_search(&state, &index, &body, params.q.as_deref()).await?,
	))
}

/// `POST /_msearch`: NDJSON alternating header (`{"index": "..."}`) and body
/// (`{"query": {...}}`) lines. Reuses `run_search` per pair.
pub async fn msearch(
	State(state): State<Arc<DocumentHandler>>,
	headers: HeaderMap,
	body: axum::body::Bytes,
) -> Response {
	if let Err(e) = require_ndjson_content_type(headers.get("content-type").and_then(|v| v.to_str().ok())) {
		return e.into_response();
	}
	let text = match std::str::from_utf8(&body) {
		Ok(t) => t,
		Err(e) => return EsError::Parsing(format!("msearch body is not valid UTF-8: {e}")).into_response(),
	};

	let mut responses = Vec::new();
	let mut lines = text.split('\n').map(str::trim).filter(|l| !l.is_empty());
	while let Some(header_line) = lines.next() {
		let header: Value = match serde_json::from_str(header_line) {
			Ok(v) => v,
			Err(e) => {
				responses.push(EsError::Parsing(format!("invalid msearch header: {e}")).body_json());
				continue;
			}
		};
		let index = match header.get("index").and_then(|v| v.as_str()) {
			Some(i) => i.to_string(),
			None => {
				responses.push(
					EsError::IllegalArgument("msearch header is missing index".to_string()).body_json(),
				);
				continue;
			}
		};
		let query_body: Value = match lines.next() {
			Some(line) => match serde_json::from_str(line) {
				Ok(v) => v,
				Err(e) => {
					responses.push(EsError::Parsing(format!("invalid msearch body: {e}")).body_json());
					continue;
				}
			},
			None => {
				responses.push(
					EsError::Parsing("msearch header with no matching body line".to_string()).body_json(),
				);
				break;
			}
		};
		match run_search(&state, &index, &query_body, None).await {
			Ok(result) => responses.push(result),
			Err(e) => responses.push(e.body_json()),
		}
	}

	Json(json!({ "responses": responses })).into_response()
}
