//! `POST /_bulk` and `POST /{index}/_bulk`. Both share one body: validate the
//! NDJSON content type, parse, run through the pipeline, time it, and let
//! `build_bulk_response` decide buffered vs. streamed.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::bulk::{build_bulk_response, parse_bulk, require_ndjson_content_type};
use crate::http::state::DocumentHandler;

async fn run_bulk(state: &DocumentHandler, headers: &HeaderMap, body: Bytes, default_index: Option<&str>) -> Response {
	if let Err(e) = require_ndjson_content_type(headers.get("content-type").and_then(|v| v.to_str().ok())) {
		return e.into_response();
	}
	let items = match parse_bulk(&body, default_index) {
		Ok(items) => items,
		Err(e) => return e.into_response(),
	};

	let started = Instant::now();
	let results = state.bulk_pipeline.execute(items).await;
	let took_ms = started.elapsed().as_millis() as u64;
	build_bulk_response(results, took_ms)
}

pub async fn bulk_no_index(State(state): State<Arc<DocumentHandler>>, headers: HeaderMap, body: Bytes) -> Response {
	run_bulk(&state, &headers, body, None).await
}

pub async fn bulk_with_index(
	State(state): State<Arc<DocumentHandler>>,
	Path(index): Path<String>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	run_bulk(&state, &headers, body, Some(&index)).await
}
