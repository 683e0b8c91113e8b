//! Builds the `_bulk` HTTP response: buffered for small batches, chunked and
//! incrementally flushed for large ones, so the server never buffers an
//! entire multi-hundred-thousand-item response in memory.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::{Value, json};
use tokio_stream::wrappers::ReceiverStream;

use crate::bulk::pipeline::ItemResult;

const STREAM_THRESHOLD: usize = 100;
const FLUSH_EVERY: usize = 50;
const CHANNEL_CAPACITY: usize = 4;

pub fn errors_flag(results: &[ItemResult]) -> bool {
	results.iter().any(ItemResult::is_error)
}

/// The small-batch, single-shot response body.
pub fn bulk_response_json(results: &[ItemResult], took_ms: u64) -> Value {
	let items: Vec<Value> = results.iter().map(ItemResult::to_json).collect();
	json!({
		"took": took_ms,
		"errors": errors_flag(results),
		"items": items,
	})
}

pub fn build_bulk_response(results: Vec<ItemResult>, took_ms: u64) -> Response {
	if results.len() > STREAM_THRESHOLD {
		stream_bulk_response(results, took_ms)
	} else {
		buffered_bulk_response(&results, took_ms)
	}
}

fn buffered_bulk_response(results: &[ItemResult], took_ms: u64) -> Response {
	let body = bulk_response_json(results, took_ms);
	let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());
	Response::builder()
		.status(StatusCode::OK)
		.header("content-type", "application/json")
		.body(Body::from(bytes))
		.unwrap_or_else(|e| {
			tracing::error!(error = %e, "failed to build bulk response");
			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		})
}

fn stream_bulk_response(results: Vec<ItemResult>, took_ms: u64) -> Response {
	let errors = errors_flag(&results);
	let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(CHANNEL_CAPACITY);

	tokio::spawn(async move {
		if tx.send(Ok(Bytes::from_static(b"{\"items\":["))).await.is_err() {
			return;
		}
		let mut chunk = String::new();
		for (i, result) in results.iter().enumerate() {
			if i > 0 {
				chunk.push(',');
			}
			chunk.push_str(&result.to_json().to_string());
			if (i + 1) % FLUSH_EVERY == 0 && tx.send(Ok(Bytes::from(std::mem::take(&mut chunk)))).await.is_err() {
				return;
			}
		}
		if !chunk.is_empty() && tx.send(Ok(Bytes::from(chunk))).await.is_err() {
			return;
		}
		let tail = format!("],\"errors\":{errors},\"took\":{took_ms}}}");
		let _ = tx.send(Ok(Bytes::from(tail))).await;
	});

	let body = Body::from_stream(ReceiverStream::new(rx));
	Response::builder()
		.status(StatusCode::OK)
		.header("content-type", "application/json")
		.body(body)
		.unwrap_or_else(|e| {
			tracing::error!(error = %e, "failed to build streaming bulk response");
			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		})
}
