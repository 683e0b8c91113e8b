//! # Error Taxonomy
//!
//! ## Purpose
//! A single error type spanning every subsystem, mapped onto the Elasticsearch
//! error body shape (`{"error":{"type","reason"},"status"}`) and onto the HTTP
//! status codes ES itself returns for each condition.
//!
//! ## Mental model
//! Each subsystem returns its own narrow error (`MappingError`, `VersionConflict`,
//! `EngineError`, ...); `#[from]` conversions fold them into `EsError` at the
//! point they cross into an HTTP handler. Handlers therefore return
//! `Result<T, EsError>` and never hand-serialize an error body themselves.
//!
//! ## Invariants
//! - Every variant has a fixed `(kind, status)` pair; adding a variant requires
//!   extending both `kind()` and `status()`.
//!   - Failure symptom: a new error path falls through to `internal_server_error`
//!     instead of its proper 4xx kind.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;
use crate::version::VersionConflictKind;

#[derive(Debug, Error)]
pub enum EsError {
	#[error("Invalid index name {name:?}: {reason}")]
	InvalidIndexName { name: String, reason: String },

	#[error("index [{0}] already exists")]
	IndexAlreadyExists(String),

	#[error("no such index [{0}]")]
	IndexNotFound(String),

	#[error("task [{0}] not found")]
	TaskNotFound(String),

	#[error("{0}")]
	IllegalArgument(String),

	#[error("failed to parse request body: {0}")]
	Parsing(String),

	#[error("version conflict for {index}/{id}: {kind}")]
	VersionConflict {
		index: String,
		id: String,
		kind: VersionConflictKind,
	},

	#[error(transparent)]
	Engine(#[from] EngineError),

	#[error("internal server error: {0}")]
	Internal(String),
}

impl EsError {
	pub fn kind(&self) -> &'static str {
		match self {
			EsError::InvalidIndexName { .. } => "invalid_index_name_exception",
			EsError::IndexAlreadyExists(_) => "resource_already_exists_exception",
			EsError::IndexNotFound(_) => "index_not_found_exception",
			EsError::TaskNotFound(_) => "resource_not_found_exception",
			EsError::IllegalArgument(_) => "illegal_argument_exception",
			EsError::Parsing(_) => "parsing_exception",
			EsError::VersionConflict { .. } => "version_conflict_engine_exception",
			EsError::Engine(_) => "internal_server_error",
			EsError::Internal(_) => "internal_server_error",
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			EsError::InvalidIndexName { .. } => StatusCode::BAD_REQUEST,
			EsError::IndexAlreadyExists(_) => StatusCode::CONFLICT,
			EsError::IndexNotFound(_) => StatusCode::NOT_FOUND,
			EsError::TaskNotFound(_) => StatusCode::NOT_FOUND,
			EsError::IllegalArgument(_) => StatusCode::BAD_REQUEST,
			EsError::Parsing(_) => StatusCode::BAD_REQUEST,
			EsError::VersionConflict { .. } => StatusCode::CONFLICT,
			EsError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
			EsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// The `{"error":{"type","reason"},"status"}` body ES clients expect,
	/// usable standalone (e.g. embedded in a bulk item result).
	pub fn body_json(&self) -> serde_json::Value {
		serde_json::json!({
			"error": { "type": self.kind(), "reason": self.to_string() },
			"status": self.status().as_u16(),
		})
	}
}

#[derive(Serialize)]
struct ErrorEnvelope {
	error: ErrorDetail,
	status: u16,
}

#[derive(Serialize)]
struct ErrorDetail {
	#[serde(rename = "type")]
	kind: &'static str,
	reason: String,
}

impl IntoResponse for EsError {
	fn into_response(self) -> Response {
		let status = self.status();
		let envelope = ErrorEnvelope {
			error: ErrorDetail {
				kind: self.kind(),
				reason: self.to_string(),
			},
			status: status.as_u16(),
		};
		let body = serde_json::to_vec(&envelope).unwrap_or_else(|_| {
			br#"{"error":{"type":"internal_server_error","reason":"failed to serialize error"},"status":500}"#
				.to_vec()
		});
		Response::builder()
			.status(status)
			.header("content-type", "application/json")
			.body(Body::from(body))
			.unwrap_or_else(|e| {
				tracing::error!(error = %e, "failed to build error response");
				Response::builder()
					.status(StatusCode::INTERNAL_SERVER_ERROR)
					.body(Body::from(&b"{}"[..]))
					.expect("static response always builds")
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invalid_index_name_maps_to_400() {
		let err = EsError::InvalidIndexName {
			name: "Bad".into(),
			reason: "must be lowercase".into(),
		};
		assert_eq!(err.status(), StatusCode::BAD_REQUEST);
		assert_eq!(err.kind(), "invalid_index_name_exception");
	}

	#[test]
	fn index_already_exists_maps_to_409() {
		let err = EsError::IndexAlreadyExists("idx1".into());
		assert_eq!(err.status(), StatusCode::CONFLICT);
	}

	#[test]
	fn version_conflict_maps_to_409_and_names_key() {
		let err = EsError::VersionConflict {
			index: "idx1".into(),
			id: "1".into(),
			kind: VersionConflictKind::Version,
		};
		assert_eq!(err.status(), StatusCode::CONFLICT);
		assert!(err.to_string().contains("idx1"));
	}

	#[test]
	fn body_json_has_error_type_and_reason() {
		let err = EsError::IndexNotFound("missing".into());
		let body = err.body_json();
		assert_eq!(body["error"]["type"], "index_not_found_exception");
		assert_eq!(body["status"], 404);
	}
}
