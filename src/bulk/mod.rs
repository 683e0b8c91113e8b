//! # Bulk Pipeline
//!
//! ## Purpose
//! `POST /_bulk` and `POST /{index}/_bulk`: parses an NDJSON action/body
//! stream (`parser`), executes it grouped by target index (`pipeline`), and
//! shapes the response, switching to chunked streaming above 100 items
//! (`response`).
//!
//! ## Data flow
//! `parser::parse_bulk` -> `Vec<BulkItem>` -> `pipeline::BulkPipeline::execute`
//! -> `Vec<ItemResult>` -> `response::build_bulk_response`.

pub mod parser;
pub mod pipeline;
pub mod response;

pub use parser::{BulkItem, BulkOp, parse_bulk};
pub use pipeline::{BulkPipeline, ItemResult};
pub use response::build_bulk_response;

use crate::EsError;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// `_bulk` and `_msearch` both require this content type; anything else is
/// rejected before the body is even parsed.
pub fn require_ndjson_content_type(content_type: Option<&str>) -> Result<(), EsError> {
	match content_type {
		Some(ct) if ct.starts_with(NDJSON_CONTENT_TYPE) => Ok(()),
		_ => Err(EsError::IllegalArgument(format!(
			"Content-Type must be {NDJSON_CONTENT_TYPE}"
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_exact_ndjson_content_type() {
		assert!(require_ndjson_content_type(Some("application/x-ndjson")).is_ok());
	}

	#[test]
	fn accepts_ndjson_content_type_with_charset_suffix() {
		assert!(require_ndjson_content_type(Some("application/x-ndjson; charset=utf-8")).is_ok());
	}

	#[test]
	fn rejects_plain_json_content_type() {
		assert!(require_ndjson_content_type(Some("application/json")).is_err());
	}

	#[test]
	fn rejects_missing_content_type() {
		assert!(require_ndjson_content_type(None).is_err());
	}
}
