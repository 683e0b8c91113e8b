//! # ES Response Shaper
//!
//! ## Purpose
//! Wraps engine search results (and, when requested, aggregation results)
//! into the Elasticsearch hit envelope wire clients expect, and times the
//! request for the envelope's `took` field. Error-body shaping lives with the
//! error taxonomy itself (`crate::error::EsError::body_json`); this module
//! only ever shapes *successful* responses.
//!
//! ## Key types
//! | Type | Description |
//! | --- | --- |
//! | `SearchResponseBuilder` | Times a search and renders its envelope. |

use std::time::Instant;

use serde_json::{Map, Value, json};

use crate::engine::SearchResults;

/// Starts a timer at construction so the eventual envelope's `took` field
/// reflects the whole request, not just the final serialization step.
pub struct SearchResponseBuilder {
	started: Instant,
}

impl SearchResponseBuilder {
	pub fn start() -> Self {
		Self {
			started: Instant::now(),
		}
	}

	pub fn took_ms(&self) -> u64 {
		self.started.elapsed().as_millis() as u64
	}

	/// Renders the `{took, timed_out, _shards, hits}` envelope for one
	/// index's results, plus an `aggregations` key when `aggregations` is
	/// non-empty.
	pub fn build(&self, index: &str, results: &SearchResults, aggregations: Map<String, Value>) -> Value {
		let hits: Vec<Value> = results
			.hits
			.iter()
			.map(|hit| {
				json!({
					"_index": index,
					"_id": hit.id,
					"_score": hit.score,
					"_source": hit.source,
				})
			})
			.collect();

		let mut body = json!({
			"took": self.took_ms(),
			"timed_out": false,
			"_shards": shard_block(),
			"hits": {
				"total": { "value": results.total, "relation": "eq" },
				"max_score": results.max_score,
				"hits": hits,
			},
		});
		if !aggregations.is_empty() {
			body["aggregations"] = Value::Object(aggregations);
		}
		body
	}
}

/// The fixed single-node `_shards` block every successful response carries.
pub fn shard_block() -> Value {
	json!({ "total": 1, "successful": 1, "skipped": 0, "failed": 0 })
}
