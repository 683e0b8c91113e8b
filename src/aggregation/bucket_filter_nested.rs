//! `filter` and `nested` bucket aggregations. `filter` re-evaluates a query
//! clause over the already-fetched hit set; `nested` descends into an
//! object-array field and runs its sub-aggregations over the flattened
//! nested elements.

use serde_json::{Value, json};

use crate::EsError;
use crate::aggregation::{AggContext, AggNode, execute_aggs, values::field_value};
use crate::engine::SearchHit;
use crate::query::{SimpleQueryParser, matches_query};

pub fn compute_filter(
	config: &Value,
	hits: &[SearchHit],
	sub_aggs: &[(String, AggNode)],
	ctx: &AggContext,
) -> Result<Value, EsError> {
	let query = SimpleQueryParser::new().compile(config)?;
	let matched: Vec<SearchHit> = hits
		.iter()
		.filter(|h| matches_query(&query, &h.source))
		.cloned()
		.collect();

	let mut bucket = json!({ "doc_count": matched.len() });
	let sub_results = execute_aggs(sub_aggs, &matched, ctx)?;
	let obj = bucket.as_object_mut().expect("constructed as object");
	for (name, value) in sub_results {
		obj.insert(name, value);
	}
	Ok(bucket)
}

/// Descends into an object-array field named by `config.path`. Each array
/// element becomes a synthetic hit (same `_id`, the element as `source`) so
/// sub-aggregations can run unmodified over the nested level.
pub fn compute_nested(
	config: &Value,
	hits: &[SearchHit],
	sub_aggs: &[(String, AggNode)],
	ctx: &AggContext,
) -> Result<Value, EsError> {
	let path = config
		.get("path")
		.and_then(|v| v.as_str())
		.ok_or_else(|| EsError::IllegalArgument("nested aggregation requires a path".to_string()))?;

	let mut nested_hits = Vec::new();
	for hit in hits {
		if let Some(Value::Array(items)) = field_value(&hit.source, path) {
			for item in items {
				nested_hits.push(SearchHit {
					id: hit.id.clone(),
					score: hit.score,
					source: item.clone(),
				});
			}
		}
	}

	let mut bucket = json!({ "doc_count": nested_hits.len() });
	let sub_results = execute_aggs(sub_aggs, &nested_hits, ctx)?;
	let obj = bucket.as_object_mut().expect("constructed as object");
	for (name, value) in sub_results {
		obj.insert(name, value);
	}
	Ok(bucket)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::memory::MemoryScriptEngine;
	use serde_json::json;
	use std::sync::Arc;

	fn ctx() -> AggContext {
		AggContext {
			script_engine: Arc::new(MemoryScriptEngine::new()),
		}
	}

	fn hit(id: &str, source: Value) -> SearchHit {
		SearchHit {
			id: id.to_string(),
			score: 1.0,
			source,
		}
	}

	#[test]
	fn filter_bucket_counts_only_matching_hits() {
		let hits = vec![
			hit("1", json!({"status": "active"})),
			hit("2", json!({"status": "deleted"})),
		];
		let result = compute_filter(
			&json!({"term": {"status": "active"}}),
			&hits,
			&[],
			&ctx(),
		)
		.unwrap();
		assert_eq!(result["doc_count"], 1);
	}

	#[test]
	fn nested_bucket_flattens_object_array_field() {
		let hits = vec![hit(
			"1",
			json!({"comments": [{"rating": 4}, {"rating": 5}]}),
		)];
		let sub_aggs = crate::aggregation::parse_aggs(&json!({"avg_rating": {"avg": {"field": "rating"}}})).unwrap();
		let result = compute_nested(&json!({"path": "comments"}), &hits, &sub_aggs, &ctx()).unwrap();
		assert_eq!(result["doc_count"], 2);
		assert_eq!(result["avg_rating"]["value"], 4.5);
	}

	#[test]
	fn nested_bucket_on_missing_path_is_empty() {
		let hits = vec![hit("1", json!({}))];
		let result = compute_nested(&json!({"path": "comments"}), &hits, &[], &ctx()).unwrap();
		assert_eq!(result["doc_count"], 0);
	}
}
