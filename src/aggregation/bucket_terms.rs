//! `terms` bucket aggregation: groups hits by exact field value, ordered by
//! descending doc-count with ties broken by descending term value.

use std::collections::HashMap;

use serde_json::{Value, json};

use crate::EsError;
use crate::aggregation::{AggContext, AggNode, execute_aggs, values::term_values};
use crate::engine::SearchHit;

const DEFAULT_SIZE: usize = 10;

pub fn compute(
	config: &Value,
	hits: &[SearchHit],
	sub_aggs: &[(String, AggNode)],
	ctx: &AggContext,
) -> Result<Value, EsError> {
	let field = config
		.get("field")
		.and_then(|v| v.as_str())
		.ok_or_else(|| EsError::IllegalArgument("terms aggregation requires a field".to_string()))?;
	let size = config
		.get("size")
		.and_then(|v| v.as_u64())
		.map(|v| v as usize)
		.unwrap_or(DEFAULT_SIZE);

	let mut groups: HashMap<String, (Value, Vec<&SearchHit>)> = HashMap::new();
	for hit in hits {
		for term in term_values(&hit.source, field) {
			let key = term.to_string();
			groups.entry(key).or_insert_with(|| (term, Vec::new())).1.push(hit);
		}
	}

	let mut ordered: Vec<(Value, Vec<&SearchHit>)> = groups.into_values().collect();
	ordered.sort_by(|a, b| {
		b.1.len()
			.cmp(&a.1.len())
			.then_with(|| b.0.to_string().cmp(&a.0.to_string()))
	});

	let sum_other_doc_count: usize = ordered.iter().skip(size).map(|(_, h)| h.len()).sum();

	let mut buckets = Vec::with_capacity(size.min(ordered.len()));
	for (term, bucket_hits) in ordered.into_iter().take(size) {
		let owned: Vec<SearchHit> = bucket_hits.into_iter().cloned().collect();
		let mut bucket = json!({"key": term, "doc_count": owned.len()});
		let sub_results = execute_aggs(sub_aggs, &owned, ctx)?;
		let obj = bucket.as_object_mut().expect("constructed as object");
		for (name, value) in sub_results {
			obj.insert(name, value);
		}
		buckets.push(bucket);
	}

	Ok(json!({
		"doc_count_error_upper_bound": 0,
		"sum_other_doc_count": sum_other_doc_count,
		"buckets": buckets,
	}))
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
	fn groups_by_exact_term_value_and_orders_by_doc_count() {
		let hits = vec![
			hit("1", json!({"tag": "a"})),
			hit("2", json!({"tag": "b"})),
			hit("3", json!({"tag": "a"})),
		];
		let result = compute(&json!({"field": "tag"}), &hits, &[], &ctx()).unwrap();
		let buckets = result["buckets"].as_array().unwrap();
		assert_eq!(buckets[0]["key"], "a");
		assert_eq!(buckets[0]["doc_count"], 2);
		assert_eq!(buckets[1]["key"], "b");
		assert_eq!(buckets[1]["doc_count"], 1);
	}

	#[test]
	fn size_caps_bucket_count_and_rolls_up_the_rest() {
		let hits = vec![
			hit("1", json!({"tag": "a"})),
			hit("2", json!({"tag": "b"})),
			hit("3", json!({"tag": "c"})),
		];
		let result = compute(&json!({"field": "tag", "size": 1}), &hits, &[], &ctx()).unwrap();
		assert_eq!(result["buckets"].as_array().unwrap().len(), 1);
		assert_eq!(result["sum_other_doc_count"], 2);
	}

	#[test]
	fn sub_aggregations_run_over_each_buckets_own_hits() {
		let hits = vec![
			hit("1", json!({"tag": "a", "price": 10})),
			hit("2", json!({"tag": "a", "price": 20})),
		];
		let sub_aggs = crate::aggregation::parse_aggs(&json!({"avg_price": {"avg": {"field": "price"}}})).unwrap();
		let result = compute(&json!({"field": "tag"}), &hits, &sub_aggs, &ctx()).unwrap();
		let buckets = result["buckets"].as_array().unwrap();
		assert_eq!(buckets[0]["avg_price"]["value"], 15.0);
	}

	#[test]
	fn ties_break_on_descending_term_value() {
		let hits = vec![hit("1", json!({"tag": "b"})), hit("2", json!({"tag": "a"}))];
		let result = compute(&json!({"field": "tag"}), &hits, &[], &ctx()).unwrap();
		let buckets = result["buckets"].as_array().unwrap();
		assert_eq!(buckets[0]["key"], "b");
		assert_eq!(buckets[1]["key"], "a");
	}
}
