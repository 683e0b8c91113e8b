//! `range` bucket aggregation: inclusive-from, exclusive-to buckets over a
//! numeric field. A missing `from` is `-inf`; a missing `to` is `+inf`.

use serde_json::{Value, json};

use crate::EsError;
use crate::aggregation::{AggContext, AggNode, execute_aggs, values::numeric_values};
use crate::engine::SearchHit;

pub fn compute(
	config: &Value,
	hits: &[SearchHit],
	sub_aggs: &[(String, AggNode)],
	ctx: &AggContext,
) -> Result<Value, EsError> {
	let field = config
		.get("field")
		.and_then(|v| v.as_str())
		.ok_or_else(|| EsError::IllegalArgument("range aggregation requires a field".to_string()))?;
	let ranges = config
		.get("ranges")
		.and_then(|v| v.as_array())
		.ok_or_else(|| EsError::IllegalArgument("range aggregation requires ranges".to_string()))?;

	let mut buckets = Vec::with_capacity(ranges.len());
	for range in ranges {
		let from = range.get("from").and_then(|v| v.as_f64());
		let to = range.get("to").and_then(|v| v.as_f64());
		let key = range
			.get("key")
			.and_then(|v| v.as_str())
			.map(|s| s.to_string())
			.unwrap_or_else(|| default_range_key(from, to));

		let matched: Vec<SearchHit> = hits
			.iter()
			.filter(|h| {
				numeric_values(&h.source, field)
					.iter()
					.any(|n| from.map_or(true, |f| *n >= f) && to.map_or(true, |t| *n < t))
			})
			.cloned()
			.collect();

		let mut bucket = json!({
			"key": key,
			"doc_count": matched.len(),
		});
		if let Some(f) = from {
			bucket["from"] = json!(f);
		}
		if let Some(t) = to {
			bucket["to"] = json!(t);
		}
		let sub_results = execute_aggs(sub_aggs, &matched, ctx)?;
		let obj = bucket.as_object_mut().expect("constructed as object");
		for (name, value) in sub_results {
			obj.insert(name, value);
		}
		buckets.push(bucket);
	}

	Ok(json!({ "buckets": buckets }))
}

fn default_range_key(from: Option<f64>, to: Option<f64>) -> String {
	match (from, to) {
		(Some(f), Some(t)) => format!("{f}-{t}"),
		(Some(f), None) => format!("{f}-*"),
		(None, Some(t)) => format!("*-{t}"),
		(None, None) => "*-*".to_string(),
	}
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

	fn hit(id: &str, price: f64) -> SearchHit {
		SearchHit {
			id: id.to_string(),
			score: 1.0,
			source: json!({"price": price}),
		}
	}

	#[test]
	fn from_is_inclusive_and_to_is_exclusive() {
		let hits = vec![hit("1", 5.0), hit("2", 10.0)];
		let result = compute(
			&json!({"field": "price", "ranges": [{"from": 5.0, "to": 10.0}]}),
			&hits,
			&[],
			&ctx(),
		)
		.unwrap();
		assert_eq!(result["buckets"][0]["doc_count"], 1);
	}

	#[test]
	fn missing_from_means_negative_infinity() {
		let hits = vec![hit("1", -100.0)];
		let result = compute(
			&json!({"field": "price", "ranges": [{"to": 0.0}]}),
			&hits,
			&[],
			&ctx(),
		)
		.unwrap();
		assert_eq!(result["buckets"][0]["doc_count"], 1);
	}

	#[test]
	fn explicit_key_overrides_the_generated_one() {
		let result = compute(
			&json!({"field": "price", "ranges": [{"key": "cheap", "to": 10.0}]}),
			&[],
			&[],
			&ctx(),
		)
		.unwrap();
		assert_eq!(result["buckets"][0]["key"], "cheap");
	}

	#[test]
	fn missing_field_is_rejected() {
		assert!(compute(&json!({"ranges": []}), &[], &[], &ctx()).is_err());
	}
}
