//! `avg` / `sum` / `min` / `max` / `stats` / `cardinality` metric
//! aggregations: single-pass reductions over a field's numeric values across
//! the hit set.

use std::collections::HashSet;

use serde_json::{Value, json};

use crate::EsError;
use crate::aggregation::values::{numeric_values, term_values};
use crate::engine::SearchHit;

pub fn compute(kind: &str, config: &Value, hits: &[SearchHit]) -> Result<Value, EsError> {
	let field = config
		.get("field")
		.and_then(|v| v.as_str())
		.ok_or_else(|| EsError::IllegalArgument(format!("{kind} aggregation requires a field")))?;

	match kind {
		"avg" => Ok(single_value(avg(&collect(hits, field)))),
		"sum" => Ok(single_value(Some(collect(hits, field).iter().sum()))),
		"min" => Ok(single_value(collect(hits, field).into_iter().fold(None, min_fold))),
		"max" => Ok(single_value(collect(hits, field).into_iter().fold(None, max_fold))),
		"stats" => Ok(stats(&collect(hits, field))),
		"cardinality" => {
			let threshold = config
				.get("precision_threshold")
				.and_then(|v| v.as_u64())
				.unwrap_or(3000) as usize;
			Ok(cardinality(hits, field, threshold))
		}
		other => Err(EsError::IllegalArgument(format!(
			"unsupported metric aggregation: {other}"
		))),
	}
}

fn collect(hits: &[SearchHit], field: &str) -> Vec<f64> {
	hits.iter().flat_map(|h| numeric_values(&h.source, field)).collect()
}

fn avg(values: &[f64]) -> Option<f64> {
	if values.is_empty() {
		None
	} else {
		Some(values.iter().sum::<f64>() / values.len() as f64)
	}
}

fn min_fold(acc: Option<f64>, v: f64) -> Option<f64> {
	Some(acc.map_or(v, |a| a.min(v)))
}

fn max_fold(acc: Option<f64>, v: f64) -> Option<f64> {
	Some(acc.map_or(v, |a| a.max(v)))
}

fn single_value(value: Option<f64>) -> Value {
	match value {
		Some(v) => json!({"value": v}),
		None => json!({"value": Value::Null}),
	}
}

fn stats(values: &[f64]) -> Value {
	let count = values.len();
	if count == 0 {
		return json!({
			"count": 0, "min": Value::Null, "max": Value::Null,
			"avg": Value::Null, "sum": 0.0,
		});
	}
	let sum: f64 = values.iter().sum();
	let avg = sum / count as f64;
	let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
	let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
	let sum_of_squares: f64 = values.iter().map(|v| v * v).sum();
	let variance = sum_of_squares / count as f64 - avg * avg;
	let variance = variance.max(0.0);
	let std_deviation = variance.sqrt();
	json!({
		"count": count,
		"min": min,
		"max": max,
		"avg": avg,
		"sum": sum,
		"sum_of_squares": sum_of_squares,
		"variance": variance,
		"std_deviation": std_deviation,
		"std_deviation_bounds": {
			"upper": avg + 2.0 * std_deviation,
			"lower": avg - 2.0 * std_deviation,
		},
	})
}

fn cardinality(hits: &[SearchHit], field: &str, threshold: usize) -> Value {
	let mut seen = HashSet::new();
	for hit in hits {
		for value in term_values(&hit.source, field) {
			seen.insert(value.to_string());
			if seen.len() >= threshold {
				break;
			}
		}
	}
	json!({"value": seen.len().min(threshold)})
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn hit(source: Value) -> SearchHit {
		SearchHit {
			id: "1".to_string(),
			score: 1.0,
			source,
		}
	}

	#[test]
	fn avg_computes_the_mean() {
		let hits = vec![hit(json!({"price": 10})), hit(json!({"price": 20}))];
		let result = compute("avg", &json!({"field": "price"}), &hits).unwrap();
		assert_eq!(result["value"], 15.0);
	}

	#[test]
	fn sum_of_empty_set_is_zero() {
		let result = compute("sum", &json!({"field": "price"}), &[]).unwrap();
		assert_eq!(result["value"], 0.0);
	}

	#[test]
	fn min_of_empty_set_is_null() {
		let result = compute("min", &json!({"field": "price"}), &[]).unwrap();
		assert_eq!(result["value"], Value::Null);
	}

	#[test]
	fn stats_reports_full_distribution_shape() {
		let hits = vec![hit(json!({"price": 1})), hit(json!({"price": 3}))];
		let result = compute("stats", &json!({"field": "price"}), &hits).unwrap();
		assert_eq!(result["count"], 2);
		assert_eq!(result["avg"], 2.0);
		assert_eq!(result["min"], 1.0);
		assert_eq!(result["max"], 3.0);
	}

	#[test]
	fn cardinality_counts_unique_values() {
		let hits = vec![
			hit(json!({"tag": "a"})),
			hit(json!({"tag": "a"})),
			hit(json!({"tag": "b"})),
		];
		let result = compute("cardinality", &json!({"field": "tag"}), &hits).unwrap();
		assert_eq!(result["value"], 2);
	}

	#[test]
	fn missing_field_config_is_rejected() {
		assert!(compute("avg", &json!({}), &[]).is_err());
	}
}
