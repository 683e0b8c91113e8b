//! `histogram` and `date_histogram` bucket aggregations: fixed-width buckets
//! over a numeric or date field, keyed by the bucket's lower bound and
//! emitted in ascending key order. Only buckets with at least one document
//! are produced; gap-filling empty buckets is not implemented.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::EsError;
use crate::aggregation::{AggContext, AggNode, execute_aggs, values::{field_value, numeric_values}};
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
		.ok_or_else(|| EsError::IllegalArgument("histogram aggregation requires a field".to_string()))?;
	let interval = config
		.get("interval")
		.and_then(|v| v.as_f64())
		.filter(|i| *i > 0.0)
		.ok_or_else(|| EsError::IllegalArgument("histogram aggregation requires a positive interval".to_string()))?;

	bucket_by_interval(field, interval, hits, sub_aggs, ctx, |key| json!(key))
}

/// `date_histogram` keys by the same millisecond-aligned bucket boundary as
/// `histogram`, but reads the field as an epoch-millis number or an RFC 3339
/// string and renders the key as `key_as_string` alongside the numeric `key`.
/// `fixed_interval` is parsed as `<n><unit>` with unit one of `ms`, `s`, `m`,
/// `h`, `d`; `calendar_interval` accepts the same unit names without a count
/// and is treated as its fixed-length equivalent (`month`/`year` are not
/// supported, matching this engine's lack of a calendar).
pub fn compute_date(
	config: &Value,
	hits: &[SearchHit],
	sub_aggs: &[(String, AggNode)],
	ctx: &AggContext,
) -> Result<Value, EsError> {
	let field = config
		.get("field")
		.and_then(|v| v.as_str())
		.ok_or_else(|| EsError::IllegalArgument("date_histogram aggregation requires a field".to_string()))?;
	let interval_ms = config
		.get("fixed_interval")
		.or_else(|| config.get("calendar_interval"))
		.and_then(|v| v.as_str())
		.map(parse_interval_ms)
		.transpose()?
		.ok_or_else(|| {
			EsError::IllegalArgument(
				"date_histogram aggregation requires fixed_interval or calendar_interval".to_string(),
			)
		})?;

	let dated_hits: Vec<(f64, &SearchHit)> = hits
		.iter()
		.filter_map(|h| date_millis(field_value(&h.source, field)).map(|ms| (ms, h)))
		.collect();

	let mut groups: BTreeMap<i64, Vec<&SearchHit>> = BTreeMap::new();
	for (ms, hit) in &dated_hits {
		let bucket_key = bucket_floor(*ms, interval_ms as f64) as i64;
		groups.entry(bucket_key).or_default().push(hit);
	}

	let mut buckets = Vec::with_capacity(groups.len());
	for (key_ms, bucket_hits) in groups {
		let owned: Vec<SearchHit> = bucket_hits.into_iter().cloned().collect();
		let key_as_string = DateTime::<Utc>::from_timestamp_millis(key_ms)
			.map(|dt| dt.to_rfc3339())
			.unwrap_or_default();
		let mut bucket = json!({
			"key": key_ms,
			"key_as_string": key_as_string,
			"doc_count": owned.len(),
		});
		let sub_results = execute_aggs(sub_aggs, &owned, ctx)?;
		let obj = bucket.as_object_mut().expect("constructed as object");
		for (name, value) in sub_results {
			obj.insert(name, value);
		}
		buckets.push(bucket);
	}

	Ok(json!({ "buckets": buckets }))
}

fn bucket_by_interval(
	field: &str,
	interval: f64,
	hits: &[SearchHit],
	sub_aggs: &[(String, AggNode)],
	ctx: &AggContext,
	render_key: impl Fn(f64) -> Value,
) -> Result<Value, EsError> {
	// Bucket keys are truncated to i64 to get an `Ord` map key; fractional
	// intervals on non-integer fields lose precision beyond whole units.
	let mut groups: BTreeMap<i64, Vec<&SearchHit>> = BTreeMap::new();
	for hit in hits {
		for n in numeric_values(&hit.source, field) {
			let bucket_key = bucket_floor(n, interval);
			groups.entry(bucket_key as i64).or_default().push(hit);
		}
	}

	let mut buckets = Vec::with_capacity(groups.len());
	for (key, bucket_hits) in groups {
		let owned: Vec<SearchHit> = bucket_hits.into_iter().cloned().collect();
		let mut bucket = json!({
			"key": render_key(key as f64),
			"doc_count": owned.len(),
		});
		let sub_results = execute_aggs(sub_aggs, &owned, ctx)?;
		let obj = bucket.as_object_mut().expect("constructed as object");
		for (name, value) in sub_results {
			obj.insert(name, value);
		}
		buckets.push(bucket);
	}

	Ok(json!({ "buckets": buckets }))
}

fn bucket_floor(value: f64, interval: f64) -> f64 {
	(value / interval).floor() * interval
}

fn date_millis(value: Option<&Value>) -> Option<f64> {
	match value? {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis() as f64),
		_ => None,
	}
}

fn parse_interval_ms(spec: &str) -> Result<u64, EsError> {
	let bad = || EsError::IllegalArgument(format!("unsupported date histogram interval: {spec}"));
	let (count, unit): (u64, &str) = if let Some(digits_end) = spec.find(|c: char| !c.is_ascii_digit()) {
		if digits_end == 0 {
			(1, spec)
		} else {
			(spec[..digits_end].parse().map_err(|_| bad())?, &spec[digits_end..])
		}
	} else {
		return Err(bad());
	};
	let unit_ms = match unit {
		"ms" => 1,
		"s" | "second" | "seconds" => 1_000,
		"m" | "minute" | "minutes" => 60_000,
		"h" | "hour" | "hours" => 3_600_000,
		"d" | "day" | "days" => 86_400_000,
		_ => return Err(bad()),
	};
	Ok(count * unit_ms)
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
	fn groups_numeric_values_into_fixed_width_buckets() {
		let hits = vec![hit("1", json!({"price": 5})), hit("2", json!({"price": 15})), hit("3", json!({"price": 8}))];
		let result = compute(&json!({"field": "price", "interval": 10}), &hits, &[], &ctx()).unwrap();
		let buckets = result["buckets"].as_array().unwrap();
		assert_eq!(buckets.len(), 2);
		assert_eq!(buckets[0]["key"], 0.0);
		assert_eq!(buckets[0]["doc_count"], 2);
		assert_eq!(buckets[1]["key"], 10.0);
		assert_eq!(buckets[1]["doc_count"], 1);
	}

	#[test]
	fn missing_interval_is_rejected() {
		assert!(compute(&json!({"field": "price"}), &[], &[], &ctx()).is_err());
	}

	#[test]
	fn zero_interval_is_rejected() {
		assert!(compute(&json!({"field": "price", "interval": 0}), &[], &[], &ctx()).is_err());
	}

	#[test]
	fn date_histogram_buckets_rfc3339_timestamps_by_day() {
		let hits = vec![
			hit("1", json!({"created": "2024-01-01T08:00:00Z"})),
			hit("2", json!({"created": "2024-01-01T20:00:00Z"})),
			hit("3", json!({"created": "2024-01-02T01:00:00Z"})),
		];
		let result = compute_date(
			&json!({"field": "created", "fixed_interval": "1d"}),
			&hits,
			&[],
			&ctx(),
		)
		.unwrap();
		let buckets = result["buckets"].as_array().unwrap();
		assert_eq!(buckets.len(), 2);
		assert_eq!(buckets[0]["doc_count"], 2);
		assert_eq!(buckets[1]["doc_count"], 1);
	}

	#[test]
	fn date_histogram_accepts_epoch_millis() {
		let hits = vec![hit("1", json!({"created": 0})), hit("2", json!({"created": 3_600_000}))];
		let result = compute_date(
			&json!({"field": "created", "fixed_interval": "1h"}),
			&hits,
			&[],
			&ctx(),
		)
		.unwrap();
		let buckets = result["buckets"].as_array().unwrap();
		assert_eq!(buckets.len(), 2);
	}

	#[test]
	fn missing_interval_spec_is_rejected() {
		assert!(compute_date(&json!({"field": "created"}), &[], &[], &ctx()).is_err());
	}

	#[test]
	fn sub_aggregations_run_over_each_buckets_own_hits() {
		let hits = vec![hit("1", json!({"price": 5, "qty": 2})), hit("2", json!({"price": 6, "qty": 4}))];
		let sub_aggs = crate::aggregation::parse_aggs(&json!({"avg_qty": {"avg": {"field": "qty"}}})).unwrap();
		let result = compute(&json!({"field": "price", "interval": 10}), &hits, &sub_aggs, &ctx()).unwrap();
		let buckets = result["buckets"].as_array().unwrap();
		assert_eq!(buckets[0]["avg_qty"]["value"], 3.0);
	}
}
