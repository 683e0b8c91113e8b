//! `scripted_metric` and `bucket_script`: the two aggregation kinds that
//! delegate to the external `ScriptEngine` instead of computing directly.

use serde_json::{Map, Value, json};

use crate::EsError;
use crate::aggregation::AggContext;
use crate::engine::{ScriptContext, ScriptPhase, SearchHit};

/// Runs `init_script` once, `map_script` once per hit threading `state`
/// through, `combine_script` once over the final state, and `reduce_script`
/// once over the (single-shard) list of combine results.
pub fn compute_scripted_metric(
	config: &Value,
	hits: &[SearchHit],
	ctx: &AggContext,
) -> Result<Value, EsError> {
	let params = config.get("params").cloned().unwrap_or_else(|| json!({}));
	let script = |key: &str| -> Result<&str, EsError> {
		config
			.get(key)
			.and_then(|v| v.as_str())
			.ok_or_else(|| EsError::IllegalArgument(format!("scripted_metric requires {key}")))
	};

	let mut state = ctx
		.script_engine
		.execute(
			script("init_script")?,
			&ScriptContext {
				phase: Some(ScriptPhase::Init),
				state: Value::Null,
				params: params.clone(),
				doc: None,
				vars: Default::default(),
			},
		)
		.map_err(EsError::from)?;

	let map_script = script("map_script")?;
	for hit in hits {
		state = ctx
			.script_engine
			.execute(
				map_script,
				&ScriptContext {
					phase: Some(ScriptPhase::Map),
					state,
					params: params.clone(),
					doc: Some(hit.source.clone()),
					vars: Default::default(),
				},
			)
			.map_err(EsError::from)?;
	}

	let combine_result = ctx
		.script_engine
		.execute(
			script("combine_script")?,
			&ScriptContext {
				phase: Some(ScriptPhase::Combine),
				state,
				params: params.clone(),
				doc: None,
				vars: Default::default(),
			},
		)
		.map_err(EsError::from)?;

	// Single shard: the reduce phase receives a one-element list of combine
	// results, matching ES's cross-shard reduce contract.
	let reduce_result = ctx
		.script_engine
		.execute(
			script("reduce_script")?,
			&ScriptContext {
				phase: Some(ScriptPhase::Reduce),
				state: json!([combine_result]),
				params,
				doc: None,
				vars: Default::default(),
			},
		)
		.map_err(EsError::from)?;

	Ok(json!({"value": reduce_result}))
}

/// Resolves `buckets_path` entries against sibling aggregation results
/// already computed at the same tree level, then invokes `script` with them
/// bound under `params`. A gap (missing sibling value) is resolved per
/// `gap_policy`: `skip` (default) omits the bucket's result entirely,
/// `insert_zeros` substitutes `0`.
pub fn compute_bucket_script(
	config: &Value,
	siblings: &Map<String, Value>,
	ctx: &AggContext,
) -> Result<Value, EsError> {
	let buckets_path = config
		.get("buckets_path")
		.and_then(|v| v.as_object())
		.ok_or_else(|| EsError::IllegalArgument("bucket_script requires buckets_path".to_string()))?;
	let gap_policy = config
		.get("gap_policy")
		.and_then(|v| v.as_str())
		.unwrap_or("skip");
	let script = config
		.get("script")
		.and_then(|v| v.as_str())
		.ok_or_else(|| EsError::IllegalArgument("bucket_script requires a script".to_string()))?;

	let mut params = Map::new();
	for (var, path) in buckets_path {
		let path = path
			.as_str()
			.ok_or_else(|| EsError::IllegalArgument("buckets_path entries must be strings".to_string()))?;
		match resolve_buckets_path(siblings, path) {
			Some(value) => {
				params.insert(var.clone(), value);
			}
			None if gap_policy == "insert_zeros" => {
				params.insert(var.clone(), json!(0));
			}
			None => return Ok(Value::Null),
		}
	}

	let result = ctx
		.script_engine
		.execute(
			script,
			&ScriptContext {
				phase: Some(crate::engine::ScriptPhase::BucketScript),
				state: Value::Null,
				params: Value::Object(params),
				doc: None,
				vars: Default::default(),
			},
		)
		.map_err(EsError::from)?;
	Ok(json!({"value": result}))
}

fn resolve_buckets_path(siblings: &Map<String, Value>, path: &str) -> Option<Value> {
	let mut parts = path.split('.');
	let mut current = siblings.get(parts.next()?)?.clone();
	for part in parts {
		current = current.get(part)?.clone();
	}
	Some(current)
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

	fn hit(id: &str) -> SearchHit {
		SearchHit {
			id: id.to_string(),
			score: 1.0,
			source: json!({}),
		}
	}

	#[test]
	fn scripted_metric_counts_hits_through_init_map_combine_reduce() {
		let hits = vec![hit("1"), hit("2"), hit("3")];
		let config = json!({
			"init_script": "0",
			"map_script": "state + 1",
			"combine_script": "state",
			"reduce_script": "sum(state)",
		});
		let result = compute_scripted_metric(&config, &hits, &ctx()).unwrap();
		assert_eq!(result["value"], 3.0);
	}

	#[test]
	fn bucket_script_adds_two_sibling_metrics() {
		let mut siblings = Map::new();
		siblings.insert("total_sales".to_string(), json!({"value": 100.0}));
		siblings.insert("total_tax".to_string(), json!({"value": 8.0}));
		let config = json!({
			"buckets_path": {"a": "total_sales.value", "b": "total_tax.value"},
			"script": "params.a + params.b",
		});
		let result = compute_bucket_script(&config, &siblings, &ctx()).unwrap();
		assert_eq!(result["value"], 108.0);
	}

	#[test]
	fn bucket_script_skips_on_gap_by_default() {
		let siblings = Map::new();
		let config = json!({
			"buckets_path": {"a": "missing.value"},
			"script": "params.a",
		});
		let result = compute_bucket_script(&config, &siblings, &ctx()).unwrap();
		assert!(result.is_null());
	}

	#[test]
	fn bucket_script_inserts_zero_when_gap_policy_says_so() {
		let siblings = Map::new();
		let config = json!({
			"buckets_path": {"a": "missing.value"},
			"script": "params.a",
			"gap_policy": "insert_zeros",
		});
		let result = compute_bucket_script(&config, &siblings, &ctx()).unwrap();
		assert_eq!(result["value"], 0);
	}
}
