//! # Aggregation Engine
//!
//! ## Purpose
//! Everything under a search request's `aggs` (alias `aggregations`) object:
//! parsing the name -> spec map into a typed tree, and executing it over the
//! hit set a single engine search already produced. Query compilation itself
//! is out of scope here — see `crate::query`.
//!
//! ## Mental model
//! One engine search returns every hit the aggregation tree needs (`size:0`
//! empties the returned `hits` array but keeps `total`). Metric kinds reduce
//! a hit set to a scalar; bucket kinds partition a hit set into named
//! sub-sets, each of which recurses through the same `execute_aggs` entry
//! point for its own sub-aggregations. `bucket_script` is special: it reads
//! sibling results already computed at the same level rather than hits, so
//! it always runs in a second pass after every other aggregation at that
//! level has a result.
//!
//! ## Key types
//! | Type | Description |
//! | --- | --- |
//! | `AggNode` | One parsed aggregation: its kind, config, and sub-aggs. |
//! | `AggContext` | Shared collaborators every aggregation kind may need. |

pub mod bucket_filter_nested;
pub mod bucket_histogram;
pub mod bucket_range;
pub mod bucket_terms;
pub mod composite;
pub mod metrics;
pub mod scripted;
pub mod values;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::EsError;
use crate::engine::{ScriptEngine, SearchHit};

#[derive(Debug, Clone)]
pub struct AggNode {
	pub kind: String,
	pub config: Value,
	pub sub_aggs: Vec<(String, AggNode)>,
}

pub struct AggContext {
	pub script_engine: Arc<dyn ScriptEngine>,
}

const METRIC_KINDS: &[&str] = &["avg", "sum", "min", "max", "stats", "cardinality"];

/// Parses the `aggs`/`aggregations` name -> spec map into a tree of
/// `AggNode`s. Each spec object must carry exactly one key that isn't
/// `aggs`/`aggregations` — that key names the aggregation kind.
pub fn parse_aggs(spec: &Value) -> Result<Vec<(String, AggNode)>, EsError> {
	let obj = spec
		.as_object()
		.ok_or_else(|| EsError::IllegalArgument("aggs must be an object".to_string()))?;
	let mut nodes = Vec::with_capacity(obj.len());
	for (name, node_spec) in obj {
		nodes.push((name.clone(), parse_node(node_spec)?));
	}
	Ok(nodes)
}

fn parse_node(node_spec: &Value) -> Result<AggNode, EsError> {
	let obj = node_spec
		.as_object()
		.ok_or_else(|| EsError::IllegalArgument("aggregation spec must be an object".to_string()))?;
	let mut kind = None;
	let mut config = None;
	let mut sub_aggs = Vec::new();
	for (key, value) in obj {
		match key.as_str() {
			"aggs" | "aggregations" => {
				sub_aggs = parse_aggs(value)?;
			}
			_ => {
				if kind.is_some() {
					return Err(EsError::IllegalArgument(
						"aggregation spec must name exactly one kind".to_string(),
					));
				}
				kind = Some(key.clone());
				config = Some(value.clone());
			}
		}
	}
	let kind = kind.ok_or_else(|| {
		EsError::IllegalArgument("aggregation spec must name exactly one kind".to_string())
	})?;
	Ok(AggNode {
		kind,
		config: config.unwrap_or(Value::Null),
		sub_aggs,
	})
}

/// Executes a parsed aggregation tree over `hits`, returning the ES-shaped
/// `name -> result` map for embedding under `"aggregations"`.
pub fn execute_aggs(
	nodes: &[(String, AggNode)],
	hits: &[SearchHit],
	ctx: &AggContext,
) -> Result<Map<String, Value>, EsError> {
	let mut results = Map::new();
	for (name, node) in nodes {
		if node.kind == "bucket_script" {
			continue;
		}
		results.insert(name.clone(), execute_single(node, hits, ctx)?);
	}
	for (name, node) in nodes {
		if node.kind != "bucket_script" {
			continue;
		}
		let value = scripted::compute_bucket_script(&node.config, &results, ctx)?;
		results.insert(name.clone(), value);
	}
	Ok(results)
}

fn execute_single(node: &AggNode, hits: &[SearchHit], ctx: &AggContext) -> Result<Value, EsError> {
	if METRIC_KINDS.contains(&node.kind.as_str()) {
		return metrics::compute(&node.kind, &node.config, hits);
	}
	match node.kind.as_str() {
		"terms" => bucket_terms::compute(&node.config, hits, &node.sub_aggs, ctx),
		"range" => bucket_range::compute(&node.config, hits, &node.sub_aggs, ctx),
		"histogram" => bucket_histogram::compute(&node.config, hits, &node.sub_aggs, ctx),
		"date_histogram" => bucket_histogram::compute_date(&node.config, hits, &node.sub_aggs, ctx),
		"filter" => bucket_filter_nested::compute_filter(&node.config, hits, &node.sub_aggs, ctx),
		"nested" => bucket_filter_nested::compute_nested(&node.config, hits, &node.sub_aggs, ctx),
		"composite" => composite::compute(&node.config, hits, &node.sub_aggs, ctx),
		"scripted_metric" => scripted::compute_scripted_metric(&node.config, hits, ctx),
		other => Err(EsError::IllegalArgument(format!(
			"unsupported aggregation: {other}"
		))),
	}
}
