//! `composite` bucket aggregation: multi-source terms pagination. Keys are
//! compared lexicographically across sources in declaration order; `after`
//! filters out every key lexicographically less than or equal to it.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::EsError;
use crate::aggregation::{AggContext, AggNode, execute_aggs, values::term_values};
use crate::engine::SearchHit;

struct SourceSpec {
	name: String,
	field: String,
	missing_bucket: bool,
}

type CompositeKey = Vec<Option<Value>>;

pub fn compute(
	config: &Value,
	hits: &[SearchHit],
	sub_aggs: &[(String, AggNode)],
	ctx: &AggContext,
) -> Result<Value, EsError> {
	let sources = parse_sources(config)?;
	let size = config
		.get("size")
		.and_then(|v| v.as_u64())
		.map(|v| v as usize)
		.unwrap_or(10);
	let after_key = config
		.get("after")
		.map(|after| decode_after(after, &sources))
		.transpose()?;

	let mut groups: HashMap<String, (CompositeKey, Vec<&SearchHit>)> = HashMap::new();
	for hit in hits {
		let Some(key) = composite_key_for_hit(hit, &sources) else {
			continue;
		};
		let encoded = encode_key_string(&key);
		groups.entry(encoded).or_insert_with(|| (key, Vec::new())).1.push(hit);
	}

	let mut ordered: Vec<(CompositeKey, Vec<&SearchHit>)> = groups.into_values().collect();
	ordered.sort_by(|a, b| compare_keys(&a.0, &b.0));

	if let Some(after_key) = &after_key {
		ordered.retain(|(key, _)| compare_keys(key, after_key) == Ordering::Greater);
	}

	let has_more = ordered.len() > size;
	let page: Vec<(CompositeKey, Vec<&SearchHit>)> = ordered.into_iter().take(size).collect();

	let mut buckets = Vec::with_capacity(page.len());
	let mut last_key = None;
	for (key, bucket_hits) in page {
		let owned: Vec<SearchHit> = bucket_hits.into_iter().cloned().collect();
		let key_json = key_to_json(&key, &sources);
		let mut bucket = json!({"key": key_json, "doc_count": owned.len()});
		let sub_results = execute_aggs(sub_aggs, &owned, ctx)?;
		let obj = bucket.as_object_mut().expect("constructed as object");
		for (name, value) in sub_results {
			obj.insert(name, value);
		}
		buckets.push(bucket);
		last_key = Some(key);
	}

	let mut response = json!({ "buckets": buckets });
	if has_more {
		if let Some(key) = last_key {
			response["after_key"] = key_to_json(&key, &sources);
		}
	}
	Ok(response)
}

fn parse_sources(config: &Value) -> Result<Vec<SourceSpec>, EsError> {
	let sources = config
		.get("sources")
		.and_then(|v| v.as_array())
		.ok_or_else(|| EsError::IllegalArgument("composite aggregation requires sources".to_string()))?;
	sources
		.iter()
		.map(|entry| {
			let obj = entry.as_object().ok_or_else(|| {
				EsError::IllegalArgument("composite source entry must be an object".to_string())
			})?;
			let (name, spec) = obj.iter().next().ok_or_else(|| {
				EsError::IllegalArgument("composite source entry must name one source".to_string())
			})?;
			let terms = spec
				.get("terms")
				.ok_or_else(|| EsError::IllegalArgument("composite source must be a terms source".to_string()))?;
			let field = terms
				.get("field")
				.and_then(|v| v.as_str())
				.ok_or_else(|| EsError::IllegalArgument("composite terms source requires a field".to_string()))?
				.to_string();
			let missing_bucket = terms
				.get("missing_bucket")
				.and_then(|v| v.as_bool())
				.unwrap_or(false);
			Ok(SourceSpec {
				name: name.clone(),
				field,
				missing_bucket,
			})
		})
		.collect()
}

fn composite_key_for_hit(hit: &SearchHit, sources: &[SourceSpec]) -> Option<CompositeKey> {
	let mut key = Vec::with_capacity(sources.len());
	for source in sources {
		let values = term_values(&hit.source, &source.field);
		match values.into_iter().next() {
			Some(v) => key.push(Some(v)),
			None if source.missing_bucket => key.push(None),
			None => return None,
		}
	}
	Some(key)
}

fn compare_keys(a: &CompositeKey, b: &CompositeKey) -> Ordering {
	for (x, y) in a.iter().zip(b.iter()) {
		let ord = match (x, y) {
			(None, None) => Ordering::Equal,
			(None, Some(_)) => Ordering::Less,
			(Some(_), None) => Ordering::Greater,
			(Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
		};
		if ord != Ordering::Equal {
			return ord;
		}
	}
	Ordering::Equal
}

fn encode_key_string(key: &CompositeKey) -> String {
	key.iter()
		.map(|v| v.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "\0".to_string()))
		.collect::<Vec<_>>()
		.join("\u{1}")
}

fn key_to_json(key: &CompositeKey, sources: &[SourceSpec]) -> Value {
	let mut obj = Map::new();
	for (source, value) in sources.iter().zip(key.iter()) {
		obj.insert(source.name.clone(), value.clone().unwrap_or(Value::Null));
	}
	Value::Object(obj)
}

fn decode_after(after: &Value, sources: &[SourceSpec]) -> Result<CompositeKey, EsError> {
	let obj = after
		.as_object()
		.ok_or_else(|| EsError::IllegalArgument("composite after must be an object".to_string()))?;
	sources
		.iter()
		.map(|source| {
			Ok(match obj.get(&source.name) {
				Some(Value::Null) | None => None,
				Some(v) => Some(v.clone()),
			})
		})
		.collect()
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

	fn hit(id: &str, tag: &str) -> SearchHit {
		SearchHit {
			id: id.to_string(),
			score: 1.0,
			source: json!({"tag": tag}),
		}
	}

	fn config(size: u64) -> Value {
		json!({"size": size, "sources": [{"by_tag": {"terms": {"field": "tag"}}}]})
	}

	#[test]
	fn pages_through_every_bucket_exactly_once() {
		let hits = vec![hit("1", "a"), hit("2", "b"), hit("3", "c")];
		let first = compute(&config(2), &hits, &[], &ctx()).unwrap();
		assert_eq!(first["buckets"].as_array().unwrap().len(), 2);
		let after_key = first["after_key"].clone();
		assert!(!after_key.is_null());

		let mut page2_config = config(2);
		page2_config["after"] = after_key;
		let second = compute(&page2_config, &hits, &[], &ctx()).unwrap();
		assert_eq!(second["buckets"].as_array().unwrap().len(), 1);
		assert!(second.get("after_key").is_none());
	}

	#[test]
	fn no_after_key_when_the_first_page_is_exhaustive() {
		let hits = vec![hit("1", "a"), hit("2", "b")];
		let result = compute(&config(10), &hits, &[], &ctx()).unwrap();
		assert_eq!(result["buckets"].as_array().unwrap().len(), 2);
		assert!(result.get("after_key").is_none());
	}

	#[test]
	fn missing_value_without_missing_bucket_is_excluded() {
		let hits = vec![hit("1", "a"), SearchHit { id: "2".to_string(), score: 1.0, source: json!({}) }];
		let result = compute(&config(10), &hits, &[], &ctx()).unwrap();
		assert_eq!(result["buckets"].as_array().unwrap().len(), 1);
	}
}
