//! # Query DSL Compiler
//!
//! ## Purpose
//! Compiles the ES Query DSL (`query` sub-object of a search request) into a
//! small typed tree an `EngineIndex` can execute. Per the crate's scope, the
//! real compiler lives with the embedded engine; this module defines the
//! `CompiledQuery` shape both sides agree on and ships one reference
//! `QueryParser` covering the subset of the DSL exercised by this crate's own
//! tests (`match_all`, `match`, `term`, `range`, `bool`, `nested`).
//!
//! ## Key types
//! | Type | Description |
//! | --- | --- |
//! | `CompiledQuery` | The engine-query tree. |
//! | `SimpleQueryParser` | Reference `QueryParser` implementation. |

use serde_json::Value;

use crate::EsError;
use crate::engine::QueryParser;

#[derive(Debug, Clone)]
pub enum CompiledQuery {
	MatchAll,
	MatchNone,
	Term {
		field: String,
		value: Value,
	},
	Match {
		field: String,
		text: String,
	},
	Range {
		field: String,
		gte: Option<f64>,
		gt: Option<f64>,
		lte: Option<f64>,
		lt: Option<f64>,
	},
	Bool {
		must: Vec<CompiledQuery>,
		should: Vec<CompiledQuery>,
		must_not: Vec<CompiledQuery>,
		filter: Vec<CompiledQuery>,
	},
	Nested {
		path: String,
		query: Box<CompiledQuery>,
	},
	/// A plain `q=...` query-string search or `simple_query_string`, matched
	/// as a case-insensitive substring over every string leaf of the document.
	QueryString {
		text: String,
	},
}

/// Evaluates a document for membership in a compiled query. Used both by the
/// in-memory reference engine's `search` and by the aggregation engine's
/// `filter`/`nested` buckets, which re-evaluate a query over an
/// already-fetched hit set rather than asking the engine again. Scoring is
/// intentionally out of scope here (binary match/no-match); ranking is the
/// engine's concern.
pub fn matches_query(query: &CompiledQuery, doc: &Value) -> bool {
	match query {
		CompiledQuery::MatchAll => true,
		CompiledQuery::MatchNone => false,
		CompiledQuery::Term { field, value } => field_value(doc, field)
			.map(|v| json_eq_loose(v, value))
			.unwrap_or(false),
		CompiledQuery::Match { field, text } => field_value(doc, field)
			.and_then(|v| v.as_str())
			.map(|s| {
				let s = s.to_lowercase();
				text.to_lowercase().split_whitespace().any(|term| s.contains(term))
			})
			.unwrap_or(false),
		CompiledQuery::Range { field, gte, gt, lte, lt } => field_value(doc, field)
			.and_then(|v| v.as_f64())
			.map(|n| {
				gte.map_or(true, |b| n >= b)
					&& gt.map_or(true, |b| n > b)
					&& lte.map_or(true, |b| n <= b)
					&& lt.map_or(true, |b| n < b)
			})
			.unwrap_or(false),
		CompiledQuery::Bool {
			must,
			should,
			must_not,
			filter,
		} => {
			if must.iter().any(|q| !matches_query(q, doc)) {
				return false;
			}
			if filter.iter().any(|q| !matches_query(q, doc)) {
				return false;
			}
			if must_not.iter().any(|q| matches_query(q, doc)) {
				return false;
			}
			if !should.is_empty() && !must.is_empty() {
				// `should` only narrows results when there is no `must`/`filter`.
				return true;
			}
			should.is_empty() || should.iter().any(|q| matches_query(q, doc))
		}
		CompiledQuery::Nested { path, query } => field_value(doc, path)
			.and_then(|v| v.as_array())
			.map(|arr| arr.iter().any(|item| matches_query(query, item)))
			.unwrap_or(false),
		CompiledQuery::QueryString { text } => {
			let needle = text.to_lowercase();
			contains_substring(doc, &needle)
		}
	}
}

pub fn field_value<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
	let mut current = doc;
	for part in field.split('.') {
		current = current.get(part)?;
	}
	Some(current)
}

fn json_eq_loose(a: &Value, b: &Value) -> bool {
	if a == b {
		return true;
	}
	match (a.as_str(), b.as_str()) {
		(Some(a), Some(b)) => a == b,
		_ => a.to_string() == b.to_string(),
	}
}

fn contains_substring(value: &Value, needle: &str) -> bool {
	match value {
		Value::String(s) => s.to_lowercase().contains(needle),
		Value::Array(items) => items.iter().any(|v| contains_substring(v, needle)),
		Value::Object(map) => map.values().any(|v| contains_substring(v, needle)),
		_ => false,
	}
}

pub struct SimpleQueryParser;

impl SimpleQueryParser {
	pub fn new() -> Self {
		Self
	}

	pub fn compile(&self, json: &Value) -> Result<CompiledQuery, EsError> {
		let obj = match json {
			Value::Null => return Ok(CompiledQuery::MatchAll),
			Value::Object(o) if o.is_empty() => return Ok(CompiledQuery::MatchAll),
			Value::Object(o) => o,
			_ => {
				return Err(EsError::Parsing(
					"query must be a JSON object".to_string(),
				));
			}
		};
		if obj.len() != 1 {
			return Err(EsError::IllegalArgument(
				"query object must have exactly one top-level clause".to_string(),
			));
		}
		let (kind, body) = obj.iter().next().expect("checked len == 1");
		match kind.as_str() {
			"match_all" => Ok(CompiledQuery::MatchAll),
			"match_none" => Ok(CompiledQuery::MatchNone),
			"term" => self.compile_term(body),
			"match" => self.compile_match(body),
			"range" => self.compile_range(body),
			"bool" => self.compile_bool(body),
			"nested" => self.compile_nested(body),
			other => Err(EsError::IllegalArgument(format!(
				"unsupported query clause: {other}"
			))),
		}
	}

	fn single_field<'a>(&self, body: &'a Value) -> Result<(&'a String, &'a Value), EsError> {
		let obj = body
			.as_object()
			.ok_or_else(|| EsError::IllegalArgument("clause body must be an object".to_string()))?;
		obj.iter().next().ok_or_else(|| {
			EsError::IllegalArgument("clause body must name exactly one field".to_string())
		})
	}

	fn compile_term(&self, body: &Value) -> Result<CompiledQuery, EsError> {
		let (field, value) = self.single_field(body)?;
		let value = if let Some(v) = value.get("value") {
			v.clone()
		} else {
			value.clone()
		};
		Ok(CompiledQuery::Term {
			field: field.clone(),
			value,
		})
	}

	fn compile_match(&self, body: &Value) -> Result<CompiledQuery, EsError> {
		let (field, value) = self.single_field(body)?;
		let text = if let Some(q) = value.get("query") {
			q.as_str().map(|s| s.to_string())
		} else {
			value.as_str().map(|s| s.to_string())
		}
		.ok_or_else(|| EsError::IllegalArgument("match clause needs a string query".to_string()))?;
		Ok(CompiledQuery::Match {
			field: field.clone(),
			text,
		})
	}

	fn compile_range(&self, body: &Value) -> Result<CompiledQuery, EsError> {
		let (field, bounds) = self.single_field(body)?;
		let num = |key: &str| bounds.get(key).and_then(|v| v.as_f64());
		Ok(CompiledQuery::Range {
			field: field.clone(),
			gte: num("gte"),
			gt: num("gt"),
			lte: num("lte"),
			lt: num("lt"),
		})
	}

	fn compile_bool(&self, body: &Value) -> Result<CompiledQuery, EsError> {
		let one_or_many = |key: &str| -> Result<Vec<CompiledQuery>, EsError> {
			match body.get(key) {
				None => Ok(Vec::new()),
				Some(Value::Array(items)) => {
					items.iter().map(|q| self.compile(q)).collect()
				}
				Some(single) => Ok(vec![self.compile(single)?]),
			}
		};
		Ok(CompiledQuery::Bool {
			must: one_or_many("must")?,
			should: one_or_many("should")?,
			must_not: one_or_many("must_not")?,
			filter: one_or_many("filter")?,
		})
	}

	fn compile_nested(&self, body: &Value) -> Result<CompiledQuery, EsError> {
		let path = body
			.get("path")
			.and_then(|v| v.as_str())
			.ok_or_else(|| EsError::IllegalArgument("nested query needs a path".to_string()))?
			.to_string();
		let inner = body
			.get("query")
			.ok_or_else(|| EsError::IllegalArgument("nested query needs a query".to_string()))?;
		Ok(CompiledQuery::Nested {
			path,
			query: Box::new(self.compile(inner)?),
		})
	}
}

impl Default for SimpleQueryParser {
	fn default() -> Self {
		Self::new()
	}
}

impl QueryParser for SimpleQueryParser {
	fn parse_query(&self, json: &Value) -> Result<CompiledQuery, EsError> {
		self.compile(json)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_query_is_match_all() {
		let parser = SimpleQueryParser::new();
		let compiled = parser.compile(&serde_json::json!({})).unwrap();
		assert!(matches!(compiled, CompiledQuery::MatchAll));
	}

	#[test]
	fn match_clause_extracts_field_and_text() {
		let parser = SimpleQueryParser::new();
		let compiled = parser
			.compile(&serde_json::json!({"match": {"name": "apple"}}))
			.unwrap();
		match compiled {
			CompiledQuery::Match { field, text } => {
				assert_eq!(field, "name");
				assert_eq!(text, "apple");
			}
			other => panic!("expected Match, got {other:?}"),
		}
	}

	#[test]
	fn range_clause_collects_bounds() {
		let parser = SimpleQueryParser::new();
		let compiled = parser
			.compile(&serde_json::json!({"range": {"price": {"gte": 10.0, "lt": 20.0}}}))
			.unwrap();
		match compiled {
			CompiledQuery::Range { field, gte, lt, .. } => {
				assert_eq!(field, "price");
				assert_eq!(gte, Some(10.0));
				assert_eq!(lt, Some(20.0));
			}
			other => panic!("expected Range, got {other:?}"),
		}
	}

	#[test]
	fn bool_clause_normalizes_single_items_to_vec() {
		let parser = SimpleQueryParser::new();
		let compiled = parser
			.compile(&serde_json::json!({"bool": {"must": {"match_all": {}}}}))
			.unwrap();
		match compiled {
			CompiledQuery::Bool { must, .. } => assert_eq!(must.len(), 1),
			other => panic!("expected Bool, got {other:?}"),
		}
	}

	#[test]
	fn multi_key_clause_body_is_rejected() {
		let parser = SimpleQueryParser::new();
		let err = parser
			.compile(&serde_json::json!({"match": {}, "term": {}}))
			.unwrap_err();
		assert!(matches!(err, EsError::IllegalArgument(_)));
	}

	#[test]
	fn match_all_matches_every_document() {
		assert!(matches_query(&CompiledQuery::MatchAll, &serde_json::json!({})));
	}

	#[test]
	fn bool_must_not_excludes_matching_documents() {
		let query = CompiledQuery::Bool {
			must: vec![],
			should: vec![],
			must_not: vec![CompiledQuery::Term {
				field: "status".to_string(),
				value: serde_json::json!("deleted"),
			}],
			filter: vec![],
		};
		assert!(!matches_query(&query, &serde_json::json!({"status": "deleted"})));
		assert!(matches_query(&query, &serde_json::json!({"status": "active"})));
	}

	#[test]
	fn query_string_matches_any_nested_string_leaf() {
		let query = CompiledQuery::QueryString {
			text: "widget".to_string(),
		};
		assert!(matches_query(&query, &serde_json::json!({"nested": {"name": "Blue Widget"}})));
	}
}
