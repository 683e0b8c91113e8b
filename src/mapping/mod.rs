//! # Mapping Translator
//!
//! ## Purpose
//! Produces an engine-side `EngineMapping` from an ES mapping object, without
//! ever losing the original bytes — the ES-format mapping persisted by the
//! Index Lifecycle Controller remains the sole source of truth for
//! `GET /{index}` responses; what this module produces is derived and
//! disposable.
//!
//! ## Mental model
//! Translation is two-phase. First, `collect_date_formats` walks the mapping
//! tree collecting every unique ES date format string and translating it to
//! the engine's date-parser grammar (`date_format::translate_format`).
//! Second, `translate` walks the tree again, this time producing one
//! `EngineField` per leaf, consulting the date-format registry built in phase
//! one for `date` fields.
//!
//! ## Invariants
//! - `object`/`nested` property trees are strictly tree-shaped; recursion is
//!   still bounded (`MAX_DEPTH`) and fails with `illegal_argument_exception`
//!   beyond it, since a malicious or buggy caller could otherwise exhaust the
//!   stack.
//!   - Tested by: `translator::tests::rejects_mapping_deeper_than_max_depth`.
//! - An empty or non-object field definition is rejected rather than
//!   defaulted.
//!   - Tested by: `translator::tests::rejects_non_object_field_definition`.

pub mod date_format;
pub mod translator;

use std::collections::{HashMap, HashSet};

pub use translator::MappingTranslator;

/// Parent-type -> child-type relations for ES's `join` field emulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinRelations {
	pub field: String,
	pub relations: HashMap<String, HashSet<String>>,
}

impl JoinRelations {
	/// Extracts a `JoinRelations` from a top-level mapping object's
	/// `properties`, if any property has `"type": "join"`. ES only supports
	/// one join field per index, so the first one found wins.
	pub fn extract(mapping: &serde_json::Value) -> Option<JoinRelations> {
		let properties = mapping.get("properties")?.as_object()?;
		for (field_name, def) in properties {
			let def = def.as_object()?;
			if def.get("type").and_then(|t| t.as_str()) != Some("join") {
				continue;
			}
			let mut relations = HashMap::new();
			if let Some(rel_obj) = def.get("relations").and_then(|r| r.as_object()) {
				for (parent, children) in rel_obj {
					let child_set: HashSet<String> = match children {
						serde_json::Value::String(s) => [s.clone()].into_iter().collect(),
						serde_json::Value::Array(arr) => arr
							.iter()
							.filter_map(|v| v.as_str().map(|s| s.to_string()))
							.collect(),
						_ => HashSet::new(),
					};
					relations.insert(parent.clone(), child_set);
				}
			}
			return Some(JoinRelations {
				field: field_name.clone(),
				relations,
			});
		}
		None
	}
}

/// A translated, engine-side field. Disposable: rebuilt from the persisted
/// ES mapping on every `IndexManager::open_index` call.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineField {
	pub name: String,
	pub kind: EngineFieldKind,
	pub index: bool,
	pub store: bool,
	pub doc_values: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineFieldKind {
	Text { analyzer: Option<String> },
	Keyword,
	Numeric,
	Boolean,
	DateTime { parser_name: Option<String> },
	Object { properties: Vec<EngineField> },
	Percolator,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineMapping {
	pub fields: Vec<EngineField>,
	/// original ES format string -> translated engine layout, keyed for
	/// lookup by the parser name registered against each `date` field.
	pub date_parsers: HashMap<String, String>,
}
