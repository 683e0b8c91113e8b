use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mapping::JoinRelations;

/// Everything persisted for one index. The ES-format `mapping` and `settings`
/// objects are the sole source of truth for wire-shaped responses; any
/// engine-side translated mapping is derived from `mapping` on demand and
/// never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
	pub name: String,
	pub mapping: serde_json::Value,
	pub settings: serde_json::Value,
	pub aliases: Vec<String>,
	pub join_relations: Option<JoinRelationsDto>,
	pub version: u64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Serializable mirror of `JoinRelations` (whose `relations` map uses
/// `HashSet` values, which round-trip fine through serde but are kept as a
/// distinct DTO so the in-memory type isn't coupled to its wire shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRelationsDto {
	pub field: String,
	pub relations: std::collections::HashMap<String, Vec<String>>,
}

impl From<JoinRelations> for JoinRelationsDto {
	fn from(j: JoinRelations) -> Self {
		JoinRelationsDto {
			field: j.field,
			relations: j
				.relations
				.into_iter()
				.map(|(k, v)| (k, v.into_iter().collect()))
				.collect(),
		}
	}
}

impl IndexMetadata {
	pub fn new(name: String, mapping: serde_json::Value, settings: serde_json::Value) -> Self {
		let join_relations = JoinRelations::extract(&mapping).map(JoinRelationsDto::from);
		let now = Utc::now();
		IndexMetadata {
			name,
			mapping,
			settings,
			aliases: Vec::new(),
			join_relations,
			version: 1,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn add_alias(&mut self, alias: &str) -> bool {
		if self.aliases.iter().any(|a| a == alias) {
			return false;
		}
		self.aliases.push(alias.to_string());
		true
	}

	pub fn remove_alias(&mut self, alias: &str) -> bool {
		let before = self.aliases.len();
		self.aliases.retain(|a| a != alias);
		self.aliases.len() != before
	}

	pub fn touch(&mut self) {
		self.updated_at = Utc::now();
		self.version += 1;
	}
}

/// Deep-copies a JSON subtree via serialize + parse, per the spec's
/// "serialize then parse" contract: the stored mapping must survive later
/// mutation of the caller's object graph. Falls back to a plain `.clone()`
/// on the (practically unreachable) event that re-serializing a `Value` we
/// just parsed somehow fails.
pub fn deep_copy(value: &serde_json::Value) -> serde_json::Value {
	match serde_json::to_vec(value) {
		Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|_| value.clone()),
		Err(_) => value.clone(),
	}
}

/// Wraps a mapping in `{"_doc": ...}` unless it already carries a top-level
/// type key (i.e. it was imported from ES 6 and already has its own type
/// name), matching ES 7's `_doc` wire-compatibility shim.
pub fn wrap_mapping_for_response(mapping: &serde_json::Value) -> serde_json::Value {
	let is_typeless = mapping
		.as_object()
		.map(|o| o.contains_key("properties") || o.contains_key("dynamic_templates"))
		.unwrap_or(false);
	if is_typeless {
		serde_json::json!({ "_doc": mapping })
	} else {
		mapping.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn deep_copy_produces_independent_value() {
		let original = json!({"a": 1});
		let copy = deep_copy(&original);
		assert_eq!(copy, original);
	}

	#[test]
	fn wraps_typeless_mapping_in_doc() {
		let mapping = json!({"properties": {"name": {"type": "text"}}});
		let wrapped = wrap_mapping_for_response(&mapping);
		assert_eq!(wrapped, json!({"_doc": mapping}));
	}

	#[test]
	fn does_not_wrap_mapping_with_explicit_type_key() {
		let mapping = json!({"my_type": {"properties": {"name": {"type": "text"}}}});
		let wrapped = wrap_mapping_for_response(&mapping);
		assert_eq!(wrapped, mapping);
	}

	#[test]
	fn add_alias_is_idempotent() {
		let mut meta = IndexMetadata::new("idx".to_string(), json!({}), json!({}));
		assert!(meta.add_alias("a"));
		assert!(!meta.add_alias("a"));
		assert_eq!(meta.aliases, vec!["a".to_string()]);
	}

	#[test]
	fn new_extracts_join_relations_when_present() {
		let mapping = json!({
			"properties": {
				"my_join": {"type": "join", "relations": {"question": "answer"}}
			}
		});
		let meta = IndexMetadata::new("idx".to_string(), mapping, json!({}));
		assert!(meta.join_relations.is_some());
		assert_eq!(meta.join_relations.unwrap().field, "my_join");
	}
}
