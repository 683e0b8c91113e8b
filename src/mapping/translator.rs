use serde_json::{Map, Value};

use crate::EsError;
use crate::mapping::date_format::translate_format;
use crate::mapping::{EngineField, EngineFieldKind, EngineMapping};

const MAX_DEPTH: usize = 100;

pub struct MappingTranslator;

impl MappingTranslator {
	pub fn new() -> Self {
		Self
	}

	/// Translates a full ES mapping object (the value of `"mappings"`, or the
	/// bare mapping if the caller already unwrapped `_doc`) into an
	/// `EngineMapping`. Does not call out to the engine's own `Validate()` —
	/// that happens one layer up, once the handle is available.
	pub fn translate(&self, mapping: &Value) -> Result<EngineMapping, EsError> {
		let mut registry = HashRegistry::default();
		let properties = match mapping.get("properties").and_then(|p| p.as_object()) {
			Some(p) => p,
			None => return Ok(EngineMapping::default()),
		};
		self.collect_date_formats(properties, &mut registry, 0)?;
		let fields = self.translate_properties(properties, &registry, 0)?;
		Ok(EngineMapping {
			fields,
			date_parsers: registry.0,
		})
	}

	fn collect_date_formats(
		&self,
		properties: &Map<String, Value>,
		registry: &mut HashRegistry,
		depth: usize,
	) -> Result<(), EsError> {
		if depth > MAX_DEPTH {
			return Err(EsError::IllegalArgument(
				"mapping property tree exceeds maximum nesting depth".to_string(),
			));
		}
		for (_name, def) in properties {
			let def = def.as_object().ok_or_else(|| {
				EsError::IllegalArgument("field mapping definition must be an object".to_string())
			})?;
			let field_type = def.get("type").and_then(|t| t.as_str()).unwrap_or("");
			if field_type == "date" {
				if let Some(format) = def.get("format").and_then(|f| f.as_str()) {
					if !format.is_empty() && !registry.0.contains_key(format) {
						registry
							.0
							.insert(format.to_string(), translate_format(format));
					}
				}
			}
			if field_type == "object" || field_type == "nested" {
				if let Some(nested) = def.get("properties").and_then(|p| p.as_object()) {
					self.collect_date_formats(nested, registry, depth + 1)?;
				}
			}
		}
		Ok(())
	}

	fn translate_properties(
		&self,
		properties: &Map<String, Value>,
		registry: &HashRegistry,
		depth: usize,
	) -> Result<Vec<EngineField>, EsError> {
		if depth > MAX_DEPTH {
			return Err(EsError::IllegalArgument(
				"mapping property tree exceeds maximum nesting depth".to_string(),
			));
		}
		let mut fields = Vec::with_capacity(properties.len());
		for (name, def) in properties {
			let def = def.as_object().ok_or_else(|| {
				EsError::IllegalArgument(format!(
					"field mapping definition for {name:?} must be an object"
				))
			})?;
			if def.is_empty() {
				return Err(EsError::IllegalArgument(format!(
					"field mapping definition for {name:?} must not be empty"
				)));
			}
			fields.push(self.translate_field(name, def, registry, depth)?);
		}
		Ok(fields)
	}

	fn translate_field(
		&self,
		name: &str,
		def: &Map<String, Value>,
		registry: &HashRegistry,
		depth: usize,
	) -> Result<EngineField, EsError> {
		let field_type = def.get("type").and_then(|t| t.as_str()).unwrap_or("text");
		let index = def.get("index").and_then(|v| v.as_bool()).unwrap_or(true);
		let store = def.get("store").and_then(|v| v.as_bool()).unwrap_or(false);
		let doc_values = def
			.get("doc_values")
			.and_then(|v| v.as_bool())
			.unwrap_or(true);

		let kind = match field_type {
			"text" => {
				let analyzer = def
					.get("analyzer")
					.or_else(|| def.get("search_analyzer"))
					.and_then(|a| a.as_str())
					.map(|s| s.to_string());
				EngineFieldKind::Text { analyzer }
			}
			"keyword" => EngineFieldKind::Keyword,
			"long" | "integer" | "short" | "byte" | "double" | "float" => EngineFieldKind::Numeric,
			"boolean" => EngineFieldKind::Boolean,
			"date" => {
				let parser_name = def
					.get("format")
					.and_then(|f| f.as_str())
					.filter(|f| !f.is_empty())
					.filter(|f| registry.0.contains_key(*f))
					.map(|f| f.to_string());
				EngineFieldKind::DateTime { parser_name }
			}
			"object" | "nested" => {
				let nested_props = def.get("properties").and_then(|p| p.as_object());
				let nested_fields = match nested_props {
					Some(props) => self.translate_properties(props, registry, depth + 1)?,
					None => Vec::new(),
				};
				EngineFieldKind::Object {
					properties: nested_fields,
				}
			}
			"join" => EngineFieldKind::Keyword,
			"percolator" => {
				return Ok(EngineField {
					name: name.to_string(),
					kind: EngineFieldKind::Percolator,
					index: false,
					store: true,
					doc_values,
				});
			}
			_ => EngineFieldKind::Text { analyzer: None },
		};

		Ok(EngineField {
			name: name.to_string(),
			kind,
			index,
			store,
			doc_values,
		})
	}
}

impl Default for MappingTranslator {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Default)]
struct HashRegistry(std::collections::HashMap<String, String>);

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn translates_text_keyword_and_numeric_fields() {
		let translator = MappingTranslator::new();
		let mapping = json!({
			"properties": {
				"name": {"type": "text"},
				"tag": {"type": "keyword"},
				"age": {"type": "integer"}
			}
		});
		let engine_mapping = translator.translate(&mapping).unwrap();
		assert_eq!(engine_mapping.fields.len(), 3);
		let name = engine_mapping.fields.iter().find(|f| f.name == "name").unwrap();
		assert!(matches!(name.kind, EngineFieldKind::Text { .. }));
		let tag = engine_mapping.fields.iter().find(|f| f.name == "tag").unwrap();
		assert!(matches!(tag.kind, EngineFieldKind::Keyword));
		let age = engine_mapping.fields.iter().find(|f| f.name == "age").unwrap();
		assert!(matches!(age.kind, EngineFieldKind::Numeric));
	}

	#[test]
	fn text_field_falls_back_to_search_analyzer_when_analyzer_missing() {
		let translator = MappingTranslator::new();
		let mapping = json!({
			"properties": {
				"body": {"type": "text", "search_analyzer": "english"}
			}
		});
		let engine_mapping = translator.translate(&mapping).unwrap();
		match &engine_mapping.fields[0].kind {
			EngineFieldKind::Text { analyzer } => assert_eq!(analyzer.as_deref(), Some("english")),
			other => panic!("expected Text, got {other:?}"),
		}
	}

	#[test]
	fn date_field_registers_translated_parser() {
		let translator = MappingTranslator::new();
		let mapping = json!({
			"properties": {
				"created_at": {"type": "date", "format": "yyyy-MM-dd"}
			}
		});
		let engine_mapping = translator.translate(&mapping).unwrap();
		assert_eq!(
			engine_mapping.date_parsers.get("yyyy-MM-dd").map(String::as_str),
			Some("2006-01-02")
		);
		match &engine_mapping.fields[0].kind {
			EngineFieldKind::DateTime { parser_name } => {
				assert_eq!(parser_name.as_deref(), Some("yyyy-MM-dd"))
			}
			other => panic!("expected DateTime, got {other:?}"),
		}
	}

	#[test]
	fn nested_object_recurses_without_emitting_a_leaf_for_the_parent() {
		let translator = MappingTranslator::new();
		let mapping = json!({
			"properties": {
				"address": {
					"type": "object",
					"properties": {
						"city": {"type": "keyword"}
					}
				}
			}
		});
		let engine_mapping = translator.translate(&mapping).unwrap();
		assert_eq!(engine_mapping.fields.len(), 1);
		match &engine_mapping.fields[0].kind {
			EngineFieldKind::Object { properties } => {
				assert_eq!(properties.len(), 1);
				assert_eq!(properties[0].name, "city");
			}
			other => panic!("expected Object, got {other:?}"),
		}
	}

	#[test]
	fn join_field_becomes_a_keyword_leaf() {
		let translator = MappingTranslator::new();
		let mapping = json!({
			"properties": {
				"my_join": {"type": "join", "relations": {"question": "answer"}}
			}
		});
		let engine_mapping = translator.translate(&mapping).unwrap();
		assert!(matches!(engine_mapping.fields[0].kind, EngineFieldKind::Keyword));
	}

	#[test]
	fn percolator_field_is_stored_but_not_indexed() {
		let translator = MappingTranslator::new();
		let mapping = json!({
			"properties": {
				"query": {"type": "percolator"}
			}
		});
		let engine_mapping = translator.translate(&mapping).unwrap();
		let field = &engine_mapping.fields[0];
		assert!(matches!(field.kind, EngineFieldKind::Percolator));
		assert!(!field.index);
		assert!(field.store);
	}

	#[test]
	fn unknown_type_defaults_to_text() {
		let translator = MappingTranslator::new();
		let mapping = json!({"properties": {"mystery": {"type": "geo_point"}}});
		let engine_mapping = translator.translate(&mapping).unwrap();
		assert!(matches!(
			engine_mapping.fields[0].kind,
			EngineFieldKind::Text { .. }
		));
	}

	#[test]
	fn rejects_non_object_field_definition() {
		let translator = MappingTranslator::new();
		let mapping = json!({"properties": {"bad": "not-an-object"}});
		assert!(translator.translate(&mapping).is_err());
	}

	#[test]
	fn rejects_empty_field_definition() {
		let translator = MappingTranslator::new();
		let mapping = json!({"properties": {"bad": {}}});
		assert!(translator.translate(&mapping).is_err());
	}

	#[test]
	fn rejects_mapping_deeper_than_max_depth() {
		let translator = MappingTranslator::new();
		let mut current = json!({"type": "keyword"});
		for _ in 0..(MAX_DEPTH + 5) {
			current = json!({"type": "object", "properties": {"child": current}});
		}
		let mapping = json!({"properties": {"root": current}});
		let err = translator.translate(&mapping).unwrap_err();
		assert!(matches!(err, EsError::IllegalArgument(_)));
	}

	#[test]
	fn no_properties_translates_to_empty_mapping() {
		let translator = MappingTranslator::new();
		let engine_mapping = translator.translate(&json!({})).unwrap();
		assert!(engine_mapping.fields.is_empty());
	}
}
