//! Extracts aggregation input values from a hit's source document. Per the
//! "dynamic typing of source documents" design note: probe types and skip
//! mismatches rather than fail the request.

use serde_json::Value;

/// Numeric values for `field`, flattening arrays and skipping non-numeric
/// leaves (string numerics are accepted, matching ES's lenient field-data
/// coercion).
pub fn numeric_values(doc: &Value, field: &str) -> Vec<f64> {
	let mut out = Vec::new();
	collect_numeric(field_value(doc, field), &mut out);
	out
}

fn collect_numeric(value: Option<&Value>, out: &mut Vec<f64>) {
	match value {
		Some(Value::Number(n)) => {
			if let Some(f) = n.as_f64() {
				out.push(f);
			}
		}
		Some(Value::String(s)) => {
			if let Ok(f) = s.parse::<f64>() {
				out.push(f);
			}
		}
		Some(Value::Array(items)) => {
			for item in items {
				collect_numeric(Some(item), out);
			}
		}
		_ => {}
	}
}

/// A single bucketable "term" value for `terms`/`composite` sources:
/// strings pass through, numbers and bools render via their JSON text form,
/// arrays contribute one value per element, everything else is skipped.
pub fn term_values(doc: &Value, field: &str) -> Vec<Value> {
	let mut out = Vec::new();
	collect_terms(field_value(doc, field), &mut out);
	out
}

fn collect_terms(value: Option<&Value>, out: &mut Vec<Value>) {
	match value {
		Some(Value::Array(items)) => {
			for item in items {
				collect_terms(Some(item), out);
			}
		}
		Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => out.push(v.clone()),
		_ => {}
	}
}

pub fn field_value<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
	let mut current = doc;
	for part in field.split('.') {
		current = current.get(part)?;
	}
	Some(current)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn numeric_values_flattens_an_array() {
		let doc = json!({"scores": [1, 2, 3]});
		assert_eq!(numeric_values(&doc, "scores"), vec![1.0, 2.0, 3.0]);
	}

	#[test]
	fn numeric_values_coerces_numeric_strings() {
		let doc = json!({"price": "9.5"});
		assert_eq!(numeric_values(&doc, "price"), vec![9.5]);
	}

	#[test]
	fn numeric_values_skips_non_numeric_leaves() {
		let doc = json!({"name": "widget"});
		assert!(numeric_values(&doc, "name").is_empty());
	}

	#[test]
	fn term_values_reads_nested_field_path() {
		let doc = json!({"address": {"city": "Springfield"}});
		assert_eq!(term_values(&doc, "address.city"), vec![json!("Springfield")]);
	}
}
