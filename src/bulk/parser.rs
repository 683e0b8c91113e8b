//! NDJSON bulk-request parser: the action/metadata-line, body-line state
//! machine described for `POST /_bulk`.

use serde_json::Value;

use crate::EsError;
use crate::version::VersionConstraint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOp {
	Index,
	Create,
	Update,
	Delete,
}

#[derive(Debug, Clone)]
pub struct BulkItem {
	pub op: BulkOp,
	pub index: String,
	pub id: Option<String>,
	/// The document source for `index`/`create`, or the extracted `doc` (or
	/// whole body, if no `doc` key) for `update`. `None` for `delete`.
	pub source: Option<Value>,
	pub doc_as_upsert: bool,
	/// Parsed from the action header's `version`/`version_type` or
	/// `if_seq_no`/`if_primary_term` fields; `Internal` when none were given.
	pub version_constraint: VersionConstraint,
}

enum ParseState {
	ExpectAction,
	ExpectBody(PendingAction),
}

struct PendingAction {
	op: BulkOp,
	index: String,
	id: Option<String>,
	version_constraint: VersionConstraint,
}

/// Parses a `_bulk` NDJSON body into a flat list of items. `default_index`
/// is the URL path index, used when an action line omits `_index`.
pub fn parse_bulk(body: &[u8], default_index: Option<&str>) -> Result<Vec<BulkItem>, EsError> {
	let text = std::str::from_utf8(body)
		.map_err(|e| EsError::Parsing(format!("bulk body is not valid UTF-8: {e}")))?;

	let mut items = Vec::new();
	let mut state = ParseState::ExpectAction;

	for line in text.split('\n') {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		match state {
			ParseState::ExpectAction => {
				let pending = parse_action_line(line, default_index)?;
				if pending.op == BulkOp::Delete {
					items.push(BulkItem {
						op: BulkOp::Delete,
						index: pending.index,
						id: pending.id,
						source: None,
						doc_as_upsert: false,
						version_constraint: pending.version_constraint,
					});
					state = ParseState::ExpectAction;
				} else {
					state = ParseState::ExpectBody(pending);
				}
			}
			ParseState::ExpectBody(pending) => {
				let body: Value = serde_json::from_str(line)
					.map_err(|e| EsError::Parsing(format!("invalid bulk body line: {e}")))?;
				let (source, doc_as_upsert) = if pending.op == BulkOp::Update {
					let doc_as_upsert = body
						.get("doc_as_upsert")
						.and_then(|v| v.as_bool())
						.unwrap_or(false);
					let doc = body.get("doc").cloned().unwrap_or(body);
					(doc, doc_as_upsert)
				} else {
					(body, false)
				};
				items.push(BulkItem {
					op: pending.op,
					index: pending.index,
					id: pending.id,
					source: Some(source),
					doc_as_upsert,
					version_constraint: pending.version_constraint,
				});
				state = ParseState::ExpectAction;
			}
		}
	}

	if let ParseState::ExpectBody(pending) = state {
		return Err(EsError::Parsing(format!(
			"bulk action on index {:?} is missing its body line",
			pending.index
		)));
	}

	Ok(items)
}

fn parse_action_line(line: &str, default_index: Option<&str>) -> Result<PendingAction, EsError> {
	let value: Value =
		serde_json::from_str(line).map_err(|e| EsError::Parsing(format!("invalid bulk action line: {e}")))?;
	let obj = value
		.as_object()
		.ok_or_else(|| EsError::Parsing("bulk action line must be a JSON object".to_string()))?;
	if obj.len() != 1 {
		return Err(EsError::Parsing(
			"bulk action line must have exactly one key".to_string(),
		));
	}
	let (key, meta) = obj.iter().next().expect("checked len == 1");
	let op = match key.as_str() {
		"index" => BulkOp::Index,
		"create" => BulkOp::Create,
		"update" => BulkOp::Update,
		"delete" => BulkOp::Delete,
		other => {
			return Err(EsError::Parsing(format!(
				"unrecognized bulk action: {other}"
			)));
		}
	};
	let index = meta
		.get("_index")
		.and_then(|v| v.as_str())
		.map(|s| s.to_string())
		.or_else(|| default_index.map(|s| s.to_string()))
		.ok_or_else(|| {
			EsError::IllegalArgument("bulk action is missing _index and no default index was given".to_string())
		})?;
	let id = meta.get("_id").and_then(|v| v.as_str()).map(|s| s.to_string());
	if op == BulkOp::Delete && id.is_none() {
		return Err(EsError::IllegalArgument(
			"delete action requires _id".to_string(),
		));
	}
	let version_constraint = parse_version_constraint(meta);
	Ok(PendingAction {
		op,
		index,
		id,
		version_constraint,
	})
}

/// Reads `if_seq_no`/`if_primary_term` or `version`/`version_type` off an
/// action header's metadata object. `if_seq_no`+`if_primary_term` wins when
/// both are present; otherwise an explicit `version` is treated as
/// `external` unless `version_type` says `external_gte`. No constraint at
/// all falls back to `Internal`.
fn parse_version_constraint(meta: &Value) -> VersionConstraint {
	let if_seq_no = meta.get("if_seq_no").and_then(|v| v.as_i64());
	let if_primary_term = meta.get("if_primary_term").and_then(|v| v.as_i64());
	if let (Some(seq_no), Some(primary_term)) = (if_seq_no, if_primary_term) {
		return VersionConstraint::SeqNoPrimaryTerm(seq_no, primary_term);
	}

	if let Some(version) = meta.get("version").and_then(|v| v.as_i64()) {
		let version_type = meta.get("version_type").and_then(|v| v.as_str()).unwrap_or("external");
		return match version_type {
			"external_gte" => VersionConstraint::ExternalGte(version),
			_ => VersionConstraint::External(version),
		};
	}

	VersionConstraint::Internal
}
