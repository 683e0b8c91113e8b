//! Groups parsed bulk items by target index and executes them against the
//! engine, falling back to per-item execution when a whole-batch submit
//! fails outright.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use uuid::Uuid;

use crate::bulk::parser::{BulkItem, BulkOp};
use crate::engine::{EngineBatch, IndexManager};
use crate::version::{VersionConstraint, VersionManager};

#[derive(Debug, Clone)]
pub struct ItemResult {
	pub op: BulkOp,
	pub index: String,
	pub id: String,
	pub version: Option<i64>,
	pub seq_no: Option<i64>,
	pub primary_term: Option<i64>,
	pub result: &'static str,
	pub status: u16,
	pub error: Option<Value>,
}

impl ItemResult {
	pub fn is_error(&self) -> bool {
		self.status >= 400
	}

	pub fn to_json(&self) -> Value {
		let action = match self.op {
			BulkOp::Index => "index",
			BulkOp::Create => "create",
			BulkOp::Update => "update",
			BulkOp::Delete => "delete",
		};
		let mut body = json!({
			"_index": self.index,
			"_id": self.id,
			"status": self.status,
		});
		let obj = body.as_object_mut().expect("constructed as object");
		if let Some(v) = self.version {
			obj.insert("_version".to_string(), json!(v));
		}
		if let Some(s) = self.seq_no {
			obj.insert("_seq_no".to_string(), json!(s));
		}
		if let Some(t) = self.primary_term {
			obj.insert("_primary_term".to_string(), json!(t));
		}
		if !self.result.is_empty() {
			obj.insert("result".to_string(), json!(self.result));
		}
		if let Some(err) = &self.error {
			obj.insert("error".to_string(), err.clone());
		}
		json!({ action: body })
	}
}

pub struct BulkPipeline {
	index_manager: Arc<dyn IndexManager>,
	version_manager: Arc<VersionManager>,
}

impl BulkPipeline {
	pub fn new(index_manager: Arc<dyn IndexManager>, version_manager: Arc<VersionManager>) -> Self {
		Self {
			index_manager,
			version_manager,
		}
	}

	pub async fn execute(&self, items: Vec<BulkItem>) -> Vec<ItemResult> {
		let mut by_index: HashMap<String, Vec<BulkItem>> = HashMap::new();
		let mut order: Vec<String> = Vec::new();
		for item in items {
			if !by_index.contains_key(&item.index) {
				order.push(item.index.clone());
			}
			by_index.entry(item.index.clone()).or_default().push(item);
		}

		let mut grouped_results: HashMap<String, Vec<ItemResult>> = HashMap::new();
		for index in &order {
			let group = by_index.remove(index).expect("key came from order");
			let results = self.execute_group(index, group).await;
			grouped_results.insert(index.clone(), results);
		}

		// Flattened back out is fine here: callers want per-request order only
		// within a group, and the overall response is keyed per item anyway.
		order
			.into_iter()
			.flat_map(|index| grouped_results.remove(&index).unwrap_or_default())
			.collect()
	}

	async fn execute_group(&self, index: &str, items: Vec<BulkItem>) -> Vec<ItemResult> {
		let handle = match self.index_manager.get_index(index).await {
			Some(h) => h,
			None => {
				return items
					.into_iter()
					.map(|item| not_found_result(index, item))
					.collect();
			}
		};

		// Assign ids up front so the engine batch and the result list agree.
		let prepared: Vec<(BulkItem, String)> = items
			.into_iter()
			.map(|item| {
				let id = item.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
				(item, id)
			})
			.collect();

		let mut batch = EngineBatch::default();
		let mut skip_write: HashMap<String, ItemResult> = HashMap::new();
		for (item, id) in &prepared {
			match item.op {
				BulkOp::Delete => batch.delete(id.clone()),
				BulkOp::Update if !item.doc_as_upsert && self.version_manager.current(index, id).is_none() => {
					skip_write.insert(
						id.clone(),
						not_found_item_result(index, item.op, id.clone()),
					);
				}
				BulkOp::Create if self.version_manager.current(index, id).is_some() => {
					skip_write.insert(id.clone(), already_exists_result(index, id.clone()));
				}
				_ => {
					let source = item.source.clone().unwrap_or(Value::Null);
					batch.index(id.clone(), source);
				}
			}
		}

		match handle.batch(batch).await {
			Ok(batch_result) => prepared
				.into_iter()
				.map(|(item, id)| {
					if let Some(result) = skip_write.remove(&id) {
						return result;
					}
					let failure = batch_result.failed.get(&id).cloned();
					self.finish_item(index, &item, id, failure.as_ref())
				})
				.collect(),
			Err(_) => {
				// Whole-batch submit failed technically; retry item by item so
				// one bad document doesn't fail the group that otherwise
				// would have succeeded.
				let mut results = Vec::with_capacity(prepared.len());
				for (item, id) in prepared {
					if let Some(result) = skip_write.remove(&id) {
						results.push(result);
						continue;
					}
					let mut single = EngineBatch::default();
					match item.op {
						BulkOp::Delete => single.delete(id.clone()),
						_ => single.index(id.clone(), item.source.clone().unwrap_or(Value::Null)),
					}
					let outcome = handle.batch(single).await;
					let failure = match &outcome {
						Ok(r) => r.failed.get(&id).cloned(),
						Err(e) => Some(e.to_string()),
					};
					results.push(self.finish_item(index, &item, id, failure.as_ref()));
				}
				results
			}
		}
	}

	fn finish_item(
		&self,
		index: &str,
		item: &BulkItem,
		id: String,
		failure: Option<&String>,
	) -> ItemResult {
		if let Some(reason) = failure {
			let status = if item.op == BulkOp::Delete { 404 } else { 400 };
			return ItemResult {
				op: item.op,
				index: index.to_string(),
				id,
				version: None,
				seq_no: None,
				primary_term: None,
				result: if item.op == BulkOp::Delete { "not_found" } else { "" },
				status,
				error: Some(json!({"type": "illegal_argument_exception", "reason": reason})),
			};
		}

		match item.op {
			BulkOp::Delete => {
				let version = self.version_manager.apply_delete(index, &id);
				ItemResult {
					op: item.op,
					index: index.to_string(),
					id,
					version: version.map(|v| v.version),
					seq_no: version.map(|v| v.seq_no),
					primary_term: version.map(|v| v.primary_term),
					result: "deleted",
					status: 200,
					error: None,
				}
			}
			_ => {
				let existed = self.version_manager.current(index, &id).is_some();
				match self.version_manager.apply_write(index, &id, item.version_constraint) {
					Ok(version) => {
						let (result, status) = if existed {
							("updated", 200)
						} else {
							("created", 201)
						};
						ItemResult {
							op: item.op,
							index: index.to_string(),
							id,
							version: Some(version.version),
							seq_no: Some(version.seq_no),
							primary_term: Some(version.primary_term),
							result,
							status,
							error: None,
						}
					}
					Err(conflict) => ItemResult {
						op: item.op,
						index: index.to_string(),
						id,
						version: None,
						seq_no: None,
						primary_term: None,
						result: "",
						status: 409,
						error: Some(json!({
							"type": "version_conflict_engine_exception",
							"reason": conflict.to_string(),
						})),
					},
				}
			}
		}
	}
}

fn not_found_result(index: &str, item: BulkItem) -> ItemResult {
	let id = item.id.unwrap_or_default();
	not_found_item_result(index, item.op, id)
}

fn not_found_item_result(index: &str, op: BulkOp, id: String) -> ItemResult {
	ItemResult {
		op,
		index: index.to_string(),
		id,
		version: None,
		seq_no: None,
		primary_term: None,
		result: "not_found",
		status: 404,
		error: Some(json!({"type": "index_not_found_exception", "reason": format!("no such index [{index}]")})),
	}
}

fn already_exists_result(index: &str, id: String) -> ItemResult {
	ItemResult {
		op: BulkOp::Create,
		index: index.to_string(),
		id,
		version: None,
		seq_no: None,
		primary_term: None,
		result: "",
		status: 409,
		error: Some(json!({
			"type": "version_conflict_engine_exception",
			"reason": "document already exists",
		})),
	}
}
