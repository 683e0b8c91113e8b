//! In-memory reference implementations of every capability interface in
//! `engine::mod`. These back the crate's own test suite; a real deployment
//! wires in implementations backed by the actual embedded engine instead.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Value, json};

use crate::engine::{
	BatchOp, BatchResult, DirectoryManager, EngineError, EngineIndex, EngineValue, IndexManager,
	MetadataStore, ScriptContext, ScriptEngine, SearchHit, SearchRequest, SearchResults,
};
use crate::index_lifecycle::IndexMetadata;
use crate::mapping::EngineMapping;
use crate::query::CompiledQuery;

#[derive(Default)]
pub struct MemoryDirectoryManager {
	indices: RwLock<HashSet<String>>,
}

impl MemoryDirectoryManager {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl DirectoryManager for MemoryDirectoryManager {
	async fn create_index(&self, name: &str) -> Result<String, EngineError> {
		let mut indices = self.indices.write();
		if !indices.insert(name.to_string()) {
			return Err(EngineError::Io(format!("directory for {name} already exists")));
		}
		Ok(self.get_index_path(name))
	}

	async fn delete_index(&self, name: &str) -> Result<(), EngineError> {
		self.indices.write().remove(name);
		Ok(())
	}

	async fn index_exists(&self, name: &str) -> bool {
		self.indices.read().contains(name)
	}

	async fn list_indices(&self) -> Vec<String> {
		self.indices.read().iter().cloned().collect()
	}

	fn get_index_path(&self, name: &str) -> String {
		format!("memory://{name}/store")
	}
}

#[derive(Default)]
pub struct MemoryMetadataStore {
	entries: RwLock<HashMap<String, IndexMetadata>>,
}

impl MemoryMetadataStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
	async fn save_index_metadata(&self, meta: &IndexMetadata) -> Result<(), EngineError> {
		self.entries.write().insert(meta.name.clone(), meta.clone());
		Ok(())
	}

	async fn get_index_metadata(&self, name: &str) -> Option<IndexMetadata> {
		self.entries.read().get(name).cloned()
	}

	async fn delete_index_metadata(&self, name: &str) -> Result<(), EngineError> {
		self.entries.write().remove(name);
		Ok(())
	}

	async fn close(&self) -> Result<(), EngineError> {
		Ok(())
	}
}

/// One open handle over an in-memory document map. `closed` gates every
/// operation so a handle that's been through `close()` behaves like a real
/// engine's closed shard instead of silently continuing to serve.
pub struct MemoryEngineIndex {
	docs: RwLock<HashMap<String, EngineValue>>,
	mapping: RwLock<EngineMapping>,
	closed: AtomicBool,
}

impl MemoryEngineIndex {
	pub fn new(mapping: EngineMapping) -> Self {
		Self {
			docs: RwLock::new(HashMap::new()),
			mapping: RwLock::new(mapping),
			closed: AtomicBool::new(false),
		}
	}

	fn ensure_open(&self) -> Result<(), EngineError> {
		if self.closed.load(Ordering::Acquire) {
			return Err(EngineError::Storage("index is closed".to_string()));
		}
		Ok(())
	}
}

#[async_trait]
impl EngineIndex for MemoryEngineIndex {
	async fn batch(&self, batch: crate::engine::EngineBatch) -> Result<BatchResult, EngineError> {
		self.ensure_open()?;
		let mut docs = self.docs.write();
		let mut failed = HashMap::new();
		for op in batch.ops {
			match op {
				BatchOp::Index { id, source } => {
					docs.insert(id, source);
				}
				BatchOp::Delete { id } => {
					if docs.remove(&id).is_none() {
						failed.insert(id, "document not found".to_string());
					}
				}
			}
		}
		Ok(BatchResult { failed })
	}

	async fn search(&self, req: &SearchRequest) -> Result<SearchResults, EngineError> {
		self.ensure_open()?;
		let docs = self.docs.read();
		let query = req.query.clone();
		let mut matched: Vec<(String, EngineValue)> = docs
			.iter()
			.filter(|(_, source)| match &query {
				Some(q) => matches_query(q, source),
				None => true,
			})
			.map(|(id, source)| (id.clone(), source.clone()))
			.collect();
		matched.sort_by(|a, b| a.0.cmp(&b.0));

		let total = matched.len();
		let hits = matched
			.into_iter()
			.skip(req.from)
			.take(req.size)
			.map(|(id, source)| SearchHit {
				id,
				score: 1.0,
				source,
			})
			.collect::<Vec<_>>();
		let max_score = hits.iter().map(|h| h.score).fold(None, |acc, s| {
			Some(acc.map_or(s, |m: f32| m.max(s)))
		});
		Ok(SearchResults {
			total,
			max_score,
			hits,
		})
	}

	async fn close(&self) -> Result<(), EngineError> {
		self.closed.store(true, Ordering::Release);
		Ok(())
	}

	fn validate_mapping(&self, _mapping: &EngineMapping) -> Result<(), EngineError> {
		Ok(())
	}

	fn set_mapping(&self, mapping: EngineMapping) {
		*self.mapping.write() = mapping;
	}
}

pub use crate::query::matches_query;
use crate::query::field_value;

#[derive(Default)]
pub struct MemoryIndexManager {
	indices: RwLock<HashMap<String, Arc<MemoryEngineIndex>>>,
}

impl MemoryIndexManager {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl IndexManager for MemoryIndexManager {
	async fn get_index(&self, name: &str) -> Option<Arc<dyn EngineIndex>> {
		self.indices
			.read()
			.get(name)
			.cloned()
			.map(|h| h as Arc<dyn EngineIndex>)
	}

	async fn open_index(&self, name: &str, mapping: EngineMapping) -> Result<(), EngineError> {
		let mut indices = self.indices.write();
		match indices.get(name) {
			Some(existing) => {
				existing.closed.store(false, Ordering::Release);
				existing.set_mapping(mapping);
			}
			None => {
				indices.insert(name.to_string(), Arc::new(MemoryEngineIndex::new(mapping)));
			}
		}
		Ok(())
	}

	async fn close_index(&self, name: &str) -> Result<(), EngineError> {
		let handle = self.indices.read().get(name).cloned();
		if let Some(handle) = handle {
			handle.close().await?;
		}
		Ok(())
	}

	fn invalidate_index_status(&self, _name: &str) {
		// The reference engine holds no cached status to invalidate; a real
		// engine would drop a cached open/close flag here.
	}
}

/// A minimal `ScriptEngine` covering the handful of scripted-aggregation
/// expressions exercised by this crate's tests: `doc['field'].value` access,
/// `params.name` passthrough, `state`, `sum(state)`, and two-operand `a + b`
/// addition over those. Nothing resembling a general scripting language.
pub struct MemoryScriptEngine;

impl MemoryScriptEngine {
	pub fn new() -> Self {
		Self
	}

	fn eval_operand(&self, operand: &str, context: &ScriptContext) -> Result<f64, EngineError> {
		let operand = operand.trim();
		if operand == "state" {
			return Ok(context.state.as_f64().unwrap_or(0.0));
		}
		if let Some(name) = operand.strip_prefix("params.") {
			return Ok(context
				.params
				.get(name)
				.and_then(|v| v.as_f64())
				.unwrap_or(0.0));
		}
		operand
			.parse::<f64>()
			.map_err(|_| EngineError::Script(format!("unsupported script operand: {operand}")))
	}
}

impl Default for MemoryScriptEngine {
	fn default() -> Self {
		Self::new()
	}
}

impl ScriptEngine for MemoryScriptEngine {
	fn execute(&self, script: &str, context: &ScriptContext) -> Result<Value, EngineError> {
		let script = script.trim();

		if let Some(field) = script.strip_prefix("doc[").and_then(|s| s.strip_suffix("].value")) {
			let field = field.trim_matches(|c| c == '\'' || c == '"');
			let doc = context
				.doc
				.as_ref()
				.ok_or_else(|| EngineError::Script("no document in context".to_string()))?;
			return Ok(field_value(doc, field).cloned().unwrap_or(Value::Null));
		}
		if script == "state" {
			return Ok(context.state.clone());
		}
		if let Some(name) = script.strip_prefix("params.") {
			return Ok(context.params.get(name).cloned().unwrap_or(Value::Null));
		}
		if script == "sum(state)" {
			let sum: f64 = context
				.state
				.as_array()
				.map(|arr| arr.iter().filter_map(|v| v.as_f64()).sum())
				.unwrap_or(0.0);
			return Ok(json!(sum));
		}
		if let Some((left, right)) = script.split_once(" + ") {
			let sum = self.eval_operand(left, context)? + self.eval_operand(right, context)?;
			return Ok(json!(sum));
		}
		if let Ok(literal) = script.parse::<f64>() {
			return Ok(json!(literal));
		}
		Err(EngineError::Script(format!(
			"unsupported script expression: {script}"
		)))
	}
}
