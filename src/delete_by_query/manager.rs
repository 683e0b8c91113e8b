//! `TaskManager`: the outer registry of `DeleteTask`s. The outer lock only
//! ever guards map membership; counters live behind each task's own lock so
//! a worker never contends with `GET /_tasks/{id}` callers for the map lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::EsError;
use crate::delete_by_query::task::DeleteTask;

pub struct TaskManager {
	node_id: String,
	tasks: RwLock<HashMap<String, Arc<DeleteTask>>>,
}

impl TaskManager {
	pub fn new(node_id: impl Into<String>) -> Self {
		Self {
			node_id: node_id.into(),
			tasks: RwLock::new(HashMap::new()),
		}
	}

	pub fn create(&self, index: &str, query: Value) -> Arc<DeleteTask> {
		let id = format!("{}:{}", self.node_id, Uuid::new_v4());
		let task = Arc::new(DeleteTask::new(id.clone(), index.to_string(), query));
		self.tasks.write().insert(id, task.clone());
		task
	}

	pub fn get(&self, id: &str) -> Result<Arc<DeleteTask>, EsError> {
		self.tasks
			.read()
			.get(id)
			.cloned()
			.ok_or_else(|| EsError::TaskNotFound(id.to_string()))
	}

	/// Transitions `running -> cancelled` if currently running. Returns an
	/// error if the task doesn't exist; returns `Ok(false)` (not an error) if
	/// it exists but has already reached a terminal state.
	pub fn request_cancel(&self, id: &str) -> Result<bool, EsError> {
		let task = self.get(id)?;
		Ok(task.request_cancel())
	}

	/// Drops tasks whose `completed_at` is older than `max_age`. Returns the
	/// number of tasks dropped. Meant to be driven by an ambient scheduler on
	/// an interval, not called from request handlers.
	pub fn cleanup_old_tasks(&self, max_age: Duration) -> usize {
		let now = Utc::now();
		let mut tasks = self.tasks.write();
		let before = tasks.len();
		tasks.retain(|_, task| match task.completed_at() {
			Some(completed_at) => {
				let age = now.signed_duration_since(completed_at);
				age.to_std().map(|age| age < max_age).unwrap_or(true)
			}
			None => true,
		});
		before - tasks.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use std::time::Duration as StdDuration;

	#[test]
	fn create_assigns_a_node_prefixed_id() {
		let manager = TaskManager::new("node1");
		let task = manager.create("idx", json!({}));
		assert!(task.id.starts_with("node1:"));
		assert!(manager.get(&task.id).is_ok());
	}

	#[test]
	fn get_on_unknown_id_is_task_not_found() {
		let manager = TaskManager::new("node1");
		let err = manager.get("node1:missing").unwrap_err();
		assert!(matches!(err, EsError::TaskNotFound(_)));
	}

	#[test]
	fn request_cancel_on_unknown_id_is_an_error_not_a_false() {
		let manager = TaskManager::new("node1");
		assert!(manager.request_cancel("node1:missing").is_err());
	}

	#[test]
	fn cleanup_keeps_freshly_completed_tasks() {
		let manager = TaskManager::new("node1");
		let fresh = manager.create("idx", json!({}));
		fresh.mark_completed();
		let dropped = manager.cleanup_old_tasks(StdDuration::from_secs(3600));
		assert_eq!(dropped, 0);
		assert!(manager.get(&fresh.id).is_ok());
	}

	#[test]
	fn cleanup_keeps_running_tasks_regardless_of_age() {
		let manager = TaskManager::new("node1");
		let running = manager.create("idx", json!({}));
		let dropped = manager.cleanup_old_tasks(StdDuration::from_secs(0));
		assert_eq!(dropped, 0);
		assert!(manager.get(&running.id).is_ok());
	}
}
