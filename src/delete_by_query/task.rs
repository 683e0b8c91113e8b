//! `DeleteTask`: the mutable record backing one asynchronous delete-by-query
//! run. Identified by `"<node>:<uuid>"`, matching the task ID shape ES itself
//! returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
	Running,
	Completed,
	Failed,
	Cancelled,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCounters {
	pub total: u64,
	pub deleted: u64,
	pub batches: u64,
	pub version_conflicts: u64,
}

#[derive(Debug)]
struct TaskState {
	status: TaskStatus,
	counters: TaskCounters,
	started: Option<Instant>,
	completed_at: Option<DateTime<Utc>>,
	error: Option<String>,
}

/// One async delete-by-query run. Field mutations go through this struct's
/// own lock; the outer `TaskManager` map lock is never held while a worker
/// updates counters.
#[derive(Debug)]
pub struct DeleteTask {
	pub id: String,
	pub index: String,
	pub query: Value,
	pub created_at: DateTime<Utc>,
	cancel_requested: AtomicBool,
	state: RwLock<TaskState>,
}

impl DeleteTask {
	pub fn new(id: String, index: String, query: Value) -> Self {
		Self {
			id,
			index,
			query,
			created_at: Utc::now(),
			cancel_requested: AtomicBool::new(false),
			state: RwLock::new(TaskState {
				status: TaskStatus::Running,
				counters: TaskCounters::default(),
				started: None,
				completed_at: None,
				error: None,
			}),
		}
	}

	pub fn mark_started(&self) {
		self.state.write().started = Some(Instant::now());
	}

	pub fn record_batch(&self, deleted: u64, version_conflicts: u64) {
		let mut state = self.state.write();
		state.counters.batches += 1;
		state.counters.deleted += deleted;
		state.counters.version_conflicts += version_conflicts;
	}

	pub fn set_total(&self, total: u64) {
		self.state.write().counters.total = total;
	}

	/// Requests cancellation. The worker observes this between sub-batches;
	/// the task only actually transitions to `Cancelled` once the worker
	/// notices and stops, preserving whatever work already committed.
	pub fn request_cancel(&self) -> bool {
		let state = self.state.write();
		if state.status != TaskStatus::Running {
			return false;
		}
		self.cancel_requested.store(true, Ordering::SeqCst);
		true
	}

	pub fn is_cancel_requested(&self) -> bool {
		self.cancel_requested.load(Ordering::SeqCst)
	}

	pub fn mark_cancelled(&self) {
		let mut state = self.state.write();
		state.status = TaskStatus::Cancelled;
		state.completed_at = Some(Utc::now());
	}

	pub fn mark_completed(&self) {
		let mut state = self.state.write();
		state.status = TaskStatus::Completed;
		state.completed_at = Some(Utc::now());
	}

	pub fn mark_failed(&self, error: String) {
		let mut state = self.state.write();
		state.status = TaskStatus::Failed;
		state.error = Some(error);
		state.completed_at = Some(Utc::now());
	}

	pub fn status(&self) -> TaskStatus {
		self.state.read().status
	}

	pub fn completed_at(&self) -> Option<DateTime<Utc>> {
		self.state.read().completed_at
	}

	fn running_time_nanos(&self) -> u64 {
		self.state
			.read()
			.started
			.map(|s| s.elapsed().as_nanos() as u64)
			.unwrap_or(0)
	}

	/// The ES-shaped `GET /_tasks/{id}` envelope.
	pub fn to_envelope(&self) -> Value {
		let state = self.state.read();
		let completed = !matches!(state.status, TaskStatus::Running);
		let mut body = json!({
			"completed": completed,
			"task": {
				"id": self.id,
				"action": "indices:data/write/delete/byquery",
				"status": {
					"total": state.counters.total,
					"deleted": state.counters.deleted,
					"batches": state.counters.batches,
					"version_conflicts": state.counters.version_conflicts,
				},
				"running_time_in_nanos": self.running_time_nanos(),
			},
		});
		if let Some(err) = &state.error {
			body["error"] = json!({"type": "internal_server_error", "reason": err});
		}
		body
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_task_starts_running_and_not_completed() {
		let task = DeleteTask::new("n1:1".to_string(), "idx".to_string(), json!({}));
		assert_eq!(task.status(), TaskStatus::Running);
		assert_eq!(task.to_envelope()["completed"], false);
	}

	#[test]
	fn record_batch_accumulates_counters_across_calls() {
		let task = DeleteTask::new("n1:1".to_string(), "idx".to_string(), json!({}));
		task.record_batch(10, 1);
		task.record_batch(5, 0);
		let envelope = task.to_envelope();
		assert_eq!(envelope["task"]["status"]["deleted"], 15);
		assert_eq!(envelope["task"]["status"]["batches"], 2);
		assert_eq!(envelope["task"]["status"]["version_conflicts"], 1);
	}

	#[test]
	fn request_cancel_succeeds_only_while_running() {
		let task = DeleteTask::new("n1:1".to_string(), "idx".to_string(), json!({}));
		assert!(task.request_cancel());
		task.mark_cancelled();
		assert!(!task.request_cancel());
	}

	#[test]
	fn mark_failed_embeds_an_error_block() {
		let task = DeleteTask::new("n1:1".to_string(), "idx".to_string(), json!({}));
		task.mark_failed("boom".to_string());
		let envelope = task.to_envelope();
		assert_eq!(envelope["error"]["reason"], "boom");
		assert_eq!(envelope["completed"], true);
	}
}
