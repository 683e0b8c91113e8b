//! # Version Manager
//!
//! ## Purpose
//! Tracks the ES-visible `(_version, _seq_no, _primary_term)` triple for every
//! `(index, id)` pair this process has ever written, and enforces the
//! optimistic-concurrency checks ES exposes through `version`/`version_type`
//! and `if_seq_no`/`if_primary_term`.
//!
//! ## Mental model
//! There is exactly one shard and one primary per index in this process, so
//! `primary_term` is always `1`. `_seq_no` is a single global counter shared
//! across every index, matching ES's per-shard sequence numbering collapsed
//! to a single shard. `_version` is per-document and starts at `1`.
//!
//! ## Invariants
//! - `_seq_no` is strictly increasing across the whole process, never reused,
//!   even for documents that are later deleted.
//!   - Tested by: `tests::seq_no_is_monotonic_across_documents`.
//! - An `external`/`external_gte` version check against a missing document
//!   never conflicts; the caller's version becomes the stored version.
//!   - Tested by: `tests::external_version_against_missing_document_succeeds`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentVersion {
	pub version: i64,
	pub seq_no: i64,
	pub primary_term: i64,
}

#[derive(Debug, Clone, Copy)]
pub enum VersionConstraint {
	/// No explicit version given: bump internally, never conflicts.
	Internal,
	/// `version_type=external`: the given version must be strictly greater
	/// than the stored one (or the document must not exist yet).
	External(i64),
	/// `version_type=external_gte`: the given version must be greater than
	/// or equal to the stored one.
	ExternalGte(i64),
	/// `if_seq_no` + `if_primary_term`: both must match the stored values
	/// exactly.
	SeqNoPrimaryTerm(i64, i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionConflictKind {
	Missing,
	Version,
	SeqNo,
	PrimaryTerm,
}

impl fmt::Display for VersionConflictKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			VersionConflictKind::Missing => "document does not exist",
			VersionConflictKind::Version => "current version is different",
			VersionConflictKind::SeqNo => "current seq_no is different",
			VersionConflictKind::PrimaryTerm => "current primary_term is different",
		};
		f.write_str(s)
	}
}

#[derive(Default)]
pub struct VersionManager {
	global_seq: AtomicI64,
	table: RwLock<HashMap<(String, String), DocumentVersion>>,
}

impl VersionManager {
	pub fn new() -> Self {
		Self {
			global_seq: AtomicI64::new(0),
			table: RwLock::new(HashMap::new()),
		}
	}

	pub fn current(&self, index: &str, id: &str) -> Option<DocumentVersion> {
		self.table.read().get(&key(index, id)).copied()
	}

	/// Checks `constraint` against the current state and, if it passes,
	/// records and returns the new version. Never partially applies: on
	/// conflict the stored state is untouched.
	pub fn apply_write(
		&self,
		index: &str,
		id: &str,
		constraint: VersionConstraint,
	) -> Result<DocumentVersion, VersionConflictKind> {
		let k = key(index, id);
		let mut table = self.table.write();
		let existing = table.get(&k).copied();

		let new_version = match constraint {
			VersionConstraint::Internal => existing.map(|v| v.version + 1).unwrap_or(1),
			VersionConstraint::External(given) => {
				if let Some(existing) = existing {
					if given <= existing.version {
						return Err(VersionConflictKind::Version);
					}
				}
				given
			}
			VersionConstraint::ExternalGte(given) => {
				if let Some(existing) = existing {
					if given < existing.version {
						return Err(VersionConflictKind::Version);
					}
				}
				given
			}
			VersionConstraint::SeqNoPrimaryTerm(if_seq_no, if_primary_term) => {
				let existing = existing.ok_or(VersionConflictKind::Missing)?;
				if existing.seq_no != if_seq_no {
					return Err(VersionConflictKind::SeqNo);
				}
				if existing.primary_term != if_primary_term {
					return Err(VersionConflictKind::PrimaryTerm);
				}
				existing.version + 1
			}
		};

		let new_state = DocumentVersion {
			version: new_version,
			seq_no: self.global_seq.fetch_add(1, Ordering::SeqCst) + 1,
			primary_term: 1,
		};
		table.insert(k, new_state);
		Ok(new_state)
	}

	/// Records a delete: bumps `_seq_no` but drops the document's version
	/// entry entirely, matching the spec's choice not to support
	/// resurrect-with-version-check for a document that no longer exists.
	pub fn apply_delete(&self, index: &str, id: &str) -> Option<DocumentVersion> {
		let k = key(index, id);
		let mut table = self.table.write();
		let removed = table.remove(&k);
		if removed.is_some() {
			self.global_seq.fetch_add(1, Ordering::SeqCst);
		}
		removed
	}

	pub fn forget_index(&self, index: &str) {
		self.table.write().retain(|(i, _), _| i != index);
	}
}

fn key(index: &str, id: &str) -> (String, String) {
	(index.to_string(), id.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn internal_writes_start_at_version_one_and_increment() {
		let vm = VersionManager::new();
		let v1 = vm.apply_write("idx", "1", VersionConstraint::Internal).unwrap();
		assert_eq!(v1.version, 1);
		let v2 = vm.apply_write("idx", "1", VersionConstraint::Internal).unwrap();
		assert_eq!(v2.version, 2);
	}

	#[test]
	fn seq_no_is_monotonic_across_documents() {
		let vm = VersionManager::new();
		let a = vm.apply_write("idx", "a", VersionConstraint::Internal).unwrap();
		let b = vm.apply_write("idx", "b", VersionConstraint::Internal).unwrap();
		assert!(b.seq_no > a.seq_no);
	}

	#[test]
	fn external_version_against_missing_document_succeeds() {
		let vm = VersionManager::new();
		let v = vm
			.apply_write("idx", "1", VersionConstraint::External(5))
			.unwrap();
		assert_eq!(v.version, 5);
	}

	#[test]
	fn external_version_must_be_strictly_greater() {
		let vm = VersionManager::new();
		vm.apply_write("idx", "1", VersionConstraint::External(5)).unwrap();
		let err = vm
			.apply_write("idx", "1", VersionConstraint::External(5))
			.unwrap_err();
		assert_eq!(err, VersionConflictKind::Version);
	}

	#[test]
	fn external_gte_accepts_equal_version() {
		let vm = VersionManager::new();
		vm.apply_write("idx", "1", VersionConstraint::External(5)).unwrap();
		let v = vm
			.apply_write("idx", "1", VersionConstraint::ExternalGte(5))
			.unwrap();
		assert_eq!(v.version, 5);
	}

	#[test]
	fn seq_no_primary_term_check_rejects_stale_seq_no() {
		let vm = VersionManager::new();
		let first = vm.apply_write("idx", "1", VersionConstraint::Internal).unwrap();
		vm.apply_write("idx", "1", VersionConstraint::Internal).unwrap();
		let err = vm
			.apply_write(
				"idx",
				"1",
				VersionConstraint::SeqNoPrimaryTerm(first.seq_no, first.primary_term),
			)
			.unwrap_err();
		assert_eq!(err, VersionConflictKind::SeqNo);
	}

	#[test]
	fn seq_no_primary_term_check_against_missing_document_is_missing_conflict() {
		let vm = VersionManager::new();
		let err = vm
			.apply_write("idx", "1", VersionConstraint::SeqNoPrimaryTerm(0, 1))
			.unwrap_err();
		assert_eq!(err, VersionConflictKind::Missing);
	}

	#[test]
	fn delete_then_rewrite_resets_to_version_one() {
		let vm = VersionManager::new();
		vm.apply_write("idx", "1", VersionConstraint::Internal).unwrap();
		vm.apply_delete("idx", "1");
		let v = vm.apply_write("idx", "1", VersionConstraint::Internal).unwrap();
		assert_eq!(v.version, 1);
	}

	#[test]
	fn forget_index_drops_only_that_indexs_entries() {
		let vm = VersionManager::new();
		vm.apply_write("a", "1", VersionConstraint::Internal).unwrap();
		vm.apply_write("b", "1", VersionConstraint::Internal).unwrap();
		vm.forget_index("a");
		assert!(vm.current("a", "1").is_none());
		assert!(vm.current("b", "1").is_some());
	}
}
