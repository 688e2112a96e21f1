//! Type definitions for sync passes.

use crate::model::{Contact, Group};
use crate::preserve::RestoreReport;
use serde::Serialize;

/// Contact writes computed by a reconciliation pass.
///
/// Applied by [`crate::storage::SqliteStorage::sync_contacts`] in the order
/// inserts, updates, deletes, all in one transaction.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub inserts: Vec<Contact>,
    pub updates: Vec<Contact>,
    pub deletes: Vec<i64>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Total writes in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}

/// Group writes computed by a group sync pass.
#[derive(Debug, Clone, Default)]
pub struct GroupChangeSet {
    pub inserts: Vec<Group>,
    pub updates: Vec<Group>,
    pub deletes: Vec<i64>,
}

impl GroupChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Outcome of contact reconciliation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Contacts new to the local replica.
    pub inserted: usize,
    /// Contacts whose change signature differed.
    pub updated: usize,
    /// Local contacts the provider no longer has.
    pub deleted: usize,
    /// Contacts present on both sides with an equal signature.
    pub unchanged: usize,
}

impl SyncStats {
    /// Number of writes the pass performed (or would perform).
    #[must_use]
    pub fn writes(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

/// Outcome of group sync.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupSyncStats {
    /// Group rows reported by the provider.
    pub raw: usize,
    /// Logical groups left after deduplication.
    pub deduplicated: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Combined outcome of a full sync pass.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    /// `None` when reading provider groups failed and group sync was skipped.
    pub groups: Option<GroupSyncStats>,
    pub contacts: SyncStats,
    /// `None` in dry-run mode.
    pub restore: Option<RestoreReport>,
}
