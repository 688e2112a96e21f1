//! Provider sync.
//!
//! A sync pass mirrors the provider into the local replica:
//!
//! - **Groups**: raw provider groups are deduplicated into logical groups
//!   and system groups are mirrored locally
//! - **Contacts**: provider contacts are diffed against local contacts by id
//!   and the insert/update/delete set is applied in one transaction
//! - **Restoration**: staged migration state, if any, is re-attached
//!
//! # Example
//!
//! ```ignore
//! use contactsync::provider::JsonFileProvider;
//! use contactsync::sync::run_pass;
//!
//! let provider = JsonFileProvider::new("snapshot.json");
//! let report = run_pass(&mut storage, &provider, false)?;
//! println!("{} writes", report.contacts.writes());
//! ```

mod groups;
mod hash;
mod pass;
mod reconcile;
mod types;

pub use groups::{
    dedup_key, deduplicate, deduplicate_with_aliases, normalize_title, sync_groups, Deduplicated,
};
pub use hash::{content_hash, ChangeSignature};
pub use pass::run_pass;
pub use reconcile::{compute_changes, GroupIndex, Reconciler};
pub use types::{ChangeSet, GroupChangeSet, GroupSyncStats, SyncReport, SyncStats};
