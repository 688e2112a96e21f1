//! A full sync pass: groups, then contacts, then any pending restoration.

use crate::error::Result;
use crate::preserve;
use crate::provider::ContactProvider;
use crate::storage::SqliteStorage;
use crate::sync::groups::{deduplicate_with_aliases, sync_groups};
use crate::sync::reconcile::Reconciler;
use crate::sync::types::SyncReport;
use std::collections::HashMap;
use tracing::{info, warn};

/// Run one sync pass against `provider`.
///
/// Provider contacts are read before anything is written, so a provider
/// that cannot produce contacts leaves the store untouched. A failure to
/// read groups only skips group sync. Restoration of migration state runs
/// after contacts are in place and is skipped in dry-run mode.
///
/// # Errors
///
/// Returns an error if provider contacts cannot be read or a batch write
/// fails.
pub fn run_pass(
    storage: &mut SqliteStorage,
    provider: &dyn ContactProvider,
    dry_run: bool,
) -> Result<SyncReport> {
    let external = provider.contacts()?;

    let (groups, aliases) = match provider.groups() {
        Ok(raw) => {
            let deduplicated = deduplicate_with_aliases(&raw);
            let stats = sync_groups(storage, &deduplicated, raw.len(), dry_run)?;
            (Some(stats), deduplicated.aliases)
        }
        Err(e) => {
            warn!(error = %e, "Could not read provider groups, skipping group sync");
            (None, HashMap::new())
        }
    };

    let contacts = Reconciler::new(storage, dry_run).reconcile(&external, &aliases)?;

    let restore = if dry_run {
        None
    } else {
        Some(preserve::restore(storage)?)
    };

    info!(
        contacts = external.len(),
        writes = contacts.writes(),
        dry_run,
        "Sync pass finished"
    );

    Ok(SyncReport {
        dry_run,
        groups,
        contacts,
        restore,
    })
}
