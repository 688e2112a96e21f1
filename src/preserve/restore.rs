//! Restoration phase.

use super::staging::{self, StagedEntry};
use super::{MigrationPhase, RestoreReport};
use crate::error::Result;
use crate::storage::SqliteStorage;
use tracing::{debug, info, warn};

/// Re-attach staged favorite and group state to current contacts.
///
/// Each staged entry is matched to a contact by exact phone number, then
/// exact email, then exact first and last name; the first strategy that
/// finds a contact wins. Individual writes are best-effort: a failure is
/// logged and counted, never fatal. The staging table is dropped at the
/// end regardless of how many entries matched, so a second call reports
/// nothing pending.
///
/// # Errors
///
/// Returns an error only if the staging catalog cannot be queried or the
/// staging table cannot be dropped.
pub fn restore(storage: &mut SqliteStorage) -> Result<RestoreReport> {
    if !staging::exists(storage.conn())? {
        debug!("No staged migration state");
        return Ok(RestoreReport::nothing_pending());
    }

    let entries = match staging::read_all(storage.conn()) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Staged migration state unreadable, abandoning restoration");
            staging::drop_table(storage.conn())?;
            return Ok(RestoreReport {
                phase: Some(MigrationPhase::Staged.advance(MigrationPhase::Abandoned)?),
                ..RestoreReport::default()
            });
        }
    };

    let mut report = RestoreReport::default();

    for entry in &entries {
        let Some(contact_id) = resolve(storage, entry) else {
            warn!(
                phone = entry.phone_number.as_deref(),
                email = entry.email.as_deref(),
                first_name = %entry.first_name,
                last_name = %entry.last_name,
                "No contact matches staged entry, dropping it"
            );
            report.unmatched += 1;
            continue;
        };

        report.restored += 1;

        if entry.is_favorite {
            match storage.set_favorite(contact_id, true) {
                Ok(()) => report.favorites_restored += 1,
                Err(e) => warn!(contact_id, error = %e, "Could not restore favorite"),
            }
        }

        for &group_id in &entry.group_ids {
            match storage.add_membership(contact_id, group_id) {
                Ok(_) => report.memberships_restored += 1,
                Err(e) => {
                    warn!(contact_id, group_id, error = %e, "Could not restore membership");
                    report.memberships_skipped += 1;
                }
            }
        }
    }

    staging::drop_table(storage.conn())?;
    report.phase = Some(MigrationPhase::Staged.advance(MigrationPhase::Restored)?);

    info!(
        staged = entries.len(),
        restored = report.restored,
        unmatched = report.unmatched,
        memberships = report.memberships_restored,
        skipped = report.memberships_skipped,
        "Migration state restored"
    );

    Ok(report)
}

/// Find the contact a staged entry belongs to.
///
/// A lookup that errors counts as no match for that strategy.
fn resolve(storage: &SqliteStorage, entry: &StagedEntry) -> Option<i64> {
    let lookup = |strategy: &str, found: Result<Option<i64>>| match found {
        Ok(Some(id)) => {
            debug!(strategy, contact_id = id, "Matched staged entry");
            Some(id)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(strategy, error = %e, "Staged entry lookup failed");
            None
        }
    };

    if let Some(phone) = entry.phone_number.as_deref() {
        if let Some(id) = lookup("phone", storage.find_contact_by_phone(phone)) {
            return Some(id);
        }
    }
    if let Some(email) = entry.email.as_deref() {
        if let Some(id) = lookup("email", storage.find_contact_by_email(email)) {
            return Some(id);
        }
    }
    if entry.first_name.trim().is_empty() && entry.last_name.trim().is_empty() {
        return None;
    }
    lookup(
        "name",
        storage.find_contact_by_name(&entry.first_name, &entry.last_name),
    )
}
