//! Capture phase: read legacy user state before the tables are dropped.

use super::staging::{self, StagedEntry};
use super::{CaptureTally, MigrationPhase};
use crate::error::Result;
use rusqlite::Connection;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Identifiers collected for one legacy contact, keyed by its old id.
#[derive(Debug, Clone, Default)]
struct ContactIdentifiers {
    phone_numbers: Vec<String>,
    emails: Vec<String>,
    first_name: String,
    last_name: String,
    is_favorite: bool,
    group_ids: Vec<i64>,
}

impl ContactIdentifiers {
    fn worth_preserving(&self) -> bool {
        self.is_favorite || !self.group_ids.is_empty()
    }

    fn to_staged(&self) -> StagedEntry {
        StagedEntry {
            phone_number: self.phone_numbers.first().cloned(),
            email: self.emails.first().cloned(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            is_favorite: self.is_favorite,
            group_ids: self.group_ids.clone(),
        }
    }
}

/// A legacy group, re-inserted verbatim after the rebuild.
#[derive(Debug, Clone)]
struct PreservedGroup {
    id: i64,
    name: String,
    created_at: i64,
}

/// Everything read from a legacy database. Best effort, not verified.
#[derive(Debug, Default)]
pub struct CapturedState {
    contacts: BTreeMap<i64, ContactIdentifiers>,
    groups: Vec<PreservedGroup>,
    pub tally: CaptureTally,
}

/// Run one legacy read; on failure log it, count it and yield nothing.
fn guarded<T>(
    what: &str,
    tally: &mut CaptureTally,
    read: impl FnOnce() -> rusqlite::Result<Vec<T>>,
) -> Vec<T> {
    match read() {
        Ok(rows) => rows,
        Err(e) => {
            warn!(what, error = %e, "Could not read legacy data, skipping");
            tally.reads_failed += 1;
            Vec::new()
        }
    }
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?;
    rows.collect()
}

/// Read favorites, identifiers, groups and memberships from a legacy database.
///
/// Each read is guarded on its own: a missing table or column costs only the
/// data it would have provided. Never fails.
#[must_use]
pub fn capture(conn: &Connection) -> CapturedState {
    let mut state = CapturedState::default();
    let tally = &mut state.tally;

    let contacts = guarded("contacts", tally, || {
        query_all(
            conn,
            "SELECT id, first_name, last_name, is_favorite FROM contacts",
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    row.get::<_, Option<bool>>(3)?.unwrap_or(false),
                ))
            },
        )
    });
    tally.contacts_read = contacts.len();
    for (id, first_name, last_name, is_favorite) in contacts {
        state.contacts.insert(
            id,
            ContactIdentifiers {
                first_name,
                last_name,
                is_favorite,
                ..ContactIdentifiers::default()
            },
        );
    }

    let phones = guarded("phone_numbers", tally, || {
        query_all(
            conn,
            "SELECT contact_id, number FROM phone_numbers ORDER BY id",
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
        )
    });
    tally.phones_read = phones.len();
    for (contact_id, number) in phones {
        if let (Some(entry), Some(number)) = (state.contacts.get_mut(&contact_id), number) {
            if !number.is_empty() {
                entry.phone_numbers.push(number);
            }
        }
    }

    let emails = guarded("emails", tally, || {
        query_all(
            conn,
            "SELECT contact_id, email FROM emails ORDER BY id",
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
        )
    });
    tally.emails_read = emails.len();
    for (contact_id, email) in emails {
        if let (Some(entry), Some(email)) = (state.contacts.get_mut(&contact_id), email) {
            if !email.is_empty() {
                entry.emails.push(email);
            }
        }
    }

    state.groups = guarded("groups", tally, || {
        query_all(
            conn,
            "SELECT id, name, created_at FROM `groups` ORDER BY id",
            |row| {
                Ok(PreservedGroup {
                    id: row.get(0)?,
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    created_at: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
                })
            },
        )
    });
    tally.groups_preserved = state.groups.len();

    let memberships = guarded("contact_group_cross_ref", tally, || {
        query_all(
            conn,
            "SELECT contact_id, group_id FROM contact_group_cross_ref",
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
    });
    tally.memberships_read = memberships.len();
    for (contact_id, group_id) in memberships {
        if let Some(entry) = state.contacts.get_mut(&contact_id) {
            entry.group_ids.push(group_id);
        }
    }

    let favorites = state.contacts.values().filter(|c| c.is_favorite).count();
    let with_groups = state
        .contacts
        .values()
        .filter(|c| !c.group_ids.is_empty())
        .count();
    info!(
        contacts = state.tally.contacts_read,
        favorites,
        with_groups,
        groups = state.tally.groups_preserved,
        reads_failed = state.tally.reads_failed,
        "Captured legacy contact state"
    );

    state
}

/// Write captured state into a freshly rebuilt schema.
///
/// Re-inserts preserved groups under their original ids as user groups and
/// stages one entry per contact that was a favorite or had a membership.
///
/// # Errors
///
/// Returns an error if a write fails. This runs inside the upgrade
/// transaction, so a failure rolls the whole upgrade back.
pub fn stage(conn: &Connection, captured: &CapturedState) -> Result<CaptureTally> {
    let mut phase = MigrationPhase::PendingCapture;
    let mut tally = captured.tally;

    for group in &captured.groups {
        conn.execute(
            "INSERT OR IGNORE INTO `groups` (id, name, created_at, is_system_group, system_id, account_name, account_type)
             VALUES (?1, ?2, ?3, 0, NULL, NULL, NULL)",
            rusqlite::params![group.id, group.name, group.created_at],
        )?;
    }

    staging::create(conn)?;
    for identifiers in captured.contacts.values() {
        if !identifiers.worth_preserving() {
            continue;
        }
        staging::insert(conn, &identifiers.to_staged())?;
        tally.entries_staged += 1;
    }

    phase = phase.advance(MigrationPhase::Staged)?;
    debug!(phase = phase.as_str(), "Preserver hand-off ready");
    info!(
        staged = tally.entries_staged,
        groups = tally.groups_preserved,
        "Staged contact state for post-sync restoration"
    );

    Ok(tally)
}
