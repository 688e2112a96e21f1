//! Status command implementation.

use crate::cli::commands::open_storage;
use crate::config::{resolve_db_path, resolve_snapshot_path};
use crate::error::Result;
use crate::preserve::{pending_phase, MigrationPhase};
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use crate::storage::StoreCounts;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    database: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    schema_version: i32,
    counts: StoreCounts,
    pending_restoration: Option<MigrationPhase>,
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the database is missing or cannot be read.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let counts = storage.counts()?;
    let pending = pending_phase(storage.conn())?;
    let schema_version: i32 = storage
        .conn()
        .query_row("PRAGMA user_version", [], |row| row.get(0))?;

    let database = resolve_db_path(db_path.map(PathBuf::as_path));
    let snapshot = resolve_snapshot_path(None).ok();

    if json {
        let output = StatusOutput {
            database,
            snapshot,
            schema_version,
            counts,
            pending_restoration: pending,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "contactsync status".bold());
    println!("==================");
    if let Some(path) = &database {
        println!("Database: {}", path.display());
    }
    if let Some(path) = &snapshot {
        println!("Snapshot: {}", path.display());
    }
    println!("Schema:   v{schema_version} (current v{CURRENT_SCHEMA_VERSION})");
    println!();
    println!("Contacts:    {}", counts.contacts);
    println!("  Favorites: {}", counts.favorites);
    println!(
        "Groups:      {} ({} system)",
        counts.groups, counts.system_groups
    );
    println!("Memberships: {}", counts.memberships);

    if pending.is_some() {
        println!();
        println!(
            "{}",
            format!(
                "Restoration pending: {} staged entries. Run `csync sync` or `csync restore`.",
                counts.staged_entries
            )
            .yellow()
        );
    }
    Ok(())
}
