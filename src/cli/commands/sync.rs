//! Sync command implementation.
//!
//! Reads the provider snapshot and runs one full pass: groups, contacts,
//! then any restoration left pending by a schema upgrade.

use crate::cli::commands::open_storage;
use crate::config::resolve_snapshot_path;
use crate::error::Result;
use crate::preserve::RestoreReport;
use crate::provider::JsonFileProvider;
use crate::sync::{run_pass, GroupSyncStats, SyncReport};
use colored::Colorize;
use std::path::PathBuf;

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if the database is missing, the snapshot cannot be
/// read, or a batch write fails.
pub fn execute(db_path: Option<&PathBuf>, snapshot: Option<&PathBuf>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let snapshot_path = resolve_snapshot_path(snapshot.map(PathBuf::as_path))?;
    let provider = JsonFileProvider::new(&snapshot_path);
    let dry_run = crate::is_dry_run();

    let report = run_pass(&mut storage, &provider, dry_run)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "snapshot": snapshot_path.display().to_string(),
            "report": report,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &SyncReport) {
    if report.dry_run {
        println!("{}", "Dry run: nothing was written".yellow());
        println!();
    }

    match &report.groups {
        Some(groups) => print_groups(groups),
        None => println!("{}", "Groups: skipped (provider groups unavailable)".yellow()),
    }

    let c = &report.contacts;
    println!("{}", "Contacts".cyan().bold());
    println!("  Inserted:  {}", c.inserted);
    println!("  Updated:   {}", c.updated);
    println!("  Deleted:   {}", c.deleted);
    println!("  Unchanged: {}", c.unchanged.to_string().dimmed());

    if let Some(restore) = &report.restore {
        print_restore(restore);
    }
}

pub(crate) fn print_groups(groups: &GroupSyncStats) {
    println!("{}", "Groups".cyan().bold());
    println!(
        "  {} provider rows → {} groups",
        groups.raw, groups.deduplicated
    );
    println!(
        "  Inserted: {}  Updated: {}  Deleted: {}",
        groups.inserted, groups.updated, groups.deleted
    );
}

pub(crate) fn print_restore(restore: &RestoreReport) {
    let Some(phase) = restore.phase else {
        return;
    };
    println!("{} ({})", "Restoration".cyan().bold(), phase.as_str());
    println!("  Restored:  {}", restore.restored);
    println!("  Unmatched: {}", restore.unmatched);
    println!(
        "  Favorites: {}  Memberships: {} (skipped {})",
        restore.favorites_restored, restore.memberships_restored, restore.memberships_skipped
    );
}
