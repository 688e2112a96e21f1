//! Restore command implementation.
//!
//! Runs the restoration phase on its own, for a store whose contacts were
//! repopulated by some other means than `csync sync`.

use crate::cli::commands::open_storage;
use crate::cli::commands::sync::print_restore;
use crate::error::Result;
use crate::preserve::{self, pending_phase};
use std::path::PathBuf;

/// Execute the restore command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the staging table
/// cannot be dropped.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;

    if crate::is_dry_run() {
        let phase = pending_phase(storage.conn())?;
        let staged = storage.counts()?.staged_entries;
        if json {
            let output = serde_json::json!({
                "dry_run": true,
                "action": "restore",
                "phase": phase,
                "staged_entries": staged,
            });
            println!("{output}");
        } else if phase.is_some() {
            println!("Would restore {staged} staged entries");
        } else {
            println!("Nothing staged.");
        }
        return Ok(());
    }

    let report = preserve::restore(&mut storage)?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else if report.phase.is_none() {
        println!("Nothing staged.");
    } else {
        print_restore(&report);
    }
    Ok(())
}
