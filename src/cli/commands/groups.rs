//! Group command implementations.

use crate::cli::commands::open_storage;
use crate::cli::commands::sync::print_groups;
use crate::cli::GroupCommands;
use crate::config::resolve_snapshot_path;
use crate::error::Result;
use crate::model::Group;
use crate::provider::{ContactProvider, JsonFileProvider};
use crate::sync::{deduplicate_with_aliases, sync_groups};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct GroupListOutput {
    count: usize,
    groups: Vec<Group>,
}

/// Execute group commands.
///
/// # Errors
///
/// Returns an error if the database or provider cannot be read.
pub fn execute(command: &GroupCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        GroupCommands::List => list(db_path, json),
        GroupCommands::Sync { snapshot } => sync(db_path, snapshot.as_ref(), json),
    }
}

fn list(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let groups = storage.list_groups()?;

    if json {
        let output = GroupListOutput {
            count: groups.len(),
            groups,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No groups.");
        return Ok(());
    }

    for group in &groups {
        let kind = if group.is_system_group { "system" } else { "user" };
        println!(
            "{:>6}  {}  ({} contacts) {}",
            group.id.to_string().dimmed(),
            group.name.bold(),
            group.contact_count,
            format!("[{kind}]").dimmed()
        );
    }
    Ok(())
}

fn sync(db_path: Option<&PathBuf>, snapshot: Option<&PathBuf>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let snapshot_path = resolve_snapshot_path(snapshot.map(PathBuf::as_path))?;
    let provider = JsonFileProvider::new(snapshot_path);

    let raw = provider.groups()?;
    let deduplicated = deduplicate_with_aliases(&raw);
    let stats = sync_groups(&mut storage, &deduplicated, raw.len(), crate::is_dry_run())?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "dry_run": crate::is_dry_run(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_groups(&stats);
    }
    Ok(())
}
