//! Merge command implementation.

use crate::cli::commands::open_storage;
use crate::error::{Error, Result};
use crate::merge::{merge, validate_ids};
use std::path::PathBuf;

/// Execute the merge command.
///
/// # Errors
///
/// Returns an error if fewer than two ids are given, an id is repeated or
/// missing, or the merge cannot be committed.
pub fn execute(
    db_path: Option<&PathBuf>,
    ids: &[i64],
    target: Option<i64>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;

    if crate::is_dry_run() {
        validate_ids(ids)?;
        let missing: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| !matches!(storage.get_contact(*id), Ok(Some(_))))
            .collect();
        if !missing.is_empty() {
            return Err(Error::ContactsNotFound { missing });
        }
        let survivor = target.filter(|t| ids.contains(t)).or_else(|| ids.first().copied());
        if json {
            let output = serde_json::json!({
                "dry_run": true,
                "action": "merge",
                "ids": ids,
                "target": survivor,
            });
            println!("{output}");
        } else if let Some(survivor) = survivor {
            println!("Would merge {} contacts into {survivor}", ids.len());
        }
        return Ok(());
    }

    let survivor = merge(&mut storage, ids, target)?;

    if json {
        let removed: Vec<i64> = ids.iter().copied().filter(|id| *id != survivor).collect();
        let output = serde_json::json!({
            "id": survivor,
            "removed": removed,
        });
        println!("{output}");
    } else {
        println!("Merged {} contacts into {survivor}", ids.len());
    }
    Ok(())
}
