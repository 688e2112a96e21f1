//! Duplicates command implementation.

use crate::cli::commands::open_storage;
use crate::duplicates::{find_duplicates, DuplicateGroup};
use crate::error::Result;
use crate::model::Contact;
use colored::Colorize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Serialize)]
struct DuplicatesOutput {
    count: usize,
    groups: Vec<DuplicateGroup>,
}

/// Execute the duplicates command.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let groups = find_duplicates(&storage)?;

    if json {
        let output = DuplicatesOutput {
            count: groups.len(),
            groups,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No likely duplicates.");
        return Ok(());
    }

    let contacts = storage.list_contacts()?;
    let by_id: HashMap<i64, &Contact> = contacts.iter().map(|c| (c.id, c)).collect();
    for (i, group) in groups.iter().enumerate() {
        println!(
            "{} {}",
            format!("#{}", i + 1).cyan().bold(),
            format!("[{}]", group.reason).dimmed()
        );
        for id in &group.contact_ids {
            let name = by_id
                .get(id)
                .map_or_else(String::new, |c| c.display_name());
            println!("  {:>6}  {name}", id.to_string().dimmed());
        }
        let ids: Vec<String> = group.contact_ids.iter().map(ToString::to_string).collect();
        println!("  {}", format!("csync merge {}", ids.join(" ")).dimmed());
    }
    Ok(())
}
