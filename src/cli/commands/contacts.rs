//! Contact command implementations.

use crate::cli::commands::open_storage;
use crate::cli::ContactCommands;
use crate::error::{Error, Result};
use crate::model::Contact;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ContactListOutput {
    count: usize,
    contacts: Vec<Contact>,
}

/// Execute contact commands.
///
/// # Errors
///
/// Returns an error if the database cannot be read or the contact is missing.
pub fn execute(command: &ContactCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        ContactCommands::List { favorites, group } => list(db_path, *favorites, *group, json),
        ContactCommands::Show { id } => show(db_path, *id, json),
        ContactCommands::Favorite { id, off } => favorite(db_path, *id, !*off, json),
    }
}

fn list(db_path: Option<&PathBuf>, favorites: bool, group: Option<i64>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;

    if let Some(group_id) = group {
        if storage.get_group(group_id)?.is_none() {
            return Err(Error::GroupNotFound { id: group_id });
        }
    }

    let contacts: Vec<Contact> = storage
        .list_contacts()?
        .into_iter()
        .filter(|c| !favorites || c.is_favorite)
        .filter(|c| group.is_none_or(|g| c.group_ids.contains(&g)))
        .collect();

    if json {
        let output = ContactListOutput {
            count: contacts.len(),
            contacts,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if contacts.is_empty() {
        println!("No contacts.");
        return Ok(());
    }

    for contact in &contacts {
        let star = if contact.is_favorite { "★" } else { " " };
        let phone = contact
            .primary_phone()
            .map(|p| p.number.as_str())
            .unwrap_or_default();
        println!(
            "{:>6} {} {}  {}",
            contact.id.to_string().dimmed(),
            star.yellow(),
            contact.display_name().bold(),
            phone.dimmed()
        );
    }
    println!();
    println!("{} contacts", contacts.len());
    Ok(())
}

fn show(db_path: Option<&PathBuf>, id: i64, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let contact = storage
        .get_contact(id)?
        .ok_or(Error::ContactNotFound { id })?;

    if json {
        println!("{}", serde_json::to_string(&contact)?);
        return Ok(());
    }

    let star = if contact.is_favorite { " ★" } else { "" };
    println!("{}{}", contact.display_name().bold(), star.yellow());
    println!("  ID:     {}", contact.id);
    println!("  Source: {}", contact.source);
    if let Some(org) = &contact.organization {
        println!("  Org:    {org}");
    }

    for phone in &contact.phone_numbers {
        println!("  {} {}", format!("[{}]", phone.kind).dimmed(), phone.number);
    }
    for email in &contact.emails {
        println!("  {} {}", format!("[{}]", email.kind).dimmed(), email.email);
    }
    for address in &contact.addresses {
        let formatted = address.formatted().replace('\n', ", ");
        println!("  {} {formatted}", format!("[{}]", address.kind).dimmed());
    }
    if !contact.group_ids.is_empty() {
        let names: Vec<String> = contact
            .group_ids
            .iter()
            .map(|gid| {
                storage
                    .get_group(*gid)
                    .ok()
                    .flatten()
                    .map_or_else(|| gid.to_string(), |g| g.name)
            })
            .collect();
        println!("  Groups: {}", names.join(", "));
    }
    if let Some(notes) = &contact.notes {
        println!();
        println!("{notes}");
    }
    Ok(())
}

fn favorite(db_path: Option<&PathBuf>, id: i64, on: bool, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;

    if crate::is_dry_run() {
        if storage.get_contact(id)?.is_none() {
            return Err(Error::ContactNotFound { id });
        }
        if json {
            let output = serde_json::json!({
                "dry_run": true,
                "action": "set_favorite",
                "id": id,
                "favorite": on,
            });
            println!("{output}");
        } else {
            println!("Would set favorite={on} on contact {id}");
        }
        return Ok(());
    }

    storage.set_favorite(id, on)?;

    if json {
        let output = serde_json::json!({ "id": id, "favorite": on });
        println!("{output}");
    } else if on {
        println!("Marked contact {id} as favorite");
    } else {
        println!("Cleared favorite on contact {id}");
    }
    Ok(())
}
