//! Initialize the local contact database.
//!
//! Creates the database file at the resolved path and applies the current
//! schema. An existing database is left alone unless `--force` is given.

use crate::config::{ensure_parent_dir, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    schema_version: i32,
    replaced: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] if the database exists and `force`
/// is not set, or an error if the directory or database cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or_else(|| {
        Error::Config("Could not determine the database location".to_string())
    })?;

    let exists = db_path.exists();
    if exists && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    if exists {
        remove_database(&db_path)?;
    }
    ensure_parent_dir(&db_path)?;

    // Opening applies the schema
    SqliteStorage::open(&db_path)?;

    if json {
        let output = InitOutput {
            database: db_path,
            schema_version: CURRENT_SCHEMA_VERSION,
            replaced: exists,
        };
        let payload = serde_json::to_string(&output)?;
        println!("{payload}");
    } else {
        println!("Initialized contact database");
        println!("  Database: {}", db_path.display());
        println!();
        println!("Next: Run 'csync sync --snapshot <file>' to import contacts.");
    }

    Ok(())
}

/// Remove a database file and its WAL sidecars.
fn remove_database(path: &Path) -> Result<()> {
    fs::remove_file(path)?;
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            fs::remove_file(sidecar)?;
        }
    }
    Ok(())
}
