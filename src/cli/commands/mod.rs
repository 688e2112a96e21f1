//! Command implementations.

pub mod completions;
pub mod contacts;
pub mod duplicates;
pub mod groups;
pub mod init;
pub mod merge;
pub mod restore;
pub mod status;
pub mod sync;
pub mod version;

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use std::path::PathBuf;

/// Open the database for a command, failing if it was never initialized.
///
/// # Errors
///
/// Returns [`Error::NotInitialized`] if the database file doesn't exist.
pub fn open_storage(db_path: Option<&PathBuf>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    SqliteStorage::open(&db_path)
}
