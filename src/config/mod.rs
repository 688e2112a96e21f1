//! Configuration management.
//!
//! This module resolves where the local replica and the provider snapshot
//! live. Everything defaults to a per-user directory:
//!
//! - **Database**: `~/.contactsync/data/contacts.db`
//! - **Provider snapshot**: `~/.contactsync/provider/snapshot.json`
//!
//! Both can be overridden by flags or environment variables.

use crate::error::{Error, Result};

use std::path::{Path, PathBuf};

/// Get the global contactsync directory location (`~/.contactsync/`).
#[must_use]
pub fn global_contactsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".contactsync"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `CSYNC_TEST_DB=1` (or any non-empty value).
/// This redirects all database operations to an isolated test database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("CSYNC_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path (`~/.contactsync/test/contacts.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_contactsync_dir().map(|dir| dir.join("test").join("contacts.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `CSYNC_TEST_DB` environment variable → uses test database
/// 3. `CONTACTSYNC_DB` environment variable
/// 4. Global location: `~/.contactsync/data/contacts.db`
///
/// Returns `None` if no home directory can be found.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Some(path) = non_empty_env("CONTACTSYNC_DB") {
        return Some(path);
    }

    global_contactsync_dir().map(|dir| dir.join("data").join("contacts.db"))
}

/// Resolve the provider snapshot path.
///
/// Priority:
/// 1. `explicit_path` (the `--snapshot` flag)
/// 2. `CONTACTSYNC_SNAPSHOT` environment variable
/// 3. Global location: `~/.contactsync/provider/snapshot.json`
///
/// # Errors
///
/// Returns [`Error::Config`] if no location can be determined.
pub fn resolve_snapshot_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = non_empty_env("CONTACTSYNC_SNAPSHOT") {
        return Ok(path);
    }

    global_contactsync_dir()
        .map(|dir| dir.join("provider").join("snapshot.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
}

fn non_empty_env(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Create the parent directory of a database path if it is missing.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
