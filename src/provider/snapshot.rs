//! Snapshot-backed providers.

use super::{ContactProvider, ProviderContact, ProviderGroup};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An immutable provider snapshot: every contact and group at one moment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub contacts: Vec<ProviderContact>,
    #[serde(default)]
    pub groups: Vec<ProviderGroup>,
}

impl Snapshot {
    /// Parse a snapshot from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the text is not a valid snapshot.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Provider(format!("invalid snapshot: {e}")))
    }
}

impl ContactProvider for Snapshot {
    fn contacts(&self) -> Result<Vec<ProviderContact>> {
        Ok(self.contacts.clone())
    }

    fn groups(&self) -> Result<Vec<ProviderGroup>> {
        Ok(self.groups.clone())
    }
}

/// Provider that reads a JSON [`Snapshot`] from disk on every call.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Snapshot> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Error::Provider(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let snapshot = Snapshot::from_json(&text)?;
        debug!(
            path = %self.path.display(),
            contacts = snapshot.contacts.len(),
            groups = snapshot.groups.len(),
            "Loaded provider snapshot"
        );
        Ok(snapshot)
    }
}

impl ContactProvider for JsonFileProvider {
    fn contacts(&self) -> Result<Vec<ProviderContact>> {
        Ok(self.load()?.contacts)
    }

    fn groups(&self) -> Result<Vec<ProviderGroup>> {
        Ok(self.load()?.groups)
    }
}
