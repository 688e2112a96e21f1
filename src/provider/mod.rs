//! Provider adapter.
//!
//! The provider is the authoritative, read-only contact source outside the
//! local replica (a device contact store, an exported snapshot). Sync passes
//! consume it through the [`ContactProvider`] trait so the source can be
//! swapped without touching reconciliation.

mod snapshot;

use crate::error::Result;
use crate::model::{Address, Email, PhoneNumber};
use serde::{Deserialize, Serialize};

pub use snapshot::{JsonFileProvider, Snapshot};

/// Read access to the external contact source.
pub trait ContactProvider {
    /// Every contact the provider knows about, fully populated.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Provider`] if the source cannot be read.
    fn contacts(&self) -> Result<Vec<ProviderContact>>;

    /// Every group the provider knows about, one row per (group, account).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Provider`] if the source cannot be read.
    fn groups(&self) -> Result<Vec<ProviderGroup>>;
}

/// A contact as the provider reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderContact {
    pub id: i64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_favorite: bool,
    pub photo_uri: Option<String>,
    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default)]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Raw provider group ids (before deduplication)
    #[serde(default)]
    pub group_ids: Vec<i64>,
    /// Display label; derived from `account_type` when absent
    pub source: Option<String>,
    pub account_name: Option<String>,
    pub account_type: Option<String>,
}

impl ProviderContact {
    /// Source label, falling back to one derived from the account type.
    #[must_use]
    pub fn source_label(&self) -> String {
        match self.source.as_deref() {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => account_display_name(self.account_type.as_deref()),
        }
    }

    /// First and last name derived from the display name.
    #[must_use]
    pub fn name_parts(&self) -> (String, String) {
        split_display_name(&self.display_name)
    }
}

/// A group row as the provider reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderGroup {
    pub id: i64,
    pub title: String,
    pub system_id: Option<String>,
    pub account_name: Option<String>,
    pub account_type: Option<String>,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub contact_count: i64,
}

fn default_visible() -> bool {
    true
}

/// Split a display name at its first space.
///
/// The first name is everything before the first space of the trimmed name
/// and the last name is the (trimmed) remainder. Both are empty strings,
/// never absent, for a blank display name.
#[must_use]
pub fn split_display_name(display_name: &str) -> (String, String) {
    let trimmed = display_name.trim();
    match trimmed.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Human-readable label for a raw account type.
///
/// Known account families map to fixed labels; anything else uses the last
/// dot-separated segment of the type, capitalized. No account means the
/// contact lives on the device itself.
#[must_use]
pub fn account_display_name(account_type: Option<&str>) -> String {
    let Some(raw) = account_type else {
        return "Phone".to_string();
    };
    let lower = raw.to_lowercase();

    let known = [
        ("google", "Google"),
        ("whatsapp", "WhatsApp"),
        ("telegram", "Telegram"),
        ("signal", "Signal"),
        ("viber", "Viber"),
        ("microsoft", "Microsoft"),
        ("hotmail", "Microsoft"),
        ("yahoo", "Yahoo"),
        ("sim", "SIM"),
        ("phone", "Phone"),
    ];
    if let Some((_, label)) = known.iter().find(|(needle, _)| lower.contains(needle)) {
        return (*label).to_string();
    }

    let segment = raw.rsplit('.').next().unwrap_or(raw);
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
