//! Group model for contactsync.

use serde::{Deserialize, Serialize};

/// A contact group.
///
/// System groups mirror groups the provider knows about; user groups exist
/// only in the local replica (including groups preserved across a
/// destructive schema upgrade).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,

    /// Creation timestamp (Unix milliseconds)
    #[serde(default)]
    pub created_at: i64,

    #[serde(default)]
    pub is_system_group: bool,

    /// Provider-side identifier shared by every per-account copy of a
    /// built-in group ("Starred in Android", "Contacts", ...)
    pub system_id: Option<String>,
    pub account_name: Option<String>,
    pub account_type: Option<String>,

    /// Number of member contacts. Derived from memberships on read, never
    /// written.
    #[serde(default)]
    pub contact_count: i64,
}

impl Group {
    /// Create an unsaved user group.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            ..Self::default()
        }
    }
}
