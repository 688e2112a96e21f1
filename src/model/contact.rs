//! Contact model for contactsync.
//!
//! A contact is owned by the local replica. Its child collections (phones,
//! emails, addresses, websites, instant messages, events) belong to the
//! contact and are rewritten wholesale whenever the contact is updated.

use serde::{Deserialize, Serialize};

/// A fully hydrated contact record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Local identifier. Zero means "not yet assigned"; contacts that come
    /// from a sync pass reuse the provider's identifier.
    #[serde(default)]
    pub id: i64,

    pub prefix: Option<String>,
    #[serde(default)]
    pub first_name: String,
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: String,
    pub suffix: Option<String>,
    pub nickname: Option<String>,

    pub photo_uri: Option<String>,
    pub organization: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,

    /// ISO date (YYYY-MM-DD)
    pub birthday: Option<String>,
    pub ringtone: Option<String>,

    #[serde(default)]
    pub is_favorite: bool,

    /// Display label for where the contact came from ("Google", "SIM", ...)
    #[serde(default)]
    pub source: String,
    pub account_name: Option<String>,
    pub account_type: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    #[serde(default)]
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    #[serde(default)]
    pub updated_at: i64,

    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default)]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub websites: Vec<Website>,
    #[serde(default)]
    pub instant_messages: Vec<InstantMessage>,
    #[serde(default)]
    pub events: Vec<Event>,

    /// Group memberships (group ids)
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

impl Contact {
    /// Create an unsaved contact with the given name.
    #[must_use]
    pub fn new(first_name: &str, last_name: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    /// Human-readable name built from the structured name fields.
    ///
    /// Falls back to the nickname, then to "Unnamed Contact".
    #[must_use]
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [
            self.prefix.as_deref(),
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.last_name.as_str()),
            self.suffix.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();

        if parts.is_empty() {
            self.nickname
                .clone()
                .unwrap_or_else(|| "Unnamed Contact".to_string())
        } else {
            parts.join(" ")
        }
    }

    /// "first last" with surrounding whitespace removed.
    ///
    /// This is the form the provider's display name is compared against.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    #[must_use]
    pub fn primary_phone(&self) -> Option<&PhoneNumber> {
        self.phone_numbers.first()
    }

    #[must_use]
    pub fn primary_email(&self) -> Option<&Email> {
        self.emails.first()
    }

    /// Whether either name field carries non-whitespace text.
    #[must_use]
    pub fn has_name(&self) -> bool {
        !self.first_name.trim().is_empty() || !self.last_name.trim().is_empty()
    }
}

/// A phone number attached to a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub number: String,
    /// MOBILE, HOME, WORK, FAX, PAGER, OTHER or CUSTOM
    #[serde(rename = "type", default = "default_phone_type")]
    pub kind: String,
}

impl PhoneNumber {
    #[must_use]
    pub fn new(number: &str, kind: &str) -> Self {
        Self {
            id: None,
            number: number.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Digits only. "(123) 456-7890" and "123-456-7890" normalize equal.
    #[must_use]
    pub fn normalized(&self) -> String {
        normalize_phone(&self.number)
    }
}

/// Strip every non-digit character from a phone number.
#[must_use]
pub fn normalize_phone(number: &str) -> String {
    number.chars().filter(char::is_ascii_digit).collect()
}

fn default_phone_type() -> String {
    "MOBILE".to_string()
}

fn default_home_type() -> String {
    "HOME".to_string()
}

fn default_other_type() -> String {
    "OTHER".to_string()
}

/// An email address attached to a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub email: String,
    /// HOME, WORK, OTHER or CUSTOM
    #[serde(rename = "type", default = "default_home_type")]
    pub kind: String,
}

impl Email {
    #[must_use]
    pub fn new(email: &str, kind: &str) -> Self {
        Self {
            id: None,
            email: email.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// A postal address attached to a contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(rename = "type", default = "default_home_type")]
    pub kind: String,
}

impl Address {
    /// Multi-line formatted address.
    ///
    /// Street, then "city, state postal", then country. Blank parts are
    /// omitted, so an empty address formats to an empty string.
    #[must_use]
    pub fn formatted(&self) -> String {
        let region = [self.state.trim(), self.postal_code.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let locality = [self.city.trim(), region.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        [self.street.trim(), locality.as_str(), self.country.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub url: String,
    #[serde(rename = "type", default = "default_other_type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub handle: String,
    #[serde(default = "default_other_type")]
    pub protocol: String,
}

/// A dated event (anniversary, custom event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// YYYY-MM-DD, or --MM-DD for recurring dates without a year
    pub date: String,
    #[serde(rename = "type", default = "default_other_type")]
    pub kind: String,
}
