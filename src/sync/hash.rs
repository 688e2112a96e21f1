//! Content hashing for change detection.
//!
//! A contact's change signature is serialized to JSON and hashed with
//! SHA256. Two sides are considered equal when their hashes match.

use crate::error::Result;
use crate::model::Contact;
use crate::provider::ProviderContact;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute a SHA256 hash of a serializable value.
///
/// The value is first serialized to JSON, then hashed, giving a
/// deterministic hex fingerprint of its content.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// The fields a sync pass compares to decide whether a contact needs an
/// update: display name, photo reference and favorite flag.
///
/// Child collections are not part of the signature. A contact whose only
/// change is a phone number is left untouched by sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSignature {
    pub display_name: String,
    pub photo_uri: Option<String>,
    pub is_favorite: bool,
}

impl ChangeSignature {
    /// Signature of a provider contact.
    ///
    /// The display name is taken in its split-and-rejoined form so that
    /// stray whitespace in the provider's name does not cause an update on
    /// every pass.
    #[must_use]
    pub fn of_provider(contact: &ProviderContact) -> Self {
        let (first, last) = contact.name_parts();
        Self {
            display_name: join_name(&first, &last),
            photo_uri: contact.photo_uri.clone(),
            is_favorite: contact.is_favorite,
        }
    }

    /// Signature of a local contact.
    #[must_use]
    pub fn of_local(contact: &Contact) -> Self {
        Self {
            display_name: contact.full_name(),
            photo_uri: contact.photo_uri.clone(),
            is_favorite: contact.is_favorite,
        }
    }

    /// SHA256 of the serialized signature.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn hash(&self) -> Result<String> {
        content_hash(self)
    }
}

fn join_name(first: &str, last: &str) -> String {
    format!("{first} {last}").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestRecord {
        id: String,
        value: i32,
    }

    #[test]
    fn test_content_hash_deterministic() {
        let record = TestRecord {
            id: "test_1".into(),
            value: 42,
        };

        let hash1 = content_hash(&record).unwrap();
        let hash2 = content_hash(&record).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_signature_matches_after_name_split() {
        let provider = ProviderContact {
            id: 1,
            display_name: "  Ann   Lee ".to_string(),
            ..ProviderContact::default()
        };
        let local = Contact::new("Ann", "Lee");

        assert_eq!(
            ChangeSignature::of_provider(&provider).hash().unwrap(),
            ChangeSignature::of_local(&local).hash().unwrap()
        );
    }

    #[test]
    fn test_signature_ignores_child_collections() {
        let mut local = Contact::new("Ann", "Lee");
        let before = ChangeSignature::of_local(&local).hash().unwrap();
        local
            .phone_numbers
            .push(crate::model::PhoneNumber::new("555", "MOBILE"));
        assert_eq!(before, ChangeSignature::of_local(&local).hash().unwrap());

        local.is_favorite = true;
        assert_ne!(before, ChangeSignature::of_local(&local).hash().unwrap());
    }
}
