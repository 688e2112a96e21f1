//! Duplicate contact detection.
//!
//! Two passes over the local replica. The name pass clusters contacts with
//! the same first and last name (case-insensitive); the phone pass clusters
//! the remaining contacts that share a phone number once punctuation is
//! stripped. A contact lands in at most one cluster: once the name pass
//! claims it, the phone pass never sees it.

use crate::error::Result;
use crate::model::{normalize_phone, Contact};
use crate::storage::SqliteStorage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Why contacts were clustered together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateReason {
    SameName,
    SamePhone,
    /// Reserved; no pass emits it yet.
    FuzzyName,
}

impl DuplicateReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SameName => "SAME_NAME",
            Self::SamePhone => "SAME_PHONE",
            Self::FuzzyName => "FUZZY_NAME",
        }
    }
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contacts that are very likely the same person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Seed contact first, then matches in input order.
    pub contact_ids: Vec<i64>,
    pub reason: DuplicateReason,
}

/// Cluster likely duplicates across every contact in the store.
///
/// # Errors
///
/// Returns an error if the contacts cannot be read.
pub fn find_duplicates(storage: &SqliteStorage) -> Result<Vec<DuplicateGroup>> {
    let contacts = storage.list_contacts()?;
    Ok(detect(&contacts))
}

/// Cluster likely duplicates among `contacts`.
///
/// Returns an empty list for fewer than two contacts.
#[must_use]
pub fn detect(contacts: &[Contact]) -> Vec<DuplicateGroup> {
    if contacts.len() < 2 {
        return Vec::new();
    }

    let mut processed: HashSet<i64> = HashSet::new();
    let mut groups = Vec::new();

    // Name pass
    for (i, seed) in contacts.iter().enumerate() {
        if processed.contains(&seed.id) || !seed.has_name() {
            continue;
        }
        let key = name_key(seed);
        let matches: Vec<i64> = contacts[i + 1..]
            .iter()
            .filter(|c| c.id != seed.id && !processed.contains(&c.id) && name_key(c) == key)
            .map(|c| c.id)
            .collect();

        if !matches.is_empty() {
            let mut ids = vec![seed.id];
            ids.extend(matches);
            processed.extend(ids.iter().copied());
            debug!(ids = ?ids, "Duplicate by name");
            groups.push(DuplicateGroup {
                contact_ids: ids,
                reason: DuplicateReason::SameName,
            });
        }
    }

    // Phone pass
    let digits: Vec<HashSet<String>> = contacts
        .iter()
        .map(|c| {
            c.phone_numbers
                .iter()
                .map(|p| normalize_phone(&p.number))
                .filter(|d| !d.is_empty())
                .collect()
        })
        .collect();

    for (i, seed) in contacts.iter().enumerate() {
        if processed.contains(&seed.id) || digits[i].is_empty() {
            continue;
        }
        let matches: Vec<i64> = contacts
            .iter()
            .enumerate()
            .skip(i + 1)
            .filter(|(j, c)| {
                c.id != seed.id
                    && !processed.contains(&c.id)
                    && !digits[i].is_disjoint(&digits[*j])
            })
            .map(|(_, c)| c.id)
            .collect();

        if !matches.is_empty() {
            let mut ids = vec![seed.id];
            ids.extend(matches);
            processed.extend(ids.iter().copied());
            debug!(ids = ?ids, "Duplicate by phone");
            groups.push(DuplicateGroup {
                contact_ids: ids,
                reason: DuplicateReason::SamePhone,
            });
        }
    }

    groups
}

fn name_key(contact: &Contact) -> (String, String) {
    (
        contact.first_name.to_lowercase(),
        contact.last_name.to_lowercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PhoneNumber;

    fn contact(id: i64, first: &str, last: &str, phones: &[&str]) -> Contact {
        let mut c = Contact::new(first, last);
        c.id = id;
        c.phone_numbers = phones.iter().map(|p| PhoneNumber::new(p, "MOBILE")).collect();
        c
    }

    #[test]
    fn test_find_duplicates_reads_the_store() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(find_duplicates(&storage).unwrap().is_empty());

        let a = storage
            .insert_contact(&contact(0, "John", "Doe", &["(123) 456-7890"]))
            .unwrap();
        let b = storage
            .insert_contact(&contact(0, "JOHN", "doe", &[]))
            .unwrap();
        storage
            .insert_contact(&contact(0, "Alice", "Anderson", &["111-1111"]))
            .unwrap();

        let groups = find_duplicates(&storage).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reason, DuplicateReason::SameName);
        assert_eq!(groups[0].contact_ids, vec![a, b]);
    }

    #[test]
    fn test_fewer_than_two_contacts() {
        assert!(detect(&[]).is_empty());
        assert!(detect(&[contact(1, "John", "Doe", &[])]).is_empty());
    }

    #[test]
    fn test_same_name_any_case() {
        let groups = detect(&[
            contact(1, "John", "Doe", &[]),
            contact(2, "john", "DOE", &[]),
        ]);
        assert_eq!(
            groups,
            vec![DuplicateGroup {
                contact_ids: vec![1, 2],
                reason: DuplicateReason::SameName
            }]
        );
    }

    #[test]
    fn test_same_phone_after_normalization() {
        let groups = detect(&[
            contact(1, "Johnny", "", &["(123) 456-7890"]),
            contact(2, "J", "D", &["123-456-7890"]),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reason, DuplicateReason::SamePhone);
        assert_eq!(groups[0].contact_ids, vec![1, 2]);
    }

    #[test]
    fn test_distinct_contacts_are_not_duplicates() {
        let groups = detect(&[
            contact(1, "Alice", "Anderson", &["111-1111"]),
            contact(2, "Bob", "Brown", &["222-2222"]),
        ]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_name_pass_claims_contacts_first() {
        let groups = detect(&[
            contact(1, "John", "Doe", &["555"]),
            contact(2, "John", "Doe", &[]),
            contact(3, "Other", "Person", &["555"]),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].contact_ids, vec![1, 2]);
    }

    #[test]
    fn test_blank_names_never_cluster_by_name() {
        let groups = detect(&[contact(1, "", "", &[]), contact(2, " ", "", &[])]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_phones_without_digits_ignored() {
        let groups = detect(&[
            contact(1, "A", "One", &["n/a"]),
            contact(2, "B", "Two", &["none"]),
        ]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_string(&DuplicateReason::SamePhone).unwrap();
        assert_eq!(json, "\"SAME_PHONE\"");
        assert_eq!(DuplicateReason::FuzzyName.to_string(), "FUZZY_NAME");
    }
}
