//! Contact merging.
//!
//! Folds several contacts into one surviving record. The survivor keeps its
//! own non-blank scalar fields and borrows the rest from the other contacts
//! in input order; child collections are unioned without duplicates.

use crate::error::{Error, Result};
use crate::model::{Address, Contact, Email, Event, InstantMessage, PhoneNumber, Website};
use crate::storage::SqliteStorage;
use std::collections::HashSet;
use std::hash::Hash;
use tracing::info;

/// Merge `contact_ids` into one contact and delete the rest.
///
/// The survivor is `target_id` when it names one of the listed contacts,
/// otherwise the first id. The update and the deletes commit together.
///
/// Returns the survivor's id.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for fewer than two ids or a repeated
/// id, and [`Error::ContactsNotFound`] if any id does not resolve.
pub fn merge(
    storage: &mut SqliteStorage,
    contact_ids: &[i64],
    target_id: Option<i64>,
) -> Result<i64> {
    validate_ids(contact_ids)?;

    let mut contacts = Vec::with_capacity(contact_ids.len());
    let mut missing = Vec::new();
    for &id in contact_ids {
        match storage.get_contact(id)? {
            Some(contact) => contacts.push(contact),
            None => missing.push(id),
        }
    }
    if !missing.is_empty() {
        return Err(Error::ContactsNotFound { missing });
    }

    let target_index = target_id
        .and_then(|t| contacts.iter().position(|c| c.id == t))
        .unwrap_or(0);
    let target = contacts.remove(target_index);
    let merged = merge_contacts(&target, &contacts);
    let removed: Vec<i64> = contacts.iter().map(|c| c.id).collect();

    storage.commit_merge(&merged, &removed)?;

    info!(survivor = merged.id, removed = ?removed, "Merged contacts");
    Ok(merged.id)
}

/// Check a merge id list before anything is read: at least two ids, none
/// repeated.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when either rule is broken.
pub fn validate_ids(contact_ids: &[i64]) -> Result<()> {
    if contact_ids.len() < 2 {
        return Err(Error::InvalidArgument(
            "Need at least 2 contacts to merge".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = contact_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(Error::InvalidArgument(format!(
            "Contact {dup} listed more than once"
        )));
    }
    Ok(())
}

/// Combine `target` with `others` without touching storage.
///
/// Child entries in the result carry no ids, so the store assigns fresh
/// ones when the merged contact is written.
#[must_use]
pub fn merge_contacts(target: &Contact, others: &[Contact]) -> Contact {
    let mut merged = target.clone();

    fill_string(&mut merged.first_name, others.iter().map(|c| &c.first_name));
    fill_string(&mut merged.last_name, others.iter().map(|c| &c.last_name));
    fill_option(&mut merged.organization, others.iter().map(|c| &c.organization));
    fill_option(&mut merged.title, others.iter().map(|c| &c.title));
    fill_option(&mut merged.photo_uri, others.iter().map(|c| &c.photo_uri));

    let all: Vec<&Contact> = std::iter::once(target).chain(others).collect();

    merged.phone_numbers = union_by(&all, |c| &c.phone_numbers, |p| p.number.clone())
        .into_iter()
        .map(|p| PhoneNumber { id: None, ..p })
        .collect();
    merged.emails = union_by(&all, |c| &c.emails, |e| e.email.to_lowercase())
        .into_iter()
        .map(|e| Email { id: None, ..e })
        .collect();
    merged.addresses = union_by(&all, |c| &c.addresses, Address::formatted)
        .into_iter()
        .map(|a| Address { id: None, ..a })
        .collect();
    merged.websites = union_by(&all, |c| &c.websites, |w| w.url.clone())
        .into_iter()
        .map(|w| Website { id: None, ..w })
        .collect();
    merged.instant_messages = union_by(
        &all,
        |c| &c.instant_messages,
        |m| (m.handle.clone(), m.protocol.clone()),
    )
    .into_iter()
    .map(|m| InstantMessage { id: None, ..m })
    .collect();
    merged.events = union_by(&all, |c| &c.events, |e| (e.date.clone(), e.kind.clone()))
        .into_iter()
        .map(|e| Event { id: None, ..e })
        .collect();
    merged.group_ids = union_by(&all, |c| &c.group_ids, |g| *g);

    merged.notes = merge_notes(&all);
    merged.is_favorite = all.iter().any(|c| c.is_favorite);

    merged
}

fn fill_string<'a>(value: &mut String, mut candidates: impl Iterator<Item = &'a String>) {
    if !value.trim().is_empty() {
        return;
    }
    if let Some(found) = candidates.find(|s| !s.trim().is_empty()) {
        value.clone_from(found);
    }
}

fn fill_option<'a>(value: &mut Option<String>, candidates: impl Iterator<Item = &'a Option<String>>) {
    if value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        return;
    }
    if let Some(found) = candidates.flatten().find(|s| !s.trim().is_empty()) {
        *value = Some(found.clone());
    }
}

/// Every entry of every contact's collection, first occurrence of each key
/// kept, in contact order.
fn union_by<T, K, F, G>(contacts: &[&Contact], items: F, key: G) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&Contact) -> &Vec<T>,
    G: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for contact in contacts {
        for item in items(*contact) {
            if seen.insert(key(item)) {
                out.push(item.clone());
            }
        }
    }
    out
}

fn merge_notes(contacts: &[&Contact]) -> Option<String> {
    let mut bodies: Vec<&str> = Vec::new();
    for note in contacts.iter().filter_map(|c| c.notes.as_deref()) {
        let note = note.trim();
        if !note.is_empty() && !bodies.contains(&note) {
            bodies.push(note);
        }
    }
    (!bodies.is_empty()).then(|| bodies.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Group;

    fn with_phones(first: &str, last: &str, phones: &[&str]) -> Contact {
        let mut c = Contact::new(first, last);
        c.phone_numbers = phones.iter().map(|p| PhoneNumber::new(p, "MOBILE")).collect();
        c
    }

    #[test]
    fn test_merge_unions_phones_and_deletes_source() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let x = storage.insert_contact(&with_phones("X", "Ray", &["A", "B"])).unwrap();
        let y = storage.insert_contact(&with_phones("Y", "Ray", &["B", "C"])).unwrap();

        let survivor = merge(&mut storage, &[x, y], None).unwrap();
        assert_eq!(survivor, x);

        let merged = storage.get_contact(x).unwrap().unwrap();
        let numbers: Vec<&str> = merged.phone_numbers.iter().map(|p| p.number.as_str()).collect();
        assert_eq!(numbers, vec!["A", "B", "C"]);
        assert!(storage.get_contact(y).unwrap().is_none());
    }

    #[test]
    fn test_explicit_target_survives() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let a = storage.insert_contact(&Contact::new("Ann", "")).unwrap();
        let b = storage.insert_contact(&Contact::new("Annie", "Lee")).unwrap();

        let survivor = merge(&mut storage, &[a, b], Some(b)).unwrap();
        assert_eq!(survivor, b);
        assert!(storage.get_contact(a).unwrap().is_none());
        assert_eq!(storage.get_contact(b).unwrap().unwrap().first_name, "Annie");
    }

    #[test]
    fn test_unknown_target_falls_back_to_first() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let a = storage.insert_contact(&Contact::new("Ann", "")).unwrap();
        let b = storage.insert_contact(&Contact::new("Ann", "")).unwrap();

        assert_eq!(merge(&mut storage, &[a, b], Some(999)).unwrap(), a);
    }

    #[test]
    fn test_validate_ids_needs_two_distinct_ids() {
        assert!(matches!(validate_ids(&[]), Err(Error::InvalidArgument(_))));
        assert!(matches!(validate_ids(&[5]), Err(Error::InvalidArgument(_))));
        assert!(matches!(validate_ids(&[5, 6, 5]), Err(Error::InvalidArgument(_))));
        assert!(validate_ids(&[5, 6]).is_ok());
    }

    #[test]
    fn test_rejects_bad_id_lists() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let a = storage.insert_contact(&Contact::new("Ann", "")).unwrap();

        assert!(matches!(
            merge(&mut storage, &[a], None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            merge(&mut storage, &[a, a], None),
            Err(Error::InvalidArgument(_))
        ));
        match merge(&mut storage, &[a, 77, 78], None) {
            Err(Error::ContactsNotFound { missing }) => assert_eq!(missing, vec![77, 78]),
            other => panic!("expected ContactsNotFound, got {other:?}"),
        }
        assert!(storage.get_contact(a).unwrap().is_some());
    }

    #[test]
    fn test_scalar_fill_and_notes() {
        let mut target = Contact::new("", "Lee");
        target.id = 1;
        target.notes = Some("met at conf".to_string());
        target.title = Some("  ".to_string());

        let mut first = Contact::new("Ann", "Other");
        first.id = 2;
        first.organization = Some("Acme".to_string());
        first.title = Some("CTO".to_string());
        first.notes = Some("met at conf".to_string());

        let mut second = Contact::new("Annabel", "");
        second.id = 3;
        second.organization = Some("Initech".to_string());
        second.notes = Some("likes tea".to_string());
        second.is_favorite = true;

        let merged = merge_contacts(&target, &[first, second]);
        assert_eq!(merged.id, 1);
        assert_eq!(merged.first_name, "Ann");
        assert_eq!(merged.last_name, "Lee");
        assert_eq!(merged.organization.as_deref(), Some("Acme"));
        assert_eq!(merged.title.as_deref(), Some("CTO"));
        assert_eq!(merged.notes.as_deref(), Some("met at conf\n\nlikes tea"));
        assert!(merged.is_favorite);
    }

    #[test]
    fn test_collections_union_without_child_ids() {
        let mut target = Contact::new("Ann", "Lee");
        target.emails = vec![Email {
            id: Some(5),
            ..Email::new("Ann@Example.com", "HOME")
        }];
        target.addresses = vec![Address {
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            ..Address::default()
        }];
        target.group_ids = vec![1];

        let mut other = Contact::new("Ann", "Lee");
        other.emails = vec![
            Email::new("ann@example.com", "WORK"),
            Email::new("ann@work.com", "WORK"),
        ];
        other.addresses = vec![Address {
            id: Some(9),
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            kind: "WORK".to_string(),
            ..Address::default()
        }];
        other.group_ids = vec![1, 2];

        let merged = merge_contacts(&target, &[other]);
        assert_eq!(merged.emails.len(), 2);
        assert!(merged.emails.iter().all(|e| e.id.is_none()));
        assert_eq!(merged.addresses.len(), 1);
        assert!(merged.addresses[0].id.is_none());
        assert_eq!(merged.group_ids, vec![1, 2]);
    }

    #[test]
    fn test_merge_keeps_group_memberships() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let family = storage.insert_group(&Group::new("Family")).unwrap();
        let a = storage.insert_contact(&Contact::new("Ann", "Lee")).unwrap();
        let mut other = Contact::new("Ann", "Lee");
        other.group_ids = vec![family];
        let b = storage.insert_contact(&other).unwrap();

        merge(&mut storage, &[a, b], None).unwrap();
        assert_eq!(storage.get_contact(a).unwrap().unwrap().group_ids, vec![family]);
    }
}
