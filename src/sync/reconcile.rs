//! Contact reconciliation.
//!
//! Diffs the provider's contacts against the local replica and applies the
//! resulting change set in one transaction. Contacts are matched by id: a
//! synced contact's local id is the provider's id, so an unchanged provider
//! produces no writes on a repeated pass.

use crate::error::Result;
use crate::model::{Address, Contact, Email, PhoneNumber};
use crate::provider::{ContactProvider, ProviderContact};
use crate::storage::SqliteStorage;
use crate::sync::hash::ChangeSignature;
use crate::sync::types::{ChangeSet, SyncStats};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Reconciler for provider contacts.
///
/// Holds the store for the duration of one pass. With `dry_run` set the
/// change set is computed and counted but never written.
pub struct Reconciler<'a> {
    storage: &'a mut SqliteStorage,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage, dry_run: bool) -> Self {
        Self { storage, dry_run }
    }

    /// Read contacts from the provider and reconcile them.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if its contacts cannot be read; nothing
    /// is written in that case.
    pub fn run(
        &mut self,
        provider: &dyn ContactProvider,
        aliases: &HashMap<i64, i64>,
    ) -> Result<SyncStats> {
        let external = provider.contacts()?;
        self.reconcile(&external, aliases)
    }

    /// Reconcile an already-read provider snapshot against the local store.
    ///
    /// `aliases` maps raw provider group ids to their deduplicated
    /// representative; ids not in the map are used as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the local snapshot cannot be read or any write
    /// fails. A failed write rolls back the whole batch.
    pub fn reconcile(
        &mut self,
        external: &[ProviderContact],
        aliases: &HashMap<i64, i64>,
    ) -> Result<SyncStats> {
        let local = self.storage.list_contacts()?;
        let groups = GroupIndex {
            known: self.storage.group_ids()?,
            system: self.storage.system_group_ids()?,
            aliases,
        };

        let (changes, unchanged) = compute_changes(external, &local, &groups)?;
        let stats = SyncStats {
            inserted: changes.inserts.len(),
            updated: changes.updates.len(),
            deleted: changes.deletes.len(),
            unchanged,
        };

        if !self.dry_run && !changes.is_empty() {
            self.storage.sync_contacts(&changes)?;
        }

        info!(
            inserted = stats.inserted,
            updated = stats.updated,
            deleted = stats.deleted,
            unchanged = stats.unchanged,
            dry_run = self.dry_run,
            "Contact sync complete"
        );

        Ok(stats)
    }
}

/// Local group ids a membership may point at.
pub struct GroupIndex<'a> {
    pub known: HashSet<i64>,
    pub system: HashSet<i64>,
    pub aliases: &'a HashMap<i64, i64>,
}

impl GroupIndex<'_> {
    /// Provider group ids remapped through the aliases, restricted to groups
    /// the local store has.
    fn resolve(&self, provider_ids: &[i64]) -> BTreeSet<i64> {
        provider_ids
            .iter()
            .map(|id| self.aliases.get(id).copied().unwrap_or(*id))
            .filter(|id| {
                let known = self.known.contains(id);
                if !known {
                    debug!(group_id = id, "Dropping membership to unknown group");
                }
                known
            })
            .collect()
    }
}

/// Compute the change set between provider and local contacts.
///
/// Returns the change set and the number of contacts left untouched.
///
/// # Errors
///
/// Returns an error if a change signature cannot be hashed.
pub fn compute_changes(
    external: &[ProviderContact],
    local: &[Contact],
    groups: &GroupIndex<'_>,
) -> Result<(ChangeSet, usize)> {
    let local_by_id: HashMap<i64, &Contact> = local.iter().map(|c| (c.id, c)).collect();

    let mut external_by_id: HashMap<i64, &ProviderContact> = HashMap::new();
    let mut order = Vec::with_capacity(external.len());
    for contact in external {
        if external_by_id.contains_key(&contact.id) {
            warn!(id = contact.id, "Provider reported contact id twice, keeping first");
            continue;
        }
        external_by_id.insert(contact.id, contact);
        order.push(contact);
    }

    let mut changes = ChangeSet::default();
    let mut unchanged = 0;

    for contact in order {
        match local_by_id.get(&contact.id) {
            None => {
                debug!(id = contact.id, "Insert");
                changes.inserts.push(to_new_contact(contact, groups));
            }
            Some(existing) => {
                let theirs = ChangeSignature::of_provider(contact).hash()?;
                let ours = ChangeSignature::of_local(existing).hash()?;
                if theirs == ours {
                    unchanged += 1;
                } else {
                    debug!(id = contact.id, "Update");
                    changes.updates.push(apply_update(existing, contact, groups));
                }
            }
        }
    }

    changes.deletes = local
        .iter()
        .filter(|c| !external_by_id.contains_key(&c.id))
        .map(|c| c.id)
        .collect();

    Ok((changes, unchanged))
}

fn to_new_contact(external: &ProviderContact, groups: &GroupIndex<'_>) -> Contact {
    let mut contact = Contact {
        id: external.id,
        ..Contact::default()
    };
    copy_provider_fields(&mut contact, external);
    contact.group_ids = groups.resolve(&external.group_ids).into_iter().collect();
    contact
}

fn apply_update(local: &Contact, external: &ProviderContact, groups: &GroupIndex<'_>) -> Contact {
    let mut contact = local.clone();
    copy_provider_fields(&mut contact, external);

    let mut memberships = groups.resolve(&external.group_ids);
    memberships.extend(
        local
            .group_ids
            .iter()
            .filter(|id| !groups.system.contains(*id) && groups.known.contains(*id)),
    );
    contact.group_ids = memberships.into_iter().collect();
    contact
}

/// Overwrite the fields the provider owns.
fn copy_provider_fields(contact: &mut Contact, external: &ProviderContact) {
    let (first_name, last_name) = external.name_parts();
    contact.first_name = first_name;
    contact.last_name = last_name;
    contact.photo_uri.clone_from(&external.photo_uri);
    contact.is_favorite = external.is_favorite;
    contact.phone_numbers = external
        .phone_numbers
        .iter()
        .map(|p| PhoneNumber { id: None, ..p.clone() })
        .collect();
    contact.emails = external
        .emails
        .iter()
        .map(|e| Email { id: None, ..e.clone() })
        .collect();
    contact.addresses = external
        .addresses
        .iter()
        .map(|a| Address { id: None, ..a.clone() })
        .collect();
    contact.source = external.source_label();
    contact.account_name.clone_from(&external.account_name);
    contact.account_type.clone_from(&external.account_type);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::Group;
    use crate::provider::{ProviderGroup, Snapshot};

    fn external(id: i64, name: &str) -> ProviderContact {
        ProviderContact {
            id,
            display_name: name.to_string(),
            ..ProviderContact::default()
        }
    }

    fn sync(storage: &mut SqliteStorage, contacts: &[ProviderContact]) -> SyncStats {
        Reconciler::new(storage, false)
            .reconcile(contacts, &HashMap::new())
            .unwrap()
    }

    struct FailingProvider;

    impl ContactProvider for FailingProvider {
        fn contacts(&self) -> Result<Vec<ProviderContact>> {
            Err(Error::Provider("device unavailable".to_string()))
        }

        fn groups(&self) -> Result<Vec<ProviderGroup>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_second_pass_writes_nothing() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut ann = external(1, "Ann Lee");
        ann.phone_numbers.push(PhoneNumber::new("555-0101", "MOBILE"));
        ann.emails.push(Email::new("ann@example.com", "WORK"));
        let snapshot = vec![ann, external(2, "  Bo  ")];

        let first = sync(&mut storage, &snapshot);
        assert_eq!(first.inserted, 2);

        let second = sync(&mut storage, &snapshot);
        assert_eq!(second.writes(), 0);
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn test_insert_new_delete_missing_keep_unchanged() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        sync(&mut storage, &[external(1, "Ann Lee"), external(3, "Cy Park")]);
        let a_before = storage.get_contact(1).unwrap().unwrap();

        let stats = sync(&mut storage, &[external(1, "Ann Lee"), external(2, "Bo Chan")]);
        assert_eq!(
            stats,
            SyncStats {
                inserted: 1,
                updated: 0,
                deleted: 1,
                unchanged: 1
            }
        );

        assert!(storage.get_contact(2).unwrap().is_some());
        assert!(storage.get_contact(3).unwrap().is_none());
        assert_eq!(storage.get_contact(1).unwrap().unwrap(), a_before);
    }

    #[test]
    fn test_signature_change_updates_provider_fields_only() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        sync(&mut storage, &[external(1, "Ann Lee")]);

        let mut local = storage.get_contact(1).unwrap().unwrap();
        local.organization = Some("Acme".to_string());
        storage.update_contact(&local).unwrap();

        let mut renamed = external(1, "Ann Lee-Smith");
        renamed.is_favorite = true;
        let stats = sync(&mut storage, &[renamed]);
        assert_eq!(stats.updated, 1);

        let after = storage.get_contact(1).unwrap().unwrap();
        assert_eq!(after.last_name, "Lee-Smith");
        assert!(after.is_favorite);
        assert_eq!(after.organization.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_child_only_change_is_not_an_update() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        sync(&mut storage, &[external(1, "Ann Lee")]);

        let mut with_phone = external(1, "Ann Lee");
        with_phone.phone_numbers.push(PhoneNumber::new("555", "HOME"));
        let stats = sync(&mut storage, &[with_phone]);

        assert_eq!(stats.writes(), 0);
        assert!(storage.get_contact(1).unwrap().unwrap().phone_numbers.is_empty());
    }

    #[test]
    fn test_empty_display_name_synced_with_blank_names() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        sync(&mut storage, &[external(9, "")]);

        let contact = storage.get_contact(9).unwrap().unwrap();
        assert_eq!(contact.first_name, "");
        assert_eq!(contact.last_name, "");
        assert_eq!(contact.source, "Phone");
    }

    #[test]
    fn test_memberships_remapped_and_unknown_groups_dropped() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut favorites = Group::new("Favorites");
        favorites.id = 10;
        favorites.is_system_group = true;
        storage.insert_group(&favorites).unwrap();

        let mut ann = external(1, "Ann Lee");
        ann.group_ids = vec![11, 99];
        let aliases = HashMap::from([(11, 10)]);

        Reconciler::new(&mut storage, false)
            .reconcile(&[ann], &aliases)
            .unwrap();

        assert_eq!(storage.get_contact(1).unwrap().unwrap().group_ids, vec![10]);
    }

    #[test]
    fn test_update_keeps_user_group_memberships() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let book_club = storage.insert_group(&Group::new("Book Club")).unwrap();
        sync(&mut storage, &[external(1, "Ann Lee")]);
        storage.add_membership(1, book_club).unwrap();

        sync(&mut storage, &[external(1, "Ann Lee-Smith")]);

        assert_eq!(
            storage.get_contact(1).unwrap().unwrap().group_ids,
            vec![book_club]
        );
    }

    #[test]
    fn test_provider_failure_writes_nothing() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        sync(&mut storage, &[external(1, "Ann Lee")]);

        let err = Reconciler::new(&mut storage, false)
            .run(&FailingProvider, &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert!(storage.get_contact(1).unwrap().is_some());
    }

    #[test]
    fn test_dry_run_counts_without_writing() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let snapshot = Snapshot {
            contacts: vec![external(1, "Ann Lee")],
            groups: Vec::new(),
        };

        let stats = Reconciler::new(&mut storage, true)
            .run(&snapshot, &HashMap::new())
            .unwrap();
        assert_eq!(stats.inserted, 1);
        assert!(storage.list_contacts().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_provider_ids_keep_first() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let stats = sync(&mut storage, &[external(1, "Ann Lee"), external(1, "Other")]);

        assert_eq!(stats.inserted, 1);
        assert_eq!(storage.get_contact(1).unwrap().unwrap().first_name, "Ann");
    }
}
