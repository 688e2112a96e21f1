//! Group deduplication and group sync.
//!
//! The provider exposes one group row per (group, account) pair, so a
//! device-wide group such as "Favorites" can appear once per account.
//! Deduplication collapses those rows into one logical group before any
//! count is surfaced or any group is persisted.

use crate::error::Result;
use crate::model::Group;
use crate::provider::ProviderGroup;
use crate::storage::SqliteStorage;
use crate::sync::types::{GroupChangeSet, GroupSyncStats};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Canonical label for a provider group title.
///
/// Known built-in identifiers map to fixed labels; everything else passes
/// through unchanged.
#[must_use]
pub fn normalize_title(title: &str, system_id: Option<&str>) -> String {
    if title == "Starred in Android" || system_id == Some("Starred in Android") {
        return "Favorites".to_string();
    }
    if title == "My Contacts" || system_id == Some("Contacts") {
        return "My Contacts".to_string();
    }
    match system_id {
        Some(id @ ("Friends" | "Family" | "Coworkers")) => id.to_string(),
        _ => title.to_string(),
    }
}

/// Key deciding whether two raw rows are the same logical group.
///
/// `system:<id>` when the row has a non-empty system id, otherwise
/// `title:<normalized title>`.
#[must_use]
pub fn dedup_key(group: &ProviderGroup) -> String {
    match group.system_id.as_deref() {
        Some(id) if !id.is_empty() => format!("system:{id}"),
        _ => format!(
            "title:{}",
            normalize_title(&group.title, group.system_id.as_deref())
        ),
    }
}

/// Deduplicated groups plus the raw-id → representative-id map.
#[derive(Debug, Clone, Default)]
pub struct Deduplicated {
    /// One entry per logical group, titles normalized, sorted by title.
    pub groups: Vec<ProviderGroup>,
    /// Every raw group id mapped to the id of its representative.
    pub aliases: HashMap<i64, i64>,
}

/// Collapse raw provider groups into logical groups.
///
/// Rows sharing a [`dedup_key`] merge into the first-seen row, whose id,
/// title and visibility are kept; contact counts are summed.
#[must_use]
pub fn deduplicate(raw: &[ProviderGroup]) -> Vec<ProviderGroup> {
    deduplicate_with_aliases(raw).groups
}

/// [`deduplicate`], also returning which raw id folded into which.
#[must_use]
pub fn deduplicate_with_aliases(raw: &[ProviderGroup]) -> Deduplicated {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, ProviderGroup> = HashMap::new();
    let mut aliases = HashMap::new();

    for group in raw {
        let key = dedup_key(group);
        if let Some(existing) = by_key.get_mut(&key) {
            existing.contact_count += group.contact_count;
            aliases.insert(group.id, existing.id);
            debug!(key, raw_id = group.id, into = existing.id, "Merged duplicate group");
        } else {
            let mut representative = group.clone();
            representative.title =
                normalize_title(&group.title, group.system_id.as_deref());
            aliases.insert(group.id, group.id);
            by_key.insert(key.clone(), representative);
            order.push(key);
        }
    }

    let mut groups: Vec<ProviderGroup> = order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect();
    groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));

    Deduplicated { groups, aliases }
}

/// Mirror deduplicated provider groups into the local store.
///
/// Inserts unknown ids, updates rows whose name or provider metadata
/// changed, and deletes local system groups the provider no longer has.
/// User groups are never deleted here. With `dry_run` the change set is
/// computed and counted but not written.
///
/// # Errors
///
/// Returns an error if reading local groups or writing the batch fails.
pub fn sync_groups(
    storage: &mut SqliteStorage,
    deduplicated: &Deduplicated,
    raw_count: usize,
    dry_run: bool,
) -> Result<GroupSyncStats> {
    let local: HashMap<i64, Group> = storage
        .list_groups()?
        .into_iter()
        .map(|g| (g.id, g))
        .collect();

    let mut changes = GroupChangeSet::default();
    let mut seen = HashSet::new();

    for external in &deduplicated.groups {
        seen.insert(external.id);
        match local.get(&external.id) {
            None => changes.inserts.push(to_local(external, 0)),
            Some(existing) => {
                let candidate = to_local(external, existing.created_at);
                if differs(existing, &candidate) {
                    changes.updates.push(candidate);
                }
            }
        }
    }

    let mut deletes: Vec<i64> = local
        .values()
        .filter(|g| g.is_system_group && !seen.contains(&g.id))
        .map(|g| g.id)
        .collect();
    deletes.sort_unstable();
    changes.deletes = deletes;

    let stats = GroupSyncStats {
        raw: raw_count,
        deduplicated: deduplicated.groups.len(),
        inserted: changes.inserts.len(),
        updated: changes.updates.len(),
        deleted: changes.deletes.len(),
    };

    if !dry_run && !changes.is_empty() {
        storage.sync_groups(&changes)?;
    }

    info!(
        raw = stats.raw,
        groups = stats.deduplicated,
        inserted = stats.inserted,
        updated = stats.updated,
        deleted = stats.deleted,
        dry_run,
        "Group sync complete"
    );

    Ok(stats)
}

fn to_local(group: &ProviderGroup, created_at: i64) -> Group {
    Group {
        id: group.id,
        name: group.title.clone(),
        created_at,
        is_system_group: true,
        system_id: group.system_id.clone(),
        account_name: group.account_name.clone(),
        account_type: group.account_type.clone(),
        contact_count: 0,
    }
}

fn differs(local: &Group, candidate: &Group) -> bool {
    local.name != candidate.name
        || !local.is_system_group
        || local.system_id != candidate.system_id
        || local.account_name != candidate.account_name
        || local.account_type != candidate.account_type
}
