//! SQLite storage implementation.
//!
//! This module provides the local replica store. Every multi-statement write
//! goes through [`SqliteStorage::mutate`], which wraps the closure in one
//! IMMEDIATE transaction: either all of its writes commit or none do.

use crate::error::{Error, Result};
use crate::model::{Address, Contact, Email, Event, Group, InstantMessage, PhoneNumber, Website};
use crate::preserve::staging;
use crate::storage::schema::apply_schema;
use crate::sync::{ChangeSet, GroupChangeSet};
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation.
///
/// Passed to mutation closures so they can report how much they wrote;
/// the total is logged when the transaction commits.
#[derive(Debug)]
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Rows inserted, updated or deleted by the operation.
    pub rows: usize,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            rows: 0,
        }
    }

    /// Record `n` written rows.
    pub fn touch(&mut self, n: usize) {
        self.rows += n;
    }
}

/// Record counts for status output.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StoreCounts {
    pub contacts: usize,
    pub favorites: usize,
    pub groups: usize,
    pub system_groups: usize,
    pub memberships: usize,
    /// Entries waiting for the restoration pass.
    pub staged_entries: usize,
}

const CONTACT_COLUMNS: &str = "id, prefix, first_name, middle_name, last_name, suffix, nickname, \
     photo_uri, organization, title, notes, birthday, ringtone, is_favorite, source, \
     account_name, account_type, created_at, updated_at";

const GROUP_COLUMNS: &str =
    "id, name, created_at, is_system_group, system_id, account_name, account_type, contact_count";

/// Child tables owned by a contact, cleared on every rewrite.
const CHILD_TABLES: &[&str] = &[
    "phone_numbers",
    "emails",
    "addresses",
    "websites",
    "instant_messages",
    "events",
    "contact_group_cross_ref",
];

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist; walks an
    /// older database forward through the migration ladder.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, applying schema and migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op);

        // Dropping `tx` on the error path rolls back
        let result = f(&tx, &mut ctx)?;

        tx.commit()?;
        debug!(op = ctx.op_name, rows = ctx.rows, "Mutation committed");

        Ok(result)
    }

    // ==================
    // Contact Operations
    // ==================

    /// Insert a contact with its children and memberships.
    ///
    /// A non-zero `contact.id` is used as the local id; zero lets the
    /// store assign one.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken, a membership names an unknown
    /// group, or the insert fails.
    pub fn insert_contact(&mut self, contact: &Contact) -> Result<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("insert_contact", |tx, ctx| {
            let id = insert_contact_row(tx, contact, now)?;
            write_children(tx, id, contact)?;
            ctx.touch(1);
            Ok(id)
        })
    }

    /// Replace a contact's fields, children and memberships.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContactNotFound`] if no contact has `contact.id`.
    pub fn update_contact(&mut self, contact: &Contact) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("update_contact", |tx, ctx| {
            update_contact_row(tx, contact, now)?;
            replace_children(tx, contact.id, contact)?;
            ctx.touch(1);
            Ok(())
        })
    }

    /// Delete a contact. Children and memberships cascade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContactNotFound`] if the contact doesn't exist.
    pub fn delete_contact(&mut self, id: i64) -> Result<()> {
        self.mutate("delete_contact", |tx, ctx| {
            let rows = tx.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
            if rows == 0 {
                return Err(Error::ContactNotFound { id });
            }
            ctx.touch(rows);
            Ok(())
        })
    }

    /// Get a fully hydrated contact by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_contact(&self, id: i64) -> Result<Option<Contact>> {
        let contact = self
            .conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                [id],
                map_contact,
            )
            .optional()?;

        let Some(contact) = contact else {
            return Ok(None);
        };
        let mut contacts = vec![contact];
        hydrate(&self.conn, &mut contacts, Some(id))?;
        Ok(contacts.pop())
    }

    /// List all contacts, fully hydrated, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_contacts(&self) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             ORDER BY first_name COLLATE NOCASE ASC, last_name COLLATE NOCASE ASC, id ASC"
        ))?;
        let mut contacts = stmt
            .query_map([], map_contact)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        hydrate(&self.conn, &mut contacts, None)?;
        Ok(contacts)
    }

    /// Set or clear a contact's favorite flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContactNotFound`] if the contact doesn't exist.
    pub fn set_favorite(&mut self, id: i64, favorite: bool) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("set_favorite", |tx, ctx| {
            let rows = tx.execute(
                "UPDATE contacts SET is_favorite = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![favorite, now, id],
            )?;
            if rows == 0 {
                return Err(Error::ContactNotFound { id });
            }
            ctx.touch(rows);
            Ok(())
        })
    }

    /// Find the lowest contact id owning exactly this phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_contact_by_phone(&self, number: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT contact_id FROM phone_numbers WHERE number = ?1
                 ORDER BY contact_id LIMIT 1",
                [number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Find the lowest contact id owning exactly this email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_contact_by_email(&self, email: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT contact_id FROM emails WHERE email = ?1
                 ORDER BY contact_id LIMIT 1",
                [email],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Find the lowest contact id with exactly this first and last name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_contact_by_name(&self, first_name: &str, last_name: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM contacts WHERE first_name = ?1 AND last_name = ?2
                 ORDER BY id LIMIT 1",
                [first_name, last_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    // ==================
    // Group Operations
    // ==================

    /// Insert a group. A non-zero `group.id` is used as the local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_group(&mut self, group: &Group) -> Result<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("insert_group", |tx, ctx| {
            let id = insert_group_row(tx, group, now)?;
            ctx.touch(1);
            Ok(id)
        })
    }

    /// Get a group with its derived contact count.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_group(&self, id: i64) -> Result<Option<Group>> {
        let group = self
            .conn
            .query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM group_with_contact_count WHERE id = ?1"),
                [id],
                map_group,
            )
            .optional()?;
        Ok(group)
    }

    /// List all groups with derived contact counts, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS} FROM group_with_contact_count
             ORDER BY name COLLATE NOCASE ASC, id ASC"
        ))?;
        let groups = stmt
            .query_map([], map_group)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    /// IDs of every group in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn group_ids(&self) -> Result<HashSet<i64>> {
        self.id_set("SELECT id FROM `groups`")
    }

    /// IDs of groups mirrored from the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn system_group_ids(&self) -> Result<HashSet<i64>> {
        self.id_set("SELECT id FROM `groups` WHERE is_system_group = 1")
    }

    fn id_set(&self, sql: &str) -> Result<HashSet<i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<i64>, _>>()?;
        Ok(ids)
    }

    /// Add a contact to a group.
    ///
    /// Returns `false` if the membership already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if either side doesn't exist.
    pub fn add_membership(&mut self, contact_id: i64, group_id: i64) -> Result<bool> {
        self.mutate("add_membership", |tx, ctx| {
            let rows = tx.execute(
                "INSERT OR IGNORE INTO contact_group_cross_ref (contact_id, group_id) VALUES (?1, ?2)",
                [contact_id, group_id],
            )?;
            ctx.touch(rows);
            Ok(rows > 0)
        })
    }

    /// Remove a contact from a group. Returns `false` if it wasn't a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn remove_membership(&mut self, contact_id: i64, group_id: i64) -> Result<bool> {
        self.mutate("remove_membership", |tx, ctx| {
            let rows = tx.execute(
                "DELETE FROM contact_group_cross_ref WHERE contact_id = ?1 AND group_id = ?2",
                [contact_id, group_id],
            )?;
            ctx.touch(rows);
            Ok(rows > 0)
        })
    }

    // ==================
    // Batch Operations
    // ==================

    /// Apply a reconciliation change set as one transaction.
    ///
    /// Inserts first, then updates, then deletes. Any write failure rolls
    /// back the whole batch. Deleting an id that is already gone is not a
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert or update fails.
    pub fn sync_contacts(&mut self, changes: &ChangeSet) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("sync_contacts", |tx, ctx| {
            for contact in &changes.inserts {
                let id = insert_contact_row(tx, contact, now)?;
                write_children(tx, id, contact)?;
            }
            ctx.touch(changes.inserts.len());

            for contact in &changes.updates {
                update_contact_row(tx, contact, now)?;
                replace_children(tx, contact.id, contact)?;
            }
            ctx.touch(changes.updates.len());

            for id in &changes.deletes {
                let rows = tx.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
                if rows == 0 {
                    debug!(id, "Contact already gone, skipping delete");
                }
                ctx.touch(rows);
            }

            Ok(())
        })
    }

    /// Apply a group sync change set as one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails.
    pub fn sync_groups(&mut self, changes: &GroupChangeSet) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("sync_groups", |tx, ctx| {
            for group in &changes.inserts {
                insert_group_row(tx, group, now)?;
            }
            for group in &changes.updates {
                update_group_row(tx, group)?;
            }
            for id in &changes.deletes {
                ctx.touch(tx.execute("DELETE FROM `groups` WHERE id = ?1", [id])?);
            }
            ctx.touch(changes.inserts.len() + changes.updates.len());
            Ok(())
        })
    }

    /// Write a merged contact and delete the contacts folded into it.
    ///
    /// # Errors
    ///
    /// Returns an error if the target or any removed contact is missing;
    /// nothing is written in that case.
    pub fn commit_merge(&mut self, merged: &Contact, removed: &[i64]) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("merge_contacts", |tx, ctx| {
            update_contact_row(tx, merged, now)?;
            replace_children(tx, merged.id, merged)?;
            for &id in removed {
                let rows = tx.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
                if rows == 0 {
                    return Err(Error::ContactNotFound { id });
                }
            }
            ctx.touch(1 + removed.len());
            Ok(())
        })
    }

    /// Record counts for status output.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        };

        Ok(StoreCounts {
            contacts: count("SELECT COUNT(*) FROM contacts")?,
            favorites: count("SELECT COUNT(*) FROM contacts WHERE is_favorite = 1")?,
            groups: count("SELECT COUNT(*) FROM `groups`")?,
            system_groups: count("SELECT COUNT(*) FROM `groups` WHERE is_system_group = 1")?,
            memberships: count("SELECT COUNT(*) FROM contact_group_cross_ref")?,
            staged_entries: staging::count(&self.conn)?,
        })
    }
}

// ==================
// Row Writers
// ==================

fn insert_contact_row(conn: &Connection, contact: &Contact, now: i64) -> Result<i64> {
    let id = (contact.id > 0).then_some(contact.id);
    let created_at = if contact.created_at > 0 {
        contact.created_at
    } else {
        now
    };

    conn.execute(
        "INSERT INTO contacts (id, prefix, first_name, middle_name, last_name, suffix, nickname,
             photo_uri, organization, title, notes, birthday, ringtone, is_favorite, source,
             account_name, account_type, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        rusqlite::params![
            id,
            contact.prefix,
            contact.first_name,
            contact.middle_name,
            contact.last_name,
            contact.suffix,
            contact.nickname,
            contact.photo_uri,
            contact.organization,
            contact.title,
            contact.notes,
            contact.birthday,
            contact.ringtone,
            contact.is_favorite,
            contact.source,
            contact.account_name,
            contact.account_type,
            created_at,
            now,
        ],
    )?;

    Ok(id.unwrap_or_else(|| conn.last_insert_rowid()))
}

fn update_contact_row(conn: &Connection, contact: &Contact, now: i64) -> Result<()> {
    let rows = conn.execute(
        "UPDATE contacts SET prefix = ?2, first_name = ?3, middle_name = ?4, last_name = ?5,
             suffix = ?6, nickname = ?7, photo_uri = ?8, organization = ?9, title = ?10,
             notes = ?11, birthday = ?12, ringtone = ?13, is_favorite = ?14, source = ?15,
             account_name = ?16, account_type = ?17, updated_at = ?18
         WHERE id = ?1",
        rusqlite::params![
            contact.id,
            contact.prefix,
            contact.first_name,
            contact.middle_name,
            contact.last_name,
            contact.suffix,
            contact.nickname,
            contact.photo_uri,
            contact.organization,
            contact.title,
            contact.notes,
            contact.birthday,
            contact.ringtone,
            contact.is_favorite,
            contact.source,
            contact.account_name,
            contact.account_type,
            now,
        ],
    )?;

    if rows == 0 {
        return Err(Error::ContactNotFound { id: contact.id });
    }
    Ok(())
}

fn replace_children(conn: &Connection, contact_id: i64, contact: &Contact) -> Result<()> {
    for table in CHILD_TABLES {
        conn.execute(
            &format!("DELETE FROM {table} WHERE contact_id = ?1"),
            [contact_id],
        )?;
    }
    write_children(conn, contact_id, contact)
}

/// Insert child rows and memberships. Child ids are always freshly assigned.
fn write_children(conn: &Connection, contact_id: i64, contact: &Contact) -> Result<()> {
    for phone in &contact.phone_numbers {
        conn.execute(
            "INSERT INTO phone_numbers (contact_id, number, type) VALUES (?1, ?2, ?3)",
            rusqlite::params![contact_id, phone.number, phone.kind],
        )?;
    }
    for email in &contact.emails {
        conn.execute(
            "INSERT INTO emails (contact_id, email, type) VALUES (?1, ?2, ?3)",
            rusqlite::params![contact_id, email.email, email.kind],
        )?;
    }
    for address in &contact.addresses {
        conn.execute(
            "INSERT INTO addresses (contact_id, street, city, state, postal_code, country, type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                contact_id,
                address.street,
                address.city,
                address.state,
                address.postal_code,
                address.country,
                address.kind
            ],
        )?;
    }
    for website in &contact.websites {
        conn.execute(
            "INSERT INTO websites (contact_id, url, type) VALUES (?1, ?2, ?3)",
            rusqlite::params![contact_id, website.url, website.kind],
        )?;
    }
    for im in &contact.instant_messages {
        conn.execute(
            "INSERT INTO instant_messages (contact_id, handle, protocol) VALUES (?1, ?2, ?3)",
            rusqlite::params![contact_id, im.handle, im.protocol],
        )?;
    }
    for event in &contact.events {
        conn.execute(
            "INSERT INTO events (contact_id, date, type) VALUES (?1, ?2, ?3)",
            rusqlite::params![contact_id, event.date, event.kind],
        )?;
    }
    for group_id in &contact.group_ids {
        conn.execute(
            "INSERT OR IGNORE INTO contact_group_cross_ref (contact_id, group_id) VALUES (?1, ?2)",
            [contact_id, *group_id],
        )?;
    }
    Ok(())
}

fn insert_group_row(conn: &Connection, group: &Group, now: i64) -> Result<i64> {
    let id = (group.id > 0).then_some(group.id);
    let created_at = if group.created_at > 0 {
        group.created_at
    } else {
        now
    };

    conn.execute(
        "INSERT INTO `groups` (id, name, created_at, is_system_group, system_id, account_name, account_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id,
            group.name,
            created_at,
            group.is_system_group,
            group.system_id,
            group.account_name,
            group.account_type
        ],
    )?;

    Ok(id.unwrap_or_else(|| conn.last_insert_rowid()))
}

fn update_group_row(conn: &Connection, group: &Group) -> Result<()> {
    let rows = conn.execute(
        "UPDATE `groups` SET name = ?2, is_system_group = ?3, system_id = ?4,
             account_name = ?5, account_type = ?6
         WHERE id = ?1",
        rusqlite::params![
            group.id,
            group.name,
            group.is_system_group,
            group.system_id,
            group.account_name,
            group.account_type
        ],
    )?;

    if rows == 0 {
        return Err(Error::GroupNotFound { id: group.id });
    }
    Ok(())
}

// ==================
// Row Readers
// ==================

fn map_contact(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        prefix: row.get(1)?,
        first_name: row.get(2)?,
        middle_name: row.get(3)?,
        last_name: row.get(4)?,
        suffix: row.get(5)?,
        nickname: row.get(6)?,
        photo_uri: row.get(7)?,
        organization: row.get(8)?,
        title: row.get(9)?,
        notes: row.get(10)?,
        birthday: row.get(11)?,
        ringtone: row.get(12)?,
        is_favorite: row.get(13)?,
        source: row.get(14)?,
        account_name: row.get(15)?,
        account_type: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
        ..Contact::default()
    })
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        is_system_group: row.get(3)?,
        system_id: row.get(4)?,
        account_name: row.get(5)?,
        account_type: row.get(6)?,
        contact_count: row.get(7)?,
    })
}

/// Load one child table into lists keyed by contact id.
///
/// `sql` must select `contact_id` first and filter with
/// `?1 IS NULL OR contact_id = ?1`.
fn load_children<T>(
    conn: &Connection,
    sql: &str,
    only: Option<i64>,
    map: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<HashMap<i64, Vec<T>>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([only])?;

    let mut by_contact: HashMap<i64, Vec<T>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let contact_id: i64 = row.get(0)?;
        by_contact.entry(contact_id).or_default().push(map(row)?);
    }
    Ok(by_contact)
}

/// Attach children and memberships to contacts read from the main table.
fn hydrate(conn: &Connection, contacts: &mut [Contact], only: Option<i64>) -> Result<()> {
    let mut phones = load_children(
        conn,
        "SELECT contact_id, id, number, type FROM phone_numbers
         WHERE ?1 IS NULL OR contact_id = ?1 ORDER BY id",
        only,
        |row| {
            Ok(PhoneNumber {
                id: row.get(1)?,
                number: row.get(2)?,
                kind: row.get(3)?,
            })
        },
    )?;
    let mut emails = load_children(
        conn,
        "SELECT contact_id, id, email, type FROM emails
         WHERE ?1 IS NULL OR contact_id = ?1 ORDER BY id",
        only,
        |row| {
            Ok(Email {
                id: row.get(1)?,
                email: row.get(2)?,
                kind: row.get(3)?,
            })
        },
    )?;
    let mut addresses = load_children(
        conn,
        "SELECT contact_id, id, street, city, state, postal_code, country, type FROM addresses
         WHERE ?1 IS NULL OR contact_id = ?1 ORDER BY id",
        only,
        |row| {
            Ok(Address {
                id: row.get(1)?,
                street: row.get(2)?,
                city: row.get(3)?,
                state: row.get(4)?,
                postal_code: row.get(5)?,
                country: row.get(6)?,
                kind: row.get(7)?,
            })
        },
    )?;
    let mut websites = load_children(
        conn,
        "SELECT contact_id, id, url, type FROM websites
         WHERE ?1 IS NULL OR contact_id = ?1 ORDER BY id",
        only,
        |row| {
            Ok(Website {
                id: row.get(1)?,
                url: row.get(2)?,
                kind: row.get(3)?,
            })
        },
    )?;
    let mut instant_messages = load_children(
        conn,
        "SELECT contact_id, id, handle, protocol FROM instant_messages
         WHERE ?1 IS NULL OR contact_id = ?1 ORDER BY id",
        only,
        |row| {
            Ok(InstantMessage {
                id: row.get(1)?,
                handle: row.get(2)?,
                protocol: row.get(3)?,
            })
        },
    )?;
    let mut events = load_children(
        conn,
        "SELECT contact_id, id, date, type FROM events
         WHERE ?1 IS NULL OR contact_id = ?1 ORDER BY id",
        only,
        |row| {
            Ok(Event {
                id: row.get(1)?,
                date: row.get(2)?,
                kind: row.get(3)?,
            })
        },
    )?;
    let mut memberships = load_children(
        conn,
        "SELECT contact_id, group_id FROM contact_group_cross_ref
         WHERE ?1 IS NULL OR contact_id = ?1 ORDER BY group_id",
        only,
        |row| row.get::<_, i64>(1),
    )?;

    for contact in contacts.iter_mut() {
        let id = contact.id;
        contact.phone_numbers = phones.remove(&id).unwrap_or_default();
        contact.emails = emails.remove(&id).unwrap_or_default();
        contact.addresses = addresses.remove(&id).unwrap_or_default();
        contact.websites = websites.remove(&id).unwrap_or_default();
        contact.instant_messages = instant_messages.remove(&id).unwrap_or_default();
        contact.events = events.remove(&id).unwrap_or_default();
        contact.group_ids = memberships.remove(&id).unwrap_or_default();
    }

    Ok(())
}
