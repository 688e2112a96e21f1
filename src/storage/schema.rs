//! Database schema definitions.
//!
//! The current layout is schema version 7, tracked in `PRAGMA user_version`.
//! Older databases are brought forward by [`super::migrations`].

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 7;

/// The complete SQL schema for a version 7 database.
///
/// Note: Timestamps are stored as INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Contacts
-- ====================

CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    prefix TEXT DEFAULT NULL,
    first_name TEXT NOT NULL,
    middle_name TEXT DEFAULT NULL,
    last_name TEXT NOT NULL DEFAULT '',
    suffix TEXT DEFAULT NULL,
    nickname TEXT DEFAULT NULL,
    photo_uri TEXT DEFAULT NULL,
    organization TEXT DEFAULT NULL,
    title TEXT DEFAULT NULL,
    notes TEXT DEFAULT NULL,
    birthday TEXT DEFAULT NULL,
    ringtone TEXT DEFAULT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    source TEXT NOT NULL DEFAULT '',
    account_name TEXT DEFAULT NULL,
    account_type TEXT DEFAULT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_contacts_first_name ON contacts(first_name);
CREATE INDEX IF NOT EXISTS idx_contacts_last_name ON contacts(last_name);
CREATE INDEX IF NOT EXISTS idx_contacts_is_favorite ON contacts(is_favorite);
CREATE INDEX IF NOT EXISTS idx_contacts_source ON contacts(source);
CREATE INDEX IF NOT EXISTS idx_contacts_account_type ON contacts(account_type);

-- ====================
-- Contact Children (cascade with the owning contact)
-- ====================

CREATE TABLE IF NOT EXISTS phone_numbers (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    contact_id INTEGER NOT NULL,
    number TEXT NOT NULL,
    type TEXT NOT NULL,
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_phone_numbers_contact ON phone_numbers(contact_id);
CREATE INDEX IF NOT EXISTS idx_phone_numbers_number ON phone_numbers(number);

CREATE TABLE IF NOT EXISTS emails (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    contact_id INTEGER NOT NULL,
    email TEXT NOT NULL,
    type TEXT NOT NULL,
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_emails_contact ON emails(contact_id);
CREATE INDEX IF NOT EXISTS idx_emails_email ON emails(email);

CREATE TABLE IF NOT EXISTS addresses (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    contact_id INTEGER NOT NULL,
    street TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    postal_code TEXT NOT NULL,
    country TEXT NOT NULL,
    type TEXT NOT NULL,
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_addresses_contact ON addresses(contact_id);

CREATE TABLE IF NOT EXISTS websites (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    contact_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    type TEXT NOT NULL,
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_websites_contact ON websites(contact_id);

CREATE TABLE IF NOT EXISTS instant_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    contact_id INTEGER NOT NULL,
    handle TEXT NOT NULL,
    protocol TEXT NOT NULL,
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_instant_messages_contact ON instant_messages(contact_id);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    contact_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    type TEXT NOT NULL,
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_events_contact ON events(contact_id);

-- ====================
-- Groups
-- ====================

CREATE TABLE IF NOT EXISTS `groups` (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    is_system_group INTEGER NOT NULL DEFAULT 0,
    system_id TEXT DEFAULT NULL,
    account_name TEXT DEFAULT NULL,
    account_type TEXT DEFAULT NULL
);

-- Non-unique: the same system group name appears once per account
CREATE INDEX IF NOT EXISTS idx_groups_name ON `groups`(name);

CREATE TABLE IF NOT EXISTS contact_group_cross_ref (
    contact_id INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    PRIMARY KEY (contact_id, group_id),
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE,
    FOREIGN KEY (group_id) REFERENCES `groups`(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_cross_ref_contact ON contact_group_cross_ref(contact_id);
CREATE INDEX IF NOT EXISTS idx_cross_ref_group ON contact_group_cross_ref(group_id);
";

/// Counts are derived from memberships, never stored.
pub const GROUP_VIEW_SQL: &str = r"
CREATE VIEW IF NOT EXISTS group_with_contact_count AS
SELECT
    g.id,
    g.name,
    g.created_at,
    g.is_system_group,
    g.system_id,
    g.account_name,
    g.account_type,
    COUNT(DISTINCT x.contact_id) AS contact_count
FROM `groups` g
LEFT JOIN contact_group_cross_ref x ON g.id = x.group_id
GROUP BY g.id;
";

/// Apply the schema to a connection.
///
/// Sets connection pragmas, then either creates a fresh version 7 database
/// or walks an existing one forward through the migration ladder.
///
/// # Errors
///
/// Returns [`Error::UnsupportedSchema`] for databases newer than this
/// build, or a database error if any statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Set pragmas before schema creation
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-64000")?; // 64MB cache
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    let version = detect_version(conn)?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(Error::UnsupportedSchema {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if version == 0 {
        info!(version = CURRENT_SCHEMA_VERSION, "Creating database schema");
        create_current(conn)?;
        return Ok(());
    }

    if version < CURRENT_SCHEMA_VERSION {
        super::migrations::run_migrations(conn, version)?;
    } else {
        debug!(version, "Schema is current");
    }

    Ok(())
}

/// Create every table and view of the current schema and stamp the version.
pub(crate) fn create_current(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(GROUP_VIEW_SQL)?;
    conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;
    Ok(())
}

/// Read the schema version of an opened database.
///
/// A zero `user_version` on a database that already holds a `contacts`
/// table predates version tracking and is treated as version 1.
///
/// # Errors
///
/// Returns an error if the pragma or catalog query fails.
pub fn detect_version(conn: &Connection) -> rusqlite::Result<i32> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version == 0 && table_exists(conn, "contacts")? {
        return Ok(1);
    }
    Ok(version)
}

/// Check if a table exists.
pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
        .exists([table])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables = table_names(&conn);
        for expected in [
            "contacts",
            "phone_numbers",
            "emails",
            "addresses",
            "websites",
            "instant_messages",
            "events",
            "groups",
            "contact_group_cross_ref",
            "schema_migrations",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }

        assert_eq!(detect_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let fk_enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_enabled, 1);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 8).unwrap();

        let err = apply_schema(&conn).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedSchema {
                found: 8,
                supported: 7
            }
        ));
    }

    #[test]
    fn test_membership_cascades_with_contact() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO contacts (id, first_name, created_at, updated_at) VALUES (1, 'A', 0, 0);
             INSERT INTO `groups` (id, name, created_at) VALUES (10, 'Friends', 0);
             INSERT INTO contact_group_cross_ref (contact_id, group_id) VALUES (1, 10);
             INSERT INTO phone_numbers (contact_id, number, type) VALUES (1, '555', 'MOBILE');
             DELETE FROM contacts WHERE id = 1;",
        )
        .unwrap();

        let remaining: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM contact_group_cross_ref) + (SELECT COUNT(*) FROM phone_numbers)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(remaining, 0);

        let count: i64 = conn
            .query_row(
                "SELECT contact_count FROM group_with_contact_count WHERE id = 10",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }
}
