//! Schema migration ladder.
//!
//! Legacy versions 1, 2 and 3 are rebuilt in one consolidated step that
//! captures favorites and group memberships before the old tables are
//! dropped. Versions 4 through 6 move forward with additive DDL only.
//!
//! The whole ladder runs in one transaction. Foreign key enforcement is
//! switched off around it because SQLite ignores that pragma inside a
//! transaction and the rebuild drops referenced tables.

use crate::error::{Error, Result};
use crate::preserve;
use crate::storage::schema::{CURRENT_SCHEMA_VERSION, GROUP_VIEW_SQL, SCHEMA_SQL};
use rusqlite::Connection;
use tracing::{info, warn};

/// How a migration moves the database forward.
enum Step {
    /// Capture user state, drop and recreate every table, stage the
    /// captured state for the restoration pass.
    Consolidated,
    /// Additive statements applied one by one.
    Additive(&'static [&'static str]),
}

/// A single migration with version identifier and its step.
struct Migration {
    version: &'static str,
    from: i32,
    to: i32,
    step: Step,
}

/// All migrations, keyed by the version they start from.
///
/// The `schema_migrations` table records which have been applied.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_007_consolidated",
        from: 1,
        to: 7,
        step: Step::Consolidated,
    },
    Migration {
        version: "002_007_consolidated",
        from: 2,
        to: 7,
        step: Step::Consolidated,
    },
    Migration {
        version: "003_007_consolidated",
        from: 3,
        to: 7,
        step: Step::Consolidated,
    },
    Migration {
        version: "004_005_name_fields",
        from: 4,
        to: 5,
        step: Step::Additive(MIGRATION_4_5),
    },
    Migration {
        version: "005_006_system_groups",
        from: 5,
        to: 6,
        step: Step::Additive(MIGRATION_5_6),
    },
    Migration {
        version: "006_007_contact_accounts",
        from: 6,
        to: 7,
        step: Step::Additive(MIGRATION_6_7),
    },
];

const MIGRATION_4_5: &[&str] = &[
    "ALTER TABLE contacts ADD COLUMN prefix TEXT DEFAULT NULL",
    "ALTER TABLE contacts ADD COLUMN middle_name TEXT DEFAULT NULL",
    "ALTER TABLE contacts ADD COLUMN suffix TEXT DEFAULT NULL",
    "ALTER TABLE contacts ADD COLUMN nickname TEXT DEFAULT NULL",
    "ALTER TABLE contacts ADD COLUMN ringtone TEXT DEFAULT NULL",
    "CREATE TABLE IF NOT EXISTS websites (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        contact_id INTEGER NOT NULL,
        url TEXT NOT NULL,
        type TEXT NOT NULL,
        FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_websites_contact ON websites(contact_id)",
    "CREATE TABLE IF NOT EXISTS instant_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        contact_id INTEGER NOT NULL,
        handle TEXT NOT NULL,
        protocol TEXT NOT NULL,
        FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_instant_messages_contact ON instant_messages(contact_id)",
    "CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        contact_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        type TEXT NOT NULL,
        FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_events_contact ON events(contact_id)",
];

const MIGRATION_5_6: &[&str] = &[
    "ALTER TABLE `groups` ADD COLUMN is_system_group INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE `groups` ADD COLUMN system_id TEXT DEFAULT NULL",
    "ALTER TABLE `groups` ADD COLUMN account_name TEXT DEFAULT NULL",
    "ALTER TABLE `groups` ADD COLUMN account_type TEXT DEFAULT NULL",
    // The old index was unique; system groups repeat names across accounts
    "DROP INDEX IF EXISTS idx_groups_name",
    "CREATE INDEX IF NOT EXISTS idx_groups_name ON `groups`(name)",
];

const MIGRATION_6_7: &[&str] = &[
    "ALTER TABLE contacts ADD COLUMN source TEXT NOT NULL DEFAULT ''",
    "ALTER TABLE contacts ADD COLUMN account_name TEXT DEFAULT NULL",
    "ALTER TABLE contacts ADD COLUMN account_type TEXT DEFAULT NULL",
    "CREATE INDEX IF NOT EXISTS idx_contacts_source ON contacts(source)",
    "CREATE INDEX IF NOT EXISTS idx_contacts_account_type ON contacts(account_type)",
    "DROP VIEW IF EXISTS group_with_contact_count",
    GROUP_VIEW_SQL,
];

/// Every table a legacy database may hold. Dropped by the consolidated step.
const LEGACY_TABLES: &[&str] = &[
    "contact_group_cross_ref",
    "phone_numbers",
    "emails",
    "addresses",
    "websites",
    "instant_messages",
    "events",
    "groups",
    "contacts",
];

const LOG_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
)";

/// Walk a database forward from `from` to the current schema version.
///
/// # Errors
///
/// Returns an error if any step fails; the transaction is rolled back and
/// the database keeps its old version.
pub fn run_migrations(conn: &Connection, from: i32) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    let result = apply_ladder(conn, from);
    conn.pragma_update(None, "foreign_keys", "ON")?;
    result
}

fn apply_ladder(conn: &Connection, from: i32) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(LOG_TABLE_SQL, [])?;

    let mut version = from;
    while version < CURRENT_SCHEMA_VERSION {
        let migration = MIGRATIONS
            .iter()
            .find(|m| m.from == version)
            .ok_or(Error::UnsupportedSchema {
                found: version,
                supported: CURRENT_SCHEMA_VERSION,
            })?;

        info!(
            version = migration.version,
            from = migration.from,
            to = migration.to,
            "Applying migration"
        );

        match migration.step {
            Step::Consolidated => rebuild_preserving(&tx)?,
            Step::Additive(statements) => apply_additive(&tx, migration.version, statements)?,
        }

        tx.execute(
            "INSERT OR REPLACE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp_millis()],
        )?;

        info!(version = migration.version, "Migration complete");
        version = migration.to;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}

fn apply_additive(conn: &Connection, version: &str, statements: &[&str]) -> Result<()> {
    for sql in statements {
        if let Err(e) = conn.execute_batch(sql) {
            // A column added by hand or by an interrupted tool is not fatal
            if e.to_string().contains("duplicate column name") {
                warn!(version, error = %e, "Column already present, continuing");
            } else {
                return Err(e.into());
            }
        }
    }
    Ok(())
}

fn rebuild_preserving(conn: &Connection) -> Result<()> {
    let captured = preserve::capture(conn);

    conn.execute_batch("DROP VIEW IF EXISTS group_with_contact_count")?;
    for table in LEGACY_TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS `{table}`"))?;
    }

    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(GROUP_VIEW_SQL)?;

    preserve::stage(conn, &captured)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preserve::staging;
    use crate::storage::schema::{apply_schema, detect_version};

    const LEGACY_V2: &str = "
        CREATE TABLE contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL DEFAULT '',
            is_favorite INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE phone_numbers (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            contact_id INTEGER NOT NULL,
            number TEXT NOT NULL,
            type TEXT NOT NULL
        );
        CREATE TABLE emails (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            contact_id INTEGER NOT NULL,
            email TEXT NOT NULL,
            type TEXT NOT NULL
        );
        CREATE TABLE `groups` (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX idx_groups_name ON `groups`(name);
        CREATE TABLE contact_group_cross_ref (
            contact_id INTEGER NOT NULL,
            group_id INTEGER NOT NULL,
            PRIMARY KEY (contact_id, group_id)
        );

        INSERT INTO contacts (id, first_name, last_name, is_favorite, created_at, updated_at)
            VALUES (1, 'Ann', 'Lee', 1, 0, 0),
                   (2, 'Bo', 'Chen', 0, 0, 0),
                   (3, 'Cy', 'Dahl', 0, 0, 0);
        INSERT INTO phone_numbers (contact_id, number, type) VALUES (1, '555-0101', 'MOBILE');
        INSERT INTO emails (contact_id, email, type) VALUES (2, 'bo@example.com', 'HOME');
        INSERT INTO `groups` (id, name, created_at) VALUES (40, 'Climbing', 7);
        INSERT INTO contact_group_cross_ref (contact_id, group_id) VALUES (2, 40);
        PRAGMA user_version = 2;
    ";

    const LEGACY_V4: &str = "
        CREATE TABLE contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL DEFAULT '',
            photo_uri TEXT DEFAULT NULL,
            organization TEXT DEFAULT NULL,
            title TEXT DEFAULT NULL,
            notes TEXT DEFAULT NULL,
            birthday TEXT DEFAULT NULL,
            is_favorite INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE phone_numbers (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            contact_id INTEGER NOT NULL,
            number TEXT NOT NULL,
            type TEXT NOT NULL
        );
        CREATE TABLE emails (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            contact_id INTEGER NOT NULL,
            email TEXT NOT NULL,
            type TEXT NOT NULL
        );
        CREATE TABLE addresses (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            contact_id INTEGER NOT NULL,
            street TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            country TEXT NOT NULL,
            type TEXT NOT NULL
        );
        CREATE TABLE `groups` (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX idx_groups_name ON `groups`(name);
        CREATE TABLE contact_group_cross_ref (
            contact_id INTEGER NOT NULL,
            group_id INTEGER NOT NULL,
            PRIMARY KEY (contact_id, group_id)
        );

        INSERT INTO contacts (id, first_name, last_name, is_favorite, created_at, updated_at)
            VALUES (9, 'Dee', 'Fox', 1, 0, 0);
        INSERT INTO `groups` (id, name, created_at) VALUES (3, 'Work', 0);
        INSERT INTO contact_group_cross_ref (contact_id, group_id) VALUES (9, 3);
        PRAGMA user_version = 4;
    ";

    fn applied_versions(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT version FROM schema_migrations ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_every_legacy_version_has_a_step() {
        for version in 1..CURRENT_SCHEMA_VERSION {
            assert!(
                MIGRATIONS.iter().any(|m| m.from == version),
                "no migration from {version}"
            );
        }
    }

    #[test]
    fn test_consolidated_upgrade_stages_user_state() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEGACY_V2).unwrap();

        apply_schema(&conn).expect("legacy upgrade should succeed");

        assert_eq!(detect_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
        assert_eq!(applied_versions(&conn), vec!["002_007_consolidated"]);

        // Contacts are dropped; the next sync repopulates them
        let contacts: i64 = conn
            .query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(contacts, 0);

        // Groups keep their ids and become user groups
        let (name, system): (String, bool) = conn
            .query_row(
                "SELECT name, is_system_group FROM `groups` WHERE id = 40",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(name, "Climbing");
        assert!(!system);

        // Ann (favorite) and Bo (group member) are staged, Cy is not
        let entries = staging::read_all(&conn).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].phone_number.as_deref(), Some("555-0101"));
        assert!(entries[0].is_favorite);
        assert_eq!(entries[1].email.as_deref(), Some("bo@example.com"));
        assert_eq!(entries[1].group_ids, vec![40]);

        let fk_enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_enabled, 1);
    }

    #[test]
    fn test_consolidated_upgrade_tolerates_missing_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE contacts (
                id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL DEFAULT '',
                is_favorite INTEGER NOT NULL DEFAULT 0
            );
            INSERT INTO contacts (id, first_name, last_name, is_favorite) VALUES (1, 'Eve', 'Ng', 1);
            PRAGMA user_version = 1;",
        )
        .unwrap();

        apply_schema(&conn).expect("partial capture is acceptable");

        let entries = staging::read_all(&conn).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].first_name, "Eve");
        assert!(entries[0].phone_number.is_none());
    }

    #[test]
    fn test_additive_upgrade_keeps_data() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEGACY_V4).unwrap();

        apply_schema(&conn).expect("additive upgrade should succeed");

        assert_eq!(
            applied_versions(&conn),
            vec![
                "004_005_name_fields",
                "005_006_system_groups",
                "006_007_contact_accounts"
            ]
        );

        let (first, source): (String, String) = conn
            .query_row(
                "SELECT first_name, source FROM contacts WHERE id = 9",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(first, "Dee");
        assert_eq!(source, "");

        // Duplicate group names are allowed after 5 -> 6
        conn.execute(
            "INSERT INTO `groups` (name, created_at, is_system_group) VALUES ('Work', 0, 1)",
            [],
        )
        .unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT contact_count FROM group_with_contact_count WHERE id = 3",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);

        assert!(!staging::exists(&conn).unwrap());
    }

    #[test]
    fn test_duplicate_column_is_tolerated() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEGACY_V4).unwrap();
        conn.execute_batch("ALTER TABLE contacts ADD COLUMN nickname TEXT DEFAULT NULL")
            .unwrap();

        apply_schema(&conn).expect("existing column should not abort the ladder");
        assert_eq!(detect_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
