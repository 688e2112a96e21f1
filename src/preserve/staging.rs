//! Durable staging table for the preserver hand-off.

use rusqlite::Connection;

/// Name of the staging table. Its presence means a restoration is pending.
pub const STAGING_TABLE: &str = "migration_staging";

const CREATE_SQL: &str = "CREATE TABLE IF NOT EXISTS migration_staging (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    phone_number TEXT,
    email TEXT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    group_ids TEXT
)";

/// One contact's preserved state, identified by what survives a re-import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedEntry {
    /// First phone number of the legacy contact
    pub phone_number: Option<String>,
    /// First email address of the legacy contact
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub is_favorite: bool,
    pub group_ids: Vec<i64>,
}

impl StagedEntry {
    /// Comma-joined group ids, the on-disk form.
    #[must_use]
    pub fn encode_group_ids(&self) -> String {
        self.group_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parse a comma-joined group id list, ignoring fragments that are not ids.
#[must_use]
pub fn parse_group_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn exists(conn: &Connection) -> rusqlite::Result<bool> {
    crate::storage::schema::table_exists(conn, STAGING_TABLE)
}

/// # Errors
///
/// Returns an error if the table cannot be created.
pub fn create(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(CREATE_SQL, [])?;
    Ok(())
}

/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert(conn: &Connection, entry: &StagedEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO migration_staging (phone_number, email, first_name, last_name, is_favorite, group_ids)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            entry.phone_number,
            entry.email,
            entry.first_name,
            entry.last_name,
            entry.is_favorite,
            entry.encode_group_ids(),
        ],
    )?;
    Ok(())
}

/// Read every staged entry in staging order.
///
/// Blank phone and email values read back as `None`.
///
/// # Errors
///
/// Returns an error if the table is missing or a row cannot be decoded.
pub fn read_all(conn: &Connection) -> rusqlite::Result<Vec<StagedEntry>> {
    let mut stmt = conn.prepare(
        "SELECT phone_number, email, first_name, last_name, is_favorite, group_ids
         FROM migration_staging ORDER BY id",
    )?;

    let rows = stmt.query_map([], |row| {
        let phone: Option<String> = row.get(0)?;
        let email: Option<String> = row.get(1)?;
        let group_ids: Option<String> = row.get(5)?;
        Ok(StagedEntry {
            phone_number: phone.filter(|p| !p.trim().is_empty()),
            email: email.filter(|e| !e.trim().is_empty()),
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            is_favorite: row.get(4)?,
            group_ids: group_ids.as_deref().map(parse_group_ids).unwrap_or_default(),
        })
    })?;

    rows.collect()
}

/// Number of staged entries, zero when nothing is staged.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count(conn: &Connection) -> rusqlite::Result<usize> {
    if !exists(conn)? {
        return Ok(0);
    }
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM migration_staging", [], |row| {
        row.get(0)
    })?;
    Ok(usize::try_from(n).unwrap_or_default())
}

/// # Errors
///
/// Returns an error if the drop fails.
pub fn drop_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("DROP TABLE IF EXISTS migration_staging", [])?;
    Ok(())
}
