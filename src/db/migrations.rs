// Database migrations
// Schemas are upgraded in place on open. Migrations are idempotent and forward-only.

use rusqlite::{params, Connection};

use crate::error::{ColordError, Result};

/// mapping.db: 1 = legacy `mappings`, 2 = keyed `mappings_v2`
pub const MAPPING_SCHEMA_VERSION: u32 = 2;

/// storage.db: devices, properties_v2 and properties_pu
pub const STORAGE_SCHEMA_VERSION: u32 = 1;

const STORAGE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS devices (
        device_id TEXT PRIMARY KEY,
        device TEXT
    );

    CREATE TABLE IF NOT EXISTS properties_v2 (
        device_id TEXT,
        property TEXT,
        value TEXT,
        PRIMARY KEY (device_id, property)
    );

    CREATE TABLE IF NOT EXISTS properties_pu (
        profile_id TEXT,
        property TEXT,
        uid INTEGER,
        value TEXT,
        PRIMARY KEY (profile_id, property, uid)
    );
"#;

/// Get current schema version from database
pub fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Refuse to open a store written by a newer build
fn check_schema_version(conn: &Connection, supported: u32) -> Result<()> {
    let current = get_schema_version(conn)?;
    if current > supported {
        return Err(ColordError::Internal(format!(
            "Database schema version {} is newer than this build supports (max {})",
            current, supported
        )));
    }
    Ok(())
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
    Ok(())
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

/// Bring mapping.db up to the keyed schema.
/// Legacy rows are copied with their timestamps, then the legacy table is emptied
/// so a second run copies nothing.
pub fn migrate_mappings(conn: &Connection) -> Result<()> {
    check_schema_version(conn, MAPPING_SCHEMA_VERSION)?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS mappings (
            timestamp INTEGER DEFAULT 0,
            device TEXT,
            profile TEXT
        );",
    )?;

    if !column_exists(conn, "mappings", "timestamp")? {
        log::debug!("Adding timestamp column to legacy mappings table");
        conn.execute_batch("ALTER TABLE mappings ADD COLUMN timestamp INTEGER DEFAULT 0;")?;
    }

    if !table_exists(conn, "mappings_v2")? {
        conn.execute_batch(
            "BEGIN;
             CREATE TABLE mappings_v2 (
                timestamp INTEGER DEFAULT 0,
                device TEXT,
                profile TEXT,
                PRIMARY KEY (device, profile)
             );
             INSERT OR REPLACE INTO mappings_v2 (device, profile, timestamp)
                SELECT device, profile, COALESCE(timestamp, 0) FROM mappings;
             DELETE FROM mappings;
             COMMIT;",
        )?;
        log::info!("Migrated mapping store to keyed schema");
    }

    set_schema_version(conn, MAPPING_SCHEMA_VERSION)
}

/// Create any missing storage.db tables
pub fn migrate_storage(conn: &Connection) -> Result<()> {
    check_schema_version(conn, STORAGE_SCHEMA_VERSION)?;
    conn.execute_batch(STORAGE_SCHEMA)?;
    set_schema_version(conn, STORAGE_SCHEMA_VERSION)
}
