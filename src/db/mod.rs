// Database module
// Three stores share this opener: mapping.db holds association history,
// storage.db holds device and profile properties.

pub mod device_props;
pub mod mapping;
pub mod migrations;
pub mod profile_props;


use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::constants::{MAPPING_DB_FILENAME, STORAGE_DB_FILENAME};
use crate::error::{ColordError, Result};

pub use device_props::DeviceDb;
pub use mapping::{MappingDb, MappingRow};
pub use profile_props::ProfileDb;

/// Open or create a store at the given path.
/// A file that fails the integrity check is deleted and recreated once.
pub fn open_store(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match open_checked(db_path) {
        Ok(conn) => Ok(conn),
        Err(e) => {
            log::warn!("Database {} is damaged ({}), recreating", db_path.display(), e);
            std::fs::remove_file(db_path).map_err(|err| {
                ColordError::Internal(format!("Cannot remove damaged database: {}", err))
            })?;
            open_checked(db_path)
        }
    }
}

fn open_checked(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;

    let status: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
    if status != "ok" {
        return Err(ColordError::Internal(format!("quick_check reported: {}", status)));
    }

    conn.execute_batch("PRAGMA synchronous = OFF;")?;

    Ok(conn)
}

pub fn get_mapping_db_path(database_dir: &Path) -> PathBuf {
    database_dir.join(MAPPING_DB_FILENAME)
}

pub fn get_storage_db_path(database_dir: &Path) -> PathBuf {
    database_dir.join(STORAGE_DB_FILENAME)
}
