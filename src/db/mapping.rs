// Device to profile association history
// One row per (device, profile). A zero timestamp is a tombstone: the pair was
// explicitly removed and must not be re-attached automatically.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

use super::{migrations, open_store};
use crate::error::{ColordError, Result};
use crate::system::now_micros;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRow {
    pub device: String,
    pub profile: String,
    pub timestamp: i64,
}

pub struct MappingDb {
    conn: Connection,
}

impl MappingDb {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = open_store(db_path)?;
        Self::from_connection(conn)
    }

    /// Wrap an already-open connection, migrating it first
    pub fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate_mappings(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Record the pair with the current time. Returns the stored timestamp.
    pub fn add(&self, device_id: &str, profile_id: &str) -> Result<i64> {
        let timestamp = now_micros();
        self.add_at(device_id, profile_id, timestamp)?;
        Ok(timestamp)
    }

    pub fn add_at(&self, device_id: &str, profile_id: &str, timestamp: i64) -> Result<()> {
        log::debug!("Mapping add {} <-> {} @ {}", device_id, profile_id, timestamp);
        self.conn.execute(
            "INSERT OR REPLACE INTO mappings_v2 (device, profile, timestamp) VALUES (?1, ?2, ?3)",
            params![device_id, profile_id, timestamp],
        )?;
        Ok(())
    }

    /// Tombstone the pair
    pub fn clear_timestamp(&self, device_id: &str, profile_id: &str) -> Result<()> {
        self.add_at(device_id, profile_id, 0)
    }

    /// Delete the row outright. Only administrative tools should forget history.
    pub fn remove(&self, device_id: &str, profile_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM mappings_v2 WHERE device = ?1 AND profile = ?2",
            params![device_id, profile_id],
        )?;
        Ok(())
    }

    pub fn empty(&self) -> Result<()> {
        self.conn.execute_batch("DELETE FROM mappings_v2;")?;
        Ok(())
    }

    /// Live profile ids for a device, oldest first
    pub fn get_profiles(&self, device_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT profile FROM mappings_v2
             WHERE device = ?1 AND timestamp > 0
             ORDER BY timestamp ASC",
        )?;
        let profiles = stmt
            .query_map([device_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(profiles)
    }

    /// Live device ids for a profile, oldest first
    pub fn get_devices(&self, profile_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT device FROM mappings_v2
             WHERE profile = ?1 AND timestamp > 0
             ORDER BY timestamp ASC",
        )?;
        let devices = stmt
            .query_map([profile_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(devices)
    }

    /// `NotFound` if the pair was never recorded, 0 if tombstoned
    pub fn get_timestamp(&self, device_id: &str, profile_id: &str) -> Result<i64> {
        let timestamp: Option<i64> = self
            .conn
            .query_row(
                "SELECT timestamp FROM mappings_v2 WHERE device = ?1 AND profile = ?2",
                params![device_id, profile_id],
                |row| row.get(0),
            )
            .optional()?;
        timestamp.ok_or_else(|| {
            ColordError::NotFound(format!(
                "no mapping for device {} and profile {}",
                device_id, profile_id
            ))
        })
    }

    pub fn list(&self) -> Result<Vec<MappingRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT device, profile, timestamp FROM mappings_v2 ORDER BY device, timestamp DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MappingRow {
                    device: row.get(0)?,
                    profile: row.get(1)?,
                    timestamp: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
