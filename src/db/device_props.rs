// Persistent device properties
// Only disk-scope devices are listed in `devices`; their properties are replayed
// at startup.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::{migrations, open_store};
use crate::error::Result;

pub struct DeviceDb {
    conn: Connection,
}

impl DeviceDb {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = open_store(db_path)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate_storage(&conn)?;
        Ok(Self { conn })
    }

    pub fn add(&self, device_id: &str) -> Result<()> {
        log::debug!("DeviceDb: add device {}", device_id);
        self.conn.execute(
            "INSERT OR REPLACE INTO devices (device_id) VALUES (?1)",
            [device_id],
        )?;
        Ok(())
    }

    pub fn set_property(&self, device_id: &str, property: &str, value: &str) -> Result<()> {
        log::debug!("DeviceDb: add device {} [{}={}]", device_id, property, value);
        self.conn.execute(
            "INSERT OR REPLACE INTO properties_v2 (device_id, property, value) VALUES (?1, ?2, ?3)",
            params![device_id, property, value],
        )?;
        Ok(())
    }

    pub fn get_property(&self, device_id: &str, property: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM properties_v2 WHERE device_id = ?1 AND property = ?2 LIMIT 1",
                params![device_id, property],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Property names recorded for a device
    pub fn get_properties(&self, device_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT property FROM properties_v2 WHERE device_id = ?1 ORDER BY property")?;
        let keys = stmt
            .query_map([device_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    pub fn get_devices(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT device_id FROM devices")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Forget a device and all of its properties
    pub fn remove(&self, device_id: &str) -> Result<()> {
        log::debug!("DeviceDb: remove device {}", device_id);
        self.conn.execute("DELETE FROM devices WHERE device_id = ?1", [device_id])?;
        self.conn.execute("DELETE FROM properties_v2 WHERE device_id = ?1", [device_id])?;
        Ok(())
    }

    pub fn empty(&self) -> Result<()> {
        self.conn.execute_batch("DELETE FROM devices; DELETE FROM properties_v2;")?;
        Ok(())
    }
}
