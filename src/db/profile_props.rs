// Per-user profile properties
// Values are keyed by the viewing uid so each user can title a shared profile.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::{migrations, open_store};
use crate::error::Result;

pub struct ProfileDb {
    conn: Connection,
}

impl ProfileDb {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = open_store(db_path)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate_storage(&conn)?;
        Ok(Self { conn })
    }

    pub fn set_property(&self, profile_id: &str, property: &str, uid: u32, value: &str) -> Result<()> {
        log::debug!("ProfileDb: set {} [{}={}] for uid {}", profile_id, property, value, uid);
        self.conn.execute(
            "INSERT OR REPLACE INTO properties_pu (profile_id, property, uid, value)
             VALUES (?1, ?2, ?3, ?4)",
            params![profile_id, property, uid, value],
        )?;
        Ok(())
    }

    pub fn get_property(&self, profile_id: &str, property: &str, uid: u32) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM properties_pu
                 WHERE profile_id = ?1 AND property = ?2 AND uid = ?3 LIMIT 1",
                params![profile_id, property, uid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn get_properties(&self, profile_id: &str, uid: u32) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT property FROM properties_pu WHERE profile_id = ?1 AND uid = ?2 ORDER BY property",
        )?;
        let keys = stmt
            .query_map(params![profile_id, uid], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    pub fn remove_property(&self, profile_id: &str, property: &str, uid: u32) -> Result<()> {
        self.conn.execute(
            "DELETE FROM properties_pu WHERE profile_id = ?1 AND property = ?2 AND uid = ?3",
            params![profile_id, property, uid],
        )?;
        Ok(())
    }

    /// Drop every user's values for a profile
    pub fn remove(&self, profile_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM properties_pu WHERE profile_id = ?1", [profile_id])?;
        Ok(())
    }

    pub fn empty(&self) -> Result<()> {
        self.conn.execute_batch("DELETE FROM properties_pu;")?;
        Ok(())
    }
}
