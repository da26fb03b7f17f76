//! Persistent device registry. One row per hardware address, created on
//! first sighting and never deleted; the surrogate id is the row's primary
//! key and stays stable for the life of the registry file.

use std::path::Path;

use log::warn;
use pnet::util::MacAddr;
use rusqlite::{Connection, OptionalExtension, params};

use crate::device::{Device, UNNAMED};
use crate::error::Result;

/// A registry row as stored, used for the device listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDevice {
    pub id: i64,
    pub mac: String,
    pub name: String,
}

pub struct DeviceRegistry {
    conn: Connection,
}

impl DeviceRegistry {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Busy timeout first; it needs no locks
        let _ = conn.execute("PRAGMA busy_timeout = 5000;", []);
        // WAL may fail if another connection holds a transaction, which is OK
        let _ = conn.execute("PRAGMA journal_mode = WAL;", []);
        // NORMAL sync is safe with WAL mode
        let _ = conn.execute("PRAGMA synchronous = NORMAL;", []);

        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::create_table_if_not_exists(&conn)?;
        Ok(Self { conn })
    }

    fn create_table_if_not_exists(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS devices (
                id INTEGER PRIMARY KEY,
                mac TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL DEFAULT 'unknown'
            )",
            [],
        )?;
        Ok(())
    }

    /// Idempotent upsert keyed by MAC. A missing row is inserted with the
    /// sentinel name; an existing row, including its stored name, is left
    /// untouched. A conflicting concurrent insert is logged and ignored.
    pub fn ensure_registered(&self, mac: MacAddr) -> Result<()> {
        match self.conn.execute(
            "INSERT OR IGNORE INTO devices (mac, name) VALUES (?1, ?2)",
            params![mac.to_string(), UNNAMED],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                warn!("registry conflict for {}; keeping the existing row", mac);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fill the device's name from its stored row while the in-memory name
    /// is still unset. The stored sentinel does not count as a name, so
    /// vendor enrichment can still run for never-named devices. A missing
    /// row is a consistency gap: logged, not raised.
    pub fn hydrate_name(&self, device: &mut Device) {
        if device.name.is_some() {
            return;
        }
        let Some(mac) = device.mac else { return };

        let stored = self
            .conn
            .query_row(
                "SELECT name FROM devices WHERE mac = ?1",
                params![mac.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional();

        match stored {
            Ok(Some(name)) if name != UNNAMED => device.name = Some(name),
            Ok(Some(_)) => {}
            Ok(None) => warn!("no registry row for {} during name hydration", mac),
            Err(e) => warn!("name lookup failed for {}: {}", mac, e),
        }
    }

    /// Fill the device's surrogate id from its stored row. Assign-once: a
    /// device that already carries an id is left alone.
    pub fn assign_id(&self, device: &mut Device) {
        if device.id.is_some() {
            return;
        }
        let Some(mac) = device.mac else { return };

        let stored = self
            .conn
            .query_row(
                "SELECT id FROM devices WHERE mac = ?1",
                params![mac.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional();

        match stored {
            Ok(Some(id)) => device.id = Some(id),
            Ok(None) => warn!("no registry row for {} during id assignment", mac),
            Err(e) => warn!("id lookup failed for {}: {}", mac, e),
        }
    }

    /// Persist a user- or vendor-supplied name, overwriting any prior value.
    pub fn set_name(&self, mac: MacAddr, name: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE devices SET name = ?1 WHERE mac = ?2",
            params![name, mac.to_string()],
        )?;
        Ok(())
    }

    /// Every row ever registered, ordered by surrogate id.
    pub fn all_devices(&self) -> Result<Vec<StoredDevice>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, mac, name FROM devices ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredDevice {
                    id: row.get(0)?,
                    mac: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}
