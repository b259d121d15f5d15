use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::db;
use crate::keys::{dirty_marker, DIRTY_PREFIX};

const DIRTY_VALUE: &str = "1";

/// Where a write comes from. Local writes still need to reach the remote
/// store; remote writes are already synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

type StatusListener = Box<dyn Fn(usize)>;

pub struct LocalStore {
    conn: Connection,
    listener: Option<StatusListener>,
}

impl LocalStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = db::open_connection(path)?;
        Ok(Self {
            conn,
            listener: None,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Registers a callback receiving the outstanding dirty count after
    /// every mutation.
    pub fn set_status_listener(&mut self, listener: impl Fn(usize) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(default);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                debug!(key, error = %err, "malformed local record, using default");
                Ok(default)
            }
        }
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get_raw(key)?.is_some())
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, origin: Origin) -> Result<()> {
        let encoded = serde_json::to_string(value)
            .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
        self.set_raw(key, &encoded, origin)
    }

    pub fn set_raw(&self, key: &str, encoded: &str, origin: Origin) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        put_entry(&tx, key, encoded)?;
        match origin {
            Origin::Local => put_entry(&tx, &dirty_marker(key), DIRTY_VALUE)?,
            Origin::Remote => remove_entry(&tx, &dirty_marker(key))?,
        }
        tx.commit()?;
        self.notify()
    }

    /// Writes a derived record that is never pushed on its own, such as a
    /// sparse habit presence key mirrored by the `habitChecks` aggregate.
    pub fn set_untracked<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(value)
            .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
        put_entry(&self.conn, key, &encoded)
    }

    pub fn remove_untracked(&self, key: &str) -> Result<()> {
        remove_entry(&self.conn, key)
    }

    /// Deleting leaves nothing to push, so the marker goes away regardless
    /// of origin.
    pub fn delete(&self, key: &str, origin: Origin) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        remove_entry(&tx, key)?;
        remove_entry(&tx, &dirty_marker(key))?;
        tx.commit()?;
        debug!(key, ?origin, "deleted local record");
        self.notify()
    }

    pub fn is_dirty(&self, key: &str) -> Result<bool> {
        Ok(self.get_raw(&dirty_marker(key))?.as_deref() == Some(DIRTY_VALUE))
    }

    pub fn clear_dirty(&self, key: &str) -> Result<()> {
        remove_entry(&self.conn, &dirty_marker(key))?;
        self.notify()
    }

    pub fn count_dirty(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE substr(key, 1, length(?1)) = ?1",
            params![DIRTY_PREFIX],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn dirty_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .keys_with_prefix(DIRTY_PREFIX)?
            .into_iter()
            .filter_map(|marker| marker.strip_prefix(DIRTY_PREFIX).map(str::to_string))
            .collect())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM entries ORDER BY key")?;
        let mut rows = stmt.query([])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(row.get(0)?);
        }
        Ok(result)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT key FROM entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let mut rows = stmt.query(params![prefix])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(row.get(0)?);
        }
        Ok(result)
    }

    /// All records except dirty markers, as stored text.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM entries WHERE substr(key, 1, length(?1)) <> ?1 ORDER BY key",
        )?;
        let mut rows = stmt.query(params![DIRTY_PREFIX])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push((row.get(0)?, row.get(1)?));
        }
        Ok(result)
    }

    /// Replaces every record with `entries`, all clean.
    pub fn replace_all(&self, entries: &[(String, String)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM entries", [])?;
        for (key, value) in entries {
            if key.starts_with(DIRTY_PREFIX) {
                continue;
            }
            put_entry(&tx, key, value)?;
        }
        tx.commit()?;
        self.notify()
    }

    fn notify(&self) -> Result<()> {
        if let Some(listener) = &self.listener {
            listener(self.count_dirty()?);
        }
        Ok(())
    }
}

fn put_entry(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO entries (key, value)
VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![key, value],
    )?;
    Ok(())
}

fn remove_entry(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
    Ok(())
}

#[cfg(test)]
mod tests;
