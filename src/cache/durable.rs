//! SQLite-backed durable cache tier.

use super::tier::{CacheError, CacheTier, CacheType};
use crate::sqlite_column;
use crate::sqlite_persistence::{migrate_if_needed, Column, SqlType, Table, VersionedSchema};
use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cached values keyed by string. `expires_at` is in epoch milliseconds, NULL for no expiry.
const CACHE_ENTRIES_TABLE_V1: Table = Table {
    name: "cache_entries",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Blob, non_null = true),
        sqlite_column!("expires_at", &SqlType::Integer),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const CACHE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[CACHE_ENTRIES_TABLE_V1],
    migration: None,
}];

fn expires_at(expiry: Option<Duration>) -> Option<i64> {
    expiry.map(|d| Utc::now().timestamp_millis() + d.as_millis() as i64)
}

/// Durable cache tier kept in its own SQLite database.
pub struct SqliteCacheTier {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheTier {
    pub fn new<P: AsRef<Path>>(db_path: P) -> anyhow::Result<Self> {
        let mut conn =
            Connection::open(db_path.as_ref()).context("Failed to open cache database")?;
        Self::from_connection(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::from_connection(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn from_connection(conn: &mut Connection) -> anyhow::Result<()> {
        migrate_if_needed(conn, CACHE_VERSIONED_SCHEMAS, "cache")
    }

    /// Removes entries whose expiry has passed. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![Utc::now().timestamp_millis()],
        )?;
        Ok(removed)
    }
}

impl CacheTier for SqliteCacheTier {
    fn kind(&self) -> CacheType {
        CacheType::Durable
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM cache_entries
                 WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![key, Utc::now().timestamp_millis()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8], expiry: Option<Duration>) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, expires_at = ?3",
            params![key, value, expires_at(expiry)],
        )?;
        Ok(())
    }

    fn add(&self, key: &str, value: &[u8], expiry: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM cache_entries WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
            params![key, Utc::now().timestamp_millis()],
        )?;
        let inserted = tx.execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO NOTHING",
            params![key, value, expires_at(expiry)],
        )?;
        tx.commit()?;
        if inserted == 0 {
            return Err(CacheError::NotStored(key.to_string()));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn flush(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_delete() {
        let cache = SqliteCacheTier::in_memory().unwrap();
        assert_eq!(cache.get("queries").unwrap(), None);
        cache.set("queries", b"{}", None).unwrap();
        assert_eq!(cache.get("queries").unwrap(), Some(b"{}".to_vec()));
        cache.set("queries", b"[]", None).unwrap();
        assert_eq!(cache.get("queries").unwrap(), Some(b"[]".to_vec()));
        cache.delete("queries").unwrap();
        cache.delete("queries").unwrap();
        assert_eq!(cache.get("queries").unwrap(), None);
    }

    #[test]
    fn test_add_reports_conflict() {
        let cache = SqliteCacheTier::in_memory().unwrap();
        cache.add("song-1", b"x", None).unwrap();
        assert!(matches!(
            cache.add("song-1", b"y", None),
            Err(CacheError::NotStored(_))
        ));
        assert_eq!(cache.get("song-1").unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn test_expired_entries() {
        let cache = SqliteCacheTier::in_memory().unwrap();
        cache.set("a", b"1", Some(Duration::ZERO)).unwrap();
        assert_eq!(cache.get("a").unwrap(), None);
        cache.add("a", b"2", Some(Duration::from_secs(3600))).unwrap();
        assert_eq!(cache.get("a").unwrap(), Some(b"2".to_vec()));

        cache.set("b", b"1", Some(Duration::ZERO)).unwrap();
        assert_eq!(cache.purge_expired().unwrap(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.db");
        {
            let cache = SqliteCacheTier::new(&path).unwrap();
            cache.set("tags", b"[\"rock\"]", None).unwrap();
        }
        let cache = SqliteCacheTier::new(&path).unwrap();
        assert_eq!(cache.get("tags").unwrap(), Some(b"[\"rock\"]".to_vec()));
        cache.flush().unwrap();
        assert_eq!(cache.get("tags").unwrap(), None);
    }
}
