//! Cache Store Layer
//!
//! The external key-value backend behind the response cache: SQLite with
//! connection pooling, WAL mode, and TTL-since-write expiry. Entries outlive
//! a single run; cross-run reuse is the point.
//!
//! The store is deliberately dumb — get, put, scan, delete. Single-flight
//! semantics and degrade-on-outage behavior live in the cache manager.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use crate::types::{CvError, Result};

/// Shared store handle for async contexts.
pub type SharedStore = Arc<dyn CacheStore>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    ttl_secs   INTEGER NOT NULL
);
"#;

/// A cached value with its bookkeeping columns.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    /// Unix seconds at write time
    pub created_at: i64,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.created_at + self.ttl_secs as i64
    }
}

/// Key-value backend contract for the response cache.
///
/// Writes are idempotent: re-writing a key with the same value is safe.
/// Store failures are surfaced as `CvError::CacheUnavailable` so the cache
/// manager can degrade instead of failing the request.
pub trait CacheStore: Send + Sync {
    /// Fetch a live (non-expired) value. Expired entries read as misses.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value with a time-to-live measured from now.
    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// List live keys matching a glob-style pattern.
    fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Delete entries matching a glob-style pattern; returns the count.
    fn remove(&self, pattern: &str) -> Result<usize>;
}

/// SQLite-backed cache store with r2d2 connection pooling.
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (and initialize) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| CvError::CacheUnavailable(format!("connection pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    /// Open an in-memory store for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(Self::configure_connection);
        // A single connection keeps all users on the same in-memory database.
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| CvError::CacheUnavailable(format!("in-memory pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| CvError::CacheUnavailable(format!("acquire connection: {}", e)))
    }

    fn initialize(&self) -> Result<()> {
        self.conn()?
            .execute_batch(SCHEMA)
            .map_err(|e| CvError::CacheUnavailable(format!("initialize schema: {}", e)))
    }

    /// Drop every entry whose TTL has elapsed.
    pub fn purge_expired(&self) -> Result<usize> {
        let conn = self.conn()?;
        let purged = conn
            .execute(
                "DELETE FROM cache_entries WHERE created_at + ttl_secs <= ?1",
                params![Utc::now().timestamp()],
            )
            .map_err(|e| CvError::CacheUnavailable(format!("purge: {}", e)))?;
        Ok(purged)
    }

    fn live_entries(&self, pattern: &glob::Pattern) -> Result<Vec<CacheEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key, value, created_at, ttl_secs FROM cache_entries")
            .map_err(|e| CvError::CacheUnavailable(format!("scan: {}", e)))?;

        let now = Utc::now().timestamp();
        let rows = stmt
            .query_map([], |row| {
                Ok(CacheEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    created_at: row.get(2)?,
                    ttl_secs: row.get::<_, i64>(3)? as u64,
                })
            })
            .map_err(|e| CvError::CacheUnavailable(format!("scan: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            let entry = row.map_err(|e| CvError::CacheUnavailable(format!("scan row: {}", e)))?;
            if !entry.is_expired(now) && pattern.matches(&entry.key) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

fn parse_pattern(pattern: &str) -> Result<glob::Pattern> {
    glob::Pattern::new(pattern)
        .map_err(|e| CvError::Config(format!("invalid key pattern {:?}: {}", pattern, e)))
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                "SELECT key, value, created_at, ttl_secs FROM cache_entries WHERE key = ?1",
                params![key],
                |row| {
                    Ok(CacheEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        created_at: row.get(2)?,
                        ttl_secs: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()
            .map_err(|e| CvError::CacheUnavailable(format!("get: {}", e)))?;

        match entry {
            Some(entry) if entry.is_expired(Utc::now().timestamp()) => {
                // Lazy eviction on read.
                conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
                    .map_err(|e| CvError::CacheUnavailable(format!("evict: {}", e)))?;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, created_at, ttl_secs)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, value, Utc::now().timestamp(), ttl.as_secs() as i64],
        )
        .map_err(|e| CvError::CacheUnavailable(format!("put: {}", e)))?;
        Ok(())
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = parse_pattern(pattern)?;
        let mut keys: Vec<String> = self
            .live_entries(&pattern)?
            .into_iter()
            .map(|e| e.key)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn remove(&self, pattern: &str) -> Result<usize> {
        let pattern = parse_pattern(pattern)?;
        let keys: Vec<String> = {
            let conn = self.conn()?;
            let mut stmt = conn
                .prepare("SELECT key FROM cache_entries")
                .map_err(|e| CvError::CacheUnavailable(format!("scan: {}", e)))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| CvError::CacheUnavailable(format!("scan: {}", e)))?;
            rows.filter_map(|r| r.ok())
                .filter(|k| pattern.matches(k))
                .collect()
        };

        let conn = self.conn()?;
        let mut removed = 0;
        for key in keys {
            removed += conn
                .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
                .map_err(|e| CvError::CacheUnavailable(format!("remove: {}", e)))?;
        }
        Ok(removed)
    }
}
