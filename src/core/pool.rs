//! SQLite access with read/write separation.
//!
//! - Writes are serialized through a **write mutex** per database path, each
//!   using a fresh connection.
//! - Reads open a fresh connection without taking the mutex (WAL allows
//!   concurrent readers).
//!
//! Connections are not cached: the capture path shells out to external tools
//! and a child process must not inherit open WAL/SHM handles.

use crate::core::db;
use crate::core::error::DropletError;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Per-database entry holding the write mutex.
struct PoolEntry {
    write_lock: Mutex<()>,
    db_path: PathBuf,
}

pub struct SqlitePool {
    entries: Mutex<HashMap<PathBuf, &'static PoolEntry>>,
}

impl SqlitePool {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_entry(&self, db_path: &Path) -> Result<&'static PoolEntry, DropletError> {
        let key = db_path.to_path_buf();
        let mut entries = self.entries.lock().map_err(|_| {
            DropletError::DatabaseInitializationError("SqlitePool entries lock poisoned".to_string())
        })?;
        if let Some(entry) = entries.get(&key) {
            return Ok(*entry);
        }
        // Entries live for the whole process; the set of databases is tiny.
        let entry = Box::leak(Box::new(PoolEntry {
            write_lock: Mutex::new(()),
            db_path: key.clone(),
        }));
        entries.insert(key, entry);
        Ok(entry)
    }

    /// Execute a closure with a write connection for the given DB path.
    pub fn with_write<F, R>(&self, db_path: &Path, f: F) -> Result<R, DropletError>
    where
        F: FnOnce(&Connection) -> Result<R, DropletError>,
    {
        let entry = self.get_entry(db_path)?;
        let _guard = entry.write_lock.lock().map_err(|_| {
            DropletError::DatabaseInitializationError("Pool write lock poisoned".to_string())
        })?;

        let conn = db::db_connect(&entry.db_path.to_string_lossy())?;
        f(&conn)
    }

    /// Execute a closure with a read connection (no mutex serialization).
    pub fn with_read<F, R>(&self, db_path: &Path, f: F) -> Result<R, DropletError>
    where
        F: FnOnce(&Connection) -> Result<R, DropletError>,
    {
        let conn = db::db_connect(&db_path.to_string_lossy())?;
        f(&conn)
    }
}

/// Global pool instance (same lifetime as the process).
pub fn global_pool() -> &'static SqlitePool {
    static POOL: OnceLock<SqlitePool> = OnceLock::new();
    POOL.get_or_init(SqlitePool::new)
}
