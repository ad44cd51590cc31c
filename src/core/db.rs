use crate::core::error::DropletError;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT_SECS: u64 = 5;

pub fn db_connect(db_path: &str) -> Result<Connection, DropletError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
        .map_err(DropletError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(DropletError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(DropletError::RusqliteError)?;
    Ok(conn)
}

pub fn droplet_db_path(root: &Path) -> PathBuf {
    root.join(schemas::DROPLET_DB_NAME)
}

pub fn initialize_droplet_db(root: &Path) -> Result<(), DropletError> {
    fs::create_dir_all(root).map_err(|e| {
        DropletError::DatabaseInitializationError(format!(
            "cannot create data directory {}: {}",
            root.display(),
            e
        ))
    })?;

    let db_path = droplet_db_path(root);
    let conn = db_connect(&db_path.to_string_lossy())?;
    for statement in schemas::DROPLET_DB_SCHEMA {
        conn.execute(statement, [])?;
    }

    tracing::debug!(path = %db_path.display(), "droplet database initialized");
    Ok(())
}
