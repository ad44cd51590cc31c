//! Database schema definitions for the droplet store.
//!
//! All state lives in a single SQLite database. Cascading deletion of data
//! entries is performed explicitly by the experiment store, so the foreign key
//! carries no `ON DELETE` action: a dangling child row makes the parent delete
//! fail instead of silently disappearing.

pub const DROPLET_DB_NAME: &str = "droplet.db";

pub const EXPERIMENTS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS experiments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT
    )
";

pub const DATA_ENTRIES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS data_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        temperature REAL NOT NULL,
        humidity REAL NOT NULL,
        image_filename TEXT NOT NULL UNIQUE,
        experiment_id INTEGER NOT NULL,
        FOREIGN KEY(experiment_id) REFERENCES experiments(id)
    )
";

pub const DATA_ENTRIES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_data_entries_experiment ON data_entries(experiment_id)";

/// Statements applied, in order, when the database is initialized.
pub const DROPLET_DB_SCHEMA: &[&str] = &[EXPERIMENTS_SCHEMA, DATA_ENTRIES_SCHEMA, DATA_ENTRIES_INDEX];
