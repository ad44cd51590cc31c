use crate::core::error::DropletError;
use crate::core::pool;
use crate::core::store::{Store, validate_image_filename};
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// One captured sample: a sensor reading and the image taken with it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DataEntry {
    pub id: i64,
    /// RFC 3339 UTC, set on insert and never changed.
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub image_filename: String,
    pub experiment_id: i64,
}

pub(crate) const ENTRY_COLUMNS: &str =
    "id, timestamp, temperature, humidity, image_filename, experiment_id";

pub(crate) fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<DataEntry> {
    Ok(DataEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        temperature: row.get(2)?,
        humidity: row.get(3)?,
        image_filename: row.get(4)?,
        experiment_id: row.get(5)?,
    })
}

fn experiment_exists(conn: &Connection, experiment_id: i64) -> Result<bool, DropletError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM experiments WHERE id = ?1",
            params![experiment_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn filename_owner(conn: &Connection, image_filename: &str) -> Result<Option<i64>, DropletError> {
    Ok(conn
        .query_row(
            "SELECT id FROM data_entries WHERE image_filename = ?1",
            params![image_filename],
            |row| row.get(0),
        )
        .optional()?)
}

/// Map a UNIQUE violation on `image_filename` to `Conflict`.
fn map_unique_violation(err: rusqlite::Error, image_filename: &str) -> DropletError {
    if let rusqlite::Error::SqliteFailure(code, _) = &err
        && code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    {
        return DropletError::Conflict(format!(
            "image filename '{}' is already in use",
            image_filename
        ));
    }
    DropletError::RusqliteError(err)
}

pub(crate) fn query_entry(conn: &Connection, id: i64) -> Result<DataEntry, DropletError> {
    conn.query_row(
        &format!("SELECT {} FROM data_entries WHERE id = ?1", ENTRY_COLUMNS),
        params![id],
        entry_from_row,
    )
    .optional()?
    .ok_or_else(|| DropletError::NotFound(format!("data entry {}", id)))
}

pub(crate) fn query_entries_for(
    conn: &Connection,
    experiment_id: i64,
) -> Result<Vec<DataEntry>, DropletError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM data_entries WHERE experiment_id = ?1 ORDER BY id ASC",
        ENTRY_COLUMNS
    ))?;
    let rows = stmt.query_map(params![experiment_id], entry_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// NaN would be stored as NULL and infinities cannot round-trip through JSON.
fn validate_reading(temperature: f64, humidity: f64) -> Result<(), DropletError> {
    if !temperature.is_finite() || !humidity.is_finite() {
        return Err(DropletError::ValidationError(format!(
            "reading must be finite (temperature {}, humidity {})",
            temperature, humidity
        )));
    }
    Ok(())
}

/// Insert a new entry for an existing experiment.
///
/// Fails `NotFound` if the experiment is missing and `Conflict` if the image
/// filename is taken. Nothing is written in either case.
pub fn create(
    store: &Store,
    temperature: f64,
    humidity: f64,
    image_filename: &str,
    experiment_id: i64,
) -> Result<DataEntry, DropletError> {
    validate_reading(temperature, humidity)?;
    validate_image_filename(image_filename)?;
    let timestamp = time::now_rfc3339();

    let entry = pool::global_pool().with_write(&store.db_path(), |conn| {
        if !experiment_exists(conn, experiment_id)? {
            return Err(DropletError::NotFound(format!("experiment {}", experiment_id)));
        }
        if filename_owner(conn, image_filename)?.is_some() {
            return Err(DropletError::Conflict(format!(
                "image filename '{}' is already in use",
                image_filename
            )));
        }

        conn.execute(
            "INSERT INTO data_entries(timestamp, temperature, humidity, image_filename, experiment_id)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![timestamp, temperature, humidity, image_filename, experiment_id],
        )
        .map_err(|e| map_unique_violation(e, image_filename))?;

        Ok(DataEntry {
            id: conn.last_insert_rowid(),
            timestamp: timestamp.clone(),
            temperature,
            humidity,
            image_filename: image_filename.to_string(),
            experiment_id,
        })
    })?;

    tracing::info!(
        entry_id = entry.id,
        experiment_id,
        image = %entry.image_filename,
        "data entry created"
    );
    Ok(entry)
}

pub fn get(store: &Store, id: i64) -> Result<DataEntry, DropletError> {
    pool::global_pool().with_read(&store.db_path(), |conn| query_entry(conn, id))
}

pub fn list_by_experiment(store: &Store, experiment_id: i64) -> Result<Vec<DataEntry>, DropletError> {
    pool::global_pool().with_read(&store.db_path(), |conn| query_entries_for(conn, experiment_id))
}

/// Replace temperature, humidity and filename of an entry.
///
/// `experiment_id` is the experiment the caller believes owns the entry; a
/// mismatch is reported as `NotFound` so entries cannot be edited through a
/// foreign experiment. The image file itself is not renamed.
pub fn update(
    store: &Store,
    experiment_id: i64,
    id: i64,
    temperature: f64,
    humidity: f64,
    image_filename: &str,
) -> Result<DataEntry, DropletError> {
    validate_reading(temperature, humidity)?;
    validate_image_filename(image_filename)?;

    let entry = pool::global_pool().with_write(&store.db_path(), |conn| {
        let current = query_entry(conn, id)?;
        if current.experiment_id != experiment_id {
            return Err(DropletError::NotFound(format!(
                "data entry {} in experiment {}",
                id, experiment_id
            )));
        }
        if let Some(owner) = filename_owner(conn, image_filename)?
            && owner != id
        {
            return Err(DropletError::Conflict(format!(
                "image filename '{}' is already in use",
                image_filename
            )));
        }

        conn.execute(
            "UPDATE data_entries SET temperature = ?1, humidity = ?2, image_filename = ?3 WHERE id = ?4",
            params![temperature, humidity, image_filename, id],
        )
        .map_err(|e| map_unique_violation(e, image_filename))?;

        Ok(DataEntry {
            temperature,
            humidity,
            image_filename: image_filename.to_string(),
            ..current
        })
    })?;

    tracing::info!(entry_id = id, experiment_id, "data entry updated");
    Ok(entry)
}

/// Remove the entry's image (if still present) and then its row.
pub fn delete(store: &Store, id: i64) -> Result<(), DropletError> {
    pool::global_pool().with_write(&store.db_path(), |conn| {
        let entry = query_entry(conn, id)?;
        delete_with_conn(store, conn, &entry)
    })?;
    tracing::info!(entry_id = id, "data entry deleted");
    Ok(())
}

/// Shared by single deletes and the experiment cascade, which runs it inside
/// its own transaction.
pub(crate) fn delete_with_conn(
    store: &Store,
    conn: &Connection,
    entry: &DataEntry,
) -> Result<(), DropletError> {
    remove_image(store, &entry.image_filename);
    conn.execute("DELETE FROM data_entries WHERE id = ?1", params![entry.id])?;
    Ok(())
}

/// Best-effort removal of a managed image. Returns whether a file was removed.
///
/// A missing file is expected (external cleanup, crash between row and file
/// operations); other failures are logged and swallowed.
pub fn remove_image(store: &Store, image_filename: &str) -> bool {
    let path = match store.image_path(image_filename) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(image = %image_filename, error = %e, "refusing to remove image");
            return false;
        }
    };
    match fs::remove_file(&path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "image already absent");
            false
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove image");
            false
        }
    }
}

/// Read a managed image, or `None` if it is not on disk.
pub fn load_image(store: &Store, image_filename: &str) -> Result<Option<Vec<u8>>, DropletError> {
    let path = store.image_path(image_filename)?;
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DropletError::IoError(e)),
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "entry",
        "version": "0.1.0",
        "description": "Sensor samples and the lifecycle of their image files",
        "commands": [
            { "name": "add", "parameters": ["experiment", "temperature", "humidity", "image"] },
            { "name": "list", "parameters": ["experiment"] },
            { "name": "get", "parameters": ["id"] },
            { "name": "update", "parameters": ["experiment", "id", "temperature", "humidity", "image"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["droplet.db", "images/"]
    })
}
