use crate::core::error::DropletError;
use crate::core::pool;
use crate::core::store::Store;
use crate::plugins::data_entry::{self, DataEntry};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Experiment {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Owned entries in insertion (id) order.
    pub data_entries: Vec<DataEntry>,
}

fn validate_name(name: &str) -> Result<(), DropletError> {
    if name.trim().is_empty() {
        return Err(DropletError::ValidationError(
            "experiment name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn query_header(conn: &Connection, id: i64) -> Result<(String, Option<String>), DropletError> {
    conn.query_row(
        "SELECT name, description FROM experiments WHERE id = ?1",
        params![id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| DropletError::NotFound(format!("experiment {}", id)))
}

fn query_experiment(conn: &Connection, id: i64) -> Result<Experiment, DropletError> {
    let (name, description) = query_header(conn, id)?;
    Ok(Experiment {
        id,
        name,
        description,
        data_entries: data_entry::query_entries_for(conn, id)?,
    })
}

pub fn create(store: &Store, name: &str, description: Option<&str>) -> Result<Experiment, DropletError> {
    validate_name(name)?;

    let id = pool::global_pool().with_write(&store.db_path(), |conn| {
        conn.execute(
            "INSERT INTO experiments(name, description) VALUES(?1, ?2)",
            params![name, description],
        )?;
        Ok(conn.last_insert_rowid())
    })?;

    tracing::info!(experiment_id = id, name = %name, "experiment created");
    Ok(Experiment {
        id,
        name: name.to_string(),
        description: description.map(|d| d.to_string()),
        data_entries: Vec::new(),
    })
}

pub fn get(store: &Store, id: i64) -> Result<Experiment, DropletError> {
    pool::global_pool().with_read(&store.db_path(), |conn| query_experiment(conn, id))
}

pub fn list(store: &Store) -> Result<Vec<Experiment>, DropletError> {
    pool::global_pool().with_read(&store.db_path(), |conn| {
        let ids: Vec<i64> = {
            let mut stmt = conn.prepare("SELECT id FROM experiments ORDER BY id ASC")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            out
        };

        let mut experiments = Vec::with_capacity(ids.len());
        for id in ids {
            experiments.push(query_experiment(conn, id)?);
        }
        Ok(experiments)
    })
}

/// Full replace of name and description.
pub fn update(
    store: &Store,
    id: i64,
    name: &str,
    description: Option<&str>,
) -> Result<Experiment, DropletError> {
    validate_name(name)?;

    let experiment = pool::global_pool().with_write(&store.db_path(), |conn| {
        let changed = conn.execute(
            "UPDATE experiments SET name = ?1, description = ?2 WHERE id = ?3",
            params![name, description, id],
        )?;
        if changed == 0 {
            return Err(DropletError::NotFound(format!("experiment {}", id)));
        }
        query_experiment(conn, id)
    })?;

    tracing::info!(experiment_id = id, "experiment updated");
    Ok(experiment)
}

/// Delete an experiment and every entry it owns.
///
/// Phase one deletes each child through the entry store (image first, then
/// row); phase two deletes the experiment row. Both phases run in one
/// transaction, so either every row goes or none does. Image removals are not
/// transactional and are not undone on rollback.
pub fn delete(store: &Store, id: i64) -> Result<usize, DropletError> {
    let removed = pool::global_pool().with_write(&store.db_path(), |conn| {
        let tx = conn.unchecked_transaction()?;
        query_header(&tx, id)?;

        let entries = data_entry::query_entries_for(&tx, id)?;
        for entry in &entries {
            data_entry::delete_with_conn(store, &tx, entry)?;
        }

        tx.execute("DELETE FROM experiments WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(entries.len())
    })?;

    tracing::info!(experiment_id = id, entries = removed, "experiment deleted");
    Ok(removed)
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "experiment",
        "version": "0.1.0",
        "description": "Named experiments owning ordered data entries",
        "commands": [
            { "name": "add", "parameters": ["name", "description"] },
            { "name": "list" },
            { "name": "get", "parameters": ["id"] },
            { "name": "update", "parameters": ["id", "name", "description"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["droplet.db"]
    })
}
