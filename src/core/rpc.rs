//! JSON-lines request/response interface.
//!
//! One request per input line, one response per output line. Requests are
//! decoded into the typed [`Operation`] enum before anything touches the
//! store, so malformed payloads never reach the core.
//!
//! ```text
//! {"id":"1","op":"create_experiment","name":"Trial A","description":"desc"}
//! {"id":"1","success":true,"result":{"id":1,"name":"Trial A",...}}
//! ```

use crate::core::error::DropletError;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::capture::CaptureOrchestrator;
use crate::plugins::selector::ActiveExperiment;
use crate::plugins::{data_entry, experiment, export};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcRequest {
    /// Request ID for correlation
    #[serde(default = "time::new_request_id")]
    pub id: String,
    #[serde(flatten)]
    pub operation: Operation,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateExperiment {
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
    ListExperiments,
    GetExperiment {
        experiment_id: i64,
    },
    UpdateExperiment {
        experiment_id: i64,
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
    DeleteExperiment {
        experiment_id: i64,
    },
    SelectExperiment {
        experiment_id: i64,
    },
    ActiveExperiment,
    Capture,
    CreateEntry {
        experiment_id: i64,
        temperature: f64,
        humidity: f64,
        image_filename: String,
    },
    ListEntries {
        experiment_id: i64,
    },
    GetEntry {
        entry_id: i64,
    },
    UpdateEntry {
        experiment_id: i64,
        entry_id: i64,
        temperature: f64,
        humidity: f64,
        image_filename: String,
    },
    DeleteEntry {
        entry_id: i64,
    },
    ExportExperiment {
        experiment_id: i64,
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcResponse {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcError {
    pub kind: String,
    pub message: String,
}

impl RpcResponse {
    pub fn ok(id: String, result: Value) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: String, error: &DropletError) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(RpcError {
                kind: error.kind().as_str().to_string(),
                message: error.to_string(),
            }),
        }
    }
}

/// Everything one operator session needs: the store, the active experiment
/// slot and the capture pipeline. Selection lives as long as the session.
pub struct Session {
    store: Store,
    active: ActiveExperiment,
    capture: CaptureOrchestrator,
}

impl Session {
    pub fn new(store: Store, capture: CaptureOrchestrator) -> Self {
        Self {
            store,
            active: ActiveExperiment::new(),
            capture,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn active(&self) -> &ActiveExperiment {
        &self.active
    }

    pub fn capture(&self) -> Result<data_entry::DataEntry, DropletError> {
        self.capture.capture(&self.store, &self.active)
    }

    pub fn handle(&self, request: RpcRequest) -> RpcResponse {
        tracing::debug!(id = %request.id, op = ?request.operation, "rpc request");
        match self.dispatch(request.operation) {
            Ok(result) => RpcResponse::ok(request.id, result),
            Err(e) => {
                tracing::debug!(id = %request.id, kind = %e.kind(), "rpc request failed");
                RpcResponse::err(request.id, &e)
            }
        }
    }

    /// Decode and handle one raw line.
    pub fn handle_line(&self, line: &str) -> RpcResponse {
        match serde_json::from_str::<RpcRequest>(line.trim()) {
            Ok(request) => self.handle(request),
            Err(e) => {
                let id = serde_json::from_str::<Value>(line.trim())
                    .ok()
                    .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(time::new_request_id);
                RpcResponse::err(
                    id,
                    &DropletError::ValidationError(format!("invalid request: {}", e)),
                )
            }
        }
    }

    fn dispatch(&self, operation: Operation) -> Result<Value, DropletError> {
        let store = &self.store;
        let value = match operation {
            Operation::CreateExperiment { name, description } => {
                serde_json::to_value(experiment::create(store, &name, description.as_deref())?)?
            }
            Operation::ListExperiments => serde_json::to_value(experiment::list(store)?)?,
            Operation::GetExperiment { experiment_id } => {
                serde_json::to_value(experiment::get(store, experiment_id)?)?
            }
            Operation::UpdateExperiment {
                experiment_id,
                name,
                description,
            } => serde_json::to_value(experiment::update(
                store,
                experiment_id,
                &name,
                description.as_deref(),
            )?)?,
            Operation::DeleteExperiment { experiment_id } => {
                let removed = experiment::delete(store, experiment_id)?;
                serde_json::json!({ "experiment_id": experiment_id, "entries_removed": removed })
            }
            Operation::SelectExperiment { experiment_id } => {
                serde_json::to_value(self.active.select(experiment_id)?)?
            }
            Operation::ActiveExperiment => serde_json::to_value(self.active.current()?)?,
            Operation::Capture => serde_json::to_value(self.capture()?)?,
            Operation::CreateEntry {
                experiment_id,
                temperature,
                humidity,
                image_filename,
            } => serde_json::to_value(data_entry::create(
                store,
                temperature,
                humidity,
                &image_filename,
                experiment_id,
            )?)?,
            Operation::ListEntries { experiment_id } => {
                serde_json::to_value(data_entry::list_by_experiment(store, experiment_id)?)?
            }
            Operation::GetEntry { entry_id } => serde_json::to_value(data_entry::get(store, entry_id)?)?,
            Operation::UpdateEntry {
                experiment_id,
                entry_id,
                temperature,
                humidity,
                image_filename,
            } => serde_json::to_value(data_entry::update(
                store,
                experiment_id,
                entry_id,
                temperature,
                humidity,
                &image_filename,
            )?)?,
            Operation::DeleteEntry { entry_id } => {
                data_entry::delete(store, entry_id)?;
                serde_json::json!({ "entry_id": entry_id, "deleted": true })
            }
            Operation::ExportExperiment { experiment_id, out } => {
                let bundle = export::export_to_file(store, experiment_id, &out)?;
                serde_json::json!({
                    "file_name": bundle.file_name,
                    "path": out.to_string_lossy(),
                    "size": bundle.bytes.len(),
                    "entry_count": bundle.entry_count,
                    "missing_images": bundle.missing_images,
                })
            }
        };
        Ok(value)
    }
}

/// Serve requests from `input` until EOF. Blank lines are skipped.
pub fn serve<R: BufRead, W: Write>(session: &Session, input: R, mut output: W) -> Result<(), DropletError> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = session.handle_line(&line);
        writeln!(output, "{}", serde_json::to_string(&response)?)?;
        output.flush()?;
    }
    Ok(())
}
