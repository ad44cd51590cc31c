//! Active experiment selection.
//!
//! Models one physical instrument driven by one operator session: a single
//! slot saying which experiment new captures are appended to. The slot is an
//! explicit object owned by the session (not a global), and its mutex is the
//! same lock that serializes captures, so a selection never changes while a
//! capture is in flight.

use crate::core::error::DropletError;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "experiment_id", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Unset,
    Selected(i64),
}

#[derive(Debug, Default)]
pub struct ActiveExperiment {
    slot: Mutex<Selection>,
}

impl ActiveExperiment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot. The id is not checked against the store; a stale
    /// id surfaces as `NotFound` on the next capture.
    pub fn select(&self, experiment_id: i64) -> Result<Selection, DropletError> {
        let mut slot = self.hold()?;
        let previous = *slot;
        *slot = Selection::Selected(experiment_id);
        tracing::info!(experiment_id, ?previous, "active experiment selected");
        Ok(*slot)
    }

    pub fn current(&self) -> Result<Selection, DropletError> {
        Ok(*self.hold()?)
    }

    /// Lock the slot for the duration of a multi-step operation.
    ///
    /// A poisoned lock means a capture panicked mid-sequence; it is reported as
    /// an internal error, never as "no active experiment".
    pub(crate) fn hold(&self) -> Result<MutexGuard<'_, Selection>, DropletError> {
        self.slot.lock().map_err(|_| {
            DropletError::InternalError("active experiment lock poisoned".to_string())
        })
    }
}
