//! Change notifications published by the result store.

use atelier_core::types::{RunToken, TaskKey};
use serde::Serialize;

use crate::store::RecordStatus;

/// Broadcast channel capacity for store events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A state change in the result store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The store was reset for a new run; every key starts `pending`.
    RunReset { run: RunToken, keys: Vec<TaskKey> },

    /// One record changed status.
    RecordUpdated {
        run: RunToken,
        key: TaskKey,
        status: RecordStatus,
    },
}

impl StoreEvent {
    pub fn run(&self) -> RunToken {
        match self {
            Self::RunReset { run, .. } | Self::RecordUpdated { run, .. } => *run,
        }
    }
}
