//! Re-run one key outside the bulk run.

use std::sync::Arc;

use atelier_core::error::CoreError;
use atelier_core::types::GenerationTask;
use atelier_generation::GenerationClient;

use crate::scheduler::execute;
use crate::store::{RecordStatus, ResultStore};

/// Regenerates single keys of the current run.
///
/// Independent of the scheduler's worker pool; each call touches only its
/// own key.
pub struct RegenerationController {
    client: Arc<dyn GenerationClient>,
    store: Arc<ResultStore>,
}

impl RegenerationController {
    pub fn new(client: Arc<dyn GenerationClient>, store: Arc<ResultStore>) -> Self {
        Self { client, store }
    }

    /// Regenerate `task.key` and return its final status.
    ///
    /// Fails with [`CoreError::Precondition`] (without calling the client)
    /// when the key is not in the current run or is already `pending`, and
    /// after the call when the run was reset while it was in flight (the
    /// result is discarded).
    pub async fn regenerate(&self, task: &GenerationTask) -> Result<RecordStatus, CoreError> {
        let run = self.store.begin_regeneration(&task.key).await?;
        tracing::info!(key = %task.key, run = %run, "Regenerating");

        let outcome = execute(&self.client, task).await;
        let status = match &outcome {
            Ok(_) => RecordStatus::Done,
            Err(message) => {
                tracing::warn!(key = %task.key, error = %message, "Regeneration failed");
                RecordStatus::Error
            }
        };
        if !self.store.complete(run, &task.key, outcome).await {
            tracing::debug!(key = %task.key, "Regeneration result discarded");
            return Err(CoreError::Precondition(format!(
                "the run was discarded while '{}' was regenerating",
                task.key
            )));
        }
        Ok(status)
    }
}
