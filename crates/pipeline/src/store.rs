//! The result store: one record per task key of the current run.
//!
//! [`ResultStore`] is the single source of truth for run progress. It is
//! written only by the scheduler and the regeneration controller; observers
//! read cloned [`StoreSnapshot`]s or subscribe to [`StoreEvent`]s.
//!
//! Every [`reset`](ResultStore::reset) mints a fresh [`RunToken`]. Terminal
//! writes carry the token they were started under and are dropped when the
//! store has since moved on to another run.

use std::collections::HashMap;

use atelier_core::error::CoreError;
use atelier_core::types::{ImageData, RunToken, TaskKey, Timestamp};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::events::{StoreEvent, EVENT_CHANNEL_CAPACITY};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Lifecycle state of one key. The payload exists exactly when the state
/// calls for it.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordState {
    Pending,
    Done { image: ImageData },
    Error { message: String },
}

/// Payload-free view of [`RecordState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Done,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub key: TaskKey,
    pub state: RecordState,
    pub updated_at: Timestamp,
}

impl ResultRecord {
    pub fn pending(key: impl Into<TaskKey>) -> Self {
        Self::with_state(key, RecordState::Pending)
    }

    pub fn done(key: impl Into<TaskKey>, image: ImageData) -> Self {
        Self::with_state(key, RecordState::Done { image })
    }

    pub fn error(key: impl Into<TaskKey>, message: impl Into<String>) -> Self {
        Self::with_state(
            key,
            RecordState::Error {
                message: message.into(),
            },
        )
    }

    fn with_state(key: impl Into<TaskKey>, state: RecordState) -> Self {
        Self {
            key: key.into(),
            state,
            updated_at: Utc::now(),
        }
    }

    pub fn status(&self) -> RecordStatus {
        match self.state {
            RecordState::Pending => RecordStatus::Pending,
            RecordState::Done { .. } => RecordStatus::Done,
            RecordState::Error { .. } => RecordStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, RecordState::Pending)
    }

    pub fn image(&self) -> Option<&ImageData> {
        match &self.state {
            RecordState::Done { image } => Some(image),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            RecordState::Error { message } => Some(message),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of the store, records in key declaration order.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub run: RunToken,
    pub records: Vec<ResultRecord>,
}

impl StoreSnapshot {
    pub fn get(&self, key: &str) -> Option<&ResultRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.key.as_str()).collect()
    }

    /// Number of records with the given status.
    pub fn count(&self, status: RecordStatus) -> usize {
        self.records.iter().filter(|r| r.status() == status).count()
    }

    /// True when the run has keys and none of them is pending.
    pub fn all_terminal(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(ResultRecord::is_terminal)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct StoreInner {
    run: RunToken,
    order: Vec<TaskKey>,
    records: HashMap<TaskKey, ResultRecord>,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            run: RunToken::new(),
            order: Vec::new(),
            records: HashMap::new(),
        }
    }
}

/// Shared, async-safe store of per-key results.
///
/// Share via `Arc<ResultStore>`.
pub struct ResultStore {
    inner: RwLock<StoreInner>,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    /// An empty store with no keys.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(StoreInner::new()),
            event_tx,
        }
    }

    /// Subscribe to store changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    fn publish(&self, event: StoreEvent) {
        // A send error only means nobody is listening.
        let _ = self.event_tx.send(event);
    }

    pub async fn current_run(&self) -> RunToken {
        self.inner.read().await.run
    }

    pub async fn get(&self, key: &str) -> Option<ResultRecord> {
        self.inner.read().await.records.get(key).cloned()
    }

    /// Ordered copy of every record.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read().await;
        StoreSnapshot {
            run: inner.run,
            records: inner
                .order
                .iter()
                .filter_map(|key| inner.records.get(key).cloned())
                .collect(),
        }
    }

    /// Write a record unconditionally. A key not in the current run is
    /// appended after the existing keys.
    pub async fn set(&self, record: ResultRecord) {
        let mut inner = self.inner.write().await;
        let key = record.key.clone();
        let status = record.status();
        if inner.records.insert(key.clone(), record).is_none() {
            inner.order.push(key.clone());
        }
        let run = inner.run;
        drop(inner);
        self.publish(StoreEvent::RecordUpdated { run, key, status });
    }

    /// Start a new run: replace every record with a `pending` one per key
    /// (in the given order) and mint a fresh token. Results from earlier
    /// runs are ignored from here on.
    pub async fn reset(&self, keys: &[TaskKey]) -> RunToken {
        let mut inner = self.inner.write().await;
        let run = RunToken::new();
        inner.run = run;
        inner.order = keys.to_vec();
        inner.records = keys
            .iter()
            .map(|key| (key.clone(), ResultRecord::pending(key.clone())))
            .collect();
        drop(inner);

        tracing::debug!(run = %run, keys = keys.len(), "Result store reset");
        self.publish(StoreEvent::RunReset {
            run,
            keys: keys.to_vec(),
        });
        run
    }

    /// Drop every record and start an empty run.
    pub async fn clear(&self) -> RunToken {
        self.reset(&[]).await
    }

    /// Apply the terminal outcome of a task started under `run`.
    ///
    /// The write is dropped (and `false` returned) when `run` is no longer
    /// the current run, the key is not part of it, or the key is not
    /// `pending`.
    pub async fn complete(
        &self,
        run: RunToken,
        key: &str,
        outcome: Result<ImageData, String>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        if inner.run != run {
            tracing::debug!(key = %key, run = %run, "Dropping result from a stale run");
            return false;
        }
        let Some(record) = inner.records.get_mut(key) else {
            tracing::debug!(key = %key, run = %run, "Dropping result for an unknown key");
            return false;
        };
        if record.is_terminal() {
            tracing::debug!(key = %key, run = %run, "Dropping result for a settled key");
            return false;
        }

        *record = match outcome {
            Ok(image) => ResultRecord::done(key, image),
            Err(message) => ResultRecord::error(key, message),
        };
        let status = record.status();
        drop(inner);

        self.publish(StoreEvent::RecordUpdated {
            run,
            key: key.to_string(),
            status,
        });
        true
    }

    /// Move a settled key back to `pending` for a regeneration.
    ///
    /// The check and the transition happen under one write lock, so two
    /// concurrent calls for the same key cannot both succeed. Returns the
    /// run the regeneration belongs to.
    pub async fn begin_regeneration(&self, key: &str) -> Result<RunToken, CoreError> {
        let mut inner = self.inner.write().await;
        let run = inner.run;
        let record = inner.records.get_mut(key).ok_or_else(|| {
            CoreError::Precondition(format!("'{key}' is not part of the current run"))
        })?;
        if !record.is_terminal() {
            return Err(CoreError::Precondition(format!(
                "'{key}' is still being generated"
            )));
        }
        *record = ResultRecord::pending(key);
        drop(inner);

        self.publish(StoreEvent::RecordUpdated {
            run,
            key: key.to_string(),
            status: RecordStatus::Pending,
        });
        Ok(run)
    }

    /// True when `keys` is non-empty and every one of them is `done`.
    pub async fn is_complete(&self, keys: &[TaskKey]) -> bool {
        let inner = self.inner.read().await;
        !keys.is_empty()
            && keys.iter().all(|key| {
                inner
                    .records
                    .get(key)
                    .is_some_and(|r| r.status() == RecordStatus::Done)
            })
    }

    /// The image of every key in `keys`, in that order. Fails naming the
    /// first key that is missing or not `done`.
    pub async fn completed_images(
        &self,
        keys: &[TaskKey],
    ) -> Result<Vec<(TaskKey, ImageData)>, CoreError> {
        if keys.is_empty() {
            return Err(CoreError::Precondition("no keys were requested".into()));
        }
        let inner = self.inner.read().await;
        keys.iter()
            .map(|key| {
                let record = inner.records.get(key).ok_or_else(|| {
                    CoreError::Precondition(format!("'{key}' has not been generated"))
                })?;
                record
                    .image()
                    .map(|image| (key.clone(), image.clone()))
                    .ok_or_else(|| {
                        CoreError::Precondition(format!("'{key}' is {}", record.status()))
                    })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
