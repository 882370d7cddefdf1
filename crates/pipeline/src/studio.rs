//! Studio session: one selected mode, one source photo, one result store.
//!
//! The session walks through four phases:
//!
//! ```text
//! Selection --select_mode--> Uploader --generate--> Generating --> Results
//!     ^                          ^                                   |
//!     +-------- start_over ------+----------- change_source ---------+
//! ```
//!
//! Changing the photo or starting over resets the store, so results from
//! a run that is still in flight are discarded when they arrive.

use std::sync::Arc;

use atelier_album::compositor::AlbumItem;
use atelier_album::encode::to_jpeg;
use atelier_album::{AlbumCompositor, AlbumError};
use atelier_core::album::JPEG_QUALITY;
use atelier_core::error::CoreError;
use atelier_core::mode::{validate_mode, Mode};
use atelier_core::naming::individual_filename;
use atelier_core::types::{ImageData, TaskKey};
use atelier_generation::GenerationClient;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::StudioConfig;
use crate::regenerate::RegenerationController;
use crate::scheduler::{RunSummary, TaskScheduler};
use crate::store::{RecordStatus, ResultStore, StoreSnapshot};

/// Where the session is in its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No mode chosen yet.
    Selection,
    /// Mode chosen; waiting for (or holding) a photo.
    Uploader,
    Generating,
    Results,
}

/// A file ready to be saved.
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub image: ImageData,
}

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Album(#[from] AlbumError),
}

struct SessionState {
    phase: Phase,
    mode: Option<Mode>,
    source: Option<ImageData>,
}

/// Orchestrator facade for one user session.
pub struct Studio {
    client: Arc<dyn GenerationClient>,
    store: Arc<ResultStore>,
    config: StudioConfig,
    state: RwLock<SessionState>,
}

impl Studio {
    pub fn new(client: Arc<dyn GenerationClient>, config: StudioConfig) -> Self {
        Self {
            client,
            store: Arc::new(ResultStore::new()),
            config,
            state: RwLock::new(SessionState {
                phase: Phase::Selection,
                mode: None,
                source: None,
            }),
        }
    }

    /// The store observers read from.
    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub async fn phase(&self) -> Phase {
        self.state.read().await.phase
    }

    pub async fn mode(&self) -> Option<Mode> {
        self.state.read().await.mode.clone()
    }

    pub async fn source(&self) -> Option<ImageData> {
        self.state.read().await.source.clone()
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Choose the creative mode. Clears results from any previous mode.
    pub async fn select_mode(&self, mode: Mode) -> Result<(), CoreError> {
        validate_mode(&mode)?;
        let mut state = self.state.write().await;
        tracing::info!(mode = %mode.id, "Mode selected");
        state.mode = Some(mode);
        state.phase = Phase::Uploader;
        self.store.clear().await;
        Ok(())
    }

    /// Supply the photo to transform. Clears previous results.
    pub async fn set_source(&self, source: ImageData) -> Result<(), CoreError> {
        if source.is_empty() {
            return Err(CoreError::Validation("Source photo is empty".into()));
        }
        let mut state = self.state.write().await;
        if state.mode.is_none() {
            return Err(CoreError::Precondition(
                "select a mode before supplying a photo".into(),
            ));
        }
        tracing::info!(bytes = source.len(), mime_type = source.mime_type(), "Source photo set");
        state.source = Some(source);
        state.phase = Phase::Uploader;
        self.store.clear().await;
        Ok(())
    }

    /// Drop the photo and its results, keeping the mode.
    pub async fn change_source(&self) {
        let mut state = self.state.write().await;
        state.source = None;
        state.phase = if state.mode.is_some() {
            Phase::Uploader
        } else {
            Phase::Selection
        };
        self.store.clear().await;
    }

    /// Drop mode, photo, and results.
    pub async fn start_over(&self) {
        let mut state = self.state.write().await;
        state.mode = None;
        state.source = None;
        state.phase = Phase::Selection;
        self.store.clear().await;
        tracing::info!("Session reset");
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Generate every key of the selected mode and wait for all of them.
    pub async fn generate(&self) -> Result<RunSummary, CoreError> {
        let (mode, source) = {
            let mut state = self.state.write().await;
            if state.phase == Phase::Generating {
                return Err(CoreError::Precondition(
                    "a generation run is already in progress".into(),
                ));
            }
            let (mode, source) = require_inputs(&state)?;
            state.phase = Phase::Generating;
            (mode, source)
        };

        let scheduler = match TaskScheduler::new(
            Arc::clone(&self.client),
            Arc::clone(&self.store),
            self.config.concurrency,
        ) {
            Ok(scheduler) => scheduler,
            Err(e) => {
                self.state.write().await.phase = Phase::Uploader;
                return Err(e);
            }
        };
        let result = scheduler.run(mode.tasks(&source)).await;

        // A run superseded by change_source/start_over leaves the phase to
        // whoever superseded it.
        let mut state = self.state.write().await;
        match &result {
            Ok(summary) if self.store.current_run().await == summary.run => {
                state.phase = Phase::Results;
            }
            Ok(_) => {}
            Err(_) => state.phase = Phase::Uploader,
        }
        result
    }

    /// Regenerate one key of the selected mode.
    pub async fn regenerate(&self, key: &str) -> Result<RecordStatus, CoreError> {
        let (mode, source) = {
            let state = self.state.read().await;
            require_inputs(&state)?
        };
        let task = mode.task_for(key, &source)?;
        RegenerationController::new(Arc::clone(&self.client), Arc::clone(&self.store))
            .regenerate(&task)
            .await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Keys the selected mode produces, in declaration order.
    pub async fn expected_keys(&self) -> Vec<TaskKey> {
        self.state
            .read()
            .await
            .mode
            .as_ref()
            .map(Mode::keys)
            .unwrap_or_default()
    }

    /// True when every key of the selected mode is `done`.
    pub async fn is_complete(&self) -> bool {
        let keys = self.expected_keys().await;
        self.store.is_complete(&keys).await
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot().await
    }

    // -----------------------------------------------------------------------
    // Downloads
    // -----------------------------------------------------------------------

    /// The finished image for `key` as a JPEG named
    /// `creative-output-<key>.jpg`.
    pub async fn download_image(&self, key: &str) -> Result<Download, StudioError> {
        let record = self
            .store
            .get(key)
            .await
            .ok_or_else(|| CoreError::not_found("Task key", key))?;
        let image = record.image().ok_or_else(|| {
            CoreError::Precondition(format!("'{key}' is {}", record.status()))
        })?;
        Ok(Download {
            filename: individual_filename(key),
            image: to_jpeg(image, JPEG_QUALITY)?,
        })
    }

    /// Compose every key of the selected multi-image mode into one page.
    ///
    /// Requires each declared key to be `done`.
    pub async fn download_album(
        &self,
        compositor: &AlbumCompositor,
    ) -> Result<Download, StudioError> {
        let mode = self
            .mode()
            .await
            .ok_or_else(|| CoreError::Precondition("no mode is selected".into()))?;
        if !mode.is_multi() {
            return Err(CoreError::Precondition(format!(
                "mode '{}' produces a single image and has no album",
                mode.id
            ))
            .into());
        }

        let images = self.store.completed_images(&mode.keys()).await?;
        let items: Vec<AlbumItem> = images
            .into_iter()
            .map(|(key, image)| AlbumItem::new(key, image))
            .collect();
        let (title, subtitle) = mode.album_titles();
        let image = compositor.compose(&items, &title, &subtitle).await?;

        Ok(Download {
            filename: mode.album_filename(),
            image,
        })
    }
}

fn require_inputs(state: &SessionState) -> Result<(Mode, ImageData), CoreError> {
    let mode = state
        .mode
        .clone()
        .ok_or_else(|| CoreError::Precondition("no mode is selected".into()))?;
    let source = state
        .source
        .clone()
        .ok_or_else(|| CoreError::Precondition("no source photo has been supplied".into()))?;
    Ok((mode, source))
}
