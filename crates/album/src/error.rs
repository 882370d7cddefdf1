use atelier_core::error::CoreError;

/// Errors that abort an album composition. No partial page is ever
/// returned.
#[derive(Debug, thiserror::Error)]
pub enum AlbumError {
    /// One of the sources could not be fetched or decoded.
    #[error("Failed to load image {source_ref}: {reason}")]
    Load {
        /// Identifier of the failing source, truncated for display.
        source_ref: String,
        reason: String,
    },

    #[error("An album needs at least one image")]
    Empty,

    /// The layout could not be resolved (e.g. too many items for the page).
    #[error(transparent)]
    Layout(#[from] CoreError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AlbumError {
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}
