//! The generation client trait and its error type.

use async_trait::async_trait;
use atelier_core::types::ImageData;

/// Message recorded when a failure carries no description of its own.
pub const UNKNOWN_FAILURE_MESSAGE: &str = "An unknown error occurred.";

/// Transforms a source photo according to a text prompt.
///
/// Implementations are slow and fallible; callers must not assume any
/// particular latency or determinism. The same input may yield a
/// different image on every call.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, source: &ImageData, prompt: &str) -> Result<ImageData, GenerationError>;
}

/// Errors from a generation call.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The service answered successfully but returned no image, usually
    /// because the model replied with text (e.g. a refusal).
    #[error("No image was returned: {0}")]
    NoImage(String),

    /// The response body could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other failure, carrying whatever description is available.
    #[error("{0}")]
    Other(String),
}

impl GenerationError {
    /// Human-readable message for the result store: the cause's own
    /// description when it has one, otherwise a generic fallback.
    pub fn describe(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            UNKNOWN_FAILURE_MESSAGE.to_string()
        } else {
            message
        }
    }
}
