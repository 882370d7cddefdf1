//! Image-load boundary: resolve a reference to decoded RGBA pixels.
//!
//! Sources may be in-memory payloads, `data:` URLs, filesystem paths, or
//! `http(s)` URLs. Decoding runs on the blocking pool.

use std::path::PathBuf;

use atelier_core::types::ImageData;
use futures::future::try_join_all;
use image::RgbaImage;

use crate::error::AlbumError;

/// Longest source identifier shown in an error message.
pub const MAX_SOURCE_REF_LEN: usize = 50;

/// Where an image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Memory(ImageData),
    DataUrl(String),
    Path(PathBuf),
    Url(String),
}

impl ImageSource {
    /// Classify a textual reference: `data:` URLs, `http(s)://` URLs, and
    /// anything else as a filesystem path.
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with("data:") {
            Self::DataUrl(reference.to_string())
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            Self::Url(reference.to_string())
        } else {
            Self::Path(PathBuf::from(reference))
        }
    }

    /// Identifier used in error messages (not truncated).
    pub fn describe(&self) -> String {
        match self {
            Self::Memory(data) => format!("<{} bytes of {}>", data.len(), data.mime_type()),
            Self::DataUrl(url) | Self::Url(url) => url.clone(),
            Self::Path(path) => path.display().to_string(),
        }
    }
}

impl From<ImageData> for ImageSource {
    fn from(data: ImageData) -> Self {
        Self::Memory(data)
    }
}

/// Shorten an identifier to [`MAX_SOURCE_REF_LEN`] characters, marking
/// the cut with `...`.
pub fn truncate_reference(reference: &str) -> String {
    match reference.char_indices().nth(MAX_SOURCE_REF_LEN) {
        Some((cut, _)) => format!("{}...", &reference[..cut]),
        None => reference.to_string(),
    }
}

fn load_error(source: &ImageSource, reason: impl ToString) -> AlbumError {
    AlbumError::Load {
        source_ref: truncate_reference(&source.describe()),
        reason: reason.to_string(),
    }
}

/// Fetches and decodes image sources.
#[derive(Clone, Default)]
pub struct ImageLoader {
    http: reqwest::Client,
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Load and decode one source.
    pub async fn load(&self, source: &ImageSource) -> Result<RgbaImage, AlbumError> {
        let data = self.fetch(source).await?;
        let decoded = tokio::task::spawn_blocking(move || {
            image::load_from_memory(data.bytes()).map(|img| img.to_rgba8())
        })
        .await?;
        let image = decoded.map_err(|e| load_error(source, e))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(load_error(source, "image has no pixels"));
        }
        Ok(image)
    }

    /// Load every source concurrently. The first failure fails the whole
    /// call; results keep the input order.
    pub async fn load_all(&self, sources: &[ImageSource]) -> Result<Vec<RgbaImage>, AlbumError> {
        try_join_all(sources.iter().map(|source| self.load(source))).await
    }

    async fn fetch(&self, source: &ImageSource) -> Result<ImageData, AlbumError> {
        match source {
            ImageSource::Memory(data) => Ok(data.clone()),
            ImageSource::DataUrl(url) => {
                ImageData::from_data_url(url).map_err(|e| load_error(source, e))
            }
            ImageSource::Path(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| load_error(source, e))?;
                Ok(ImageData::new("application/octet-stream", bytes))
            }
            ImageSource::Url(url) => {
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| load_error(source, e))?;
                let bytes = response.bytes().await.map_err(|e| load_error(source, e))?;
                Ok(ImageData::new("application/octet-stream", bytes.to_vec()))
            }
        }
    }
}
