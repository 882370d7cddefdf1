use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identifies one generation unit within a run (a decade label, a
/// magazine name, or the mode id for single-image modes).
pub type TaskKey = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// Run identity
// ---------------------------------------------------------------------------

/// Identity of one generation run.
///
/// A fresh token is minted every time the result store is reset. Writes
/// carry the token they were started under so results that arrive after
/// the run was discarded can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunToken(uuid::Uuid);

impl RunToken {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl Default for RunToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Image payloads
// ---------------------------------------------------------------------------

/// An encoded image held in memory.
///
/// The bytes are shared, so cloning an `ImageData` (for example when a
/// snapshot of the result store is handed to an observer) never copies
/// the pixel payload.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl ImageData {
    /// Wrap already-encoded bytes with a known MIME type.
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Wrap encoded bytes, detecting the MIME type from the file header.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CoreError> {
        let format = image::guess_format(&bytes)
            .map_err(|e| CoreError::Validation(format!("Unrecognised image data: {e}")))?;
        Ok(Self::new(format.to_mime_type(), bytes))
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, CoreError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| CoreError::Validation("Data URL must start with 'data:'".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| CoreError::Validation("Data URL is missing its payload".into()))?;
        let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
            CoreError::Validation("Only base64-encoded data URLs are supported".into())
        })?;
        if mime_type.is_empty() {
            return Err(CoreError::Validation(
                "Data URL is missing its MIME type".into(),
            ));
        }
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| CoreError::Validation(format!("Invalid base64 payload: {e}")))?;
        Ok(Self::new(mime_type, bytes))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_jpeg(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case("image/jpeg")
    }

    /// Base64 encoding of the payload (no data URL prefix).
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Generation task
// ---------------------------------------------------------------------------

/// One unit of work: transform `source` according to `prompt`.
///
/// Created once per key at run start and never mutated.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    pub key: TaskKey,
    pub source: ImageData,
    pub prompt: String,
}

impl GenerationTask {
    pub fn new(key: impl Into<TaskKey>, source: ImageData, prompt: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source,
            prompt: prompt.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
