//! REST client for a Gemini-style `generateContent` image endpoint.
//!
//! Sends the source photo as inline base64 data together with the prompt
//! and returns the first inline image of the first candidate using
//! [`reqwest`].

use async_trait::async_trait;
use atelier_core::types::ImageData;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

use crate::client::{GenerationClient, GenerationError};
use crate::config::GeminiConfig;

/// HTTP client for the image generation endpoint.
pub struct GeminiApi {
    client: reqwest::Client,
    config: GeminiConfig,
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, alias = "prompt_feedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default, alias = "finish_reason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default, alias = "block_reason")]
    block_reason: Option<String>,
}

impl GeminiApi {
    /// Create a client with its own connection pool and the configured
    /// request timeout.
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, turning anything
    /// else into [`GenerationError::Api`] with the body text attached.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Request body: the photo first, then the instruction.
fn request_body(source: &ImageData, prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "parts": [
                {
                    "inlineData": {
                        "mimeType": source.mime_type(),
                        "data": source.to_base64(),
                    }
                },
                { "text": prompt },
            ]
        }]
    })
}

/// Pick the first inline image out of a response.
///
/// When no image is present, the model's text (if any), the block reason,
/// or the finish reason is surfaced so the failure message explains what
/// happened.
fn extract_image(response: GenerateResponse) -> Result<ImageData, GenerationError> {
    let mut texts = Vec::new();
    let mut finish_reason = None;

    for candidate in response.candidates {
        if finish_reason.is_none() {
            finish_reason = candidate.finish_reason;
        }
        let Some(content) = candidate.content else {
            continue;
        };
        for part in content.parts {
            if let Some(inline) = part.inline_data {
                let bytes = STANDARD.decode(inline.data.trim()).map_err(|e| {
                    GenerationError::InvalidResponse(format!("inline image is not base64: {e}"))
                })?;
                if bytes.is_empty() {
                    return Err(GenerationError::InvalidResponse(
                        "inline image is empty".into(),
                    ));
                }
                return Ok(ImageData::new(inline.mime_type, bytes));
            }
            if let Some(text) = part.text.filter(|t| !t.trim().is_empty()) {
                texts.push(text);
            }
        }
    }

    if !texts.is_empty() {
        return Err(GenerationError::NoImage(texts.join(" ")));
    }
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::NoImage(format!("prompt blocked ({reason})")));
    }
    match finish_reason {
        Some(reason) => Err(GenerationError::NoImage(format!(
            "generation finished with reason {reason}"
        ))),
        None => Err(GenerationError::NoImage("the response had no candidates".into())),
    }
}

#[async_trait]
impl GenerationClient for GeminiApi {
    async fn generate(&self, source: &ImageData, prompt: &str) -> Result<ImageData, GenerationError> {
        tracing::debug!(
            model = %self.config.model,
            source_bytes = source.len(),
            "Submitting generation request",
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body(source, prompt))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let image = extract_image(parsed)?;
        tracing::debug!(
            mime_type = image.mime_type(),
            bytes = image.len(),
            "Generation response received",
        );
        Ok(image)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
