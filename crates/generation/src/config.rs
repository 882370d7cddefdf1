use std::time::Duration;

use atelier_core::error::CoreError;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection settings for the Gemini image endpoint.
#[derive(Clone)]
pub struct GeminiConfig {
    /// Base HTTP URL, without a trailing slash.
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var               | Default                                    |
    /// |-----------------------|--------------------------------------------|
    /// | `GEMINI_API_KEY`      | required                                   |
    /// | `GEMINI_API_URL`      | `https://generativelanguage.googleapis.com`|
    /// | `GEMINI_MODEL`        | `gemini-2.5-flash-image-preview`           |
    /// | `GEMINI_TIMEOUT_SECS` | `120`                                      |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CoreError::Validation("GEMINI_API_KEY environment variable is required".into())
            })?;

        let mut config = Self::new(api_key);
        if let Some(url) = lookup("GEMINI_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            config.model = model;
        }
        if let Some(raw) = lookup("GEMINI_TIMEOUT_SECS") {
            config.timeout = parse_timeout(&raw)?;
        }
        Ok(config)
    }

    /// Full `generateContent` endpoint for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url, self.model
        )
    }
}

/// Parse a request timeout: a whole number of seconds, at least 1.
fn parse_timeout(raw: &str) -> Result<Duration, CoreError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(CoreError::Validation(
            "GEMINI_TIMEOUT_SECS must be at least 1".into(),
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(CoreError::Validation(format!(
            "GEMINI_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_set() {
        let config = GeminiConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn missing_key_rejected() {
        assert_matches!(
            GeminiConfig::from_lookup(lookup_from(&[])),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            GeminiConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", " ")])),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn overrides_are_applied() {
        let config = GeminiConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_API_URL", "http://localhost:9000/"),
            ("GEMINI_MODEL", "m"),
            ("GEMINI_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(
            config.endpoint(),
            "http://localhost:9000/v1beta/models/m:generateContent"
        );
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_timeout_rejected() {
        assert_matches!(
            GeminiConfig::from_lookup(lookup_from(&[
                ("GEMINI_API_KEY", "k"),
                ("GEMINI_TIMEOUT_SECS", "soon"),
            ])),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        assert_matches!(
            GeminiConfig::from_lookup(lookup_from(&[
                ("GEMINI_API_KEY", "k"),
                ("GEMINI_TIMEOUT_SECS", "0"),
            ])),
            Err(CoreError::Validation(msg)) if msg.contains("at least 1")
        );
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", GeminiConfig::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
    }
}
