use atelier_core::error::CoreError;

use crate::scheduler::DEFAULT_CONCURRENCY;

/// Orchestration settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    /// Maximum number of generation calls in flight during a run.
    pub concurrency: usize,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl StudioConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var               | Default |
    /// |-----------------------|---------|
    /// | `ATELIER_CONCURRENCY` | `2`     |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("ATELIER_CONCURRENCY") {
            config.concurrency = parse_concurrency(&raw)?;
        }
        Ok(config)
    }
}

/// Parse a concurrency limit: a whole number of at least 1.
pub fn parse_concurrency(raw: &str) -> Result<usize, CoreError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(CoreError::Validation(
            "Concurrency limit must be at least 1".into(),
        )),
        Ok(n) => Ok(n),
        Err(_) => Err(CoreError::Validation(format!(
            "Concurrency limit must be a whole number, got '{raw}'"
        ))),
    }
}
