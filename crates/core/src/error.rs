#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The caller asked for an operation whose precondition does not hold
    /// (e.g. regenerating a key that is already in flight). Non-fatal; the
    /// caller may retry once the state changes.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}
