use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state for {entity} {id}: {details}")]
    InvalidState {
        entity: &'static str,
        id: String,
        details: String,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReconciliationError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(entity: &'static str, id: impl ToString, details: impl Into<String>) -> Self {
        Self::InvalidState {
            entity,
            id: id.to_string(),
            details: details.into(),
        }
    }

    /// True for failures detected before any mutation was staged.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::InvalidState { .. } | Self::ValidationFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReconciliationError>;
