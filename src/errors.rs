use thiserror::Error;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents a request body or parameter that failed validation.
    #[error("Invalid payload: {detail}")]
    InvalidPayload { detail: String },

    /// Represents a user email that is not a valid address.
    #[error("Invalid user email: {0}")]
    InvalidEmail(String),

    /// Represents an update or deletion of a recipe that doesn't exist.
    #[error("Recipe {id} does not exist")]
    RecipeNotFound { id: String },

    /// Represents an item in the table that doesn't have the expected shape.
    #[error("Stored item is malformed: attribute {attribute} is missing or not a string")]
    MalformedItem { attribute: String },

    /// Represents an error returned by the table.
    #[error("Store operation {operation} failed: {message}")]
    Store {
        operation: &'static str,
        message: String,
    },
}

impl BackendError {
    pub fn invalid_payload(detail: impl Into<String>) -> Self {
        BackendError::InvalidPayload {
            detail: detail.into(),
        }
    }

    pub fn store(operation: &'static str, error: impl std::fmt::Display) -> Self {
        BackendError::Store {
            operation,
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::invalid_payload(e.to_string())
    }
}
