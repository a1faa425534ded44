use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{}", .0.join(" "))]
    ValidationFailed(Vec<String>),

    #[error("Classification unavailable: {0}")]
    ClassificationUnavailable(String),

    #[error("Failed to store entry: {0}")]
    StoreWriteFailed(String),

    #[error("Failed to read entries: {0}")]
    StoreReadFailed(String),

    #[error("Invalid username or password")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl JournalError {
    pub fn kind(&self) -> &'static str {
        match self {
            JournalError::InvalidInput(_) => "invalid_input",
            JournalError::ValidationFailed(_) => "validation_failed",
            JournalError::ClassificationUnavailable(_) => "classification_unavailable",
            JournalError::StoreWriteFailed(_) => "store_write_failed",
            JournalError::StoreReadFailed(_) => "store_read_failed",
            JournalError::Unauthenticated => "unauthenticated",
            JournalError::Forbidden(_) => "forbidden",
        }
    }
}

pub type Result<T, E = JournalError> = std::result::Result<T, E>;
