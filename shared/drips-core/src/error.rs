//! Error types for Drips stream estimation

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DripsError>;

#[derive(Error, Debug)]
pub enum DripsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Decode error: {0}")]
    Decode(String),

    /// The event log or metadata is internally inconsistent.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DripsError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Integrity(_) => "INTEGRITY_VIOLATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Integrity violations must abort the whole computation for the asset config.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}
