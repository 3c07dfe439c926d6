//! Error types for chainkit

use thiserror::Error;

/// Result type alias using ChainkitError
pub type Result<T> = std::result::Result<T, ChainkitError>;

/// Error type alias for convenience
pub type Error = ChainkitError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for chainkit
#[derive(Debug, Error)]
pub enum ChainkitError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Type mismatch: actual value of metadata key \"{key}\" ({actual}) has type {actual_type}, while comparison value ({expected}) has type {expected_type}")]
    TypeMismatch {
        key: String,
        actual: String,
        actual_type: &'static str,
        expected: String,
        expected_type: &'static str,
    },

    #[error("Filter parse error at {position}: {message}")]
    FilterParse { position: usize, message: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Unknown model name: {0}")]
    UnknownModel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External service error: {0}")]
    ExternalError(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ChainkitError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownModel(_) => exit_codes::NOT_FOUND,
            Self::InvalidInput(_)
            | Self::Config(_)
            | Self::FilterParse { .. }
            | Self::TypeMismatch { .. }
            | Self::InvalidHeader(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            ChainkitError::UnknownModel("mistral-huge".to_string()).exit_code(),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            ChainkitError::FilterParse {
                position: 3,
                message: "unexpected token".to_string()
            }
            .exit_code(),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            ChainkitError::Llm("boom".to_string()).exit_code(),
            exit_codes::GENERAL_ERROR
        );
    }
}
