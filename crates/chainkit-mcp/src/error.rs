//! Error types for the MCP client

use thiserror::Error;

/// Result type alias using McpError
pub type Result<T> = std::result::Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("server spawn failed: {0}")]
    SpawnFailed(String),

    #[error("transport not started")]
    NotStarted,

    #[error("transport closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("timeout waiting for server response")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Exit code for the CLI, aligned with `chainkit_core::error::exit_codes`
    pub fn exit_code(&self) -> i32 {
        use chainkit_core::error::exit_codes;
        match self {
            Self::SpawnFailed(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}
