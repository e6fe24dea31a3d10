//! Error handling for the mqchat CLI

use mqchat_core::ChatError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Chat(#[from] ChatError),

    /// Bad identity or role on the command line
    #[error("{0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported on this platform: {0}")]
    Unsupported(String),
}

impl CliError {
    /// Whether the usage line should accompany the message
    pub fn is_usage(&self) -> bool {
        matches!(self, CliError::Usage(_))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
