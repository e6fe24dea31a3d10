//! Error types for mqchat
//!
//! Two layers: `QueueError` describes a failure of a single queue operation, and
//! `ChatError` is what session setup and the relay loops surface to callers.

use std::fmt;

use crate::queue::QueueAttributes;

// ----------------------------------------------------------------------------
// Queue Errors
// ----------------------------------------------------------------------------

/// Failure of a single queue operation
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue {name} does not exist")]
    NotFound { name: String },

    #[error("Queue {name} already exists")]
    AlreadyExists { name: String },

    #[error("Queue {name} exists with incompatible attributes: expected {expected}, found {found}")]
    Incompatible {
        name: String,
        expected: QueueAttributes,
        found: QueueAttributes,
    },

    #[error("Payload of {size} bytes exceeds the maximum message size of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Queue {name} is full")]
    Full { name: String },

    #[error("Queue {name} is closed")]
    Closed { name: String },

    #[error("Queue {name} was not opened for {operation}")]
    AccessDenied { name: String, operation: Operation },

    #[error("Invalid queue name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("I/O error on queue {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl QueueError {
    /// Whether the failure concerns this single call rather than the handle itself.
    ///
    /// Transient failures are logged by the relay loops, which then move on to
    /// their next iteration.
    pub fn is_transient(&self) -> bool {
        !matches!(self, QueueError::Closed { .. } | QueueError::AccessDenied { .. })
    }
}

/// Queue operation named in `AccessDenied`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Send,
    Receive,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Send => write!(f, "sending"),
            Operation::Receive => write!(f, "receiving"),
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

// ----------------------------------------------------------------------------
// Chat Errors
// ----------------------------------------------------------------------------

/// Session-level error type
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Failed to establish channel {name}: {source}")]
    ChannelSetup {
        name: String,
        #[source]
        source: QueueError,
    },

    #[error("Invalid identity {identity:?}: {reason}")]
    InvalidIdentity { identity: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event log error at {path}: {source}")]
    EventLog {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),
}

/// Result type for session operations
pub type ChatResult<T> = Result<T, ChatError>;
