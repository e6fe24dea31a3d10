//! Queue handle abstraction
//!
//! A queue is a named, bounded FIFO of messages up to a fixed size, shared by
//! name between processes. The relay loops only see [`MessageQueue`] handles;
//! [`QueueProvider`] opens and destroys them by name.
//!
//! Two transports implement the contract:
//! - `PosixQueueProvider`: POSIX message queues (Linux)
//! - [`MemoryBroker`]: an in-process namespace, used by tests and embedders

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{QueueError, QueueResult};

pub mod memory;
#[cfg(target_os = "linux")]
pub mod posix;

pub use memory::{MemoryBroker, MemoryQueue};
#[cfg(target_os = "linux")]
pub use posix::{PosixQueue, PosixQueueProvider};

// ----------------------------------------------------------------------------
// Queue Description
// ----------------------------------------------------------------------------

/// Backlog depth and message size limit of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAttributes {
    /// Messages the queue holds before senders wait
    pub max_backlog: usize,
    /// Largest payload in bytes
    pub max_msg_size: usize,
}

impl QueueAttributes {
    pub const fn new(max_backlog: usize, max_msg_size: usize) -> Self {
        Self {
            max_backlog,
            max_msg_size,
        }
    }

    /// Reject payloads the queue could never carry
    pub fn check_payload(&self, payload: &[u8]) -> QueueResult<()> {
        if payload.len() > self.max_msg_size {
            return Err(QueueError::MessageTooLarge {
                size: payload.len(),
                max: self.max_msg_size,
            });
        }
        Ok(())
    }
}

impl fmt::Display for QueueAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} bytes", self.max_backlog, self.max_msg_size)
    }
}

/// Directions a handle may be used in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    SendOnly,
    ReceiveOnly,
    SendReceive,
}

impl AccessMode {
    pub fn can_send(self) -> bool {
        matches!(self, AccessMode::SendOnly | AccessMode::SendReceive)
    }

    pub fn can_receive(self) -> bool {
        matches!(self, AccessMode::ReceiveOnly | AccessMode::SendReceive)
    }
}

/// What `open` does when the name is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Create the queue, or attach if it already exists with the same attributes
    CreateOrAttach,
    /// Fail with `NotFound` unless someone else created it
    AttachExisting,
}

/// Everything needed to open one queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub access: AccessMode,
    pub disposition: Disposition,
    pub attributes: QueueAttributes,
}

impl QueueSpec {
    pub fn new(name: impl Into<String>, access: AccessMode, attributes: QueueAttributes) -> Self {
        Self {
            name: name.into(),
            access,
            disposition: Disposition::CreateOrAttach,
            attributes,
        }
    }

    pub fn attach_only(mut self) -> Self {
        self.disposition = Disposition::AttachExisting;
        self
    }
}

/// Queue names must look like `/name`, with no further slashes
pub fn validate_name(name: &str) -> QueueResult<()> {
    let reason = match name.strip_prefix('/') {
        None => "must start with '/'",
        Some("") => "must not be empty",
        Some(rest) if rest.contains('/') => "must not contain '/' after the first character",
        Some(_) => return Ok(()),
    };
    Err(QueueError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

// ----------------------------------------------------------------------------
// Queue Traits
// ----------------------------------------------------------------------------

/// One open end of a named queue
///
/// `send` and `receive` wait until they can complete. Both are cancel safe: a
/// dropped future has either fully enqueued/dequeued its message or done nothing.
#[async_trait]
pub trait MessageQueue: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn attributes(&self) -> QueueAttributes;

    fn access(&self) -> AccessMode;

    /// Whether opening this handle created the queue, rather than attaching
    fn created(&self) -> bool;

    /// Enqueue one message, waiting while the backlog is full
    async fn send(&self, payload: &[u8]) -> QueueResult<()>;

    /// Enqueue one message or fail with `Full`
    fn try_send(&self, payload: &[u8]) -> QueueResult<()>;

    /// Dequeue the oldest message, waiting while the queue is empty
    async fn receive(&self) -> QueueResult<Vec<u8>>;

    /// Release the handle. Closing twice is a no-op.
    fn close(&self) -> QueueResult<()>;

    fn is_closed(&self) -> bool;
}

/// Opens and destroys queues by name
pub trait QueueProvider: Send + Sync {
    fn open(&self, spec: &QueueSpec) -> QueueResult<Arc<dyn MessageQueue>>;

    /// Remove the name from the namespace. Open handles keep working.
    fn destroy(&self, name: &str) -> QueueResult<()>;

    fn exists(&self, name: &str) -> bool;
}
