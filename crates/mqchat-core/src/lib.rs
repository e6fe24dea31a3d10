//! mqchat Core
//!
//! Foundational pieces of a two-party chat carried over named, bounded message
//! queues: participant identities, channel naming, the message codec, the queue
//! handle abstraction with its transports, and the durable event log.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod console;
pub mod errors;
pub mod event_log;
pub mod identity;
pub mod message;
pub mod naming;
pub mod queue;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::ChatConfig;
pub use console::{CapturedConsole, ConsoleOutput, StdoutConsole};
pub use errors::{ChatError, ChatResult, QueueError, QueueResult};
pub use event_log::{EventLogger, EventSink, FileEventLog, LogRecord, LogTag, MemoryEventLog};
pub use identity::{ChatMode, Identity, Participants, Role};
pub use message::{is_exit_sentinel, payload_text, ChatMessage, EXIT_SENTINEL};
pub use naming::ChannelNames;
pub use queue::{
    AccessMode, Disposition, MemoryBroker, MessageQueue, QueueAttributes, QueueProvider,
    QueueSpec,
};
#[cfg(target_os = "linux")]
pub use queue::PosixQueueProvider;
