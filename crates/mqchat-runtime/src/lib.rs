//! mqchat Runtime
//!
//! This crate drives one chat participant on top of `mqchat-core`:
//! - `ChatSession`: establishes the channels, supervises the relay loops and
//!   runs the shutdown sequence
//! - Relay loops for the console, the peer channel and the GUI channel
//! - `ChannelLease`: one-shot release of queue handles and owned names
//! - `GuiMonitor`: a headless client for a participant's GUI channels

mod context;
pub mod lease;
pub mod monitor;
pub mod session;
pub mod signals;
pub mod tasks;

pub use context::{ChannelSet, RelayContext};
pub use lease::{ChannelLease, PeerPresence};
pub use monitor::{GuiMonitor, MonitorStats};
pub use session::{
    ChatSession, SessionOutcome, SessionSettings, ShutdownReason, SESSION_ENDED_NOTICE,
};
pub use signals::TerminationSignal;
pub use tasks::{
    ConsoleSendTask, GuiRelayTask, LoopExit, PeerReceiveTask, RelayKind, PEER_EXITED_NOTICE,
};

// Re-export core types for convenience
pub use mqchat_core::{
    ChatConfig, ChatError, ChatMessage, ChatResult, Identity, Participants, QueueProvider, Role,
};
