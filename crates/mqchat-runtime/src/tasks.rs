//! Relay loops
//!
//! Three independent loops, one per blocking source:
//!
//! - `ConsoleSendTask`: console lines to the peer (and the GUI mirror)
//! - `PeerReceiveTask`: peer messages to the console (and the GUI mirror)
//! - `GuiRelayTask`: GUI messages to the peer (and back to the GUI mirror)
//!
//! Each loop waits on exactly one source and observes the session's
//! cancellation token at every wait.

use std::fmt;
use std::io;
use std::sync::Arc;

use mqchat_core::{
    is_exit_sentinel, payload_text, ChatMessage, LogTag, QueueError, EXIT_SENTINEL,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info, warn};

use crate::context::{Delivery, RelayContext};

/// Notice printed when the peer sends the exit sentinel
pub const PEER_EXITED_NOTICE: &str = "Peer exited the chat.";

/// Why a relay loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Console EOF or an explicit `exit` line
    LocalExit,
    /// The peer sent the exit sentinel
    PeerExit,
    /// The session stopped or the loop's channel went away
    Cancelled,
}

/// Identifies a relay loop in logs and join results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayKind {
    ConsoleSend,
    PeerReceive,
    GuiRelay,
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayKind::ConsoleSend => write!(f, "console-send"),
            RelayKind::PeerReceive => write!(f, "peer-receive"),
            RelayKind::GuiRelay => write!(f, "gui-relay"),
        }
    }
}

// ----------------------------------------------------------------------------
// Console Send
// ----------------------------------------------------------------------------

/// Reads console lines and sends them to the peer
pub struct ConsoleSendTask<R> {
    ctx: Arc<RelayContext>,
    lines: Lines<R>,
}

impl<R> ConsoleSendTask<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(ctx: Arc<RelayContext>, input: R) -> Self {
        Self {
            ctx,
            lines: input.lines(),
        }
    }

    pub async fn run(mut self) -> LoopExit {
        info!("Console send loop starting");

        let exit = loop {
            let line = tokio::select! {
                _ = self.ctx.shutdown.cancelled() => break LoopExit::Cancelled,
                line = self.lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("Console input closed");
                    break LoopExit::LocalExit;
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!("Skipping unreadable console line: {}", e);
                    continue;
                }
                Err(e) => {
                    warn!("Console read failed: {}", e);
                    break LoopExit::LocalExit;
                }
            };

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if text == EXIT_SENTINEL {
                info!("Exit requested from console");
                break LoopExit::LocalExit;
            }

            let message = ChatMessage::from_identity(self.ctx.participants.local(), text);
            match self.ctx.send_to_peer(&message).await {
                Delivery::Sent => {
                    self.ctx
                        .events
                        .record(LogTag::ConsoleSend, &message.to_string());
                    self.ctx.mirror_to_gui(&message);
                }
                Delivery::Rejected(QueueError::MessageTooLarge { max, .. }) => {
                    self.ctx.console.notice(&format!(
                        "Message not sent (limit is {max} bytes including the name prefix)."
                    ));
                }
                Delivery::Rejected(e) => {
                    self.ctx.console.notice(&format!("Message not sent: {e}"));
                }
                Delivery::Stopped => break LoopExit::Cancelled,
            }
        };

        info!("Console send loop stopped ({:?})", exit);
        exit
    }
}

// ----------------------------------------------------------------------------
// Peer Receive
// ----------------------------------------------------------------------------

/// Displays, mirrors and logs whatever the peer sends
pub struct PeerReceiveTask {
    ctx: Arc<RelayContext>,
}

impl PeerReceiveTask {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self) -> LoopExit {
        info!("Peer receive loop starting");
        let ctx = &self.ctx;

        let exit = loop {
            let received = tokio::select! {
                _ = ctx.shutdown.cancelled() => break LoopExit::Cancelled,
                received = ctx.channels.from_peer.receive() => received,
            };

            let bytes = match received {
                Ok(bytes) => bytes,
                Err(e) if e.is_transient() => {
                    warn!("Receive from {} failed: {}", ctx.channels.from_peer.name(), e);
                    if ctx.back_off().await {
                        continue;
                    }
                    break LoopExit::Cancelled;
                }
                Err(e) => {
                    debug!("Peer channel unusable: {}", e);
                    break LoopExit::Cancelled;
                }
            };

            ctx.peer.mark();
            let message = ChatMessage::decode(&bytes);
            if is_exit_sentinel(&bytes) {
                ctx.events.record(LogTag::PeerReceive, &message.to_string());
                ctx.console.notice(PEER_EXITED_NOTICE);
                break LoopExit::PeerExit;
            }
            if message.body().is_empty() {
                continue;
            }

            let message = message.attributed_to(ctx.participants.peer());
            let text = message.to_string();
            ctx.console.show(&text);
            ctx.mirror_to_gui(&message);
            ctx.events.record(LogTag::PeerReceive, &text);
        };

        info!("Peer receive loop stopped ({:?})", exit);
        exit
    }
}

// ----------------------------------------------------------------------------
// GUI Relay
// ----------------------------------------------------------------------------

/// Forwards messages typed into the GUI client to the peer
pub struct GuiRelayTask {
    ctx: Arc<RelayContext>,
}

impl GuiRelayTask {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self) -> LoopExit {
        info!("GUI relay loop starting");
        let ctx = &self.ctx;

        let exit = loop {
            let received = tokio::select! {
                _ = ctx.shutdown.cancelled() => break LoopExit::Cancelled,
                received = ctx.channels.gui_in.receive() => received,
            };

            let bytes = match received {
                Ok(bytes) => bytes,
                Err(e) if e.is_transient() => {
                    warn!("Receive from {} failed: {}", ctx.channels.gui_in.name(), e);
                    if ctx.back_off().await {
                        continue;
                    }
                    break LoopExit::Cancelled;
                }
                Err(e) => {
                    debug!("GUI channel unusable: {}", e);
                    break LoopExit::Cancelled;
                }
            };

            // GUI text is sent verbatim under the local identity
            let text = payload_text(&bytes);
            let body = text.trim();
            if body.is_empty() {
                continue;
            }
            let message = ChatMessage::from_identity(ctx.participants.local(), body);

            match ctx.send_to_peer(&message).await {
                Delivery::Sent => {
                    let text = message.to_string();
                    ctx.mirror_to_gui(&message);
                    ctx.events.record(LogTag::GuiSend, &text);
                    ctx.console.show(&text);
                }
                Delivery::Rejected(_) => {}
                Delivery::Stopped => break LoopExit::Cancelled,
            }
        };

        info!("GUI relay loop stopped ({:?})", exit);
        exit
    }
}
