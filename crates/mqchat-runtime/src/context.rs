//! Shared relay context
//!
//! Built once by the session and handed to every relay loop behind an `Arc`.
//! Apart from the queue handles and the event logger nothing in here is
//! mutable after startup.

use std::sync::Arc;
use std::time::Duration;

use mqchat_core::{
    ChatMessage, ConsoleOutput, EventLogger, MessageQueue, Participants, QueueError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::lease::PeerPresence;

/// The four open queue handles of a participant
#[derive(Debug, Clone)]
pub struct ChannelSet {
    pub to_peer: Arc<dyn MessageQueue>,
    pub from_peer: Arc<dyn MessageQueue>,
    pub gui_out: Arc<dyn MessageQueue>,
    pub gui_in: Arc<dyn MessageQueue>,
}

/// Everything a relay loop may touch
pub struct RelayContext {
    pub participants: Participants,
    pub channels: ChannelSet,
    /// Marked by the peer receive loop on any inbound message
    pub peer: PeerPresence,
    pub events: EventLogger,
    pub console: Arc<dyn ConsoleOutput>,
    /// Cancelled once the session starts shutting down
    pub shutdown: CancellationToken,
    /// Pause after a transient queue error
    pub retry_backoff: Duration,
}

/// Result of handing a message to the peer channel
#[derive(Debug)]
pub(crate) enum Delivery {
    Sent,
    /// This message could not be sent; the loop carries on
    Rejected(QueueError),
    /// The session is stopping or the channel is gone
    Stopped,
}

impl RelayContext {
    /// Send to the peer, waiting out backpressure unless the session stops first
    pub(crate) async fn send_to_peer(&self, message: &ChatMessage) -> Delivery {
        let payload = message.encode();
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => return Delivery::Stopped,
            result = self.channels.to_peer.send(&payload) => result,
        };

        match result {
            Ok(()) => Delivery::Sent,
            Err(e) if e.is_transient() => {
                warn!("Send to {} failed: {}", self.channels.to_peer.name(), e);
                Delivery::Rejected(e)
            }
            Err(e) => {
                debug!("Peer channel unusable: {}", e);
                Delivery::Stopped
            }
        }
    }

    /// Best-effort copy to the local GUI; never waits
    pub fn mirror_to_gui(&self, message: &ChatMessage) {
        match self.channels.gui_out.try_send(&message.encode()) {
            Ok(()) => {}
            Err(QueueError::Full { .. }) => {
                debug!("GUI backlog full, dropping mirrored message")
            }
            Err(e) => debug!("GUI mirror failed: {}", e),
        }
    }

    /// Sleep for the retry back-off. Returns `false` if the session stopped meanwhile.
    pub(crate) async fn back_off(&self) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.retry_backoff) => true,
        }
    }
}
