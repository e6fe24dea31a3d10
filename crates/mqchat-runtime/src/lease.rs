//! Channel lease
//!
//! Holds the queue handles a session opened together with the knowledge of
//! which names this participant must destroy. Release runs once, whether it is
//! triggered by a clean exit, a signal, a failed startup or a drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mqchat_core::{
    AccessMode, ChannelNames, ChatError, ChatResult, MessageQueue, Participants,
    QueueAttributes, QueueError, QueueProvider, QueueSpec,
};
use tracing::{debug, info, warn};

use crate::context::ChannelSet;

/// Set once anything has arrived from the peer
#[derive(Debug, Clone, Default)]
pub struct PeerPresence(Arc<AtomicBool>);

impl PeerPresence {
    pub fn mark(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn seen(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// When a leased name is removed from the namespace at release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cleanup {
    Always,
    /// Only if this handle created the queue and the peer never showed up.
    /// Otherwise the owning peer removes it.
    IfPeerAbsent,
}

struct LeasedQueue {
    queue: Arc<dyn MessageQueue>,
    cleanup: Cleanup,
}

pub struct ChannelLease {
    provider: Arc<dyn QueueProvider>,
    leased: Vec<LeasedQueue>,
    peer: PeerPresence,
    released: AtomicBool,
}

impl ChannelLease {
    /// Open all four channels, or none.
    ///
    /// Channels are opened in the order to-peer, from-peer, GUI-out, GUI-in. If
    /// one fails, everything opened before it is released (including destroying
    /// owned names) and the error names the failing channel.
    pub fn acquire(
        provider: Arc<dyn QueueProvider>,
        participants: &Participants,
    ) -> ChatResult<(Self, ChannelSet)> {
        let names = ChannelNames::derive(participants.local(), participants.peer());
        let attributes = participants.queue_attributes();
        let owns_peer = participants.owns_peer_channels();
        let peer_cleanup = if owns_peer {
            Cleanup::Always
        } else {
            Cleanup::IfPeerAbsent
        };

        let mut lease = Self {
            provider,
            leased: Vec::with_capacity(4),
            peer: PeerPresence::default(),
            released: AtomicBool::new(false),
        };

        // An early return drops the lease, which releases whatever was opened.
        let channels = ChannelSet {
            to_peer: lease.open(&names.to_peer, AccessMode::SendOnly, attributes, peer_cleanup)?,
            from_peer: lease.open(
                &names.from_peer,
                AccessMode::ReceiveOnly,
                attributes,
                peer_cleanup,
            )?,
            gui_out: lease.open(&names.gui_out, AccessMode::SendOnly, attributes, Cleanup::Always)?,
            gui_in: lease.open(&names.gui_in, AccessMode::ReceiveOnly, attributes, Cleanup::Always)?,
        };

        info!(
            "Channels established: {} / {} / {} / {} (owner of peer channels: {})",
            names.to_peer, names.from_peer, names.gui_out, names.gui_in, owns_peer
        );
        Ok((lease, channels))
    }

    fn open(
        &mut self,
        name: &str,
        access: AccessMode,
        attributes: QueueAttributes,
        cleanup: Cleanup,
    ) -> ChatResult<Arc<dyn MessageQueue>> {
        let spec = QueueSpec::new(name, access, attributes);
        let queue = self.provider.open(&spec).map_err(|source| {
            warn!("Failed to open {}: {}", name, source);
            ChatError::ChannelSetup {
                name: name.to_string(),
                source,
            }
        })?;
        self.leased.push(LeasedQueue {
            queue: queue.clone(),
            cleanup,
        });
        Ok(queue)
    }

    /// Handle the relay loops use to report peer traffic
    pub fn peer_presence(&self) -> PeerPresence {
        self.peer.clone()
    }

    /// Close every handle and destroy the names this side is responsible for.
    ///
    /// Returns `false` if the lease was already released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }

        let peer_seen = self.peer.seen();
        for leased in &self.leased {
            let name = leased.queue.name();
            if let Err(e) = leased.queue.close() {
                warn!("Failed to close {}: {}", name, e);
            }

            let destroy = match leased.cleanup {
                Cleanup::Always => true,
                Cleanup::IfPeerAbsent => leased.queue.created() && !peer_seen,
            };
            if !destroy {
                continue;
            }
            match self.provider.destroy(name) {
                Ok(()) => debug!("Destroyed {}", name),
                Err(QueueError::NotFound { .. }) => debug!("{} was already gone", name),
                Err(e) => warn!("Failed to destroy {}: {}", name, e),
            }
        }
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        self.release();
    }
}
