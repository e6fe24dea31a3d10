//! Chat Session
//!
//! Owns the lifecycle of one participant:
//! - Establishing the four channels (all or nothing)
//! - Spawning and supervising the three relay loops
//! - Deciding when the session ends (console exit, peer exit, or signal)
//! - Graceful shutdown with a deadline, followed by channel release

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mqchat_core::{
    ChatConfig, ChatMessage, ChatResult, ConsoleOutput, EventLogger, LogTag, Participants,
    QueueProvider,
};
use tokio::io::AsyncBufRead;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::RelayContext;
use crate::lease::ChannelLease;
use crate::tasks::{ConsoleSendTask, GuiRelayTask, LoopExit, PeerReceiveTask, RelayKind};

/// Notice printed once the session has shut down
pub const SESSION_ENDED_NOTICE: &str = "Chat terminated.";

// ----------------------------------------------------------------------------
// Settings and Outcome
// ----------------------------------------------------------------------------

/// Timing knobs of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// How long shutdown waits for the relay loops before aborting them
    pub shutdown_grace: Duration,
    /// Pause after a transient queue error
    pub retry_backoff: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for SessionSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            shutdown_grace: config.shutdown_grace(),
            retry_backoff: config.poll_interval(),
        }
    }
}

/// What ended the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Console EOF or `exit`
    LocalExit,
    /// The peer sent the exit sentinel
    PeerExit,
    /// A termination signal arrived
    Signal,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::LocalExit => write!(f, "local exit"),
            ShutdownReason::PeerExit => write!(f, "peer exit"),
            ShutdownReason::Signal => write!(f, "termination signal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub reason: ShutdownReason,
    /// Relay loops still running at the grace deadline
    pub aborted_loops: usize,
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

pub struct ChatSession {
    context: Arc<RelayContext>,
    lease: ChannelLease,
    settings: SessionSettings,
}

impl ChatSession {
    /// Open the four channels and build the relay context.
    ///
    /// Fails without spawning anything if any channel cannot be opened.
    pub fn establish(
        participants: Participants,
        provider: Arc<dyn QueueProvider>,
        events: EventLogger,
        console: Arc<dyn ConsoleOutput>,
        settings: SessionSettings,
    ) -> ChatResult<Self> {
        let (lease, channels) = ChannelLease::acquire(provider, &participants)?;

        let context = Arc::new(RelayContext {
            participants,
            channels,
            events,
            console,
            peer: lease.peer_presence(),
            shutdown: CancellationToken::new(),
            retry_backoff: settings.retry_backoff,
        });

        Ok(Self {
            context,
            lease,
            settings,
        })
    }

    pub fn participants(&self) -> &Participants {
        &self.context.participants
    }

    /// Release the channels now. Safe to call more than once.
    pub fn release(&self) -> bool {
        self.lease.release()
    }

    /// Run the relay loops until the session ends, then shut down.
    ///
    /// `input` feeds the console loop; `termination` resolves when the process
    /// is asked to stop from outside (normally [`crate::TerminationSignal::wait`]).
    pub async fn run<R, F>(self, input: R, termination: F) -> SessionOutcome
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        F: Future<Output = ()> + Send,
    {
        let mut loops = JoinSet::new();
        {
            let task = ConsoleSendTask::new(self.context.clone(), input);
            loops.spawn(async move { (RelayKind::ConsoleSend, task.run().await) });
            let task = PeerReceiveTask::new(self.context.clone());
            loops.spawn(async move { (RelayKind::PeerReceive, task.run().await) });
            let task = GuiRelayTask::new(self.context.clone());
            loops.spawn(async move { (RelayKind::GuiRelay, task.run().await) });
        }
        info!(
            "Session {} <-> {} running",
            self.context.participants.local(),
            self.context.participants.peer()
        );

        tokio::pin!(termination);
        let reason = loop {
            tokio::select! {
                _ = &mut termination => {
                    info!("Termination requested");
                    break ShutdownReason::Signal;
                }
                joined = loops.join_next() => match joined {
                    Some(Ok((_, LoopExit::LocalExit))) => break ShutdownReason::LocalExit,
                    Some(Ok((_, LoopExit::PeerExit))) => break ShutdownReason::PeerExit,
                    Some(Ok((kind, LoopExit::Cancelled))) => {
                        debug!("{} loop finished early", kind);
                    }
                    Some(Err(e)) => {
                        error!("Relay loop terminated abnormally: {}", e);
                        break ShutdownReason::LocalExit;
                    }
                    None => break ShutdownReason::LocalExit,
                },
            }
        };

        self.shutdown(reason, loops).await
    }

    async fn shutdown(
        self,
        reason: ShutdownReason,
        mut loops: JoinSet<(RelayKind, LoopExit)>,
    ) -> SessionOutcome {
        info!("Shutting down session: {}", reason);
        self.context.shutdown.cancel();

        if reason != ShutdownReason::PeerExit {
            self.announce_departure().await;
        }

        let drained = timeout(self.settings.shutdown_grace, async {
            while let Some(joined) = loops.join_next().await {
                match joined {
                    Ok((kind, exit)) => debug!("{} loop joined: {:?}", kind, exit),
                    Err(e) => warn!("Relay loop join failed: {}", e),
                }
            }
        })
        .await
        .is_ok();

        let aborted_loops = if drained {
            0
        } else {
            let remaining = loops.len();
            warn!("{} relay loop(s) missed the shutdown deadline; aborting", remaining);
            loops.shutdown().await;
            remaining
        };

        self.lease.release();
        self.context.console.notice(SESSION_ENDED_NOTICE);

        SessionOutcome {
            reason,
            aborted_loops,
        }
    }

    /// Tell the peer we are leaving, without waiting past the grace deadline
    async fn announce_departure(&self) {
        let sentinel = ChatMessage::exit();
        let to_peer = &self.context.channels.to_peer;

        match timeout(self.settings.shutdown_grace, to_peer.send(&sentinel.encode())).await {
            Ok(Ok(())) => {
                self.context
                    .events
                    .record(LogTag::ConsoleSend, &sentinel.to_string());
            }
            Ok(Err(e)) => warn!("Could not send exit notice to {}: {}", to_peer.name(), e),
            Err(_) => warn!("Timed out sending exit notice to {}", to_peer.name()),
        }
    }
}
