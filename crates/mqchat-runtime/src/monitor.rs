//! Headless GUI client
//!
//! Attaches to a running participant's GUI channels the way a graphical front
//! end would: typed lines go to the relay's GUI inbox, and everything the relay
//! mirrors back is printed with running sent/received totals. The monitor
//! never creates or destroys channels.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mqchat_core::{
    AccessMode, ChannelNames, ChatError, ChatMessage, ChatResult, ConsoleOutput, MessageQueue,
    Participants, QueueProvider, QueueSpec,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// Messages seen on the GUI channel, split by author
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub sent: u64,
    pub received: u64,
}

impl fmt::Display for MonitorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sent: {} | Received: {}", self.sent, self.received)
    }
}

pub struct GuiMonitor {
    participants: Participants,
    /// The relay's GUI inbox; we write
    outbox: Arc<dyn MessageQueue>,
    /// The relay's GUI mirror; we read
    inbox: Arc<dyn MessageQueue>,
    console: Arc<dyn ConsoleOutput>,
    /// Pause after a transient receive error
    retry_backoff: Duration,
    stats: MonitorStats,
}

impl GuiMonitor {
    /// Attach to the GUI channels of a relay that is already running
    pub fn attach(
        provider: &dyn QueueProvider,
        participants: Participants,
        console: Arc<dyn ConsoleOutput>,
        retry_backoff: Duration,
    ) -> ChatResult<Self> {
        let names = ChannelNames::derive(participants.local(), participants.peer());
        let attributes = participants.queue_attributes();

        let open = |name: &str, access| {
            provider
                .open(&QueueSpec::new(name, access, attributes).attach_only())
                .map_err(|source| ChatError::ChannelSetup {
                    name: name.to_string(),
                    source,
                })
        };
        let outbox = open(&names.gui_in, AccessMode::SendOnly)?;
        let inbox = match open(&names.gui_out, AccessMode::ReceiveOnly) {
            Ok(inbox) => inbox,
            Err(e) => {
                let _ = outbox.close();
                return Err(e);
            }
        };

        info!("Monitor attached to {} and {}", names.gui_in, names.gui_out);
        Ok(Self {
            participants,
            outbox,
            inbox,
            console,
            retry_backoff,
            stats: MonitorStats::default(),
        })
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Relay typed lines and print mirrored traffic until input ends or
    /// `termination` resolves
    pub async fn run<R, F>(mut self, input: R, termination: F) -> MonitorStats
    where
        R: AsyncBufRead + Unpin + Send,
        F: Future<Output = ()> + Send,
    {
        let mut lines = input.lines();
        tokio::pin!(termination);

        loop {
            tokio::select! {
                _ = &mut termination => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.submit(line.trim()).await,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Monitor input failed: {}", e);
                        break;
                    }
                },
                received = self.inbox.receive() => match received {
                    Ok(bytes) => self.display(&ChatMessage::decode(&bytes)),
                    Err(e) if e.is_transient() => {
                        warn!("Monitor receive failed: {}", e);
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                    Err(e) => {
                        warn!("Monitor channel unusable: {}", e);
                        break;
                    }
                },
            }
        }

        let _ = self.outbox.close();
        let _ = self.inbox.close();
        self.stats
    }

    async fn submit(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Err(e) = self.outbox.send(text.as_bytes()).await {
            self.console.notice(&format!("Could not hand message to the relay: {e}"));
        }
    }

    fn display(&mut self, message: &ChatMessage) {
        let arrow = if message.is_from(self.participants.local()) {
            self.stats.sent += 1;
            "->"
        } else {
            self.stats.received += 1;
            "<-"
        };
        self.console.show(&format!("{arrow} {message}"));
        self.console.show(&self.stats.to_string());
    }
}
