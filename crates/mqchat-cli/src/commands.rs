//! Command handlers for the mqchat CLI

use std::sync::Arc;

use mqchat_core::{
    ChatConfig, ConsoleOutput, EventLogger, FileEventLog, Participants, QueueProvider,
    StdoutConsole,
};
use mqchat_runtime::{ChatSession, GuiMonitor, SessionSettings, TerminationSignal};
use tokio::io::BufReader;
use tracing::info;

use crate::cli::Cli;
use crate::error::{CliError, Result};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Run the chat or the monitor, depending on the flags
    pub async fn execute(cli: Cli, config: ChatConfig) -> Result<()> {
        let participants = cli.participants()?;
        let provider = queue_provider(&config)?;

        if cli.monitor {
            Self::handle_monitor_command(participants, provider, &config).await
        } else {
            Self::handle_chat_command(participants, provider, &config).await
        }
    }

    async fn handle_chat_command(
        participants: Participants,
        provider: Arc<dyn QueueProvider>,
        config: &ChatConfig,
    ) -> Result<()> {
        let event_log = FileEventLog::open(&config.log.path)?;
        info!("Logging chat events to {}", event_log.path().display());

        // Installed first so a signal during setup still releases the channels
        let termination = TerminationSignal::install();
        let console: Arc<dyn ConsoleOutput> = Arc::new(StdoutConsole);
        let session = ChatSession::establish(
            participants,
            provider,
            EventLogger::new(Arc::new(event_log)),
            console.clone(),
            SessionSettings::from(config),
        )?;

        console.notice(&format!(
            "Process {} started (peer: {})",
            session.participants().local(),
            session.participants().peer()
        ));

        let input = BufReader::new(tokio::io::stdin());
        let outcome = session.run(input, termination.wait()).await;
        info!("Session ended: {}", outcome.reason);
        Ok(())
    }

    async fn handle_monitor_command(
        participants: Participants,
        provider: Arc<dyn QueueProvider>,
        config: &ChatConfig,
    ) -> Result<()> {
        let termination = TerminationSignal::install();
        let console: Arc<dyn ConsoleOutput> = Arc::new(StdoutConsole);
        let local = participants.local().clone();
        let monitor = GuiMonitor::attach(
            provider.as_ref(),
            participants,
            console.clone(),
            config.poll_interval(),
        )?;

        console.notice(&format!(
            "Monitoring the chat of {local} (end input to detach)"
        ));

        let input = BufReader::new(tokio::io::stdin());
        let stats = monitor.run(input, termination.wait()).await;
        console.notice(&format!("Monitor detached. {stats}"));
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn queue_provider(config: &ChatConfig) -> Result<Arc<dyn QueueProvider>> {
    Ok(Arc::new(mqchat_core::PosixQueueProvider::new(
        config.queue.permissions,
        config.poll_interval(),
    )))
}

#[cfg(not(target_os = "linux"))]
fn queue_provider(_config: &ChatConfig) -> Result<Arc<dyn QueueProvider>> {
    Err(CliError::Unsupported(
        "POSIX message queues are only available on Linux".to_string(),
    ))
}

/// Load configuration from file or use defaults
pub fn load_configuration(cli: &Cli) -> Result<ChatConfig> {
    match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            ChatConfig::load_from_file(path).map_err(|e| match e {
                mqchat_core::ChatError::Config(message) => CliError::Config(message),
                other => CliError::Chat(other),
            })
        }
        None => {
            info!("Using default configuration");
            Ok(ChatConfig::default())
        }
    }
}
