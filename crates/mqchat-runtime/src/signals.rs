//! OS termination signals

use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Listener for SIGINT, SIGTERM and SIGHUP.
///
/// Handlers are registered by [`TerminationSignal::install`], so a signal that
/// arrives between installation and the first poll of [`TerminationSignal::wait`]
/// is not lost.
pub struct TerminationSignal {
    #[cfg(unix)]
    handlers: Option<(Signal, Signal, Signal)>,
}

impl TerminationSignal {
    /// Register the handlers now. Must be called inside a tokio runtime.
    ///
    /// If the handlers cannot be installed the listener never fires; the
    /// session then ends only through the console or the peer.
    #[cfg(unix)]
    pub fn install() -> Self {
        let installed = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        );
        let handlers = match installed {
            (Ok(term), Ok(int), Ok(hup)) => Some((term, int, hup)),
            (term, int, hup) => {
                for e in [term.err(), int.err(), hup.err()].into_iter().flatten() {
                    error!("Failed to install signal handler: {}", e);
                }
                None
            }
        };
        Self { handlers }
    }

    #[cfg(not(unix))]
    pub fn install() -> Self {
        Self {}
    }

    /// Resolves when one of the signals arrives
    #[cfg(unix)]
    pub async fn wait(self) {
        let Some((mut sigterm, mut sigint, mut sighup)) = self.handlers else {
            return std::future::pending().await;
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sighup.recv() => info!("Received SIGHUP"),
        }
    }

    #[cfg(not(unix))]
    pub async fn wait(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return std::future::pending().await;
        }
        info!("Received Ctrl+C");
    }
}
