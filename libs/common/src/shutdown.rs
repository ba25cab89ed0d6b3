//! Stop signals for long-running pointflow commands

use std::fmt;

use tracing::{info, warn};

/// Signal that ended a server run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Ctrl+C (SIGINT)
    Interrupt,
    /// SIGTERM, Unix only
    Terminate,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "SIGINT"),
            Self::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Resolve with the first stop signal received
///
/// When no SIGTERM handler can be installed only Ctrl+C stops the run.
/// A failing Ctrl+C handler never resolves.
pub async fn stop_signal() -> StopSignal {
    let signal = wait_for_signal().await;
    info!("Received {}, stopping", signal);
    signal
}

#[cfg(unix)]
async fn wait_for_signal() -> StopSignal {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => Some(terminate),
        Err(e) => {
            warn!("SIGTERM handler unavailable ({}), stop with Ctrl+C", e);
            None
        },
    };

    tokio::select! {
        _ = interrupt() => StopSignal::Interrupt,
        _ = async {
            match terminate.as_mut() {
                Some(terminate) => {
                    terminate.recv().await;
                },
                None => std::future::pending::<()>().await,
            }
        } => StopSignal::Terminate,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> StopSignal {
    interrupt().await;
    StopSignal::Interrupt
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl+C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}
