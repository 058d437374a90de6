use tokio::{signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels `cancel` on the first SIGINT or SIGTERM. The listener also ends
/// once the token is cancelled from elsewhere.
pub fn cancel_on_signal(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            name = next_signal() => {
                info!(signal = name, "Stopping polling sessions.");
                cancel.cancel();
            }
        }
    })
}

async fn next_signal() -> &'static str {
    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(err) => {
                warn!(error = %err, "Cannot listen for SIGINT.");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(err) => {
                warn!(error = %err, "Cannot listen for SIGTERM.");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    Interrupted = 130,
}

impl ExitCode {
    /// An interrupt wins over session failures; any failed session is an error.
    pub fn for_run(interrupted: bool, failed_sessions: usize) -> Self {
        if interrupted {
            ExitCode::Interrupted
        } else if failed_sessions > 0 {
            ExitCode::GeneralError
        } else {
            ExitCode::Success
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
