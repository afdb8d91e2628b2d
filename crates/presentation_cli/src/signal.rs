//! Interrupt handling for `run`

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, warn};

/// Wait for SIGINT or SIGTERM
async fn interrupted() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => warn!("Received Ctrl+C, cancelling and reverting live faults"),
        () = terminate => warn!("Received SIGTERM, cancelling and reverting live faults"),
    }
}

/// Flip the cancel flag on the first interrupt
///
/// The returned receiver is what the executor polls.
pub fn cancel_on_interrupt() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::select! {
            () = interrupted() => {
                let _ = tx.send(true);
            }
            () = tx.closed() => {}
        }
    });
    rx
}
