//! Signal handling for the binary.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Returns a token cancelled on SIGINT or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl+C only");
            ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c() => {}
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    settle_ctrl_c(tokio::signal::ctrl_c().await).await
}

/// Resolves on a delivered Ctrl+C. A listener that failed to install never
/// resolves, so it cannot trigger shutdown.
pub(crate) async fn settle_ctrl_c(listened: std::io::Result<()>) {
    match listened {
        Ok(()) => info!("Received SIGINT, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
