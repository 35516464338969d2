//! Graceful shutdown coordination
//!
//! One [`ShutdownController`] per process. The HTTP server and the
//! collector loop each receive a child token, so Ctrl+C stops both.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A shutdown controller that coordinates graceful shutdown across components.
///
/// # Example
///
/// ```ignore
/// let shutdown = ShutdownController::with_ctrl_c();
///
/// let server_token = shutdown.child_token();
/// tokio::spawn(async move { server.run(server_token).await });
///
/// collector.run_until(shutdown.child_token()).await;
/// ```
#[derive(Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller that is cancelled on Ctrl+C
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_ctrl_c() -> Self {
        let controller = Self::new();
        let token = controller.token.clone();

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, initiating graceful shutdown...");
                    token.cancel();
                }
                Err(e) => {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
            }
        });

        controller
    }

    /// A token cancelled together with this controller.
    ///
    /// Cancelling the child does not affect the parent.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger shutdown manually
    pub fn shutdown(&self) {
        info!("Manual shutdown triggered");
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_manual_shutdown_reaches_children() {
        let controller = ShutdownController::new();
        let server = controller.child_token();
        let collector = controller.child_token();

        // Children are independent of each other
        server.cancel();
        assert!(!collector.is_cancelled());
        assert!(!controller.is_cancelled());

        controller.shutdown();
        assert!(controller.is_cancelled());
        assert!(collector.is_cancelled());

        tokio::time::timeout(Duration::from_secs(1), controller.wait_for_shutdown())
            .await
            .unwrap();
    }
}
