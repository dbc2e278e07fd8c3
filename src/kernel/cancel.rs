use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Process-wide stop request. Cooperative: loops check it between awaits.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Triggers the signal on Ctrl+C.
    pub fn install_ctrl_c(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                res = tokio::signal::ctrl_c() => {
                    match res {
                        Ok(()) => {
                            info!("Interrupt received, stopping device");
                            token.cancel();
                        }
                        Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
                    }
                }
            }
        });
    }
}
