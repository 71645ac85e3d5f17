//! Graceful shutdown signal shared by every background task (batch
//! worker lanes, expiry lane, distribution bus heartbeat loop). Wired
//! to `tokio::signal::ctrl_c()` in `main.rs` per SPEC_FULL.md §B.5.

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(CancellationToken);

impl ShutdownToken {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    pub fn trigger(&self) {
        self.0.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.0.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.0.cancelled().await;
    }

    pub fn child(&self) -> Self {
        Self(self.0.child_token())
    }
}
