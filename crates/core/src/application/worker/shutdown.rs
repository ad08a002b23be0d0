// Shutdown signalling shared by the worker, schedulers and HTTP server

use tokio::sync::watch;

/// Receiving half, cloned into every background task
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested, immediately if it already was.
    /// A dropped sender counts as shutdown.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stopping| *stopping).await;
    }
}

pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_all_clones_observe_shutdown() {
        let (tx, token) = shutdown_channel();
        let mut a = token.clone();
        let mut b = token.clone();
        assert!(!token.is_shutdown());

        tx.shutdown();

        tokio::time::timeout(Duration::from_secs(1), a.wait()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), b.wait()).await.unwrap();
        assert!(token.is_shutdown());
    }

    #[tokio::test]
    async fn test_wait_after_shutdown_returns_immediately() {
        let (tx, token) = shutdown_channel();
        tx.shutdown();

        let mut late = token.clone();
        late.wait().await;
        late.wait().await;
        assert!(late.is_shutdown());
    }

    #[tokio::test]
    async fn test_dropped_sender_releases_waiters() {
        let (tx, mut token) = shutdown_channel();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), token.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_blocks_until_signalled() {
        let (_tx, mut token) = shutdown_channel();

        let waited = tokio::time::timeout(Duration::from_millis(20), token.wait()).await;
        assert!(waited.is_err());
    }
}
