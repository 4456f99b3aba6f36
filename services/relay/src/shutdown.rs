//! Cooperative cancellation shared by every task of an engine run.

use tokio::sync::watch;

/// Cancellation signal observed at every suspension point.
///
/// Cancelled once the controlling sender publishes `true` or is dropped.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Resolves once cancellation is requested.
    pub async fn requested(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

impl From<watch::Receiver<bool>> for Shutdown {
    fn from(rx: watch::Receiver<bool>) -> Self {
        Self::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_requested_resolves_on_send() {
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(rx);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown.requested())
            .await
            .unwrap();

        // Stays requested for clones taken afterwards.
        let mut later = shutdown.clone();
        tokio::time::timeout(Duration::from_secs(1), later.requested())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_requested() {
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(rx);
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), shutdown.requested())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pending_until_requested() {
        let (_tx, rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(rx);
        let waited = tokio::time::timeout(Duration::from_millis(50), shutdown.requested()).await;
        assert!(waited.is_err());
    }
}
