//! Shutdown coordination.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Broadcast shutdown shared by the HTTP server and the reconciler.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Trigger, then wait up to `grace` for `tasks` to finish. Tasks still
    /// running after that are aborted. Returns whether all finished in time.
    ///
    /// An in-flight reconciliation attempt may be cut off; its settlement
    /// stays unrecorded and is reconciled by tx hash after restart.
    pub async fn drain(&self, tasks: Vec<JoinHandle<()>>, grace: Duration) -> bool {
        self.trigger();

        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let wait_all = async {
            for task in tasks {
                let _ = task.await;
            }
        };

        match tokio::time::timeout(grace, wait_all).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Background tasks did not stop in time; aborting"
                );
                aborts.iter().for_each(|a| a.abort());
                false
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_all_subscribers() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_waits_for_listeners() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let task = tokio::spawn(async move {
            let _ = rx.recv().await;
        });

        assert!(shutdown.drain(vec![task], Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_drain_aborts_stuck_tasks() {
        let shutdown = Shutdown::new();
        let task = tokio::spawn(std::future::pending::<()>());

        assert!(!shutdown.drain(vec![task], Duration::from_millis(50)).await);
    }
}
