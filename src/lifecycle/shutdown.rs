//! Shutdown fan-out to the server and the metrics upkeep task.

use tokio::sync::broadcast;

/// One-shot stop signal shared by every background task of the process.
///
/// Tasks take a receiver with [`subscribe`](Self::subscribe) before they are
/// spawned; a receiver created after [`trigger`](Self::trigger) never fires.
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

    /// Signal every subscriber. Returns how many tasks were notified.
    pub fn trigger(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
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
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut upkeep = shutdown.subscribe();

        assert_eq!(shutdown.trigger(), 2);
        assert!(server.recv().await.is_ok());
        assert!(upkeep.recv().await.is_ok());
    }

    #[test]
    fn test_trigger_without_subscribers() {
        let shutdown = Shutdown::default();
        assert_eq!(shutdown.trigger(), 0);

        let dropped = shutdown.subscribe();
        drop(dropped);
        assert_eq!(shutdown.trigger(), 0);
    }
}
