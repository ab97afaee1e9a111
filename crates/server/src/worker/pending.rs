//! Fire-and-forget cache writes.
//!
//! Opportunistic writes are detached from the response they came from.
//! Their failures (panics included) are logged and counted, never returned
//! to the caller. [`PendingWrites::settle`] is the explicit
//! wait-for-completion point; any number of callers may wait at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use wardrobe_sw_core::Error;

#[derive(Clone)]
pub struct PendingWrites {
    in_flight: Arc<watch::Sender<usize>>,
    failures: Arc<AtomicU64>,
}

impl Default for PendingWrites {
    fn default() -> Self {
        Self { in_flight: Arc::new(watch::Sender::new(0)), failures: Arc::default() }
    }
}

/// Holds one slot of the in-flight count until dropped.
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn enter(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detach `write`; returns immediately.
    pub fn spawn<F>(&self, label: String, write: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let slot = InFlight::enter(&self.in_flight);
        let failures = self.failures.clone();
        let write = tokio::spawn(write);
        tokio::spawn(async move {
            let _slot = slot;
            match write.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("cache write for {} failed: {}", label, e);
                }
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("cache write task for {} aborted: {}", label, e);
                }
            }
        });
    }

    /// Wait until no write is in flight, including writes spawned meanwhile.
    pub async fn settle(&self) {
        let mut rx = self.in_flight.subscribe();
        // the sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Number of writes that failed since creation.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    #[tokio::test]
    async fn test_settle_waits_for_writes() {
        let pending = PendingWrites::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            pending.spawn("test".into(), async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        pending.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(pending.failures(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_raised() {
        let pending = PendingWrites::new();
        pending.spawn("broken".into(), async { Err(Error::InvalidState("store closed".into())) });

        pending.settle().await;
        assert_eq!(pending.failures(), 1);
    }

    #[tokio::test]
    async fn test_settle_with_nothing_pending() {
        PendingWrites::new().settle().await;
    }

    #[tokio::test]
    async fn test_concurrent_settles_both_wait() {
        let pending = PendingWrites::new();
        let done = Arc::new(AtomicBool::new(false));
        {
            let done = done.clone();
            pending.spawn("slow".into(), async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                done.store(true, Ordering::SeqCst);
                Ok(())
            });
        }

        let first = {
            let pending = pending.clone();
            tokio::spawn(async move { pending.settle().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        pending.settle().await;

        assert!(done.load(Ordering::SeqCst));
        first.await.unwrap();
        assert_eq!(*pending.in_flight.borrow(), 0);
    }

    async fn poisoned() -> Result<(), Error> {
        panic!("store poisoned")
    }

    #[tokio::test]
    async fn test_panicking_write_is_counted() {
        let pending = PendingWrites::new();
        pending.spawn("panics".into(), poisoned());
        pending.spawn("fine".into(), async { Ok(()) });

        pending.settle().await;
        assert_eq!(pending.failures(), 1);
        assert_eq!(*pending.in_flight.borrow(), 0);
    }
}
