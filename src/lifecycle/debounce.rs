//! Trailing-edge debouncing on the tokio runtime.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs the most recently scheduled action once `delay` has passed without a
/// newer one
///
/// Rescheduling, [`cancel`](Debouncer::cancel) and dropping all abort the
/// pending action. Scheduling must happen inside a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            handle: None,
        }
    }

    /// Replace any pending action with `action`, run after the delay
    pub fn schedule<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
    }

    /// Abort the pending action; returns whether one was still waiting or running
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_action_runs() {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let mut debouncer = Debouncer::new(Duration::from_millis(1000));

        for i in 0..5 {
            let runs = Arc::clone(&runs);
            debouncer.schedule(async move {
                runs.lock().unwrap().push(i);
            });
            tokio::time::advance(Duration::from_millis(200)).await;
        }
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        settle().await;

        assert_eq!(*runs.lock().unwrap(), vec![4]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_waits_full_delay() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(1500));

        let c = Arc::clone(&count);
        debouncer.schedule(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1499)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop_abort() {
        let count = Arc::new(AtomicUsize::new(0));

        let mut cancelled = Debouncer::new(Duration::from_millis(100));
        let c = Arc::clone(&count);
        cancelled.schedule(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(cancelled.cancel());
        assert!(!cancelled.cancel());

        let mut dropped = Debouncer::new(Duration::from_millis(100));
        let c = Arc::clone(&count);
        dropped.schedule(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        drop(dropped);

        tokio::time::sleep(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
