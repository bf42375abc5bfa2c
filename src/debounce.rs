//! Trailing-edge, single-shot debouncer.
//!
//! `trigger()` atomically cancels any pending timer and schedules a new one
//! `duration` from now; the callback runs on its own task, never
//! synchronously from `trigger()`. `stop()` cancels a pending timer without
//! firing it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

type Callback = Arc<dyn Fn() + Send + Sync>;

/// A monotonically increasing generation counter. Each `trigger()` bumps it;
/// a pending timer fires only if its captured generation still matches when
/// its sleep completes, which is what lets a later `trigger()` or a `stop()`
/// silently supersede it without cancelling a spawned task directly.
pub struct Debouncer {
    duration: Duration,
    callback: Callback,
    generation: Arc<AtomicU64>,
    armed: Arc<Mutex<bool>>,
    wake: Arc<Notify>,
}

impl Debouncer {
    pub fn new<F>(duration: Duration, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            duration,
            callback: Arc::new(callback),
            generation: Arc::new(AtomicU64::new(0)),
            armed: Arc::new(Mutex::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Cancel any pending timer and arm a new one `duration` from now.
    pub fn trigger(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.armed.lock() = true;
        trace!(generation, "debouncer trigger");

        let duration = self.duration;
        let callback = self.callback.clone();
        let shared_generation = self.generation.clone();
        let armed = self.armed.clone();
        let wake = self.wake.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = wake.notified() => return,
            }
            if shared_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let mut armed_guard = armed.lock();
            if !*armed_guard {
                return;
            }
            *armed_guard = false;
            drop(armed_guard);
            debug!("debouncer firing");
            callback();
        });
    }

    /// Cancel the pending timer, if any. Idempotent.
    pub fn stop(&self) {
        *self.armed.lock() = false;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.wake.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn s5_debounce_burst_fires_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let debouncer = Debouncer::new(StdDuration::from_millis(50), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..10 {
            debouncer.trigger();
            tokio::time::sleep(StdDuration::from_millis(2)).await;
        }
        tokio::time::sleep(StdDuration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_before_deadline_suppresses_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let debouncer = Debouncer::new(StdDuration::from_millis(30), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.trigger();
        debouncer.stop();
        tokio::time::sleep(StdDuration::from_millis(80)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fire_then_trigger_starts_new_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let debouncer = Debouncer::new(StdDuration::from_millis(20), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.trigger();
        tokio::time::sleep(StdDuration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        debouncer.trigger();
        tokio::time::sleep(StdDuration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
