//! Cache substrate.
//!
//! The reusable concurrency surface every domain cache embeds by
//! composition rather than inheriting from: a last-update timestamp and a
//! notifier registry, each behind its own lock. Domain caches hold their own
//! `RwLock`-protected maps for their actual data and forward freshness /
//! notification calls to an owned `Substrate`.
//!
//! The notifier-registry lock is deliberately distinct from whatever data
//! lock a domain cache uses. That separation is load-bearing: a notifier
//! callback running on its own task may re-enter any cache (including the
//! one that fired it) without risking self-deadlock, and `register_notifier`
//! can proceed concurrently with reads/writes on the data.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

type Notifier = Arc<dyn Fn() + Send + Sync>;

/// Shared concurrency primitives embedded by every domain cache.
///
/// `Substrate` holds no domain data; `last_update` and `notifiers` are
/// intentionally separate `parking_lot` locks.
pub struct Substrate {
    last_update: RwLock<Option<DateTime<Utc>>>,
    notifiers: Mutex<Vec<Notifier>>,
}

impl Default for Substrate {
    fn default() -> Self {
        Self::new()
    }
}

impl Substrate {
    pub fn new() -> Self {
        Self {
            last_update: RwLock::new(None),
            notifiers: Mutex::new(Vec::new()),
        }
    }

    /// Register a notifier callback. No deregistration is provided —
    /// collaborator lifetime is assumed to equal process lifetime.
    pub fn register_notifier<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifiers.lock().push(Arc::new(f));
    }

    /// Set the last-update timestamp to now. Callers MUST hold their own
    /// data lock's write guard when calling this, so a reader never observes
    /// a fresh timestamp paired with stale data.
    pub fn mark_updated(&self) {
        *self.last_update.write() = Some(Utc::now());
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.read()
    }

    /// Age since the last update, or `Duration::MAX` if never updated.
    pub fn age(&self) -> Duration {
        match self.last_update() {
            None => Duration::MAX,
            Some(t) => {
                let elapsed = Utc::now().signed_duration_since(t);
                elapsed.to_std().unwrap_or(Duration::ZERO)
            }
        }
    }

    /// `true` when never updated, or when older than `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.last_update() {
            None => true,
            Some(_) => self.age() > max_age,
        }
    }

    /// Reset the timestamp to zero. Does not touch the notifier registry —
    /// notifiers are process-lifetime, not data-lifetime.
    pub fn clear(&self) {
        *self.last_update.write() = None;
    }

    /// Fire every registered notifier asynchronously, one task per notifier.
    /// Callers MUST have released their data lock before calling this — a
    /// notifier may read the same cache that fired it.
    pub fn notify_update(&self) {
        let notifiers: Vec<Notifier> = self.notifiers.lock().clone();
        for notifier in notifiers {
            tokio::spawn(async move {
                debug!("firing cache-update notifier");
                notifier();
            });
        }
    }
}
