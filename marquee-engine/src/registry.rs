use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use marquee_core::Clock;
use marquee_domain::{BookingError, ShowId};

struct ShowLock {
    mutex: Mutex<()>,
    last_used: Mutex<Instant>,
}

/// One exclusive lock per active show, created lazily and retired once
/// quiet.
///
/// Acquisition is closure-scoped so the lock is released on every exit
/// path, and bounded: a waiter gives up with `Contention` when the
/// configured budget runs out, or `Timeout` when the request's own external
/// deadline lapses first. The registry map itself is guarded by a separate
/// lock held only for lookup, insert and retirement — never while waiting
/// on a show lock, and no caller ever holds two show locks at once.
pub struct ShowLockRegistry {
    locks: Mutex<HashMap<ShowId, Arc<ShowLock>>>,
    clock: Arc<dyn Clock>,
    acquire_timeout: Duration,
}

impl ShowLockRegistry {
    pub fn new(clock: Arc<dyn Clock>, acquire_timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            clock,
            acquire_timeout,
        }
    }

    /// Run `f` while holding the show's exclusive lock.
    pub fn with_lock<T>(
        &self,
        show_id: ShowId,
        deadline: Option<DateTime<Utc>>,
        f: impl FnOnce() -> Result<T, BookingError>,
    ) -> Result<T, BookingError> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(show_id)
                .or_insert_with(|| {
                    Arc::new(ShowLock {
                        mutex: Mutex::new(()),
                        last_used: Mutex::new(Instant::now()),
                    })
                })
                .clone()
        };

        let mut budget = self.acquire_timeout;
        let mut bounded_by_deadline = false;
        if let Some(deadline) = deadline {
            let now = self.clock.now();
            if deadline <= now {
                return Err(BookingError::Timeout(show_id));
            }
            let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
            if remaining < budget {
                budget = remaining;
                bounded_by_deadline = true;
            }
        }

        let result = match lock.mutex.try_lock_for(budget) {
            Some(_guard) => {
                *lock.last_used.lock() = Instant::now();
                f()
            }
            None if bounded_by_deadline => Err(BookingError::Timeout(show_id)),
            None => Err(BookingError::Contention(show_id)),
        };
        result
    }

    /// Drop locks nobody has touched within the quiet period. Held or
    /// contended locks (anyone still owns a handle) always survive.
    pub fn retire_idle(&self, quiet_period: Duration) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        locks.retain(|_, lock| {
            Arc::strong_count(lock) > 1 || lock.last_used.lock().elapsed() < quiet_period
        });
        let retired = before - locks.len();
        if retired > 0 {
            debug!(retired, "retired idle show locks");
        }
        retired
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
