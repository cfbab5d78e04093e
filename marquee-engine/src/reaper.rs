use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use marquee_domain::BookingError;

use crate::protocol::ReservationEngine;

/// Background worker that enforces lease deadlines.
///
/// Each tick scans the ledger for pending bookings past their expiry and
/// reaps them one show lock at a time — never two shows under one lock.
/// Every ledger mark is conditional, so a booking confirmed or cancelled
/// between the scan and the lock acquisition is detected and skipped, and
/// running several reaper instances is safe.
pub struct ExpiryReaper {
    engine: Arc<ReservationEngine>,
    tick: Duration,
    lock_quiet_period: Duration,
}

impl ExpiryReaper {
    pub fn new(engine: Arc<ReservationEngine>) -> Self {
        let tick = engine.config.reaper_tick();
        let lock_quiet_period = engine.config.lock_quiet_period();
        Self {
            engine,
            tick,
            lock_quiet_period,
        }
    }

    /// One reaper pass. Returns how many bookings this pass expired.
    pub fn run_once(&self) -> usize {
        let now = self.engine.clock.now();
        let due = match self.engine.ledger.find_pending_expiring_before(now) {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "reaper could not scan the ledger");
                return 0;
            }
        };

        let mut reaped = 0;
        for booking in due {
            match self.engine.expire_booking(booking.id) {
                Ok(true) => reaped += 1,
                // Confirmed or cancelled since the scan; nothing to do.
                Ok(false) => {}
                Err(BookingError::Contention(show_id)) => {
                    warn!(
                        booking_id = booking.id,
                        show_id, "show lock busy, deferring expiry to the next tick"
                    );
                }
                Err(e) => {
                    error!(booking_id = booking.id, error = %e, "expiry failed");
                }
            }
        }

        self.engine.locks.retire_idle(self.lock_quiet_period);
        reaped
    }

    /// Run until the shutdown channel flips to `true` (or closes).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_seconds = self.tick.as_secs(), "expiry reaper started");
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let reaped = self.run_once();
                    if reaped > 0 {
                        info!(reaped, "reaper tick reclaimed expired leases");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("expiry reaper stopping");
                        return;
                    }
                }
            }
        }
    }
}
