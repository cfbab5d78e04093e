use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use marquee_core::{BookingLedger, Clock, EngineConfig, ShowCatalog};
use marquee_domain::{
    Booking, BookingError, BookingId, BookingSeat, BookingStatus, BookingView, NewBooking, SeatId,
    SeatStatus, SeatView, ShowId, ShowStats, UserId,
};

use crate::index::SeatIndex;
use crate::registry::ShowLockRegistry;

/// A request to lease seats for a show.
#[derive(Debug, Clone)]
pub struct AcquireRequest {
    pub user_id: UserId,
    pub show_id: ShowId,
    pub seat_ids: Vec<SeatId>,
    /// Lease length; the configured default applies when absent.
    pub lease_seconds: Option<u64>,
    /// External deadline of the request itself. Elapses before the show
    /// lock is acquired -> the request fails with `Timeout` and mutates
    /// nothing.
    pub deadline: Option<DateTime<Utc>>,
}

impl AcquireRequest {
    pub fn new(user_id: UserId, show_id: ShowId, seat_ids: Vec<SeatId>) -> Self {
        Self {
            user_id,
            show_id,
            seat_ids,
            lease_seconds: None,
            deadline: None,
        }
    }
}

/// The seat-reservation protocol.
///
/// Every mutating operation takes the show's exclusive lock, validates
/// against the in-memory index, writes the ledger inside the critical
/// section and only then mutates seats, so the durable record and the
/// index agree at every lock release. Operations on the same show are
/// totally ordered by that lock; across shows there is no ordering and
/// none is needed.
pub struct ReservationEngine {
    pub(crate) ledger: Arc<dyn BookingLedger>,
    pub(crate) catalog: Arc<dyn ShowCatalog>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: ShowLockRegistry,
    pub(crate) index: SeatIndex,
    pub(crate) config: EngineConfig,
}

impl ReservationEngine {
    pub fn new(
        ledger: Arc<dyn BookingLedger>,
        catalog: Arc<dyn ShowCatalog>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let locks = ShowLockRegistry::new(clock.clone(), config.lock_acquire_timeout());
        Self {
            ledger,
            catalog,
            clock,
            locks,
            index: SeatIndex::new(),
            config,
        }
    }

    /// Lease a set of seats, atomically: either every requested seat moves
    /// AVAILABLE -> LOCKED under a fresh PENDING booking, or nothing is
    /// written at all.
    pub fn acquire(&self, req: AcquireRequest) -> Result<BookingView, BookingError> {
        let now = self.clock.now();
        let show = self
            .catalog
            .show(req.show_id)?
            .ok_or(BookingError::ShowNotBookable(req.show_id))?;
        if !show.is_bookable(now) {
            return Err(BookingError::ShowNotBookable(req.show_id));
        }

        if req.seat_ids.is_empty() {
            return Err(BookingError::InvalidSeats("no seats requested".into()));
        }
        let mut seen = HashSet::new();
        let duplicates: Vec<SeatId> = req
            .seat_ids
            .iter()
            .copied()
            .filter(|id| !seen.insert(*id))
            .collect();
        if !duplicates.is_empty() {
            return Err(BookingError::InvalidSeats(format!(
                "duplicate seat ids {duplicates:?}"
            )));
        }
        let valid: HashSet<SeatId> = self
            .catalog
            .seats_for_show(req.show_id)?
            .into_iter()
            .map(|spec| spec.seat_id)
            .collect();
        let unknown: Vec<SeatId> = req
            .seat_ids
            .iter()
            .copied()
            .filter(|id| !valid.contains(id))
            .collect();
        if !unknown.is_empty() {
            return Err(BookingError::InvalidSeats(format!(
                "seats {unknown:?} are not part of show {}",
                req.show_id
            )));
        }

        let lease = Duration::seconds(
            req.lease_seconds
                .unwrap_or(self.config.default_lease_seconds) as i64,
        );

        self.locks.with_lock(req.show_id, req.deadline, || {
            self.index
                .load(req.show_id, &*self.catalog, &*self.ledger)?;
            let now = self.clock.now();
            let lease_deadline = now + lease;

            self.index.with_seats_mut(req.show_id, |seats| {
                let mut conflicts = Vec::new();
                let mut booking_seats = Vec::new();
                for &seat_id in &req.seat_ids {
                    match seats.get(&seat_id) {
                        Some(seat) if seat.status == SeatStatus::Available => {
                            booking_seats.push(BookingSeat {
                                seat_id,
                                price_cents: seat.price_cents,
                            });
                        }
                        _ => conflicts.push(seat_id),
                    }
                }
                if !conflicts.is_empty() {
                    return Err(BookingError::SeatUnavailable(conflicts));
                }

                let total_cents = booking_seats.iter().map(|s| s.price_cents).sum();
                let booking = self.ledger.insert_pending(NewBooking {
                    user_id: req.user_id,
                    show_id: req.show_id,
                    seats: booking_seats,
                    total_cents,
                    created_at: now,
                    expires_at: lease_deadline,
                })?;

                for &seat_id in &req.seat_ids {
                    let seat = seats.get_mut(&seat_id).ok_or_else(|| {
                        BookingError::Inconsistency(format!(
                            "seat {seat_id} vanished from show {}",
                            req.show_id
                        ))
                    })?;
                    seat.lock(booking.id, lease_deadline)?;
                }

                info!(
                    booking_id = booking.id,
                    show_id = req.show_id,
                    user_id = req.user_id,
                    seats = ?req.seat_ids,
                    %lease_deadline,
                    "seats leased"
                );
                Ok(BookingView::from(&booking))
            })
        })
    }

    /// Turn a pending booking into a confirmed one on payment success.
    ///
    /// If the lease lapsed — by the clock (widened by the skew tolerance)
    /// or because the reaper already reclaimed a seat — the booking is
    /// expired in the same critical section and the caller gets
    /// `LeaseExpired`; no seats are taken.
    pub fn confirm(
        &self,
        booking_id: BookingId,
        payment_ref: &str,
    ) -> Result<BookingView, BookingError> {
        let probe = self.fetch(booking_id)?;
        self.locks.with_lock(probe.show_id, None, || {
            self.index
                .load(probe.show_id, &*self.catalog, &*self.ledger)?;
            let booking = self.fetch(booking_id)?;
            match booking.status {
                BookingStatus::Pending => {}
                // The reaper got here first.
                BookingStatus::Expired => return Err(BookingError::LeaseExpired(booking.id)),
                status => {
                    return Err(BookingError::BookingNotPending {
                        id: booking.id,
                        status,
                    })
                }
            }

            let now = self.clock.now();
            let skew = self.config.clock_skew_tolerance();
            let lease_good = booking.within_lease(now, skew)
                && self.index.with_seats_mut(booking.show_id, |seats| {
                    Ok(booking.seat_ids().iter().all(|seat_id| {
                        seats.get(seat_id).is_some_and(|seat| {
                            seat.status == SeatStatus::Locked
                                && seat.is_held_by(booking.id)
                                && !seat.lease_expired(now - skew)
                        })
                    }))
                })?;

            if !lease_good {
                self.expire_under_lock(&booking)?;
                return Err(BookingError::LeaseExpired(booking.id));
            }

            if !self.ledger.mark_confirmed(booking.id, payment_ref)? {
                return Err(BookingError::BookingNotPending {
                    id: booking.id,
                    status: booking.status,
                });
            }
            self.index.with_seats_mut(booking.show_id, |seats| {
                for seat_id in booking.seat_ids() {
                    let seat = seats.get_mut(&seat_id).ok_or_else(|| {
                        BookingError::Inconsistency(format!(
                            "confirmed seat {seat_id} missing from show {}",
                            booking.show_id
                        ))
                    })?;
                    seat.confirm(booking.id)?;
                }
                Ok(())
            })?;

            info!(
                booking_id = booking.id,
                show_id = booking.show_id,
                payment_ref,
                "booking confirmed"
            );
            let mut confirmed = booking;
            confirmed.status = BookingStatus::Confirmed;
            confirmed.payment_ref = Some(payment_ref.to_string());
            Ok(BookingView::from(&confirmed))
        })
    }

    /// Cancel a booking on behalf of its owner, releasing every held seat.
    /// Terminal bookings cancel as a no-op success.
    pub fn cancel(&self, booking_id: BookingId, by_user_id: UserId) -> Result<(), BookingError> {
        let probe = self.fetch(booking_id)?;
        // Ownership is checked before any lock is taken.
        if probe.user_id != by_user_id {
            return Err(BookingError::Unauthorized {
                booking_id,
                user_id: by_user_id,
            });
        }
        if matches!(
            probe.status,
            BookingStatus::Cancelled | BookingStatus::Expired
        ) {
            return Ok(());
        }

        self.locks.with_lock(probe.show_id, None, || {
            self.index
                .load(probe.show_id, &*self.catalog, &*self.ledger)?;
            let booking = self.fetch(booking_id)?;
            match booking.status {
                BookingStatus::Cancelled | BookingStatus::Expired => return Ok(()),
                BookingStatus::Confirmed => {
                    let show = self
                        .catalog
                        .show(booking.show_id)?
                        .ok_or(BookingError::ShowNotBookable(booking.show_id))?;
                    if !self.config.cancel_confirmed_after_start
                        && self.clock.now() >= show.start_time
                    {
                        return Err(BookingError::CancellationNotAllowed(booking_id));
                    }
                }
                BookingStatus::Pending => {}
            }

            if !self.ledger.mark_cancelled(booking.id)? {
                return Ok(());
            }
            self.release_held_seats(&booking)?;
            info!(
                booking_id = booking.id,
                show_id = booking.show_id,
                "booking cancelled"
            );
            Ok(())
        })
    }

    /// Point-in-time availability snapshot, without taking the show lock.
    /// A LOCKED seat whose lease already lapsed reads as AVAILABLE.
    pub fn availability(&self, show_id: ShowId) -> Result<Vec<SeatView>, BookingError> {
        self.index.load(show_id, &*self.catalog, &*self.ledger)?;
        let seats = self.index.snapshot(show_id).ok_or_else(|| {
            BookingError::Inconsistency(format!("seat index for show {show_id} vanished"))
        })?;
        let now = self.clock.now();
        Ok(seats.iter().map(|seat| SeatView::observed(seat, now)).collect())
    }

    /// Push a pending booking's lease forward by `extra_seconds` from now.
    /// Shrinking the lease is a no-op; a lapsed lease expires the booking.
    pub fn renew_lease(
        &self,
        booking_id: BookingId,
        extra_seconds: u64,
    ) -> Result<BookingView, BookingError> {
        let probe = self.fetch(booking_id)?;
        self.locks.with_lock(probe.show_id, None, || {
            self.index
                .load(probe.show_id, &*self.catalog, &*self.ledger)?;
            let booking = self.fetch(booking_id)?;
            if booking.status != BookingStatus::Pending {
                return Err(BookingError::BookingNotPending {
                    id: booking.id,
                    status: booking.status,
                });
            }

            let now = self.clock.now();
            if !booking.within_lease(now, self.config.clock_skew_tolerance()) {
                self.expire_under_lock(&booking)?;
                return Err(BookingError::LeaseExpired(booking.id));
            }

            let new_expiry = now + Duration::seconds(extra_seconds as i64);
            if !self.ledger.extend_pending_expiry(booking.id, new_expiry)? {
                // Not actually later than the current deadline.
                return Ok(BookingView::from(&booking));
            }
            self.index.with_seats_mut(booking.show_id, |seats| {
                for seat_id in booking.seat_ids() {
                    if let Some(seat) = seats.get_mut(&seat_id) {
                        if seat.is_held_by(booking.id) {
                            seat.renew(new_expiry)?;
                        }
                    }
                }
                Ok(())
            })?;

            info!(booking_id = booking.id, %new_expiry, "lease renewed");
            let mut renewed = booking;
            renewed.expires_at = new_expiry;
            Ok(BookingView::from(&renewed))
        })
    }

    pub fn booking(&self, booking_id: BookingId) -> Result<BookingView, BookingError> {
        Ok(BookingView::from(&self.fetch(booking_id)?))
    }

    pub fn user_bookings(&self, user_id: UserId) -> Result<Vec<BookingView>, BookingError> {
        let mut bookings = self.ledger.find_by_user(user_id)?;
        bookings.sort_by_key(|b| b.id);
        Ok(bookings.iter().map(BookingView::from).collect())
    }

    /// Seat counts and realized revenue for a show, counted over raw seat
    /// statuses. Unlike `availability`, a LOCKED seat with a lapsed lease
    /// still counts as locked here until the reaper reclaims it, so the
    /// four counts always sum to the show's seat count.
    pub fn show_stats(&self, show_id: ShowId) -> Result<ShowStats, BookingError> {
        self.index.load(show_id, &*self.catalog, &*self.ledger)?;
        let seats = self.index.snapshot(show_id).ok_or_else(|| {
            BookingError::Inconsistency(format!("seat index for show {show_id} vanished"))
        })?;
        Ok(ShowStats::from_seats(seats.iter()))
    }

    /// Take an AVAILABLE seat out of service.
    pub fn set_maintenance(&self, show_id: ShowId, seat_id: SeatId) -> Result<(), BookingError> {
        self.locks.with_lock(show_id, None, || {
            self.index.load(show_id, &*self.catalog, &*self.ledger)?;
            self.index.with_seats_mut(show_id, |seats| {
                seats
                    .get_mut(&seat_id)
                    .ok_or_else(|| {
                        BookingError::InvalidSeats(format!(
                            "seat {seat_id} is not part of show {show_id}"
                        ))
                    })?
                    .set_maintenance()
            })
        })
    }

    /// Return a MAINTENANCE seat to service.
    pub fn clear_maintenance(&self, show_id: ShowId, seat_id: SeatId) -> Result<(), BookingError> {
        self.locks.with_lock(show_id, None, || {
            self.index.load(show_id, &*self.catalog, &*self.ledger)?;
            self.index.with_seats_mut(show_id, |seats| {
                seats
                    .get_mut(&seat_id)
                    .ok_or_else(|| {
                        BookingError::InvalidSeats(format!(
                            "seat {seat_id} is not part of show {show_id}"
                        ))
                    })?
                    .clear_maintenance()
            })
        })
    }

    /// Reap one pending booking whose lease deadline has passed. Returns
    /// whether this call performed the expiry; a booking that was
    /// confirmed or cancelled since the caller's scan is skipped.
    pub fn expire_booking(&self, booking_id: BookingId) -> Result<bool, BookingError> {
        let probe = self.fetch(booking_id)?;
        if probe.status != BookingStatus::Pending {
            return Ok(false);
        }
        self.locks.with_lock(probe.show_id, None, || {
            self.index
                .load(probe.show_id, &*self.catalog, &*self.ledger)?;
            let booking = self.fetch(booking_id)?;
            if booking.status != BookingStatus::Pending {
                return Ok(false);
            }
            if self.clock.now() <= booking.expires_at {
                return Ok(false);
            }
            self.expire_under_lock(&booking)
        })
    }

    fn fetch(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        self.ledger
            .find(booking_id)?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    /// Ledger-first expiry of a pending booking inside the caller's
    /// critical section: conditional EXPIRED mark, then reclaim whatever
    /// seats it still holds.
    fn expire_under_lock(&self, booking: &Booking) -> Result<bool, BookingError> {
        if !self.ledger.mark_expired(booking.id)? {
            return Ok(false);
        }
        self.release_held_seats(booking)?;
        warn!(
            booking_id = booking.id,
            show_id = booking.show_id,
            "lease lapsed; booking expired and seats reclaimed"
        );
        Ok(true)
    }

    fn release_held_seats(&self, booking: &Booking) -> Result<(), BookingError> {
        let now = self.clock.now();
        self.index.with_seats_mut(booking.show_id, |seats| {
            for seat_id in booking.seat_ids() {
                if let Some(seat) = seats.get_mut(&seat_id) {
                    if !seat.is_held_by(booking.id) {
                        continue;
                    }
                    if seat.status == SeatStatus::Locked && seat.lease_expired(now) {
                        seat.reap(now)?;
                    } else {
                        seat.release(booking.id)?;
                    }
                }
            }
            Ok(())
        })
    }
}
