use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BookingError;
use crate::{BookingId, SeatId};

/// Status of a single seat within one show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Locked,
    Booked,
    Maintenance,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Locked => "LOCKED",
            SeatStatus::Booked => "BOOKED",
            SeatStatus::Maintenance => "MAINTENANCE",
        };
        f.write_str(s)
    }
}

/// Per-(show, seat) state record.
///
/// All mutation goes through the transition helpers below; an illegal move
/// fails loudly instead of silently rewriting state. Holder and lease only
/// carry meaning in the statuses that set them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatState {
    pub seat_id: SeatId,
    pub status: SeatStatus,
    pub holder: Option<BookingId>,
    pub lease_deadline: Option<DateTime<Utc>>,
    pub price_cents: i64,
}

impl SeatState {
    pub fn available(seat_id: SeatId, price_cents: i64) -> Self {
        Self {
            seat_id,
            status: SeatStatus::Available,
            holder: None,
            lease_deadline: None,
            price_cents,
        }
    }

    /// AVAILABLE -> LOCKED with a holder and an absolute lease deadline.
    pub fn lock(
        &mut self,
        booking_id: BookingId,
        deadline: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if self.status != SeatStatus::Available {
            return Err(self.illegal(SeatStatus::Locked));
        }
        self.status = SeatStatus::Locked;
        self.holder = Some(booking_id);
        self.lease_deadline = Some(deadline);
        Ok(())
    }

    /// Push the lease deadline of a LOCKED seat forward. The new deadline
    /// must be strictly later than the current one.
    pub fn renew(&mut self, deadline: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status != SeatStatus::Locked {
            return Err(self.illegal(SeatStatus::Locked));
        }
        match self.lease_deadline {
            Some(current) if deadline > current => {
                self.lease_deadline = Some(deadline);
                Ok(())
            }
            _ => Err(self.illegal(SeatStatus::Locked)),
        }
    }

    /// LOCKED -> BOOKED, keeping the holder. The confirming booking must be
    /// the one holding the lease.
    pub fn confirm(&mut self, booking_id: BookingId) -> Result<(), BookingError> {
        if self.status != SeatStatus::Locked || self.holder != Some(booking_id) {
            return Err(self.illegal(SeatStatus::Booked));
        }
        self.status = SeatStatus::Booked;
        self.lease_deadline = None;
        Ok(())
    }

    /// LOCKED or BOOKED back to AVAILABLE, by the holding booking.
    /// Releasing a BOOKED seat happens when a confirmed booking is cancelled.
    pub fn release(&mut self, booking_id: BookingId) -> Result<(), BookingError> {
        let held = matches!(self.status, SeatStatus::Locked | SeatStatus::Booked);
        if !held || self.holder != Some(booking_id) {
            return Err(self.illegal(SeatStatus::Available));
        }
        self.status = SeatStatus::Available;
        self.holder = None;
        self.lease_deadline = None;
        Ok(())
    }

    /// LOCKED -> AVAILABLE once the lease deadline has passed. Reaper-only
    /// counterpart of [`SeatState::release`].
    pub fn reap(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status != SeatStatus::Locked || !self.lease_expired(now) {
            return Err(self.illegal(SeatStatus::Available));
        }
        self.status = SeatStatus::Available;
        self.holder = None;
        self.lease_deadline = None;
        Ok(())
    }

    /// Admin move, only out of AVAILABLE.
    pub fn set_maintenance(&mut self) -> Result<(), BookingError> {
        if self.status != SeatStatus::Available {
            return Err(self.illegal(SeatStatus::Maintenance));
        }
        self.status = SeatStatus::Maintenance;
        Ok(())
    }

    /// Returns a MAINTENANCE seat to AVAILABLE.
    pub fn clear_maintenance(&mut self) -> Result<(), BookingError> {
        if self.status != SeatStatus::Maintenance {
            return Err(self.illegal(SeatStatus::Available));
        }
        self.status = SeatStatus::Available;
        Ok(())
    }

    pub fn is_held_by(&self, booking_id: BookingId) -> bool {
        self.holder == Some(booking_id)
    }

    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lease_deadline, Some(deadline) if now > deadline)
    }

    fn illegal(&self, to: SeatStatus) -> BookingError {
        BookingError::IllegalTransition {
            from: self.status,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn deadline() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(15)
    }

    #[test]
    fn test_lock_confirm_lifecycle() {
        let mut seat = SeatState::available(7, 1200);

        seat.lock(42, deadline()).unwrap();
        assert_eq!(seat.status, SeatStatus::Locked);
        assert_eq!(seat.holder, Some(42));

        seat.confirm(42).unwrap();
        assert_eq!(seat.status, SeatStatus::Booked);
        assert_eq!(seat.holder, Some(42));
        assert!(seat.lease_deadline.is_none());
    }

    #[test]
    fn test_confirm_requires_matching_holder() {
        let mut seat = SeatState::available(7, 1200);
        seat.lock(42, deadline()).unwrap();

        let err = seat.confirm(99).unwrap_err();
        assert!(matches!(err, BookingError::IllegalTransition { .. }));
        assert_eq!(seat.status, SeatStatus::Locked);
    }

    #[test]
    fn test_double_lock_is_illegal() {
        let mut seat = SeatState::available(7, 1200);
        seat.lock(42, deadline()).unwrap();

        assert!(seat.lock(43, deadline()).is_err());
        assert_eq!(seat.holder, Some(42));
    }

    #[test]
    fn test_release_from_locked_and_booked() {
        let mut seat = SeatState::available(7, 1200);
        seat.lock(42, deadline()).unwrap();
        seat.release(42).unwrap();
        assert_eq!(seat.status, SeatStatus::Available);

        // A confirmed seat releases too (cancel of a confirmed booking).
        seat.lock(42, deadline()).unwrap();
        seat.confirm(42).unwrap();
        seat.release(42).unwrap();
        assert_eq!(seat.status, SeatStatus::Available);
        assert_eq!(seat.holder, None);
    }

    #[test]
    fn test_reap_only_after_deadline() {
        let now = Utc::now();
        let mut seat = SeatState::available(7, 1200);
        seat.lock(42, now + Duration::seconds(30)).unwrap();

        // Still inside the lease.
        assert!(seat.reap(now).is_err());
        assert_eq!(seat.status, SeatStatus::Locked);

        seat.reap(now + Duration::seconds(31)).unwrap();
        assert_eq!(seat.status, SeatStatus::Available);
    }

    #[test]
    fn test_renew_must_extend() {
        let now = Utc::now();
        let mut seat = SeatState::available(7, 1200);
        seat.lock(42, now + Duration::seconds(60)).unwrap();

        assert!(seat.renew(now + Duration::seconds(30)).is_err());
        seat.renew(now + Duration::seconds(120)).unwrap();
        assert_eq!(seat.lease_deadline, Some(now + Duration::seconds(120)));
    }

    #[test]
    fn test_maintenance_only_from_available() {
        let mut seat = SeatState::available(7, 1200);
        seat.set_maintenance().unwrap();
        assert_eq!(seat.status, SeatStatus::Maintenance);
        assert!(seat.lock(42, deadline()).is_err());

        seat.clear_maintenance().unwrap();
        assert_eq!(seat.status, SeatStatus::Available);

        seat.lock(42, deadline()).unwrap();
        assert!(seat.set_maintenance().is_err());
    }
}
