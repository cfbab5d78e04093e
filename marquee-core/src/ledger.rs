use chrono::{DateTime, Utc};

use marquee_domain::{
    Booking, BookingId, BookingStatus, NewBooking, SeatId, ShowId, StorageError, UserId,
};

/// One row of the seat-assignment join used to rebuild a show's seat index
/// after a restart: which booking holds which seat, and where that booking
/// currently stands in its lifecycle.
#[derive(Debug, Clone)]
pub struct SeatAssignment {
    pub booking_id: BookingId,
    pub seat_id: SeatId,
    pub price_cents: i64,
    pub booking_status: BookingStatus,
    pub expires_at: DateTime<Utc>,
}

/// The durable record of bookings and their seat sets — the authoritative
/// source of truth for crash recovery.
///
/// Every status mark is conditional on the current status and reports
/// whether it mutated, so concurrent reapers and out-of-order payment
/// callbacks cannot double-apply a transition. Writes happen inside the
/// show-lock critical section: at lock release the ledger and the in-memory
/// index agree.
pub trait BookingLedger: Send + Sync {
    /// Insert a PENDING booking; the ledger assigns and returns the id.
    fn insert_pending(&self, new: NewBooking) -> Result<Booking, StorageError>;

    fn find(&self, id: BookingId) -> Result<Option<Booking>, StorageError>;

    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Booking>, StorageError>;

    /// PENDING -> CONFIRMED with the payment reference. Returns whether the
    /// row mutated.
    fn mark_confirmed(&self, id: BookingId, payment_ref: &str) -> Result<bool, StorageError>;

    /// PENDING or CONFIRMED -> CANCELLED. Returns whether the row mutated.
    fn mark_cancelled(&self, id: BookingId) -> Result<bool, StorageError>;

    /// PENDING -> EXPIRED. Returns whether the row mutated.
    fn mark_expired(&self, id: BookingId) -> Result<bool, StorageError>;

    /// Push a PENDING booking's expiry forward. Returns whether the row
    /// mutated.
    fn extend_pending_expiry(
        &self,
        id: BookingId,
        new_expiry: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// All PENDING bookings with `expires_at <= cutoff`, for the reaper.
    fn find_pending_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StorageError>;

    /// Seat assignments of every seat-holding booking on a show (PENDING or
    /// CONFIRMED), for index rebuild.
    fn seat_assignments(&self, show_id: ShowId) -> Result<Vec<SeatAssignment>, StorageError>;
}
