use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use marquee_core::{BookingLedger, SeatAssignment, ShowCatalog};
use marquee_domain::{
    Booking, BookingId, BookingStatus, NewBooking, Show, ShowId, ShowSeatSpec, StorageError,
    UserId,
};

/// In-memory booking ledger.
///
/// Stands in for the relational store behind the same trait: ids are
/// assigned on insert, status marks are conditional, and bookings are never
/// deleted. Shared across engine restarts in tests to exercise recovery.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<LedgerInner>,
}

#[derive(Default)]
struct LedgerInner {
    next_id: BookingId,
    bookings: BTreeMap<BookingId, Booking>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookingLedger for MemoryLedger {
    fn insert_pending(&self, new: NewBooking) -> Result<Booking, StorageError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let booking = Booking {
            id: inner.next_id,
            user_id: new.user_id,
            show_id: new.show_id,
            seats: new.seats,
            total_cents: new.total_cents,
            status: BookingStatus::Pending,
            created_at: new.created_at,
            expires_at: new.expires_at,
            payment_ref: None,
        };
        debug!(booking_id = booking.id, show_id = booking.show_id, "ledger insert");
        inner.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    fn find(&self, id: BookingId) -> Result<Option<Booking>, StorageError> {
        Ok(self.inner.lock().bookings.get(&id).cloned())
    }

    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Booking>, StorageError> {
        Ok(self
            .inner
            .lock()
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    fn mark_confirmed(&self, id: BookingId, payment_ref: &str) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock();
        match inner.bookings.get_mut(&id) {
            Some(b) if b.status == BookingStatus::Pending => {
                b.status = BookingStatus::Confirmed;
                b.payment_ref = Some(payment_ref.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn mark_cancelled(&self, id: BookingId) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock();
        match inner.bookings.get_mut(&id) {
            Some(b) if matches!(b.status, BookingStatus::Pending | BookingStatus::Confirmed) => {
                b.status = BookingStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn mark_expired(&self, id: BookingId) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock();
        match inner.bookings.get_mut(&id) {
            Some(b) if b.status == BookingStatus::Pending => {
                b.status = BookingStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn extend_pending_expiry(
        &self,
        id: BookingId,
        new_expiry: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock();
        match inner.bookings.get_mut(&id) {
            Some(b) if b.status == BookingStatus::Pending && new_expiry > b.expires_at => {
                b.expires_at = new_expiry;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn find_pending_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StorageError> {
        Ok(self
            .inner
            .lock()
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.expires_at <= cutoff)
            .cloned()
            .collect())
    }

    fn seat_assignments(&self, show_id: ShowId) -> Result<Vec<SeatAssignment>, StorageError> {
        Ok(self
            .inner
            .lock()
            .bookings
            .values()
            .filter(|b| {
                b.show_id == show_id
                    && matches!(b.status, BookingStatus::Pending | BookingStatus::Confirmed)
            })
            .flat_map(|b| {
                b.seats.iter().map(|seat| SeatAssignment {
                    booking_id: b.id,
                    seat_id: seat.seat_id,
                    price_cents: seat.price_cents,
                    booking_status: b.status,
                    expires_at: b.expires_at,
                })
            })
            .collect())
    }
}

/// In-memory show catalog for wiring the engine up in tests and demos.
#[derive(Default)]
pub struct MemoryCatalog {
    shows: Mutex<HashMap<ShowId, (Show, Vec<ShowSeatSpec>)>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_show(&self, show: Show, seats: Vec<ShowSeatSpec>) {
        self.shows.lock().insert(show.id, (show, seats));
    }
}

impl ShowCatalog for MemoryCatalog {
    fn show(&self, id: ShowId) -> Result<Option<Show>, StorageError> {
        Ok(self.shows.lock().get(&id).map(|(show, _)| show.clone()))
    }

    fn seats_for_show(&self, id: ShowId) -> Result<Vec<ShowSeatSpec>, StorageError> {
        Ok(self
            .shows
            .lock()
            .get(&id)
            .map(|(_, seats)| seats.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marquee_domain::BookingSeat;

    fn pending(ledger: &MemoryLedger, expires_at: DateTime<Utc>) -> Booking {
        ledger
            .insert_pending(NewBooking {
                user_id: 1,
                show_id: 10,
                seats: vec![
                    BookingSeat {
                        seat_id: 1,
                        price_cents: 1000,
                    },
                    BookingSeat {
                        seat_id: 2,
                        price_cents: 1000,
                    },
                ],
                total_cents: 2000,
                created_at: expires_at - Duration::minutes(15),
                expires_at,
            })
            .unwrap()
    }

    #[test]
    fn test_ids_are_assigned_in_order() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        let first = pending(&ledger, now);
        let second = pending(&ledger, now);
        assert!(second.id > first.id);
    }

    #[test]
    fn test_marks_are_conditional() {
        let ledger = MemoryLedger::new();
        let booking = pending(&ledger, Utc::now());

        assert!(ledger.mark_confirmed(booking.id, "pay-1").unwrap());
        // Already confirmed: neither expiry nor a second confirm applies.
        assert!(!ledger.mark_expired(booking.id).unwrap());
        assert!(!ledger.mark_confirmed(booking.id, "pay-2").unwrap());

        let stored = ledger.find(booking.id).unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.payment_ref.as_deref(), Some("pay-1"));

        // Confirmed bookings can still be cancelled, once.
        assert!(ledger.mark_cancelled(booking.id).unwrap());
        assert!(!ledger.mark_cancelled(booking.id).unwrap());
    }

    #[test]
    fn test_expiring_scan_picks_only_due_pending(){
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        let due = pending(&ledger, now - Duration::seconds(1));
        let not_due = pending(&ledger, now + Duration::minutes(10));
        let confirmed = pending(&ledger, now - Duration::seconds(1));
        ledger.mark_confirmed(confirmed.id, "pay-1").unwrap();

        let hits = ledger.find_pending_expiring_before(now).unwrap();
        let ids: Vec<BookingId> = hits.iter().map(|b| b.id).collect();
        assert!(ids.contains(&due.id));
        assert!(!ids.contains(&not_due.id));
        assert!(!ids.contains(&confirmed.id));
    }

    #[test]
    fn test_seat_assignments_skip_terminal_bookings() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        let live = pending(&ledger, now + Duration::minutes(15));
        let dead = pending(&ledger, now + Duration::minutes(15));
        ledger.mark_cancelled(dead.id).unwrap();

        let assignments = ledger.seat_assignments(10).unwrap();
        assert_eq!(assignments.len(), 2);
        assert!(assignments.iter().all(|a| a.booking_id == live.id));
    }

    #[test]
    fn test_extend_pending_expiry_only_forward() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        let booking = pending(&ledger, now + Duration::minutes(15));

        assert!(!ledger
            .extend_pending_expiry(booking.id, now + Duration::minutes(5))
            .unwrap());
        assert!(ledger
            .extend_pending_expiry(booking.id, now + Duration::minutes(30))
            .unwrap());
        let stored = ledger.find(booking.id).unwrap().unwrap();
        assert_eq!(stored.expires_at, now + Duration::minutes(30));
    }
}
