use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error};

use marquee_core::{BookingLedger, ShowCatalog};
use marquee_domain::{BookingError, BookingStatus, SeatId, SeatState, ShowId};

type ShowSeats = BTreeMap<SeatId, SeatState>;

/// In-memory index of seat state, one map per loaded show.
///
/// The durable ledger stays authoritative: `load` materializes a show by
/// joining its catalog seats with the ledger's live seat assignments, which
/// is also exactly the crash-recovery path. All mutation happens under the
/// show's lock; the inner `RwLock` only makes lock-free snapshot reads
/// memory-safe against a concurrent writer.
#[derive(Default)]
pub struct SeatIndex {
    shows: RwLock<HashMap<ShowId, Arc<RwLock<ShowSeats>>>>,
}

impl SeatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent materialization of one show's seats from durable state.
    pub fn load(
        &self,
        show_id: ShowId,
        catalog: &dyn ShowCatalog,
        ledger: &dyn BookingLedger,
    ) -> Result<(), BookingError> {
        if self.shows.read().contains_key(&show_id) {
            return Ok(());
        }

        let show = catalog
            .show(show_id)?
            .ok_or(BookingError::ShowNotBookable(show_id))?;

        let mut seats: ShowSeats = catalog
            .seats_for_show(show_id)?
            .into_iter()
            .map(|spec| {
                let price = spec.price_cents(show.base_price_cents);
                (spec.seat_id, SeatState::available(spec.seat_id, price))
            })
            .collect();

        // Re-apply what live bookings hold. Terminal bookings contribute
        // nothing, so a seat whose booking expired while we were down comes
        // back AVAILABLE.
        for assignment in ledger.seat_assignments(show_id)? {
            let seat = seats.get_mut(&assignment.seat_id).ok_or_else(|| {
                self.alarm(show_id, format!(
                    "booking {} holds seat {} that is not in the show",
                    assignment.booking_id, assignment.seat_id
                ))
            })?;

            let applied = seat
                .lock(assignment.booking_id, assignment.expires_at)
                .and_then(|_| match assignment.booking_status {
                    BookingStatus::Confirmed => seat.confirm(assignment.booking_id),
                    _ => Ok(()),
                });
            if applied.is_err() {
                return Err(self.alarm(show_id, format!(
                    "seat {} is claimed by two live bookings ({} and {:?})",
                    assignment.seat_id, assignment.booking_id, seat.holder
                )));
            }
            seat.price_cents = assignment.price_cents;
        }

        let mut shows = self.shows.write();
        // Another caller may have loaded the show while we were building;
        // the first materialization wins.
        shows
            .entry(show_id)
            .or_insert_with(|| Arc::new(RwLock::new(seats)));
        debug!(show_id, "seat index loaded");
        Ok(())
    }

    /// Owned point-in-time copy of a show's seats, without touching the
    /// show lock. Stale the instant it returns.
    pub fn snapshot(&self, show_id: ShowId) -> Option<Vec<SeatState>> {
        let shows = self.shows.read();
        let seats = shows.get(&show_id)?.clone();
        drop(shows);
        let seats = seats.read();
        Some(seats.values().cloned().collect())
    }

    /// Mutate a loaded show's seats. Callers must hold the show's lock.
    pub fn with_seats_mut<T>(
        &self,
        show_id: ShowId,
        f: impl FnOnce(&mut ShowSeats) -> Result<T, BookingError>,
    ) -> Result<T, BookingError> {
        let seats = self
            .shows
            .read()
            .get(&show_id)
            .cloned()
            .ok_or_else(|| {
                BookingError::Inconsistency(format!("seat index for show {show_id} not loaded"))
            })?;
        let mut seats = seats.write();
        f(&mut seats)
    }

    fn alarm(&self, show_id: ShowId, message: String) -> BookingError {
        error!(show_id, %message, "seat index inconsistency");
        BookingError::Inconsistency(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use marquee_domain::{BookingSeat, NewBooking, SeatStatus, Show, ShowSeatSpec, ShowStatus};
    use marquee_store::{MemoryCatalog, MemoryLedger};

    fn seed_show(catalog: &MemoryCatalog, show_id: ShowId, seat_count: i64) {
        let now = Utc::now();
        catalog.add_show(
            Show {
                id: show_id,
                screen_id: 1,
                start_time: now + Duration::hours(2),
                end_time: now + Duration::hours(4),
                base_price_cents: 1000,
                status: ShowStatus::Scheduled,
            },
            (1..=seat_count).map(ShowSeatSpec::flat).collect(),
        );
    }

    fn pending(ledger: &MemoryLedger, show_id: ShowId, seat_ids: &[SeatId]) -> i64 {
        let now = Utc::now();
        ledger
            .insert_pending(NewBooking {
                user_id: 1,
                show_id,
                seats: seat_ids
                    .iter()
                    .map(|&seat_id| BookingSeat {
                        seat_id,
                        price_cents: 1000,
                    })
                    .collect(),
                total_cents: 1000 * seat_ids.len() as i64,
                created_at: now,
                expires_at: now + Duration::minutes(15),
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_load_rebuilds_from_ledger() {
        let catalog = MemoryCatalog::new();
        let ledger = MemoryLedger::new();
        seed_show(&catalog, 10, 5);

        let held = pending(&ledger, 10, &[2, 3]);
        let confirmed = pending(&ledger, 10, &[4]);
        ledger.mark_confirmed(confirmed, "pay-1").unwrap();
        let gone = pending(&ledger, 10, &[5]);
        ledger.mark_cancelled(gone).unwrap();

        let index = SeatIndex::new();
        index.load(10, &catalog, &ledger).unwrap();

        let seats = index.snapshot(10).unwrap();
        assert_eq!(seats.len(), 5);
        let by_id: BTreeMap<SeatId, &SeatState> =
            seats.iter().map(|s| (s.seat_id, s)).collect();
        assert_eq!(by_id[&1].status, SeatStatus::Available);
        assert_eq!(by_id[&2].status, SeatStatus::Locked);
        assert_eq!(by_id[&2].holder, Some(held));
        assert_eq!(by_id[&3].status, SeatStatus::Locked);
        assert_eq!(by_id[&4].status, SeatStatus::Booked);
        assert_eq!(by_id[&4].holder, Some(confirmed));
        // The cancelled booking's seat came back.
        assert_eq!(by_id[&5].status, SeatStatus::Available);
    }

    #[test]
    fn test_load_is_idempotent() {
        let catalog = MemoryCatalog::new();
        let ledger = MemoryLedger::new();
        seed_show(&catalog, 10, 3);

        let index = SeatIndex::new();
        index.load(10, &catalog, &ledger).unwrap();

        // A booking written after the first load is invisible until the
        // protocol mutates the index itself; load must not clobber.
        index
            .with_seats_mut(10, |seats| {
                seats
                    .get_mut(&1)
                    .unwrap()
                    .lock(99, Utc::now() + Duration::minutes(15))
            })
            .unwrap();
        index.load(10, &catalog, &ledger).unwrap();
        let seats = index.snapshot(10).unwrap();
        assert_eq!(seats[0].status, SeatStatus::Locked);
    }

    #[test]
    fn test_unknown_show_fails_load() {
        let catalog = MemoryCatalog::new();
        let ledger = MemoryLedger::new();
        let index = SeatIndex::new();
        let err = index.load(77, &catalog, &ledger).unwrap_err();
        assert!(matches!(err, BookingError::ShowNotBookable(77)));
    }

    #[test]
    fn test_double_claimed_seat_raises_inconsistency() {
        let catalog = MemoryCatalog::new();
        let ledger = MemoryLedger::new();
        seed_show(&catalog, 10, 3);

        // Two live bookings on the same seat: impossible via the protocol,
        // so the rebuild refuses to guess.
        pending(&ledger, 10, &[1]);
        pending(&ledger, 10, &[1]);

        let index = SeatIndex::new();
        let err = index.load(10, &catalog, &ledger).unwrap_err();
        assert!(matches!(err, BookingError::Inconsistency(_)));
    }
}
