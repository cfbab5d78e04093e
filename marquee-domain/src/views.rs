use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::{Booking, BookingStatus};
use crate::seat::{SeatState, SeatStatus};
use crate::{BookingId, SeatId};

/// What callers above the engine see of a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
    pub id: BookingId,
    pub status: BookingStatus,
    pub expires_at: DateTime<Utc>,
    pub seat_ids: Vec<SeatId>,
    pub total_cents: i64,
}

impl From<&Booking> for BookingView {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            status: booking.status,
            expires_at: booking.expires_at,
            seat_ids: booking.seat_ids(),
            total_cents: booking.total_cents,
        }
    }
}

/// One seat in an availability snapshot. A LOCKED seat whose lease has
/// already lapsed reads as AVAILABLE; the reaper will reclaim it shortly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatView {
    pub seat_id: SeatId,
    pub status: SeatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_deadline: Option<DateTime<Utc>>,
}

impl SeatView {
    pub fn observed(seat: &SeatState, now: DateTime<Utc>) -> Self {
        if seat.status == SeatStatus::Locked && seat.lease_expired(now) {
            return Self {
                seat_id: seat.seat_id,
                status: SeatStatus::Available,
                lease_deadline: None,
            };
        }
        Self {
            seat_id: seat.seat_id,
            status: seat.status,
            lease_deadline: match seat.status {
                SeatStatus::Locked => seat.lease_deadline,
                _ => None,
            },
        }
    }
}

/// Seat-count and revenue summary for one show, derived from a snapshot of
/// raw seat statuses (no lease collapsing, so the four counts always sum to
/// the show's seat count).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShowStats {
    pub available: usize,
    pub locked: usize,
    pub booked: usize,
    pub maintenance: usize,
    pub revenue_cents: i64,
}

impl ShowStats {
    pub fn from_seats<'a>(seats: impl IntoIterator<Item = &'a SeatState>) -> Self {
        let mut stats = Self::default();
        for seat in seats {
            match seat.status {
                SeatStatus::Available => stats.available += 1,
                SeatStatus::Locked => stats.locked += 1,
                SeatStatus::Booked => {
                    stats.booked += 1;
                    stats.revenue_cents += seat.price_cents;
                }
                SeatStatus::Maintenance => stats.maintenance += 1,
            }
        }
        stats
    }

    pub fn total_seats(&self) -> usize {
        self.available + self.locked + self.booked + self.maintenance
    }
}
