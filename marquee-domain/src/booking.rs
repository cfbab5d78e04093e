use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BookingId, SeatId, ShowId, UserId};

/// Lifecycle status of a booking. PENDING may move to any of the other
/// three; CONFIRMED, CANCELLED and EXPIRED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        *self != BookingStatus::Pending
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// One seat held by a booking, with the price it was quoted at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSeat {
    pub seat_id: SeatId,
    pub price_cents: i64,
}

/// A user's claim on a set of seats for one show.
///
/// The ledger row is the single source of truth; the in-memory seat index
/// is rebuilt from it after a restart. A booking is never mutated after
/// entering a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub show_id: ShowId,
    pub seats: Vec<BookingSeat>,
    pub total_cents: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub payment_ref: Option<String>,
}

impl Booking {
    pub fn seat_ids(&self) -> Vec<SeatId> {
        self.seats.iter().map(|s| s.seat_id).collect()
    }

    /// Whether a confirm arriving at `now` is still in time, with the
    /// confirm-side check widened by the configured skew tolerance.
    pub fn within_lease(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        now <= self.expires_at + skew
    }
}

/// Ledger insert payload; the ledger assigns the booking id.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: UserId,
    pub show_id: ShowId,
    pub seats: Vec<BookingSeat>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
