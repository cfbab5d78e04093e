use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SeatId, ShowId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShowStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

/// The engine's view of a scheduled screening. Movie metadata, screen
/// layouts and catalog search all live outside the engine; this is only
/// what acquisition and pricing need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: ShowId,
    pub screen_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub base_price_cents: i64,
    pub status: ShowStatus,
}

impl Show {
    /// Seats can only be acquired for a scheduled show that has not started.
    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        self.status == ShowStatus::Scheduled && now < self.start_time
    }
}

/// A seat valid for a show, with its price multiplier over the show's base
/// price (premium rows above 1.0, restricted-view below).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowSeatSpec {
    pub seat_id: SeatId,
    pub multiplier: f64,
}

impl ShowSeatSpec {
    pub fn flat(seat_id: SeatId) -> Self {
        Self {
            seat_id,
            multiplier: 1.0,
        }
    }

    pub fn price_cents(&self, base_price_cents: i64) -> i64 {
        (base_price_cents as f64 * self.multiplier).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn show_at(start: DateTime<Utc>, status: ShowStatus) -> Show {
        Show {
            id: 1,
            screen_id: 2,
            start_time: start,
            end_time: start + Duration::hours(2),
            base_price_cents: 1000,
            status,
        }
    }

    #[test]
    fn test_bookable_window() {
        let now = Utc::now();
        assert!(show_at(now + Duration::hours(1), ShowStatus::Scheduled).is_bookable(now));
        assert!(!show_at(now - Duration::minutes(1), ShowStatus::Scheduled).is_bookable(now));
        assert!(!show_at(now + Duration::hours(1), ShowStatus::Cancelled).is_bookable(now));
        assert!(!show_at(now + Duration::hours(1), ShowStatus::Completed).is_bookable(now));
    }

    #[test]
    fn test_seat_price_from_multiplier() {
        assert_eq!(ShowSeatSpec::flat(1).price_cents(1000), 1000);
        let premium = ShowSeatSpec {
            seat_id: 2,
            multiplier: 1.5,
        };
        assert_eq!(premium.price_cents(1000), 1500);
        let restricted = ShowSeatSpec {
            seat_id: 3,
            multiplier: 0.75,
        };
        assert_eq!(restricted.price_cents(999), 749);
    }
}
