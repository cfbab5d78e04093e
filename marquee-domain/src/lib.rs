pub mod booking;
pub mod error;
pub mod seat;
pub mod show;
pub mod views;

pub use booking::{Booking, BookingSeat, BookingStatus, NewBooking};
pub use error::{BookingError, StorageError};
pub use seat::{SeatState, SeatStatus};
pub use show::{Show, ShowSeatSpec, ShowStatus};
pub use views::{BookingView, SeatView, ShowStats};

/// Identifier of a scheduled show.
pub type ShowId = i64;
/// Identifier of a seat within a screen, stable across shows.
pub type SeatId = i64;
/// Identifier of a registered user.
pub type UserId = i64;
/// Ledger-assigned identifier of a booking.
pub type BookingId = i64;
