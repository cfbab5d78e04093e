use thiserror::Error;

use crate::booking::BookingStatus;
use crate::seat::SeatStatus;
use crate::{BookingId, SeatId, ShowId, UserId};

/// Failure of the durable store behind the ledger or catalog.
#[derive(Debug, Clone, Error)]
#[error("storage failure: {0}")]
pub struct StorageError(pub String);

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Every way a reservation operation can fail.
///
/// Errors propagate to the API boundary unchanged; the engine never swallows
/// or translates them. An adapter layer above the engine decides how each
/// kind maps to its transport.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("seats not available: {0:?}")]
    SeatUnavailable(Vec<SeatId>),

    #[error("invalid seat selection: {0}")]
    InvalidSeats(String),

    #[error("show {0} is not open for booking")]
    ShowNotBookable(ShowId),

    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    #[error("booking {id} is {status}, expected PENDING")]
    BookingNotPending { id: BookingId, status: BookingStatus },

    #[error("lease on booking {0} has expired")]
    LeaseExpired(BookingId),

    #[error("booking {0} can no longer be cancelled")]
    CancellationNotAllowed(BookingId),

    #[error("user {user_id} does not own booking {booking_id}")]
    Unauthorized {
        booking_id: BookingId,
        user_id: UserId,
    },

    #[error("show {0} lock not acquired within the configured budget")]
    Contention(ShowId),

    #[error("request deadline elapsed before show {0} was locked")]
    Timeout(ShowId),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("illegal seat transition from {from} to {to}")]
    IllegalTransition { from: SeatStatus, to: SeatStatus },

    #[error("state inconsistency: {0}")]
    Inconsistency(String),
}
