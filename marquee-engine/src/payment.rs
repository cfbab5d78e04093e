use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use marquee_domain::{BookingError, BookingId, BookingStatus, StorageError};

use crate::protocol::ReservationEngine;

/// Outcome of a payment attempt, as reported by the external gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Succeeded {
        booking_id: BookingId,
        payment_ref: String,
    },
    Failed {
        booking_id: BookingId,
        reason: Option<String>,
    },
    TimedOut {
        booking_id: BookingId,
    },
}

/// The one call the engine ever makes back toward the payment provider:
/// returning money for a payment that landed after the lease lapsed.
/// Refund state is tracked by the gateway, not here.
pub trait PaymentGateway: Send + Sync {
    fn refund(&self, booking_id: BookingId, payment_ref: &str) -> Result<(), StorageError>;
}

/// Boundary translating gateway callbacks into exactly one of confirm or
/// cancel. Gateways redeliver: duplicate callbacks for a booking that
/// already reached the matching terminal state are absorbed.
pub struct PaymentCallbackAdapter {
    engine: Arc<ReservationEngine>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentCallbackAdapter {
    pub fn new(engine: Arc<ReservationEngine>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { engine, gateway }
    }

    pub fn on_outcome(&self, outcome: PaymentOutcome) -> Result<(), BookingError> {
        match outcome {
            PaymentOutcome::Succeeded {
                booking_id,
                payment_ref,
            } => match self.engine.confirm(booking_id, &payment_ref) {
                Ok(_) => Ok(()),
                Err(BookingError::LeaseExpired(_)) => {
                    // Payment landed after the seats were reclaimed; give
                    // the money back and let the caller rebook.
                    warn!(booking_id, %payment_ref, "payment arrived too late, refunding");
                    self.gateway.refund(booking_id, &payment_ref)?;
                    Ok(())
                }
                Err(BookingError::BookingNotPending {
                    status: BookingStatus::Confirmed,
                    ..
                }) => {
                    info!(booking_id, "duplicate success callback absorbed");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            PaymentOutcome::Failed { booking_id, reason } => {
                info!(booking_id, ?reason, "payment failed, cancelling booking");
                self.cancel_for_owner(booking_id)
            }
            PaymentOutcome::TimedOut { booking_id } => {
                info!(booking_id, "payment timed out, cancelling booking");
                self.cancel_for_owner(booking_id)
            }
        }
    }

    /// Cancel on behalf of whoever owns the booking. `cancel` is idempotent,
    /// so redelivered failure callbacks fall through to `Ok`.
    fn cancel_for_owner(&self, booking_id: BookingId) -> Result<(), BookingError> {
        let booking = self
            .engine
            .ledger
            .find(booking_id)?
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        self.engine.cancel(booking_id, booking.user_id)
    }
}
