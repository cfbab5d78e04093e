//! Concurrent seat-reservation engine.
//!
//! One exclusive lock per show serializes every write to that show's seats;
//! pending bookings hold time-bounded leases on their seats; the durable
//! booking ledger is the source of truth the in-memory index is rebuilt
//! from after a restart; a background reaper reclaims lapsed leases.

pub mod index;
pub mod payment;
pub mod protocol;
pub mod reaper;
pub mod registry;

pub use payment::{PaymentCallbackAdapter, PaymentGateway, PaymentOutcome};
pub use protocol::{AcquireRequest, ReservationEngine};
pub use reaper::ExpiryReaper;
pub use registry::ShowLockRegistry;
