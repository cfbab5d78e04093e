use chrono::{DateTime, Utc};

/// Pluggable source of "now".
///
/// Every deadline comparison in the engine goes through this trait, so
/// tests can advance time deterministically instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
