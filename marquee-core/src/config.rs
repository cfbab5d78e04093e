use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Tuning knobs for the reservation engine.
///
/// `Default` gives the production values; `load` layers files and
/// environment on top the way the rest of the platform configures itself.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Lease length granted to an acquire that does not ask for one.
    pub default_lease_seconds: u64,
    /// How often the expiry reaper wakes up.
    pub reaper_tick_seconds: u64,
    /// Bounded wait for a show lock before failing with Contention.
    pub lock_acquire_timeout_ms: u64,
    /// Widening applied to confirm-side deadline checks to absorb clock
    /// skew between the engine and its callers.
    pub clock_skew_tolerance_ms: u64,
    /// Whether a CONFIRMED booking may still be cancelled once its show
    /// has started.
    pub cancel_confirmed_after_start: bool,
    /// How long a show lock must sit unused before the registry retires it.
    pub lock_quiet_period_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_lease_seconds: 900,
            reaper_tick_seconds: 30,
            lock_acquire_timeout_ms: 5000,
            clock_skew_tolerance_ms: 2000,
            cancel_confirmed_after_start: false,
            lock_quiet_period_seconds: 300,
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Environment wins: `MARQUEE__DEFAULT_LEASE_SECONDS=600` etc.
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn lease_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.default_lease_seconds as i64)
    }

    pub fn reaper_tick(&self) -> Duration {
        Duration::from_secs(self.reaper_tick_seconds)
    }

    pub fn lock_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_acquire_timeout_ms)
    }

    pub fn clock_skew_tolerance(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.clock_skew_tolerance_ms as i64)
    }

    pub fn lock_quiet_period(&self) -> Duration {
        Duration::from_secs(self.lock_quiet_period_seconds)
    }
}
