#![allow(dead_code)]

use chrono::{Duration, Utc};
use std::sync::Arc;

use marquee_core::{Clock, EngineConfig};
use marquee_domain::{Show, ShowId, ShowSeatSpec, ShowStatus};
use marquee_engine::ReservationEngine;
use marquee_store::{ManualClock, MemoryCatalog, MemoryLedger};

pub const SHOW: ShowId = 1;

/// Surface engine logs in failing tests; safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// An engine wired to in-memory collaborators and a hand-driven clock.
pub struct TestWorld {
    pub engine: Arc<ReservationEngine>,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<MemoryLedger>,
    pub catalog: Arc<MemoryCatalog>,
}

pub fn world(seat_count: i64) -> TestWorld {
    world_with_config(seat_count, EngineConfig::default())
}

pub fn world_with_config(seat_count: i64, config: EngineConfig) -> TestWorld {
    let clock = Arc::new(ManualClock::starting_at(Utc::now()));
    let ledger = Arc::new(MemoryLedger::new());
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.add_show(
        Show {
            id: SHOW,
            screen_id: 1,
            start_time: clock.now() + Duration::hours(3),
            end_time: clock.now() + Duration::hours(5),
            base_price_cents: 1000,
            status: ShowStatus::Scheduled,
        },
        (1..=seat_count).map(ShowSeatSpec::flat).collect(),
    );
    let engine = Arc::new(ReservationEngine::new(
        ledger.clone(),
        catalog.clone(),
        clock.clone(),
        config,
    ));
    TestWorld {
        engine,
        clock,
        ledger,
        catalog,
    }
}

/// Simulate a crash: a fresh engine over the same durable ledger and
/// catalog, with no in-memory state carried over.
pub fn restart(world: &TestWorld) -> Arc<ReservationEngine> {
    Arc::new(ReservationEngine::new(
        world.ledger.clone(),
        world.catalog.clone(),
        world.clock.clone(),
        EngineConfig::default(),
    ))
}
