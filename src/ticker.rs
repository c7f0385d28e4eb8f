//! Fixed-period tick loop.
//!
//! One task owns the schedule; every tick takes the world lock for the
//! duration of [`World::tick`] and releases it before sleeping again.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::world::World;

pub struct Ticker {
    world: World,
    period: Duration,
}

impl Ticker {
    pub fn new(world: World) -> Self {
        let period = world.config().tick_period();
        Self { world, period }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Tick until `shutdown` resolves. Returns the number of ticks run.
    pub async fn run<S>(self, shutdown: S) -> u64
    where
        S: Future<Output = ()>,
    {
        info!(period_us = self.period.as_micros() as u64, "tick loop started");
        let mut timer = tokio::time::interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut ticks = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = timer.tick() => {}
            }

            let started = Instant::now();
            let report = self.world.tick();
            ticks += 1;

            let elapsed = started.elapsed();
            if elapsed > self.period {
                warn!(
                    tick = report.tick,
                    elapsed_us = elapsed.as_micros() as u64,
                    "tick overran its period"
                );
            }
            if report.loaded > 0 || report.unloaded > 0 {
                debug!(
                    tick = report.tick,
                    loaded = report.loaded,
                    unloaded = report.unloaded,
                    "chunk maintenance"
                );
            }
            for player in &report.disconnected {
                info!(name = player.name(), "disconnected for invalid movement");
            }
        }

        info!(ticks, "tick loop stopped");
        ticks
    }
}
