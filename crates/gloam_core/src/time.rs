//! Deterministic time system
//!
//! Fixed-rate ticks with an accumulator so wall-clock frames can be
//! converted into whole simulation steps. There are no partial ticks.

use std::time::Duration;

/// Default simulation tick rate (60 Hz = 16.666ms per tick)
pub const TICK_RATE_HZ: u32 = 60;

/// Simulation time tracker
#[derive(Debug, Clone)]
pub struct SimulationTime {
    tick_rate_hz: u32,
    tick_duration: Duration,
    tick_count: u64,
    accumulated: Duration,
}

impl SimulationTime {
    pub fn new() -> Self {
        Self::with_rate(TICK_RATE_HZ)
    }

    /// Create a tracker for an explicit tick rate. A rate of zero is clamped to 1 Hz.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        let tick_rate_hz = tick_rate_hz.max(1);
        Self {
            tick_rate_hz,
            tick_duration: Duration::from_secs(1) / tick_rate_hz,
            tick_count: 0,
            accumulated: Duration::ZERO,
        }
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Seconds per tick, the `dt` handed to systems.
    pub fn dt(&self) -> f32 {
        self.tick_duration.as_secs_f32()
    }

    pub fn advance_tick(&mut self) {
        self.tick_count += 1;
    }

    /// Feed elapsed wall time and return how many whole ticks are due.
    pub fn accumulate(&mut self, elapsed: Duration) -> u32 {
        self.accumulated += elapsed;
        let mut due = 0;
        while self.accumulated >= self.tick_duration {
            self.accumulated -= self.tick_duration;
            due += 1;
        }
        due
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Simulated time covered by the ticks advanced so far.
    pub fn total_time(&self) -> Duration {
        self.tick_duration.mul_f64(self.tick_count as f64)
    }
}

impl Default for SimulationTime {
    fn default() -> Self {
        Self::new()
    }
}
