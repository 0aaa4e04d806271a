//! Elapsed-time tracking
//!
//! All values are milliseconds as `f64`, the unit servers report their
//! clocks in.

use std::time::Instant;

/// Source of "now" for clocks and ping measurement
pub trait TimeSource {
    /// Milliseconds since an arbitrary, fixed origin
    fn now(&self) -> f64;
}

/// Monotonic time measured from when the source was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A start/tick clock.
///
/// `tick` advances `current_time` to the given instant and accumulates the
/// step into `elapsed_time`. Remote clocks are never ticked; their fields
/// are overwritten with [`Clock::set_remote`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clock {
    running: bool,
    current_time: f64,
    elapsed_time: f64,
    delta_time: f64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart from zero at `now`
    pub fn start(&mut self, now: f64) {
        self.running = true;
        self.current_time = now;
        self.elapsed_time = 0.0;
        self.delta_time = 0.0;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Advance to `now`. A stopped clock does not move.
    pub fn tick(&mut self, now: f64) {
        if !self.running {
            return;
        }
        self.delta_time = now - self.current_time;
        self.current_time = now;
        self.elapsed_time += self.delta_time;
    }

    /// Overwrite the time fields with values reported by the server
    pub fn set_remote(&mut self, current_time: f64, elapsed_time: f64) {
        self.current_time = current_time;
        self.elapsed_time = elapsed_time;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    /// Length of the last tick
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }
}
