//! Fixed-timestep accrual clock using an accumulator pattern.
//!
//! The host calls in at whatever rate its timers fire. GameTime converts
//! wall-clock timestamps into a whole number of accrual ticks, so currency
//! production is deterministic and fully testable.

use std::cell::Cell;
use std::rc::Rc;

use crate::config::DEFAULT_MAX_TICK_GAP_MS;

pub struct GameTime {
    /// Milliseconds per tick (e.g. 100ms = 10 ticks/sec)
    ms_per_tick: f64,
    /// Largest delta a single update may consume
    max_delta_ms: f64,
    /// Accumulated milliseconds not yet consumed as ticks
    accumulator: f64,
    /// Total elapsed ticks since creation
    pub total_ticks: u64,
    /// Timestamp of the last update (ms), None if first frame
    last_timestamp: Option<f64>,
}

impl GameTime {
    /// `ticks_per_sec`: accrual ticks per real-time second (e.g. 10).
    /// A zero rate is treated as one tick per second, a NaN gap as
    /// [`DEFAULT_MAX_TICK_GAP_MS`] and a negative gap as zero.
    pub fn new(ticks_per_sec: u32, max_delta_ms: f64) -> Self {
        let max_delta_ms = if max_delta_ms.is_nan() {
            DEFAULT_MAX_TICK_GAP_MS
        } else {
            max_delta_ms.max(0.0)
        };
        Self {
            ms_per_tick: 1000.0 / ticks_per_sec.max(1) as f64,
            max_delta_ms,
            accumulator: 0.0,
            total_ticks: 0,
            last_timestamp: None,
        }
    }

    pub fn ticks_per_sec(&self) -> f64 {
        1000.0 / self.ms_per_tick
    }

    /// Feed a wall-clock timestamp in milliseconds.
    /// Returns the number of discrete ticks to credit this call.
    pub fn update(&mut self, now_ms: f64) -> u32 {
        let delta = match self.last_timestamp {
            // Clamp to avoid a burst after the tab was backgrounded
            Some(prev) => (now_ms - prev).clamp(0.0, self.max_delta_ms),
            None => 0.0,
        };
        self.last_timestamp = Some(now_ms);

        self.accumulator += delta;
        let ticks = (self.accumulator / self.ms_per_tick) as u32;
        self.accumulator -= ticks as f64 * self.ms_per_tick;
        self.total_ticks += ticks as u64;
        ticks
    }
}

/// Source of "now" in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// The real clock: `Date.now()` on wasm32, `SystemTime` elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock moved by hand. Clones share the same instant.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(Rc::new(Cell::new(start_ms)))
    }

    pub fn set(&self, ms: u64) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}
