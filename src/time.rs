//! Time sources for timed waits
//!
//! Design:
//! - A `Clock` reports monotonic seconds; the engine clock or a test clock
//! - `TimeScale` is the process-wide time dilation, shared by handle
//! - `TimeContext` bundles both and is passed explicitly to combinators
//! - `Timer` is a countdown ticked by hand with a frame delta

use crate::config::SchedulerConfig;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// A source of monotonic time in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Real time, measured from when the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep one handle and give
/// another to a `TimeContext`.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock reading `seconds`.
    pub fn starting_at(seconds: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(seconds)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    /// Jump to an absolute reading.
    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Shared time dilation factor.
///
/// `1.0` is normal speed, `0.0` freezes gameplay time, anything in between
/// is slow motion. Clones observe the same value.
///
/// Negative, NaN and infinite scales are stored as `0.0`.
#[derive(Debug, Clone)]
pub struct TimeScale(Rc<Cell<f64>>);

impl TimeScale {
    pub fn new(scale: f64) -> Self {
        Self(Rc::new(Cell::new(Self::sanitize(scale))))
    }

    pub fn get(&self) -> f64 {
        self.0.get()
    }

    pub fn set(&self, scale: f64) {
        self.0.set(Self::sanitize(scale));
    }

    fn sanitize(scale: f64) -> f64 {
        if scale.is_finite() && scale >= 0.0 {
            scale
        } else {
            tracing::warn!(scale, "invalid time scale, freezing time instead");
            0.0
        }
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Clock plus time dilation, handed to timed combinators.
#[derive(Clone)]
pub struct TimeContext {
    clock: Rc<dyn Clock>,
    scale: TimeScale,
}

impl TimeContext {
    pub fn new(clock: impl Clock + 'static, scale: TimeScale) -> Self {
        Self {
            clock: Rc::new(clock),
            scale,
        }
    }

    /// Wall clock at normal speed.
    pub fn wall() -> Self {
        Self::new(WallClock::new(), TimeScale::default())
    }

    /// Wall clock with the configured initial dilation.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(WallClock::new(), TimeScale::new(config.time_scale))
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn scale(&self) -> &TimeScale {
        &self.scale
    }
}

impl fmt::Debug for TimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeContext")
            .field("now", &self.now())
            .field("scale", &self.scale.get())
            .finish()
    }
}

/// Countdown ticked with a frame delta.
///
/// Gameplay code uses this for cooldowns that live outside a task, e.g.
/// invincibility frames checked every physics update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    duration: f64,
    remaining: f64,
}

impl Timer {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            remaining: duration,
        }
    }

    /// Consume `delta` seconds, never going below zero.
    pub fn tick(&mut self, delta: f64) -> &mut Self {
        self.remaining = (self.remaining - delta).max(0.0);
        self
    }

    /// Start the countdown over.
    pub fn reset(&mut self) {
        self.remaining = self.duration;
    }

    pub fn has_stopped(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}
