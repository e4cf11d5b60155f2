//! Slew-rate limiter for actuator set-points
//!
//! [`RateLimitedValue`] walks its current value toward a target, moving at
//! most `max_rate * elapsed` per update and snapping exactly onto the target
//! once it is within reach. The rate is configured in units per second and
//! applied per millisecond.

use std::fmt::Debug;
use std::ops::{Add, Sub};

/// Numeric types a [`RateLimitedValue`] can ramp
///
/// The step size is computed in `f32` and converted to `Self` before it is
/// applied. Integer types truncate the step toward zero, so a step never
/// exceeds the rate bound in either direction. Rates below one unit per
/// update leave an integer ramp standing still.
pub trait RampValue: Copy + PartialEq + Debug + Add<Output = Self> + Sub<Output = Self> {
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl RampValue for f32 {
    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }
}

impl RampValue for u16 {
    fn to_f32(self) -> f32 {
        f32::from(self)
    }

    fn from_f32(value: f32) -> Self {
        value as u16
    }
}

impl RampValue for i32 {
    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value as i32
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitedValue<T: RampValue> {
    current: T,
    target: T,
    max_rate_per_s: f32,
    max_rate_per_ms: f32,
}

impl<T: RampValue> RateLimitedValue<T> {
    /// Starts at rest on `initial` with the given rate in units per second.
    pub fn new(initial: T, max_rate_per_s: f32) -> Self {
        let mut value = Self {
            current: initial,
            target: initial,
            max_rate_per_s: 0.0,
            max_rate_per_ms: 0.0,
        };
        value.set_max_rate(max_rate_per_s);
        value
    }

    /// Takes effect on the next [`update`](Self::update).
    pub fn set_target(&mut self, target: T) {
        self.target = target;
    }

    /// Advances the current value by at most `max_rate * delta_ms`.
    pub fn update(&mut self, delta_ms: u32) {
        let current = self.current.to_f32();
        let delta = self.target.to_f32() - current;
        let max_change = (self.max_rate_per_ms * delta_ms as f32).max(0.0);

        if delta.abs() <= max_change {
            self.current = self.target;
            return;
        }

        // max_change < |delta| here, so the step stays inside T's range
        let step = T::from_f32(max_change);
        self.current = if delta > 0.0 {
            self.current + step
        } else {
            self.current - step
        };
    }

    pub fn current(&self) -> T {
        self.current
    }

    pub fn target(&self) -> T {
        self.target
    }

    /// Exact equality; under continuous re-targeting this may never hold.
    pub fn is_at_target(&self) -> bool {
        self.current == self.target
    }

    pub fn distance_to_target(&self) -> f32 {
        (self.target.to_f32() - self.current.to_f32()).abs()
    }

    /// Rate in units per second.
    pub fn set_max_rate(&mut self, rate_per_s: f32) {
        self.max_rate_per_s = rate_per_s;
        self.max_rate_per_ms = rate_per_s / 1000.0;
    }

    /// Returns exactly the rate passed to [`set_max_rate`](Self::set_max_rate).
    pub fn max_rate(&self) -> f32 {
        self.max_rate_per_s
    }

    /// Jumps to `value` with no transient motion.
    pub fn reset(&mut self, value: T) {
        self.current = value;
        self.target = value;
    }
}
