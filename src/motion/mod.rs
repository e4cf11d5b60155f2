//! Servo motion for the two maze axes
//!
//! - [`slew`] - Rate limiting of pulse-width set-points
//! - [`Servo`] - Output seam implemented by the PWM backend in [`crate::hardware`]

pub mod slew;

pub use slew::{RampValue, RateLimitedValue};

use crate::hardware::HardwareError;

/// Neutral pulse width; the maze is level here.
pub const CENTER_PULSE_US: u16 = 1500;

/// A hobby servo driven by pulse width
///
/// Implementations clamp out-of-range pulses to their configured bounds
/// rather than rejecting them.
pub trait Servo: Send {
    fn set_pulse_width(&mut self, pulse_us: u16) -> Result<(), HardwareError>;
}
