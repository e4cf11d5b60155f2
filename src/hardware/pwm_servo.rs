use super::HardwareError;
use crate::motion::Servo;
use rppal::pwm::{Channel, Polarity, Pwm};
use std::time::Duration;
use tracing::{debug, info};

/// Standard hobby-servo frame: 50 Hz.
const PWM_PERIOD: Duration = Duration::from_millis(20);

/// Servo on one of the hardware PWM channels
pub struct PwmServo {
    pwm: Pwm,
    min_pulse_us: u16,
    max_pulse_us: u16,
}

impl PwmServo {
    /// `channel` is 0 or 1 (PWM0/PWM1). The output starts enabled at `initial_us`.
    pub fn new(
        channel: u8,
        min_pulse_us: u16,
        max_pulse_us: u16,
        initial_us: u16,
    ) -> Result<Self, HardwareError> {
        if min_pulse_us >= max_pulse_us {
            return Err(HardwareError::InvalidConfig(format!(
                "min pulse {}us must be below max pulse {}us",
                min_pulse_us, max_pulse_us
            )));
        }
        let channel = match channel {
            0 => Channel::Pwm0,
            1 => Channel::Pwm1,
            other => {
                return Err(HardwareError::InvalidConfig(format!(
                    "unsupported PWM channel {}",
                    other
                )))
            }
        };

        let initial_us = initial_us.clamp(min_pulse_us, max_pulse_us);
        let pwm = Pwm::with_period(
            channel,
            PWM_PERIOD,
            Duration::from_micros(u64::from(initial_us)),
            Polarity::Normal,
            true,
        )?;
        info!(
            "PWM servo on {:?} ready ({}-{}us, start {}us)",
            channel, min_pulse_us, max_pulse_us, initial_us
        );

        Ok(Self {
            pwm,
            min_pulse_us,
            max_pulse_us,
        })
    }
}

impl Servo for PwmServo {
    fn set_pulse_width(&mut self, pulse_us: u16) -> Result<(), HardwareError> {
        let clamped = pulse_us.clamp(self.min_pulse_us, self.max_pulse_us);
        if clamped != pulse_us {
            debug!("Pulse {}us clamped to {}us", pulse_us, clamped);
        }
        self.pwm
            .set_pulse_width(Duration::from_micros(u64::from(clamped)))?;
        Ok(())
    }
}
