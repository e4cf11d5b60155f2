//! Raspberry Pi peripheral backends
//!
//! Concrete implementations of the seams the core consumes:
//!
//! | Seam | Backend |
//! | ---- | ------- |
//! | [`crate::serial::SerialPort`] | [`crate::serial::UartPort`] |
//! | [`crate::motion::Servo`] | [`PwmServo`] |
//! | [`crate::game::BallDropSensor`] | [`GpioBallDropSensor`] |
//! | [`crate::game::StopButton`] | [`GpioStopButton`] |

pub mod gpio;
pub mod pwm_servo;

pub use gpio::{GpioBallDropSensor, GpioStopButton};
pub use pwm_servo::PwmServo;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("PWM error: {0}")]
    Pwm(#[from] rppal::pwm::Error),

    #[error("UART error: {0}")]
    Uart(#[from] rppal::uart::Error),

    #[error("Invalid hardware configuration: {0}")]
    InvalidConfig(String),
}
