use super::HardwareError;
use crate::game::{BallDropSensor, StopButton};
use rppal::gpio::{Gpio, InputPin, Level};
use tracing::info;

/// Ball-drop switch wired to ground with the internal pull-up enabled
pub struct GpioBallDropSensor {
    pin: InputPin,
    active: Level,
}

impl GpioBallDropSensor {
    pub fn new(gpio: &Gpio, pin: u8, active_low: bool) -> Result<Self, HardwareError> {
        let pin = if active_low {
            gpio.get(pin)?.into_input_pullup()
        } else {
            gpio.get(pin)?.into_input_pulldown()
        };
        info!(
            "Ball drop sensor on GPIO {} (active {})",
            pin.pin(),
            if active_low { "low" } else { "high" }
        );

        Ok(Self {
            pin,
            active: if active_low { Level::Low } else { Level::High },
        })
    }
}

impl BallDropSensor for GpioBallDropSensor {
    fn is_triggered(&mut self) -> bool {
        self.pin.read() == self.active
    }
}

/// Momentary push button to ground, pull-up enabled
pub struct GpioStopButton {
    pin: InputPin,
}

impl GpioStopButton {
    pub fn new(gpio: &Gpio, pin: u8) -> Result<Self, HardwareError> {
        let pin = gpio.get(pin)?.into_input_pullup();
        info!("Stop button on GPIO {}", pin.pin());
        Ok(Self { pin })
    }
}

impl StopButton for GpioStopButton {
    fn is_pressed(&mut self) -> bool {
        self.pin.is_low()
    }
}
