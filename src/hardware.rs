//! Raspberry Pi GPIO and I2C adapters.
//!
//! rppal pins wrapped so they speak the embedded-hal digital traits the
//! drivers are written against, plus the LCD bus opened through
//! linux-embedded-hal. rppal restores every claimed line to its original mode
//! when the pin is dropped, and dropping the `I2cdev` closes the bus handle, so
//! letting a [`HardwareRig`] go out of scope is the whole teardown.

use std::convert::Infallible;

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use linux_embedded_hal::I2cdev;
use rppal::gpio::{self, Gpio};
use thiserror::Error;
use tracing::info;

use crate::alarm::Buzzer;
use crate::bus::HalBus;
use crate::config::Config;

#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("GPIO: {0}")]
    Gpio(#[from] gpio::Error),

    #[error("I2C device {device}: {reason}")]
    I2c { device: String, reason: String },
}

/// rppal output line.
pub struct GpioOutput(gpio::OutputPin);

impl ErrorType for GpioOutput {
    type Error = Infallible;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_high();
        Ok(())
    }
}

/// rppal input line.
pub struct GpioInput(gpio::InputPin);

impl ErrorType for GpioInput {
    type Error = Infallible;
}

impl InputPin for GpioInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_low())
    }
}

/// PWM setup failure on the buzzer line
#[derive(Debug)]
pub struct PwmError(gpio::Error);

impl digital::Error for PwmError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Passive buzzer on a software-PWM output.
pub struct PwmBuzzer(gpio::OutputPin);

impl ErrorType for PwmBuzzer {
    type Error = PwmError;
}

impl Buzzer for PwmBuzzer {
    fn start(&mut self, frequency_hz: f64, duty_cycle: f64) -> Result<(), Self::Error> {
        self.0
            .set_pwm_frequency(frequency_hz, duty_cycle)
            .map_err(PwmError)
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.0.clear_pwm().map_err(PwmError)?;
        self.0.set_low();
        Ok(())
    }
}

/// Every pin and bus handle the monitor needs, claimed together.
pub struct HardwareRig {
    pub trigger: GpioOutput,
    pub echo: GpioInput,
    pub red_led: GpioOutput,
    pub green_led: GpioOutput,
    pub buzzer: PwmBuzzer,
    pub button: GpioInput,
    pub bus: HalBus<I2cdev>,
}

impl HardwareRig {
    /// Claim the GPIO lines and open the I2C device named in `config`.
    pub fn open(config: &Config) -> Result<Self, HardwareError> {
        let gpio = Gpio::new()?;
        let pins = &config.pins;

        let rig = HardwareRig {
            trigger: GpioOutput(gpio.get(pins.trigger)?.into_output_low()),
            echo: GpioInput(gpio.get(pins.echo)?.into_input()),
            red_led: GpioOutput(gpio.get(pins.red_led)?.into_output_low()),
            green_led: GpioOutput(gpio.get(pins.green_led)?.into_output_low()),
            buzzer: PwmBuzzer(gpio.get(pins.buzzer)?.into_output_low()),
            button: GpioInput(gpio.get(pins.button)?.into_input_pullup()),
            bus: HalBus::new(I2cdev::new(&config.display.i2c_device).map_err(|e| {
                HardwareError::I2c {
                    device: config.display.i2c_device.clone(),
                    reason: e.to_string(),
                }
            })?),
        };

        info!("Claimed GPIO lines and opened {}", config.display.i2c_device);
        Ok(rig)
    }
}
