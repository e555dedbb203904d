//! # Alarm Outputs and Acknowledge Button
//!
//! Red/green indicator LEDs, a PWM buzzer and the momentary acknowledge
//! button. The button is wired to ground with the input pulled up, so a press
//! reads low.

use embedded_hal::digital::{Error as _, ErrorKind, ErrorType, InputPin, OutputPin};
use thiserror::Error;
use tracing::warn;

/// Buzzer carrier frequency while alarming
pub const BUZZER_FREQUENCY_HZ: f64 = 440.0;
/// Buzzer duty cycle while alarming (0.0 - 1.0)
pub const BUZZER_DUTY_CYCLE: f64 = 0.5;

/// A tone generator, typically software PWM on a GPIO.
pub trait Buzzer: ErrorType {
    fn start(&mut self, frequency_hz: f64, duty_cycle: f64) -> Result<(), Self::Error>;
    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Which output or input failed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("red LED pin failed: {0:?}")]
    RedLed(ErrorKind),
    #[error("green LED pin failed: {0:?}")]
    GreenLed(ErrorKind),
    #[error("buzzer failed: {0:?}")]
    Buzzer(ErrorKind),
    #[error("button pin failed: {0:?}")]
    Button(ErrorKind),
}

/// The capability the monitor needs from its alarm hardware.
pub trait AlarmOutputs {
    /// Green on, red off, buzzer silent.
    fn show_idle(&mut self) -> Result<(), ActuatorError>;
    /// Red on, green off, buzzer sounding.
    fn raise(&mut self) -> Result<(), ActuatorError>;
    /// Stop the buzzer and go back to the idle indicator.
    fn silence(&mut self) -> Result<(), ActuatorError>;
    /// True while the acknowledge button is held down.
    fn button_pressed(&mut self) -> Result<bool, ActuatorError>;
    /// Everything off. Safe to call repeatedly.
    fn de_energize(&mut self) -> Result<(), ActuatorError>;
}

/// GPIO-backed [`AlarmOutputs`]. Outputs are de-energized on drop.
pub struct AlarmActuator<RED, GREEN, BUZ, BUTTON>
where
    RED: OutputPin,
    GREEN: OutputPin,
    BUZ: Buzzer,
    BUTTON: InputPin,
{
    red: RED,
    green: GREEN,
    buzzer: BUZ,
    button: BUTTON,
}

impl<RED, GREEN, BUZ, BUTTON> AlarmActuator<RED, GREEN, BUZ, BUTTON>
where
    RED: OutputPin,
    GREEN: OutputPin,
    BUZ: Buzzer,
    BUTTON: InputPin,
{
    pub fn new(red: RED, green: GREEN, buzzer: BUZ, button: BUTTON) -> Self {
        Self {
            red,
            green,
            buzzer,
            button,
        }
    }

    fn set_red(&mut self, on: bool) -> Result<(), ActuatorError> {
        let result = if on {
            self.red.set_high()
        } else {
            self.red.set_low()
        };
        result.map_err(|e| ActuatorError::RedLed(e.kind()))
    }

    fn set_green(&mut self, on: bool) -> Result<(), ActuatorError> {
        let result = if on {
            self.green.set_high()
        } else {
            self.green.set_low()
        };
        result.map_err(|e| ActuatorError::GreenLed(e.kind()))
    }

    fn stop_buzzer(&mut self) -> Result<(), ActuatorError> {
        self.buzzer
            .stop()
            .map_err(|e| ActuatorError::Buzzer(e.kind()))
    }
}

impl<RED, GREEN, BUZ, BUTTON> AlarmOutputs for AlarmActuator<RED, GREEN, BUZ, BUTTON>
where
    RED: OutputPin,
    GREEN: OutputPin,
    BUZ: Buzzer,
    BUTTON: InputPin,
{
    fn show_idle(&mut self) -> Result<(), ActuatorError> {
        self.stop_buzzer()?;
        self.set_red(false)?;
        self.set_green(true)
    }

    fn raise(&mut self) -> Result<(), ActuatorError> {
        self.set_red(true)?;
        self.set_green(false)?;
        self.buzzer
            .start(BUZZER_FREQUENCY_HZ, BUZZER_DUTY_CYCLE)
            .map_err(|e| ActuatorError::Buzzer(e.kind()))
    }

    fn silence(&mut self) -> Result<(), ActuatorError> {
        self.show_idle()
    }

    fn button_pressed(&mut self) -> Result<bool, ActuatorError> {
        self.button
            .is_low()
            .map_err(|e| ActuatorError::Button(e.kind()))
    }

    fn de_energize(&mut self) -> Result<(), ActuatorError> {
        // Attempt every output even if an earlier one fails
        let buzzer = self.stop_buzzer();
        let red = self.set_red(false);
        let green = self.set_green(false);
        buzzer.and(red).and(green)
    }
}

impl<RED, GREEN, BUZ, BUTTON> Drop for AlarmActuator<RED, GREEN, BUZ, BUTTON>
where
    RED: OutputPin,
    GREEN: OutputPin,
    BUZ: Buzzer,
    BUTTON: InputPin,
{
    fn drop(&mut self) {
        if let Err(e) = self.de_energize() {
            warn!("Failed to de-energize alarm outputs: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBuzzer, SimButton, SimLed};

    type Rig = AlarmActuator<SimLed, SimLed, SimBuzzer, SimButton>;

    fn rig() -> (Rig, SimLed, SimLed, SimBuzzer, SimButton) {
        let red = SimLed::new();
        let green = SimLed::new();
        let buzzer = SimBuzzer::new();
        let button = SimButton::new();
        let actuator = AlarmActuator::new(red.clone(), green.clone(), buzzer.clone(), button.clone());
        (actuator, red, green, buzzer, button)
    }

    #[test]
    fn raise_drives_red_and_buzzer() {
        let (mut actuator, red, green, buzzer, _) = rig();
        actuator.show_idle().unwrap();
        actuator.raise().unwrap();
        assert!(red.is_on());
        assert!(!green.is_on());
        assert_eq!(buzzer.tone(), Some((440.0, 0.5)));
    }

    #[test]
    fn silence_restores_idle_indicator() {
        let (mut actuator, red, green, buzzer, _) = rig();
        actuator.raise().unwrap();
        actuator.silence().unwrap();
        assert!(!red.is_on());
        assert!(green.is_on());
        assert!(!buzzer.is_sounding());
    }

    #[test]
    fn button_reads_pressed_when_low() {
        let (mut actuator, _, _, _, button) = rig();
        assert!(!actuator.button_pressed().unwrap());
        button.press();
        assert!(actuator.button_pressed().unwrap());
        button.release();
        assert!(!actuator.button_pressed().unwrap());
    }

    #[test]
    fn drop_turns_everything_off() {
        let (mut actuator, red, green, buzzer, _) = rig();
        actuator.raise().unwrap();
        drop(actuator);
        assert!(!red.is_on());
        assert!(!green.is_on());
        assert!(!buzzer.is_sounding());
    }
}
