//! # Ultrasonic Rangefinder (HC-SR04)
//!
//! One sample is one trigger/echo handshake:
//!
//! 1. Drive the trigger low and hold it briefly so the module sees a clean edge
//! 2. Pulse the trigger high for 10 µs
//! 3. Poll the echo line until it rises, timestamp it
//! 4. Poll until it falls, timestamp it
//!
//! The echo high time is the round trip of the ping, so
//! `distance = elapsed × speed of sound ÷ 2`.
//!
//! Both edge waits are bounded by [`ECHO_TIMEOUT`] on the monotonic clock. A
//! disconnected sensor or a surface out of range yields
//! [`SensorError::Timeout`] instead of hanging the monitor.

use std::fmt;
use std::time::Duration;

use embedded_hal::digital::{Error as _, ErrorKind, InputPin, OutputPin};
use thiserror::Error;

use crate::clock::Clock;

/// Speed of sound used for the conversion, in cm/s
pub const SPEED_OF_SOUND_CM_PER_S: f64 = 34_000.0;
/// Low hold before the trigger pulse
pub const TRIGGER_SETTLE: Duration = Duration::from_micros(2);
/// Trigger pulse width
pub const TRIGGER_PULSE: Duration = Duration::from_micros(10);
/// Upper bound on each echo edge wait. The HC-SR04 drops its echo after ~38 ms
/// when nothing reflects.
pub const ECHO_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => write!(f, "rising"),
            Edge::Falling => write!(f, "falling"),
        }
    }
}

/// Errors from a single ranging attempt
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The echo edge never arrived
    #[error("timed out waiting for {0} echo edge")]
    Timeout(Edge),

    /// The trigger pin rejected a write
    #[error("trigger pin error: {0:?}")]
    Trigger(ErrorKind),

    /// The echo pin could not be read
    #[error("echo pin error: {0:?}")]
    Echo(ErrorKind),
}

/// Anything that yields one distance sample in centimeters per call.
pub trait DistanceSensor {
    fn sample(&mut self) -> Result<f64, SensorError>;
}

/// Convert an echo pulse width to a one-way distance in centimeters.
pub fn echo_to_distance_cm(echo: Duration) -> f64 {
    echo.as_secs_f64() * SPEED_OF_SOUND_CM_PER_S / 2.0
}

/// HC-SR04 driven by a trigger output and an echo input.
pub struct HcSr04<TRIG, ECHO, CLOCK> {
    trigger: TRIG,
    echo: ECHO,
    clock: CLOCK,
}

impl<TRIG, ECHO, CLOCK> HcSr04<TRIG, ECHO, CLOCK>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    CLOCK: Clock,
{
    pub fn new(trigger: TRIG, echo: ECHO, clock: CLOCK) -> Self {
        Self {
            trigger,
            echo,
            clock,
        }
    }

    fn pulse_trigger(&mut self) -> Result<(), SensorError> {
        let pin_error = |e: TRIG::Error| SensorError::Trigger(e.kind());
        self.trigger.set_low().map_err(pin_error)?;
        self.clock.sleep(TRIGGER_SETTLE);
        self.trigger.set_high().map_err(pin_error)?;
        self.clock.sleep(TRIGGER_PULSE);
        self.trigger.set_low().map_err(pin_error)
    }

    /// Poll until the echo reads `high`, returning the clock reading at that
    /// moment.
    fn wait_for_level(&mut self, high: bool, edge: Edge) -> Result<Duration, SensorError> {
        let began = self.clock.now();
        loop {
            let now = self.clock.now();
            let level = self
                .echo
                .is_high()
                .map_err(|e| SensorError::Echo(e.kind()))?;
            if level == high {
                return Ok(now);
            }
            if now.saturating_sub(began) >= ECHO_TIMEOUT {
                return Err(SensorError::Timeout(edge));
            }
        }
    }
}

impl<TRIG, ECHO, CLOCK> DistanceSensor for HcSr04<TRIG, ECHO, CLOCK>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    CLOCK: Clock,
{
    fn sample(&mut self) -> Result<f64, SensorError> {
        self.pulse_trigger()?;
        let start = self.wait_for_level(true, Edge::Rising)?;
        let end = self.wait_for_level(false, Edge::Falling)?;
        Ok(echo_to_distance_cm(end.saturating_sub(start)))
    }
}
