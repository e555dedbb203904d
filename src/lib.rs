//! # Trash Monitor Core Library
//!
//! A fill-level monitor for a trash receptacle on a Raspberry Pi: an HC-SR04
//! ultrasonic sensor under the lid measures the distance to the trash surface,
//! a 16x2 character LCD on the I2C bus shows the fill percentage, and a red
//! LED plus buzzer sound when the bin is full until the button is pressed.
//!
//! ## Data Flow
//!
//! One cycle flows strictly one way, with no overlap between cycles:
//!
//! 1. **Ranging** ([`ranging`]): trigger pulse, timed echo, one distance
//! 2. **Sampling** ([`sampling`]): two seconds of pings, averaged
//! 3. **Fill** ([`fill`]): distance to a clamped 0-100 percentage
//! 4. **Monitor** ([`monitor`]): status and countdown on the LCD ([`lcd`]
//!    over [`bus`]), alarm outputs ([`alarm`]) at 100 %
//!
//! ## Hardware Seams
//!
//! Drivers are generic over the embedded-hal digital and I2C traits, the
//! [`alarm::Buzzer`] trait and the [`clock::Clock`] trait. The [`hardware`]
//! module (feature `hardware`, Linux only) binds them to rppal and
//! linux-embedded-hal; [`sim`] binds them to simulated parts for tests and for
//! `--simulate` runs on a desktop.
//!
//! ## Degradation
//!
//! The display is the only non-critical part. A display that fails to
//! initialize or stops acknowledging is switched off and the monitor carries
//! on blind; sensing and the alarm keep working. A sensor that never answers
//! reads as an empty bin.

pub mod alarm;
pub mod bus;
pub mod clock;
pub mod config;
pub mod fill;
#[cfg(all(target_os = "linux", feature = "hardware"))]
pub mod hardware;
pub mod lcd;
pub mod monitor;
pub mod ranging;
pub mod sampling;
pub mod sim;

#[cfg(test)]
mod tests;
