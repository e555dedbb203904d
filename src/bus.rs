//! # Two-Wire Bus Transport
//!
//! The LCD backpack is a write-only PCF8574 port expander: every transfer is a
//! single byte addressed to one 7-bit bus address. [`BusTransport`] is that
//! primitive and nothing more. No buffering, no retries; a failed write is
//! handed straight back to the display driver.

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use thiserror::Error;

/// Errors reported by a single bus write.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Nobody answered at the address (display unplugged or wrong address)
    #[error("no acknowledge from peripheral at {address:#04x}")]
    NoAcknowledge { address: u8 },

    /// Bus-level failure (arbitration lost, controller unavailable, ...)
    #[error("bus error: {0:?}")]
    Bus(ErrorKind),
}

/// Single-byte write to an addressed peripheral on a shared bus.
pub trait BusTransport {
    fn write_byte(&mut self, address: u8, value: u8) -> Result<(), TransportError>;
}

/// Adapts any embedded-hal I2C controller to [`BusTransport`].
pub struct HalBus<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> HalBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Give back the wrapped controller.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> BusTransport for HalBus<I2C> {
    fn write_byte(&mut self, address: u8, value: u8) -> Result<(), TransportError> {
        self.i2c
            .write(address, &[value])
            .map_err(|e| match e.kind() {
                ErrorKind::NoAcknowledge(_) => TransportError::NoAcknowledge { address },
                kind => TransportError::Bus(kind),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorType, NoAcknowledgeSource, Operation};

    /// Minimal I2C controller that only acknowledges one address.
    struct FakeI2c {
        present: u8,
        written: Vec<(u8, Vec<u8>)>,
        fail_with: Option<ErrorKind>,
    }

    impl ErrorType for FakeI2c {
        type Error = ErrorKind;
    }

    impl I2c for FakeI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if let Some(kind) = self.fail_with {
                return Err(kind);
            }
            if address != self.present {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations {
                if let Operation::Write(bytes) = op {
                    self.written.push((address, bytes.to_vec()));
                }
            }
            Ok(())
        }
    }

    fn fake(present: u8) -> FakeI2c {
        FakeI2c {
            present,
            written: Vec::new(),
            fail_with: None,
        }
    }

    #[test]
    fn writes_exactly_one_byte() {
        let mut bus = HalBus::new(fake(0x27));
        bus.write_byte(0x27, 0xA5).unwrap();
        let i2c = bus.release();
        assert_eq!(i2c.written, vec![(0x27, vec![0xA5])]);
    }

    #[test]
    fn missing_peripheral_is_no_acknowledge() {
        let mut bus = HalBus::new(fake(0x27));
        let err = bus.write_byte(0x3F, 0x00).unwrap_err();
        assert_eq!(err, TransportError::NoAcknowledge { address: 0x3F });
    }

    #[test]
    fn other_failures_keep_their_kind() {
        let mut i2c = fake(0x27);
        i2c.fail_with = Some(ErrorKind::ArbitrationLoss);
        let mut bus = HalBus::new(i2c);
        assert_eq!(
            bus.write_byte(0x27, 0x08),
            Err(TransportError::Bus(ErrorKind::ArbitrationLoss))
        );
    }
}
