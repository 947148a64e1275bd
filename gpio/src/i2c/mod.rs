//! Addressed serial bus (I2C) capability.
//!
//! The display only ever needs single-byte transfers to an I/O expander, so the trait is kept to
//! exactly that. [BitBangI2c] implements it on top of two GPIO lines.

mod bitbang;

use std::fmt::Debug;
use crate::GpioResult;
pub use bitbang::*;

/// Highest valid 7-bit device address.
pub const MAX_ADDRESS: u8 = 0x7F;

pub trait I2cBus: Debug {
    /// Writes a single byte to the device at the 7-bit `address`.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the address does not fit in 7 bits.
    /// - `GpioError::NoAcknowledge` if the device does not acknowledge a byte.
    fn write_byte(&mut self, address: u8, byte: u8) -> GpioResult<()>;

    /// Reads a single byte from the device at the 7-bit `address`.
    ///
    /// # Errors
    /// Same as [I2cBus::write_byte].
    fn read_byte(&mut self, address: u8) -> GpioResult<u8>;
}

impl<B: I2cBus + ?Sized> I2cBus for &mut B {
    fn write_byte(&mut self, address: u8, byte: u8) -> GpioResult<()> {
        (**self).write_byte(address, byte)
    }

    fn read_byte(&mut self, address: u8) -> GpioResult<u8> {
        (**self).read_byte(address)
    }
}
