//! Transports between the host and the controller.
//!
//! A bus only knows about the handshake on the RS/RW/E lines. It does not know what the bytes
//! mean, and it does not decide how long to wait after a transfer: the caller passes the trailing
//! delay with every transfer.

mod expander;
mod gpio;

use std::fmt::Debug;
use std::time::Duration;
use log::debug;
use crate::lcd::hd44780::instruction::{DataLength, RegisterSelect};
use crate::lcd::hd44780::timing::{
    TimingPolicy, INTER_NIBBLE_GAP, POWER_ON_WAIT, RESET_WAIT_FIRST, RESET_WAIT_SECOND,
};
use crate::lcd::hd44780::LcdResult;
pub use expander::*;
pub use gpio::*;

/// Function set with 8-bit interface, as sent during the power-on reset. Only the upper nibble
/// is seen by the controller at that point.
const RESET_NIBBLE: u8 = 0b0011;
/// Function set with 4-bit interface, upper nibble.
const FOUR_BIT_NIBBLE: u8 = 0b0010;

pub trait HD44780Bus: Debug {
    /// Width of the interface this bus talks to the controller with.
    fn data_length(&self) -> DataLength;

    /// Whether the controller can be read through this bus. Reads fail if it can't.
    fn can_read(&self) -> bool;

    /// Transfers `nibble` on DB4..DB7 with a single enable pulse, then waits `delay_after`.
    ///
    /// On an 8-bit bus, DB0..DB3 are driven low.
    fn write_nibble(&mut self, register: RegisterSelect, nibble: u8, delay_after: Duration) -> LcdResult<()>;

    /// Reads DB4..DB7 with a single enable pulse, then waits `delay_after`.
    fn read_nibble(&mut self, register: RegisterSelect, delay_after: Duration) -> LcdResult<u8>;

    /// Transfers a full byte, then waits `delay_after`.
    fn write_byte(&mut self, register: RegisterSelect, byte: u8, delay_after: Duration) -> LcdResult<()>;

    /// Reads a full byte, then waits `delay_after`.
    fn read_byte(&mut self, register: RegisterSelect, delay_after: Duration) -> LcdResult<u8>;

    /// Blocks for `duration` using the delay the bus was built with.
    fn delay(&mut self, duration: Duration);

    /// Resets the controller by instruction and leaves it in the interface width of this bus.
    ///
    /// This is needed whenever the supply does not meet the conditions for the internal reset
    /// circuit, which is the case with most modules out there. Display, cursor and entry mode
    /// are left in their reset state, so a function set has to follow.
    fn init_manually(&mut self, timing: &TimingPolicy) -> LcdResult<()> {
        power_on_reset(self, timing)
    }
}

impl<B: HD44780Bus + ?Sized> HD44780Bus for &mut B {
    fn data_length(&self) -> DataLength {
        (**self).data_length()
    }

    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn write_nibble(&mut self, register: RegisterSelect, nibble: u8, delay_after: Duration) -> LcdResult<()> {
        (**self).write_nibble(register, nibble, delay_after)
    }

    fn read_nibble(&mut self, register: RegisterSelect, delay_after: Duration) -> LcdResult<u8> {
        (**self).read_nibble(register, delay_after)
    }

    fn write_byte(&mut self, register: RegisterSelect, byte: u8, delay_after: Duration) -> LcdResult<()> {
        (**self).write_byte(register, byte, delay_after)
    }

    fn read_byte(&mut self, register: RegisterSelect, delay_after: Duration) -> LcdResult<u8> {
        (**self).read_byte(register, delay_after)
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration);
    }

    fn init_manually(&mut self, timing: &TimingPolicy) -> LcdResult<()> {
        (**self).init_manually(timing)
    }
}

/// The reset sequence from the datasheet (figures 23 and 24).
///
/// Three writes of `0011` bring the controller into 8-bit mode no matter which state, or which
/// half of a 4-bit transfer, it was in. A 4-bit bus then commits its width with `0010`.
pub fn power_on_reset<B: HD44780Bus + ?Sized>(bus: &mut B, timing: &TimingPolicy) -> LcdResult<()> {
    debug!("Resetting HD44780 by instruction ({:?})", bus.data_length());

    bus.delay(POWER_ON_WAIT);
    bus.write_nibble(RegisterSelect::Command, RESET_NIBBLE, RESET_WAIT_FIRST)?;
    bus.write_nibble(RegisterSelect::Command, RESET_NIBBLE, RESET_WAIT_SECOND)?;
    bus.write_nibble(RegisterSelect::Command, RESET_NIBBLE, timing.standard_exec())?;

    if bus.data_length() == DataLength::FourBit {
        bus.write_nibble(RegisterSelect::Command, FOUR_BIT_NIBBLE, timing.standard_exec())?;
    }
    Ok(())
}

/// Sends a byte as two nibbles, high nibble first.
pub(crate) fn write_split<B: HD44780Bus + ?Sized>(
    bus: &mut B,
    register: RegisterSelect,
    byte: u8,
    delay_after: Duration,
) -> LcdResult<()> {
    bus.write_nibble(register, byte >> 4, INTER_NIBBLE_GAP)?;
    bus.write_nibble(register, byte & 0x0F, delay_after)
}

/// Reads a byte as two nibbles, high nibble first.
pub(crate) fn read_split<B: HD44780Bus + ?Sized>(
    bus: &mut B,
    register: RegisterSelect,
    delay_after: Duration,
) -> LcdResult<u8> {
    let high = bus.read_nibble(register, INTER_NIBBLE_GAP)?;
    let low = bus.read_nibble(register, delay_after)?;
    Ok((high << 4) | low)
}
