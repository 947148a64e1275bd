//! HD44780 character LCD controller.
//!
//! The controller is reached through one of three transports, each implementing
//! [HD44780Bus](bus::HD44780Bus):
//! - [GpioHD44780Bus](bus::GpioHD44780Bus) with either 4 or 8 data lines wired to GPIO,
//! - [I2cHD44780Bus](bus::I2cHD44780Bus) for the common PCF8574 "backpack" modules.
//!
//! On top of a bus, [BusHD44780Driver](driver::BusHD44780Driver) sends encoded
//! [instructions](instruction::Instruction) and takes care of the execution times from the
//! [timing policy](timing::TimingPolicy), optionally polling the busy flag instead. Upper layers
//! only see the [HD44780Driver](driver::HD44780Driver) trait, so the
//! [CharacterDisplay](display::CharacterDisplay) works the same on every transport.
//!
//! # Layers
//! ```text
//! CharacterDisplay        cursor, text, custom glyphs
//!   HD44780Driver         one method per instruction
//!     Instruction         opcode, RS, execution class
//!     HD44780Bus          RS/RW/E handshake, nibbles, power-on reset
//!       GpioOutput/GpioBus or I2cBus
//! ```

pub mod bus;
pub mod display;
pub mod driver;
pub mod instruction;
pub mod timing;

use crate::GpioError;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    /// The display or one of its parameters is set up in a way that cannot work.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The transport cannot perform the operation, e.g. reading on a write-only backpack.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Gpio(#[from] GpioError),
}

pub type LcdResult<T> = Result<T, LcdError>;
