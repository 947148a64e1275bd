//! Encoding of the HD44780 instruction set.
//!
//! Every write to the controller is an [Instruction]: the byte that goes on the data lines, the
//! level of the RS line, and how long the controller is busy afterwards. The constructors here
//! are pure, they only compute bytes. Sending them is up to a [driver](super::driver).

use crate::lcd::hd44780::timing::Execution;
use crate::lcd::hd44780::{LcdError, LcdResult};

/// Highest address accepted by [Instruction::set_cgram_address].
pub const MAX_CGRAM_ADDRESS: u8 = 0b0011_1111;
/// Highest address accepted by [Instruction::set_ddram_address].
pub const MAX_DDRAM_ADDRESS: u8 = 0b0111_1111;

const CLEAR_DISPLAY: u8 = 0b0000_0001;
const RETURN_HOME: u8 = 0b0000_0010;
const ENTRY_MODE_SET: u8 = 0b0000_0100;
const DISPLAY_CONTROL: u8 = 0b0000_1000;
const CURSOR_SHIFT: u8 = 0b0001_0000;
const FUNCTION_SET: u8 = 0b0010_0000;
const SET_CGRAM_ADDRESS: u8 = 0b0100_0000;
const SET_DDRAM_ADDRESS: u8 = 0b1000_0000;

/// Which register of the controller a transfer targets, i.e. the level of the RS line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterSelect {
    /// Instruction register on writes, busy flag and address counter on reads.
    Command,
    /// Data register, i.e. DDRAM or CGRAM depending on the last address set.
    Data,
}

impl RegisterSelect {
    /// Level of the RS line.
    pub fn level(self) -> bool {
        self == RegisterSelect::Data
    }

    /// How long the controller is busy after a read of this register.
    ///
    /// Reading the busy flag does not disturb the controller, reading data moves the address
    /// counter just like a write does.
    pub fn read_execution(self) -> Execution {
        match self {
            RegisterSelect::Command => Execution::Immediate,
            RegisterSelect::Data => Execution::Standard,
        }
    }
}

/// Width of the data bus between the host and the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataLength {
    /// DB4..DB7, each byte sent as two nibbles.
    FourBit,
    /// DB0..DB7.
    EightBit,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}

/// A single write to the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    pub opcode: u8,
    pub register: RegisterSelect,
    pub execution: Execution,
}

impl Instruction {
    const fn command(opcode: u8) -> Self {
        Instruction {
            opcode,
            register: RegisterSelect::Command,
            execution: Execution::Standard,
        }
    }

    /// Clears the DDRAM and returns the cursor home.
    pub const fn clear_display() -> Self {
        Instruction {
            execution: Execution::Extended,
            ..Self::command(CLEAR_DISPLAY)
        }
    }

    /// Returns the cursor and the display shift home. DDRAM is left intact.
    pub const fn return_home() -> Self {
        Instruction {
            execution: Execution::Extended,
            ..Self::command(RETURN_HOME)
        }
    }

    /// Sets where the cursor moves after each data transfer, and whether the display shifts with it.
    pub fn entry_mode(direction: CursorDirection, shift: bool) -> Self {
        let mut opcode = ENTRY_MODE_SET;
        if direction == CursorDirection::Right {
            opcode |= 0b0000_0010;
        }
        if shift {
            opcode |= 0b0000_0001;
        }
        Self::command(opcode)
    }

    pub fn display_control(display_on: bool, cursor_on: bool, blink_on: bool) -> Self {
        let mut opcode = DISPLAY_CONTROL;
        if display_on {
            opcode |= 0b0000_0100;
        }
        if cursor_on {
            opcode |= 0b0000_0010;
        }
        if blink_on {
            opcode |= 0b0000_0001;
        }
        Self::command(opcode)
    }

    /// Moves the cursor, or shifts the whole display if `display_shift` is set, by one position.
    pub fn cursor_shift(display_shift: bool, direction: CursorDirection) -> Self {
        let mut opcode = CURSOR_SHIFT;
        if display_shift {
            opcode |= 0b0000_1000;
        }
        if direction == CursorDirection::Right {
            opcode |= 0b0000_0100;
        }
        Self::command(opcode)
    }

    /// Sets the interface width, the number of display lines and the font.
    ///
    /// The 5x10 font is only available in one-line mode, the controller ignores it otherwise.
    pub fn function_set(data_length: DataLength, two_lines: bool, font_5x10: bool) -> Self {
        let mut opcode = FUNCTION_SET;
        if data_length == DataLength::EightBit {
            opcode |= 0b0001_0000;
        }
        if two_lines {
            opcode |= 0b0000_1000;
        }
        if font_5x10 {
            opcode |= 0b0000_0100;
        }
        Self::command(opcode)
    }

    /// # Errors
    /// - `LcdError::Configuration` if the address is above [MAX_CGRAM_ADDRESS].
    pub fn set_cgram_address(address: u8) -> LcdResult<Self> {
        if address > MAX_CGRAM_ADDRESS {
            return Err(LcdError::Configuration(format!(
                "CGRAM address {:#04x} out of range",
                address
            )));
        }
        Ok(Self::command(SET_CGRAM_ADDRESS | address))
    }

    /// # Errors
    /// - `LcdError::Configuration` if the address is above [MAX_DDRAM_ADDRESS].
    pub fn set_ddram_address(address: u8) -> LcdResult<Self> {
        if address > MAX_DDRAM_ADDRESS {
            return Err(LcdError::Configuration(format!(
                "DDRAM address {:#04x} out of range",
                address
            )));
        }
        Ok(Self::command(SET_DDRAM_ADDRESS | address))
    }

    /// Writes a byte to DDRAM or CGRAM, whichever was addressed last.
    pub const fn write_data(byte: u8) -> Self {
        Instruction {
            opcode: byte,
            register: RegisterSelect::Data,
            execution: Execution::Standard,
        }
    }
}

/// Decoded content of the status register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusReadout {
    /// The controller is still executing the previous instruction.
    pub busy: bool,
    /// Current DDRAM or CGRAM address, depending on which one was set last.
    pub address_counter: u8,
}

impl StatusReadout {
    pub fn from_raw(raw: u8) -> Self {
        StatusReadout {
            busy: raw & 0b1000_0000 != 0,
            address_counter: raw & 0b0111_1111,
        }
    }
}
