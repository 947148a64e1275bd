mod transport;

use crate::lcd::hd44780::instruction::{DataLength, Instruction, StatusReadout};
use crate::lcd::hd44780::LcdResult;
use std::fmt::Debug;
pub use crate::lcd::hd44780::instruction::CursorDirection;
pub use transport::*;

/// One method per controller instruction.
///
/// Implementors only provide the raw transfers, everything else is encoded by the provided
/// methods through [Instruction].
pub trait HD44780Driver: Debug {
    /// Resets the controller and brings it to a known state: display on, cursor and blink off,
    /// cursor moving right, DDRAM cleared.
    fn init(&mut self, two_lines: bool, font_5x10: bool) -> LcdResult<()>;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> LcdResult<()> {
        self.execute(Instruction::clear_display())
    }

    /// Sets the cursor to the home position.
    fn return_home(&mut self) -> LcdResult<()> {
        self.execute(Instruction::return_home())
    }

    /// Sets the display to the specified entry mode.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> LcdResult<()> {
        self.execute(Instruction::entry_mode(cursor_direction, shift))
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(&mut self, display_on: bool, cursor_on: bool, blink_on: bool) -> LcdResult<()> {
        self.execute(Instruction::display_control(display_on, cursor_on, blink_on))
    }

    /// Moves the cursor or shifts the display.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> LcdResult<()> {
        self.execute(Instruction::cursor_shift(display_shift, direction))
    }

    fn function_set(&mut self, data_length: DataLength, two_lines: bool, font_5x10: bool) -> LcdResult<()> {
        self.execute(Instruction::function_set(data_length, two_lines, font_5x10))
    }

    fn set_cgram_address(&mut self, address: u8) -> LcdResult<()> {
        self.execute(Instruction::set_cgram_address(address)?)
    }

    fn set_ddram_address(&mut self, address: u8) -> LcdResult<()> {
        self.execute(Instruction::set_ddram_address(address)?)
    }

    /// Writes a byte to DDRAM or CGRAM.
    fn send_data(&mut self, data: u8) -> LcdResult<()> {
        self.execute(Instruction::write_data(data))
    }

    /// Reads the busy flag and address counter.
    fn read_status(&mut self) -> LcdResult<StatusReadout> {
        Ok(StatusReadout::from_raw(self.read_command()?))
    }

    // Low-level transfers, used by everything above.

    /// Sends an encoded instruction and waits until the controller is done with it.
    fn execute(&mut self, instruction: Instruction) -> LcdResult<()>;

    /// Reads the busy flag and address counter as a single byte.
    /// For easier usage use [Self::read_status].
    fn read_command(&mut self) -> LcdResult<u8>;

    /// Reads a byte from DDRAM or CGRAM and advances the address counter.
    fn read_data(&mut self) -> LcdResult<u8>;
}
