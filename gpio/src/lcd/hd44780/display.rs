//! Text display on top of a [HD44780Driver].
//!
//! The controller has 80 bytes of DDRAM, laid out as two rows of 40. Row 0 starts at address
//! `0x00`, row 1 at `0x40`. A 16x2 module shows the first 16 bytes of each row, a 20x2 the first
//! 20, and so on; the rest can be brought in by scrolling the display.
//!
//! The driver does not know where the cursor is, so [CharacterDisplay] keeps track of it
//! itself. This works as long as every operation goes through it.

use log::warn;
use crate::lcd::hd44780::driver::{CursorDirection, HD44780Driver};
use crate::lcd::hd44780::{LcdError, LcdResult};

/// Number of rows in DDRAM.
pub const ROWS: u8 = 2;
/// Bytes per row in DDRAM, visible or not.
pub const ROW_LENGTH: u8 = 40;
/// Number of user-definable glyphs in CGRAM.
pub const GLYPH_COUNT: u8 = 8;

const DDRAM_LENGTH: u8 = ROWS * ROW_LENGTH;
const ROW_ADDRESS: [u8; ROWS as usize] = [0x00, 0x40];

/// What the display layer knows about the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DriverState {
    /// Cursor position, `row * 40 + column`.
    pub cursor_offset: u8,
    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
}

impl Default for DriverState {
    fn default() -> Self {
        DriverState {
            cursor_offset: 0,
            display_on: true,
            cursor_on: false,
            blink_on: false,
        }
    }
}

/// Maps a character to the controller's ROM (A00, the Japanese variant).
///
/// Printable ASCII is mostly the same, except `\` and `~`, whose codes hold `¥` and `→`.
pub fn encode_char(c: char) -> Option<u8> {
    match c {
        ' '..='[' | ']'..='}' => Some(c as u8),
        '¥' => Some(0x5C),
        '→' => Some(0x7E),
        '←' => Some(0x7F),
        _ => None,
    }
}

#[derive(Debug)]
pub struct CharacterDisplay<'a> {
    driver: &'a mut dyn HD44780Driver,
    state: DriverState,
    display_offset: u8,
    direction: CursorDirection,
    columns: u8,
    wrap: bool,
}

impl<'a> CharacterDisplay<'a> {
    /// Visible columns assumed by [CharacterDisplay::new].
    pub const DEFAULT_COLUMNS: u8 = 16;

    /// Wraps an already initialized driver, or one to be initialized with
    /// [CharacterDisplay::init]. Nothing is sent to the controller.
    pub fn new(driver: &'a mut dyn HD44780Driver) -> Self {
        CharacterDisplay {
            driver,
            state: DriverState::default(),
            display_offset: 0,
            direction: CursorDirection::Right,
            columns: Self::DEFAULT_COLUMNS,
            wrap: false,
        }
    }

    /// Sets the number of visible columns, used for wrapping.
    ///
    /// # Errors
    /// - `LcdError::Configuration` if `columns` is zero or more than a DDRAM row holds.
    pub fn with_columns(mut self, columns: u8) -> LcdResult<Self> {
        if columns == 0 || columns > ROW_LENGTH {
            return Err(LcdError::Configuration(format!("cannot show {} columns", columns)));
        }
        self.columns = columns;
        Ok(self)
    }

    /// Continues printing on the second row once the first one is full.
    pub fn with_wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Current cursor position as `(row, column)`.
    pub fn cursor(&self) -> (u8, u8) {
        (self.state.cursor_offset / ROW_LENGTH, self.state.cursor_offset % ROW_LENGTH)
    }

    /// How many positions the display has been scrolled to the right, modulo the row length.
    pub fn display_offset(&self) -> u8 {
        self.display_offset
    }

    /// Initializes the controller for two lines and the 5x8 font.
    pub fn init(&mut self) -> LcdResult<()> {
        self.driver.init(true, false)?;
        self.state = DriverState::default();
        self.display_offset = 0;
        self.direction = CursorDirection::Right;
        Ok(())
    }

    /// Clears the display and returns the cursor home.
    ///
    /// The tracked state goes back to its defaults: display on, cursor and blink off. The
    /// controller keeps its display control bits across a clear, so they are sent again.
    pub fn clear(&mut self) -> LcdResult<()> {
        self.driver.clear_display()?;
        self.state = DriverState::default();
        self.display_offset = 0;
        self.apply_display_control()
    }

    /// Returns the cursor home and undoes any scrolling.
    pub fn home(&mut self) -> LcdResult<()> {
        self.driver.return_home()?;
        self.state.cursor_offset = 0;
        self.display_offset = 0;
        Ok(())
    }

    fn apply_display_control(&mut self) -> LcdResult<()> {
        let DriverState { display_on, cursor_on, blink_on, .. } = self.state;
        self.driver.set_display_control(display_on, cursor_on, blink_on)
    }

    /// Turns the whole display on or off. The contents are kept, and so is the backlight.
    pub fn set_display(&mut self, on: bool) -> LcdResult<()> {
        self.state.display_on = on;
        self.apply_display_control()
    }

    pub fn set_cursor_visible(&mut self, on: bool) -> LcdResult<()> {
        self.state.cursor_on = on;
        self.apply_display_control()
    }

    pub fn set_blink(&mut self, on: bool) -> LcdResult<()> {
        self.state.blink_on = on;
        self.apply_display_control()
    }

    pub fn toggle_display(&mut self) -> LcdResult<()> {
        self.set_display(!self.state.display_on)
    }

    pub fn toggle_cursor_visible(&mut self) -> LcdResult<()> {
        self.set_cursor_visible(!self.state.cursor_on)
    }

    pub fn toggle_blink(&mut self) -> LcdResult<()> {
        self.set_blink(!self.state.blink_on)
    }

    /// # Errors
    /// - `LcdError::Configuration` if the position is outside DDRAM.
    pub fn move_to(&mut self, row: u8, col: u8) -> LcdResult<()> {
        if row >= ROWS || col >= ROW_LENGTH {
            return Err(LcdError::Configuration(format!("no position at row {}, column {}", row, col)));
        }
        self.driver.set_ddram_address(ROW_ADDRESS[row as usize] + col)?;
        self.state.cursor_offset = row * ROW_LENGTH + col;
        Ok(())
    }

    /// Moves the cursor back by one. From the start of DDRAM it goes to the end, as on the
    /// controller.
    pub fn cursor_left(&mut self) -> LcdResult<()> {
        self.driver.cursor_shift(false, CursorDirection::Left)?;
        self.step(CursorDirection::Left);
        Ok(())
    }

    pub fn cursor_right(&mut self) -> LcdResult<()> {
        self.driver.cursor_shift(false, CursorDirection::Right)?;
        self.step(CursorDirection::Right);
        self.wrap_if_needed()
    }

    pub fn cursor_up(&mut self) -> LcdResult<()> {
        let (_, col) = self.cursor();
        self.move_to(0, col)
    }

    pub fn cursor_down(&mut self) -> LcdResult<()> {
        let (_, col) = self.cursor();
        self.move_to(ROWS - 1, col)
    }

    /// Shifts the contents one position to the left, the cursor moves along.
    pub fn scroll_left(&mut self) -> LcdResult<()> {
        self.driver.cursor_shift(true, CursorDirection::Left)?;
        self.display_offset = (self.display_offset + ROW_LENGTH - 1) % ROW_LENGTH;
        Ok(())
    }

    pub fn scroll_right(&mut self) -> LcdResult<()> {
        self.driver.cursor_shift(true, CursorDirection::Right)?;
        self.display_offset = (self.display_offset + 1) % ROW_LENGTH;
        Ok(())
    }

    /// Sets where the cursor goes after each character, and whether the display follows it.
    pub fn set_entry_mode(&mut self, direction: CursorDirection, shift: bool) -> LcdResult<()> {
        self.driver.set_entry_mode(direction, shift)?;
        self.direction = direction;
        Ok(())
    }

    /// Prints a string at the cursor.
    ///
    /// Characters with no glyph in the ROM are printed as `?`.
    pub fn print(&mut self, s: &str) -> LcdResult<()> {
        for c in s.chars() {
            let code = encode_char(c).unwrap_or_else(|| {
                warn!("No glyph for character {:?}", c);
                b'?'
            });
            self.print_code(code)?;
        }
        Ok(())
    }

    /// Prints a raw character code, e.g. one from the upper half of the ROM.
    pub fn print_code(&mut self, code: u8) -> LcdResult<()> {
        self.driver.send_data(code)?;
        self.step(self.direction);
        self.wrap_if_needed()
    }

    /// Uploads a custom glyph. Only the lower 5 bits of each row are used.
    ///
    /// The cursor is put back where it was, so printing can continue right away.
    ///
    /// # Errors
    /// - `LcdError::Configuration` if `index` is not below [GLYPH_COUNT].
    pub fn define_glyph(&mut self, index: u8, rows: &[u8; 8]) -> LcdResult<()> {
        if index >= GLYPH_COUNT {
            return Err(LcdError::Configuration(format!("glyph index {} out of range", index)));
        }

        self.driver.set_cgram_address(index * 8)?;
        for row in rows {
            self.driver.send_data(row & 0b1_1111)?;
        }

        let (row, col) = self.cursor();
        self.move_to(row, col)
    }

    /// # Errors
    /// - `LcdError::Configuration` if `index` is not below [GLYPH_COUNT].
    pub fn print_glyph(&mut self, index: u8) -> LcdResult<()> {
        if index >= GLYPH_COUNT {
            return Err(LcdError::Configuration(format!("glyph index {} out of range", index)));
        }
        self.print_code(index)
    }

    pub fn is_busy(&mut self) -> LcdResult<bool> {
        Ok(self.driver.read_status()?.busy)
    }

    pub fn address_counter(&mut self) -> LcdResult<u8> {
        Ok(self.driver.read_status()?.address_counter)
    }

    /// Reads the character under the cursor. The cursor advances like it does on a write.
    pub fn read_ram(&mut self) -> LcdResult<u8> {
        let byte = self.driver.read_data()?;
        self.step(self.direction);
        Ok(byte)
    }

    fn step(&mut self, direction: CursorDirection) {
        let offset = self.state.cursor_offset;
        self.state.cursor_offset = match direction {
            CursorDirection::Right => (offset + 1) % DDRAM_LENGTH,
            CursorDirection::Left => (offset + DDRAM_LENGTH - 1) % DDRAM_LENGTH,
        };
    }

    fn wrap_if_needed(&mut self) -> LcdResult<()> {
        if self.wrap && self.state.cursor_offset == self.columns {
            self.move_to(1, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::instruction::Instruction;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct RecordingDriver {
        inits: Vec<(bool, bool)>,
        sent: Vec<Instruction>,
        reads: VecDeque<u8>,
    }

    impl RecordingDriver {
        fn opcodes(&self) -> Vec<u8> {
            self.sent.iter().map(|i| i.opcode).collect()
        }
    }

    impl HD44780Driver for RecordingDriver {
        fn init(&mut self, two_lines: bool, font_5x10: bool) -> LcdResult<()> {
            self.inits.push((two_lines, font_5x10));
            Ok(())
        }

        fn execute(&mut self, instruction: Instruction) -> LcdResult<()> {
            self.sent.push(instruction);
            Ok(())
        }

        fn read_command(&mut self) -> LcdResult<u8> {
            Ok(self.reads.pop_front().unwrap_or(0))
        }

        fn read_data(&mut self) -> LcdResult<u8> {
            Ok(self.reads.pop_front().unwrap_or(0))
        }
    }

    #[test]
    fn init_starts_from_defaults() {
        let mut driver = RecordingDriver::default();
        let mut display = CharacterDisplay::new(&mut driver);
        display.move_to(1, 3).unwrap();
        display.init().unwrap();

        assert_eq!(*display.state(), DriverState::default());
        drop(display);
        assert_eq!(driver.inits, vec![(true, false)]);
    }

    #[test]
    fn move_to_addresses_both_rows() {
        let mut driver = RecordingDriver::default();
        let mut display = CharacterDisplay::new(&mut driver);
        display.move_to(0, 5).unwrap();
        display.move_to(1, 39).unwrap();
        assert_eq!(display.cursor(), (1, 39));
        assert_eq!(display.state().cursor_offset, 79);

        assert!(matches!(display.move_to(2, 0), Err(LcdError::Configuration(_))));
        assert!(matches!(display.move_to(0, 40), Err(LcdError::Configuration(_))));
        drop(display);
        assert_eq!(driver.opcodes(), vec![0x85, 0xC0 | 39]);
    }

    #[test]
    fn print_translates_characters() {
        let mut driver = RecordingDriver::default();
        let mut display = CharacterDisplay::new(&mut driver);
        display.print("A\\¥→←~").unwrap();
        assert_eq!(display.cursor(), (0, 6));
        drop(display);
        assert_eq!(driver.opcodes(), vec![b'A', b'?', 0x5C, 0x7E, 0x7F, b'?']);
    }

    #[test]
    fn print_wraps_at_the_visible_width() {
        let mut driver = RecordingDriver::default();
        let mut display = CharacterDisplay::new(&mut driver)
            .with_columns(4)
            .unwrap()
            .with_wrap(true);
        display.print("abcdef").unwrap();
        assert_eq!(display.cursor(), (1, 2));
        drop(display);
        assert_eq!(driver.opcodes(), vec![b'a', b'b', b'c', b'd', 0xC0, b'e', b'f']);
    }

    #[test]
    fn clear_resets_state_and_display_control() {
        let mut driver = RecordingDriver::default();
        let mut display = CharacterDisplay::new(&mut driver);
        display.set_cursor_visible(true).unwrap();
        display.set_blink(true).unwrap();
        display.set_display(false).unwrap();
        display.print("hi").unwrap();
        display.scroll_right().unwrap();
        display.clear().unwrap();

        assert_eq!(*display.state(), DriverState::default());
        assert_eq!(display.display_offset(), 0);
        drop(display);
        assert_eq!(driver.opcodes(), vec![0x0E, 0x0F, 0x0B, b'h', b'i', 0x1C, 0x01, 0x0C]);
    }

    #[test]
    fn toggles_flip_one_flag_each() {
        let mut driver = RecordingDriver::default();
        let mut display = CharacterDisplay::new(&mut driver);
        display.toggle_cursor_visible().unwrap();
        display.toggle_blink().unwrap();
        display.toggle_display().unwrap();
        display.toggle_cursor_visible().unwrap();
        display.toggle_display().unwrap();

        assert_eq!(
            *display.state(),
            DriverState { cursor_offset: 0, display_on: true, cursor_on: false, blink_on: true }
        );
        drop(display);
        assert_eq!(driver.opcodes(), vec![0x0E, 0x0F, 0x0B, 0x09, 0x0D]);
    }

    #[test]
    fn cursor_moves_wrap_like_the_controller() {
        let mut driver = RecordingDriver::default();
        let mut display = CharacterDisplay::new(&mut driver);
        display.cursor_left().unwrap();
        assert_eq!(display.cursor(), (1, 39));
        display.cursor_right().unwrap();
        assert_eq!(display.cursor(), (0, 0));

        display.move_to(0, 7).unwrap();
        display.cursor_down().unwrap();
        assert_eq!(display.cursor(), (1, 7));
        display.cursor_up().unwrap();
        assert_eq!(display.cursor(), (0, 7));
        drop(display);
        assert_eq!(driver.opcodes(), vec![0x10, 0x14, 0x87, 0xC7, 0x87]);
    }

    #[test]
    fn left_entry_mode_moves_the_cursor_backwards() {
        let mut driver = RecordingDriver::default();
        let mut display = CharacterDisplay::new(&mut driver);
        display.move_to(0, 10).unwrap();
        display.set_entry_mode(CursorDirection::Left, false).unwrap();
        display.print("ab").unwrap();
        assert_eq!(display.cursor(), (0, 8));
    }

    #[test]
    fn glyph_upload_targets_its_cgram_slot_and_restores_the_cursor() {
        let mut driver = RecordingDriver::default();
        let mut display = CharacterDisplay::new(&mut driver);
        display.move_to(1, 2).unwrap();
        display.define_glyph(3, &[0xFF, 0, 0, 0, 0, 0, 0, 0x11]).unwrap();
        display.print_glyph(3).unwrap();
        assert!(matches!(display.define_glyph(8, &[0; 8]), Err(LcdError::Configuration(_))));
        assert!(matches!(display.print_glyph(8), Err(LcdError::Configuration(_))));
        drop(display);

        assert_eq!(
            driver.opcodes(),
            vec![0xC2, 0x40 | 24, 0x1F, 0, 0, 0, 0, 0, 0, 0x11, 0xC2, 3]
        );
    }

    #[test]
    fn status_and_ram_reads() {
        let mut driver = RecordingDriver::default();
        driver.reads.extend([0x80, 0x45, b'z']);
        let mut display = CharacterDisplay::new(&mut driver);

        assert!(display.is_busy().unwrap());
        assert_eq!(display.address_counter().unwrap(), 0x45);
        assert_eq!(display.read_ram().unwrap(), b'z');
        assert_eq!(display.cursor(), (0, 1));
    }

    #[test]
    fn unusable_widths_are_rejected() {
        let mut driver = RecordingDriver::default();
        assert!(CharacterDisplay::new(&mut driver).with_columns(0).is_err());
        assert!(CharacterDisplay::new(&mut driver).with_columns(41).is_err());
        assert!(CharacterDisplay::new(&mut driver).with_columns(40).is_ok());
    }
}
