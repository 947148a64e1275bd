use std::time::Duration;
use log::trace;
use crate::delay::{Delay, StdDelay};
use crate::i2c::{I2cBus, MAX_ADDRESS};
use crate::lcd::hd44780::bus::{power_on_reset, read_split, write_split, HD44780Bus};
use crate::lcd::hd44780::instruction::{DataLength, RegisterSelect};
use crate::lcd::hd44780::timing::{TimingPolicy, EXPANDER_OUTPUT_SETTLE};
use crate::lcd::hd44780::{LcdError, LcdResult};

/// Which expander port bit is wired to which display line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExpanderPinout {
    pub rs: u8,
    pub rw: u8,
    pub e: u8,
    pub backlight: u8,
    /// DB4..DB7, in this order.
    pub data: [u8; 4],
}

impl ExpanderPinout {
    /// The layout used by nearly every PCF8574 backpack sold for these displays.
    pub const PCF8574: ExpanderPinout = ExpanderPinout {
        rs: 0,
        rw: 1,
        e: 2,
        backlight: 3,
        data: [4, 5, 6, 7],
    };

    fn bits(&self) -> [u8; 8] {
        let [db4, db5, db6, db7] = self.data;
        [self.rs, self.rw, self.e, self.backlight, db4, db5, db6, db7]
    }

    /// Checks that every line has its own port bit.
    ///
    /// # Errors
    /// - `LcdError::Configuration` if a bit is out of range or used twice.
    pub fn validate(&self) -> LcdResult<()> {
        let mut used = 0u8;
        for bit in self.bits() {
            if bit > 7 {
                return Err(LcdError::Configuration(format!("expander bit {} out of range", bit)));
            }
            if used & (1 << bit) != 0 {
                return Err(LcdError::Configuration(format!("expander bit {} used twice", bit)));
            }
            used |= 1 << bit;
        }
        Ok(())
    }

    fn mask(bit: u8) -> u8 {
        1 << bit
    }

    fn data_mask(&self) -> u8 {
        self.data.iter().fold(0, |acc, bit| acc | Self::mask(*bit))
    }

    /// Spreads a nibble over the data bits.
    fn encode_nibble(&self, nibble: u8) -> u8 {
        self.data
            .iter()
            .enumerate()
            .filter(|(i, _)| nibble & (1 << i) != 0)
            .fold(0, |acc, (_, bit)| acc | Self::mask(*bit))
    }

    /// Collects the data bits of a port value into a nibble.
    fn decode_nibble(&self, port: u8) -> u8 {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, bit)| port & Self::mask(**bit) != 0)
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }
}

impl Default for ExpanderPinout {
    fn default() -> Self {
        Self::PCF8574
    }
}

/// 4-bit interface through an 8-bit I2C port expander.
///
/// Every line of the display, plus the backlight transistor, is a bit of the expander's output
/// register, so each edge on E costs a full I2C write. Reading relies on the quasi-bidirectional
/// ports of the PCF8574: a port written high can be pulled low by the display. Some clones only
/// have outputs; mark those with [I2cHD44780Bus::write_only].
///
/// The port is sampled after E has fallen. The PCF8574 has no input latch and the display only
/// drives DB4..DB7 while E is high, so a read may see the pull-ups instead of the controller.
/// With busy polling enabled, the busy flag can then read as set every time, and each
/// instruction ends up waiting out the polling budget, which is the fixed worst-case delay.
#[derive(Debug)]
pub struct I2cHD44780Bus<'a, D: Delay = StdDelay> {
    i2c: &'a mut dyn I2cBus,
    address: u8,
    pinout: ExpanderPinout,
    backlight: bool,
    readable: bool,
    delay: D,
}

impl<'a> I2cHD44780Bus<'a, StdDelay> {
    /// Creates a bus for the expander at the 7-bit `address`, with the [ExpanderPinout::PCF8574]
    /// layout and the backlight on.
    ///
    /// # Errors
    /// - `LcdError::Configuration` if the address does not fit in 7 bits.
    pub fn new(i2c: &'a mut dyn I2cBus, address: u8) -> LcdResult<Self> {
        if address > MAX_ADDRESS {
            return Err(LcdError::Configuration(format!(
                "I2C address {:#04x} is not a 7-bit address",
                address
            )));
        }

        Ok(I2cHD44780Bus {
            i2c,
            address,
            pinout: ExpanderPinout::PCF8574,
            backlight: true,
            readable: true,
            delay: StdDelay,
        })
    }
}

impl<'a, D: Delay> I2cHD44780Bus<'a, D> {
    /// # Errors
    /// - `LcdError::Configuration` if the pinout is invalid, see [ExpanderPinout::validate].
    pub fn with_pinout(mut self, pinout: ExpanderPinout) -> LcdResult<Self> {
        pinout.validate()?;
        self.pinout = pinout;
        Ok(self)
    }

    /// Marks the expander as output-only. Reads fail without touching the bus.
    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn with_delay<E: Delay>(self, delay: E) -> I2cHD44780Bus<'a, E> {
        I2cHD44780Bus {
            i2c: self.i2c,
            address: self.address,
            pinout: self.pinout,
            backlight: self.backlight,
            readable: self.readable,
            delay,
        }
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }

    /// Switches the backlight and writes the idle register right away.
    pub fn set_backlight(&mut self, on: bool) -> LcdResult<()> {
        self.backlight = on;
        self.write_port(self.idle())
    }

    /// Port value with only the backlight bit, all control and data lines low.
    fn idle(&self) -> u8 {
        if self.backlight {
            ExpanderPinout::mask(self.pinout.backlight)
        } else {
            0
        }
    }

    fn control(&self, register: RegisterSelect, read: bool) -> u8 {
        let mut port = self.idle();
        if register.level() {
            port |= ExpanderPinout::mask(self.pinout.rs);
        }
        if read {
            port |= ExpanderPinout::mask(self.pinout.rw);
        }
        port
    }

    fn write_port(&mut self, port: u8) -> LcdResult<()> {
        self.i2c.write_byte(self.address, port)?;
        Ok(())
    }

    /// One enable pulse: E high, then E low, both as separate bus writes.
    ///
    /// A bus write takes around 100 µs at standard mode, far more than any setup or pulse width
    /// the controller asks for.
    fn strobe(&mut self, port: u8) -> LcdResult<()> {
        let e = ExpanderPinout::mask(self.pinout.e);
        self.write_port(port | e)?;
        self.write_port(port & !e)
    }
}

impl<D: Delay> HD44780Bus for I2cHD44780Bus<'_, D> {
    fn data_length(&self) -> DataLength {
        DataLength::FourBit
    }

    fn can_read(&self) -> bool {
        self.readable
    }

    fn write_nibble(&mut self, register: RegisterSelect, nibble: u8, delay_after: Duration) -> LcdResult<()> {
        trace!("Writing nibble: {:04b}, RS: {}", nibble & 0x0F, register.level());

        let port = self.control(register, false) | self.pinout.encode_nibble(nibble & 0x0F);
        self.strobe(port)?;
        self.delay.delay(delay_after);
        Ok(())
    }

    fn read_nibble(&mut self, register: RegisterSelect, delay_after: Duration) -> LcdResult<u8> {
        if !self.readable {
            return Err(LcdError::Unsupported("the I/O expander is write-only"));
        }

        // Data bits high so the display can pull them low
        let port = self.control(register, true) | self.pinout.data_mask();
        self.strobe(port)?;
        self.delay.delay(delay_after);
        self.delay.delay(EXPANDER_OUTPUT_SETTLE);

        let nibble = self.pinout.decode_nibble(self.i2c.read_byte(self.address)?);
        trace!("Read nibble: {:04b}, RS: {}", nibble, register.level());
        Ok(nibble)
    }

    fn write_byte(&mut self, register: RegisterSelect, byte: u8, delay_after: Duration) -> LcdResult<()> {
        write_split(self, register, byte, delay_after)
    }

    fn read_byte(&mut self, register: RegisterSelect, delay_after: Duration) -> LcdResult<u8> {
        if !self.readable {
            return Err(LcdError::Unsupported("the I/O expander is write-only"));
        }
        read_split(self, register, delay_after)
    }

    fn delay(&mut self, duration: Duration) {
        self.delay.delay(duration);
    }

    fn init_manually(&mut self, timing: &TimingPolicy) -> LcdResult<()> {
        self.write_port(self.idle())?;
        power_on_reset(self, timing)
    }
}
