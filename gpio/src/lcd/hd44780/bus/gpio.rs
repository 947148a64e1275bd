use std::time::Duration;
use log::trace;
use crate::delay::{Delay, StdDelay};
use crate::lcd::hd44780::bus::{read_split, write_split, HD44780Bus};
use crate::lcd::hd44780::instruction::{DataLength, RegisterSelect};
use crate::lcd::hd44780::timing::{ADDRESS_SETUP, ENABLE_PULSE_WIDTH};
use crate::lcd::hd44780::{LcdError, LcdResult};
use crate::{GpioBus, GpioOutput, GpioResult};

/// The data lines of a parallel interface, either DB4..DB7 or DB0..DB7.
///
/// Index 0 of the bus is the lowest data line.
#[derive(Debug)]
pub enum GpioDataBus<'a> {
    Bus8Bit(&'a mut dyn GpioBus<8>),
    Bus4Bit(&'a mut dyn GpioBus<4>),
}

/// Parallel interface with every controller line on its own GPIO.
///
/// RW is optional. Many modules have it tied to ground, in which case the bus is write-only and
/// every read fails with `LcdError::Configuration`.
#[derive(Debug)]
pub struct GpioHD44780Bus<'a, D: Delay = StdDelay> {
    pin_e: &'a dyn GpioOutput,
    pin_rw: Option<&'a dyn GpioOutput>,
    pin_rs: &'a dyn GpioOutput,
    data_bus: GpioDataBus<'a>,
    delay: D,
}

impl<'a> GpioHD44780Bus<'a, StdDelay> {
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a mut dyn GpioBus<4>,
    ) -> Self {
        GpioHD44780Bus {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioDataBus::Bus4Bit(data_bus),
            delay: StdDelay,
        }
    }

    pub fn new_8bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a mut dyn GpioBus<8>,
    ) -> Self {
        GpioHD44780Bus {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioDataBus::Bus8Bit(data_bus),
            delay: StdDelay,
        }
    }
}

impl<'a, D: Delay> GpioHD44780Bus<'a, D> {
    pub fn with_delay<E: Delay>(self, delay: E) -> GpioHD44780Bus<'a, E> {
        GpioHD44780Bus {
            pin_e: self.pin_e,
            pin_rw: self.pin_rw,
            pin_rs: self.pin_rs,
            data_bus: self.data_bus,
            delay,
        }
    }

    /// Puts RS and RW in place for the next transfer, with E held low.
    fn select(&self, register: RegisterSelect, read: bool) -> GpioResult<()> {
        self.pin_rs.write(register.level())?;
        if let Some(rw) = self.pin_rw {
            rw.write(read)?;
        }
        self.pin_e.write(false)
    }

    fn pulse_e(pin: &dyn GpioOutput, delay: &mut D) -> GpioResult<()> {
        delay.delay(ADDRESS_SETUP);
        pin.write(true)?;
        delay.delay(ENABLE_PULSE_WIDTH);
        pin.write(false)
    }

    /// Drives the data lines and latches them with one enable pulse.
    ///
    /// `value` holds DB0..DB7. A 4-bit bus only gets the upper half.
    fn write_lines(&mut self, register: RegisterSelect, value: u8) -> LcdResult<()> {
        self.select(register, false)?;

        match &mut self.data_bus {
            GpioDataBus::Bus8Bit(bus) => {
                let output = bus.as_output()?;
                output.write_byte(value)?;
                Self::pulse_e(self.pin_e, &mut self.delay)?;
            }
            GpioDataBus::Bus4Bit(bus) => {
                let output = bus.as_output()?;
                output.write_nibble(value >> 4)?;
                Self::pulse_e(self.pin_e, &mut self.delay)?;
            }
        }
        Ok(())
    }

    /// Samples the data lines while E is high.
    ///
    /// Returns DB0..DB7, with DB0..DB3 zero on a 4-bit bus.
    fn read_lines(&mut self, register: RegisterSelect) -> LcdResult<u8> {
        let Some(rw) = self.pin_rw else {
            return Err(LcdError::Configuration("reading requires the RW line".into()));
        };

        let value = match &mut self.data_bus {
            GpioDataBus::Bus8Bit(bus) => {
                let input = bus.as_input()?;
                self.pin_rs.write(register.level())?;
                rw.write(true)?;
                self.pin_e.write(false)?;
                self.delay.delay(ADDRESS_SETUP);

                self.pin_e.write(true)?;
                self.delay.delay(ENABLE_PULSE_WIDTH);
                let value = input.read_byte()?;
                self.pin_e.write(false)?;
                value
            }
            GpioDataBus::Bus4Bit(bus) => {
                let input = bus.as_input()?;
                self.pin_rs.write(register.level())?;
                rw.write(true)?;
                self.pin_e.write(false)?;
                self.delay.delay(ADDRESS_SETUP);

                self.pin_e.write(true)?;
                self.delay.delay(ENABLE_PULSE_WIDTH);
                let value = input.read_nibble()? << 4;
                self.pin_e.write(false)?;
                value
            }
        };

        rw.write(false)?;
        Ok(value)
    }
}

impl<D: Delay> HD44780Bus for GpioHD44780Bus<'_, D> {
    fn data_length(&self) -> DataLength {
        match self.data_bus {
            GpioDataBus::Bus8Bit(_) => DataLength::EightBit,
            GpioDataBus::Bus4Bit(_) => DataLength::FourBit,
        }
    }

    fn can_read(&self) -> bool {
        self.pin_rw.is_some()
    }

    fn write_nibble(&mut self, register: RegisterSelect, nibble: u8, delay_after: Duration) -> LcdResult<()> {
        trace!("Writing nibble: {:04b}, RS: {}", nibble & 0x0F, register.level());

        self.write_lines(register, (nibble & 0x0F) << 4)?;
        self.delay.delay(delay_after);
        Ok(())
    }

    fn read_nibble(&mut self, register: RegisterSelect, delay_after: Duration) -> LcdResult<u8> {
        let nibble = self.read_lines(register)? >> 4;
        self.delay.delay(delay_after);

        trace!("Read nibble: {:04b}, RS: {}", nibble, register.level());
        Ok(nibble)
    }

    fn write_byte(&mut self, register: RegisterSelect, byte: u8, delay_after: Duration) -> LcdResult<()> {
        match self.data_length() {
            DataLength::FourBit => write_split(self, register, byte, delay_after),
            DataLength::EightBit => {
                trace!("Writing byte: {:08b}, RS: {}", byte, register.level());

                self.write_lines(register, byte)?;
                self.delay.delay(delay_after);
                Ok(())
            }
        }
    }

    fn read_byte(&mut self, register: RegisterSelect, delay_after: Duration) -> LcdResult<u8> {
        match self.data_length() {
            DataLength::FourBit => read_split(self, register, delay_after),
            DataLength::EightBit => {
                let byte = self.read_lines(register)?;
                self.delay.delay(delay_after);

                trace!("Read byte: {:08b}, RS: {}", byte, register.level());
                Ok(byte)
            }
        }
    }

    fn delay(&mut self, duration: Duration) {
        self.delay.delay(duration);
    }
}
