use std::time::Duration;
use log::trace;
use crate::delay::{Delay, StdDelay};
use crate::i2c::{I2cBus, MAX_ADDRESS};
use crate::{GpioError, GpioOutput, GpioPin, GpioResult};

/// Single-master I2C on two GPIO lines.
///
/// SDA is open-drain emulated: a `0` is driven by requesting the pin as an output and writing
/// low, a `1` is produced by switching the pin to input and letting the pull-up (external, or the
/// pin bias if the backend supports it) raise the line. SCL is driven push-pull, so clock
/// stretching is not supported. That is fine for the PCF8574-style expanders used by display
/// backpacks, which never stretch the clock.
#[derive(Debug)]
pub struct BitBangI2c<'a, D: Delay = StdDelay> {
    sda: &'a mut dyn GpioPin,
    scl: &'a dyn GpioOutput,
    half_period: Duration,
    delay: D,
}

impl<'a> BitBangI2c<'a, StdDelay> {
    /// Half period for standard mode (100 kHz).
    pub const STANDARD_HALF_PERIOD: Duration = Duration::from_micros(5);

    /// Creates a standard-mode bus on the given lines.
    ///
    /// SDA needs a pull-up. Both lines are left released until the first transfer.
    pub fn new(sda: &'a mut dyn GpioPin, scl: &'a dyn GpioOutput) -> Self {
        BitBangI2c {
            sda,
            scl,
            half_period: Self::STANDARD_HALF_PERIOD,
            delay: StdDelay,
        }
    }
}

impl<'a, D: Delay> BitBangI2c<'a, D> {
    /// Replaces the delay used for the clock half periods.
    pub fn with_delay<E: Delay>(self, delay: E) -> BitBangI2c<'a, E> {
        BitBangI2c {
            sda: self.sda,
            scl: self.scl,
            half_period: self.half_period,
            delay,
        }
    }

    fn wait(&mut self) {
        self.delay.delay(self.half_period);
    }

    fn sda_release(&mut self) -> GpioResult<()> {
        self.sda.as_input()?;
        Ok(())
    }

    fn sda_low(&mut self) -> GpioResult<()> {
        self.sda.as_output()?.write(false)
    }

    fn sda_sample(&mut self) -> GpioResult<bool> {
        self.sda.as_input()?.read()
    }

    fn start(&mut self) -> GpioResult<()> {
        self.sda_release()?;
        self.scl.write(true)?;
        self.wait();
        self.sda_low()?;
        self.wait();
        self.scl.write(false)?;
        self.wait();
        Ok(())
    }

    fn stop(&mut self) -> GpioResult<()> {
        self.sda_low()?;
        self.wait();
        self.scl.write(true)?;
        self.wait();
        self.sda_release()?;
        self.wait();
        Ok(())
    }

    fn write_bit(&mut self, bit: bool) -> GpioResult<()> {
        if bit {
            self.sda_release()?;
        } else {
            self.sda_low()?;
        }
        self.wait();
        self.scl.write(true)?;
        self.wait();
        self.scl.write(false)?;
        Ok(())
    }

    fn read_bit(&mut self) -> GpioResult<bool> {
        self.sda_release()?;
        self.wait();
        self.scl.write(true)?;
        self.wait();
        let bit = self.sda_sample()?;
        self.scl.write(false)?;
        Ok(bit)
    }

    /// Shifts out a byte MSb first and returns whether the device acknowledged it.
    fn write_u8(&mut self, byte: u8) -> GpioResult<bool> {
        for i in (0..8).rev() {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        // ACK is the device pulling SDA low
        Ok(!self.read_bit()?)
    }

    fn read_u8(&mut self, ack: bool) -> GpioResult<u8> {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | self.read_bit()? as u8;
        }
        self.write_bit(!ack)?;
        Ok(byte)
    }

    /// Starts a transfer and sends the address byte, issuing a stop on NACK.
    fn address(&mut self, address: u8, read: bool) -> GpioResult<()> {
        if address > MAX_ADDRESS {
            return Err(GpioError::InvalidArgument);
        }

        self.start()?;
        if !self.write_u8((address << 1) | read as u8)? {
            self.stop()?;
            return Err(GpioError::NoAcknowledge(address));
        }
        Ok(())
    }
}

impl<D: Delay> I2cBus for BitBangI2c<'_, D> {
    fn write_byte(&mut self, address: u8, byte: u8) -> GpioResult<()> {
        trace!("I2C write {:#04x}: {:08b}", address, byte);

        self.address(address, false)?;
        let acked = self.write_u8(byte)?;
        self.stop()?;

        if acked {
            Ok(())
        } else {
            Err(GpioError::NoAcknowledge(address))
        }
    }

    fn read_byte(&mut self, address: u8) -> GpioResult<u8> {
        self.address(address, true)?;
        // Single byte, so the master NACKs it
        let byte = self.read_u8(false)?;
        self.stop()?;

        trace!("I2C read {:#04x}: {:08b}", address, byte);
        Ok(byte)
    }
}
