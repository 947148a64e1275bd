//! Linux GPIO character device backend (`/dev/gpiochipN`), through the gpiod library.
//!
//! Lines are only requested from the kernel while a [GpioInput]/[GpioOutput] (or the bus
//! variants) is alive. Switching a line between input and output therefore means dropping one
//! request and making another, which is what the display and I2C code do on every read.

use crate::{
    GpioBias, GpioBus, GpioBusInput, GpioBusOutput, GpioDriver, GpioError,
    GpioInput, GpioOutput, GpioPin, GpioResult,
};
use bitvec::vec::BitVec;
use log::trace;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// Per-line request options, kept while the line is not requested.
#[derive(Copy, Clone, Debug, Default)]
struct LineConfig {
    bias: GpioBias,
}

impl LineConfig {
    fn request_input(&self, chip: &gpiod::Chip, offsets: Vec<u32>) -> GpioResult<gpiod::Lines<gpiod::Input>> {
        trace!("Requesting {:?} as input", offsets);
        Ok(chip.request_lines(
            gpiod::Options::input(offsets)
                .consumer(env!("CARGO_PKG_NAME"))
                .bias(self.bias.into()),
        )?)
    }

    fn request_output(&self, chip: &gpiod::Chip, offsets: Vec<u32>) -> GpioResult<gpiod::Lines<gpiod::Output>> {
        trace!("Requesting {:?} as output", offsets);
        Ok(chip.request_lines(
            gpiod::Options::output(offsets)
                .consumer(env!("CARGO_PKG_NAME"))
                .bias(self.bias.into()),
        )?)
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

/// GPIO driver for one chip of the Linux GPIO character device.
///
/// Pins and buses handed out are tracked, so the same line cannot be claimed twice through
/// this driver. Other processes are kept out by the kernel for as long as a line is requested.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    claimed: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let lines = chip.num_lines() as usize;
        GpiodDriver {
            chip,
            claimed: BitVec::repeat(false, lines),
        }
    }

    /// Opens the chip at `path`, e.g. `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path.as_ref())?))
    }

    fn claim(&self, indices: &[usize]) -> GpioResult<()> {
        check_indices(indices, self.count()?)?;
        if indices.iter().any(|&index| self.claimed[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for &index in indices {
            self.claimed.set_aliased(index, true);
        }
        Ok(())
    }

    fn release(&self, indices: &[usize]) {
        for &index in indices {
            self.claimed.set_aliased(index, false);
        }
    }
}

/// Rejects indices past the end of the chip and indices listed more than once.
fn check_indices(indices: &[usize], count: usize) -> GpioResult<()> {
    let out_of_range = indices.iter().any(|&index| index >= count);
    let repeated = indices
        .iter()
        .enumerate()
        .any(|(i, index)| indices[..i].contains(index));
    if out_of_range || repeated {
        return Err(GpioError::InvalidArgument);
    }
    Ok(())
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        self.claim(&[index])?;
        Ok(Box::new(GpiodPin {
            driver: self,
            index,
            config: LineConfig::default(),
        }))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        self.claim(&indices)?;
        Ok(Box::new(GpiodBus {
            driver: self,
            indices,
            config: LineConfig::default(),
        }))
    }
}

struct GpiodPin<'a> {
    driver: &'a GpiodDriver,
    index: usize,
    config: LineConfig,
}

impl Debug for GpiodPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.index)
    }
}

impl GpioPin for GpiodPin<'_> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        let lines = self.config.request_input(&self.driver.chip, vec![self.index as u32])?;
        Ok(Box::new(GpiodInput { pin: self, lines }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        let lines = self.config.request_output(&self.driver.chip, vec![self.index as u32])?;
        Ok(Box::new(GpiodOutput { pin: self, lines }))
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.config.bias = bias;
        Ok(())
    }
}

impl Drop for GpiodPin<'_> {
    fn drop(&mut self) {
        self.driver.release(&[self.index]);
    }
}

struct GpiodInput<'a> {
    pin: &'a GpiodPin<'a>,
    lines: gpiod::Lines<gpiod::Input>,
}

impl Debug for GpiodInput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.pin)
    }
}

impl GpioInput for GpiodInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        let [value] = self.lines.get_values([false])?;
        Ok(value)
    }
}

struct GpiodOutput<'a> {
    pin: &'a GpiodPin<'a>,
    lines: gpiod::Lines<gpiod::Output>,
}

impl Debug for GpiodOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for GpiodOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.lines.set_values([value])?;
        Ok(())
    }
}

struct GpiodBus<'a, const N: usize> {
    driver: &'a GpiodDriver,
    indices: [usize; N],
    config: LineConfig,
}

impl<const N: usize> GpiodBus<'_, N> {
    fn offsets(&self) -> Vec<u32> {
        self.indices.iter().map(|&index| index as u32).collect()
    }
}

impl<const N: usize> Debug for GpiodBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.indices)
    }
}

impl<const N: usize> GpioBus<N> for GpiodBus<'_, N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        let lines = self.config.request_input(&self.driver.chip, self.offsets())?;
        Ok(Box::new(GpiodBusInput { bus: self, lines }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        let lines = self.config.request_output(&self.driver.chip, self.offsets())?;
        Ok(Box::new(GpiodBusOutput { bus: self, lines }))
    }
}

impl<const N: usize> Drop for GpiodBus<'_, N> {
    fn drop(&mut self) {
        self.driver.release(&self.indices);
    }
}

struct GpiodBusInput<'a, const N: usize> {
    bus: &'a GpiodBus<'a, N>,
    lines: gpiod::Lines<gpiod::Input>,
}

impl<const N: usize> Debug for GpiodBusInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.bus)
    }
}

impl<const N: usize> GpioBusInput<N> for GpiodBusInput<'_, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        Ok(self.lines.get_values([false; N])?)
    }
}

struct GpiodBusOutput<'a, const N: usize> {
    bus: &'a GpiodBus<'a, N>,
    lines: gpiod::Lines<gpiod::Output>,
}

impl<const N: usize> Debug for GpiodBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.bus)
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.lines.set_values(*values)?;
        Ok(())
    }
}
