//! Recording doubles for the line-level traits.
//!
//! Every double created from the same [Probe] appends to one shared event log, so a test can
//! assert the exact interleaving of line changes, bus transfers and delays.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;
use crate::delay::Delay;
use crate::i2c::I2cBus;
use crate::{
    pack_bits, unpack_bits, GpioBus, GpioBusInput, GpioBusOutput, GpioError, GpioInput,
    GpioOutput, GpioPin, GpioResult,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// A named output line was written.
    Line(&'static str, bool),
    /// A bidirectional pin was driven as an output.
    PinDriven(&'static str, bool),
    /// A bidirectional pin was switched to input.
    PinReleased(&'static str),
    /// The data bus was switched to input.
    BusReleased,
    /// The data bus was written, packed LSb first.
    DataOut(u8),
    /// The data bus was sampled.
    DataIn(u8),
    Delay(Duration),
    I2cWrite(u8, u8),
    I2cRead(u8, u8),
}

#[derive(Debug, Default)]
struct State {
    events: Vec<Event>,
    readback: VecDeque<u8>,
    pins: HashMap<&'static str, VecDeque<bool>>,
    nack: Option<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct Probe {
    state: Rc<RefCell<State>>,
}

impl Probe {
    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Queues values returned by data bus and I2C reads. An empty queue reads as `0`.
    pub fn queue_readback(&self, values: impl IntoIterator<Item = u8>) {
        self.state.borrow_mut().readback.extend(values);
    }

    /// Queues levels returned by reads of the named pin. An empty queue reads high.
    pub fn queue_pin(&self, name: &'static str, levels: impl IntoIterator<Item = bool>) {
        self.state.borrow_mut().pins.entry(name).or_default().extend(levels);
    }

    /// Makes the mock I2C bus refuse every transfer to `address`.
    pub fn refuse(&self, address: u8) {
        self.state.borrow_mut().nack = Some(address);
    }

    fn record(&self, event: Event) {
        self.state.borrow_mut().events.push(event);
    }

    fn pop_readback(&self) -> u8 {
        self.state.borrow_mut().readback.pop_front().unwrap_or(0)
    }

    pub fn output(&self, name: &'static str) -> MockOutput {
        MockOutput { name, probe: self.clone() }
    }

    pub fn pin(&self, name: &'static str) -> MockPin {
        MockPin { name, probe: self.clone() }
    }

    pub fn bus(&self) -> MockBus {
        MockBus { probe: self.clone() }
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay { probe: self.clone() }
    }

    pub fn i2c(&self) -> MockI2c {
        MockI2c { probe: self.clone() }
    }
}

#[derive(Debug)]
pub struct MockOutput {
    name: &'static str,
    probe: Probe,
}

impl GpioOutput for MockOutput {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.probe.record(Event::Line(self.name, value));
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockPin {
    name: &'static str,
    probe: Probe,
}

#[derive(Debug)]
struct MockPinInput<'a>(&'a MockPin);

#[derive(Debug)]
struct MockPinOutput<'a>(&'a MockPin);

impl GpioPin for MockPin {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        self.probe.record(Event::PinReleased(self.name));
        Ok(Box::new(MockPinInput(self)))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        Ok(Box::new(MockPinOutput(self)))
    }
}

impl GpioInput for MockPinInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        let mut state = self.0.probe.state.borrow_mut();
        Ok(state
            .pins
            .get_mut(self.0.name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(true))
    }
}

impl GpioOutput for MockPinOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.0.probe.record(Event::PinDriven(self.0.name, value));
        Ok(())
    }
}

/// Data bus double of any width.
#[derive(Debug)]
pub struct MockBus {
    probe: Probe,
}

#[derive(Debug)]
struct MockBusInput<'a>(&'a Probe);

#[derive(Debug)]
struct MockBusOutput<'a>(&'a Probe);

impl<const N: usize> GpioBus<N> for MockBus {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        self.probe.record(Event::BusReleased);
        Ok(Box::new(MockBusInput(&self.probe)))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        Ok(Box::new(MockBusOutput(&self.probe)))
    }
}

impl<const N: usize> GpioBusInput<N> for MockBusInput<'_> {
    fn read(&self) -> GpioResult<[bool; N]> {
        let values = unpack_bits::<N>(self.0.pop_readback());
        self.0.record(Event::DataIn(pack_bits(&values)));
        Ok(values)
    }
}

impl<const N: usize> GpioBusOutput<N> for MockBusOutput<'_> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.0.record(Event::DataOut(pack_bits(values)));
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockDelay {
    probe: Probe,
}

impl Delay for MockDelay {
    fn delay(&mut self, duration: Duration) {
        if !duration.is_zero() {
            self.probe.record(Event::Delay(duration));
        }
    }
}

#[derive(Debug)]
pub struct MockI2c {
    probe: Probe,
}

impl I2cBus for MockI2c {
    fn write_byte(&mut self, address: u8, byte: u8) -> GpioResult<()> {
        if self.probe.state.borrow().nack == Some(address) {
            return Err(GpioError::NoAcknowledge(address));
        }
        self.probe.record(Event::I2cWrite(address, byte));
        Ok(())
    }

    fn read_byte(&mut self, address: u8) -> GpioResult<u8> {
        if self.probe.state.borrow().nack == Some(address) {
            return Err(GpioError::NoAcknowledge(address));
        }
        let byte = self.probe.pop_readback();
        self.probe.record(Event::I2cRead(address, byte));
        Ok(byte)
    }
}
