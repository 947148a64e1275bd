use std::time::Duration;
use log::debug;
use crate::lcd::hd44780::bus::HD44780Bus;
use crate::lcd::hd44780::driver::{CursorDirection, HD44780Driver};
use crate::lcd::hd44780::instruction::{Instruction, RegisterSelect, StatusReadout};
use crate::lcd::hd44780::timing::{Execution, TimingPolicy, BUSY_POLL_INTERVAL};
use crate::lcd::hd44780::{LcdError, LcdResult};

/// [HD44780Driver] on top of any [HD44780Bus].
///
/// The driver owns its bus for its whole life. After every instruction it either sleeps for the
/// worst-case execution time from its [TimingPolicy], or, with busy polling enabled, reads the
/// busy flag until the controller is done. Clear display and return home are always waited out,
/// polling or not.
#[derive(Debug)]
pub struct BusHD44780Driver<B: HD44780Bus> {
    bus: B,
    timing: TimingPolicy,
    busy_polling: bool,
}

impl<B: HD44780Bus> BusHD44780Driver<B> {
    pub fn new(bus: B) -> Self {
        BusHD44780Driver {
            bus,
            timing: TimingPolicy::default(),
            busy_polling: false,
        }
    }

    pub fn with_timing(mut self, timing: TimingPolicy) -> Self {
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> &TimingPolicy {
        &self.timing
    }

    pub fn busy_polling(&self) -> bool {
        self.busy_polling
    }

    /// Enables or disables waiting on the busy flag instead of the worst-case delays.
    ///
    /// # Errors
    /// - `LcdError::Unsupported` if the bus cannot read the controller.
    pub fn set_busy_polling(&mut self, enabled: bool) -> LcdResult<()> {
        if enabled && !self.bus.can_read() {
            return Err(LcdError::Unsupported("busy polling needs a readable bus"));
        }
        self.busy_polling = enabled;
        Ok(())
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Trailing delay for a transfer of the given class.
    fn delay_for(&self, execution: Execution) -> Duration {
        if self.polls(execution) {
            Duration::ZERO
        } else {
            self.timing.min_delay(execution)
        }
    }

    fn polls(&self, execution: Execution) -> bool {
        self.busy_polling && execution == Execution::Standard
    }

    /// Polls the busy flag for at most one standard execution time.
    ///
    /// The controller is never waited on longer than that. If it still reports busy, something
    /// else is off and the driver carries on the same way it would without polling.
    fn wait_until_ready(&mut self) -> LcdResult<()> {
        let budget = self.timing.standard_exec();
        let mut waited = Duration::ZERO;
        loop {
            let raw = self.bus.read_byte(RegisterSelect::Command, Duration::ZERO)?;
            if !StatusReadout::from_raw(raw).busy {
                return Ok(());
            }
            if waited >= budget {
                debug!("Busy flag still set after {:?}, carrying on", waited);
                return Ok(());
            }
            self.bus.delay(BUSY_POLL_INTERVAL);
            waited += BUSY_POLL_INTERVAL;
        }
    }
}

impl<B: HD44780Bus> HD44780Driver for BusHD44780Driver<B> {
    fn init(&mut self, two_lines: bool, font_5x10: bool) -> LcdResult<()> {
        let data_length = self.bus.data_length();
        debug!(
            "Initializing HD44780: {:?}, two lines: {}, 5x10 font: {}",
            data_length, two_lines, font_5x10
        );

        self.bus.init_manually(&self.timing)?;
        self.function_set(data_length, two_lines, font_5x10)?;
        self.clear_display()?;
        self.set_display_control(true, false, false)?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        Ok(())
    }

    fn execute(&mut self, instruction: Instruction) -> LcdResult<()> {
        let delay = self.delay_for(instruction.execution);
        self.bus.write_byte(instruction.register, instruction.opcode, delay)?;

        if self.polls(instruction.execution) {
            self.wait_until_ready()?;
        }
        Ok(())
    }

    fn read_command(&mut self) -> LcdResult<u8> {
        let execution = RegisterSelect::Command.read_execution();
        self.bus.read_byte(RegisterSelect::Command, self.delay_for(execution))
    }

    fn read_data(&mut self) -> LcdResult<u8> {
        let execution = RegisterSelect::Data.read_execution();
        let byte = self.bus.read_byte(RegisterSelect::Data, self.delay_for(execution))?;

        if self.polls(execution) {
            self.wait_until_ready()?;
        }
        Ok(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::instruction::DataLength;
    use crate::lcd::hd44780::timing::CLEAR_HOME_EXEC;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Eq, PartialEq)]
    enum Transfer {
        Reset,
        Write(RegisterSelect, u8, Duration),
        Read(RegisterSelect, Duration),
        Delay(Duration),
    }

    /// Records transfers instead of moving lines. Reads pop `status`, defaulting to not busy.
    #[derive(Debug, Default)]
    struct RecordingBus {
        readable: bool,
        transfers: Vec<Transfer>,
        status: VecDeque<u8>,
    }

    impl RecordingBus {
        fn readable() -> Self {
            RecordingBus { readable: true, ..Default::default() }
        }

        fn writes(&self) -> Vec<(RegisterSelect, u8)> {
            self.transfers
                .iter()
                .filter_map(|t| match t {
                    Transfer::Write(rs, byte, _) => Some((*rs, *byte)),
                    _ => None,
                })
                .collect()
        }
    }

    impl HD44780Bus for RecordingBus {
        fn data_length(&self) -> DataLength {
            DataLength::FourBit
        }

        fn can_read(&self) -> bool {
            self.readable
        }

        fn write_nibble(&mut self, _: RegisterSelect, _: u8, _: Duration) -> LcdResult<()> {
            unreachable!("the driver only moves whole bytes")
        }

        fn read_nibble(&mut self, _: RegisterSelect, _: Duration) -> LcdResult<u8> {
            unreachable!("the driver only moves whole bytes")
        }

        fn write_byte(&mut self, register: RegisterSelect, byte: u8, delay_after: Duration) -> LcdResult<()> {
            self.transfers.push(Transfer::Write(register, byte, delay_after));
            Ok(())
        }

        fn read_byte(&mut self, register: RegisterSelect, delay_after: Duration) -> LcdResult<u8> {
            if !self.readable {
                return Err(LcdError::Unsupported("write-only"));
            }
            self.transfers.push(Transfer::Read(register, delay_after));
            Ok(self.status.pop_front().unwrap_or(0))
        }

        fn delay(&mut self, duration: Duration) {
            self.transfers.push(Transfer::Delay(duration));
        }

        fn init_manually(&mut self, _: &TimingPolicy) -> LcdResult<()> {
            self.transfers.push(Transfer::Reset);
            Ok(())
        }
    }

    #[test]
    fn init_resets_then_configures() {
        let mut driver = BusHD44780Driver::new(RecordingBus::default());
        driver.init(true, false).unwrap();

        assert_eq!(driver.bus().transfers[0], Transfer::Reset);
        let command = RegisterSelect::Command;
        assert_eq!(
            driver.bus().writes(),
            vec![(command, 0x28), (command, 0x01), (command, 0x0C), (command, 0x06)]
        );
    }

    #[test]
    fn standard_instructions_wait_the_policy_time() {
        let timing = TimingPolicy::with_standard_exec(Duration::from_micros(80));
        let mut driver = BusHD44780Driver::new(RecordingBus::default()).with_timing(timing);

        driver.set_ddram_address(0x40).unwrap();
        driver.send_data(b'x').unwrap();
        driver.return_home().unwrap();

        assert_eq!(
            driver.bus().transfers,
            vec![
                Transfer::Write(RegisterSelect::Command, 0xC0, Duration::from_micros(80)),
                Transfer::Write(RegisterSelect::Data, b'x', Duration::from_micros(80)),
                Transfer::Write(RegisterSelect::Command, 0x02, CLEAR_HOME_EXEC),
            ]
        );
    }

    #[test]
    fn out_of_range_address_sends_nothing() {
        let mut driver = BusHD44780Driver::new(RecordingBus::default());
        assert!(matches!(driver.set_ddram_address(128), Err(LcdError::Configuration(_))));
        assert!(matches!(driver.set_cgram_address(64), Err(LcdError::Configuration(_))));
        assert!(driver.bus().transfers.is_empty());
    }

    #[test]
    fn polling_needs_a_readable_bus() {
        let mut driver = BusHD44780Driver::new(RecordingBus::default());
        assert!(matches!(driver.set_busy_polling(true), Err(LcdError::Unsupported(_))));
        assert!(!driver.busy_polling());
        driver.set_busy_polling(false).unwrap();
    }

    #[test]
    fn polling_stops_when_busy_clears() {
        let mut bus = RecordingBus::readable();
        bus.status.extend([0x80, 0x80, 0x05]);
        let mut driver = BusHD44780Driver::new(bus);
        driver.set_busy_polling(true).unwrap();

        driver.send_data(b'a').unwrap();

        let command = RegisterSelect::Command;
        assert_eq!(
            driver.bus().transfers,
            vec![
                Transfer::Write(RegisterSelect::Data, b'a', Duration::ZERO),
                Transfer::Read(command, Duration::ZERO),
                Transfer::Delay(BUSY_POLL_INTERVAL),
                Transfer::Read(command, Duration::ZERO),
                Transfer::Delay(BUSY_POLL_INTERVAL),
                Transfer::Read(command, Duration::ZERO),
            ]
        );
    }

    #[test]
    fn polling_gives_up_after_the_standard_budget() {
        let mut bus = RecordingBus::readable();
        bus.status.extend([0x80; 100]);
        let timing = TimingPolicy::with_standard_exec(Duration::from_micros(30));
        let mut driver = BusHD44780Driver::new(bus).with_timing(timing);
        driver.set_busy_polling(true).unwrap();

        driver.set_display_control(true, true, false).unwrap();

        let reads = driver
            .bus()
            .transfers
            .iter()
            .filter(|t| matches!(t, Transfer::Read(..)))
            .count();
        assert_eq!(reads, 4);
    }

    #[test]
    fn clear_waits_in_full_even_when_polling() {
        let mut driver = BusHD44780Driver::new(RecordingBus::readable());
        driver.set_busy_polling(true).unwrap();

        driver.clear_display().unwrap();
        assert_eq!(
            driver.bus().transfers,
            vec![Transfer::Write(RegisterSelect::Command, 0x01, CLEAR_HOME_EXEC)]
        );
    }

    #[test]
    fn status_and_data_reads() {
        let mut bus = RecordingBus::readable();
        bus.status.extend([0xC5, b'Q']);
        let mut driver = BusHD44780Driver::new(bus);

        assert_eq!(
            driver.read_status().unwrap(),
            StatusReadout { busy: true, address_counter: 0x45 }
        );
        assert_eq!(driver.read_data().unwrap(), b'Q');
        assert_eq!(
            driver.bus().transfers,
            vec![
                Transfer::Read(RegisterSelect::Command, Duration::ZERO),
                Transfer::Read(RegisterSelect::Data, TimingPolicy::default().standard_exec()),
            ]
        );
    }
}
