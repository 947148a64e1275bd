//! Timing rules of the HD44780 controller.
//!
//! Two kinds of numbers live here: the electrical constants of the parallel interface (setup
//! time, enable pulse width), which do not depend on anything, and the execution times of the
//! instructions, which scale with the controller's oscillator. The datasheet specifies the
//! oscillator anywhere between 190 and 350 kHz (270 kHz typical), and most instructions finish
//! within 10 oscillator cycles (37 µs at 270 kHz).
//!
//! | Class | Instructions | Wait |
//! |-------|--------------|------|
//! | [Execution::Extended] | clear display, return home | flat 1.52 ms |
//! | [Execution::Standard] | everything else, data writes and reads | [TimingPolicy::standard_exec] |
//! | [Execution::Immediate] | busy flag / address read | none |

use std::time::Duration;
use log::warn;
use crate::lcd::hd44780::{LcdError, LcdResult};

/// Slowest oscillator frequency the datasheet allows, in kHz.
pub const MIN_OSCILLATOR_KHZ: u32 = 190;
/// Typical oscillator frequency, in kHz.
pub const TYPICAL_OSCILLATOR_KHZ: u32 = 270;
/// Fastest oscillator frequency the datasheet allows, in kHz.
pub const MAX_OSCILLATOR_KHZ: u32 = 350;

/// Oscillator cycles a standard instruction needs.
pub const STANDARD_EXEC_CYCLES: u64 = 10;

/// Execution time of clear display and return home.
pub const CLEAR_HOME_EXEC: Duration = Duration::from_micros(1520);

/// RS/RW/data setup before E rises. The datasheet asks for 40 ns plus 25 ns rise time.
pub const ADDRESS_SETUP: Duration = Duration::from_micros(1);
/// E high time. The datasheet asks for at least 450 ns.
pub const ENABLE_PULSE_WIDTH: Duration = Duration::from_micros(1);
/// Gap between the two halves of a byte in 4-bit mode, one oscillator period at the slowest clock.
pub const INTER_NIBBLE_GAP: Duration = Duration::from_micros(6);
/// Output propagation of an I2C expander before its port can be sampled.
pub const EXPANDER_OUTPUT_SETTLE: Duration = Duration::from_micros(4);

/// Pause between two reads of the busy flag.
pub const BUSY_POLL_INTERVAL: Duration = Duration::from_micros(10);

/// Wait after Vcc reaches 2.7 V before the first reset write.
pub const POWER_ON_WAIT: Duration = Duration::from_millis(40);
/// Wait after the first reset write.
pub const RESET_WAIT_FIRST: Duration = Duration::from_micros(4100);
/// Wait after the second reset write.
pub const RESET_WAIT_SECOND: Duration = Duration::from_micros(100);

/// How long an instruction keeps the controller busy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Execution {
    /// About 10 oscillator cycles. May be replaced by busy-flag polling.
    Standard,
    /// Clear display and return home. Always waited out in full.
    Extended,
    /// Nothing to wait for.
    Immediate,
}

/// Resolves [Execution] classes to actual waits.
///
/// The default policy assumes the slowest oscillator the datasheet allows, which is safe for any
/// conforming controller. If you know the oscillator of your module (or measured it), use
/// [TimingPolicy::for_oscillator] to speed things up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimingPolicy {
    standard: Duration,
}

impl TimingPolicy {
    /// Creates a policy with an explicit worst-case execution time for standard instructions.
    pub const fn with_standard_exec(standard: Duration) -> Self {
        TimingPolicy { standard }
    }

    /// Creates a policy for a controller running at `khz`.
    ///
    /// Frequencies outside the datasheet range are accepted with a warning, since clones are
    /// known to run faster or slower.
    ///
    /// # Errors
    /// - `LcdError::Configuration` if `khz` is zero.
    pub fn for_oscillator(khz: u32) -> LcdResult<Self> {
        if khz == 0 {
            return Err(LcdError::Configuration("oscillator frequency must not be zero".into()));
        }
        if !(MIN_OSCILLATOR_KHZ..=MAX_OSCILLATOR_KHZ).contains(&khz) {
            warn!("Oscillator frequency {} kHz is outside the HD44780 range", khz);
        }

        Ok(Self::with_standard_exec(cycles_at(STANDARD_EXEC_CYCLES, khz)))
    }

    /// Worst-case execution time of a standard instruction.
    pub fn standard_exec(&self) -> Duration {
        self.standard
    }

    /// How long to wait after issuing an instruction of the given class.
    pub fn min_delay(&self, execution: Execution) -> Duration {
        match execution {
            Execution::Standard => self.standard,
            Execution::Extended => CLEAR_HOME_EXEC,
            Execution::Immediate => Duration::ZERO,
        }
    }
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self::with_standard_exec(cycles_at(STANDARD_EXEC_CYCLES, MIN_OSCILLATOR_KHZ))
    }
}

/// Duration of `cycles` oscillator periods at `khz`, rounded up to the nanosecond.
const fn cycles_at(cycles: u64, khz: u32) -> Duration {
    let hz = khz as u64 * 1000;
    Duration::from_nanos((cycles * 1_000_000_000).div_ceil(hz))
}
