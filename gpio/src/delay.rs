//! Blocking delays.
//!
//! Everything timing-related in this crate (enable pulses, controller execution times, I2C clock
//! half periods) goes through the [Delay] trait, so the drivers can be run against a recording
//! delay in tests and against [StdDelay] on real hardware.

use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

pub trait Delay: Debug {
    /// Blocks the calling thread for at least `duration`.
    fn delay(&mut self, duration: Duration);
}

/// Delay backed by [std::thread::sleep].
///
/// The OS may oversleep by a scheduler tick or more, which is fine for the HD44780: every timing
/// requirement of the controller is a minimum.
#[derive(Copy, Clone, Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        if !duration.is_zero() {
            sleep(duration);
        }
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration);
    }
}
