//! Software PWM on a plain digital output pin.
//!
//! A [`SoftPwm`] channel owns an [`OutputPin`](embedded_hal::digital::OutputPin),
//! a [`PeriodicTimer`] that starts every cycle and a [`OneShotTimer`] that ends
//! the high phase of each cycle. The platform forwards the timer interrupts to
//! [`SoftPwm::period_tick`] and [`SoftPwm::switch_low`]:
//!
//! ```ignore
//! // period timer interrupt
//! fn on_period_timer(pwm: &SoftPwm<LedPin, Alarm0, Alarm1>) {
//!     let _ = pwm.period_tick();
//! }
//!
//! // switch timer interrupt
//! fn on_switch_timer(pwm: &SoftPwm<LedPin, Alarm0, Alarm1>) {
//!     let _ = pwm.switch_low();
//! }
//! ```
//!
//! Periods below [`MIN_RELIABLE_PERIOD_US`] are accepted but the edges become
//! imprecise because of the interrupt overhead.
#![no_std]

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
}

// Stub macros when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {{}};
}

mod channel;
mod timer;
mod units;

use core::fmt;

pub use channel::{SoftPwm, SoftPwmBuilder};
pub use timer::{OneShotTimer, PeriodicTimer};

/// Period a freshly constructed channel runs at (20 ms).
pub const DEFAULT_PERIOD_US: u32 = 20_000;

/// Shortest period that still produces reasonably accurate edges.
pub const MIN_RELIABLE_PERIOD_US: u32 = 100;

/// What the channel is currently doing with its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmMode {
    /// Duty cycle is 0%, output held low
    IdleLow,
    /// Duty cycle is 100%, output held high
    IdleHigh,
    /// Output toggles once per period
    Cycling,
}

/// Errors that can occur during software PWM operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SoftPwmError<E> {
    /// The requested period is zero, negative, not finite or does not fit in microseconds
    InvalidPeriod,
    /// Driving the output pin failed
    Pin(E),
}

impl<E: fmt::Debug> fmt::Display for SoftPwmError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPeriod => write!(f, "period must be at least 1 us"),
            Self::Pin(err) => write!(f, "output pin error: {err:?}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for SoftPwmError<E> {}

/// Result type for software PWM operations
pub type Result<T, E> = core::result::Result<T, SoftPwmError<E>>;
