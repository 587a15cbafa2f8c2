//! Timer interfaces the platform provides to a [`SoftPwm`](crate::SoftPwm) channel.
//!
//! Neither trait carries a callback. The platform's interrupt handler for
//! each timer calls back into the channel that owns it.

/// Single-shot timer that ends the high phase of a cycle.
///
/// On expiry the platform must call [`SoftPwm::switch_low`](crate::SoftPwm::switch_low).
pub trait OneShotTimer {
    /// Schedule one expiry `delay_us` microseconds from now.
    ///
    /// Arming while a previous expiry is pending replaces it.
    fn arm(&mut self, delay_us: u32);

    /// Drop the pending expiry, if any. Must be safe to call when nothing is armed.
    fn cancel(&mut self);
}

/// Repeating timer that starts every cycle.
///
/// On each expiry the platform must call [`SoftPwm::period_tick`](crate::SoftPwm::period_tick).
pub trait PeriodicTimer {
    /// Expire every `interval_us` microseconds, first expiry one interval from now.
    ///
    /// Calling this while running changes the interval going forward and must
    /// not produce an extra expiry.
    fn start(&mut self, interval_us: u32);

    /// Stop expiring. Must be safe to call when not running.
    fn cancel(&mut self);
}
