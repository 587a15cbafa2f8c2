use crate::timer::{OneShotTimer, PeriodicTimer};
use crate::{DEFAULT_PERIOD_US, MIN_RELIABLE_PERIOD_US, PwmMode, Result, SoftPwmError, units};
use core::cell::RefCell;
use critical_section::Mutex;
use embedded_hal::digital::OutputPin;

/// Initial configuration of a [`SoftPwm`] channel.
///
/// Defaults to a [`DEFAULT_PERIOD_US`] period and a 0% duty cycle. The period is
/// validated when the channel is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftPwmBuilder {
    period_us: Option<u32>,
    duty_cycle: f32,
}

impl Default for SoftPwmBuilder {
    fn default() -> Self {
        Self {
            period_us: Some(DEFAULT_PERIOD_US),
            duty_cycle: 0.0,
        }
    }
}

impl SoftPwmBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn period_us(mut self, period_us: u32) -> Self {
        self.period_us = Some(period_us);
        self
    }

    #[must_use]
    pub fn period_ms(mut self, period_ms: u32) -> Self {
        self.period_us = units::millis_to_micros(period_ms);
        self
    }

    #[must_use]
    pub fn period(mut self, seconds: f32) -> Self {
        self.period_us = units::seconds_to_period_micros(seconds);
        self
    }

    /// Initial duty cycle, saturated to `[0.0, 1.0]` when the channel is built.
    #[must_use]
    pub fn duty_cycle(mut self, duty_cycle: f32) -> Self {
        self.duty_cycle = duty_cycle;
        self
    }

    /// Binds the configuration to hardware, drives the pin to its initial level
    /// and starts the period timer.
    ///
    /// # Errors
    ///
    /// [`SoftPwmError::InvalidPeriod`] if the configured period is not at least
    /// 1 us, [`SoftPwmError::Pin`] if the pin cannot be driven.
    pub fn build<P, S, T>(
        self,
        pin: P,
        switch_timer: S,
        period_timer: T,
    ) -> Result<SoftPwm<P, S, T>, P::Error>
    where
        P: OutputPin,
        S: OneShotTimer,
        T: PeriodicTimer,
    {
        let period_us = self
            .period_us
            .filter(|&period_us| period_us > 0)
            .ok_or(SoftPwmError::InvalidPeriod)?;

        let mut inner = Inner {
            pin,
            switch_timer,
            period_timer,
            period_us,
            duty_cycle: self.duty_cycle,
            high_time_us: 0,
            low_time_us: period_us,
            mode: PwmMode::IdleLow,
            running: false,
        };

        inner.pin.set_low().map_err(SoftPwmError::Pin)?;
        inner.reconcile(period_us, self.duty_cycle)?;
        inner.start();

        debug!(
            "soft pwm started: period {} us, duty {}",
            inner.period_us, inner.duty_cycle
        );

        Ok(SoftPwm {
            inner: Mutex::new(RefCell::new(inner)),
        })
    }
}

struct Inner<P, S, T> {
    pin: P,
    switch_timer: S,
    period_timer: T,
    period_us: u32,
    duty_cycle: f32,
    high_time_us: u32,
    low_time_us: u32,
    mode: PwmMode,
    running: bool,
}

impl<P, S, T> Inner<P, S, T>
where
    P: OutputPin,
    S: OneShotTimer,
    T: PeriodicTimer,
{
    /// Saturates `duty_cycle` and commits it with `period_us`, the derived
    /// times and the mode. At the extremes the pin is driven first and nothing
    /// is committed if that fails. Inside the range nothing is armed: the next
    /// period tick picks up the new high time.
    fn reconcile(&mut self, period_us: u32, duty_cycle: f32) -> Result<(), P::Error> {
        let (duty_cycle, high_time_us, mode) = if duty_cycle > 0.0 && duty_cycle < 1.0 {
            let high_time_us = units::high_time_micros(period_us, duty_cycle);
            (duty_cycle, high_time_us, PwmMode::Cycling)
        } else if duty_cycle >= 1.0 {
            self.switch_timer.cancel();
            self.pin.set_high().map_err(SoftPwmError::Pin)?;
            (1.0, period_us, PwmMode::IdleHigh)
        } else {
            // also catches NaN
            self.switch_timer.cancel();
            self.pin.set_low().map_err(SoftPwmError::Pin)?;
            (0.0, 0, PwmMode::IdleLow)
        };

        self.period_us = period_us;
        self.duty_cycle = duty_cycle;
        self.high_time_us = high_time_us;
        self.low_time_us = period_us - high_time_us;
        self.mode = mode;

        Ok(())
    }

    fn set_duty_cycle(&mut self, duty_cycle: f32) -> Result<(), P::Error> {
        self.reconcile(self.period_us, duty_cycle)
    }

    fn set_period_us(&mut self, period_us: u32) -> Result<(), P::Error> {
        if period_us == 0 {
            return Err(SoftPwmError::InvalidPeriod);
        }

        if period_us == self.period_us {
            return Ok(());
        }

        if period_us < MIN_RELIABLE_PERIOD_US {
            warn!(
                "period {} us is below {} us, edges will be imprecise",
                period_us, MIN_RELIABLE_PERIOD_US
            );
        }

        self.reconcile(period_us, self.duty_cycle)?;

        if self.running {
            self.period_timer.start(period_us);
        }

        debug!("period set to {} us", period_us);

        Ok(())
    }

    fn set_pulse_width_us(&mut self, pulse_us: f64) -> Result<(), P::Error> {
        self.set_duty_cycle(units::pulse_micros_to_duty(pulse_us, self.period_us))
    }

    fn start(&mut self) {
        self.running = true;
        self.period_timer.start(self.period_us);
    }

    fn stop(&mut self) {
        self.running = false;
        self.switch_timer.cancel();
        self.period_timer.cancel();
    }

    fn period_tick(&mut self) -> Result<(), P::Error> {
        if !self.running || self.mode != PwmMode::Cycling {
            return Ok(());
        }

        // a switch armed under the previous period must not cut this cycle
        if self.high_time_us == 0 {
            self.switch_timer.cancel();
            return self.pin.set_low().map_err(SoftPwmError::Pin);
        }

        self.pin.set_high().map_err(SoftPwmError::Pin)?;

        // a full-length high phase would race the next tick
        if self.high_time_us < self.period_us {
            self.switch_timer.arm(self.high_time_us);
        } else {
            self.switch_timer.cancel();
        }

        Ok(())
    }

    fn switch_low(&mut self) -> Result<(), P::Error> {
        // firing already in flight when the channel left the cycling mode
        if self.mode != PwmMode::Cycling {
            return Ok(());
        }

        self.pin.set_low().map_err(SoftPwmError::Pin)
    }
}

/// A PWM output emulated on a digital pin.
///
/// `P` is the output pin, `S` the one-shot timer ending the high phase and
/// `T` the periodic timer starting every cycle. All state sits behind a
/// critical section, so the channel can be shared between application code
/// and the two timer interrupts (e.g. from a `static`).
///
/// Configuration changes never re-time the cycle in progress: a new high time
/// applies from the next [`period_tick`](Self::period_tick), while a change to
/// 0% or 100% drives the pin immediately.
pub struct SoftPwm<P, S, T> {
    inner: Mutex<RefCell<Inner<P, S, T>>>,
}

impl<P, S, T> SoftPwm<P, S, T>
where
    P: OutputPin,
    S: OneShotTimer,
    T: PeriodicTimer,
{
    /// Creates a channel with a 20 ms period and 0% duty cycle, pin low.
    ///
    /// # Errors
    ///
    /// [`SoftPwmError::Pin`] if the pin cannot be driven low.
    pub fn new(pin: P, switch_timer: S, period_timer: T) -> Result<Self, P::Error> {
        SoftPwmBuilder::new().build(pin, switch_timer, period_timer)
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner<P, S, T>) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.inner.borrow_ref_mut(cs)))
    }

    /// Sets the duty cycle as a fraction of the period.
    ///
    /// Values outside `[0.0, 1.0]` (and NaN) are saturated; at either end the
    /// pin is held at a constant level.
    ///
    /// # Errors
    ///
    /// [`SoftPwmError::Pin`] if the pin cannot be driven. The channel then keeps
    /// its previous duty cycle and mode.
    pub fn write(&self, duty_cycle: f32) -> Result<(), P::Error> {
        self.with(|inner| {
            inner.set_duty_cycle(duty_cycle)?;
            debug!("duty cycle {} -> {}", duty_cycle, inner.mode);
            Ok(())
        })
    }

    pub fn read(&self) -> f32 {
        self.with(|inner| inner.duty_cycle)
    }

    pub fn copy_duty_from<P2, S2, T2>(&self, other: &SoftPwm<P2, S2, T2>) -> Result<(), P::Error>
    where
        P2: OutputPin,
        S2: OneShotTimer,
        T2: PeriodicTimer,
    {
        self.write(other.read())
    }

    /// Sets the period in microseconds, keeping the duty cycle.
    ///
    /// Setting the current period again is a no-op and does not disturb the
    /// phase of the running cycle.
    ///
    /// # Errors
    ///
    /// [`SoftPwmError::InvalidPeriod`] for a zero period,
    /// [`SoftPwmError::Pin`] if the pin cannot be driven.
    pub fn set_period_us(&self, period_us: u32) -> Result<(), P::Error> {
        self.with(|inner| inner.set_period_us(period_us))
    }

    pub fn set_period_ms(&self, period_ms: u32) -> Result<(), P::Error> {
        let period_us = units::millis_to_micros(period_ms).ok_or(SoftPwmError::InvalidPeriod)?;
        self.set_period_us(period_us)
    }

    pub fn set_period(&self, seconds: f32) -> Result<(), P::Error> {
        let period_us =
            units::seconds_to_period_micros(seconds).ok_or(SoftPwmError::InvalidPeriod)?;
        self.set_period_us(period_us)
    }

    /// Sets the high time, keeping the period. A pulse longer than the period
    /// saturates to 100%.
    pub fn set_pulse_width_us(&self, pulse_us: u32) -> Result<(), P::Error> {
        self.with(|inner| inner.set_pulse_width_us(f64::from(pulse_us)))
    }

    pub fn set_pulse_width_ms(&self, pulse_ms: u32) -> Result<(), P::Error> {
        self.with(|inner| inner.set_pulse_width_us(units::pulse_millis_to_micros(pulse_ms)))
    }

    pub fn set_pulse_width(&self, seconds: f32) -> Result<(), P::Error> {
        self.with(|inner| inner.set_pulse_width_us(units::pulse_seconds_to_micros(seconds)))
    }

    pub fn period_us(&self) -> u32 {
        self.with(|inner| inner.period_us)
    }

    pub fn high_time_us(&self) -> u32 {
        self.with(|inner| inner.high_time_us)
    }

    pub fn low_time_us(&self) -> u32 {
        self.with(|inner| inner.low_time_us)
    }

    pub fn mode(&self) -> PwmMode {
        self.with(|inner| inner.mode)
    }

    pub fn start(&self) {
        self.with(Inner::start);
    }

    /// Cancels both timers. The pin keeps its current level.
    ///
    /// Safe to call repeatedly. Configuration calls still update the channel
    /// but nothing toggles until [`start`](Self::start).
    pub fn stop(&self) {
        self.with(Inner::stop);
    }

    /// Stops the channel and hands back the pin and both timers.
    pub fn release(self) -> (P, S, T) {
        let mut inner = self.inner.into_inner().into_inner();
        inner.stop();

        (inner.pin, inner.switch_timer, inner.period_timer)
    }

    /// Period timer interrupt entry point: starts a new cycle.
    ///
    /// # Errors
    ///
    /// [`SoftPwmError::Pin`] if the pin cannot be driven.
    pub fn period_tick(&self) -> Result<(), P::Error> {
        self.with(Inner::period_tick)
    }

    /// Switch timer interrupt entry point: ends the high phase of the cycle.
    ///
    /// # Errors
    ///
    /// [`SoftPwmError::Pin`] if the pin cannot be driven.
    pub fn switch_low(&self) -> Result<(), P::Error> {
        self.with(Inner::switch_low)
    }
}

impl<P, S, T> From<&SoftPwm<P, S, T>> for f32
where
    P: OutputPin,
    S: OneShotTimer,
    T: PeriodicTimer,
{
    fn from(pwm: &SoftPwm<P, S, T>) -> Self {
        pwm.read()
    }
}
