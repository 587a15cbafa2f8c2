#![allow(dead_code)]

use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, OutputPin};
use spwm_pin::{OneShotTimer, PeriodicTimer, SoftPwm};
use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

pub type SimPwm = SoftPwm<SimPin, SimSwitchTimer, SimPeriodTimer>;

#[derive(Default)]
struct BenchState {
    now_us: u64,
    level: bool,
    edges: Vec<(u64, bool)>,
    pin_writes: usize,
    switch_deadline: Option<u64>,
    switch_arm_count: usize,
    period: Option<(u64, u32)>,
    period_start_count: usize,
}

/// Virtual microsecond clock shared by the simulated pin and timers.
#[derive(Clone, Default)]
pub struct Bench {
    state: Rc<RefCell<BenchState>>,
}

pub struct SimPin(Rc<RefCell<BenchState>>);
pub struct SimSwitchTimer(Rc<RefCell<BenchState>>);
pub struct SimPeriodTimer(Rc<RefCell<BenchState>>);

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl SimPin {
    fn drive(&mut self, level: bool) {
        let mut state = self.0.borrow_mut();
        state.pin_writes += 1;

        if state.level != level {
            state.level = level;
            let now = state.now_us;
            state.edges.push((now, level));
        }
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

impl OneShotTimer for SimSwitchTimer {
    fn arm(&mut self, delay_us: u32) {
        let mut state = self.0.borrow_mut();
        state.switch_deadline = Some(state.now_us + u64::from(delay_us));
        state.switch_arm_count += 1;
    }

    fn cancel(&mut self) {
        self.0.borrow_mut().switch_deadline = None;
    }
}

impl PeriodicTimer for SimPeriodTimer {
    fn start(&mut self, interval_us: u32) {
        let mut state = self.0.borrow_mut();
        state.period = Some((state.now_us + u64::from(interval_us), interval_us));
        state.period_start_count += 1;
    }

    fn cancel(&mut self) {
        self.0.borrow_mut().period = None;
    }
}

enum Event {
    Switch,
    Period,
}

impl Bench {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parts(&self) -> (SimPin, SimSwitchTimer, SimPeriodTimer) {
        (
            SimPin(Rc::clone(&self.state)),
            SimSwitchTimer(Rc::clone(&self.state)),
            SimPeriodTimer(Rc::clone(&self.state)),
        )
    }

    pub fn channel(&self) -> SimPwm {
        let (pin, switch_timer, period_timer) = self.parts();
        SoftPwm::new(pin, switch_timer, period_timer).unwrap()
    }

    pub fn now(&self) -> u64 {
        self.state.borrow().now_us
    }

    pub fn level(&self) -> bool {
        self.state.borrow().level
    }

    pub fn edges(&self) -> Vec<(u64, bool)> {
        self.state.borrow().edges.clone()
    }

    pub fn edges_since(&self, since_us: u64) -> Vec<(u64, bool)> {
        self.state
            .borrow()
            .edges
            .iter()
            .copied()
            .filter(|&(at, _)| at >= since_us)
            .collect()
    }

    pub fn pin_writes(&self) -> usize {
        self.state.borrow().pin_writes
    }

    pub fn switch_armed(&self) -> bool {
        self.state.borrow().switch_deadline.is_some()
    }

    pub fn switch_arm_count(&self) -> usize {
        self.state.borrow().switch_arm_count
    }

    pub fn period_interval(&self) -> Option<u32> {
        self.state.borrow().period.map(|(_, interval)| interval)
    }

    pub fn next_tick(&self) -> Option<u64> {
        self.state.borrow().period.map(|(next, _)| next)
    }

    pub fn period_start_count(&self) -> usize {
        self.state.borrow().period_start_count
    }

    fn next_event(&self, until_us: u64) -> Option<(u64, Event)> {
        let state = self.state.borrow();
        let switch = state.switch_deadline.filter(|&at| at <= until_us);
        let period = state.period.map(|(at, _)| at).filter(|&at| at <= until_us);

        // a switch due together with a tick still belongs to the old cycle
        match (switch, period) {
            (Some(s), Some(p)) if s <= p => Some((s, Event::Switch)),
            (_, Some(p)) => Some((p, Event::Period)),
            (Some(s), None) => Some((s, Event::Switch)),
            (None, None) => None,
        }
    }

    /// Advances the clock to `until_us`, firing every timer expiry on the way
    /// in timestamp order.
    pub fn run_until(&self, pwm: &SimPwm, until_us: u64) {
        while let Some((at, event)) = self.next_event(until_us) {
            {
                let mut state = self.state.borrow_mut();
                state.now_us = at;

                match event {
                    Event::Switch => state.switch_deadline = None,
                    Event::Period => {
                        if let Some((next, interval)) = state.period {
                            state.period = Some((next + u64::from(interval), interval));
                        }
                    }
                }
            }

            match event {
                Event::Switch => pwm.switch_low().unwrap(),
                Event::Period => pwm.period_tick().unwrap(),
            }
        }

        self.state.borrow_mut().now_us = until_us;
    }

    pub fn run_for(&self, pwm: &SimPwm, duration_us: u64) {
        let until = self.now() + duration_us;
        self.run_until(pwm, until);
    }

    /// High phase lengths of every complete pulse that started at or after `since_us`.
    pub fn high_times_since(&self, since_us: u64) -> Vec<u64> {
        let edges = self.edges_since(since_us);

        edges
            .windows(2)
            .filter_map(|pair| match pair {
                [(rise, true), (fall, false)] => Some(fall - rise),
                _ => None,
            })
            .collect()
    }

    /// Times of every rising edge at or after `since_us`.
    pub fn rising_edges_since(&self, since_us: u64) -> Vec<u64> {
        self.edges_since(since_us)
            .into_iter()
            .filter(|&(_, level)| level)
            .map(|(at, _)| at)
            .collect()
    }
}
