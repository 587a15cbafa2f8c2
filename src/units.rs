const MICROS_PER_MILLI: u32 = 1_000;
const MICROS_PER_SECOND: f64 = 1_000_000.0;

pub(crate) fn millis_to_micros(ms: u32) -> Option<u32> {
    ms.checked_mul(MICROS_PER_MILLI)
}

/// Converts a period in seconds, `None` if it lands outside `1..=u32::MAX` us.
pub(crate) fn seconds_to_period_micros(seconds: f32) -> Option<u32> {
    let us = round_half_up(f64::from(seconds) * MICROS_PER_SECOND);

    if !us.is_finite() || us < 1.0 || us > f64::from(u32::MAX) {
        return None;
    }

    Some(us as u32)
}

pub(crate) fn pulse_micros_to_duty(pulse_us: f64, period_us: u32) -> f32 {
    (pulse_us / f64::from(period_us)) as f32
}

pub(crate) fn pulse_seconds_to_micros(seconds: f32) -> f64 {
    f64::from(seconds) * MICROS_PER_SECOND
}

pub(crate) fn pulse_millis_to_micros(ms: u32) -> f64 {
    f64::from(ms) * f64::from(MICROS_PER_MILLI)
}

/// `round(period_us * duty)`, for a duty already saturated to `[0, 1]`.
pub(crate) fn high_time_micros(period_us: u32, duty_cycle: f32) -> u32 {
    let high = round_half_up(f64::from(period_us) * f64::from(duty_cycle));

    (high as u32).min(period_us)
}

// core has no f64::round; truncation is only correct for non-negative values
fn round_half_up(value: f64) -> f64 {
    if value.is_finite() && value.abs() < 4.0e18 {
        (value + 0.5) as i64 as f64
    } else {
        value
    }
}
