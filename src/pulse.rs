//! Minimum pulse width derived from dead time and the minimum-pulse setting.

/// Shortest permissible pulse, in PWM clock ticks.
///
/// The dead-band unit eats `dead_time + 1` clock ticks from every pulse, so
/// that time is added on top of `min_pulse` (units of 100 ns) before rounding
/// up to whole ticks of `tick_ns`. With no minimum-pulse setting an extra tick
/// keeps zero-width pulses out of the dead-band unit.
///
/// Returns `None` when the settings do not fit in 32 bits of nanoseconds.
pub fn min_pulse_width(dead_time: u32, min_pulse: u32, tick_ns: u32) -> Option<u32> {
    let dead_band_ns = dead_time.checked_add(1)?.checked_mul(tick_ns)?;
    let ns = dead_band_ns.checked_add(min_pulse.checked_mul(100)?)?;
    let mut ticks = ns.div_ceil(tick_ns);

    if min_pulse == 0 {
        ticks = ticks.checked_add(1)?;
    }

    Some(ticks)
}
