//! Duty-cycle to pulse-width conversion.

use crate::timer::{Output, Phase};

/// Denominator of a normalised duty-cycle fraction.
pub const FULL_SCALE: u32 = 65536;

/// Requested duty cycle per phase, as a fraction of [`FULL_SCALE`].
///
/// Values are not range checked; anything at or above full scale clamps to
/// the widest permissible pulse when committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyCycle {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self::HALF
    }
}

impl DutyCycle {
    /// 50%, used while the bridge is off.
    pub const HALF: Self = Self::uniform(32768);
    /// Just under 50%, used to charge the bootstrap capacitors.
    pub const PRECHARGE: Self = Self::uniform(50 * 65535 / 100);

    pub const fn new(a: u32, b: u32, c: u32) -> Self {
        Self { a, b, c }
    }

    pub const fn uniform(fraction: u32) -> Self {
        Self::new(fraction, fraction, fraction)
    }

    pub const fn phase(&self, phase: Phase) -> u32 {
        match phase {
            Phase::A => self.a,
            Phase::B => self.b,
            Phase::C => self.c,
        }
    }
}

/// Convert `fraction` of [`FULL_SCALE`] into ticks of `period`, keeping both
/// the pulse and its complement at least `min_pulse` ticks wide.
pub fn pulse_width(fraction: u32, period: u32, min_pulse: u32) -> u32 {
    let raw = u64::from(fraction) * u64::from(period) / u64::from(FULL_SCALE);
    let mut width = raw.min(u64::from(period)) as u32;

    if width < min_pulse {
        width = min_pulse;
    }
    if period.saturating_sub(width) < min_pulse {
        width = period.saturating_sub(min_pulse);
    }

    width
}

/// Compare values for all six outputs, computed in one go so they can be
/// written and committed together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulsePlan {
    /// Indexed by [`Output::index`].
    pub widths: [u32; 6],
    /// Mean of the three phase widths.
    pub average: u32,
    /// `average` as a fraction of the period, 0..=10000.
    pub aggregate: u32,
}

impl PulsePlan {
    /// Plan the widths for `duty`. When `low_side` is given, it replaces the
    /// computed width on every low-side output.
    pub fn compute(duty: &DutyCycle, period: u32, min_pulse: u32, low_side: Option<u32>) -> Self {
        let mut widths = [0; 6];
        let mut total = 0u64;

        for phase in Phase::ALL {
            let width = pulse_width(duty.phase(phase), period, min_pulse);
            total += u64::from(width);
            widths[phase.high().index()] = width;
            widths[phase.low().index()] = low_side.unwrap_or(width);
        }

        let average = (total / 3) as u32;
        let aggregate = match period {
            0 => 0,
            p => (u64::from(average) * 10_000 / u64::from(p)) as u32,
        };

        Self {
            widths,
            average,
            aggregate,
        }
    }

    pub fn width(&self, output: Output) -> u32 {
        self.widths[output.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_scale_is_unclamped() {
        assert_eq!(pulse_width(32768, 1000, 50), 500);
    }

    #[test]
    fn test_zero_clamps_to_min_pulse() {
        assert_eq!(pulse_width(0, 1000, 50), 50);
    }

    #[test]
    fn test_full_scale_leaves_room_for_complement() {
        // raw width 999 leaves a 1-tick complement
        assert_eq!(pulse_width(65535, 1000, 50), 950);
        assert_eq!(pulse_width(FULL_SCALE, 1000, 50), 950);
        assert_eq!(pulse_width(u32::MAX, 1000, 50), 950);
    }

    #[test]
    fn test_width_always_within_bounds() {
        for (period, min) in [(1000, 50), (2500, 129), (6250, 129), (625, 2)] {
            for fraction in (0..FULL_SCALE).step_by(97).chain([FULL_SCALE - 1]) {
                let w = pulse_width(fraction, period, min);
                assert!(w >= min, "{fraction}: {w} < {min}");
                assert!(w <= period - min, "{fraction}: {w} > {}", period - min);
            }
        }
    }

    #[test]
    fn test_plan_average_and_aggregate() {
        let plan = PulsePlan::compute(&DutyCycle::new(0, 32768, 65535), 1000, 50, None);
        assert_eq!(plan.width(Output::AHigh), 50);
        assert_eq!(plan.width(Output::ALow), 50);
        assert_eq!(plan.width(Output::BHigh), 500);
        assert_eq!(plan.width(Output::CLow), 950);
        assert_eq!(plan.average, 500);
        assert_eq!(plan.aggregate, 5000);
    }

    #[test]
    fn test_plan_low_side_override() {
        let plan = PulsePlan::compute(&DutyCycle::uniform(16384), 1000, 50, Some(997));
        for phase in Phase::ALL {
            assert_eq!(plan.width(phase.high()), 250);
            assert_eq!(plan.width(phase.low()), 997);
        }
        // the override never feeds the aggregate
        assert_eq!(plan.aggregate, 2500);
    }

    #[test]
    fn test_precharge_fraction() {
        assert_eq!(DutyCycle::PRECHARGE.a, 32767);
        assert_eq!(PulsePlan::compute(&DutyCycle::PRECHARGE, 2500, 129, None).average, 1249);
    }
}
