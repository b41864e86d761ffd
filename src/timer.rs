//! Capability interface over the three PWM generators of the inverter bridge.
//!
//! Each generator drives one half-bridge leg through a complementary pair of
//! outputs (high side, low side). The generators count in lockstep, and the
//! controller treats them as one timer: periods and pulse widths are staged
//! into holding registers and only take effect when
//! [`BridgeTimer::commit_synchronized`] is followed by the next period
//! boundary.

use bitflags::bitflags;

/// Half-bridge leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    A,
    B,
    C,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    /// Output driving the high-side switch of this leg.
    pub const fn high(self) -> Output {
        match self {
            Self::A => Output::AHigh,
            Self::B => Output::BHigh,
            Self::C => Output::CHigh,
        }
    }

    /// Output driving the low-side switch of this leg.
    pub const fn low(self) -> Output {
        match self {
            Self::A => Output::ALow,
            Self::B => Output::BLow,
            Self::C => Output::CLow,
        }
    }
}

/// One of the six gate-driver outputs, numbered in generator order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Output {
    AHigh = 0,
    ALow = 1,
    BHigh = 2,
    BLow = 3,
    CHigh = 4,
    CLow = 5,
}

impl Output {
    pub const ALL: [Output; 6] = [
        Output::AHigh,
        Output::ALow,
        Output::BHigh,
        Output::BLow,
        Output::CHigh,
        Output::CLow,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn phase(self) -> Phase {
        match self {
            Self::AHigh | Self::ALow => Phase::A,
            Self::BHigh | Self::BLow => Phase::B,
            Self::CHigh | Self::CLow => Phase::C,
        }
    }

    pub const fn is_low_side(self) -> bool {
        (self as u8) & 1 == 1
    }

    pub const fn mask(self) -> OutputMask {
        OutputMask::from_bits_truncate(1 << (self as u8))
    }
}

bitflags! {
    /// Set of gate-driver outputs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OutputMask: u8 {
        const A_HIGH = 1 << 0;
        const A_LOW = 1 << 1;
        const B_HIGH = 1 << 2;
        const B_LOW = 1 << 3;
        const C_HIGH = 1 << 4;
        const C_LOW = 1 << 5;

        const HIGH_SIDE = Self::A_HIGH.bits() | Self::B_HIGH.bits() | Self::C_HIGH.bits();
        const LOW_SIDE = Self::A_LOW.bits() | Self::B_LOW.bits() | Self::C_LOW.bits();
        const ALL = Self::HIGH_SIDE.bits() | Self::LOW_SIDE.bits();
    }
}

/// Hardware operations the bridge controller needs from the PWM peripheral.
///
/// Implementations must not let a staged period or pulse width reach the
/// outputs before [`commit_synchronized`](Self::commit_synchronized), and
/// must then apply all of them on the same period boundary.
pub trait BridgeTimer {
    /// Stage `ticks` as the period of all three generators.
    fn set_period(&mut self, ticks: u32);

    /// Stage the compare value of one output.
    ///
    /// Timers that derive each low-side output from its high-side compare
    /// may ignore low-side widths. On those the slow-decay low-side width
    /// has no effect.
    fn set_pulse_width(&mut self, output: Output, ticks: u32);

    /// Enable or disable propagation of the outputs in `mask` to the gate
    /// drivers. Takes effect immediately.
    fn set_outputs(&mut self, mask: OutputMask, enabled: bool);

    /// Invert (or restore) the polarity of the outputs in `mask`.
    fn set_inverted(&mut self, mask: OutputMask, inverted: bool);

    /// Insert `rise` and `fall` ticks of dead time on every complementary pair.
    fn enable_dead_band(&mut self, rise: u32, fall: u32);

    fn disable_dead_band(&mut self);

    /// Release everything staged since the last commit to all generators at
    /// their next shared period boundary.
    fn commit_synchronized(&mut self);

    /// Acknowledge the zero-count interrupt of the primary generator.
    fn clear_period_interrupt(&mut self);

    /// Start the generators with synchronised time bases, arm the
    /// zero-count interrupt, and force every output inactive on a fault or
    /// debug halt.
    fn start(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_numbering() {
        for (i, output) in Output::ALL.iter().enumerate() {
            assert_eq!(output.index(), i);
            assert_eq!(output.is_low_side(), i % 2 == 1);
        }
        assert_eq!(Phase::B.high(), Output::BHigh);
        assert_eq!(Phase::C.low(), Output::CLow);
        assert_eq!(Output::BLow.phase(), Phase::B);
    }

    #[test]
    fn test_masks() {
        assert_eq!(Output::CLow.mask(), OutputMask::C_LOW);
        assert_eq!(OutputMask::ALL.bits(), 0b11_1111);
        assert_eq!(OutputMask::LOW_SIDE.bits(), 0b10_1010);
        assert_eq!(OutputMask::ALL - OutputMask::HIGH_SIDE, OutputMask::LOW_SIDE);

        let lows = Output::ALL
            .iter()
            .filter(|o| o.is_low_side())
            .fold(OutputMask::empty(), |m, o| m | o.mask());
        assert_eq!(lows, OutputMask::LOW_SIDE);
    }
}
