//! Six-step trapezoid commutation sequence.

use crate::timer::{OutputMask, Phase};

/// 6-step commutation state
///
/// Each step energizes 2 of the 3 phases:
/// - One phase sourcing current through its high side
/// - One phase sinking current through its low side
/// - One phase floating (both switches off)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommutationStep {
    Step0 = 0, // A+, B-, C floating
    Step1 = 1, // A+, C-, B floating
    Step2 = 2, // B+, C-, A floating
    Step3 = 3, // B+, A-, C floating
    Step4 = 4, // C+, A-, B floating
    Step5 = 5, // C+, B-, A floating
}

impl CommutationStep {
    /// Advance to the next commutation step
    pub fn next(self) -> Self {
        match self {
            Self::Step0 => Self::Step1,
            Self::Step1 => Self::Step2,
            Self::Step2 => Self::Step3,
            Self::Step3 => Self::Step4,
            Self::Step4 => Self::Step5,
            Self::Step5 => Self::Step0,
        }
    }

    /// Step number (0-5)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// (sourcing phase, sinking phase)
    pub fn phases(self) -> (Phase, Phase) {
        match self {
            Self::Step0 => (Phase::A, Phase::B),
            Self::Step1 => (Phase::A, Phase::C),
            Self::Step2 => (Phase::B, Phase::C),
            Self::Step3 => (Phase::B, Phase::A),
            Self::Step4 => (Phase::C, Phase::A),
            Self::Step5 => (Phase::C, Phase::B),
        }
    }

    /// Outputs to enable for this step, as taken by
    /// [`BridgeController::output_trapezoid`](crate::controller::BridgeController::output_trapezoid).
    pub fn mask(self) -> OutputMask {
        let (source, sink) = self.phases();
        source.high().mask() | sink.low().mask()
    }

    /// Step for a three-bit Hall sensor code. Codes 0 and 7 are not valid
    /// rotor positions.
    pub fn from_hall(code: u8) -> Option<Self> {
        match code & 0b111 {
            5 => Some(Self::Step3),
            1 => Some(Self::Step4),
            3 => Some(Self::Step5),
            2 => Some(Self::Step0),
            6 => Some(Self::Step1),
            4 => Some(Self::Step2),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_sequence() {
        let mut step = CommutationStep::Step0;
        for i in 1..=6 {
            step = step.next();
            assert_eq!(step.as_u8(), i % 6);
        }
    }

    #[test]
    fn test_masks_never_short_a_leg() {
        let mut step = CommutationStep::Step0;
        for _ in 0..6 {
            let mask = step.mask();
            assert_eq!(mask.bits().count_ones(), 2);
            for phase in Phase::ALL {
                assert!(!mask.contains(phase.high().mask() | phase.low().mask()));
            }
            step = step.next();
        }
        assert_eq!(CommutationStep::Step3.mask(), OutputMask::B_HIGH | OutputMask::A_LOW);
    }

    #[test]
    fn test_hall_sequence_follows_rotation() {
        // forward Hall order 5, 1, 3, 2, 6, 4
        let mut step = CommutationStep::from_hall(5).unwrap();
        for code in [1, 3, 2, 6, 4, 5] {
            let next = CommutationStep::from_hall(code).unwrap();
            assert_eq!(next, step.next());
            step = next;
        }
        assert_eq!(CommutationStep::from_hall(0), None);
        assert_eq!(CommutationStep::from_hall(7), None);
    }
}
