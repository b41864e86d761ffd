//! Bridge configuration: PWM clock, frequency selector, dead time and
//! modulation settings.

use thiserror::Error;

use crate::pulse;

/// Period rate used while the bridge is off. Only keeps the ADC trigger
/// alive; the outputs are disabled at this rate.
pub const IDLE_FREQUENCY_HZ: u32 = 1000;

/// Selectable PWM carrier frequencies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmFrequency {
    F8k,
    F12k5,
    F16k,
    #[default]
    F20k,
    F25k,
    F40k,
    F50k,
    F80k,
}

impl PwmFrequency {
    /// Carrier frequency in Hz.
    pub const fn hz(self) -> u32 {
        match self {
            Self::F8k => 8_000,
            Self::F12k5 => 12_500,
            Self::F16k => 16_000,
            Self::F20k => 20_000,
            Self::F25k => 25_000,
            Self::F40k => 40_000,
            Self::F50k => 50_000,
            Self::F80k => 80_000,
        }
    }
}

/// Commutation strategy driven by the layer above.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Modulation {
    #[default]
    Trapezoid,
    Sine,
}

/// Current recirculation pattern during the off part of a PWM cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecayMode {
    #[default]
    Fast,
    Slow,
}

/// Input clock of the PWM generators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmClock {
    pub hz: u32,
}

impl Default for PwmClock {
    fn default() -> Self {
        Self { hz: 50_000_000 } // 20 ns per tick
    }
}

impl PwmClock {
    pub const fn new(hz: u32) -> Self {
        Self { hz }
    }

    /// Width of one clock tick in nanoseconds.
    pub const fn tick_ns(&self) -> u32 {
        1_000_000_000 / self.hz
    }

    /// Number of clock ticks in one period at `freq_hz`.
    pub const fn period_ticks(&self, freq_hz: u32) -> u32 {
        self.hz / freq_hz
    }
}

/// Bridge settings, normally sourced from the parameter store of the drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeSettings {
    pub frequency: PwmFrequency,
    /// Dead time in PWM clock ticks, applied to both edges.
    pub dead_time: u32,
    /// Minimum pulse width in units of 100 ns.
    pub min_pulse: u32,
    /// Number of extra PWM periods between waveform updates.
    pub update_rate: u32,
    pub modulation: Modulation,
    pub decay: DecayMode,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            frequency: PwmFrequency::F20k,
            dead_time: 3,   // 80 ns including the hardware's extra count
            min_pulse: 25,  // 2.5 us
            update_rate: 0, // every period
            modulation: Modulation::Trapezoid,
            decay: DecayMode::Fast,
        }
    }
}

impl BridgeSettings {
    /// Check that a valid duty cycle exists for these settings on `clock`.
    pub fn validate(&self, clock: &PwmClock) -> Result<(), ConfigError> {
        if clock.hz == 0 || 1_000_000_000 % clock.hz != 0 {
            return Err(ConfigError::InvalidClock(clock.hz));
        }

        let period = clock.period_ticks(self.frequency.hz());
        let min_pulse = self.min_pulse_ticks(clock)?;
        if min_pulse >= period / 2 {
            return Err(ConfigError::PulseTooWide { min_pulse, period });
        }

        Ok(())
    }

    /// Shortest permissible pulse on `clock`, in ticks.
    pub fn min_pulse_ticks(&self, clock: &PwmClock) -> Result<u32, ConfigError> {
        pulse::min_pulse_width(self.dead_time, self.min_pulse, clock.tick_ns()).ok_or(
            ConfigError::OutOfRange {
                dead_time: self.dead_time,
                min_pulse: self.min_pulse,
            },
        )
    }
}

/// Rejected bridge configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("PWM clock of {0} Hz is not a whole number of nanoseconds per tick")]
    InvalidClock(u32),
    #[error("minimum pulse of {min_pulse} ticks leaves no duty cycle in a {period}-tick period")]
    PulseTooWide { min_pulse: u32, period: u32 },
    #[error("dead time {dead_time} with minimum pulse {min_pulse} is out of range")]
    OutOfRange { dead_time: u32, min_pulse: u32 },
}
