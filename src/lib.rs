//! Three-phase inverter bridge core.
//!
//! Keeps three PWM generators in lockstep: duty-cycle and frequency changes
//! are queued by the control loop and committed by the period interrupt at
//! the one instant all six outputs share a boundary. Also owns the dead band,
//! the bootstrap precharge sequence, the output state machine and the
//! waveform/millisecond service ticks derived from the PWM period.
//!
//! The hardware is reached only through [`BridgeTimer`] and [`Platform`], so
//! the whole control path runs on the host against [`mock`] types.
#![cfg_attr(not(test), no_std)]

#[macro_use]
pub(crate) mod fmt;

pub mod config;
pub mod controller;
pub mod duty;
pub mod mailbox;
pub mod output;
pub mod platform;
pub mod pulse;
pub mod scheduler;
pub mod shared;
pub mod six_step;
pub mod timer;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::{BridgeSettings, ConfigError, DecayMode, Modulation, PwmClock, PwmFrequency};
pub use controller::BridgeController;
pub use duty::DutyCycle;
pub use output::OutputMode;
pub use platform::{Platform, Service};
pub use shared::SharedBridge;
pub use six_step::CommutationStep;
pub use timer::{BridgeTimer, Output, OutputMask, Phase};
