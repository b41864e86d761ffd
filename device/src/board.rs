//! Drive-level services of the board: run/fault state, watchdog and the
//! software interrupts that carry the bridge's service ticks.

use core::sync::atomic::{AtomicU8, Ordering};

use embassy_stm32::interrupt::{self, InterruptExt, Priority};
use embassy_stm32::peripherals::IWDG;
use embassy_stm32::wdg::IndependentWatchdog;
use oxibridge::{Platform, Service};

/// Watchdog timeout; longer than the slowest commutation step.
pub const WATCHDOG_TIMEOUT_US: u32 = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum DriveState {
    Stopped = 0,
    Running = 1,
    Faulted = 2,
}

/// Global drive state
static DRIVE_STATE: AtomicU8 = AtomicU8::new(DriveState::Stopped as u8);

/// Set drive state
pub fn set_drive_state(state: DriveState) {
    DRIVE_STATE.store(state as u8, Ordering::Relaxed);
}

/// Get drive state
pub fn get_drive_state() -> DriveState {
    match DRIVE_STATE.load(Ordering::Relaxed) {
        0 => DriveState::Stopped,
        1 => DriveState::Running,
        _ => DriveState::Faulted,
    }
}

pub struct Board<'d> {
    watchdog: IndependentWatchdog<'d, IWDG>,
    adc_masked: bool,
}

impl<'d> Board<'d> {
    pub fn new(watchdog: IndependentWatchdog<'d, IWDG>) -> Self {
        Self {
            watchdog,
            adc_masked: false,
        }
    }

    /// Start the watchdog. From here on it must be reloaded within
    /// [`WATCHDOG_TIMEOUT_US`].
    pub fn unleash_watchdog(&mut self) {
        self.watchdog.unleash();
    }

    /// Priorities and enables for the period interrupt and the two service
    /// interrupts below it.
    pub fn enable_interrupts() {
        interrupt::TIM1_UP_TIM16.set_priority(Priority::P1);
        interrupt::SPI2.set_priority(Priority::P3);
        interrupt::SPI3.set_priority(Priority::P4);

        // SAFETY: handlers for all three are defined in main.rs
        unsafe {
            interrupt::SPI2.enable();
            interrupt::SPI3.enable();
            interrupt::TIM1_UP_TIM16.enable();
        }
    }
}

impl Platform for Board<'_> {
    fn is_drive_running(&self) -> bool {
        get_drive_state() == DriveState::Running
    }

    fn is_drive_faulted(&self) -> bool {
        get_drive_state() == DriveState::Faulted
    }

    fn reload_watchdog(&mut self) {
        self.watchdog.pet();
    }

    fn trigger(&mut self, service: Service) {
        match service {
            Service::Waveform => interrupt::SPI2.pend(),
            Service::Millisecond => interrupt::SPI3.pend(),
        }
    }

    fn set_adc_interrupts(&mut self, enabled: bool) {
        // only restore what was masked here; the ADC may not be in use
        if enabled {
            if core::mem::take(&mut self.adc_masked) {
                // SAFETY: it was enabled, with a handler, before we masked it
                unsafe { interrupt::ADC1_2.enable() };
            }
        } else if interrupt::ADC1_2.is_enabled() {
            interrupt::ADC1_2.disable();
            self.adc_masked = true;
        }
    }
}
