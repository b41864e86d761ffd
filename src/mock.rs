//! Simulated bridge timer and drive platform for host tests.

use crate::config::{BridgeSettings, ConfigError, PwmClock};
use crate::controller::BridgeController;
use crate::platform::{Platform, Service};
use crate::timer::{BridgeTimer, Output, OutputMask};

pub type MockController = BridgeController<MockBridge, MockPlatform>;

/// Build a controller on the simulated hardware with the default 50 MHz clock.
pub fn mock_bridge(settings: BridgeSettings) -> Result<MockController, ConfigError> {
    BridgeController::new(
        MockBridge::default(),
        MockPlatform::default(),
        PwmClock::default(),
        settings,
    )
}

/// Records register writes. Periods and widths sit in holding registers
/// until the next synchronised commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockBridge {
    pub staged_period: u32,
    pub staged_widths: [u32; 6],
    /// Values in effect after the last commit.
    pub period: u32,
    pub widths: [u32; 6],
    pub commits: u32,

    pub enabled: OutputMask,
    pub inverted: OutputMask,
    /// (rise, fall) while the dead band is enabled.
    pub dead_band: Option<(u32, u32)>,
    pub interrupt_clears: u32,
    pub started: bool,
}

impl BridgeTimer for MockBridge {
    fn set_period(&mut self, ticks: u32) {
        self.staged_period = ticks;
    }

    fn set_pulse_width(&mut self, output: Output, ticks: u32) {
        self.staged_widths[output.index()] = ticks;
    }

    fn set_outputs(&mut self, mask: OutputMask, enabled: bool) {
        self.enabled.set(mask, enabled);
    }

    fn set_inverted(&mut self, mask: OutputMask, inverted: bool) {
        self.inverted.set(mask, inverted);
    }

    fn enable_dead_band(&mut self, rise: u32, fall: u32) {
        self.dead_band = Some((rise, fall));
    }

    fn disable_dead_band(&mut self) {
        self.dead_band = None;
    }

    fn commit_synchronized(&mut self) {
        self.period = self.staged_period;
        self.widths = self.staged_widths;
        self.commits += 1;
    }

    fn clear_period_interrupt(&mut self) {
        self.interrupt_clears += 1;
    }

    fn start(&mut self) {
        self.started = true;
    }
}

/// Drive state with settable run/fault flags and counters for everything
/// the bridge asks of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPlatform {
    pub running: bool,
    pub faulted: bool,
    pub watchdog_reloads: u32,
    pub waveform_triggers: u32,
    pub millisecond_triggers: u32,
    pub adc_enabled: bool,
    /// Times the ADC interrupts were masked.
    pub adc_masks: u32,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            running: false,
            faulted: false,
            watchdog_reloads: 0,
            waveform_triggers: 0,
            millisecond_triggers: 0,
            adc_enabled: true,
            adc_masks: 0,
        }
    }
}

impl Platform for MockPlatform {
    fn is_drive_running(&self) -> bool {
        self.running
    }

    fn is_drive_faulted(&self) -> bool {
        self.faulted
    }

    fn reload_watchdog(&mut self) {
        self.watchdog_reloads += 1;
    }

    fn trigger(&mut self, service: Service) {
        match service {
            Service::Waveform => self.waveform_triggers += 1,
            Service::Millisecond => self.millisecond_triggers += 1,
        }
    }

    fn set_adc_interrupts(&mut self, enabled: bool) {
        if !enabled {
            self.adc_masks += 1;
        }
        self.adc_enabled = enabled;
    }
}
