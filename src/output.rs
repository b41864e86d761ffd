//! Output state machine: Off, Precharge, Running and phase-subset drive.

use crate::controller::BridgeController;
use crate::duty::DutyCycle;
use crate::platform::Platform;
use crate::timer::{BridgeTimer, OutputMask};

/// What the bridge outputs are currently doing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    /// All outputs disabled, idling at the sampling rate.
    #[default]
    Off,
    /// Low sides switching to charge the high-side bootstrap capacitors.
    Precharge,
    /// All six outputs enabled behind the dead band.
    Running,
    /// Only a subset of outputs enabled (trapezoid commutation, braking).
    Braking,
}

impl<T: BridgeTimer, P: Platform> BridgeController<T, P> {
    fn faulted(&self, operation: &str) -> bool {
        let faulted = self.platform.is_drive_faulted();
        if faulted {
            warn!("{} ignored: drive faulted", operation);
        }
        faulted
    }

    /// Restart the synchronised time base bookkeeping when leaving Off.
    fn restart_timing(&mut self) {
        if self.mode == OutputMode::Off {
            self.period_count = 0;
            self.ms_accumulator = 0;
        }
    }

    /// Start charging the bootstrap capacitors.
    ///
    /// The low-side outputs are enabled by the next period interrupt, not
    /// here, so the first pulse is a whole one.
    pub fn output_precharge(&mut self) {
        if self.faulted("precharge") {
            return;
        }
        self.platform.reload_watchdog();

        self.clear_dead_band();
        self.timer.set_outputs(OutputMask::ALL, false);
        self.load_running_period();
        self.pending_duty.clear();
        self.commit_plan(DutyCycle::PRECHARGE, None);
        self.precharge_pending = true;

        self.restart_timing();
        self.mode = OutputMode::Precharge;
        info!("precharge: {} ticks", self.loaded_period);
    }

    /// Enable all six outputs behind the dead band.
    pub fn output_on(&mut self) {
        if self.faulted("output on") {
            return;
        }
        self.platform.reload_watchdog();

        if self.mode == OutputMode::Off {
            self.load_running_period();
            let duty = self.pending_duty.take().unwrap_or(self.duty);
            self.commit(duty);
            self.restart_timing();
        }

        self.set_dead_band();
        self.timer.set_outputs(OutputMask::ALL, true);
        self.precharge_pending = false;

        self.mode = OutputMode::Running;
        info!("outputs on, min pulse {} ticks", self.min_pulse_ticks);
    }

    /// Drive only the outputs in `enable`, disabling the rest.
    ///
    /// The ADC interrupts that sample against the output state are masked
    /// while the outputs change.
    pub fn output_trapezoid(&mut self, enable: OutputMask) {
        if self.faulted("trapezoid") {
            return;
        }

        self.platform.set_adc_interrupts(false);
        self.platform.reload_watchdog();

        self.timer.set_outputs(!enable, false);
        self.timer.set_outputs(enable, true);

        self.platform.set_adc_interrupts(true);

        if self.mode != OutputMode::Braking {
            debug!("phase-subset drive");
        }
        self.mode = OutputMode::Braking;
    }

    /// Disable every output and fall back to the idle period.
    ///
    /// Never fault-gated; anything still queued is discarded.
    pub fn output_off(&mut self) {
        self.timer.set_outputs(OutputMask::ALL, false);

        self.pending_duty.clear();
        self.pending_frequency.clear();
        self.precharge_pending = false;

        self.load_idle_period();
        self.clear_dead_band();
        self.commit(DutyCycle::HALF);

        if self.mode != OutputMode::Off {
            info!("outputs off");
        }
        self.mode = OutputMode::Off;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeSettings;
    use crate::mock::mock_bridge;
    use crate::six_step::CommutationStep;

    #[test]
    fn test_precharge_defers_low_side_enable() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        bridge.output_precharge();

        let timer = bridge.timer();
        assert_eq!(bridge.mode(), OutputMode::Precharge);
        assert_eq!(timer.enabled, OutputMask::empty());
        assert_eq!(timer.dead_band, None);
        assert_eq!(timer.period, 2500);
        assert_eq!(timer.widths, [1249; 6]);
        assert_eq!(bridge.platform().watchdog_reloads, 1);

        bridge.on_period();
        assert_eq!(bridge.timer().enabled, OutputMask::LOW_SIDE);
        bridge.on_period();
        assert_eq!(bridge.timer().enabled, OutputMask::LOW_SIDE);
    }

    #[test]
    fn test_precharge_then_on() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        bridge.output_precharge();
        bridge.on_period();
        bridge.output_on();

        let timer = bridge.timer();
        assert_eq!(bridge.mode(), OutputMode::Running);
        assert_eq!(timer.enabled, OutputMask::ALL);
        assert_eq!(timer.dead_band, Some((3, 3)));
        // still the precharge widths until a new duty cycle lands
        assert_eq!(timer.widths, [1249; 6]);
    }

    #[test]
    fn test_on_from_off_loads_running_period() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        bridge.set_duty_cycle(DutyCycle::uniform(16384));
        bridge.output_on();

        let timer = bridge.timer();
        assert_eq!(timer.period, 2500);
        assert_eq!(timer.widths, [625; 6]);
        assert_eq!(timer.enabled, OutputMask::ALL);
        assert!(!bridge.pending_duty.is_full());
    }

    #[test]
    fn test_trapezoid_selects_outputs() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        bridge.output_on();

        let step = CommutationStep::Step2;
        bridge.output_trapezoid(step.mask());

        assert_eq!(bridge.mode(), OutputMode::Braking);
        assert_eq!(bridge.timer().enabled, OutputMask::B_HIGH | OutputMask::C_LOW);
        assert_eq!(bridge.platform().adc_masks, 1);
        assert!(bridge.platform().adc_enabled);
        assert_eq!(bridge.platform().watchdog_reloads, 2);
    }

    #[test]
    fn test_enabling_transitions_are_fault_gated() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        bridge.platform_mut().faulted = true;
        let timer = bridge.timer().clone();
        let platform = bridge.platform().clone();

        bridge.output_precharge();
        bridge.output_on();
        bridge.output_trapezoid(OutputMask::A_HIGH | OutputMask::B_LOW);

        assert_eq!(bridge.timer(), &timer);
        assert_eq!(bridge.platform(), &platform);
        assert_eq!(bridge.mode(), OutputMode::Off);
        assert!(!bridge.precharge_pending);
    }

    #[test]
    fn test_off_ignores_fault_latch() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        bridge.output_on();
        bridge.platform_mut().faulted = true;
        bridge.output_off();

        let timer = bridge.timer();
        assert_eq!(bridge.mode(), OutputMode::Off);
        assert_eq!(timer.enabled, OutputMask::empty());
        assert_eq!(timer.dead_band, None);
        assert_eq!(timer.period, 50_000);
        assert_eq!(timer.widths, [25_000; 6]);
    }

    #[test]
    fn test_off_discards_queued_work() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        bridge.platform_mut().running = true;
        bridge.output_precharge();
        bridge.set_duty_cycle(DutyCycle::uniform(60_000));
        bridge.set_frequency(crate::config::PwmFrequency::F8k).unwrap();

        bridge.output_off();
        let commits = bridge.timer().commits;
        bridge.on_period();

        assert_eq!(bridge.timer().commits, commits);
        assert_eq!(bridge.timer().enabled, OutputMask::empty());
        assert_eq!(bridge.timer().period, 50_000);
    }

    #[test]
    fn test_off_is_idempotent() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        bridge.output_off();
        let once = bridge.timer().clone();
        bridge.output_off();

        let twice = bridge.timer();
        assert_eq!(twice.widths, once.widths);
        assert_eq!(twice.period, once.period);
        assert_eq!(twice.enabled, once.enabled);
    }

    #[test]
    fn test_leaving_off_restarts_timing() {
        // sine leaves the period count to the waveform service
        let mut bridge = mock_bridge(BridgeSettings {
            modulation: crate::config::Modulation::Sine,
            ..Default::default()
        })
        .unwrap();
        for _ in 0..7 {
            bridge.on_period();
        }
        assert_eq!(bridge.period_count(), 7);
        bridge.output_precharge();
        assert_eq!(bridge.period_count(), 0);
        assert_eq!(bridge.ms_accumulator, 0);

        bridge.on_period();
        bridge.output_on();
        // precharge -> running keeps counting
        assert_eq!(bridge.period_count(), 1);
    }
}
