//! The bridge controller: owns the PWM generators, the pending mailboxes and
//! the period bookkeeping.
//!
//! Mode transitions live in [`output`](crate::output) and the period
//! interrupt in [`scheduler`](crate::scheduler); both are further `impl`
//! blocks on [`BridgeController`].

use crate::config::{
    BridgeSettings, ConfigError, DecayMode, IDLE_FREQUENCY_HZ, Modulation, PwmClock, PwmFrequency,
};
use crate::duty::{DutyCycle, PulsePlan};
use crate::mailbox::Mailbox;
use crate::output::OutputMode;
use crate::platform::Platform;
use crate::timer::{BridgeTimer, Output, OutputMask};

/// Synchronised three-phase PWM bridge.
///
/// Producers (control loop, mode changes) and the period interrupt must not
/// run concurrently on the same controller; see
/// [`SharedBridge`](crate::shared::SharedBridge).
pub struct BridgeController<T, P> {
    pub(crate) timer: T,
    pub(crate) platform: P,
    pub(crate) clock: PwmClock,
    pub(crate) settings: BridgeSettings,

    /// Period for the configured running frequency.
    pub(crate) period_ticks: u32,
    /// Period currently programmed into the generators.
    pub(crate) loaded_period: u32,
    pub(crate) loaded_frequency_hz: u32,
    pub(crate) min_pulse_ticks: u32,
    pub(crate) dead_band: bool,

    pub(crate) pending_duty: Mailbox<DutyCycle>,
    pub(crate) pending_frequency: Mailbox<PwmFrequency>,
    pub(crate) precharge_pending: bool,

    pub(crate) period_count: u32,
    pub(crate) ms_accumulator: u32,

    pub(crate) mode: OutputMode,
    pub(crate) duty: DutyCycle,
    pub(crate) pulse_width: u32,
    pub(crate) aggregate_duty: u32,
}

impl<T: BridgeTimer, P: Platform> BridgeController<T, P> {
    /// Take ownership of the generators and bring them up in the Off state:
    /// outputs disabled and non-inverted, dead band cleared, 50% duty at the
    /// idle period, zero-count interrupt armed.
    pub fn new(
        timer: T,
        platform: P,
        clock: PwmClock,
        settings: BridgeSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate(&clock)?;

        let mut bridge = Self {
            timer,
            platform,
            clock,
            settings,
            period_ticks: clock.period_ticks(settings.frequency.hz()),
            loaded_period: 0,
            loaded_frequency_hz: 0,
            min_pulse_ticks: 0,
            dead_band: false,
            pending_duty: Mailbox::new(),
            pending_frequency: Mailbox::new(),
            precharge_pending: false,
            period_count: 0,
            ms_accumulator: 0,
            mode: OutputMode::Off,
            duty: DutyCycle::HALF,
            pulse_width: 0,
            aggregate_duty: 0,
        };

        bridge.timer.set_outputs(OutputMask::ALL, false);
        bridge.timer.set_inverted(OutputMask::ALL, false);
        bridge.clear_dead_band();
        bridge.load_idle_period();
        bridge.commit(DutyCycle::HALF);
        bridge.timer.start();

        info!(
            "bridge up: {} Hz running ({} ticks), min pulse {} ticks",
            settings.frequency.hz(),
            bridge.period_ticks,
            bridge.min_pulse_ticks
        );

        Ok(bridge)
    }

    /// Queue a new duty cycle for the next eligible period boundary.
    ///
    /// Only the most recent request before that boundary is committed.
    pub fn set_duty_cycle(&mut self, duty: DutyCycle) {
        if self.settings.modulation == Modulation::Sine {
            self.platform.reload_watchdog();
        }
        self.pending_duty.post(duty);
    }

    /// Select a new running frequency.
    ///
    /// While the drive is running the new period is applied together with
    /// the next duty-cycle commit; otherwise it takes effect on the next
    /// precharge or output-on.
    pub fn set_frequency(&mut self, frequency: PwmFrequency) -> Result<(), ConfigError> {
        self.reconfigure(BridgeSettings {
            frequency,
            ..self.settings
        })?;
        self.period_ticks = self.clock.period_ticks(frequency.hz());

        if self.platform.is_drive_running() {
            self.pending_frequency.post(frequency);
        }
        debug!("frequency -> {} Hz", frequency.hz());
        Ok(())
    }

    /// Change the dead time (in PWM ticks). Re-arms the dead band if it is
    /// active.
    pub fn set_dead_time(&mut self, dead_time: u32) -> Result<(), ConfigError> {
        self.reconfigure(BridgeSettings {
            dead_time,
            ..self.settings
        })?;

        if self.dead_band {
            self.set_dead_band();
        } else {
            self.update_min_pulse();
        }
        Ok(())
    }

    /// Change the minimum pulse (units of 100 ns).
    pub fn set_min_pulse(&mut self, min_pulse: u32) -> Result<(), ConfigError> {
        self.reconfigure(BridgeSettings {
            min_pulse,
            ..self.settings
        })?;
        self.update_min_pulse();
        Ok(())
    }

    /// Number of extra periods between duty-cycle commits.
    pub fn set_update_rate(&mut self, update_rate: u32) {
        self.settings.update_rate = update_rate;
    }

    pub fn set_modulation(&mut self, modulation: Modulation) {
        self.settings.modulation = modulation;
    }

    /// Takes effect with the next committed duty cycle.
    pub fn set_decay_mode(&mut self, decay: DecayMode) {
        self.settings.decay = decay;
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn min_pulse_width(&self) -> u32 {
        self.min_pulse_ticks
    }

    /// Average of the last committed phase widths, in ticks.
    pub fn pulse_width(&self) -> u32 {
        self.pulse_width
    }

    /// Last committed average width as a fraction of the period, 0..=10000.
    pub fn aggregate_duty(&self) -> u32 {
        self.aggregate_duty
    }

    /// Last committed duty cycle.
    pub fn duty_cycle(&self) -> DutyCycle {
        self.duty
    }

    /// Configured running frequency.
    pub fn frequency_hz(&self) -> u32 {
        self.settings.frequency.hz()
    }

    /// Period of the configured running frequency, in ticks.
    pub fn period_ticks(&self) -> u32 {
        self.period_ticks
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    fn reconfigure(&mut self, candidate: BridgeSettings) -> Result<(), ConfigError> {
        if let Err(e) = candidate.validate(&self.clock) {
            warn!("rejected bridge settings: {:?}", e);
            return Err(e);
        }
        self.settings = candidate;
        Ok(())
    }

    // stored settings have passed validation
    fn update_min_pulse(&mut self) {
        if let Ok(ticks) = self.settings.min_pulse_ticks(&self.clock) {
            self.min_pulse_ticks = ticks;
        }
    }

    pub(crate) fn set_dead_band(&mut self) {
        let dead_time = self.settings.dead_time;
        self.timer.enable_dead_band(dead_time, dead_time);
        self.dead_band = true;
        self.update_min_pulse();
    }

    pub(crate) fn clear_dead_band(&mut self) {
        self.timer.disable_dead_band();
        self.dead_band = false;
        self.update_min_pulse();
    }

    pub(crate) fn load_period(&mut self, period: u32, frequency_hz: u32) {
        self.timer.set_period(period);
        self.loaded_period = period;
        self.loaded_frequency_hz = frequency_hz;
    }

    pub(crate) fn load_running_period(&mut self) {
        self.load_period(self.period_ticks, self.settings.frequency.hz());
        self.pending_frequency.clear();
    }

    pub(crate) fn load_idle_period(&mut self) {
        self.load_period(self.clock.period_ticks(IDLE_FREQUENCY_HZ), IDLE_FREQUENCY_HZ);
    }

    /// Width forced onto the low-side outputs, if any. Trapezoid drive with
    /// slow decay holds the low side on for all but the dead time.
    fn low_side_override(&self) -> Option<u32> {
        let slow_trapezoid = self.settings.modulation == Modulation::Trapezoid
            && self.settings.decay == DecayMode::Slow;
        slow_trapezoid.then(|| self.loaded_period.saturating_sub(self.settings.dead_time))
    }

    /// Write `duty` to all six outputs and release it at the next boundary.
    pub(crate) fn commit(&mut self, duty: DutyCycle) {
        let low_side = self.low_side_override();
        self.commit_plan(duty, low_side);
    }

    pub(crate) fn commit_plan(&mut self, duty: DutyCycle, low_side: Option<u32>) {
        let plan = PulsePlan::compute(&duty, self.loaded_period, self.min_pulse_ticks, low_side);

        for output in Output::ALL {
            self.timer.set_pulse_width(output, plan.width(output));
        }
        self.timer.commit_synchronized();

        self.duty = duty;
        self.pulse_width = plan.average;
        self.aggregate_duty = plan.aggregate;
    }
}
