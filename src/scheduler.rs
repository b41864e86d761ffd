//! Period interrupt: applies pending changes at the synchronised boundary and
//! derives the waveform and millisecond service ticks.

use crate::config::Modulation;
use crate::controller::BridgeController;
use crate::platform::{Platform, Service};
use crate::timer::{BridgeTimer, OutputMask};

/// Millisecond accumulator increment per period.
const MS_STEP: u32 = 1000;

impl<T: BridgeTimer, P: Platform> BridgeController<T, P> {
    /// Handle the zero-count interrupt of the primary generator.
    ///
    /// Must run once per PWM period with producers masked out.
    pub fn on_period(&mut self) {
        // a clear landing on the same cycle as a new event is dropped
        self.timer.clear_period_interrupt();
        self.timer.clear_period_interrupt();

        self.period_count = self.period_count.wrapping_add(1);

        let update_rate = self.settings.update_rate;
        if self.period_count > update_rate {
            if let Some(duty) = self.pending_duty.take() {
                if let Some(frequency) = self.pending_frequency.take() {
                    let hz = frequency.hz();
                    self.load_period(self.clock.period_ticks(hz), hz);
                    debug!("period -> {} ticks", self.loaded_period);
                }
                self.commit(duty);
                trace!("commit, aggregate {}", self.aggregate_duty);
            }
        }

        if core::mem::take(&mut self.precharge_pending) {
            self.timer.set_outputs(OutputMask::LOW_SIDE, true);
        }

        let interval = update_rate.saturating_add(1);
        if self.period_count >= interval {
            match self.settings.modulation {
                Modulation::Sine => self.platform.trigger(Service::Waveform),
                Modulation::Trapezoid => {
                    self.period_count -= (self.period_count / interval) * interval;
                }
            }
        }

        self.ms_accumulator += MS_STEP;
        if self.ms_accumulator >= self.loaded_frequency_hz {
            self.platform.trigger(Service::Millisecond);
            self.ms_accumulator -= self.loaded_frequency_hz;
        }
    }

    /// Periods elapsed since timing last restarted, less those consumed by
    /// the waveform service.
    pub fn period_count(&self) -> u32 {
        self.period_count
    }

    /// Report `periods` as consumed by the waveform service.
    pub fn reduce_period_count(&mut self, periods: u32) {
        self.period_count = self.period_count.saturating_sub(periods);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{BridgeSettings, Modulation, PwmFrequency};
    use crate::duty::DutyCycle;
    use crate::mock::mock_bridge;
    use crate::timer::OutputMask;

    fn running(settings: BridgeSettings) -> crate::mock::MockController {
        let mut bridge = mock_bridge(settings).unwrap();
        bridge.platform_mut().running = true;
        bridge.output_on();
        bridge
    }

    #[test]
    fn test_clears_interrupt_twice() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        bridge.on_period();
        assert_eq!(bridge.timer().interrupt_clears, 2);
    }

    #[test]
    fn test_latest_duty_cycle_wins() {
        let mut bridge = running(BridgeSettings::default());
        let commits = bridge.timer().commits;

        for fraction in [1000, 20_000, 40_000, 16384] {
            bridge.set_duty_cycle(DutyCycle::uniform(fraction));
        }
        assert_eq!(bridge.timer().commits, commits);

        bridge.on_period();
        assert_eq!(bridge.timer().commits, commits + 1);
        assert_eq!(bridge.timer().widths, [625; 6]);
        assert_eq!(bridge.aggregate_duty(), 2500);

        bridge.on_period();
        assert_eq!(bridge.timer().commits, commits + 1);
    }

    #[test]
    fn test_update_rate_limits_commits() {
        let mut bridge = running(BridgeSettings {
            update_rate: 3,
            ..Default::default()
        });
        let commits = bridge.timer().commits;

        for _ in 0..40 {
            bridge.set_duty_cycle(DutyCycle::uniform(20_000));
            bridge.on_period();
        }
        assert_eq!(bridge.timer().commits, commits + 10);
    }

    #[test]
    fn test_frequency_rides_along_with_duty_cycle() {
        let mut bridge = running(BridgeSettings::default());
        bridge.set_frequency(PwmFrequency::F8k).unwrap();

        bridge.on_period();
        assert_eq!(bridge.timer().period, 2500);

        bridge.set_duty_cycle(DutyCycle::HALF);
        bridge.on_period();
        assert_eq!(bridge.timer().period, 6250);
        assert_eq!(bridge.timer().widths, [3125; 6]);
        assert!(!bridge.pending_frequency.is_full());
    }

    #[test]
    fn test_sine_waveform_ticks() {
        for update_rate in [0, 1, 4] {
            let mut bridge = running(BridgeSettings {
                modulation: Modulation::Sine,
                update_rate,
                ..Default::default()
            });
            let interval = update_rate + 1;

            let mut seen = 0;
            for _ in 0..100 {
                bridge.on_period();
                // the waveform service consumes one interval per tick
                if bridge.platform().waveform_triggers > seen {
                    seen = bridge.platform().waveform_triggers;
                    bridge.reduce_period_count(interval);
                }
            }
            assert_eq!(bridge.platform().waveform_triggers, 100 / interval);
        }
    }

    #[test]
    fn test_trapezoid_compensates_period_count() {
        let mut bridge = running(BridgeSettings {
            update_rate: 2,
            ..Default::default()
        });

        for n in 1..=30u32 {
            bridge.on_period();
            assert_eq!(bridge.period_count(), n % 3);
        }
        assert_eq!(bridge.platform().waveform_triggers, 0);
    }

    #[test]
    fn test_millisecond_tick_independent_of_frequency() {
        for frequency in [PwmFrequency::F20k, PwmFrequency::F8k] {
            let mut bridge = running(BridgeSettings {
                frequency,
                ..Default::default()
            });

            // 50 ms worth of periods
            for _ in 0..frequency.hz() / 20 {
                bridge.on_period();
            }
            assert_eq!(bridge.platform().millisecond_triggers, 50);
            assert_eq!(bridge.ms_accumulator, 0);
        }
    }

    #[test]
    fn test_idle_rate_ticks_every_period() {
        let mut bridge = mock_bridge(BridgeSettings::default()).unwrap();
        for _ in 0..5 {
            bridge.on_period();
        }
        assert_eq!(bridge.platform().millisecond_triggers, 5);
    }

    #[test]
    fn test_reduce_period_count_saturates() {
        let mut bridge = running(BridgeSettings {
            modulation: Modulation::Sine,
            ..Default::default()
        });
        bridge.on_period();
        bridge.on_period();
        bridge.reduce_period_count(5);
        assert_eq!(bridge.period_count(), 0);
    }

    #[test]
    fn test_commits_stay_within_bounds() {
        let mut bridge = running(BridgeSettings::default());
        let min = bridge.min_pulse_width();
        let period = bridge.period_ticks();

        for fraction in (0..65536).step_by(509) {
            bridge.set_duty_cycle(DutyCycle::new(fraction, 65535 - fraction, 32768));
            bridge.on_period();
            for width in bridge.timer().widths {
                assert!((min..=period - min).contains(&width));
            }
        }
        assert_eq!(bridge.timer().enabled, OutputMask::ALL);
    }
}
