//! TIM1 as the three-leg bridge timer of the B-G431B-ESC1.
//!
//! TIM1 counts center-aligned, so one PWM period of N clock ticks is an
//! auto-reload of N/2 and a pulse of W ticks is a compare value of W/2. The
//! repetition counter is set so the update event (and its interrupt) fires
//! once per period, at the bottom of the count.

use embassy_stm32::gpio::OutputType;
use embassy_stm32::pac;
use embassy_stm32::peripherals::{PA8, PA9, PA10, PA12, PB15, PC13, TIM1};
use embassy_stm32::time::khz;
use embassy_stm32::timer::complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin};
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::PwmPin;
use embassy_stm32::Peri;
use oxibridge::{BridgeTimer, Output, OutputMask, Phase};

/// Timer kernel clock with SYSCLK at 100 MHz and no prescaler.
pub const TIM1_CLOCK_HZ: u32 = 100_000_000;

pub struct Tim1Bridge<'d> {
    // owns the pins and the dead-time generator
    pwm: ComplementaryPwm<'d, TIM1>,
    holding: bool,
}

impl<'d> Tim1Bridge<'d> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tim1: Peri<'d, TIM1>,
        pa8: Peri<'d, PA8>,
        pc13: Peri<'d, PC13>,
        pa9: Peri<'d, PA9>,
        pa12: Peri<'d, PA12>,
        pa10: Peri<'d, PA10>,
        pb15: Peri<'d, PB15>,
    ) -> Self {
        // High-side pins
        let ch1 = PwmPin::new(pa8, OutputType::PushPull); // Phase A high
        let ch2 = PwmPin::new(pa9, OutputType::PushPull); // Phase B high
        let ch3 = PwmPin::new(pa10, OutputType::PushPull); // Phase C high

        // Low-side pins (complementary)
        let ch1n = ComplementaryPwmPin::new(pc13, OutputType::PushPull); // Phase A low
        let ch2n = ComplementaryPwmPin::new(pa12, OutputType::PushPull); // Phase B low
        let ch3n = ComplementaryPwmPin::new(pb15, OutputType::PushPull); // Phase C low

        let pwm = ComplementaryPwm::new(
            tim1,
            Some(ch1),
            Some(ch1n),
            Some(ch2),
            Some(ch2n),
            Some(ch3),
            Some(ch3n),
            None,
            None,
            khz(20),
            CountingMode::CenterAlignedDownInterrupts,
        );

        let tim = pac::TIM1;
        tim.psc().write_value(0);
        tim.rcr().write(|w| w.set_rep(1));
        tim.cr1().modify(|w| w.set_arpe(true));
        tim.dier().modify(|w| w.set_uie(false));

        defmt::info!("TIM1 bridge timer: {} Hz kernel clock", TIM1_CLOCK_HZ);

        Self {
            pwm,
            holding: false,
        }
    }

    /// Stop shadow-register transfers until the next commit.
    fn hold(&mut self) {
        if !self.holding {
            pac::TIM1.cr1().modify(|w| w.set_udis(true));
            self.holding = true;
        }
    }

    fn channel(phase: Phase) -> usize {
        match phase {
            Phase::A => 0,
            Phase::B => 1,
            Phase::C => 2,
        }
    }
}

impl BridgeTimer for Tim1Bridge<'_> {
    fn set_period(&mut self, ticks: u32) {
        self.hold();
        let arr = (ticks / 2).min(u32::from(u16::MAX)) as u16;
        pac::TIM1.arr().write(|w| w.set_arr(arr));
    }

    /// Low-side widths are ignored: CHxN is generated from the CHx compare
    /// and has no width of its own.
    fn set_pulse_width(&mut self, output: Output, ticks: u32) {
        if output.is_low_side() {
            return;
        }
        self.hold();
        let ccr = (ticks / 2).min(u32::from(u16::MAX)) as u16;
        pac::TIM1
            .ccr(Self::channel(output.phase()))
            .write(|w| w.set_ccr(ccr));
    }

    fn set_outputs(&mut self, mask: OutputMask, enabled: bool) {
        pac::TIM1.ccer().modify(|w| {
            for phase in Phase::ALL {
                let ch = Self::channel(phase);
                if mask.contains(phase.high().mask()) {
                    w.set_cce(ch, enabled);
                }
                if mask.contains(phase.low().mask()) {
                    w.set_ccne(ch, enabled);
                }
            }
        });
    }

    fn set_inverted(&mut self, mask: OutputMask, inverted: bool) {
        pac::TIM1.ccer().modify(|w| {
            for phase in Phase::ALL {
                let ch = Self::channel(phase);
                if mask.contains(phase.high().mask()) {
                    w.set_ccp(ch, inverted);
                }
                if mask.contains(phase.low().mask()) {
                    w.set_ccnp(ch, inverted);
                }
            }
        });
    }

    fn enable_dead_band(&mut self, rise: u32, fall: u32) {
        // one symmetric dead time per timer; take the longer edge
        let ticks = u16::try_from(rise.max(fall)).unwrap_or(u16::MAX);
        self.pwm.set_dead_time(ticks);
    }

    fn disable_dead_band(&mut self) {
        self.pwm.set_dead_time(0);
    }

    fn commit_synchronized(&mut self) {
        pac::TIM1.cr1().modify(|w| w.set_udis(false));
        self.holding = false;
    }

    fn clear_period_interrupt(&mut self) {
        pac::TIM1.sr().modify(|w| w.set_uif(false));
    }

    fn start(&mut self) {
        let tim = pac::TIM1;

        // load the staged period and compares into the shadow registers
        tim.cr1().modify(|w| w.set_udis(false));
        tim.egr().write(|w| w.set_ug(true));
        self.holding = false;
        tim.sr().modify(|w| w.set_uif(false));

        // break and debug halt force every output to its inactive level
        tim.bdtr().modify(|w| {
            w.set_ossr(true);
            w.set_ossi(true);
            w.set_moe(true);
        });
        tim.dier().modify(|w| w.set_uie(true));
        tim.cr1().modify(|w| w.set_cen(true));
    }
}
