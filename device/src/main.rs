#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_time::{Duration, Timer};
use oxibridge::{
    BridgeController, BridgeSettings, CommutationStep, DutyCycle, OutputMode, Platform, PwmClock,
    SharedBridge,
};

// Use panic-probe for panics
use panic_probe as _;

mod board;
use board::{Board, DriveState, WATCHDOG_TIMEOUT_US, get_drive_state, set_drive_state};

mod bridge;
use bridge::{TIM1_CLOCK_HZ, Tim1Bridge};

/// The bridge, shared between the motor task and the TIM1 update interrupt
static BRIDGE: SharedBridge<Tim1Bridge<'static>, Board<'static>> = SharedBridge::new();

/// Milliseconds counted by the bridge's millisecond service
static UPTIME_MS: AtomicU32 = AtomicU32::new(0);

/// Longest wait between watchdog reloads in the status loop
const WATCHDOG_RELOAD_MS: u64 = 100;

/// Open-loop drive parameters
struct DriveParams {
    /// Duty cycle as a fraction of 65536
    duty: u32,
    precharge_ms: u64,
    commutation_period_ms: u64,
}

impl Default for DriveParams {
    fn default() -> Self {
        Self {
            duty: 65536 * 15 / 100,     // 15% for very safe initial testing
            precharge_ms: 10,
            commutation_period_ms: 500, // Very slow for initial testing (500ms per step = ~2.8 RPM)
        }
    }
}

/// Bridge settings for the ZD2808 on the B-G431B-ESC1
fn bridge_settings() -> BridgeSettings {
    BridgeSettings {
        dead_time: 40, // 400 ns at 10 ns per tick
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // Initialize STM32 with HSE=8MHz feeding PLL to 100MHz SYSCLK
    let p = {
        let mut config = embassy_stm32::Config::default();
        {
            use embassy_stm32::rcc::*;
            use embassy_stm32::time::Hertz;
            // Use external 8MHz HSE oscillator as PLL source
            config.rcc.hse = Some(Hse {
                freq: Hertz(8_000_000),
                mode: HseMode::Oscillator,
            });
            // VCO in: 8MHz / 2 = 4MHz; VCO: 4MHz * 50 = 200MHz; SYSCLK: 200MHz / 2 = 100MHz
            // (a whole number of nanoseconds per TIM1 tick)
            config.rcc.pll = Some(Pll {
                source: PllSource::HSE,
                prediv: PllPreDiv::DIV2,
                mul: PllMul::MUL50,
                divp: None,
                divq: None,
                divr: Some(PllRDiv::DIV2),
            });
            config.rcc.sys = Sysclk::PLL1_R;
        }
        embassy_stm32::init(config)
    };

    defmt::info!("oxibridge starting");

    let watchdog = IndependentWatchdog::new(p.IWDG, WATCHDOG_TIMEOUT_US);

    // Phase outputs on TIM1
    let timer = Tim1Bridge::new(
        p.TIM1,
        p.PA8,  // Phase A high
        p.PC13, // Phase A low
        p.PA9,  // Phase B high
        p.PA12, // Phase B low
        p.PA10, // Phase C high
        p.PB15, // Phase C low
    );

    match BridgeController::new(
        timer,
        Board::new(watchdog),
        PwmClock::new(TIM1_CLOCK_HZ),
        bridge_settings(),
    ) {
        Ok(bridge) => {
            BRIDGE.install(bridge);
            BRIDGE.with(|b| b.platform_mut().unleash_watchdog());
        }
        Err(e) => {
            // the watchdog was dropped with the controller and never started
            defmt::error!("bridge settings rejected: {}", e);
            set_drive_state(DriveState::Faulted);
        }
    }
    Board::enable_interrupts();

    // LED on PC6
    let mut led = Output::new(p.PC6, Level::Low, Speed::Low);

    spawner.spawn(motor_control_task(DriveParams::default())).unwrap();

    defmt::info!("Motor task spawned, entering LED status loop");

    // LED status loop - shows bridge mode via blink patterns
    loop {
        let mode = BRIDGE.with(|b| b.mode());

        match (get_drive_state(), mode) {
            (DriveState::Faulted, _) | (_, None) => {
                // Triple blink pattern
                for _ in 0..3 {
                    led.set_high();
                    pause(120).await;
                    led.set_low();
                    pause(120).await;
                }
                pause(800).await;
            }
            (_, Some(OutputMode::Off)) => {
                // Slow blink (1 Hz, 10% duty)
                led.set_high();
                pause(100).await;
                led.set_low();
                pause(900).await;
            }
            (_, Some(OutputMode::Precharge)) => {
                // Quick double blink
                for _ in 0..2 {
                    led.set_high();
                    pause(100).await;
                    led.set_low();
                    pause(100).await;
                }
                pause(600).await;
            }
            (_, Some(OutputMode::Running | OutputMode::Braking)) => {
                // Solid ON with periodic short delay to allow state changes
                led.set_high();
                pause(500).await;
                defmt::debug!(
                    "uptime {} ms, aggregate duty {}",
                    UPTIME_MS.load(Ordering::Relaxed),
                    BRIDGE.aggregate_duty()
                );
            }
        }
    }
}

/// Wait `ms` milliseconds, reloading the watchdog at least every
/// [`WATCHDOG_RELOAD_MS`].
async fn pause(ms: u64) {
    let mut left = ms;
    while left > 0 {
        let slice = left.min(WATCHDOG_RELOAD_MS);
        Timer::after(Duration::from_millis(slice)).await;
        BRIDGE.with(|b| b.platform_mut().reload_watchdog());
        left -= slice;
    }
}

/// Motor control task - precharges, then runs open-loop six-step commutation
#[embassy_executor::task]
async fn motor_control_task(params: DriveParams) {
    if get_drive_state() == DriveState::Faulted {
        defmt::warn!("Motor control task: drive faulted, not starting");
        return;
    }
    defmt::info!("Motor control task started");

    BRIDGE.with(|b| b.output_precharge());
    Timer::after(Duration::from_millis(params.precharge_ms)).await;

    set_drive_state(DriveState::Running);
    BRIDGE.with(|b| {
        b.set_duty_cycle(DutyCycle::uniform(params.duty));
        b.output_on();
    });

    let mut step = CommutationStep::Step0;
    loop {
        if get_drive_state() != DriveState::Running {
            BRIDGE.with(|b| b.output_off());
            defmt::info!("Motor stopped");
            return;
        }

        BRIDGE.with(|b| {
            b.output_trapezoid(step.mask());
            b.set_duty_cycle(DutyCycle::uniform(params.duty));
        });
        step = step.next();

        Timer::after(Duration::from_millis(params.commutation_period_ms)).await;
    }
}

#[interrupt]
fn TIM1_UP_TIM16() {
    BRIDGE.on_period();
}

/// Waveform service. Trapezoid steps come from the motor task, so this only
/// hands the consumed interval back to the period count.
#[interrupt]
fn SPI2() {
    BRIDGE.with(|b| {
        let interval = b.settings().update_rate + 1;
        b.reduce_period_count(interval);
    });
}

/// Millisecond service
#[interrupt]
fn SPI3() {
    UPTIME_MS.fetch_add(1, Ordering::Relaxed);
}
