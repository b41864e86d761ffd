//! Static home for the controller, shared between the period interrupt and
//! its producers.
//!
//! Every access runs inside a critical section, so a producer can never be
//! preempted by the period interrupt halfway through posting a value.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::controller::BridgeController;
use crate::duty::DutyCycle;
use crate::platform::Platform;
use crate::timer::BridgeTimer;

pub struct SharedBridge<T, P> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Option<BridgeController<T, P>>>>,
}

impl<T, P> Default for SharedBridge<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P> SharedBridge<T, P> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }
}

impl<T: BridgeTimer, P: Platform> SharedBridge<T, P> {
    /// Hand the controller over. Replaces any previously installed one.
    pub fn install(&self, bridge: BridgeController<T, P>) {
        self.inner.lock(|cell| match cell.try_borrow_mut() {
            Ok(mut slot) => *slot = Some(bridge),
            Err(_) => error!("bridge install from inside an access"),
        });
    }

    /// Run `f` on the controller with interrupts masked.
    ///
    /// Returns `None` before [`install`](Self::install), or when called
    /// re-entrantly from inside another access.
    pub fn with<R>(&self, f: impl FnOnce(&mut BridgeController<T, P>) -> R) -> Option<R> {
        self.inner.lock(|cell| {
            let mut slot = cell.try_borrow_mut().ok()?;
            slot.as_mut().map(f)
        })
    }

    /// Period interrupt entry point.
    pub fn on_period(&self) {
        self.with(|bridge| bridge.on_period());
    }

    pub fn set_duty_cycle(&self, duty: DutyCycle) {
        self.with(|bridge| bridge.set_duty_cycle(duty));
    }

    pub fn period_count(&self) -> u32 {
        self.with(|bridge| bridge.period_count()).unwrap_or(0)
    }

    pub fn reduce_period_count(&self, periods: u32) {
        self.with(|bridge| bridge.reduce_period_count(periods));
    }

    pub fn aggregate_duty(&self) -> u32 {
        self.with(|bridge| bridge.aggregate_duty()).unwrap_or(0)
    }
}
