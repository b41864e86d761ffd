//! Services the bridge core consumes from the rest of the drive.

/// Lower-priority work raised from the period interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Service {
    /// Recompute the next waveform sample (sine modulation).
    Waveform,
    /// One millisecond of PWM periods has elapsed.
    Millisecond,
}

/// Drive-level collaborators: run/fault state, the watchdog, software
/// interrupts, and the ADC trigger interrupts.
pub trait Platform {
    fn is_drive_running(&self) -> bool;

    /// Externally owned fault latch. Output-enabling transitions no-op
    /// while this is set.
    fn is_drive_faulted(&self) -> bool;

    /// Liveness signal for the watchdog.
    fn reload_watchdog(&mut self);

    /// Pend the software interrupt that runs `service`.
    fn trigger(&mut self, service: Service);

    /// Mask or unmask the ADC interrupts that sample against the current
    /// output state.
    fn set_adc_interrupts(&mut self, enabled: bool);
}
