//! Single-slot handoff between a producer and the period interrupt.
//!
//! The slot is never locked on its own: callers reach it through
//! [`SharedBridge`](crate::shared::SharedBridge), whose critical section
//! masks the period interrupt for the duration of a post or take.

/// Holds at most one pending value. A newer post overwrites an unconsumed one.
#[derive(Debug, Clone, Copy)]
pub struct Mailbox<T: Copy> {
    slot: Option<T>,
}

impl<T: Copy> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> Mailbox<T> {
    pub const fn new() -> Self {
        Self { slot: None }
    }

    pub fn post(&mut self, value: T) {
        self.slot = Some(value);
    }

    /// Consume the pending value, leaving the slot empty.
    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }

    pub fn peek(&self) -> Option<T> {
        self.slot
    }

    pub fn is_full(&self) -> bool {
        self.slot.is_some()
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_post_wins() {
        let mut mb = Mailbox::new();
        assert!(!mb.is_full());
        mb.post(1u32);
        mb.post(2);
        mb.post(3);
        assert_eq!(mb.peek(), Some(3));
        assert_eq!(mb.take(), Some(3));
        assert_eq!(mb.take(), None);
    }

    #[test]
    fn test_clear() {
        let mut mb = Mailbox::<u32>::default();
        mb.post(7);
        mb.clear();
        assert!(!mb.is_full());
    }
}
