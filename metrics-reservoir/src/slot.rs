//! Lock-free value slots shared by the fixed-size reservoirs.

use std::sync::atomic::{
    AtomicBool, AtomicU64,
    Ordering::{Acquire, Relaxed, Release},
};

/// A single reservoir slot.
///
/// Writers claim a slot through a counter before storing into it, so a reader can see a slot that
/// is claimed but not yet stored.  Such a slot reads as empty instead of as a value of zero.
pub(crate) struct ValueSlot {
    value: AtomicU64,
    written: AtomicBool,
}

impl ValueSlot {
    pub(crate) fn new() -> Self {
        Self { value: AtomicU64::new(0), written: AtomicBool::new(false) }
    }

    /// Allocates `len` empty slots.
    pub(crate) fn boxed(len: usize) -> Box<[ValueSlot]> {
        (0..len).map(|_| ValueSlot::new()).collect()
    }

    pub(crate) fn store(&self, value: u64) {
        self.value.store(value, Relaxed);
        self.written.store(true, Release);
    }

    /// Gets the stored value, or `None` if nothing was ever stored.
    pub(crate) fn load(&self) -> Option<u64> {
        if self.written.load(Acquire) {
            Some(self.value.load(Relaxed))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ValueSlot;

    #[test]
    fn test_claimed_slot_reads_empty() {
        let slot = ValueSlot::new();
        assert_eq!(slot.load(), None);

        slot.store(0);
        assert_eq!(slot.load(), Some(0));

        slot.store(42);
        assert_eq!(slot.load(), Some(42));
    }
}
