//! Reservoirs that only retain recent values.

use std::{
    collections::VecDeque,
    sync::atomic::{
        AtomicUsize,
        Ordering::{Acquire, Relaxed},
    },
    time::Duration,
};

use parking_lot::Mutex;
use quanta::{Clock, Instant};

use crate::{slot::ValueSlot, Reservoir, Snapshot, UniformSnapshot};

/// A reservoir holding the last `size` recorded values.
///
/// Writers claim a slot with a single atomic increment, so recording never blocks.  A slot claimed
/// by a writer that has not stored its value yet is left out of the snapshot.
pub struct SlidingWindowReservoir {
    values: Box<[ValueSlot]>,
    count: AtomicUsize,
}

impl SlidingWindowReservoir {
    /// Creates a new `SlidingWindowReservoir` holding the last `size` values.
    pub fn new(size: usize) -> Self {
        Self { values: ValueSlot::boxed(size), count: AtomicUsize::new(0) }
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn size(&self) -> usize {
        self.count.load(Acquire).min(self.values.len())
    }

    fn update(&self, value: u64) {
        if self.values.is_empty() {
            return;
        }

        let idx = self.count.fetch_add(1, Relaxed) % self.values.len();
        self.values[idx].store(value);
    }

    fn snapshot(&self) -> Snapshot {
        let len = self.size();
        let values = self.values[..len].iter().filter_map(ValueSlot::load).collect();
        Snapshot::Uniform(UniformSnapshot::new(values))
    }
}

/// A reservoir holding every value recorded within a fixed window of time.
///
/// Values older than the window are evicted on both update and snapshot, so an idle reservoir
/// still produces an accurate snapshot.  There is no bound on the number of values held inside
/// the window.
pub struct SlidingTimeWindowReservoir {
    window: Duration,
    clock: Clock,
    values: Mutex<VecDeque<(Instant, u64)>>,
}

impl SlidingTimeWindowReservoir {
    /// Creates a new `SlidingTimeWindowReservoir` retaining values for `window`.
    pub fn new(window: Duration, clock: Clock) -> Self {
        Self { window, clock, values: Mutex::new(VecDeque::new()) }
    }

    fn trim(&self, values: &mut VecDeque<(Instant, u64)>, now: Instant) {
        while let Some((recorded, _)) = values.front() {
            if now.duration_since(*recorded) < self.window {
                break;
            }
            values.pop_front();
        }
    }
}

impl Reservoir for SlidingTimeWindowReservoir {
    fn size(&self) -> usize {
        let now = self.clock.now();
        let mut values = self.values.lock();
        self.trim(&mut values, now);
        values.len()
    }

    fn update(&self, value: u64) {
        let now = self.clock.now();
        let mut values = self.values.lock();
        self.trim(&mut values, now);
        values.push_back((now, value));
    }

    fn snapshot(&self) -> Snapshot {
        let now = self.clock.now();
        let mut values = self.values.lock();
        self.trim(&mut values, now);
        Snapshot::Uniform(UniformSnapshot::new(values.iter().map(|(_, v)| *v).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::{SlidingTimeWindowReservoir, SlidingWindowReservoir};
    use crate::Reservoir;
    use quanta::Clock;
    use std::{sync::atomic::Ordering, time::Duration};

    #[test]
    fn test_sliding_window_keeps_last_values() {
        let reservoir = SlidingWindowReservoir::new(3);
        reservoir.update(1);
        reservoir.update(2);
        assert_eq!(reservoir.snapshot().values(), &[1, 2]);

        reservoir.update(3);
        reservoir.update(4);
        reservoir.update(5);
        assert_eq!(reservoir.size(), 3);
        assert_eq!(reservoir.snapshot().values(), &[3, 4, 5]);
    }

    #[test]
    fn test_sliding_window_leaves_out_claimed_slots() {
        let reservoir = SlidingWindowReservoir::new(3);
        reservoir.update(8);
        reservoir.count.fetch_add(1, Ordering::Relaxed);

        assert_eq!(reservoir.size(), 2);
        assert_eq!(reservoir.snapshot().values(), &[8]);
    }

    #[test]
    fn test_sliding_time_window_rollover() {
        let (clock, ctl) = Clock::mock();
        let reservoir = SlidingTimeWindowReservoir::new(Duration::from_secs(5), clock);

        assert!(reservoir.snapshot().is_empty());

        reservoir.update(1);
        reservoir.update(2);
        assert_eq!(reservoir.size(), 2);

        // Roll forward 3 seconds, should still have everything.
        ctl.increment(Duration::from_secs(3));
        reservoir.update(3);
        assert_eq!(reservoir.snapshot().values(), &[1, 2, 3]);

        // The first two values are now exactly one window old.
        ctl.increment(Duration::from_secs(2));
        assert_eq!(reservoir.snapshot().values(), &[3]);

        ctl.increment(Duration::from_secs(10));
        assert!(reservoir.snapshot().is_empty());
        assert_eq!(reservoir.size(), 0);
    }
}
