//! A uniform sampling reservoir.

use std::sync::atomic::{
    AtomicUsize,
    Ordering::{Acquire, Relaxed},
};

use crate::{rng::fastrand, slot::ValueSlot, Reservoir, Snapshot, UniformSnapshot};

/// A uniform sampling reservoir.
///
/// [Reservoir sampling][rs] is a technique used to produce a statistically representative sample
/// of a data stream, in a fixed space, without knowing the length of the stream in advance.
/// `UniformReservoir` is a thread-safe version of Vitter's ["Algorithm R"][vitter_paper]: every
/// value ever recorded has the same probability of being present in a snapshot.
///
/// Slots are plain atomics, and sampling uses a fast, thread-local PRNG
/// ([Xoshiro256**][xoshiro256starstar]) to limit the per-call overhead.  Taking a snapshot does not
/// reset the reservoir.  A slot claimed by a writer that has not stored its value yet is left out
/// of the snapshot.
///
/// [rs]: https://en.wikipedia.org/wiki/Reservoir_sampling
/// [vitter_paper]: https://www.cs.umd.edu/~samir/498/vitter.pdf
/// [xoshiro256starstar]: https://prng.di.unimi.it
pub struct UniformReservoir {
    values: Box<[ValueSlot]>,
    count: AtomicUsize,
}

impl UniformReservoir {
    /// Creates a new `UniformReservoir` that stores up to `size` values.
    pub fn new(size: usize) -> Self {
        Self { values: ValueSlot::boxed(size), count: AtomicUsize::new(0) }
    }

    /// Gets the number of values recorded over the lifetime of the reservoir.
    pub fn count(&self) -> usize {
        self.count.load(Acquire)
    }
}

impl Reservoir for UniformReservoir {
    fn size(&self) -> usize {
        self.count().min(self.values.len())
    }

    fn update(&self, value: u64) {
        if self.values.is_empty() {
            return;
        }

        let seen = self.count.fetch_add(1, Relaxed) + 1;
        if seen <= self.values.len() {
            self.values[seen - 1].store(value);
        } else {
            let idx = fastrand(seen);
            if idx < self.values.len() {
                self.values[idx].store(value);
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        let len = self.size();
        let values = self.values[..len].iter().filter_map(ValueSlot::load).collect();
        Snapshot::Uniform(UniformSnapshot::new(values))
    }
}
