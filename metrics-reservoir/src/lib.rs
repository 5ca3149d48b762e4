//! Sampling reservoirs and snapshots for quantile-based metrics.
//!
//! A [`Reservoir`] is a thread-safe sink for `u64` values that can, at any time, produce an
//! immutable [`Snapshot`] from which quantiles are read.  Different strategies trade off accuracy,
//! memory, and bias towards recent data, and any of them can back the same metric:
//!
//! - [`UniformReservoir`]: a uniform sample over the lifetime of the reservoir
//! - [`SlidingWindowReservoir`]: the last N values
//! - [`SlidingTimeWindowReservoir`]: every value from the last window of time
//! - [`ExponentiallyDecayingReservoir`]: a sample biased towards the last few minutes
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::sync::Arc;

mod decaying;
pub use decaying::{ExponentiallyDecayingReservoir, DEFAULT_ALPHA, DEFAULT_SIZE};

mod quantile;
pub use quantile::{parse_quantiles, Quantile};

mod rng;

mod slot;

mod snapshot;
pub use snapshot::{Snapshot, UniformSnapshot, WeightedSample, WeightedSnapshot};

mod uniform;
pub use uniform::UniformReservoir;

mod window;
pub use window::{SlidingTimeWindowReservoir, SlidingWindowReservoir};

/// A statistically representative sample of a stream of values.
///
/// Implementations must tolerate concurrent calls to `update` from any number of threads while a
/// snapshot is being taken.  A snapshot taken concurrently with an update may or may not include
/// that update.
pub trait Reservoir: Send + Sync {
    /// Gets the number of values currently held.
    fn size(&self) -> usize;

    /// Records a value.
    fn update(&self, value: u64);

    /// Takes a snapshot of the values currently held.
    ///
    /// Snapshots never modify the values held by the reservoir.
    fn snapshot(&self) -> Snapshot;
}

impl<R: Reservoir + ?Sized> Reservoir for Box<R> {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn update(&self, value: u64) {
        (**self).update(value)
    }

    fn snapshot(&self) -> Snapshot {
        (**self).snapshot()
    }
}

/// Produces a fresh, empty reservoir every time it is called.
///
/// Metrics call the supplier once per child, so that each child gets its own reservoir.
pub type ReservoirSupplier = Arc<dyn Fn() -> Box<dyn Reservoir> + Send + Sync>;
