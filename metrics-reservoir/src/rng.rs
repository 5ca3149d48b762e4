use std::cell::RefCell;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

thread_local! {
    static FAST_RNG: RefCell<Xoshiro256StarStar> =
        RefCell::new(Xoshiro256StarStar::from_rng(&mut rand::rng()));
}

/// Returns a uniformly distributed index in `0..upper`.
///
/// `upper` must be non-zero.
pub(crate) fn fastrand(upper: usize) -> usize {
    FAST_RNG.with(|rng| rng.borrow_mut().random_range(0..upper))
}

/// Returns a uniformly distributed value in `(0.0, 1.0]`.
pub(crate) fn fastrand_unit() -> f64 {
    FAST_RNG.with(|rng| 1.0 - rng.borrow_mut().random::<f64>())
}
