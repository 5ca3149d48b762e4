//! A forward-decaying priority reservoir.

use std::{collections::BTreeMap, time::Duration};

use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use quanta::{Clock, Instant};

use crate::{rng::fastrand_unit, Reservoir, Snapshot, WeightedSample, WeightedSnapshot};

/// Default number of values held by an [`ExponentiallyDecayingReservoir`].
///
/// Offers a 99.9% confidence level with a 5% margin of error, assuming a normal distribution.
pub const DEFAULT_SIZE: usize = 1028;

/// Default decay factor of an [`ExponentiallyDecayingReservoir`].
///
/// Heavily biases the reservoir towards the last five minutes of values.
pub const DEFAULT_ALPHA: f64 = 0.015;

const RESCALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

struct State {
    values: BTreeMap<OrderedFloat<f64>, WeightedSample>,
    count: usize,
    start_time: Instant,
    next_scale_time: Instant,
}

/// An exponentially decaying reservoir.
///
/// Uses Cormode et al.'s [forward decay][forward_decay] priority sampling: each value is weighted
/// by `exp(alpha * t)`, where `t` is the time since the reservoir's landmark, and the values with
/// the highest `weight / u` priorities (for a uniform random `u`) are retained.  Recent values are
/// therefore far more likely to be represented than older ones.
///
/// Weights grow without bound, so the landmark is moved forward, and every held weight rescaled,
/// once an hour.
///
/// [forward_decay]: http://dimacs.rutgers.edu/~graham/pubs/papers/fwddecay.pdf
pub struct ExponentiallyDecayingReservoir {
    size: usize,
    alpha: f64,
    clock: Clock,
    state: Mutex<State>,
}

impl ExponentiallyDecayingReservoir {
    /// Creates a new `ExponentiallyDecayingReservoir`.
    ///
    /// `size` is the number of values kept, and `alpha` is the exponential decay factor: the
    /// higher it is, the more biased the reservoir is towards newer values.
    pub fn new(size: usize, alpha: f64, clock: Clock) -> Self {
        let now = clock.now();
        Self {
            size,
            alpha,
            clock,
            state: Mutex::new(State {
                values: BTreeMap::new(),
                count: 0,
                start_time: now,
                next_scale_time: now + RESCALE_THRESHOLD,
            }),
        }
    }

    /// Creates a new `ExponentiallyDecayingReservoir` with [`DEFAULT_SIZE`] and [`DEFAULT_ALPHA`].
    pub fn with_defaults(clock: Clock) -> Self {
        Self::new(DEFAULT_SIZE, DEFAULT_ALPHA, clock)
    }

    fn weight(&self, elapsed: Duration) -> f64 {
        (self.alpha * elapsed.as_secs_f64()).exp()
    }

    fn rescale_if_needed(&self, state: &mut State, now: Instant) {
        if now < state.next_scale_time {
            return;
        }

        let old_start = state.start_time;
        state.start_time = now;
        state.next_scale_time = now + RESCALE_THRESHOLD;

        let factor = (-self.alpha * now.duration_since(old_start).as_secs_f64()).exp();
        if factor == 0.0 {
            state.values.clear();
        } else {
            let values = std::mem::take(&mut state.values);
            state.values = values
                .into_iter()
                .map(|(priority, sample)| {
                    let sample =
                        WeightedSample { value: sample.value, weight: sample.weight * factor };
                    (OrderedFloat(priority.0 * factor), sample)
                })
                .collect();
        }

        // Rescaling can collapse distinct priorities onto the same key.
        state.count = state.values.len();
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn size(&self) -> usize {
        self.state.lock().values.len()
    }

    fn update(&self, value: u64) {
        if self.size == 0 {
            return;
        }

        let now = self.clock.now();
        let mut state = self.state.lock();
        self.rescale_if_needed(&mut state, now);

        let weight = self.weight(now.duration_since(state.start_time));
        let sample = WeightedSample { value, weight };
        let priority = OrderedFloat(weight / fastrand_unit());

        state.count += 1;
        if state.count <= self.size || state.values.is_empty() {
            state.values.insert(priority, sample);
            return;
        }

        let lowest = state.values.keys().next().copied();
        if let Some(lowest) = lowest {
            if lowest < priority && !state.values.contains_key(&priority) {
                state.values.insert(priority, sample);
                state.values.remove(&lowest);
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.rescale_if_needed(&mut state, now);
        Snapshot::Weighted(WeightedSnapshot::new(state.values.values().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::ExponentiallyDecayingReservoir;
    use crate::Reservoir;
    use quanta::Clock;
    use std::time::Duration;

    #[test]
    fn test_small_stream_is_kept_whole() {
        let (clock, _ctl) = Clock::mock();
        let reservoir = ExponentiallyDecayingReservoir::new(100, 0.99, clock);
        for i in 0..10 {
            reservoir.update(i);
        }

        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 10);
        assert_eq!(snapshot.values(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_bounded_by_size() {
        let (clock, _ctl) = Clock::mock();
        let reservoir = ExponentiallyDecayingReservoir::new(100, 0.99, clock);
        for i in 0..1000 {
            reservoir.update(i);
        }

        assert_eq!(reservoir.size(), 100);
        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert!(snapshot.values().iter().all(|v| *v < 1000));
    }

    #[test]
    fn test_single_value_quantiles() {
        let (clock, _ctl) = Clock::mock();
        let reservoir = ExponentiallyDecayingReservoir::with_defaults(clock);
        reservoir.update(100);

        let snapshot = reservoir.snapshot();
        for q in [0.5, 0.75, 0.95, 0.98, 0.99, 0.999] {
            assert_eq!(snapshot.value(q), 100.0);
        }
    }

    #[test]
    fn test_recent_values_dominate() {
        let (clock, ctl) = Clock::mock();
        let reservoir = ExponentiallyDecayingReservoir::new(10, 0.015, clock);

        for _ in 0..10 {
            reservoir.update(1_000);
        }
        // Jump forward far enough that the new values outweigh the old ones by several orders of
        // magnitude, but stay under the rescale threshold.
        ctl.increment(Duration::from_secs(30 * 60));
        for _ in 0..10 {
            reservoir.update(10);
        }

        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 10);
        assert_eq!(snapshot.value(0.5), 10.0);
    }

    #[test]
    fn test_rescale_keeps_values() {
        let (clock, ctl) = Clock::mock();
        let reservoir = ExponentiallyDecayingReservoir::new(10, 0.015, clock);
        for i in 0..5 {
            reservoir.update(i);
        }

        ctl.increment(Duration::from_secs(2 * 60 * 60));
        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 5);

        reservoir.update(99);
        assert_eq!(reservoir.snapshot().len(), 6);
    }
}
