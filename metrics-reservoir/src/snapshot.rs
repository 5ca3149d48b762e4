//! Point-in-time views of a reservoir.

/// A value held by a weighted reservoir, along with its sampling weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSample {
    /// The recorded value.
    pub value: u64,
    /// The relative weight of the value.
    pub weight: f64,
}

/// An immutable view of the values held by a reservoir.
///
/// Snapshots never reference the reservoir that produced them, so reading quantiles from a
/// snapshot does not contend with writers.
///
/// Reading from an empty snapshot is always defined: every quantile, as well as the minimum,
/// maximum, and mean, is `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Every value carries the same weight.
    Uniform(UniformSnapshot),
    /// Values carry individual weights, such as from a decaying reservoir.
    Weighted(WeightedSnapshot),
}

impl Snapshot {
    /// Gets the value at the given quantile.
    ///
    /// Quantiles outside of `[0.0, 1.0]` are clamped.
    pub fn value(&self, quantile: f64) -> f64 {
        let quantile = if quantile.is_nan() { 0.0 } else { quantile.clamp(0.0, 1.0) };
        match self {
            Snapshot::Uniform(s) => s.value(quantile),
            Snapshot::Weighted(s) => s.value(quantile),
        }
    }

    /// Gets the number of values in the snapshot.
    pub fn len(&self) -> usize {
        self.values().len()
    }

    /// Returns `true` if the snapshot holds no values.
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// Gets the values in the snapshot, in ascending order.
    pub fn values(&self) -> &[u64] {
        match self {
            Snapshot::Uniform(s) => &s.values,
            Snapshot::Weighted(s) => &s.values,
        }
    }

    /// Gets the smallest value, or `0.0` if empty.
    pub fn min(&self) -> f64 {
        self.values().first().map_or(0.0, |v| *v as f64)
    }

    /// Gets the largest value, or `0.0` if empty.
    pub fn max(&self) -> f64 {
        self.values().last().map_or(0.0, |v| *v as f64)
    }

    /// Gets the (weighted) arithmetic mean, or `0.0` if empty.
    pub fn mean(&self) -> f64 {
        match self {
            Snapshot::Uniform(s) => {
                if s.values.is_empty() {
                    return 0.0;
                }
                let sum: f64 = s.values.iter().map(|v| *v as f64).sum();
                sum / s.values.len() as f64
            }
            Snapshot::Weighted(s) => {
                s.values.iter().zip(s.norm_weights.iter()).map(|(v, w)| *v as f64 * w).sum()
            }
        }
    }
}

/// A snapshot over equally-weighted values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSnapshot {
    values: Vec<u64>,
}

impl UniformSnapshot {
    /// Creates a new `UniformSnapshot` from the given values, in any order.
    pub fn new(mut values: Vec<u64>) -> Self {
        values.sort_unstable();
        Self { values }
    }

    // Linear interpolation between the two closest ranks, using the `(n + 1) * q` position.
    fn value(&self, quantile: f64) -> f64 {
        let len = self.values.len();
        if len == 0 {
            return 0.0;
        }

        let pos = quantile * (len + 1) as f64;
        let index = pos as usize;

        if index < 1 {
            return self.values[0] as f64;
        }
        if index >= len {
            return self.values[len - 1] as f64;
        }

        let lower = self.values[index - 1] as f64;
        let upper = self.values[index] as f64;
        lower + (pos - pos.floor()) * (upper - lower)
    }
}

/// A snapshot over values with individual weights.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSnapshot {
    values: Vec<u64>,
    norm_weights: Vec<f64>,
    quantiles: Vec<f64>,
}

impl WeightedSnapshot {
    /// Creates a new `WeightedSnapshot` from the given samples, in any order.
    pub fn new<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = WeightedSample>,
    {
        let mut samples = samples.into_iter().collect::<Vec<_>>();
        samples.sort_unstable_by_key(|s| s.value);

        let total: f64 = samples.iter().map(|s| s.weight).sum();

        let mut values = Vec::with_capacity(samples.len());
        let mut norm_weights = Vec::with_capacity(samples.len());
        let mut quantiles = Vec::with_capacity(samples.len());

        let mut cumulative = 0.0;
        for sample in samples {
            let norm = if total > 0.0 { sample.weight / total } else { 0.0 };
            values.push(sample.value);
            norm_weights.push(norm);
            quantiles.push(cumulative);
            cumulative += norm;
        }

        Self { values, norm_weights, quantiles }
    }

    fn value(&self, quantile: f64) -> f64 {
        let len = self.values.len();
        if len == 0 {
            return 0.0;
        }

        // Position of the last value whose cumulative weight does not exceed the quantile.
        let pos = match self.quantiles.binary_search_by(|q| q.total_cmp(&quantile)) {
            Ok(idx) => idx,
            Err(insertion) => insertion.saturating_sub(1),
        };

        if pos < 1 {
            return self.values[0] as f64;
        }
        if pos >= len {
            return self.values[len - 1] as f64;
        }
        self.values[pos] as f64
    }
}
