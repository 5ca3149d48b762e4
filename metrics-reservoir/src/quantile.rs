/// A quantile that has both the raw value and its exposition label.
///
/// Scrape formats expect the quantile as a label value, such as `quantile="0.99"`.  Rendering the
/// float once, when the quantile is created, keeps every scrape from reformatting it and keeps the
/// label text identical between scrapes.
///
/// Whole numbers always carry a fractional part, so `0.0` and `1.0` are labeled `"0.0"` and
/// `"1.0"` rather than `"0"` and `"1"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantile(f64, String);

impl Quantile {
    /// Creates a new [`Quantile`] from a floating-point value.
    ///
    /// All values are clamped between 0.0 and 1.0, and `NaN` is treated as 0.0.
    pub fn new(quantile: f64) -> Quantile {
        let clamped = if quantile.is_nan() { 0.0 } else { quantile.clamp(0.0, 1.0) };

        let mut label = format!("{}", clamped);
        if !label.contains('.') {
            label.push_str(".0");
        }

        Quantile(clamped, label)
    }

    /// Gets the exposition label.
    pub fn label(&self) -> &str {
        self.1.as_str()
    }

    /// Gets the raw quantile value.
    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Parses a slice of floating-point values into a vector of [`Quantile`]s.
///
/// The result is sorted in ascending order, and quantiles that clamp to the same value are only
/// kept once.
pub fn parse_quantiles(quantiles: &[f64]) -> Vec<Quantile> {
    let mut parsed = quantiles.iter().map(|f| Quantile::new(*f)).collect::<Vec<_>>();
    parsed.sort_by(|a, b| a.value().total_cmp(&b.value()));
    parsed.dedup_by(|a, b| a.value() == b.value());
    parsed
}
