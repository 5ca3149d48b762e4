//! Exposition samples, and the projection of summaries into them.

use std::time::{SystemTime, UNIX_EPOCH};

use metrics_reservoir::{Quantile, Snapshot};
use tracing::debug;

use crate::{children::MetricData, formatting::sanitize_label_name, MetricType};

/// Label name added to every quantile sample of a summary.
pub const QUANTILE_LABEL: &str = "quantile";

/// A single exposed row: a name, a set of labels, and a value.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Sample name, such as `requests` or `requests_count`.
    pub name: String,
    /// Label names, in the same order as `label_values`.
    pub label_names: Vec<String>,
    /// Label values, in the same order as `label_names`.
    pub label_values: Vec<String>,
    /// Sample value.
    pub value: f64,
    /// Milliseconds since the Unix epoch, if timestamps are enabled.
    pub timestamp_ms: Option<i64>,
}

/// Every sample of a single metric, along with its metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricFamilySamples {
    /// Metric name.
    pub name: String,
    /// Metric type.
    pub metric_type: MetricType,
    /// Help text.
    pub help: String,
    /// Samples, grouped by child.
    pub samples: Vec<Sample>,
}

/// Creates samples, applying scrape-wide settings to each of them.
///
/// Static labels are prepended to the labels of every sample.  Labels defined on the metric
/// itself have precedence over static labels with the same name.
#[derive(Clone, Debug, Default)]
pub struct SampleCreator {
    static_labels: Vec<(String, String)>,
    timestamps: bool,
}

impl SampleCreator {
    /// Creates a new `SampleCreator` without static labels or timestamps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a static label.
    ///
    /// Invalid characters in the name are replaced with underscores.  If this method is called
    /// multiple times for the same name, the latest value is used.
    ///
    /// [`QUANTILE_LABEL`] is reserved for summary quantiles, and a static label with that name is
    /// ignored.
    pub fn with_static_label<K, V>(mut self, name: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let name = sanitize_label_name(name.as_ref());
        if name == QUANTILE_LABEL {
            debug!(label = %name, "ignoring static label with a reserved name");
            return self;
        }
        let value = value.into();
        match self.static_labels.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.static_labels.push((name, value)),
        }
        self
    }

    /// Sets whether samples carry the wall-clock time at which they were created.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Creates a sample.
    pub fn create_sample(
        &self,
        name: &str,
        label_names: &[String],
        label_values: &[String],
        value: f64,
    ) -> Sample {
        let mut names = Vec::with_capacity(self.static_labels.len() + label_names.len());
        let mut values = Vec::with_capacity(names.capacity());

        for (name, value) in &self.static_labels {
            if !label_names.contains(name) {
                names.push(name.clone());
                values.push(value.clone());
            }
        }
        names.extend_from_slice(label_names);
        values.extend_from_slice(label_values);

        let timestamp_ms = if self.timestamps {
            SystemTime::now().duration_since(UNIX_EPOCH).ok().map(|d| d.as_millis() as i64)
        } else {
            None
        };

        Sample {
            name: name.to_string(),
            label_names: names,
            label_values: values,
            value,
            timestamp_ms,
        }
    }
}

/// A metric whose recorded values can be summarized into quantiles, a count, and a sum.
pub trait Summarizable {
    /// Takes a snapshot of the recorded values.
    fn snapshot(&self) -> Snapshot;

    /// Gets the number of recorded values.
    fn count(&self) -> u64;

    /// Gets the sum of all recorded values, in recording units.
    fn sum(&self) -> f64;
}

/// Projects a summarizable child into its summary samples.
///
/// Produces, in order:
///
/// - one sample named `name` per quantile, in the order given, labeled with the child's labels
///   plus a `quantile` label, valued at the snapshot's quantile multiplied by `factor`
/// - a `name_count` sample with the number of recorded values
/// - a `name_sum` sample with the sum of the recorded values multiplied by `factor`
///
/// [`parse_quantiles`](metrics_reservoir::parse_quantiles) yields quantiles in ascending order.
/// A child without any recorded values produces `0.0` for every quantile and for the sum.
pub fn create_samples_from_snapshot<S: Summarizable>(
    metric_data: &MetricData<S>,
    name: &str,
    label_names: &[String],
    quantiles: &[Quantile],
    factor: f64,
    creator: &SampleCreator,
) -> Vec<Sample> {
    let metric = metric_data.metric();
    let label_values = metric_data.label_values();
    let snapshot = metric.snapshot();

    let mut samples = Vec::with_capacity(quantiles.len() + 2);

    let mut quantile_label_names = label_names.to_vec();
    quantile_label_names.push(QUANTILE_LABEL.to_string());
    let mut quantile_label_values = label_values.to_vec();

    for quantile in quantiles {
        quantile_label_values.push(quantile.label().to_string());
        samples.push(creator.create_sample(
            name,
            &quantile_label_names,
            &quantile_label_values,
            snapshot.value(quantile.value()) * factor,
        ));
        quantile_label_values.pop();
    }

    samples.push(creator.create_sample(
        &format!("{}_count", name),
        label_names,
        label_values,
        metric.count() as f64,
    ));
    samples.push(creator.create_sample(
        &format!("{}_sum", name),
        label_names,
        label_values,
        metric.sum() * factor,
    ));

    samples
}
