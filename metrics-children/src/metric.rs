use std::sync::Arc;

use crate::{
    children::{ChildMetricRepo, LabelValidator, MetricData},
    MetricFamilySamples, SampleCreator,
};

/// The exposition type of a metric.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MetricType {
    /// A monotonically increasing counter.
    Counter,
    /// A set of quantiles, along with a count and a sum.
    Summary,
}

impl MetricType {
    /// Gets the exposition string of this `MetricType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Summary => "summary",
        }
    }
}

/// A metric that can be scraped.
pub trait Metric: Send + Sync {
    /// Gets the full name of the metric.
    fn name(&self) -> &str;

    /// Gets the help text of the metric.
    fn help(&self) -> &str;

    /// Gets the label names of the metric, in declaration order.
    fn label_names(&self) -> &[String];

    /// Gets the exposition type of the metric.
    fn metric_type(&self) -> MetricType;

    /// Collects the current samples of every child of the metric.
    fn collect(&self, creator: &SampleCreator) -> MetricFamilySamples;
}

/// The resolved configuration every metric is built from.
pub(crate) struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
    pub validator: Option<LabelValidator>,
}

/// Gets every child of `repo`, ordered by label values.
///
/// Scrapes go through this so that children always appear in the same order.
pub(crate) fn sorted_children<T>(repo: &ChildMetricRepo<T>) -> Vec<Arc<MetricData<T>>> {
    let mut children = Vec::with_capacity(repo.len());
    repo.for_each_metric_data(|data| children.push(Arc::clone(data)));
    children.sort_by(|a, b| a.label_values().cmp(b.label_values()));
    children
}
