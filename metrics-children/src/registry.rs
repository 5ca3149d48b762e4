use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::{formatting::render_families, Metric, MetricFamilySamples, RegistryError, SampleCreator};

/// A set of metrics that are scraped together.
///
/// Metrics are collected in the order they were registered.
pub struct MetricRegistry {
    metrics: RwLock<IndexMap<String, Arc<dyn Metric>>>,
    creator: SampleCreator,
}

impl MetricRegistry {
    /// Creates an empty `MetricRegistry`.
    pub fn new() -> Self {
        Self::with_sample_creator(SampleCreator::new())
    }

    /// Creates an empty `MetricRegistry` that creates samples with the given creator.
    pub fn with_sample_creator(creator: SampleCreator) -> Self {
        Self { metrics: RwLock::new(IndexMap::new()), creator }
    }

    /// Registers a metric.
    ///
    /// # Errors
    ///
    /// If a metric with the same name is already registered, an error is returned and the
    /// registry is left unchanged.
    pub fn register(&self, metric: Arc<dyn Metric>) -> Result<(), RegistryError> {
        let name = metric.name().to_string();
        let mut metrics = self.metrics.write();
        if metrics.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        let metric_type = metric.metric_type().as_str();
        debug!(metric_name = %name, metric_type, "registered metric");
        metrics.insert(name, metric);
        Ok(())
    }

    /// Removes the metric with the given name, returning it if it was registered.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Metric>> {
        self.metrics.write().shift_remove(name)
    }

    /// Gets the number of registered metrics.
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// Returns `true` if no metrics are registered.
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Collects the samples of every registered metric.
    pub fn collect(&self) -> Vec<MetricFamilySamples> {
        // Metrics are collected outside of the lock so that collection never blocks registration.
        let metrics = self.metrics.read().values().cloned().collect::<Vec<_>>();
        metrics.iter().map(|metric| metric.collect(&self.creator)).collect()
    }

    /// Renders every registered metric in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        render_families(&self.collect())
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}
