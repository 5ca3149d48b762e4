use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::{
    builder::{common_builder_methods, MetricBuilder},
    children::{ChildMetricRepo, MetricData},
    metric::{sorted_children, MetricDescriptor},
    BuildError, LabelError, Metric, MetricFamilySamples, MetricType, SampleCreator,
};

/// A labeled counter.
///
/// Each distinct tuple of label values gets its own monotonically increasing count, created the
/// first time the tuple is used.
pub struct Counter {
    descriptor: MetricDescriptor,
    children: ChildMetricRepo<AtomicU64>,
}

impl Counter {
    /// Creates a [`CounterBuilder`] for a counter with the given name and help text.
    pub fn builder<N, H>(name: N, help: H) -> CounterBuilder
    where
        N: Into<String>,
        H: Into<String>,
    {
        CounterBuilder { common: MetricBuilder::new(name.into(), help.into()) }
    }

    /// Gets the child for the given label values, creating it if needed.
    pub fn metric_for_labels(
        &self,
        label_values: &[&str],
    ) -> Result<Arc<MetricData<AtomicU64>>, LabelError> {
        self.children.metric_for_labels(label_values)
    }

    /// Increments the child for the given label values by one.
    pub fn inc(&self, label_values: &[&str]) -> Result<(), LabelError> {
        self.inc_by(label_values, 1)
    }

    /// Increments the child for the given label values by `value`.
    pub fn inc_by(&self, label_values: &[&str], value: u64) -> Result<(), LabelError> {
        self.metric_for_labels(label_values)?.metric().fetch_add(value, Ordering::Relaxed);
        Ok(())
    }

    /// Gets the current count of the child for the given label values.
    pub fn value(&self, label_values: &[&str]) -> Result<u64, LabelError> {
        Ok(self.metric_for_labels(label_values)?.metric().load(Ordering::Relaxed))
    }

    /// Gets the children of this counter.
    pub fn children(&self) -> &ChildMetricRepo<AtomicU64> {
        &self.children
    }
}

impl Metric for Counter {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn help(&self) -> &str {
        &self.descriptor.help
    }

    fn label_names(&self) -> &[String] {
        &self.descriptor.label_names
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Counter
    }

    fn collect(&self, creator: &SampleCreator) -> MetricFamilySamples {
        let samples = sorted_children(&self.children)
            .iter()
            .map(|child| {
                creator.create_sample(
                    &self.descriptor.name,
                    &self.descriptor.label_names,
                    child.label_values(),
                    child.metric().load(Ordering::Relaxed) as f64,
                )
            })
            .collect();

        MetricFamilySamples {
            name: self.descriptor.name.clone(),
            metric_type: MetricType::Counter,
            help: self.descriptor.help.clone(),
            samples,
        }
    }
}

/// Builder for creating and configuring a [`Counter`].
pub struct CounterBuilder {
    common: MetricBuilder,
}

impl CounterBuilder {
    common_builder_methods!();

    /// Builds the counter.
    ///
    /// # Errors
    ///
    /// If the name, help text, or label names are invalid, an error variant will be returned
    /// describing the problem.
    pub fn build(self) -> Result<Counter, BuildError> {
        let descriptor = self.common.build("counter", &[])?;
        let children = ChildMetricRepo::new(
            descriptor.label_names.len(),
            descriptor.validator.clone(),
            || AtomicU64::new(0),
        );

        Ok(Counter { descriptor, children })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inc_and_value() {
        let counter = Counter::builder("requests", "Total requests.")
            .label_names(["method"])
            .build()
            .expect("should build");

        counter.inc(&["GET"]).expect("valid labels");
        counter.inc_by(&["GET"], 4).expect("valid labels");
        counter.inc(&["POST"]).expect("valid labels");

        assert_eq!(counter.value(&["GET"]), Ok(5));
        assert_eq!(counter.value(&["POST"]), Ok(1));
        assert_eq!(counter.children().len(), 2);

        let result = counter.inc(&["GET", "extra"]);
        assert_eq!(result, Err(LabelError::ArityMismatch { expected: 1, actual: 2 }));
        assert_eq!(counter.children().len(), 2);
    }

    #[test]
    fn test_collect() {
        let counter = Counter::builder("requests", "Total requests.")
            .namespace("app")
            .label_names(["method"])
            .build()
            .expect("should build");

        counter.inc_by(&["POST"], 2).expect("valid labels");
        counter.inc_by(&["GET"], 3).expect("valid labels");

        let family = counter.collect(&SampleCreator::new());
        assert_eq!(family.name, "app_requests");
        assert_eq!(family.metric_type, MetricType::Counter);

        let rows = family
            .samples
            .iter()
            .map(|s| (s.label_values[0].as_str(), s.value))
            .collect::<Vec<_>>();
        assert_eq!(rows, vec![("GET", 3.0), ("POST", 2.0)]);
    }

    #[test]
    fn test_unlabeled() {
        let counter = Counter::builder("events", "Events.").build().expect("should build");
        counter.inc(&[]).expect("no labels");

        let family = counter.collect(&SampleCreator::new());
        assert_eq!(family.samples.len(), 1);
        assert!(family.samples[0].label_names.is_empty());
        assert_eq!(family.samples[0].value, 1.0);
    }
}
