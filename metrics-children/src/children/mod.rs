//! Storage for the children of a metric.
//!
//! A metric declared with label names has one child per distinct tuple of label values, created
//! the first time that tuple is seen.  A metric declared without label names has exactly one
//! child, created up front.  [`ChildMetricRepo`] hides which of the two a metric uses.

use std::sync::Arc;

use crate::LabelError;

mod labeled;
pub use labeled::LabeledChildrenRepo;

mod unlabeled;
pub use unlabeled::UnlabeledChildRepo;

/// Checks label values before the child for them is created.
///
/// Validators run once per distinct tuple, by whichever caller ends up creating the child.  Later
/// lookups of the same tuple are not validated again.
pub type LabelValidator = Arc<dyn Fn(&[&str]) -> Result<(), LabelError> + Send + Sync>;

/// A child metric along with the label values that identify it.
///
/// The pairing never changes once created; only the metric's own internal state does.
#[derive(Debug)]
pub struct MetricData<T> {
    metric: T,
    label_values: Arc<[String]>,
}

impl<T> MetricData<T> {
    /// Creates a new `MetricData`.
    pub fn new<V>(metric: T, label_values: V) -> Self
    where
        V: Into<Arc<[String]>>,
    {
        Self { metric, label_values: label_values.into() }
    }

    /// Gets the child metric.
    pub fn metric(&self) -> &T {
        &self.metric
    }

    /// Gets the label values of the child metric, in label name order.
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }
}

/// The children of a metric.
pub enum ChildMetricRepo<T> {
    /// A metric without labels, and so with a single child.
    Unlabeled(UnlabeledChildRepo<T>),
    /// A metric with labels, and so with a child per distinct tuple of label values.
    Labeled(LabeledChildrenRepo<T>),
}

impl<T> ChildMetricRepo<T> {
    /// Creates the repo for a metric with `label_count` label names.
    ///
    /// When `label_count` is zero, the single child is created immediately and `validator` is
    /// ignored.  Otherwise, `factory` is called once for every new tuple of label values.
    pub fn new<F>(label_count: usize, validator: Option<LabelValidator>, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        if label_count == 0 {
            ChildMetricRepo::Unlabeled(UnlabeledChildRepo::new(factory()))
        } else {
            ChildMetricRepo::Labeled(LabeledChildrenRepo::new(label_count, validator, factory))
        }
    }

    /// Gets the child for the given label values, creating it if it does not yet exist.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::ArityMismatch`] if the number of label values does not match the
    /// number of label names, and [`LabelError::Rejected`] if the label validator rejects a tuple
    /// that did not exist yet.  In both cases, no child is created.
    pub fn metric_for_labels(
        &self,
        label_values: &[&str],
    ) -> Result<Arc<MetricData<T>>, LabelError> {
        match self {
            ChildMetricRepo::Unlabeled(repo) => repo.metric_for_labels(label_values),
            ChildMetricRepo::Labeled(repo) => repo.metric_for_labels(label_values),
        }
    }

    /// Visits every child.
    ///
    /// Children created while the visit is in progress may or may not be visited.
    pub fn for_each_metric_data<F>(&self, f: F)
    where
        F: FnMut(&Arc<MetricData<T>>),
    {
        match self {
            ChildMetricRepo::Unlabeled(repo) => repo.for_each_metric_data(f),
            ChildMetricRepo::Labeled(repo) => repo.for_each_metric_data(f),
        }
    }

    /// Gets the number of label names every tuple must match.
    pub fn label_count(&self) -> usize {
        match self {
            ChildMetricRepo::Unlabeled(_) => 0,
            ChildMetricRepo::Labeled(repo) => repo.label_count(),
        }
    }

    /// Gets the number of children.
    pub fn len(&self) -> usize {
        match self {
            ChildMetricRepo::Unlabeled(_) => 1,
            ChildMetricRepo::Labeled(repo) => repo.len(),
        }
    }

    /// Returns `true` if there are no children.
    ///
    /// Metrics without labels always have exactly one child.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
