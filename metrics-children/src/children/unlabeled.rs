use std::sync::Arc;

use super::MetricData;
use crate::LabelError;

/// The single child of a metric without labels.
///
/// The child is created along with the repo, so resolving it never allocates, validates, or locks.
pub struct UnlabeledChildRepo<T> {
    child: Arc<MetricData<T>>,
}

impl<T> UnlabeledChildRepo<T> {
    /// Creates a new `UnlabeledChildRepo` holding `metric`.
    pub fn new(metric: T) -> Self {
        Self { child: Arc::new(MetricData::new(metric, Vec::<String>::new())) }
    }

    /// Gets the child.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::ArityMismatch`] if any label values are given.
    pub fn metric_for_labels(
        &self,
        label_values: &[&str],
    ) -> Result<Arc<MetricData<T>>, LabelError> {
        if !label_values.is_empty() {
            return Err(LabelError::ArityMismatch { expected: 0, actual: label_values.len() });
        }

        Ok(Arc::clone(&self.child))
    }

    /// Visits the child.
    pub fn for_each_metric_data<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<MetricData<T>>),
    {
        f(&self.child);
    }
}

#[cfg(test)]
mod tests {
    use super::UnlabeledChildRepo;
    use crate::LabelError;
    use std::sync::Arc;

    #[test]
    fn test_always_same_child() {
        let repo = UnlabeledChildRepo::new(String::from("only"));

        let a = repo.metric_for_labels(&[]).expect("should resolve");
        let b = repo.metric_for_labels(&[]).expect("should resolve");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.metric(), "only");

        let mut visits = 0;
        repo.for_each_metric_data(|data| {
            visits += 1;
            assert!(Arc::ptr_eq(data, &a));
        });
        assert_eq!(visits, 1);
    }

    #[test]
    fn test_rejects_label_values() {
        let repo = UnlabeledChildRepo::new(());
        let err = repo.metric_for_labels(&["unexpected"]).unwrap_err();
        assert_eq!(err, LabelError::ArityMismatch { expected: 0, actual: 1 });
    }
}
