use std::sync::Arc;

use tracing::debug;

use crate::{
    children::LabelValidator,
    formatting::{is_valid_label_name, is_valid_metric_name},
    metric::MetricDescriptor,
    BuildError, LabelError,
};

/// Configuration shared by every metric builder.
pub(crate) struct MetricBuilder {
    name: String,
    help: String,
    namespace: Option<String>,
    subsystem: Option<String>,
    label_names: Vec<String>,
    validator: Option<LabelValidator>,
}

impl MetricBuilder {
    pub(crate) fn new(name: String, help: String) -> Self {
        Self {
            name,
            help,
            namespace: None,
            subsystem: None,
            label_names: Vec::new(),
            validator: None,
        }
    }

    pub(crate) fn set_namespace(&mut self, namespace: String) {
        self.namespace = Some(namespace);
    }

    pub(crate) fn set_subsystem(&mut self, subsystem: String) {
        self.subsystem = Some(subsystem);
    }

    pub(crate) fn set_label_names(&mut self, label_names: Vec<String>) {
        self.label_names = label_names;
    }

    pub(crate) fn set_validator(&mut self, validator: LabelValidator) {
        self.validator = Some(validator);
    }

    /// Gets the full name, joining namespace, subsystem, and name with underscores.
    ///
    /// Empty parts are skipped.
    pub(crate) fn full_name(&self) -> String {
        [self.namespace.as_deref(), self.subsystem.as_deref(), Some(self.name.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Validates the configuration and resolves it into a descriptor.
    ///
    /// `reserved` lists label names the metric type adds on its own, and which therefore cannot be
    /// declared.
    pub(crate) fn build(
        self,
        kind: &str,
        reserved: &[&str],
    ) -> Result<MetricDescriptor, BuildError> {
        if self.name.is_empty() {
            return Err(BuildError::EmptyName);
        }

        let name = self.full_name();
        if !is_valid_metric_name(&name) {
            return Err(BuildError::InvalidName(name));
        }
        if self.help.is_empty() {
            return Err(BuildError::EmptyHelp(name));
        }

        for (i, label_name) in self.label_names.iter().enumerate() {
            if reserved.contains(&label_name.as_str()) {
                return Err(BuildError::ReservedLabelName(label_name.clone()));
            }
            if !is_valid_label_name(label_name) {
                return Err(BuildError::InvalidLabelName(label_name.clone()));
            }
            if self.label_names[..i].contains(label_name) {
                return Err(BuildError::DuplicateLabelName(label_name.clone()));
            }
        }

        debug!(metric_name = %name, kind, label_names = ?self.label_names, "built metric");

        Ok(MetricDescriptor {
            name,
            help: self.help,
            label_names: self.label_names,
            validator: self.validator,
        })
    }
}

/// Generates the setters every metric builder shares.
///
/// The builder must hold a `MetricBuilder` in a field named `common`.
macro_rules! common_builder_methods {
    () => {
        /// Sets the namespace, which prefixes the metric name.
        pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
            self.common.set_namespace(namespace.into());
            self
        }

        /// Sets the subsystem, which goes between the namespace and the metric name.
        pub fn subsystem<S: Into<String>>(mut self, subsystem: S) -> Self {
            self.common.set_subsystem(subsystem.into());
            self
        }

        /// Sets the label names.
        ///
        /// Every label value tuple given to the metric must have exactly one value per name, in
        /// the same order.  Defaults to no labels.
        pub fn label_names<I, S>(mut self, label_names: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.common.set_label_names(label_names.into_iter().map(Into::into).collect());
            self
        }

        /// Sets a validator for label values.
        ///
        /// The validator runs once, when a label value tuple is seen for the first time.  If it
        /// returns an error, no child is created and the error is returned to the caller.
        ///
        /// The validator runs without any lock of the metric held, so it may resolve or record
        /// into other tuples of the same metric, but not the tuple it is validating.
        pub fn label_validator<F>(mut self, validator: F) -> Self
        where
            F: Fn(&[&str]) -> Result<(), $crate::LabelError> + Send + Sync + 'static,
        {
            self.common.set_validator(std::sync::Arc::new(validator));
            self
        }
    };
}

pub(crate) use common_builder_methods;

/// Creates a validator that rejects label values longer than `max_len` bytes.
pub fn max_length_validator(max_len: usize) -> LabelValidator {
    Arc::new(move |values: &[&str]| -> Result<(), LabelError> {
        match values.iter().find(|v| v.len() > max_len) {
            Some(value) => Err(LabelError::rejected(
                values,
                format!("`{}` is longer than {} bytes", value, max_len),
            )),
            None => Ok(()),
        }
    })
}
