use thiserror::Error as ThisError;

/// Errors that can occur when resolving the child metric for a set of label values.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum LabelError {
    /// The number of label values does not match the number of declared label names.
    #[error("expected {expected} label value(s), got {actual}")]
    ArityMismatch {
        /// Number of declared label names.
        expected: usize,
        /// Number of label values supplied.
        actual: usize,
    },

    /// A label validator rejected the label values.
    #[error("label values {values:?} were rejected: {reason}")]
    Rejected {
        /// The rejected label values.
        values: Vec<String>,
        /// Why the values were rejected.
        reason: String,
    },
}

impl LabelError {
    /// Creates a [`LabelError::Rejected`] for the given values.
    pub fn rejected<S: Into<String>>(values: &[&str], reason: S) -> Self {
        LabelError::Rejected {
            values: values.iter().map(|v| v.to_string()).collect(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while building a metric.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BuildError {
    /// The metric name was empty.
    #[error("metric name cannot be empty")]
    EmptyName,

    /// The help text was empty.
    #[error("help text for `{0}` cannot be empty")]
    EmptyHelp(String),

    /// The full metric name is not a valid Prometheus metric name.
    #[error("`{0}` is not a valid metric name")]
    InvalidName(String),

    /// A label name is not a valid Prometheus label name.
    #[error("`{0}` is not a valid label name")]
    InvalidLabelName(String),

    /// A label name was declared more than once.
    #[error("label name `{0}` is declared more than once")]
    DuplicateLabelName(String),

    /// A label name is reserved by the metric type.
    #[error("label name `{0}` is reserved")]
    ReservedLabelName(String),

    /// A reservoir was configured to hold no values.
    #[error("reservoir size must be greater than zero")]
    InvalidReservoirSize,
}

/// Errors that can occur while registering a metric.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RegistryError {
    /// A metric with the same name is already registered.
    #[error("a metric named `{0}` is already registered")]
    Duplicate(String),
}
