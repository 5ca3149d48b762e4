//! Labeled metrics with per-label-value children.
//!
//! A metric declares an ordered list of label names when it is built.  Every distinct tuple of
//! label values supplied at runtime gets its own child instance, created lazily the first time the
//! tuple is seen and reused from then on.  Resolving an existing child takes a shared lock on a
//! single shard and does not allocate, so recording into an existing child is cheap even when many
//! threads record at once.
//!
//! # Metrics
//!
//! - [`Timer`]: records durations into a reservoir per child, exposed as a summary with a set of
//!   quantiles, a count, and a sum
//! - [`Counter`]: a monotonically increasing count per child
//!
//! ```
//! use std::time::Duration;
//! use metrics_children::{Metric, SampleCreator, TimeUnit, Timer};
//!
//! let timer = Timer::builder("request_duration", "Time spent serving requests.")
//!     .label_names(["method", "status"])
//!     .measure_in(TimeUnit::Milliseconds)
//!     .build()
//!     .expect("valid configuration");
//!
//! timer.record(&["GET", "200"], Duration::from_millis(12)).expect("valid labels");
//!
//! let span = timer.start_timer(&["POST", "201"]).expect("valid labels");
//! // ... do some work ...
//! span.stop();
//!
//! let family = timer.collect(&SampleCreator::new());
//! assert_eq!(family.name, "request_duration");
//! ```
//!
//! # Scraping
//!
//! Metrics are registered with a [`MetricRegistry`], which collects them into
//! [`MetricFamilySamples`] and renders them in the Prometheus text exposition format.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
pub use builder::max_length_validator;

pub mod children;

mod counter;
pub use counter::{Counter, CounterBuilder};

mod error;
pub use error::{BuildError, LabelError, RegistryError};

pub mod formatting;

mod key;

pub mod labels;

mod metric;
pub use metric::{Metric, MetricType};

mod registry;
pub use registry::MetricRegistry;

mod samples;
pub use samples::{
    create_samples_from_snapshot, MetricFamilySamples, Sample, SampleCreator, Summarizable,
    QUANTILE_LABEL,
};

mod timer;
pub use timer::{ReservoirTimer, Timer, TimerBuilder, TimerContext, TimerSpan, DEFAULT_QUANTILES};

mod unit;
pub use unit::TimeUnit;

pub use metrics_reservoir as reservoir;
