use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use metrics_reservoir::{
    parse_quantiles, ExponentiallyDecayingReservoir, Quantile, Reservoir, ReservoirSupplier,
    SlidingTimeWindowReservoir, SlidingWindowReservoir, Snapshot, UniformReservoir, DEFAULT_ALPHA,
    DEFAULT_SIZE,
};
use quanta::{Clock, Instant};

use crate::{
    builder::{common_builder_methods, MetricBuilder},
    children::{ChildMetricRepo, MetricData},
    labels::split_label_values,
    metric::{sorted_children, MetricDescriptor},
    samples::{create_samples_from_snapshot, Summarizable, QUANTILE_LABEL},
    BuildError, LabelError, Metric, MetricFamilySamples, MetricType, SampleCreator, TimeUnit,
};

/// Quantiles exposed by a timer unless configured otherwise.
pub const DEFAULT_QUANTILES: &[f64] = &[0.5, 0.75, 0.95, 0.98, 0.99, 0.999];

/// Records durations into a reservoir, along with their count and sum.
///
/// Durations are always recorded in nanoseconds.
pub struct ReservoirTimer {
    reservoir: Box<dyn Reservoir>,
    count: AtomicU64,
    sum: AtomicU64,
    clock: Clock,
}

impl ReservoirTimer {
    /// Creates a new `ReservoirTimer` backed by the given reservoir.
    ///
    /// `clock` is used to time [`TimerContext`]s.
    pub fn new(reservoir: Box<dyn Reservoir>, clock: Clock) -> Self {
        Self { reservoir, count: AtomicU64::new(0), sum: AtomicU64::new(0), clock }
    }

    /// Records a duration.
    ///
    /// Durations longer than `u64::MAX` nanoseconds are recorded as `u64::MAX` nanoseconds.
    pub fn update(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.update_nanos(nanos);
    }

    /// Records a duration given in nanoseconds.
    pub fn update_nanos(&self, nanos: u64) {
        self.reservoir.update(nanos);
        self.count.fetch_add(1, Ordering::Relaxed);
        // The sum saturates rather than wrapping around.
        let _ = self.sum.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |sum| {
            Some(sum.saturating_add(nanos))
        });
    }

    /// Starts timing an operation.
    ///
    /// The elapsed time is recorded when [`TimerContext::stop`] is called.
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext { timer: self, start: self.clock.now() }
    }

    /// Takes a snapshot of the recorded durations, in nanoseconds.
    pub fn snapshot(&self) -> Snapshot {
        self.reservoir.snapshot()
    }

    /// Gets the number of recorded durations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Gets the sum of all recorded durations, in nanoseconds.
    pub fn sum_nanos(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    fn elapsed_since(&self, start: Instant) -> Duration {
        self.clock.now().duration_since(start)
    }
}

impl Summarizable for ReservoirTimer {
    fn snapshot(&self) -> Snapshot {
        ReservoirTimer::snapshot(self)
    }

    fn count(&self) -> u64 {
        ReservoirTimer::count(self)
    }

    fn sum(&self) -> f64 {
        self.sum_nanos() as f64
    }
}

/// An in-flight timing on a [`ReservoirTimer`].
#[must_use = "nothing is recorded unless `stop` is called"]
pub struct TimerContext<'a> {
    timer: &'a ReservoirTimer,
    start: Instant,
}

impl TimerContext<'_> {
    /// Stops timing, records the elapsed time, and returns it.
    pub fn stop(self) -> Duration {
        let elapsed = self.timer.elapsed_since(self.start);
        self.timer.update(elapsed);
        elapsed
    }
}

/// An in-flight timing on the child of a [`Timer`].
///
/// A span holds on to its child, so it can be moved across threads and outlive the borrow of the
/// timer that started it.  Stopping consumes the span, so a span records at most once.  Dropping a
/// span without stopping it records nothing.
#[must_use = "nothing is recorded unless `stop` is called"]
pub struct TimerSpan {
    child: Arc<MetricData<ReservoirTimer>>,
    start: Instant,
}

impl TimerSpan {
    /// Stops the span, records the elapsed time on its child, and returns it.
    pub fn stop(self) -> Duration {
        let timer = self.child.metric();
        let elapsed = timer.elapsed_since(self.start);
        timer.update(elapsed);
        elapsed
    }

    /// Gets the label values of the child this span records to.
    pub fn label_values(&self) -> &[String] {
        self.child.label_values()
    }
}

/// A labeled timer, exposed as a summary.
///
/// Each distinct tuple of label values gets its own [`ReservoirTimer`], created the first time the
/// tuple is used.  Quantiles and sums are exposed in the configured [`TimeUnit`].
pub struct Timer {
    descriptor: MetricDescriptor,
    unit: TimeUnit,
    quantiles: Vec<Quantile>,
    clock: Clock,
    children: ChildMetricRepo<ReservoirTimer>,
}

impl Timer {
    /// Creates a [`TimerBuilder`] for a timer with the given name and help text.
    pub fn builder<N, H>(name: N, help: H) -> TimerBuilder
    where
        N: Into<String>,
        H: Into<String>,
    {
        TimerBuilder::new(name.into(), help.into())
    }

    /// Gets the child for the given label values, creating it if needed.
    pub fn metric_for_labels(
        &self,
        label_values: &[&str],
    ) -> Result<Arc<MetricData<ReservoirTimer>>, LabelError> {
        self.children.metric_for_labels(label_values)
    }

    /// Starts a span on the child for the given label values.
    ///
    /// The child is resolved before the span starts, so resolution is never part of the recorded
    /// duration.
    pub fn start_timer(&self, label_values: &[&str]) -> Result<TimerSpan, LabelError> {
        let child = self.metric_for_labels(label_values)?;
        Ok(TimerSpan { child, start: self.clock.now() })
    }

    /// Starts a span on the child for the given delimited label values.
    ///
    /// See [`labels`](crate::labels) for the format.
    pub fn start_timer_delimited(&self, label_values: &str) -> Result<TimerSpan, LabelError> {
        let values = split_label_values(label_values);
        let values = values.iter().map(String::as_str).collect::<Vec<_>>();
        self.start_timer(&values)
    }

    /// Records a duration on the child for the given label values.
    pub fn record(&self, label_values: &[&str], duration: Duration) -> Result<(), LabelError> {
        self.metric_for_labels(label_values)?.metric().update(duration);
        Ok(())
    }

    /// Runs `f`, recording how long it took on the child for the given label values.
    ///
    /// If the label values are rejected, `f` is not run.
    pub fn time<F, R>(&self, label_values: &[&str], f: F) -> Result<R, LabelError>
    where
        F: FnOnce() -> R,
    {
        let span = self.start_timer(label_values)?;
        let result = f();
        span.stop();
        Ok(result)
    }

    /// Gets the unit that quantiles and sums are exposed in.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Gets the exposed quantiles, in ascending order.
    pub fn quantiles(&self) -> &[Quantile] {
        &self.quantiles
    }

    /// Gets the children of this timer.
    pub fn children(&self) -> &ChildMetricRepo<ReservoirTimer> {
        &self.children
    }
}

impl Metric for Timer {
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
        MetricType::Summary
    }

    fn collect(&self, creator: &SampleCreator) -> MetricFamilySamples {
        let factor = self.unit.factor();
        let samples = sorted_children(&self.children)
            .iter()
            .flat_map(|child| {
                create_samples_from_snapshot(
                    child,
                    &self.descriptor.name,
                    &self.descriptor.label_names,
                    &self.quantiles,
                    factor,
                    creator,
                )
            })
            .collect();

        MetricFamilySamples {
            name: self.descriptor.name.clone(),
            metric_type: MetricType::Summary,
            help: self.descriptor.help.clone(),
            samples,
        }
    }
}

enum ReservoirConfig {
    Uniform(usize),
    SlidingWindow(usize),
    SlidingTimeWindow(Duration),
    ExponentiallyDecaying { size: usize, alpha: f64 },
    Custom(ReservoirSupplier),
}

impl ReservoirConfig {
    fn into_supplier(self, clock: &Clock) -> Result<ReservoirSupplier, BuildError> {
        let supplier: ReservoirSupplier = match self {
            ReservoirConfig::Uniform(0)
            | ReservoirConfig::SlidingWindow(0)
            | ReservoirConfig::ExponentiallyDecaying { size: 0, .. } => {
                return Err(BuildError::InvalidReservoirSize)
            }
            ReservoirConfig::SlidingTimeWindow(window) if window.is_zero() => {
                return Err(BuildError::InvalidReservoirSize)
            }
            ReservoirConfig::Uniform(size) => Arc::new(move || {
                Box::new(UniformReservoir::new(size)) as Box<dyn Reservoir>
            }),
            ReservoirConfig::SlidingWindow(size) => Arc::new(move || {
                Box::new(SlidingWindowReservoir::new(size)) as Box<dyn Reservoir>
            }),
            ReservoirConfig::SlidingTimeWindow(window) => {
                let clock = clock.clone();
                Arc::new(move || {
                    Box::new(SlidingTimeWindowReservoir::new(window, clock.clone()))
                        as Box<dyn Reservoir>
                })
            }
            ReservoirConfig::ExponentiallyDecaying { size, alpha } => {
                let clock = clock.clone();
                Arc::new(move || {
                    Box::new(ExponentiallyDecayingReservoir::new(size, alpha, clock.clone()))
                        as Box<dyn Reservoir>
                })
            }
            ReservoirConfig::Custom(supplier) => supplier,
        };
        Ok(supplier)
    }
}

/// Builder for creating and configuring a [`Timer`].
///
/// By default, a timer exposes values in nanoseconds, uses [`DEFAULT_QUANTILES`], and records
/// into an [`ExponentiallyDecayingReservoir`] of [`DEFAULT_SIZE`] values with an alpha of
/// [`DEFAULT_ALPHA`].
pub struct TimerBuilder {
    common: MetricBuilder,
    unit: TimeUnit,
    quantiles: Vec<Quantile>,
    clock: Option<Clock>,
    reservoir: ReservoirConfig,
}

impl TimerBuilder {
    fn new(name: String, help: String) -> Self {
        Self {
            common: MetricBuilder::new(name, help),
            unit: TimeUnit::default(),
            quantiles: parse_quantiles(DEFAULT_QUANTILES),
            clock: None,
            reservoir: ReservoirConfig::ExponentiallyDecaying {
                size: DEFAULT_SIZE,
                alpha: DEFAULT_ALPHA,
            },
        }
    }

    common_builder_methods!();

    /// Sets the unit that quantiles and sums are exposed in.
    pub fn measure_in(mut self, unit: TimeUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Sets the quantiles to expose.
    ///
    /// Quantiles are clamped to `[0, 1]`, sorted, and deduplicated.
    pub fn quantiles(mut self, quantiles: &[f64]) -> Self {
        self.quantiles = parse_quantiles(quantiles);
        self
    }

    /// Sets the clock used to time spans and to age time-based reservoirs.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Records into a [`UniformReservoir`] holding up to `size` values.
    pub fn with_uniform_reservoir(mut self, size: usize) -> Self {
        self.reservoir = ReservoirConfig::Uniform(size);
        self
    }

    /// Records into a [`SlidingWindowReservoir`] holding the last `size` values.
    pub fn with_sliding_window_reservoir(mut self, size: usize) -> Self {
        self.reservoir = ReservoirConfig::SlidingWindow(size);
        self
    }

    /// Records into a [`SlidingTimeWindowReservoir`] holding the values of the last `window`.
    pub fn with_sliding_time_window_reservoir(mut self, window: Duration) -> Self {
        self.reservoir = ReservoirConfig::SlidingTimeWindow(window);
        self
    }

    /// Records into an [`ExponentiallyDecayingReservoir`].
    pub fn with_exponentially_decaying_reservoir(mut self, size: usize, alpha: f64) -> Self {
        self.reservoir = ReservoirConfig::ExponentiallyDecaying { size, alpha };
        self
    }

    /// Records into reservoirs created by `supplier`, one per child.
    pub fn with_reservoir<F, R>(mut self, supplier: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Reservoir + 'static,
    {
        self.reservoir =
            ReservoirConfig::Custom(Arc::new(move || Box::new(supplier()) as Box<dyn Reservoir>));
        self
    }

    /// Builds the timer.
    ///
    /// # Errors
    ///
    /// If the name, help text, or label names are invalid, or if the reservoir is configured to
    /// hold nothing, an error variant will be returned describing the problem.
    pub fn build(self) -> Result<Timer, BuildError> {
        let clock = self.clock.unwrap_or_else(Clock::new);
        let supplier = self.reservoir.into_supplier(&clock)?;
        let descriptor = self.common.build("timer", &[QUANTILE_LABEL])?;

        let child_clock = clock.clone();
        let children = ChildMetricRepo::new(
            descriptor.label_names.len(),
            descriptor.validator.clone(),
            move || ReservoirTimer::new(supplier(), child_clock.clone()),
        );

        Ok(Timer { descriptor, unit: self.unit, quantiles: self.quantiles, clock, children })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mock_timer(labels: &[&str]) -> (Timer, Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let timer = Timer::builder("latency", "Request latency.")
            .label_names(labels.iter().copied())
            .measure_in(TimeUnit::Milliseconds)
            .with_clock(clock)
            .build()
            .expect("should build");
        (timer, mock)
    }

    #[test]
    fn test_reservoir_timer_context() {
        let (clock, mock) = Clock::mock();
        let timer = ReservoirTimer::new(Box::new(SlidingWindowReservoir::new(8)), clock);

        let context = timer.time();
        mock.increment(Duration::from_millis(3));
        assert_eq!(context.stop(), Duration::from_millis(3));

        timer.update(Duration::from_millis(5));
        assert_eq!(timer.count(), 2);
        assert_eq!(timer.sum_nanos(), 8_000_000);
        assert_eq!(timer.snapshot().max(), 5_000_000.0);
    }

    #[test]
    fn test_reservoir_timer_sum_saturates() {
        let timer = ReservoirTimer::new(Box::new(SlidingWindowReservoir::new(2)), Clock::new());
        timer.update_nanos(u64::MAX - 1);
        timer.update(Duration::MAX);
        assert_eq!(timer.count(), 2);
        assert_eq!(timer.sum_nanos(), u64::MAX);
    }

    #[test]
    fn test_span_records_elapsed_time() {
        let (timer, mock) = mock_timer(&["method"]);

        let span = timer.start_timer(&["GET"]).expect("valid labels");
        assert_eq!(span.label_values(), &["GET".to_string()]);
        mock.increment(Duration::from_millis(5));
        assert_eq!(span.stop(), Duration::from_millis(5));

        let child = timer.metric_for_labels(&["GET"]).expect("valid labels");
        assert_eq!(child.metric().count(), 1);
        assert_eq!(child.metric().sum_nanos(), 5_000_000);
    }

    #[test]
    fn test_dropped_span_records_nothing() {
        let (timer, mock) = mock_timer(&["method"]);

        let span = timer.start_timer(&["GET"]).expect("valid labels");
        mock.increment(Duration::from_millis(5));
        drop(span);

        let child = timer.metric_for_labels(&["GET"]).expect("valid labels");
        assert_eq!(child.metric().count(), 0);
    }

    #[test]
    fn test_span_outlives_timer_borrow() {
        let (timer, mock) = mock_timer(&["method"]);
        let timer = Arc::new(timer);

        let span = timer.start_timer(&["PUT"]).expect("valid labels");
        let handle = std::thread::spawn(move || span.stop());
        mock.increment(Duration::from_millis(1));
        let _ = handle.join().expect("span thread panicked");

        let child = timer.metric_for_labels(&["PUT"]).expect("valid labels");
        assert_eq!(child.metric().count(), 1);
    }

    #[test]
    fn test_time_closure() {
        let (timer, mock) = mock_timer(&["method", "status"]);

        let result = timer.time(&["POST", "201"], || {
            mock.increment(Duration::from_millis(7));
            42
        });
        assert_eq!(result, Ok(42));

        let mut ran = false;
        let result = timer.time(&["POST"], || ran = true);
        assert_eq!(result, Err(LabelError::ArityMismatch { expected: 2, actual: 1 }));
        assert!(!ran);
        assert_eq!(timer.children().len(), 1);
    }

    #[test]
    fn test_milliseconds_sum_and_count() {
        let (timer, _mock) = mock_timer(&[]);
        timer.record(&[], Duration::from_millis(10)).expect("no labels");
        timer.record(&[], Duration::from_millis(30)).expect("no labels");

        let family = timer.collect(&SampleCreator::new());
        let count = family.samples.iter().find(|s| s.name == "latency_count").expect("count");
        let sum = family.samples.iter().find(|s| s.name == "latency_sum").expect("sum");
        assert_eq!(count.value, 2.0);
        assert_relative_eq!(sum.value, 40.0);
    }

    #[test]
    fn test_single_value_quantiles() {
        let (timer, _mock) = mock_timer(&["method"]);
        timer.record(&["GET"], Duration::from_millis(100)).expect("valid labels");

        let family = timer.collect(&SampleCreator::new());
        let quantiles = family.samples.iter().filter(|s| s.name == "latency").collect::<Vec<_>>();
        assert_eq!(quantiles.len(), DEFAULT_QUANTILES.len());
        for sample in quantiles {
            assert_relative_eq!(sample.value, 100.0);
        }
    }

    #[test]
    fn test_zero_recordings_scrape() {
        let (timer, _mock) = mock_timer(&["method"]);
        let _ = timer.metric_for_labels(&["GET"]).expect("valid labels");

        let family = timer.collect(&SampleCreator::new());
        assert_eq!(family.metric_type, MetricType::Summary);
        assert_eq!(family.samples.len(), DEFAULT_QUANTILES.len() + 2);
        assert!(family.samples.iter().all(|s| s.value == 0.0));
    }

    #[test]
    fn test_children_sorted_at_scrape() {
        let (timer, _mock) = mock_timer(&["method"]);
        for method in ["PUT", "GET", "DELETE"] {
            timer.record(&[method], Duration::from_millis(1)).expect("valid labels");
        }

        let family = timer.collect(&SampleCreator::new());
        let methods = family
            .samples
            .iter()
            .filter(|s| s.name == "latency_count")
            .map(|s| s.label_values[0].as_str())
            .collect::<Vec<_>>();
        assert_eq!(methods, vec!["DELETE", "GET", "PUT"]);
    }

    #[test]
    fn test_delimited_labels() {
        let (timer, mock) = mock_timer(&["a", "b"]);

        let span = timer.start_timer_delimited("val,val7").expect("two values");
        mock.increment(Duration::from_millis(2));
        span.stop();
        let child = timer.metric_for_labels(&["val", "val7"]).expect("valid labels");
        assert_eq!(child.metric().count(), 1);

        let result = timer.start_timer_delimited("val,val7,extra");
        assert_eq!(result.err(), Some(LabelError::ArityMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn test_builder_configuration() {
        let timer = Timer::builder("latency", "Request latency.")
            .namespace("app")
            .subsystem("http")
            .quantiles(&[0.99, 0.5, 0.5])
            .with_uniform_reservoir(16)
            .build()
            .expect("should build");

        assert_eq!(timer.name(), "app_http_latency");
        assert_eq!(timer.unit(), TimeUnit::Nanoseconds);
        let labels = timer.quantiles().iter().map(|q| q.label()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["0.5", "0.99"]);
    }

    #[test]
    fn test_builder_errors() {
        let result = Timer::builder("latency", "help").with_uniform_reservoir(0).build();
        assert_eq!(result.err(), Some(BuildError::InvalidReservoirSize));

        let result = Timer::builder("latency", "help")
            .with_sliding_time_window_reservoir(Duration::ZERO)
            .build();
        assert_eq!(result.err(), Some(BuildError::InvalidReservoirSize));

        let result = Timer::builder("latency", "help").label_names(["quantile"]).build();
        assert_eq!(result.err(), Some(BuildError::ReservedLabelName("quantile".to_string())));
    }

    #[test]
    fn test_custom_reservoir() {
        let timer = Timer::builder("latency", "help")
            .with_reservoir(|| SlidingWindowReservoir::new(1))
            .build()
            .expect("should build");

        timer.record(&[], Duration::from_nanos(10)).expect("no labels");
        timer.record(&[], Duration::from_nanos(20)).expect("no labels");

        let child = timer.metric_for_labels(&[]).expect("no labels");
        assert_eq!(child.metric().snapshot().values(), &[20]);
        assert_eq!(child.metric().count(), 2);
    }

    #[test]
    fn test_label_validator() {
        let timer = Timer::builder("latency", "help")
            .label_names(["path"])
            .label_validator(|values: &[&str]| -> Result<(), LabelError> {
                if values[0].starts_with('/') {
                    Ok(())
                } else {
                    Err(LabelError::rejected(values, "paths must be absolute"))
                }
            })
            .build()
            .expect("should build");

        assert!(timer.start_timer(&["/index"]).is_ok());
        assert!(matches!(timer.start_timer(&["index"]), Err(LabelError::Rejected { .. })));
        assert_eq!(timer.children().len(), 1);
    }
}
