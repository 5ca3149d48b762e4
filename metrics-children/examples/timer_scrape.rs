use std::thread;
use std::time::Duration;

use metrics_children::{Counter, MetricRegistry, SampleCreator, TimeUnit, Timer};

use rand::Rng;

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let timer = Timer::builder("request_duration", "Time spent serving requests.")
        .namespace("demo")
        .label_names(["method", "status"])
        .measure_in(TimeUnit::Milliseconds)
        .quantiles(&[0.5, 0.9, 0.99])
        .build()
        .expect("failed to build timer");
    let requests = Counter::builder("requests", "Requests served.")
        .namespace("demo")
        .label_names(["method"])
        .build()
        .expect("failed to build counter");

    let creator = SampleCreator::new().with_static_label("host", "localhost");
    let registry = MetricRegistry::with_sample_creator(creator);

    thread::scope(|s| {
        for method in ["GET", "POST", "PUT", "DELETE"] {
            let timer = &timer;
            let requests = &requests;
            s.spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..50 {
                    let status = if rng.random_bool(0.9) { "200" } else { "500" };
                    let span = timer.start_timer(&[method, status]).expect("valid labels");
                    thread::sleep(Duration::from_micros(rng.random_range(100..2_000)));
                    span.stop();
                    requests.inc(&[method]).expect("valid labels");
                }
            });
        }
    });

    // Delimited label values are split on commas.
    let span = timer.start_timer_delimited("PATCH,204").expect("valid labels");
    span.stop();

    registry.register(std::sync::Arc::new(timer)).expect("failed to register timer");
    registry.register(std::sync::Arc::new(requests)).expect("failed to register counter");

    print!("{}", registry.render());
}
