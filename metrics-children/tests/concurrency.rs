use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Barrier, Mutex, Weak,
    },
    thread,
    time::Duration,
};

use metrics_children::{Counter, LabelError, Timer};
use once_cell::sync::OnceCell;

#[test]
fn racing_threads_share_one_child() {
    const THREADS: usize = 16;

    let validations = Arc::new(AtomicUsize::new(0));
    let seen = validations.clone();
    let timer = Timer::builder("latency", "Latency.")
        .label_names(["method", "status"])
        .label_validator(move |_: &[&str]| -> Result<(), LabelError> {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build()
        .expect("valid timer");

    let barrier = Barrier::new(THREADS);
    let children = thread::scope(|s| {
        let handles = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    let child = timer.metric_for_labels(&["GET", "200"]).expect("valid labels");
                    child.metric().update(Duration::from_millis(1));
                    child
                })
            })
            .collect::<Vec<_>>();
        handles.into_iter().map(|h| h.join().expect("thread panicked")).collect::<Vec<_>>()
    });

    assert_eq!(validations.load(Ordering::SeqCst), 1);
    assert_eq!(timer.children().len(), 1);
    assert!(children.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(children[0].metric().count(), THREADS as u64);
}

#[test]
fn concurrent_counters_do_not_lose_increments() {
    const THREADS: usize = 8;
    const ITERATIONS: u64 = 1_000;

    let counter = Counter::builder("hits", "Hits.")
        .label_names(["shard"])
        .build()
        .expect("valid counter");

    thread::scope(|s| {
        for t in 0..THREADS {
            let counter = &counter;
            s.spawn(move || {
                let own = t.to_string();
                for _ in 0..ITERATIONS {
                    counter.inc(&["shared"]).expect("valid labels");
                    counter.inc(&[own.as_str()]).expect("valid labels");
                }
            });
        }
    });

    assert_eq!(counter.value(&["shared"]), Ok(THREADS as u64 * ITERATIONS));
    for t in 0..THREADS {
        assert_eq!(counter.value(&[t.to_string().as_str()]), Ok(ITERATIONS));
    }
    assert_eq!(counter.children().len(), THREADS + 1);
}

#[test]
fn arity_errors_under_contention_leave_repo_untouched() {
    let timer = Timer::builder("latency", "Latency.")
        .label_names(["a", "b"])
        .build()
        .expect("valid timer");

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..100 {
                    let err = timer.start_timer(&["only-one"]).err();
                    assert_eq!(err, Some(LabelError::ArityMismatch { expected: 2, actual: 1 }));
                }
            });
        }
    });

    assert!(timer.children().is_empty());
}

#[test]
fn existing_children_resolve_while_another_is_validated() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);

    let timer = Timer::builder("latency", "Latency.")
        .label_names(["route"])
        .label_validator(move |values: &[&str]| -> Result<(), LabelError> {
            if values[0] == "slow" {
                entered_tx.lock().unwrap().send(()).unwrap();
                let wait = release_rx.lock().unwrap().recv_timeout(Duration::from_secs(5));
                if wait.is_err() {
                    return Err(LabelError::rejected(values, "never released"));
                }
            }
            Ok(())
        })
        .build()
        .expect("valid timer");

    // Enough tuples that every shard holds some of them.
    let routes = (0..64).map(|i| format!("route{}", i)).collect::<Vec<_>>();
    for route in &routes {
        timer.record(&[route.as_str()], Duration::from_millis(1)).expect("valid labels");
    }

    thread::scope(|s| {
        let slow = s.spawn(|| timer.record(&["slow"], Duration::from_millis(1)));
        entered_rx.recv_timeout(Duration::from_secs(5)).expect("validator should start");

        for route in &routes {
            timer.record(&[route.as_str()], Duration::from_millis(1)).expect("valid labels");
        }
        timer.record(&["new"], Duration::from_millis(1)).expect("valid labels");

        release_tx.send(()).expect("validator should be waiting");
        slow.join().expect("thread panicked").expect("should resolve once released");
    });

    let children = timer.children();
    assert_eq!(children.len(), routes.len() + 2);
    for route in &routes {
        let child = timer.metric_for_labels(&[route.as_str()]).expect("valid labels");
        assert_eq!(child.metric().count(), 2);
    }
}

#[test]
fn validator_can_record_into_its_own_metric() {
    let own: Arc<OnceCell<Weak<Counter>>> = Arc::new(OnceCell::new());
    let validator_own = Arc::clone(&own);

    let counter = Counter::builder("requests", "Requests.")
        .label_names(["route"])
        .label_validator(move |values: &[&str]| -> Result<(), LabelError> {
            if values[0] != "all" {
                let counter = validator_own.get().and_then(Weak::upgrade).unwrap();
                counter.inc(&["all"])?;
            }
            Ok(())
        })
        .build()
        .expect("valid counter");
    let counter = Arc::new(counter);
    let _ = own.set(Arc::downgrade(&counter));

    thread::scope(|s| {
        for t in 0..4 {
            let counter = &counter;
            s.spawn(move || {
                let route = format!("route{}", t);
                counter.inc(&[route.as_str()]).expect("valid labels");
            });
        }
    });

    assert_eq!(counter.value(&["all"]), Ok(4));
    assert_eq!(counter.children().len(), 5);
}
