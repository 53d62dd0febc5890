//! Registry behaviour under concurrent callers.
#![allow(missing_docs)]

use optron_metrics::{
    Counter, Metric, PrefixedRegistry, Registry, RegistryExt, StandardRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 16;

#[test]
fn concurrent_get_or_register_constructs_once() {
    let registry = Arc::new(StandardRegistry::new());
    let constructed = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let constructed = Arc::clone(&constructed);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.get_or_register_with("shared", || {
                    constructed.fetch_add(1, Ordering::SeqCst);
                    Metric::from(Counter::new())
                })
            })
        })
        .collect();

    let metrics: Vec<Metric> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    let first = metrics.first().expect("at least one");
    assert!(metrics.iter().all(|metric| metric.ptr_eq(first)));
}

#[test]
fn concurrent_updates_are_not_lost() {
    let registry = Arc::new(StandardRegistry::new());
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    registry.update("hits", 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    let hits = registry.counter("hits").expect("counter");
    assert_eq!(hits.count(), 16_000);
}

#[test]
fn each_iterates_a_snapshot_while_others_mutate() {
    let registry = Arc::new(StandardRegistry::new());
    for index in 0..100 {
        registry.update(&format!("m.{index:03}"), 1);
    }

    let writer = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for index in 0..100 {
                registry.unregister(&format!("m.{index:03}"));
                registry.update(&format!("n.{index:03}"), 1);
            }
        })
    };

    let mut seen = Vec::new();
    registry.each(&mut |name, metric| {
        assert!(matches!(metric, Metric::Counter(_)));
        seen.push(name.to_owned());
    });
    writer.join().expect("writer");

    let mut sorted = seen.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(seen, sorted, "names visited in strictly ascending order");
}

#[test]
fn each_visits_exactly_the_names_present_at_call_time() {
    let registry = StandardRegistry::new();
    for name in ["c", "a", "b"] {
        registry.update(name, 1);
    }

    let mut seen = Vec::new();
    registry.each(&mut |name, _| {
        registry.unregister("c");
        registry.update("d", 1);
        seen.push(name.to_owned());
    });
    assert_eq!(seen, ["a", "b", "c"]);
}

#[test]
fn prefixed_registration_visible_from_root() {
    let root = Arc::new(StandardRegistry::new());
    let parent: Arc<dyn Registry> = root.clone();
    let api = PrefixedRegistry::child(parent, "api.");
    api.register("calls", Metric::from(Counter::new()))
        .expect("register");

    let mut names = Vec::new();
    root.each(&mut |name, _| names.push(name.to_owned()));
    assert_eq!(names, ["api.calls"]);
}
