//! Integration Tests for the Signal Engine
//!
//! These tests verify that signals, derived signals and effects work
//! together: batching, equality, error isolation and the debug surface.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use filament_core::config::{Config, RuntimeConfig};
use filament_core::reactive::{
    create_signal, derived, effect, set_executor, tick, untrack, DebugOptions, QueueExecutor,
    Runtime, Signal, SignalOptions, TokioExecutor,
};

use common::{capture, with_message};

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    (count.clone(), count)
}

/// Several writes in one turn produce one re-run that sees the last value.
#[test]
fn writes_in_one_turn_are_batched() {
    let signal = Signal::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (s, log) = (signal.clone(), seen.clone());
    let handle = effect(move || log.borrow_mut().push(s.get()));

    for value in 1..=4 {
        signal.set(value);
    }
    assert_eq!(Runtime::pending_count(), 1);
    assert_eq!(*seen.borrow(), vec![0]);

    tick();
    assert_eq!(*seen.borrow(), vec![0, 4]);
    assert_eq!(handle.run_count(), 2);
    assert_eq!(Runtime::pending_count(), 0);
}

#[test]
fn writes_to_several_signals_share_a_flush() {
    let a = Signal::new(1);
    let b = Signal::new(2);
    let (runs, r) = counter();
    let (x, y) = (a.clone(), b.clone());
    let _sum = effect(move || {
        let _ = x.get() + y.get();
        r.set(r.get() + 1);
    });

    a.set(10);
    b.set(20);
    tick();
    assert_eq!(runs.get(), 2);
}

#[test]
fn equal_primitives_do_not_notify() {
    let signal = Signal::new("same".to_string());
    let (runs, r) = counter();
    let s = signal.clone();
    let _watch = effect(move || {
        let _ = s.get();
        r.set(r.get() + 1);
    });

    signal.set("same".to_string());
    assert_eq!(Runtime::pending_count(), 0);
    tick();
    assert_eq!(runs.get(), 1);
}

#[test]
fn collections_always_notify() {
    let signal = Signal::new(vec![1, 2]);
    let (runs, r) = counter();
    let s = signal.clone();
    let _watch = effect(move || {
        let _ = s.get();
        r.set(r.get() + 1);
    });

    signal.set(vec![1, 2]);
    tick();
    assert_eq!(runs.get(), 2);
}

#[test]
fn getter_setter_pair() {
    let (count, set_count) = create_signal(1);
    let (runs, r) = counter();
    let c = count.clone();
    let _watch = effect(move || {
        let _ = c.get();
        r.set(r.get() + 1);
    });

    set_count.update(|n| n + 1);
    tick();
    assert_eq!(count.get(), 2);
    assert_eq!(runs.get(), 2);
}

/// Only the signals read on the latest run are dependencies.
#[test]
fn dependencies_follow_the_latest_run() {
    let use_a = Signal::new(true);
    let a = Signal::new(0);
    let b = Signal::new(0);
    let (runs, r) = counter();
    let (flag, x, y) = (use_a.clone(), a.clone(), b.clone());
    let watch = effect(move || {
        r.set(r.get() + 1);
        if flag.get() {
            x.get()
        } else {
            y.get()
        };
    });
    assert_eq!(b.subscriber_count(), 0);

    use_a.set(false);
    tick();
    assert_eq!(runs.get(), 2);
    assert_eq!(a.subscriber_count(), 0);
    assert_eq!(b.subscriber_count(), 1);

    a.set(5);
    tick();
    assert_eq!(runs.get(), 2);
    assert_eq!(watch.dependency_count(), 2);
}

#[test]
fn untracked_reads_do_not_subscribe() {
    let signal = Signal::new(0);
    let s = signal.clone();
    let watch = effect(move || {
        untrack(|| s.get());
    });
    assert_eq!(watch.dependency_count(), 0);
    assert_eq!(signal.subscriber_count(), 0);
}

#[test]
fn derived_chains_propagate() {
    let base = Signal::new(2);
    let b = base.clone();
    let doubled = derived(move || b.get() * 2);
    let d = doubled.clone();
    let plus_one = derived(move || d.get() + 1);

    assert_eq!(plus_one.get(), 5);
    base.set(10);
    tick();
    assert_eq!(doubled.get(), 20);
    assert_eq!(plus_one.get(), 21);
}

/// A failing subscriber is logged and does not stop the others.
#[test]
fn subscriber_errors_are_isolated() {
    let signal = Signal::new(0);
    let (healthy, h) = counter();

    let s = signal.clone();
    let _failing = effect(move || {
        if s.get() > 0 {
            panic!("boom");
        }
    });
    let s = signal.clone();
    let _healthy = effect(move || {
        let _ = s.get();
        h.set(h.get() + 1);
    });

    let (_, events) = capture(|| {
        signal.set(1);
        tick();
    });

    assert_eq!(healthy.get(), 2);
    let errors = with_message(&events, "Error in subscriber");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("error"), Some("panicked: boom"));
    assert_eq!(errors[0].field("old_value"), Some("0"));
    assert_eq!(errors[0].field("new_value"), Some("1"));
    assert!(errors[0].field("function").is_some());
}

#[test]
fn first_run_errors_are_logged() {
    let (handle, events) = capture(|| {
        effect(|| -> Result<(), std::io::Error> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "nope"))
        })
    });
    assert_eq!(handle.run_count(), 1);
    let errors = with_message(&events, "Error in effect");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("error"), Some("nope"));
}

#[test]
fn derived_errors_are_logged() {
    let (value, events) = capture(|| {
        let signal: filament_core::reactive::ReadSignal<i32> = derived(|| panic!("bad input"));
        signal.get()
    });
    assert_eq!(value, 0);
    assert_eq!(with_message(&events, "Error in derived signal").len(), 1);
}

#[test]
fn debug_mode_logs_reads_and_writes() {
    let signal = Signal::with_options(1, SignalOptions::debug("count"));

    let (_, events) = capture(|| {
        let _ = signal.get_with(DebugOptions::labeled("render"));
        signal.set(2);
        // Debug entries are deferred to the next turn.
        tick();
    });

    let reads = with_message(&events, "Signal retrieved");
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].field("value"), Some("1"));
    assert_eq!(reads[0].field("label"), Some("(count) render"));
    assert_eq!(reads[0].field("subscribers"), Some("0"));

    let writes = with_message(&events, "Signal set");
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].field("old_value"), Some("1"));
    assert_eq!(writes[0].field("new_value"), Some("2"));
    assert_eq!(writes[0].field("label"), Some("(count)"));
}

#[test]
fn per_call_debug_on_anonymous_signal() {
    let signal = Signal::new(7);
    let (_, events) = capture(|| {
        signal.set_with(8, DebugOptions { debug_mode: true, label: None });
        let _ = signal.get();
        tick();
    });
    let writes = with_message(&events, "Signal set");
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].field("label"), Some("anonymous signal"));
    assert!(with_message(&events, "Signal retrieved").is_empty());
}

#[test]
fn runaway_effects_stop_at_the_tick_limit() {
    Config {
        runtime: RuntimeConfig {
            max_tick_rounds: 50,
            ..Default::default()
        },
        ..Default::default()
    }
    .install();

    let signal = Signal::new(0);
    let s = signal.clone();
    let _loop = effect(move || {
        let next = s.get() + 1;
        s.set(next);
    });
    signal.set(100);

    let (ran, events) = capture(tick);
    assert_eq!(ran, 50);
    assert_eq!(events.iter().filter(|e| e.level == tracing::Level::WARN).count(), 1);

    Config::default().install();
}

#[tokio::test(flavor = "current_thread")]
async fn tokio_executor_flushes_on_the_local_set() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            set_executor(TokioExecutor);

            let signal = Signal::new(0);
            let seen = Rc::new(Cell::new(0));
            let (s, out) = (signal.clone(), seen.clone());
            let _watch = effect(move || out.set(s.get()));

            signal.set(3);
            signal.set(4);
            assert_eq!(seen.get(), 0);

            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            assert_eq!(seen.get(), 4);

            set_executor(QueueExecutor);
        })
        .await;
}
