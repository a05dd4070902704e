//! Integration tests for the completion bus.
//!
//! These tests validate:
//! 1. A task's own callback runs before any listener sees its completion
//! 2. Success, failure and done views receive the task arguments
//! 3. The drain notification fires once per idle transition, including
//!    when the last waiting task expires
//! 4. Unsubscribing stops delivery

mod common;

use std::time::Duration;

use common::{advance, Job, Log, Recorder};
use prometheus_fair_queue::core::TaskEvent;
use prometheus_fair_queue::{QueueBuilder, QueueStats};

#[tokio::test(start_paused = true)]
async fn test_callback_runs_before_listeners() {
    let queue = QueueBuilder::<Job>::new("ordering")
        .build_on_current(Recorder::default())
        .unwrap();
    let log = Log::default();

    let listener_log = log.clone();
    queue.subscribe(move |event: &TaskEvent<Job, String>| {
        listener_log.push(format!("listener:{}", event.args.label));
    });
    let callback_log = log.clone();
    queue.submit(Job::new("work", 5), move |_| callback_log.push("callback:work"));

    advance(10).await;
    assert_eq!(log.entries(), vec!["callback:work", "listener:work"]);
}

#[tokio::test(start_paused = true)]
async fn test_success_and_failure_views() {
    let queue = QueueBuilder::<Job>::new("views")
        .with_concurrency(2)
        .build_on_current(Recorder::default())
        .unwrap();
    let log = Log::default();

    let ok_log = log.clone();
    queue.on_success(move |value: &String, args: &Job| ok_log.push(format!("ok:{value}:{}", args.ms)));
    let err_log = log.clone();
    queue.on_failure(move |err, args: &Job| err_log.push(format!("err:{err}:{}", args.label)));
    let done_log = log.clone();
    queue.on_done(move |event: &TaskEvent<Job, String>| done_log.push(format!("done:{}", event.is_success())));

    queue.submit(Job::new("fine", 5), |_| {});
    queue.submit(Job::new("broken", 10).failing(), |_| {});
    advance(20).await;

    assert_eq!(
        log.entries(),
        vec!["ok:fine:5", "done:true", "err:broken failed:broken", "done:false"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_events_carry_stats_and_ids() {
    let queue = QueueBuilder::<Job>::new("stats")
        .with_concurrency(2)
        .build_on_current(Recorder::default())
        .unwrap();
    let seen = Log::default();
    let stats = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));

    let sink = std::sync::Arc::clone(&stats);
    let ids = seen.clone();
    queue.subscribe(move |event: &TaskEvent<Job, String>| {
        sink.lock().push(event.stats);
        ids.push(event.id.to_string());
    });

    let first = queue.submit(Job::new("a", 10), |_| {});
    let second = queue.submit(Job::new("b", 20), |_| {});
    let third = queue.submit(Job::new("c", 30), |_| {});
    advance(50).await;

    assert_eq!(
        *stats.lock(),
        vec![
            QueueStats::new(1, 1, 2),
            QueueStats::new(1, 0, 2),
            QueueStats::new(0, 0, 2),
        ]
    );
    assert_eq!(
        seen.entries(),
        vec![first.to_string(), second.to_string(), third.to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_drain_fires_once_per_batch() {
    let queue = QueueBuilder::<Job>::new("drain")
        .with_concurrency(2)
        .build_on_current(Recorder::default())
        .unwrap();
    let log = Log::default();

    let drain_log = log.clone();
    queue.on_drain(move || drain_log.push("drained"));

    for (label, ms) in [("a", 10), ("b", 20), ("c", 30)] {
        queue.submit(Job::new(label, ms), |_| {});
    }
    advance(100).await;
    assert_eq!(log.entries(), vec!["drained"]);

    queue.submit(Job::new("d", 10), |_| {});
    advance(20).await;
    assert_eq!(log.entries(), vec!["drained", "drained"]);
}

#[tokio::test(start_paused = true)]
async fn test_drain_fires_when_last_task_expires() {
    let queue = QueueBuilder::<Job>::new("drain-expiry")
        .with_waiting_timeout(Duration::from_millis(50))
        .build_on_current(Recorder::default())
        .unwrap();
    let log = Log::default();

    let failure_log = log.clone();
    queue.on_failure(move |err, args: &Job| {
        assert!(err.is_timeout());
        failure_log.push(format!("expired:{}", args.label));
    });
    let drain_log = log.clone();
    queue.on_drain(move || drain_log.push("drained"));

    queue.submit(Job::new("blocker", 100), |_| {});
    queue.submit(Job::new("victim", 10), |_| {});
    advance(150).await;

    assert_eq!(log.entries(), vec!["expired:victim", "drained"]);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_delivery() {
    let queue = QueueBuilder::<Job>::new("unsubscribe")
        .build_on_current(Recorder::default())
        .unwrap();
    let log = Log::default();

    let kept_log = log.clone();
    let kept = queue.on_done(move |event: &TaskEvent<Job, String>| kept_log.push(format!("kept:{}", event.args.label)));
    let dropped_log = log.clone();
    let dropped = queue.on_done(move |event: &TaskEvent<Job, String>| {
        dropped_log.push(format!("dropped:{}", event.args.label));
    });
    assert_eq!(queue.bus().listener_count(), 2);

    queue.submit(Job::new("first", 5), |_| {});
    advance(10).await;

    assert!(dropped.unsubscribe());
    assert!(!dropped.unsubscribe());
    assert!(!queue.unsubscribe(dropped.id()));
    assert_eq!(queue.bus().listener_count(), 1);

    queue.submit(Job::new("second", 5), |_| {});
    advance(10).await;

    assert!(queue.unsubscribe(kept.id()));
    queue.submit(Job::new("third", 5), |_| {});
    advance(10).await;

    assert_eq!(
        log.entries(),
        vec!["kept:first", "dropped:first", "kept:second"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_listener_may_unsubscribe_itself() {
    let queue = QueueBuilder::<Job>::new("once")
        .build_on_current(Recorder::default())
        .unwrap();
    let log = Log::default();

    let bus = queue.bus().clone();
    let once_log = log.clone();
    let slot = std::sync::Arc::new(parking_lot::Mutex::new(None));
    let own_id = std::sync::Arc::clone(&slot);
    let subscription = queue.on_done(move |event: &TaskEvent<Job, String>| {
        once_log.push(event.args.label.clone());
        if let Some(id) = *own_id.lock() {
            bus.unsubscribe(id);
        }
    });
    *slot.lock() = Some(subscription.id());

    for label in ["a", "b"] {
        queue.submit(Job::new(label, 5), |_| {});
    }
    advance(20).await;

    assert_eq!(log.entries(), vec!["a"]);
}
