//! Integration tests for the multi-threaded scheduling policy.

mod common;

use common::{Gather, Sleeper, parallel_config};
use sluice_executor::prelude::*;
use sluice_executor::testing::{CountingSource, EventLog, Forwarder, LifecycleProbe, RecordingSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chain_keeps_message_order() {
    let mut fragment = Fragment::new("parallel_chain");
    fragment.set_executor_config(parallel_config(4));
    let source = fragment.make_operator("source", CountingSource::new(20)).unwrap();
    let relay = fragment.make_operator("relay", Forwarder::<i64>::new()).unwrap();
    let (sink, log) = RecordingSink::<i64>::new();
    let sink = fragment.make_operator("sink", sink).unwrap();
    fragment.add_flow(source, relay, &[]).unwrap();
    fragment.add_flow(relay, sink, &[]).unwrap();

    let summary = fragment.run().await.unwrap();
    assert_eq!(log.values(), (1..=20).collect::<Vec<i64>>());
    assert_eq!(summary.termination, Termination::Drained);
    assert_eq!(summary.total_ticks(), 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn independent_pipelines_run_side_by_side() {
    let mut fragment = Fragment::new("lanes");
    fragment.set_executor_config(parallel_config(4));
    let mut logs = Vec::new();
    for lane in 0..4i64 {
        let source = fragment
            .operator(format!("source{lane}"), CountingSource::new(5))
            .arg("start", lane * 100)
            .build()
            .unwrap();
        let (sink, log) = RecordingSink::<i64>::new();
        let sink = fragment.make_operator(format!("sink{lane}"), sink).unwrap();
        fragment.add_flow(source, sink, &[]).unwrap();
        logs.push(log);
    }

    fragment.run().await.unwrap();
    for (lane, log) in logs.iter().enumerate() {
        let start = lane as i64 * 100;
        assert_eq!(log.values(), (start..start + 5).collect::<Vec<_>>());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_limit_bounds_overlap() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut fragment = Fragment::new("sleepers");
    fragment.set_executor_config(parallel_config(2));
    for i in 0..4 {
        let sleeper = Sleeper::new(2, Duration::from_millis(30), active.clone(), peak.clone());
        let handle = fragment.make_operator(format!("sleeper{i}"), sleeper).unwrap();
        fragment.add_operator(handle).unwrap();
    }

    let summary = fragment.run().await.unwrap();
    assert_eq!(summary.total_ticks(), 8);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tick_failure_stops_started_operators() {
    let log = EventLog::new();
    let mut fragment = Fragment::new("parallel_failure");
    fragment.set_executor_config(parallel_config(4));
    let ok = fragment
        .make_operator("ok", LifecycleProbe::new("ok", log.clone(), 3))
        .unwrap();
    let bad = fragment
        .make_operator(
            "bad",
            LifecycleProbe::new("bad", log.clone(), 3).fail_at(LifecyclePhase::Tick),
        )
        .unwrap();
    fragment.add_operator(ok).unwrap();
    fragment.add_operator(bad).unwrap();

    let err = fragment.run().await.unwrap_err();
    assert!(matches!(
        err,
        SluiceError::OperatorLifecycle { phase: LifecyclePhase::Tick, ref operator, .. } if operator == "bad"
    ));
    let events = log.values();
    assert!(events.contains(&"ok:stop".to_string()));
    assert!(events.contains(&"bad:stop".to_string()));
    assert_eq!(fragment.lifecycle_state(ok), Some(LifecycleState::Stopped));
    assert_eq!(fragment.lifecycle_state(bad), Some(LifecycleState::Stopped));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_input_keeps_index_order() {
    let mut fragment = Fragment::new("parallel_gather");
    fragment.set_executor_config(parallel_config(3));
    let (gather, log) = Gather::new();
    let gather = fragment.make_operator("gather", gather).unwrap();
    for (i, start) in [1i64, 10, 100].into_iter().enumerate() {
        let source = fragment
            .operator(format!("source{i}"), CountingSource::new(2))
            .arg("start", start)
            .build()
            .unwrap();
        fragment.add_flow(source, gather, &[("out", "values")]).unwrap();
    }

    let summary = fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![vec![1, 10, 100], vec![2, 11, 101]]);
    assert_eq!(summary.ticks_of("gather"), Some(2));
    assert_eq!(summary.termination, Termination::Drained);
}
