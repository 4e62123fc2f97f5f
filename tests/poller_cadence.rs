//! Staggered-poller timing and cancellation behavior, under a paused clock.

mod common;

use common::{MockDevice, RecordingSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use frond::config::PollConfig;
use frond::core::retry::RetryPolicy;
use frond::{Poller, Source, SourceKind, ValueRange};

fn source(index: u32) -> Source {
    Source {
        index,
        display_name: format!("sensor-{}", index),
        range: ValueRange {
            min: 0.0,
            max: 100.0,
        },
        kind: SourceKind::Moisture,
    }
}

fn poll_config(interval_secs: u64, stagger_step_ms: u64) -> PollConfig {
    PollConfig {
        interval_secs,
        stagger_step_ms,
    }
}

fn no_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 0,
        initial_backoff: Duration::from_millis(1),
    }
}

#[tokio::test(start_paused = true)]
async fn first_fetches_are_staggered() {
    let device = Arc::new(
        MockDevice::new()
            .with_source(0, vec![100], vec![1.0])
            .with_source(1, vec![100], vec![2.0])
            .with_source(2, vec![100], vec![3.0]),
    );
    let sink = Arc::new(RecordingSink::new());
    let start = Instant::now();

    let handle = Poller::start(
        device.clone(),
        sink.clone(),
        vec![source(0), source(1), source(2)],
        poll_config(60, 500),
        no_retry(),
    );

    // Past the last stagger slot, well before the first interval tick
    tokio::time::sleep(Duration::from_millis(1400)).await;

    {
        let calls = device.sensor_calls.lock().unwrap();
        assert_eq!(calls.len(), 3, "exactly one first fetch per source");
        for (position, (index, at)) in calls.iter().enumerate() {
            assert_eq!(*index, position as u32);
            assert_eq!(
                at.duration_since(start),
                Duration::from_millis(500 * position as u64),
                "source {} must first fetch at its stagger slot",
                position
            );
        }
    }

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn polling_repeats_on_the_interval() {
    let device = Arc::new(MockDevice::new().with_source(0, vec![100], vec![1.0]));
    let sink = Arc::new(RecordingSink::new());
    let start = Instant::now();

    let handle = Poller::start(
        device.clone(),
        sink,
        vec![source(0)],
        poll_config(60, 0),
        no_retry(),
    );

    tokio::time::sleep(Duration::from_secs(125)).await;
    handle.stop().await;

    let calls = device.sensor_calls.lock().unwrap();
    let offsets: Vec<Duration> = calls.iter().map(|(_, at)| at.duration_since(start)).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_secs(60),
            Duration::from_secs(120),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_source_does_not_disturb_the_others() {
    let device = Arc::new(
        MockDevice::new()
            .with_source(0, vec![100], vec![1.0])
            .with_source(1, vec![100], vec![2.0]),
    );
    device.failing_sources.lock().unwrap().insert(1);
    let sink = Arc::new(RecordingSink::new());

    let handle = Poller::start(
        device.clone(),
        sink.clone(),
        vec![source(0), source(1)],
        poll_config(60, 500),
        no_retry(),
    );

    tokio::time::sleep(Duration::from_secs(121)).await;
    let states = handle.stop().await;

    // Both sources kept their own cadence: three fetches each
    assert_eq!(device.sensor_call_count(0), 3);
    assert_eq!(device.sensor_call_count(1), 3);

    let healthy = states.iter().find(|(i, _)| *i == 0).map(|(_, s)| s).unwrap();
    assert_eq!(healthy.consecutive_failures, 0);
    assert!(!healthy.series.is_empty());
    assert!(healthy.last_success_at.is_some());

    let failing = states.iter().find(|(i, _)| *i == 1).map(|(_, s)| s).unwrap();
    assert_eq!(failing.consecutive_failures, 3);
    assert!(failing.series.is_empty());
    assert!(failing.last_success_at.is_none());

    // Failures stay out of the sink; only the healthy source rendered
    assert!(sink.source_update_count(0) >= 1);
    assert_eq!(sink.source_update_count(1), 0);
}

#[tokio::test(start_paused = true)]
async fn failure_keeps_the_stale_series() {
    let device = Arc::new(MockDevice::new().with_source(0, vec![100, 200], vec![1.0, 2.0]));
    let sink = Arc::new(RecordingSink::new());

    let handle = Poller::start(
        device.clone(),
        sink,
        vec![source(0)],
        poll_config(60, 0),
        no_retry(),
    );

    // First fetch succeeds, then the device goes dark
    tokio::time::sleep(Duration::from_secs(1)).await;
    device.failing_sources.lock().unwrap().insert(0);
    tokio::time::sleep(Duration::from_secs(120)).await;

    let states = handle.stop().await;
    let (_, state) = &states[0];
    assert_eq!(state.consecutive_failures, 2);
    assert_eq!(state.series.len(), 2, "stale data beats a blanked view");
    assert!(state.last_success_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn identical_payload_is_not_re_rendered() {
    let device = Arc::new(MockDevice::new().with_source(0, vec![100], vec![1.0]));
    let sink = Arc::new(RecordingSink::new());

    let handle = Poller::start(
        device.clone(),
        sink.clone(),
        vec![source(0)],
        poll_config(60, 0),
        no_retry(),
    );

    // Three fetches of a window that never changes
    tokio::time::sleep(Duration::from_secs(125)).await;
    handle.stop().await;

    assert_eq!(device.sensor_call_count(0), 3);
    assert_eq!(sink.source_update_count(0), 1, "only the first fetch renders");
}

#[tokio::test(start_paused = true)]
async fn stop_prevents_further_fetches() {
    let device = Arc::new(MockDevice::new().with_source(0, vec![100], vec![1.0]));
    let sink = Arc::new(RecordingSink::new());

    let handle = Poller::start(
        device.clone(),
        sink,
        vec![source(0)],
        poll_config(60, 0),
        no_retry(),
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(device.sensor_call_count(0), 1);

    handle.stop().await;

    // Long after the next tick would have fired, nothing more happened
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(device.sensor_call_count(0), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_abandons_an_in_flight_fetch_without_mutation() {
    let device = Arc::new(MockDevice::new().with_source(0, vec![100], vec![1.0]));
    device.stuck_sources.lock().unwrap().insert(0);
    let sink = Arc::new(RecordingSink::new());

    let handle = Poller::start(
        device.clone(),
        sink.clone(),
        vec![source(0)],
        poll_config(60, 0),
        no_retry(),
    );

    // Let the task enter its (never-completing) fetch
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(device.sensor_call_count(0), 1);

    let states = handle.stop().await;

    // The fetch was dropped mid-flight: no state was touched
    let (_, state) = &states[0];
    assert!(state.series.is_empty());
    assert_eq!(state.consecutive_failures, 0);
    assert!(state.last_success_at.is_none());
    assert_eq!(sink.source_update_count(0), 0);
}

#[tokio::test(start_paused = true)]
async fn growing_window_renders_every_cycle() {
    let mut device = MockDevice::new().with_source(0, vec![], vec![]);
    device.grow_series = true;
    let device = Arc::new(device);
    let sink = Arc::new(RecordingSink::new());

    let handle = Poller::start(
        device.clone(),
        sink.clone(),
        vec![source(0)],
        poll_config(60, 0),
        no_retry(),
    );

    tokio::time::sleep(Duration::from_secs(125)).await;
    handle.stop().await;

    assert_eq!(device.sensor_call_count(0), 3);
    assert_eq!(sink.source_update_count(0), 3);

    // The view carries the freshest window each time
    let views = sink.sources.lock().unwrap();
    let lens: Vec<usize> = views.iter().map(|v| v.series.len()).collect();
    assert_eq!(lens, vec![1, 2, 3]);
}
