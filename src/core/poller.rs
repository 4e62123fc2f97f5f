/*!
 * Staggered poller: one cancellable task per telemetry source
 *
 * Each source polls on its own cadence with no barrier between sources;
 * a slow or failing source never delays another. Initial fetches are
 * staggered `stagger_step` apart so a fresh session does not concentrate
 * load on the device. Within one source, the next fetch is scheduled only
 * after the previous one completes; cycles never overlap.
 */

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::core::model::{PollState, Source};
use crate::core::retry::{self, RetryPolicy};
use crate::device::DeviceApi;
use crate::error::Result;
use crate::view::{SourceView, ViewSink};

/// Spawns and owns the per-source poll tasks
pub struct Poller;

/// Handle to a running poller.
///
/// Dropping the handle without calling [`stop`](PollerHandle::stop) also
/// cancels the tasks: the stop channel closes and every task winds down
/// before its next state mutation.
pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<(u32, PollState)>>,
}

impl Poller {
    /// Start one poll task per source.
    ///
    /// Source at position `i` issues its first fetch `i × stagger_step`
    /// after this call; every subsequent fetch for that source is
    /// scheduled `interval` after the previous one completes.
    pub fn start(
        device: Arc<dyn DeviceApi>,
        sink: Arc<dyn ViewSink>,
        sources: Vec<Source>,
        poll: PollConfig,
        retry: RetryPolicy,
    ) -> PollerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        info!(
            sources = sources.len(),
            interval_secs = poll.interval_secs,
            stagger_step_ms = poll.stagger_step_ms,
            "poller starting"
        );

        let tasks = sources
            .into_iter()
            .enumerate()
            .map(|(position, source)| {
                let device = device.clone();
                let sink = sink.clone();
                let stop = stop_rx.clone();
                let initial_delay = poll.stagger_step() * position as u32;
                let interval = poll.interval();
                tokio::spawn(poll_source(
                    device,
                    sink,
                    source,
                    initial_delay,
                    interval,
                    retry,
                    stop,
                ))
            })
            .collect();

        PollerHandle { stop_tx, tasks }
    }
}

impl PollerHandle {
    /// Stop polling and join every task.
    ///
    /// After this returns, no further fetch will fire and no task will
    /// touch its state again. In-flight fetches are abandoned, not
    /// awaited: the fetch future loses the race against the stop signal
    /// and is dropped before any state mutation. Returns each source's
    /// final poll state, keyed by source index.
    pub async fn stop(self) -> Vec<(u32, PollState)> {
        // Idempotent at the signal level; a second send is a no-op change
        let _ = self.stop_tx.send(true);
        let joined = futures::future::join_all(self.tasks).await;
        joined.into_iter().filter_map(|r| r.ok()).collect()
    }
}

/// Resolves once the stop flag is set (or the poller handle is gone)
async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow() {
        if stop.changed().await.is_err() {
            // Sender dropped: treat a vanished handle as a stop
            return;
        }
    }
}

/// The lifetime of one source's polling.
///
/// All state mutation happens strictly after the fetch future wins its
/// race against the stop signal, so a stop can never be outrun by a late
/// fetch writing into stale state.
async fn poll_source(
    device: Arc<dyn DeviceApi>,
    sink: Arc<dyn ViewSink>,
    source: Source,
    initial_delay: std::time::Duration,
    interval: std::time::Duration,
    retry: RetryPolicy,
    mut stop: watch::Receiver<bool>,
) -> (u32, PollState) {
    let mut state = PollState::default();
    let index = source.index;

    tokio::select! {
        _ = stopped(&mut stop) => return (index, state),
        _ = time::sleep(initial_delay) => {}
    }

    loop {
        let fetched: Result<_> = tokio::select! {
            _ = stopped(&mut stop) => return (index, state),
            result = retry::run(&retry, || device.sensor_data(index)) => result,
        };

        match fetched {
            Ok(wire) => {
                let changed = state.apply_success(&wire.times, &wire.values);
                if changed {
                    sink.source_updated(&SourceView {
                        index,
                        label: source.chart_label(),
                        range: source.range,
                        series: state.series.clone(),
                    });
                } else {
                    debug!(source = index, "series unchanged");
                }
            }
            Err(e) => {
                // Recovered locally: keep stale data, try again next cycle
                state.record_failure();
                warn!(
                    source = index,
                    consecutive_failures = state.consecutive_failures,
                    error = %e,
                    "poll failed; keeping stale series"
                );
            }
        }

        tokio::select! {
            _ = stopped(&mut stop) => return (index, state),
            _ = time::sleep(interval) => {}
        }
    }
}
