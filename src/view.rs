/*!
 * Presentation sink: the seam between the dashboard core and whatever
 * renders it.
 *
 * The core produces typed view-models and pushes them through [`ViewSink`];
 * chart drawing, DOM work or terminal output live entirely on the other
 * side of the trait. [`LogSink`] is the built-in implementation used by
 * the CLI.
 */

use tracing::{info, warn};

use crate::core::model::{SampleSeries, ValueRange};
use crate::core::updater::UpdatePhase;

/// Renderable state of one telemetry source
#[derive(Debug, Clone)]
pub struct SourceView {
    pub index: u32,
    pub label: String,
    pub range: ValueRange,
    pub series: SampleSeries,
}

/// Renderable state of the device output toggle
#[derive(Debug, Clone)]
pub struct ToggleView {
    pub value: bool,
    /// A write is in flight; rendering should not flip early
    pub pending: bool,
    /// Inline error from the last failed write, if any
    pub error: Option<String>,
}

/// Renderable state of the update session
#[derive(Debug, Clone)]
pub struct UpdateView {
    pub phase: UpdatePhase,
    pub local_version: Option<String>,
    pub remote_version: Option<String>,
    pub error: Option<String>,
}

/// Consumer of view-model updates.
///
/// Implementations must accept a [`SourceView`] for a source they have not
/// seen before (the first update acts as creation) and must return
/// quickly, since they are invoked from the poll tasks.
pub trait ViewSink: Send + Sync {
    fn source_updated(&self, view: &SourceView);
    fn toggle_updated(&self, view: &ToggleView);
    fn update_changed(&self, view: &UpdateView);
}

/// Renders every view-model as a tracing event
#[derive(Debug, Default)]
pub struct LogSink;

impl ViewSink for LogSink {
    fn source_updated(&self, view: &SourceView) {
        match view.series.latest() {
            Some((ts, value)) => info!(
                source = view.index,
                label = %view.label,
                samples = view.series.len(),
                latest = value,
                at = %ts.format("%H:%M:%S"),
                "telemetry updated"
            ),
            None => info!(
                source = view.index,
                label = %view.label,
                "telemetry updated (empty window)"
            ),
        }
    }

    fn toggle_updated(&self, view: &ToggleView) {
        match &view.error {
            Some(error) => warn!(
                value = view.value,
                error = %error,
                "toggle write failed; device state unchanged"
            ),
            None if view.pending => info!(value = view.value, "toggle write in flight"),
            None => info!(value = view.value, "toggle"),
        }
    }

    fn update_changed(&self, view: &UpdateView) {
        let versions = match (&view.local_version, &view.remote_version) {
            (Some(local), Some(remote)) => format!("{} -> {}", local, remote),
            _ => "unknown".to_string(),
        };
        match &view.error {
            Some(error) => warn!(phase = %view.phase, versions = %versions, error = %error, "update"),
            None => info!(phase = %view.phase, versions = %versions, "update"),
        }
        if view.phase == UpdatePhase::Healthy {
            info!("device healthy on new firmware; reload to pick it up");
        }
    }
}
