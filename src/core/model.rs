/*!
 * Data model: telemetry sources, sample series and per-source poll state
 */

use chrono::{DateTime, Utc};

use crate::device::SensorMeta;

/// What kind of telemetry a source produces.
///
/// Moisture probes get special labelling treatment in views; everything
/// else renders under its plain name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Generic,
    Moisture,
}

impl SourceKind {
    /// Map the device's wire string to a kind
    pub fn from_wire(kind: &str) -> Self {
        if kind == "MH-Moisture" {
            SourceKind::Moisture
        } else {
            SourceKind::Generic
        }
    }
}

/// Expected value bounds for a source, used to scale its rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// One telemetry stream on the device.
///
/// Discovered once at startup from device metadata and immutable for the
/// session; the `index` is the device's stable identifier and is never
/// reused in-process.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub index: u32,
    pub display_name: String,
    pub range: ValueRange,
    pub kind: SourceKind,
}

impl Source {
    pub fn from_meta(meta: &SensorMeta) -> Self {
        Self {
            index: meta.index,
            display_name: meta.name.clone(),
            range: ValueRange {
                min: meta.min,
                max: meta.max,
            },
            kind: SourceKind::from_wire(&meta.kind),
        }
    }

    /// Label shown above this source's chart
    pub fn chart_label(&self) -> String {
        match self.kind {
            SourceKind::Moisture => {
                format!("Soil Moisture {}: {}", self.index, self.display_name)
            }
            SourceKind::Generic => self.display_name.clone(),
        }
    }
}

/// An ordered window of samples for one source.
///
/// The device retains its own sample window and returns it whole; the
/// series is therefore replaced wholesale on every successful poll, never
/// appended to. Insertion order is chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    points: Vec<(DateTime<Utc>, f64)>,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole window from parallel unix-second/value arrays.
    ///
    /// Mismatched lengths pair up to the shorter array; timestamps outside
    /// the representable range are skipped. Returns `true` when the stored
    /// window actually changed, so re-applying an identical payload is a
    /// visible no-op.
    pub fn replace(&mut self, times: &[i64], values: &[f64]) -> bool {
        let points: Vec<(DateTime<Utc>, f64)> = times
            .iter()
            .zip(values.iter())
            .filter_map(|(&secs, &value)| {
                DateTime::from_timestamp(secs, 0).map(|ts| (ts, value))
            })
            .collect();

        if self.points == points {
            return false;
        }
        self.points = points;
        true
    }

    pub fn points(&self) -> &[(DateTime<Utc>, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent sample, if any
    pub fn latest(&self) -> Option<(DateTime<Utc>, f64)> {
        self.points.last().copied()
    }
}

/// Polling bookkeeping for one source, owned by that source's poll task
#[derive(Debug, Clone, Default)]
pub struct PollState {
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub series: SampleSeries,
}

impl PollState {
    /// Record a successful fetch. Returns `true` when the series changed.
    pub fn apply_success(&mut self, times: &[i64], values: &[f64]) -> bool {
        let changed = self.series.replace(times, values);
        self.last_success_at = Some(Utc::now());
        self.consecutive_failures = 0;
        changed
    }

    /// Record an exhausted fetch. The stale series stays; old data beats
    /// a blanked view.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }
}
