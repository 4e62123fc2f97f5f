/*!
 * Frond - dashboard core for embedded plant-sensor devices
 *
 * A headless client for the device's HTTP surface:
 * - Staggered, per-source telemetry polling that never overwhelms the
 *   single-core device
 * - Bounded exponential-backoff retry for transient failures
 * - A firmware-update state machine that survives the device rebooting
 *   out from under it
 * - A cached output toggle that cannot flicker on failed writes
 * - A presentation-sink seam so any renderer (terminal, charts, tests)
 *   can consume the same view-models
 */

pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod logging;
pub mod view;

// Re-export commonly used types
pub use crate::config::{Config, HttpConfig, PollConfig, RetryConfig, UpdateConfig};
pub use crate::core::model::{PollState, SampleSeries, Source, SourceKind, ValueRange};
pub use crate::core::poller::{Poller, PollerHandle};
pub use crate::core::retry::RetryPolicy;
pub use crate::core::toggle::ToggleCache;
pub use crate::core::updater::{UpdatePhase, Updater};
pub use crate::device::{DeviceApi, HttpDevice};
pub use crate::error::{Error, Result};
pub use crate::view::{LogSink, SourceView, ToggleView, UpdateView, ViewSink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
