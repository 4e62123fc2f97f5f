/*!
 * Core dashboard logic: data model, retry discipline, staggered polling,
 * toggle cache and the firmware-update state machine
 */

pub mod model;
pub mod poller;
pub mod retry;
pub mod toggle;
pub mod updater;

pub use model::{PollState, SampleSeries, Source, SourceKind, ValueRange};
pub use poller::{Poller, PollerHandle};
pub use retry::RetryPolicy;
pub use toggle::ToggleCache;
pub use updater::{UpdatePhase, Updater};
