/*!
 * Toggle cache: the dashboard's copy of the device output toggle
 *
 * The device owns the value; the cache exists so views render instantly
 * and so rapid writes cannot race. While a write is in flight the cache
 * is marked pending and further writes are rejected; a failed write never
 * flips the cached value, it records an inline error instead.
 */

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::device::DeviceApi;
use crate::error::{Error, Result};
use crate::view::{ToggleView, ViewSink};

#[derive(Debug, Clone, Default)]
struct ToggleState {
    value: bool,
    pending: bool,
    last_error: Option<String>,
}

impl ToggleState {
    fn view(&self) -> ToggleView {
        ToggleView {
            value: self.value,
            pending: self.pending,
            error: self.last_error.clone(),
        }
    }
}

/// Cached device toggle with in-flight write protection
pub struct ToggleCache {
    device: Arc<dyn DeviceApi>,
    sink: Arc<dyn ViewSink>,
    state: Mutex<ToggleState>,
}

impl ToggleCache {
    pub fn new(device: Arc<dyn DeviceApi>, sink: Arc<dyn ViewSink>) -> Self {
        Self {
            device,
            sink,
            state: Mutex::new(ToggleState::default()),
        }
    }

    /// Read the device value into the cache
    pub async fn refresh(&self) -> Result<bool> {
        let value = self.device.led().await?;
        let mut state = self.state.lock().await;
        state.value = value;
        state.last_error = None;
        self.sink.toggle_updated(&state.view());
        Ok(value)
    }

    /// Write `desired` to the device.
    ///
    /// Rejected with [`Error::TogglePending`] while another write is in
    /// flight. On failure the cached value is left untouched and the
    /// error is surfaced inline on the emitted view.
    pub async fn set(&self, desired: bool) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.pending {
                return Err(Error::TogglePending);
            }
            state.pending = true;
            state.last_error = None;
            self.sink.toggle_updated(&state.view());
        }

        let result = self.device.set_led(desired).await;

        let mut state = self.state.lock().await;
        state.pending = false;
        match &result {
            Ok(()) => {
                state.value = desired;
                state.last_error = None;
            }
            Err(e) => {
                warn!(desired, error = %e, "toggle write failed");
                state.last_error = Some(e.to_string());
            }
        }
        self.sink.toggle_updated(&state.view());
        result
    }

    /// Current cached view
    pub async fn snapshot(&self) -> ToggleView {
        self.state.lock().await.view()
    }
}
