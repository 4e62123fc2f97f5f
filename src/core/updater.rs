/*!
 * Update orchestrator: the firmware-update state machine
 *
 * Drives check → download → install → health-poll against a device that
 * goes dark mid-sequence by design: installing firmware reboots the
 * device, so the install request dropping at the transport level is the
 * expected outcome, encoded here as an explicit transition rather than a
 * swallowed exception.
 *
 * One session at a time: re-entering a check while any non-terminal phase
 * is active is rejected, so two installs can never overlap.
 */

use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::UpdateConfig;
use crate::device::DeviceApi;
use crate::error::{Error, Result};
use crate::view::{UpdateView, ViewSink};

/// Phase of the update session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// No session active
    Idle,
    /// Version comparison in flight
    Checking,
    /// Device firmware matches the remote; terminal
    UpToDate,
    /// Newer firmware exists; waiting for a download decision
    UpdateAvailable,
    /// Download request in flight
    Downloading,
    /// Firmware staged on the device
    Downloaded,
    /// Install/reset request in flight
    Installing,
    /// Device rebooting; health polling in progress
    AwaitingHealthy,
    /// Device came back on new firmware; terminal, triggers reload
    Healthy,
    /// Device never came back within the health ceiling; terminal
    InstallTimedOut,
}

impl UpdatePhase {
    /// Terminal phases end a session; a new check may start from them
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdatePhase::UpToDate | UpdatePhase::Healthy | UpdatePhase::InstallTimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::Checking => "checking",
            UpdatePhase::UpToDate => "up-to-date",
            UpdatePhase::UpdateAvailable => "update-available",
            UpdatePhase::Downloading => "downloading",
            UpdatePhase::Downloaded => "downloaded",
            UpdatePhase::Installing => "installing",
            UpdatePhase::AwaitingHealthy => "awaiting-healthy",
            UpdatePhase::Healthy => "healthy",
            UpdatePhase::InstallTimedOut => "install-timed-out",
        }
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable session state, guarded by the orchestrator's mutex
#[derive(Debug, Clone)]
struct UpdateSession {
    phase: UpdatePhase,
    local_version: Option<String>,
    remote_version: Option<String>,
    updates_available: bool,
    last_error: Option<String>,
}

impl UpdateSession {
    fn new() -> Self {
        Self {
            phase: UpdatePhase::Idle,
            local_version: None,
            remote_version: None,
            updates_available: false,
            last_error: None,
        }
    }

    fn view(&self) -> UpdateView {
        UpdateView {
            phase: self.phase,
            local_version: self.local_version.clone(),
            remote_version: self.remote_version.clone(),
            error: self.last_error.clone(),
        }
    }
}

/// The firmware-update orchestrator
pub struct Updater {
    device: Arc<dyn DeviceApi>,
    sink: Arc<dyn ViewSink>,
    config: UpdateConfig,
    session: Mutex<UpdateSession>,
}

impl Updater {
    pub fn new(device: Arc<dyn DeviceApi>, sink: Arc<dyn ViewSink>, config: UpdateConfig) -> Self {
        Self {
            device,
            sink,
            config,
            session: Mutex::new(UpdateSession::new()),
        }
    }

    /// Current phase
    pub async fn phase(&self) -> UpdatePhase {
        self.session.lock().await.phase
    }

    /// Current renderable session state
    pub async fn view(&self) -> UpdateView {
        self.session.lock().await.view()
    }

    /// Query the device's version comparison.
    ///
    /// Rejected with [`Error::UpdateBusy`] unless the session is idle or a
    /// previous session reached a terminal phase. The phase moves to
    /// `Checking` before the device call is awaited, so a second
    /// unawaited `check` cannot slip in.
    pub async fn check(&self) -> Result<UpdatePhase> {
        {
            let mut session = self.session.lock().await;
            if session.phase != UpdatePhase::Idle && !session.phase.is_terminal() {
                return Err(Error::UpdateBusy {
                    phase: session.phase.to_string(),
                });
            }
            session.phase = UpdatePhase::Checking;
            session.last_error = None;
            self.emit(&session);
        }

        match self.device.version_report().await {
            Ok(report) => {
                let mut session = self.session.lock().await;
                session.local_version = Some(report.current_version.clone());
                session.remote_version = Some(report.remote_version.clone());
                session.updates_available = report.updates_available;
                session.phase = if report.updates_available {
                    UpdatePhase::UpdateAvailable
                } else {
                    UpdatePhase::UpToDate
                };
                info!(
                    local = %report.current_version,
                    remote = %report.remote_version,
                    available = report.updates_available,
                    "update check complete"
                );
                self.emit(&session);
                Ok(session.phase)
            }
            Err(e) => {
                let mut session = self.session.lock().await;
                session.phase = UpdatePhase::Idle;
                session.last_error = Some(e.to_string());
                self.emit(&session);
                Err(e)
            }
        }
    }

    /// Ask the device to download and stage the new firmware.
    ///
    /// Only valid from `UpdateAvailable`. A failed or refused download
    /// returns the session to `UpdateAvailable` with the error retained;
    /// the orchestrator never re-issues a download on its own.
    pub async fn download(&self) -> Result<UpdatePhase> {
        {
            let mut session = self.session.lock().await;
            if session.phase != UpdatePhase::UpdateAvailable {
                return Err(Error::UpdateBusy {
                    phase: session.phase.to_string(),
                });
            }
            session.phase = UpdatePhase::Downloading;
            session.last_error = None;
            self.emit(&session);
        }

        match self.device.download_firmware().await {
            Ok(ack) if ack.ready => {
                let mut session = self.session.lock().await;
                session.phase = UpdatePhase::Downloaded;
                info!("firmware staged on device");
                self.emit(&session);
                Ok(UpdatePhase::Downloaded)
            }
            Ok(_) => {
                let mut session = self.session.lock().await;
                session.phase = UpdatePhase::UpdateAvailable;
                session.last_error =
                    Some("device reported the firmware was not staged".to_string());
                warn!("download finished but device did not stage the firmware");
                self.emit(&session);
                Ok(UpdatePhase::UpdateAvailable)
            }
            Err(e) => {
                let mut session = self.session.lock().await;
                session.phase = UpdatePhase::UpdateAvailable;
                session.last_error = Some(e.to_string());
                warn!(error = %e, "download failed");
                self.emit(&session);
                Err(e)
            }
        }
    }

    /// Ask the device to install the staged firmware and reboot, then
    /// poll it back to health.
    ///
    /// Only valid from `Downloaded`. A transport-level failure of the
    /// install request is the device dropping the connection as it
    /// reboots (the expected case) and proceeds to health polling. A
    /// well-formed refusal returns the session to `Downloaded`.
    pub async fn install(&self) -> Result<UpdatePhase> {
        {
            let mut session = self.session.lock().await;
            if session.phase != UpdatePhase::Downloaded {
                return Err(Error::UpdateBusy {
                    phase: session.phase.to_string(),
                });
            }
            session.phase = UpdatePhase::Installing;
            session.last_error = None;
            self.emit(&session);
        }

        match self.device.install_firmware().await {
            Ok(()) => {}
            Err(e) if e.is_transport() => {
                // The device rebooted out from under the request
                debug!(error = %e, "install request dropped; device is rebooting");
            }
            Err(e) => {
                let mut session = self.session.lock().await;
                session.phase = UpdatePhase::Downloaded;
                session.last_error = Some(e.to_string());
                warn!(error = %e, "device refused the install");
                self.emit(&session);
                return Err(e);
            }
        }

        {
            let mut session = self.session.lock().await;
            session.phase = UpdatePhase::AwaitingHealthy;
            self.emit(&session);
        }

        Ok(self.await_healthy().await)
    }

    /// Poll the health endpoint until the device answers healthy or the
    /// attempt ceiling is reached. Never polls past either outcome.
    async fn await_healthy(&self) -> UpdatePhase {
        let ceiling = self.config.health_poll_attempts;
        let delay = self.config.health_poll_interval();

        for attempt in 1..=ceiling {
            time::sleep(delay).await;
            match self.device.health().await {
                Ok(report) if report.healthy => {
                    let mut session = self.session.lock().await;
                    session.phase = UpdatePhase::Healthy;
                    info!(attempt, "device healthy after reboot");
                    self.emit(&session);
                    return UpdatePhase::Healthy;
                }
                Ok(_) => debug!(attempt, "device answered but is not healthy yet"),
                Err(e) => debug!(attempt, error = %e, "health probe failed"),
            }
        }

        let mut session = self.session.lock().await;
        session.phase = UpdatePhase::InstallTimedOut;
        session.last_error = Some(format!(
            "device did not come back within {} health probes",
            ceiling
        ));
        warn!(ceiling, "install timed out waiting for the device");
        self.emit(&session);
        UpdatePhase::InstallTimedOut
    }

    fn emit(&self, session: &UpdateSession) {
        self.sink.update_changed(&session.view());
    }
}
