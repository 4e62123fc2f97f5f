/*!
 * Device facade: the narrow set of remote operations the dashboard core
 * consumes, plus the wire types they exchange.
 *
 * Everything behind `DeviceApi` is an external collaborator: a
 * resource-constrained HTTP server on the device. The trait keeps the core
 * testable against scripted fakes; `HttpDevice` is the real thing.
 */

mod http;

pub use http::HttpDevice;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::error::Result;

/// Identity of the device as a whole
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceMeta {
    pub name: String,
    pub uuid: String,
}

/// One sensor as the device advertises it.
///
/// Older firmware omits `min`/`max` from the metadata listing; the
/// 0..100 fallback matches what those generations render.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorMeta {
    pub name: String,
    pub index: u32,
    #[serde(default = "default_range_min")]
    pub min: f64,
    #[serde(default = "default_range_max")]
    pub max: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One sensor's retained sample window.
///
/// `times` are unix seconds; `times` and `values` are parallel arrays.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorSeries {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub times: Vec<i64>,
    pub values: Vec<f64>,
    #[serde(default = "default_range_min")]
    pub min: f64,
    #[serde(default = "default_range_max")]
    pub max: f64,
}

/// The device's output toggle, as the wire carries it (`0` or `1`)
#[derive(Debug, Clone, Deserialize)]
pub struct LedState {
    pub value: u8,
}

impl LedState {
    pub fn is_on(&self) -> bool {
        self.value != 0
    }
}

/// Firmware version comparison as computed by the device
#[derive(Debug, Clone, Deserialize)]
pub struct VersionReport {
    #[serde(rename = "updatesAvailable")]
    pub updates_available: bool,
    #[serde(rename = "currentVersion", deserialize_with = "version_string")]
    pub current_version: String,
    #[serde(rename = "remoteVersion", deserialize_with = "version_string")]
    pub remote_version: String,
}

/// Acknowledgement that firmware has been staged on the device
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadAck {
    pub ready: bool,
}

/// Result of a post-reboot health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: bool,
}

impl HealthReport {
    /// Parse the health payload.
    ///
    /// Firmware generations disagree on the shape: `{"healthy": true}`,
    /// `{"ok": true}` and `{"status": "healthy"}` all occur in the wild,
    /// and all mean the same thing.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let healthy = value
            .get("healthy")
            .and_then(|v| v.as_bool())
            .or_else(|| value.get("ok").and_then(|v| v.as_bool()))
            .unwrap_or_else(|| {
                matches!(
                    value.get("status").and_then(|v| v.as_str()),
                    Some("healthy") | Some("ok")
                )
            });
        Self { healthy }
    }
}

/// Versions arrive as strings from newer firmware and as bare numbers from
/// older firmware; normalize both to a string.
fn version_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

fn default_range_min() -> f64 {
    0.0
}

fn default_range_max() -> f64 {
    100.0
}

/// The remote operations the dashboard core depends on.
///
/// All operations surface transport failures as [`Error::Transport`],
/// device error payloads as [`Error::Api`] and unparseable payloads as
/// [`Error::Payload`], so callers can tell a dead device from an unhappy
/// one.
///
/// [`Error::Transport`]: crate::error::Error::Transport
/// [`Error::Api`]: crate::error::Error::Api
/// [`Error::Payload`]: crate::error::Error::Payload
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Device name and UUID
    async fn device_meta(&self) -> Result<DeviceMeta>;

    /// The sensors this device exposes
    async fn sensor_meta(&self) -> Result<Vec<SensorMeta>>;

    /// The retained sample window for one sensor
    async fn sensor_data(&self, index: u32) -> Result<SensorSeries>;

    /// Current toggle value
    async fn led(&self) -> Result<bool>;

    /// Write the toggle value
    async fn set_led(&self, on: bool) -> Result<()>;

    /// Rename a device-held sensor label
    async fn rename_sensor(&self, index: u32, new_name: &str) -> Result<()>;

    /// Ask the device to compare its firmware against the remote
    async fn version_report(&self) -> Result<VersionReport>;

    /// Ask the device to download and stage new firmware
    async fn download_firmware(&self) -> Result<DownloadAck>;

    /// Ask the device to install staged firmware and reboot.
    ///
    /// The device drops the connection mid-reboot by design, so a
    /// transport failure here is an expected outcome, not an error the
    /// caller should treat as fatal.
    async fn install_firmware(&self) -> Result<()>;

    /// Probe whether a rebooted device is back online
    async fn health(&self) -> Result<HealthReport>;
}
