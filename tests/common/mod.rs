//! Shared test fixtures: a scripted device and a recording sink.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

use frond::device::{
    DeviceApi, DeviceMeta, DownloadAck, HealthReport, SensorMeta, SensorSeries, VersionReport,
};
use frond::error::{Error, Result};
use frond::view::{SourceView, ToggleView, UpdateView, ViewSink};
use frond::UpdatePhase;

/// A device whose every endpoint is scripted from the test body.
pub struct MockDevice {
    /// Per-source sample window handed back by `sensor_data`
    pub series: Mutex<HashMap<u32, (Vec<i64>, Vec<f64>)>>,
    /// Sources whose `sensor_data` fails with a transport error
    pub failing_sources: Mutex<HashSet<u32>>,
    /// Sources whose `sensor_data` never completes
    pub stuck_sources: Mutex<HashSet<u32>>,
    /// Append one sample per successful fetch so every poll changes
    pub grow_series: bool,
    /// Every `sensor_data` call: which source, and when
    pub sensor_calls: Mutex<Vec<(u32, Instant)>>,

    /// `None` makes `version_report` fail with a transport error
    pub version: Mutex<Option<VersionReport>>,
    /// Make `version_report` hang forever
    pub version_hang: bool,
    /// `None` makes `download_firmware` fail with a transport error
    pub download_ready: Mutex<Option<bool>>,
    /// Error returned by every `install_firmware` call
    pub install_error: Mutex<Option<Error>>,
    /// Health probes that fail before one finally answers healthy;
    /// `u32::MAX` means the device never comes back
    pub health_ok_after: u32,
    pub health_calls: AtomicU32,

    pub led: Mutex<bool>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            series: Mutex::new(HashMap::new()),
            failing_sources: Mutex::new(HashSet::new()),
            stuck_sources: Mutex::new(HashSet::new()),
            grow_series: false,
            sensor_calls: Mutex::new(Vec::new()),
            version: Mutex::new(None),
            version_hang: false,
            download_ready: Mutex::new(None),
            install_error: Mutex::new(None),
            health_ok_after: 0,
            health_calls: AtomicU32::new(0),
            led: Mutex::new(false),
        }
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the version report
    pub fn with_versions(self, local: &str, remote: &str, available: bool) -> Self {
        *self.version.lock().unwrap() = Some(VersionReport {
            updates_available: available,
            current_version: local.to_string(),
            remote_version: remote.to_string(),
        });
        self
    }

    /// Seed a source with a sample window
    pub fn with_source(self, index: u32, times: Vec<i64>, values: Vec<f64>) -> Self {
        self.series.lock().unwrap().insert(index, (times, values));
        self
    }

    pub fn sensor_call_count(&self, index: u32) -> usize {
        self.sensor_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _)| *i == index)
            .count()
    }
}

#[async_trait]
impl DeviceApi for MockDevice {
    async fn device_meta(&self) -> Result<DeviceMeta> {
        Ok(DeviceMeta {
            name: "test-plant".to_string(),
            uuid: "00000000-0000-0000-0000-000000000001".to_string(),
        })
    }

    async fn sensor_meta(&self) -> Result<Vec<SensorMeta>> {
        let series = self.series.lock().unwrap();
        let mut indexes: Vec<u32> = series.keys().copied().collect();
        indexes.sort_unstable();
        Ok(indexes
            .into_iter()
            .map(|index| SensorMeta {
                name: format!("sensor-{}", index),
                index,
                min: 0.0,
                max: 100.0,
                kind: "MH-Moisture".to_string(),
            })
            .collect())
    }

    async fn sensor_data(&self, index: u32) -> Result<SensorSeries> {
        self.sensor_calls
            .lock()
            .unwrap()
            .push((index, Instant::now()));

        if self.stuck_sources.lock().unwrap().contains(&index) {
            std::future::pending::<()>().await;
        }
        if self.failing_sources.lock().unwrap().contains(&index) {
            return Err(Error::Transport("connection refused".to_string()));
        }

        let mut series = self.series.lock().unwrap();
        let (times, values) = series
            .get_mut(&index)
            .ok_or_else(|| Error::Api {
                status: 404,
                message: format!("no sensor {}", index),
            })?;
        if self.grow_series {
            let n = times.len() as i64;
            times.push(1_700_000_000 + 60 * n);
            values.push(n as f64);
        }
        Ok(SensorSeries {
            name: format!("sensor-{}", index),
            kind: "MH-Moisture".to_string(),
            times: times.clone(),
            values: values.clone(),
            min: 0.0,
            max: 100.0,
        })
    }

    async fn led(&self) -> Result<bool> {
        Ok(*self.led.lock().unwrap())
    }

    async fn set_led(&self, on: bool) -> Result<()> {
        *self.led.lock().unwrap() = on;
        Ok(())
    }

    async fn rename_sensor(&self, _index: u32, _new_name: &str) -> Result<()> {
        Ok(())
    }

    async fn version_report(&self) -> Result<VersionReport> {
        if self.version_hang {
            std::future::pending::<()>().await;
        }
        self.version
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Transport("connection refused".to_string()))
    }

    async fn download_firmware(&self) -> Result<DownloadAck> {
        match *self.download_ready.lock().unwrap() {
            Some(ready) => Ok(DownloadAck { ready }),
            None => Err(Error::Transport("connection reset".to_string())),
        }
    }

    async fn install_firmware(&self) -> Result<()> {
        match self.install_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn health(&self) -> Result<HealthReport> {
        let attempt = self.health_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.health_ok_after {
            Ok(HealthReport { healthy: true })
        } else {
            Err(Error::Transport("no route to host".to_string()))
        }
    }
}

/// Records every view-model the core emits.
#[derive(Default)]
pub struct RecordingSink {
    pub sources: Mutex<Vec<SourceView>>,
    pub toggles: Mutex<Vec<ToggleView>>,
    pub updates: Mutex<Vec<UpdateView>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_update_count(&self, index: u32) -> usize {
        self.sources
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.index == index)
            .count()
    }

    pub fn update_phases(&self) -> Vec<UpdatePhase> {
        self.updates.lock().unwrap().iter().map(|v| v.phase).collect()
    }

    pub fn last_update(&self) -> Option<UpdateView> {
        self.updates.lock().unwrap().last().cloned()
    }
}

impl ViewSink for RecordingSink {
    fn source_updated(&self, view: &SourceView) {
        self.sources.lock().unwrap().push(view.clone());
    }

    fn toggle_updated(&self, view: &ToggleView) {
        self.toggles.lock().unwrap().push(view.clone());
    }

    fn update_changed(&self, view: &UpdateView) {
        self.updates.lock().unwrap().push(view.clone());
    }
}
