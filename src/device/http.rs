//! HTTP implementation of the device facade.
//!
//! Endpoint paths follow the device's versioned API where one exists;
//! `/device_meta` predates the versioning and stays bare.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{DeviceApi, DeviceMeta, DownloadAck, HealthReport, LedState, SensorMeta, SensorSeries, VersionReport};
use crate::error::{Error, Result};

/// A device reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpDevice {
    base: Url,
    client: Client,
}

#[derive(Serialize)]
struct LedBody {
    value: u8,
}

#[derive(Serialize)]
struct RenameBody<'a> {
    #[serde(rename = "newName")]
    new_name: &'a str,
}

impl HttpDevice {
    /// Create a client for the device at `base_url`.
    ///
    /// `timeout` bounds each request end to end; `None` leaves requests
    /// unbounded and relies on the caller's retry discipline alone.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid device URL {}: {}", base_url, e)))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { base, client })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint path {}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Payload(e.to_string()))
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: Option<&B>) -> Result<Response> {
        let url = self.url(path)?;
        debug!(%url, "POST");
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Self::check_status(response).await
    }

    /// Turn a non-success status into an application error, keeping the
    /// body (truncated) as the message.
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut message = response.text().await.unwrap_or_default();
        message.truncate(256);
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DeviceApi for HttpDevice {
    async fn device_meta(&self) -> Result<DeviceMeta> {
        self.get_json("/device_meta").await
    }

    async fn sensor_meta(&self) -> Result<Vec<SensorMeta>> {
        self.get_json("/api/v1/sensor_meta").await
    }

    async fn sensor_data(&self, index: u32) -> Result<SensorSeries> {
        self.get_json(&format!("/api/v1/sensor_data?sensor_index={}", index))
            .await
    }

    async fn led(&self) -> Result<bool> {
        let state: LedState = self.get_json("/api/v1/led").await?;
        Ok(state.is_on())
    }

    async fn set_led(&self, on: bool) -> Result<()> {
        let body = LedBody {
            value: u8::from(on),
        };
        self.post_json("/api/v1/led", Some(&body)).await?;
        Ok(())
    }

    async fn rename_sensor(&self, index: u32, new_name: &str) -> Result<()> {
        let body = RenameBody { new_name };
        self.post_json(
            &format!("/api/v1/sensor_name?sensor_index={}", index),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn version_report(&self) -> Result<VersionReport> {
        self.get_json("/api/v1/updates_available").await
    }

    async fn download_firmware(&self) -> Result<DownloadAck> {
        let response = self
            .post_json::<()>("/api/v1/download_firmware", None)
            .await?;
        response
            .json::<DownloadAck>()
            .await
            .map_err(|e| Error::Payload(e.to_string()))
    }

    async fn install_firmware(&self) -> Result<()> {
        self.post_json::<()>("/api/v1/reset", None).await?;
        Ok(())
    }

    async fn health(&self) -> Result<HealthReport> {
        let value: serde_json::Value = self.get_json("/api/v1/health").await?;
        Ok(HealthReport::from_value(&value))
    }
}
