use std::{future::Future, time::Duration};

use chrono::Utc;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;

use greenhouse_common::{
    config::DeviceConfig, ApplyProfileResponse, DeviceSnapshot, HistoryPayload, HistoryRange,
    HistorySample, ModeChangeResponse, RebootResponse, RelayId, StatusPayload, ToggleResponse,
    API_GROW_APPLY, API_GROW_APPLY_ALL, API_HISTORY, API_MODE, API_REBOOT, API_STATUS, API_TOGGLE,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(String),
    #[error("{code} {reason}")]
    Status { code: u16, reason: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub trait DeviceApi: Send + Sync + 'static {
    fn status(&self) -> impl Future<Output = Result<DeviceSnapshot, ApiError>> + Send;

    fn history(
        &self,
        range: HistoryRange,
    ) -> impl Future<Output = Result<Vec<HistorySample>, ApiError>> + Send;

    fn set_mode(
        &self,
        id: RelayId,
        auto: bool,
    ) -> impl Future<Output = Result<ModeChangeResponse, ApiError>> + Send;

    fn toggle(&self, id: RelayId) -> impl Future<Output = Result<ToggleResponse, ApiError>> + Send;

    fn apply_profile(
        &self,
        chamber_id: u8,
        profile_id: u8,
    ) -> impl Future<Output = Result<ApplyProfileResponse, ApiError>> + Send;

    fn apply_profile_all(
        &self,
        profile_id: u8,
    ) -> impl Future<Output = Result<ApplyProfileResponse, ApiError>> + Send;

    fn reboot(&self) -> impl Future<Output = Result<RebootResponse, ApiError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDeviceClient {
    pub fn new(config: &DeviceConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header(reqwest::header::CACHE_CONTROL, "no-store")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

fn cache_token() -> String {
    Utc::now().timestamp_millis().to_string()
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

impl DeviceApi for HttpDeviceClient {
    async fn status(&self) -> Result<DeviceSnapshot, ApiError> {
        let request = self
            .request(Method::GET, API_STATUS)
            .query(&[("ts", cache_token())]);
        let payload: StatusPayload = self.send(request).await?;
        Ok(DeviceSnapshot::from_payload(payload))
    }

    async fn history(&self, range: HistoryRange) -> Result<Vec<HistorySample>, ApiError> {
        let request = self
            .request(Method::GET, API_HISTORY)
            .query(&[("days", range.days().to_string()), ("ts", cache_token())]);
        let payload: HistoryPayload = self.send(request).await?;
        Ok(payload.points)
    }

    async fn set_mode(&self, id: RelayId, auto: bool) -> Result<ModeChangeResponse, ApiError> {
        let request = self
            .request(Method::GET, API_MODE)
            .query(&[("id", id.as_str()), ("auto", flag(auto))]);
        self.send(request).await
    }

    async fn toggle(&self, id: RelayId) -> Result<ToggleResponse, ApiError> {
        let request = self
            .request(Method::GET, API_TOGGLE)
            .query(&[("id", id.as_str())]);
        self.send(request).await
    }

    async fn apply_profile(
        &self,
        chamber_id: u8,
        profile_id: u8,
    ) -> Result<ApplyProfileResponse, ApiError> {
        let request = self.request(Method::POST, API_GROW_APPLY).query(&[
            ("chamber_id", chamber_id.to_string()),
            ("profile", profile_id.to_string()),
        ]);
        self.send(request).await
    }

    async fn apply_profile_all(&self, profile_id: u8) -> Result<ApplyProfileResponse, ApiError> {
        let request = self
            .request(Method::POST, API_GROW_APPLY_ALL)
            .query(&[("profile", profile_id.to_string())]);
        self.send(request).await
    }

    async fn reboot(&self) -> Result<RebootResponse, ApiError> {
        self.send(self.request(Method::POST, API_REBOOT)).await
    }
}
