use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub poll_interval_ms: u64,
    pub stale_after_ms: u64,
    pub error_notify_every: u32,
    pub history_refresh_interval_ms: u64,
    pub notification_capacity: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            stale_after_ms: 10_000,
            error_notify_every: 3,
            history_refresh_interval_ms: 60_000,
            notification_capacity: 50,
        }
    }
}

impl DashboardConfig {
    pub fn sanitize(&mut self) {
        self.poll_interval_ms = self.poll_interval_ms.clamp(250, 60_000);
        self.stale_after_ms = self.stale_after_ms.max(self.poll_interval_ms);
        self.error_notify_every = self.error_notify_every.max(1);
        self.history_refresh_interval_ms = self.history_refresh_interval_ms.max(self.poll_interval_ms);
        self.notification_capacity = self.notification_capacity.clamp(1, 500);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.4.1".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl DeviceConfig {
    pub fn sanitize(&mut self) {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            Self::default().base_url
        } else if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        self.request_timeout_ms = self.request_timeout_ms.clamp(500, 60_000);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub dashboard: DashboardConfig,
    pub device: DeviceConfig,
    pub http_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dashboard: DashboardConfig::default(),
            device: DeviceConfig::default(),
            http_port: 8080,
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.dashboard.sanitize();
        self.device.sanitize();
        if self.http_port == 0 {
            self.http_port = Self::default().http_port;
        }
    }
}
