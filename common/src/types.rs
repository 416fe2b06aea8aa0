use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{history::HistorySample, lenient, scales::RawChartScales};

pub const DEFAULT_CHAMBER_NAMES: [&str; 2] = ["Chamber 1", "Chamber 2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayId {
    Light1,
    Light2,
    Fan,
    Pump,
}

impl RelayId {
    pub const ALL: [RelayId; 4] = [Self::Light1, Self::Light2, Self::Fan, Self::Pump];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light1 => "light1",
            Self::Light2 => "light2",
            Self::Fan => "fan",
            Self::Pump => "pump",
        }
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown relay id {0:?}")]
pub struct UnknownRelay(pub String);

impl FromStr for RelayId {
    type Err = UnknownRelay;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownRelay(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

// ----- Wire payloads (device JSON, loosely typed) -----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusPayload {
    #[serde(deserialize_with = "lenient::string")]
    pub time: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub time_synced: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub timezone: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub timezone_iana: Option<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub wifi: WifiPayload,
    #[serde(deserialize_with = "lenient::or_default")]
    pub sensors: SensorsPayload,
    #[serde(deserialize_with = "lenient::or_default")]
    pub chambers: Vec<ChamberPayload>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub relays: BTreeMap<String, RelayPayload>,
    pub chart_scales: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WifiPayload {
    #[serde(deserialize_with = "lenient::flag")]
    pub connected: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub ssid: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub rssi: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SensorsPayload {
    #[serde(deserialize_with = "lenient::number")]
    pub temp_c: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub hum_rh: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub soil1: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub soil2: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChamberPayload {
    #[serde(deserialize_with = "lenient::number")]
    pub id: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub soil_dry_threshold: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub soil_wet_threshold: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub light_relay_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayPayload {
    #[serde(deserialize_with = "lenient::flag")]
    pub state: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub auto: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub schedule: Option<String>,
    #[serde(alias = "on_min", deserialize_with = "lenient::number")]
    pub on_minutes: Option<f64>,
    #[serde(alias = "off_min", deserialize_with = "lenient::number")]
    pub off_minutes: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistoryPayload {
    #[serde(deserialize_with = "lenient::or_default")]
    pub points: Vec<HistorySample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeChangeResponse {
    #[serde(deserialize_with = "lenient::flag")]
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleResponse {
    #[serde(deserialize_with = "lenient::flag")]
    pub changed: bool,
    #[serde(deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ToggleResponse {
    pub fn rejected_for_auto(&self) -> bool {
        !self.changed && self.reason.as_deref() == Some("AUTO")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplyProfileResponse {
    #[serde(deserialize_with = "lenient::flag")]
    pub ok: bool,
    #[serde(alias = "applied_profile", deserialize_with = "lenient::string")]
    pub applied_profile: Option<String>,
    #[serde(alias = "chamber_name", deserialize_with = "lenient::string")]
    pub chamber_name: Option<String>,
    #[serde(alias = "chamber_id", deserialize_with = "lenient::number")]
    pub chamber_id: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub label: Option<String>,
}

impl ApplyProfileResponse {
    pub fn describe(&self) -> String {
        self.label
            .clone()
            .or_else(|| self.applied_profile.clone())
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| "profile".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebootResponse {
    #[serde(deserialize_with = "lenient::string")]
    pub message: Option<String>,
}

// ----- Validated snapshot -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WifiMode {
    Sta,
    Ap,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connectivity {
    pub connected: bool,
    pub mode: WifiMode,
    pub ssid: Option<String>,
    pub rssi: Option<i32>,
    pub ip: Option<String>,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self {
            connected: false,
            mode: WifiMode::None,
            ssid: None,
            rssi: None,
            ip: None,
        }
    }
}

impl Connectivity {
    pub fn summary(&self) -> String {
        if self.connected {
            let ssid = self.ssid.as_deref().unwrap_or("?");
            let ip = self.ip.as_deref().unwrap_or("?");
            match self.rssi {
                Some(rssi) => format!("{ssid} ({rssi} dBm) · {ip}"),
                None => format!("{ssid} · {ip}"),
            }
        } else if self.mode == WifiMode::Ap {
            "AP mode".to_string()
        } else {
            "not connected".to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReadings {
    pub temperature_c: Option<f64>,
    pub humidity_rh: Option<f64>,
    pub soil1_percent: Option<f64>,
    pub soil2_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySnapshot {
    pub on: bool,
    pub auto: bool,
    pub schedule: Option<String>,
    pub on_minutes: Option<f64>,
    pub off_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChamberInfo {
    pub id: u8,
    pub name: String,
    pub soil_dry_threshold: Option<f64>,
    pub soil_wet_threshold: Option<f64>,
    pub light_relay: Option<RelayId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub time: Option<String>,
    pub time_synced: bool,
    pub timezone: String,
    pub timezone_iana: String,
    pub connectivity: Connectivity,
    pub sensors: SensorReadings,
    pub relays: BTreeMap<RelayId, RelaySnapshot>,
    pub chambers: Vec<ChamberInfo>,
    pub chart_scales: Option<RawChartScales>,
}

impl DeviceSnapshot {
    pub fn from_payload(payload: StatusPayload) -> Self {
        let relays = payload
            .relays
            .into_iter()
            .filter_map(|(id, relay)| {
                let id = id.parse::<RelayId>().ok()?;
                Some((
                    id,
                    RelaySnapshot {
                        on: relay.state,
                        auto: relay.auto,
                        schedule: relay.schedule.filter(|text| !text.trim().is_empty()),
                        on_minutes: relay.on_minutes.filter(|value| (0.0..1440.0).contains(value)),
                        off_minutes: relay
                            .off_minutes
                            .filter(|value| (0.0..1440.0).contains(value)),
                    },
                ))
            })
            .collect();

        let chambers = payload
            .chambers
            .into_iter()
            .filter_map(|chamber| {
                let id = chamber
                    .id
                    .filter(|id| id.fract() == 0.0 && (1.0..=255.0).contains(id))?
                    as u8;
                Some(ChamberInfo {
                    id,
                    name: chamber.name.unwrap_or_default().trim().to_string(),
                    soil_dry_threshold: chamber.soil_dry_threshold,
                    soil_wet_threshold: chamber.soil_wet_threshold,
                    light_relay: chamber
                        .light_relay_id
                        .and_then(|id| id.parse::<RelayId>().ok()),
                })
            })
            .collect();

        let mode = match payload.wifi.mode.as_deref().map(str::to_ascii_uppercase) {
            Some(mode) if mode == "STA" => WifiMode::Sta,
            Some(mode) if mode == "AP" => WifiMode::Ap,
            _ if payload.wifi.connected => WifiMode::Sta,
            _ => WifiMode::None,
        };

        Self {
            time: payload.time.filter(|time| !time.trim().is_empty()),
            time_synced: payload.time_synced,
            timezone: payload.timezone.unwrap_or_default(),
            timezone_iana: payload.timezone_iana.unwrap_or_default(),
            connectivity: Connectivity {
                connected: payload.wifi.connected,
                mode,
                ssid: payload.wifi.ssid,
                rssi: payload.wifi.rssi.map(|rssi| rssi.round() as i32),
                ip: payload.wifi.ip,
            },
            sensors: SensorReadings {
                temperature_c: payload.sensors.temp_c,
                humidity_rh: payload.sensors.hum_rh,
                soil1_percent: payload.sensors.soil1,
                soil2_percent: payload.sensors.soil2,
            },
            relays,
            chambers,
            chart_scales: payload.chart_scales.as_ref().map(RawChartScales::from_json),
        }
    }

    pub fn relay(&self, id: RelayId) -> Option<&RelaySnapshot> {
        self.relays.get(&id)
    }
}

pub fn derive_chamber_labels(chambers: &[ChamberInfo]) -> [String; 2] {
    [1u8, 2].map(|id| {
        chambers
            .iter()
            .find(|chamber| chamber.id == id)
            .map(|chamber| chamber.name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_CHAMBER_NAMES[usize::from(id - 1)].to_string())
    })
}
