use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

use crate::types::DeviceSnapshot;

pub const MINUTES_PER_DAY: f64 = 1440.0;
const HALF_DAY_MINUTES: f64 = MINUTES_PER_DAY / 2.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("expected HH:MM or HH:MM:SS, got {0:?}")]
    Format(String),
    #[error("{field} out of range in {text:?}")]
    OutOfRange { field: &'static str, text: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceClock {
    pub minutes: Option<f64>,
    pub timezone_label: String,
    pub timezone_iana: String,
    pub synced: bool,
}

impl DeviceClock {
    pub fn from_snapshot(snapshot: &DeviceSnapshot) -> Self {
        let minutes = if snapshot.time_synced {
            snapshot
                .time
                .as_deref()
                .and_then(|text| parse_clock(text).ok())
        } else {
            None
        };

        Self {
            minutes,
            timezone_label: snapshot.timezone.clone(),
            timezone_iana: snapshot.timezone_iana.clone(),
            synced: snapshot.time_synced,
        }
    }

    pub fn iana(&self) -> Option<&str> {
        let zone = self.timezone_iana.trim();
        if zone.is_empty() {
            None
        } else {
            Some(zone)
        }
    }
}

pub fn normalize_minutes(minutes: f64) -> f64 {
    let wrapped = minutes.rem_euclid(MINUTES_PER_DAY);
    // rem_euclid can round up to the modulus for tiny negative inputs.
    if wrapped >= MINUTES_PER_DAY {
        0.0
    } else {
        wrapped
    }
}

pub fn parse_clock(text: &str) -> Result<f64, ClockError> {
    let trimmed = text.trim();
    let format_error = || ClockError::Format(text.to_string());

    let mut parts = trimmed.split(':');
    let (Some(hour), Some(minute)) = (parts.next(), parts.next()) else {
        return Err(format_error());
    };
    let second = parts.next();
    if parts.next().is_some() {
        return Err(format_error());
    }

    let hour = parse_digits(hour, 1..=2).ok_or_else(format_error)?;
    let minute = parse_digits(minute, 2..=2).ok_or_else(format_error)?;
    let second = match second {
        Some(raw) => parse_seconds(raw).ok_or_else(format_error)?,
        None => 0.0,
    };

    let out_of_range = |field: &'static str| ClockError::OutOfRange {
        field,
        text: text.to_string(),
    };
    if hour > 23 {
        return Err(out_of_range("hour"));
    }
    if minute > 59 {
        return Err(out_of_range("minute"));
    }
    if second >= 60.0 {
        return Err(out_of_range("second"));
    }

    Ok(f64::from(hour * 60 + minute) + second / 60.0)
}

pub fn format_clock(minutes: f64) -> String {
    if !minutes.is_finite() {
        return "--:--".to_string();
    }
    // Floor keeps 06:30:59 on 06:30 instead of rounding up.
    let whole = normalize_minutes(minutes).floor() as u32;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

// Exact half-day ties resolve forward.
pub fn nearest_signed_delta(target: f64, now: f64) -> f64 {
    let target = normalize_minutes(target);
    let now = normalize_minutes(now);

    let forward = normalize_minutes(target - now + MINUTES_PER_DAY);
    let backward = if forward == 0.0 {
        0.0
    } else {
        forward - MINUTES_PER_DAY
    };

    if backward.abs() < forward.abs() {
        backward
    } else {
        forward
    }
}

pub fn format_delta(delta_minutes: f64, label: &str) -> String {
    if delta_minutes.abs() < 0.5 {
        return format!("{label} now");
    }

    let hours = format_hours(delta_minutes.abs() / 60.0);
    if delta_minutes > 0.0 {
        format!("{label} in {hours}h")
    } else {
        format!("{label} {hours}h ago")
    }
}

pub fn format_time_label(epoch_secs: i64, iana: Option<&str>) -> String {
    let Some(utc) = DateTime::<Utc>::from_timestamp(epoch_secs, 0) else {
        return epoch_secs.to_string();
    };

    match iana.and_then(|zone| zone.parse::<Tz>().ok()) {
        Some(tz) => utc.with_timezone(&tz).format("%H:%M").to_string(),
        None => utc.with_timezone(&Local).format("%H:%M").to_string(),
    }
}

fn format_hours(hours: f64) -> String {
    let rounded = if hours > 10.0 {
        hours.round()
    } else {
        (hours * 10.0).round() / 10.0
    };
    format!("{}", rounded.max(0.1))
}

fn parse_digits(raw: &str, width: std::ops::RangeInclusive<usize>) -> Option<u32> {
    if !width.contains(&raw.len()) || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn parse_seconds(raw: &str) -> Option<f64> {
    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (raw, None),
    };

    let whole = parse_digits(whole, 2..=2)?;
    match fraction {
        Some(fraction) if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) => {
            None
        }
        Some(fraction) => format!("{whole}.{fraction}").parse().ok(),
        None => Some(f64::from(whole)),
    }
}
