use serde::Serialize;
use serde_json::Value;

use crate::lenient::number_from_value;

const TEMP_LIMITS: (f64, f64) = (-40.0, 120.0);
const HUM_LIMITS: (f64, f64) = (0.0, 100.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartScales {
    pub temp_min: f64,
    pub temp_max: f64,
    pub hum_min: f64,
    pub hum_max: f64,
}

impl Default for ChartScales {
    fn default() -> Self {
        Self {
            temp_min: 10.0,
            temp_max: 40.0,
            hum_min: 0.0,
            hum_max: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChartScales {
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub hum_min: Option<f64>,
    pub hum_max: Option<f64>,
}

impl RawChartScales {
    pub fn from_json(value: &Value) -> Self {
        let bound = |snake: &str, camel: &str| {
            [snake, camel]
                .into_iter()
                .find_map(|key| value.get(key).and_then(number_from_value))
        };

        Self {
            temp_min: bound("temp_min", "tempMin"),
            temp_max: bound("temp_max", "tempMax"),
            hum_min: bound("hum_min", "humMin"),
            hum_max: bound("hum_max", "humMax"),
        }
    }
}

pub fn resolve_chart_scales(raw: Option<&RawChartScales>) -> ChartScales {
    let defaults = ChartScales::default();
    let raw = raw.copied().unwrap_or_default();

    let (temp_min, temp_max) = resolve_pair(
        (raw.temp_min, raw.temp_max),
        (defaults.temp_min, defaults.temp_max),
        TEMP_LIMITS,
    );
    let (hum_min, hum_max) = resolve_pair(
        (raw.hum_min, raw.hum_max),
        (defaults.hum_min, defaults.hum_max),
        HUM_LIMITS,
    );

    ChartScales {
        temp_min,
        temp_max,
        hum_min,
        hum_max,
    }
}

fn resolve_pair(
    (min, max): (Option<f64>, Option<f64>),
    (default_min, default_max): (f64, f64),
    (floor, ceiling): (f64, f64),
) -> (f64, f64) {
    let bound = |value: Option<f64>, fallback: f64| {
        value
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(floor, ceiling))
            .unwrap_or(fallback)
    };

    let min = bound(min, default_min);
    let max = bound(max, default_max);
    if max > min {
        (min, max)
    } else {
        (default_min, default_max)
    }
}
