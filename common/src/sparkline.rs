use std::collections::VecDeque;

use serde::Serialize;

use crate::types::SensorReadings;

pub const SPARKLINE_CAPACITY: usize = 60;
pub const INVALID_RESET_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SparkChannel {
    Temp,
    Hum,
    Soil1,
    Soil2,
}

impl SparkChannel {
    pub const ALL: [SparkChannel; 4] = [Self::Temp, Self::Hum, Self::Soil1, Self::Soil2];

    pub fn reading(self, sensors: &SensorReadings) -> Option<f64> {
        match self {
            Self::Temp => sensors.temperature_c,
            Self::Hum => sensors.humidity_rh,
            Self::Soil1 => sensors.soil1_percent,
            Self::Soil2 => sensors.soil2_percent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparklineBuffer {
    values: VecDeque<f64>,
    invalid_streak: u32,
}

impl SparklineBuffer {
    pub fn push(&mut self, value: Option<f64>) {
        match value.filter(|value| !value.is_nan()) {
            Some(value) => {
                self.invalid_streak = 0;
                self.values.push_back(value);
                while self.values.len() > SPARKLINE_CAPACITY {
                    self.values.pop_front();
                }
            }
            None => {
                self.invalid_streak += 1;
                if self.invalid_streak >= INVALID_RESET_LIMIT {
                    self.values.clear();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn invalid_streak(&self) -> u32 {
        self.invalid_streak
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

impl Serialize for SparklineBuffer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sparklines {
    pub temp: SparklineBuffer,
    pub hum: SparklineBuffer,
    pub soil1: SparklineBuffer,
    pub soil2: SparklineBuffer,
}

impl Sparklines {
    pub fn channel(&self, channel: SparkChannel) -> &SparklineBuffer {
        match channel {
            SparkChannel::Temp => &self.temp,
            SparkChannel::Hum => &self.hum,
            SparkChannel::Soil1 => &self.soil1,
            SparkChannel::Soil2 => &self.soil2,
        }
    }

    pub fn channel_mut(&mut self, channel: SparkChannel) -> &mut SparklineBuffer {
        match channel {
            SparkChannel::Temp => &mut self.temp,
            SparkChannel::Hum => &mut self.hum,
            SparkChannel::Soil1 => &mut self.soil1,
            SparkChannel::Soil2 => &mut self.soil2,
        }
    }

    pub fn push_readings(&mut self, sensors: &SensorReadings) {
        for channel in SparkChannel::ALL {
            self.channel_mut(channel).push(channel.reading(sensors));
        }
    }
}
