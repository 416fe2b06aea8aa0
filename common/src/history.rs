use serde::{Deserialize, Serialize};

use crate::{clock::format_time_label, lenient};

pub const SAMPLING_INTERVAL_MINUTES: u32 = 10;
pub const SAMPLES_PER_DAY: usize = (1440 / SAMPLING_INTERVAL_MINUTES) as usize;
const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySample {
    #[serde(rename = "t", deserialize_with = "lenient::epoch")]
    pub timestamp: i64,
    #[serde(deserialize_with = "lenient::number")]
    pub temp: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub hum: Option<f64>,
    #[serde(deserialize_with = "lenient::flag")]
    pub l1: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub l2: bool,
    #[serde(alias = "s1", deserialize_with = "lenient::number")]
    pub soil1: Option<f64>,
    #[serde(alias = "s2", deserialize_with = "lenient::number")]
    pub soil2: Option<f64>,
}

impl HistorySample {
    pub fn has_timestamp(&self) -> bool {
        self.timestamp > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HistoryRange(u8);

impl HistoryRange {
    pub const MIN_DAYS: u8 = 1;
    pub const MAX_DAYS: u8 = 7;

    pub fn new(days: i64) -> Self {
        Self(days.clamp(i64::from(Self::MIN_DAYS), i64::from(Self::MAX_DAYS)) as u8)
    }

    pub fn parse(text: &str) -> Self {
        text.trim()
            .parse::<f64>()
            .ok()
            .filter(|days| days.is_finite())
            .map(|days| Self::new(days.round() as i64))
            .unwrap_or_default()
    }

    pub fn days(self) -> u8 {
        self.0
    }

    pub fn max_retained(self) -> usize {
        SAMPLES_PER_DAY * usize::from(self.0)
    }
}

impl Default for HistoryRange {
    fn default() -> Self {
        Self(Self::MIN_DAYS)
    }
}

pub fn filter_history_points(samples: &[HistorySample], range: HistoryRange) -> Vec<HistorySample> {
    let max_retained = range.max_retained();
    let tail_start = samples.len().saturating_sub(max_retained);

    let Some(newest) = samples
        .iter()
        .filter(|sample| sample.has_timestamp())
        .map(|sample| sample.timestamp)
        .max()
    else {
        return samples[tail_start..].to_vec();
    };

    let cutoff = newest - i64::from(range.days()) * SECONDS_PER_DAY;
    let kept: Vec<&HistorySample> = samples
        .iter()
        .enumerate()
        .filter(|(index, sample)| {
            if sample.has_timestamp() {
                sample.timestamp >= cutoff
            } else {
                *index >= tail_start
            }
        })
        .map(|(_, sample)| sample)
        .collect();

    let skip = kept.len().saturating_sub(max_retained);
    kept.into_iter().skip(skip).cloned().collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDatasets {
    pub labels: Vec<String>,
    pub temps: Vec<Option<f64>>,
    pub hums: Vec<Option<f64>>,
    pub light1: Vec<u8>,
    pub light2: Vec<u8>,
    pub soil1: Vec<Option<f64>>,
    pub soil2: Vec<Option<f64>>,
    pub chamber_labels: [String; 2],
}

pub fn prepare_history_datasets(
    samples: &[HistorySample],
    iana: Option<&str>,
    chamber_labels: &[String; 2],
) -> HistoryDatasets {
    let mut datasets = HistoryDatasets {
        chamber_labels: chamber_labels.clone(),
        ..HistoryDatasets::default()
    };

    for (index, sample) in samples.iter().enumerate() {
        let label = if sample.has_timestamp() {
            format_time_label(sample.timestamp, iana)
        } else {
            index.to_string()
        };
        datasets.labels.push(label);
        datasets.temps.push(sample.temp);
        datasets.hums.push(sample.hum);
        datasets.light1.push(u8::from(sample.l1));
        datasets.light2.push(u8::from(sample.l2));
        datasets.soil1.push(sample.soil1);
        datasets.soil2.push(sample.soil2);
    }

    datasets
}

#[derive(Debug, Clone)]
pub struct HistoryRefresh {
    interval_ms: u64,
    last_attempt_ms: Option<u64>,
    forced: bool,
}

impl HistoryRefresh {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_attempt_ms: None,
            forced: false,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_attempt_ms {
            _ if self.forced => true,
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        }
    }

    // Failed attempts count too.
    pub fn mark_attempted(&mut self, now_ms: u64) {
        self.last_attempt_ms = Some(now_ms);
        self.forced = false;
    }

    pub fn invalidate(&mut self) {
        self.forced = true;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn untimed(temp: f64) -> HistorySample {
        HistorySample {
            temp: Some(temp),
            ..HistorySample::default()
        }
    }

    fn timed(timestamp: i64) -> HistorySample {
        HistorySample {
            timestamp,
            temp: Some(timestamp as f64),
            ..HistorySample::default()
        }
    }

    #[test]
    fn untimestamped_samples_keep_the_positional_tail() {
        let samples: Vec<_> = (0..150).map(|i| untimed(f64::from(i))).collect();
        let kept = filter_history_points(&samples, HistoryRange::new(1));

        assert_eq!(kept.len(), 144);
        assert_eq!(kept[0].temp, Some(6.0));
        assert_eq!(kept[143].temp, Some(149.0));
    }

    #[test]
    fn timestamped_samples_are_windowed_by_time() {
        let newest = 1_700_000_000;
        let samples = vec![
            timed(newest - 3 * SECONDS_PER_DAY),
            timed(newest - SECONDS_PER_DAY - 1),
            timed(newest - SECONDS_PER_DAY),
            timed(newest - 600),
            timed(newest),
        ];

        let kept = filter_history_points(&samples, HistoryRange::new(1));
        let stamps: Vec<i64> = kept.iter().map(|sample| sample.timestamp).collect();
        assert_eq!(stamps, vec![newest - SECONDS_PER_DAY, newest - 600, newest]);

        let kept = filter_history_points(&samples, HistoryRange::new(7));
        assert_eq!(kept.len(), 5);
    }

    #[test]
    fn mixed_samples_use_position_for_missing_timestamps() {
        let newest = 1_700_000_000;
        let mut samples: Vec<_> = (0..200).map(|i| untimed(f64::from(i))).collect();
        samples.push(timed(newest));

        let kept = filter_history_points(&samples, HistoryRange::new(1));
        assert_eq!(kept.len(), 144);
        assert_eq!(kept.last().unwrap().timestamp, newest);
        assert_eq!(kept[0].temp, Some(57.0));
    }

    #[test]
    fn dense_timestamps_are_capped_to_the_most_recent() {
        let newest = 1_700_000_000;
        let samples: Vec<_> = (0..300).map(|i| timed(newest - 299 + i)).collect();

        let kept = filter_history_points(&samples, HistoryRange::new(1));
        assert_eq!(kept.len(), 144);
        assert_eq!(kept[0].timestamp, newest - 143);
        assert_eq!(kept[143].timestamp, newest);
    }

    #[test]
    fn empty_history_stays_empty() {
        assert!(filter_history_points(&[], HistoryRange::default()).is_empty());
    }

    #[test]
    fn output_never_exceeds_range_capacity() {
        let samples: Vec<_> = (0..2000).map(|i| untimed(f64::from(i))).collect();
        for days in -3..12 {
            let range = HistoryRange::new(days);
            let kept = filter_history_points(&samples, range);
            assert!(kept.len() <= SAMPLES_PER_DAY * usize::from(range.days()));
        }
    }

    #[test]
    fn range_clamps_and_parses_preferences() {
        assert_eq!(HistoryRange::new(0).days(), 1);
        assert_eq!(HistoryRange::new(9).days(), 7);
        assert_eq!(HistoryRange::parse("3").days(), 3);
        assert_eq!(HistoryRange::parse(" 12 ").days(), 7);
        assert_eq!(HistoryRange::parse("").days(), 1);
        assert_eq!(HistoryRange::parse("week").days(), 1);
        assert_eq!(HistoryRange::new(2).max_retained(), 288);
    }

    #[test]
    fn decodes_device_points_with_both_soil_keys() {
        let points: Vec<HistorySample> = serde_json::from_str(
            r#"[
                {"t": 1700000000, "temp": 21.5, "hum": 50, "l1": 1, "l2": 0, "soil1": 30, "soil2": 35},
                {"t": null, "temp": "n/a", "hum": 51, "l1": 0, "l2": 1, "s1": 31, "s2": 36}
            ]"#,
        )
        .unwrap();

        assert!(points[0].has_timestamp());
        assert!(points[0].l1);
        assert_eq!(points[0].soil2, Some(35.0));
        assert!(!points[1].has_timestamp());
        assert_eq!(points[1].temp, None);
        assert_eq!(points[1].soil1, Some(31.0));
        assert!(points[1].l2);
    }

    #[test]
    fn datasets_fall_back_to_index_labels() {
        let samples = vec![
            HistorySample {
                timestamp: 1_704_110_400,
                temp: Some(20.0),
                l1: true,
                ..HistorySample::default()
            },
            HistorySample {
                hum: Some(40.0),
                soil2: Some(12.0),
                ..HistorySample::default()
            },
        ];
        let chambers = ["Herbs".to_string(), "Chamber 2".to_string()];

        let datasets = prepare_history_datasets(&samples, Some("UTC"), &chambers);
        assert_eq!(datasets.labels, vec!["12:00".to_string(), "1".to_string()]);
        assert_eq!(datasets.temps, vec![Some(20.0), None]);
        assert_eq!(datasets.hums, vec![None, Some(40.0)]);
        assert_eq!(datasets.light1, vec![1, 0]);
        assert_eq!(datasets.soil2, vec![None, Some(12.0)]);
        assert_eq!(datasets.chamber_labels, chambers);
    }

    #[test]
    fn refresh_is_throttled_until_invalidated() {
        let mut refresh = HistoryRefresh::new(60_000);
        assert!(refresh.is_due(0));

        refresh.mark_attempted(1_000);
        assert!(!refresh.is_due(30_000));
        assert!(refresh.is_due(61_000));

        refresh.invalidate();
        assert!(refresh.is_due(2_000));
        refresh.mark_attempted(2_000);
        assert!(!refresh.is_due(3_000));
    }
}
