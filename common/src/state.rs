use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    clock::DeviceClock,
    history::{filter_history_points, prepare_history_datasets, HistoryDatasets, HistoryRange, HistorySample},
    monitor::LinkState,
    scales::{resolve_chart_scales, ChartScales},
    schedule::{build_schedule_label, parse_schedule_range, ScheduleLabelOptions},
    sparkline::Sparklines,
    types::{derive_chamber_labels, DeviceSnapshot, RelayId, DEFAULT_CHAMBER_NAMES},
};

pub const SYNCING_LABEL: &str = "syncing…";
pub const RECONNECTING_LABEL: &str = "reconnecting…";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayState {
    pub on: bool,
    pub auto: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub link: LinkState,
    pub consecutive_errors: u32,
    pub snapshot: Option<DeviceSnapshot>,
    pub clock: DeviceClock,
    pub time_label: String,
    pub connection_label: String,
    pub relays: BTreeMap<RelayId, RelayState>,
    pub schedule_labels: BTreeMap<RelayId, String>,
    pub chamber_labels: [String; 2],
    pub sparklines: Sparklines,
    pub chart_scales: ChartScales,
    pub history_range: HistoryRange,
    pub history: Vec<HistorySample>,
    pub history_datasets: HistoryDatasets,
}

impl DashboardState {
    pub fn new(history_range: HistoryRange) -> Self {
        Self {
            link: LinkState::Stale,
            consecutive_errors: 0,
            snapshot: None,
            clock: DeviceClock::default(),
            time_label: SYNCING_LABEL.to_string(),
            connection_label: RECONNECTING_LABEL.to_string(),
            relays: BTreeMap::new(),
            schedule_labels: BTreeMap::new(),
            chamber_labels: DEFAULT_CHAMBER_NAMES.map(str::to_string),
            sparklines: Sparklines::default(),
            chart_scales: ChartScales::default(),
            history_range,
            history: Vec::new(),
            history_datasets: HistoryDatasets::default(),
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: DeviceSnapshot) {
        self.clock = DeviceClock::from_snapshot(&snapshot);
        self.time_label = match snapshot.time.as_deref() {
            Some(time) if snapshot.time_synced => {
                let timezone = snapshot.timezone.trim();
                if timezone.is_empty() {
                    time.to_string()
                } else {
                    format!("{time} ({timezone})")
                }
            }
            _ => SYNCING_LABEL.to_string(),
        };
        self.connection_label = snapshot.connectivity.summary();
        self.chamber_labels = derive_chamber_labels(&snapshot.chambers);
        self.sparklines.push_readings(&snapshot.sensors);
        self.chart_scales = resolve_chart_scales(snapshot.chart_scales.as_ref());

        // Relays missing from this poll keep their last known state.
        for (&id, relay) in &snapshot.relays {
            self.relays.insert(
                id,
                RelayState {
                    on: relay.on,
                    auto: relay.auto,
                },
            );
        }

        let options = ScheduleLabelOptions::from_clock(&self.clock);
        for (&id, relay) in &snapshot.relays {
            let parsed = relay.schedule.as_deref().and_then(parse_schedule_range);
            let on = relay.on_minutes.or(parsed.map(|(on, _)| on));
            let off = relay.off_minutes.or(parsed.map(|(_, off)| off));
            if relay.schedule.is_none() && on.is_none() && off.is_none() {
                continue;
            }
            let options = options.with_base_label(relay.schedule.as_deref());
            self.schedule_labels
                .insert(id, build_schedule_label(on, off, &options));
        }

        self.snapshot = Some(snapshot);
        // Re-label the history chart in case the device zone changed.
        self.rebuild_history_datasets();
    }

    pub fn apply_history(&mut self, points: &[HistorySample]) {
        self.history = filter_history_points(points, self.history_range);
        self.rebuild_history_datasets();
    }

    pub fn set_history_range(&mut self, range: HistoryRange) {
        self.history_range = range;
    }

    pub fn set_link(&mut self, link: LinkState, consecutive_errors: u32) {
        self.link = link;
        self.consecutive_errors = consecutive_errors;
        if link == LinkState::Stale {
            self.connection_label = RECONNECTING_LABEL.to_string();
        }
    }

    pub fn relay(&self, id: RelayId) -> Option<RelayState> {
        self.relays.get(&id).copied()
    }

    fn rebuild_history_datasets(&mut self) {
        self.history_datasets =
            prepare_history_datasets(&self.history, self.clock.iana(), &self.chamber_labels);
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(HistoryRange::default())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::{RelaySnapshot, SensorReadings};

    fn snapshot() -> DeviceSnapshot {
        let mut relays = BTreeMap::new();
        relays.insert(
            RelayId::Light1,
            RelaySnapshot {
                on: true,
                auto: true,
                schedule: Some("06:00–18:00".to_string()),
                ..RelaySnapshot::default()
            },
        );
        relays.insert(
            RelayId::Pump,
            RelaySnapshot {
                on: false,
                auto: false,
                ..RelaySnapshot::default()
            },
        );

        DeviceSnapshot {
            time: Some("12:00:00".to_string()),
            time_synced: true,
            timezone: "UTC".to_string(),
            timezone_iana: "UTC".to_string(),
            sensors: SensorReadings {
                temperature_c: Some(23.5),
                ..SensorReadings::default()
            },
            relays,
            ..DeviceSnapshot::default()
        }
    }

    #[test]
    fn snapshot_updates_every_derived_view() {
        let mut state = DashboardState::default();
        state.apply_snapshot(snapshot());

        assert_eq!(state.time_label, "12:00:00 (UTC)");
        assert_eq!(state.clock.minutes, Some(720.0));
        assert_eq!(state.connection_label, "not connected");
        assert_eq!(state.chamber_labels, ["Chamber 1", "Chamber 2"]);
        assert_eq!(state.sparklines.temp.values(), vec![23.5]);
        assert_eq!(state.chart_scales, ChartScales::default());
        assert_eq!(state.relay(RelayId::Light1), Some(RelayState { on: true, auto: true }));
        assert_eq!(state.relay(RelayId::Fan), None);

        assert_eq!(
            state.schedule_labels.get(&RelayId::Light1).map(String::as_str),
            Some("06:00–18:00 (UTC) · on 6h ago · off in 6h")
        );
        assert!(!state.schedule_labels.contains_key(&RelayId::Pump));
    }

    #[test]
    fn unsynced_clock_shows_syncing() {
        let mut state = DashboardState::default();
        let mut snapshot = snapshot();
        snapshot.time_synced = false;
        state.apply_snapshot(snapshot);

        assert_eq!(state.time_label, SYNCING_LABEL);
        assert_eq!(
            state.schedule_labels.get(&RelayId::Light1).map(String::as_str),
            Some("06:00–18:00 (UTC)")
        );
    }

    #[test]
    fn history_is_windowed_and_labelled() {
        let mut state = DashboardState::new(HistoryRange::new(1));
        state.apply_snapshot(snapshot());

        let points: Vec<HistorySample> = (0..200)
            .map(|i| HistorySample {
                temp: Some(f64::from(i)),
                ..HistorySample::default()
            })
            .collect();
        state.apply_history(&points);

        assert_eq!(state.history.len(), 144);
        assert_eq!(state.history_datasets.labels.len(), 144);
        assert_eq!(state.history_datasets.labels[0], "0");
    }

    #[test]
    fn stale_link_marks_the_connection_reconnecting() {
        let mut state = DashboardState::default();
        state.apply_snapshot(snapshot());
        state.set_link(LinkState::Live, 0);
        assert_eq!(state.connection_label, "not connected");

        state.set_link(LinkState::Stale, 2);
        assert_eq!(state.connection_label, RECONNECTING_LABEL);
        assert_eq!(state.consecutive_errors, 2);
        // Last known values survive a stale link.
        assert_eq!(state.time_label, "12:00:00 (UTC)");
    }
}
