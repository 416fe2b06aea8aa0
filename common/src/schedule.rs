use crate::clock::{format_clock, format_delta, nearest_signed_delta, parse_clock, DeviceClock};

const RANGE_SEPARATORS: [char; 3] = ['–', '—', '-'];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScheduleLabelOptions<'a> {
    pub base_label: Option<&'a str>,
    pub timezone_label: &'a str,
    pub now_minutes: Option<f64>,
    pub time_synced: bool,
}

impl<'a> ScheduleLabelOptions<'a> {
    pub fn from_clock(clock: &'a DeviceClock) -> Self {
        Self {
            base_label: None,
            timezone_label: &clock.timezone_label,
            now_minutes: clock.minutes,
            time_synced: clock.synced,
        }
    }

    pub fn with_base_label(mut self, base_label: Option<&'a str>) -> Self {
        self.base_label = base_label;
        self
    }
}

pub fn build_schedule_label(
    on_minutes: Option<f64>,
    off_minutes: Option<f64>,
    options: &ScheduleLabelOptions<'_>,
) -> String {
    let on_minutes = on_minutes.filter(|value| value.is_finite());
    let off_minutes = off_minutes.filter(|value| value.is_finite());

    let mut label = match options.base_label.map(str::trim) {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => compose_range(on_minutes, off_minutes),
    };

    let timezone = options.timezone_label.trim();
    if !timezone.is_empty() {
        label.push_str(&format!(" ({timezone})"));
    }

    // Never show a countdown derived from an unsynced clock.
    let now = options
        .now_minutes
        .filter(|now| options.time_synced && now.is_finite());
    if let Some(now) = now {
        let deltas: Vec<String> = [("on", on_minutes), ("off", off_minutes)]
            .into_iter()
            .filter_map(|(name, minutes)| {
                minutes.map(|minutes| format_delta(nearest_signed_delta(minutes, now), name))
            })
            .collect();

        if !deltas.is_empty() {
            label.push_str(" · ");
            label.push_str(&deltas.join(" · "));
        }
    }

    label
}

pub fn parse_schedule_range(text: &str) -> Option<(f64, f64)> {
    let (on, off) = text.trim().split_once(RANGE_SEPARATORS)?;
    Some((parse_clock(on).ok()?, parse_clock(off).ok()?))
}

fn compose_range(on_minutes: Option<f64>, off_minutes: Option<f64>) -> String {
    match (on_minutes, off_minutes) {
        (Some(on), Some(off)) => format!("{}–{}", format_clock(on), format_clock(off)),
        (Some(on), None) => format!("on {}", format_clock(on)),
        (None, Some(off)) => format!("off {}", format_clock(off)),
        (None, None) => "--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: f64 = 60.0;

    fn synced_at(now_minutes: f64) -> ScheduleLabelOptions<'static> {
        ScheduleLabelOptions {
            base_label: None,
            timezone_label: "UTC",
            now_minutes: Some(now_minutes),
            time_synced: true,
        }
    }

    #[test]
    fn adds_timezone_aware_deltas() {
        let label = build_schedule_label(Some(6.0 * MIN), Some(18.0 * MIN), &synced_at(12.0 * MIN));

        assert!(label.contains("06:00"));
        assert!(label.contains("UTC"));
        assert!(label.contains("on 6h ago"));
        assert!(label.contains("off in 6h"));
        assert_eq!(label, "06:00–18:00 (UTC) · on 6h ago · off in 6h");
    }

    #[test]
    fn handles_schedules_crossing_midnight() {
        let label = build_schedule_label(Some(22.0 * MIN), Some(6.0 * MIN), &synced_at(23.0 * MIN));

        assert!(label.contains("22:00"));
        assert!(label.contains("06:00"));
        assert!(label.contains("on 1h ago"));
        assert!(label.contains("off in 7h"));
    }

    #[test]
    fn omits_deltas_without_a_synced_clock() {
        let mut options = synced_at(12.0 * MIN);
        options.time_synced = false;
        assert_eq!(
            build_schedule_label(Some(6.0 * MIN), Some(18.0 * MIN), &options),
            "06:00–18:00 (UTC)"
        );

        let options = ScheduleLabelOptions {
            now_minutes: Some(f64::NAN),
            ..synced_at(0.0)
        };
        assert_eq!(
            build_schedule_label(Some(6.0 * MIN), Some(18.0 * MIN), &options),
            "06:00–18:00 (UTC)"
        );

        let options = ScheduleLabelOptions {
            now_minutes: None,
            ..synced_at(0.0)
        };
        assert!(!build_schedule_label(Some(6.0 * MIN), None, &options).contains('·'));
    }

    #[test]
    fn keeps_device_text_as_base_label() {
        let options = synced_at(8.0 * MIN).with_base_label(Some("08:00–20:00"));
        let label = build_schedule_label(Some(8.0 * MIN), Some(20.0 * MIN), &options);
        assert_eq!(label, "08:00–20:00 (UTC) · on now · off in 12h");
    }

    #[test]
    fn skips_missing_timezone_and_missing_bound() {
        let options = ScheduleLabelOptions {
            timezone_label: "  ",
            ..synced_at(10.0 * MIN)
        };
        let label = build_schedule_label(Some(9.0 * MIN), None, &options);
        assert_eq!(label, "on 09:00 · on 1h ago");
    }

    #[test]
    fn parses_device_schedule_text() {
        assert_eq!(parse_schedule_range("08:00–20:00"), Some((480.0, 1200.0)));
        assert_eq!(parse_schedule_range("20:00 - 06:00"), Some((1200.0, 360.0)));
        assert_eq!(parse_schedule_range("06:00—23:59"), Some((360.0, 1439.0)));
        assert_eq!(parse_schedule_range("always"), None);
        assert_eq!(parse_schedule_range("08:00–25:00"), None);
    }
}
