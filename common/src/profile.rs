use serde::Serialize;

use crate::{
    clock::DeviceClock,
    schedule::{build_schedule_label, ScheduleLabelOptions},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChamberPreset {
    pub soil_dry: u8,
    pub soil_wet: u8,
    pub light_on_minutes: u16,
    pub light_off_minutes: u16,
    pub light_auto: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowProfile {
    pub id: u8,
    pub label: &'static str,
    pub chambers: [ChamberPreset; 2],
    pub sets_auto_fan: bool,
    pub sets_auto_pump: bool,
    pub auto_fan: bool,
    pub auto_pump: bool,
}

const fn chamber(soil_dry: u8, soil_wet: u8, on: u16, off: u16) -> ChamberPreset {
    ChamberPreset {
        soil_dry,
        soil_wet,
        light_on_minutes: on,
        light_off_minutes: off,
        light_auto: true,
    }
}

const fn automated(id: u8, label: &'static str, preset: ChamberPreset) -> GrowProfile {
    GrowProfile {
        id,
        label,
        chambers: [preset, preset],
        sets_auto_fan: true,
        sets_auto_pump: true,
        auto_fan: true,
        auto_pump: true,
    }
}

pub const GROW_PROFILES: [GrowProfile; 4] = [
    GrowProfile {
        id: 0,
        label: "Custom",
        chambers: [chamber(35, 45, 8 * 60, 20 * 60); 2],
        sets_auto_fan: false,
        sets_auto_pump: false,
        auto_fan: false,
        auto_pump: false,
    },
    automated(1, "Seedling", chamber(40, 55, 6 * 60, 24 * 60 - 1)),
    automated(2, "Vegetative", chamber(38, 52, 6 * 60, 24 * 60 - 1)),
    automated(3, "Flowering", chamber(35, 50, 8 * 60, 20 * 60)),
];

pub fn grow_profile(id: u8) -> Option<&'static GrowProfile> {
    GROW_PROFILES.iter().find(|profile| profile.id == id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePreview {
    pub profile: String,
    pub chamber_name: String,
    pub light_label: String,
    pub soil: String,
    pub light_schedule: String,
    pub light_mode: String,
    pub automation: String,
}

impl ProfilePreview {
    pub fn build(
        profile: &GrowProfile,
        chamber_index: usize,
        chamber_name: &str,
        clock: &DeviceClock,
    ) -> Option<Self> {
        let preset = profile.chambers.get(chamber_index)?;
        let options = ScheduleLabelOptions::from_clock(clock);

        Some(Self {
            profile: profile.label.to_string(),
            chamber_name: chamber_name.to_string(),
            light_label: format!("Light {}", chamber_index + 1),
            soil: format!("{}% dry / {}% wet", preset.soil_dry, preset.soil_wet),
            light_schedule: build_schedule_label(
                Some(f64::from(preset.light_on_minutes)),
                Some(f64::from(preset.light_off_minutes)),
                &options,
            ),
            light_mode: if preset.light_auto { "AUTO" } else { "MAN" }.to_string(),
            automation: automation_summary(profile),
        })
    }

    pub fn confirm_message(&self) -> String {
        format!(
            "Apply {} to {}? Soil {} · {} {} ({}) · {}",
            self.profile,
            self.chamber_name,
            self.soil,
            self.light_label,
            self.light_schedule,
            self.light_mode,
            self.automation
        )
    }
}

fn automation_summary(profile: &GrowProfile) -> String {
    let mode = |auto: bool| if auto { "AUTO" } else { "MAN" };
    let mut parts = Vec::new();
    if profile.sets_auto_fan {
        parts.push(format!("Fan {}", mode(profile.auto_fan)));
    }
    if profile.sets_auto_pump {
        parts.push(format!("Pump {}", mode(profile.auto_pump)));
    }

    if parts.is_empty() {
        "No automation change".to_string()
    } else {
        parts.join(" · ")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn clock_at(minutes: f64) -> DeviceClock {
        DeviceClock {
            minutes: Some(minutes),
            timezone_label: "UTC".to_string(),
            timezone_iana: "UTC".to_string(),
            synced: true,
        }
    }

    #[test]
    fn presets_match_device_table() {
        let seedling = grow_profile(1).unwrap();
        assert_eq!(seedling.label, "Seedling");
        assert_eq!(seedling.chambers[1].soil_dry, 40);
        assert_eq!(seedling.chambers[0].light_off_minutes, 1439);
        assert!(grow_profile(4).is_none());
        assert!(!grow_profile(0).unwrap().sets_auto_fan);
    }

    #[test]
    fn preview_describes_the_change() {
        let preview =
            ProfilePreview::build(grow_profile(3).unwrap(), 1, "Beta", &clock_at(12.0 * 60.0)).unwrap();

        assert_eq!(preview.soil, "35% dry / 50% wet");
        assert_eq!(preview.light_label, "Light 2");
        assert_eq!(preview.light_schedule, "08:00–20:00 (UTC) · on 4h ago · off in 8h");
        assert_eq!(preview.light_mode, "AUTO");
        assert_eq!(preview.automation, "Fan AUTO · Pump AUTO");

        let message = preview.confirm_message();
        assert!(message.starts_with("Apply Flowering to Beta?"));
        assert!(message.contains("35% dry / 50% wet"));
        assert!(message.contains("AUTO"));
    }

    #[test]
    fn custom_profile_leaves_automation_alone() {
        let preview =
            ProfilePreview::build(grow_profile(0).unwrap(), 0, "Alpha", &DeviceClock::default()).unwrap();
        assert_eq!(preview.automation, "No automation change");
        assert_eq!(preview.light_schedule, "08:00–20:00");
        assert!(ProfilePreview::build(grow_profile(0).unwrap(), 2, "Gamma", &DeviceClock::default()).is_none());
    }
}
