pub mod clock;
pub mod config;
pub mod endpoints;
pub mod history;
mod lenient;
pub mod monitor;
pub mod profile;
pub mod scales;
pub mod schedule;
pub mod sparkline;
pub mod state;
pub mod types;

pub use clock::{ClockError, DeviceClock};
pub use config::{DashboardConfig, DeviceConfig, RuntimeConfig};
pub use endpoints::*;
pub use history::{HistoryDatasets, HistoryRange, HistoryRefresh, HistorySample};
pub use monitor::{LinkState, StalenessMonitor};
pub use profile::{grow_profile, GrowProfile, ProfilePreview, GROW_PROFILES};
pub use scales::{ChartScales, RawChartScales};
pub use schedule::ScheduleLabelOptions;
pub use sparkline::{SparkChannel, SparklineBuffer, Sparklines};
pub use state::{DashboardState, RelayState};
pub use types::{
    ApplyProfileResponse, DeviceSnapshot, HistoryPayload, ModeChangeResponse, Notification,
    NotificationLevel, RebootResponse, RelayId, StatusPayload, ToggleResponse,
};
