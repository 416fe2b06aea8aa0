pub const API_STATUS: &str = "/api/status";
pub const API_HISTORY: &str = "/api/history";
pub const API_MODE: &str = "/api/mode";
pub const API_TOGGLE: &str = "/api/toggle";
pub const API_GROW_APPLY: &str = "/api/grow/apply";
pub const API_GROW_APPLY_ALL: &str = "/api/grow/apply_all";
pub const API_REBOOT: &str = "/api/reboot";

pub const PREF_HISTORY_RANGE_DAYS: &str = "historyRangeDays";
