use serde::Serialize;

use crate::{config::DashboardConfig, types::Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Live,
    Stale,
}

#[derive(Debug, Clone)]
pub struct StalenessMonitor {
    stale_after_ms: u64,
    notify_every: u32,
    state: LinkState,
    consecutive_errors: u32,
    last_success_ms: u64,
    last_error: Option<String>,
}

impl StalenessMonitor {
    pub fn new(config: &DashboardConfig, now_ms: u64) -> Self {
        Self {
            stale_after_ms: config.stale_after_ms,
            notify_every: config.error_notify_every.max(1),
            state: LinkState::Stale,
            consecutive_errors: 0,
            last_success_ms: now_ms,
            last_error: None,
        }
    }

    pub fn record_success(&mut self, now_ms: u64) {
        self.consecutive_errors = 0;
        self.last_success_ms = now_ms;
        self.last_error = None;
        self.state = LinkState::Live;
    }

    pub fn record_failure(&mut self, error: &str) -> Option<Notification> {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.last_error = Some(error.to_string());
        self.state = LinkState::Stale;

        (self.consecutive_errors % self.notify_every == 0)
            .then(|| Notification::error(format!("Status failed: {error}")))
    }

    pub fn check_staleness(&mut self, now_ms: u64) -> bool {
        let expired = now_ms.saturating_sub(self.last_success_ms) > self.stale_after_ms;
        if expired && self.state == LinkState::Live {
            self.state = LinkState::Stale;
            return true;
        }
        false
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn last_success_ms(&self) -> u64 {
        self.last_success_ms
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
