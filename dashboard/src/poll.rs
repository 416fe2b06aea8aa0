use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use greenhouse_common::{
    DashboardConfig, DashboardState, HistoryRange, HistoryRefresh, LinkState, Notification,
    StalenessMonitor,
};

use crate::{client::DeviceApi, guard::ControlPanel, notify::Notifier};

const REFRESH_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    Status,
    History(HistoryRange),
}

#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<RefreshRequest>,
}

impl RefreshHandle {
    pub fn request_status(&self) {
        match self.tx.try_send(RefreshRequest::Status) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => debug!("status refresh already pending"),
            Err(mpsc::error::TrySendError::Closed(_)) => debug!("poll loop stopped; refresh ignored"),
        }
    }

    pub async fn request_history(&self, range: HistoryRange) {
        if self.tx.send(RefreshRequest::History(range)).await.is_err() {
            debug!("poll loop stopped; history range change ignored");
        }
    }
}

enum LoopEvent {
    Tick,
    Refresh(RefreshRequest),
    RequestsClosed,
}

pub struct PollLoop<A> {
    api: Arc<A>,
    config: DashboardConfig,
    state: DashboardState,
    monitor: StalenessMonitor,
    history_refresh: HistoryRefresh,
    panel: Arc<ControlPanel>,
    notifier: Arc<dyn Notifier>,
    requests: mpsc::Receiver<RefreshRequest>,
    publisher: watch::Sender<Arc<DashboardState>>,
    started: Instant,
}

impl<A: DeviceApi> PollLoop<A> {
    pub fn new(
        api: Arc<A>,
        config: DashboardConfig,
        history_range: HistoryRange,
        panel: Arc<ControlPanel>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, RefreshHandle, watch::Receiver<Arc<DashboardState>>) {
        let state = DashboardState::new(history_range);
        let (publisher, view) = watch::channel(Arc::new(state.clone()));
        let (tx, requests) = mpsc::channel(REFRESH_QUEUE_DEPTH);

        let poll = Self {
            api,
            monitor: StalenessMonitor::new(&config, 0),
            history_refresh: HistoryRefresh::new(config.history_refresh_interval_ms),
            config,
            state,
            panel,
            notifier,
            requests,
            publisher,
            started: Instant::now(),
        };
        (poll, RefreshHandle { tx }, view)
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut requests_open = true;

        info!(
            "polling device every {} ms (stale after {} ms)",
            self.config.poll_interval_ms, self.config.stale_after_ms
        );

        loop {
            let event = tokio::select! {
                _ = interval.tick() => LoopEvent::Tick,
                request = self.requests.recv(), if requests_open => match request {
                    Some(request) => LoopEvent::Refresh(request),
                    None => LoopEvent::RequestsClosed,
                },
            };

            match event {
                LoopEvent::Tick => self.tick().await,
                LoopEvent::Refresh(request) => {
                    self.handle_request(request);
                    while let Ok(request) = self.requests.try_recv() {
                        self.handle_request(request);
                    }
                    self.tick().await;
                }
                LoopEvent::RequestsClosed => {
                    requests_open = false;
                    continue;
                }
            }
            // Next poll is a full period after this one ended; firings that
            // fell inside a slow tick are dropped.
            interval.reset();
        }
    }

    pub async fn tick(&mut self) {
        let outcome = AssertUnwindSafe(self.refresh()).catch_unwind().await;
        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            warn!("status refresh panicked: {message}");
            self.record_failure(&format!("internal error: {message}"));
        }

        let now_ms = self.now_ms();
        if self.monitor.check_staleness(now_ms) {
            warn!(
                "device link stale: no successful status for {} ms",
                now_ms.saturating_sub(self.monitor.last_success_ms())
            );
        }
        self.state
            .set_link(self.monitor.state(), self.monitor.consecutive_errors());
        self.publish();
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn monitor(&self) -> &StalenessMonitor {
        &self.monitor
    }

    async fn refresh(&mut self) {
        let snapshot = match self.api.status().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.record_failure(&err.to_string());
                return;
            }
        };

        let was_stale = self.monitor.state() == LinkState::Stale;
        self.monitor.record_success(self.now_ms());
        if was_stale {
            info!("device link live");
        }
        self.state.apply_snapshot(snapshot);
        self.panel.sync_relays(&self.state.relays);

        if self.history_refresh.is_due(self.now_ms()) {
            self.refresh_history().await;
        }
    }

    async fn refresh_history(&mut self) {
        self.history_refresh.mark_attempted(self.now_ms());
        let range = self.state.history_range;
        match self.api.history(range).await {
            Ok(points) => {
                debug!("history refreshed: {} points for {} day(s)", points.len(), range.days());
                self.state.apply_history(&points);
            }
            Err(err) => {
                warn!("history refresh failed: {err}");
                self.notifier
                    .notify(Notification::error(format!("History failed: {err}")));
            }
        }
    }

    fn handle_request(&mut self, request: RefreshRequest) {
        match request {
            RefreshRequest::Status => debug!("out-of-band status refresh"),
            RefreshRequest::History(range) => {
                debug!("history range set to {} day(s)", range.days());
                self.state.set_history_range(range);
                self.history_refresh.invalidate();
            }
        }
    }

    fn record_failure(&mut self, error: &str) {
        if let Some(notification) = self.monitor.record_failure(error) {
            self.notifier.notify(notification);
        }
        debug!(
            "status poll failed ({} consecutive): {error}",
            self.monitor.consecutive_errors()
        );
    }

    fn publish(&self) {
        self.publisher.send_replace(Arc::new(self.state.clone()));
    }

    fn now_ms(&self) -> u64 {
        self.started
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
