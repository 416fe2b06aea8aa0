use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use greenhouse_common::{
    grow_profile, ApplyProfileResponse, DashboardState, HistoryRange, ModeChangeResponse,
    Notification, ProfilePreview, RebootResponse, RelayId,
};

use crate::{
    client::{ApiError, DeviceApi},
    guard::{ControlKind, GuardOptions, Lockout, RelayGuard},
    notify::Notifier,
    poll::RefreshHandle,
    store::AppStore,
};

pub const PUMP_CONFIRM_PROMPT: &str = "Turn pump ON? This will start water flow.";
pub const REBOOT_CONFIRM_PROMPT: &str = "Reboot the controller now?";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{prompt}")]
    ConfirmationRequired { prompt: &'static str },
    #[error(transparent)]
    Unavailable(#[from] Lockout),
    #[error("unknown grow profile {0}")]
    UnknownProfile(u8),
    #[error("unknown chamber {0}")]
    UnknownChamber(u8),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ToggleOutcome {
    Sent,
    RejectedAuto,
    Unchanged,
}

pub struct Commands<A> {
    api: Arc<A>,
    guard: RelayGuard,
    notifier: Arc<dyn Notifier>,
    refresh: RefreshHandle,
    view: watch::Receiver<Arc<DashboardState>>,
    store: AppStore,
}

impl<A: DeviceApi> Commands<A> {
    pub fn new(
        api: Arc<A>,
        guard: RelayGuard,
        notifier: Arc<dyn Notifier>,
        refresh: RefreshHandle,
        view: watch::Receiver<Arc<DashboardState>>,
        store: AppStore,
    ) -> Self {
        Self {
            api,
            guard,
            notifier,
            refresh,
            view,
            store,
        }
    }

    pub fn guard(&self) -> &RelayGuard {
        &self.guard
    }

    pub fn view(&self) -> Arc<DashboardState> {
        self.view.borrow().clone()
    }

    pub async fn set_mode(&self, id: RelayId, auto: bool) -> Result<ModeChangeResponse, CommandError> {
        let kind = if auto {
            ControlKind::AutoSegment
        } else {
            ControlKind::ManualSegment
        };
        let response = self
            .guard
            .run(
                id,
                kind,
                GuardOptions::failing_with("Mode change failed"),
                async { self.api.set_mode(id, auto).await.map_err(CommandError::from) },
            )
            .await?;

        if response.changed {
            info!("relay {id} set to {}", if auto { "AUTO" } else { "MAN" });
            self.notifier.notify(Notification::info("Mode updated"));
            self.refresh.request_status();
        }
        Ok(response)
    }

    pub async fn toggle(&self, id: RelayId, confirmed: bool) -> Result<ToggleOutcome, CommandError> {
        // A disabled toggle is refused by the guard, so no prompt for it.
        let prompt = id == RelayId::Pump
            && !confirmed
            && !self.guard.panel().is_disabled(id, ControlKind::Toggle);
        if prompt {
            let known_off = self.view().relay(id).is_some_and(|relay| !relay.on);
            if known_off {
                return Err(CommandError::ConfirmationRequired {
                    prompt: PUMP_CONFIRM_PROMPT,
                });
            }
        }

        let response = self
            .guard
            .run(
                id,
                ControlKind::Toggle,
                GuardOptions::failing_with("Toggle failed"),
                async { self.api.toggle(id).await.map_err(CommandError::from) },
            )
            .await?;

        if response.changed {
            info!("relay {id} toggled");
            self.notifier.notify(Notification::info("Toggle sent"));
            self.refresh.request_status();
            Ok(ToggleOutcome::Sent)
        } else if response.rejected_for_auto() {
            self.notifier
                .notify(Notification::info("Switch to MAN to toggle"));
            Ok(ToggleOutcome::RejectedAuto)
        } else {
            Ok(ToggleOutcome::Unchanged)
        }
    }

    pub async fn apply_profile(
        &self,
        chamber_id: u8,
        profile_id: u8,
    ) -> Result<ApplyProfileResponse, CommandError> {
        chamber_index(chamber_id)?;
        let profile = grow_profile(profile_id).ok_or(CommandError::UnknownProfile(profile_id))?;
        info!("applying {} to chamber {chamber_id}", profile.label);

        let result = self.api.apply_profile(chamber_id, profile_id).await;
        self.finish_profile_apply(result)
    }

    pub async fn apply_profile_all(&self, profile_id: u8) -> Result<ApplyProfileResponse, CommandError> {
        let profile = grow_profile(profile_id).ok_or(CommandError::UnknownProfile(profile_id))?;
        info!("applying {} to all chambers", profile.label);

        let result = self.api.apply_profile_all(profile_id).await;
        self.finish_profile_apply(result)
    }

    pub fn preview_profile(&self, chamber_id: u8, profile_id: u8) -> Result<ProfilePreview, CommandError> {
        let index = chamber_index(chamber_id)?;
        let profile = grow_profile(profile_id).ok_or(CommandError::UnknownProfile(profile_id))?;
        let view = self.view();
        ProfilePreview::build(profile, index, &view.chamber_labels[index], &view.clock)
            .ok_or(CommandError::UnknownChamber(chamber_id))
    }

    pub async fn reboot(&self, confirmed: bool) -> Result<RebootResponse, CommandError> {
        if !confirmed {
            return Err(CommandError::ConfirmationRequired {
                prompt: REBOOT_CONFIRM_PROMPT,
            });
        }

        match self.api.reboot().await {
            Ok(response) => {
                let message = response
                    .message
                    .clone()
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "Rebooting…".to_string());
                self.notifier.notify(Notification::info(message));
                Ok(response)
            }
            Err(err) => {
                self.notifier
                    .notify(Notification::error(format!("Reboot failed: {err}")));
                Err(err.into())
            }
        }
    }

    pub async fn set_history_range(&self, days: i64) -> HistoryRange {
        let range = HistoryRange::new(days);
        if let Err(err) = self.store.save_history_range(range).await {
            warn!("failed to persist history range: {err:#}");
        }
        self.refresh.request_history(range).await;
        range
    }

    fn finish_profile_apply(
        &self,
        result: Result<ApplyProfileResponse, ApiError>,
    ) -> Result<ApplyProfileResponse, CommandError> {
        self.refresh.request_status();
        match result {
            Ok(response) => {
                self.notifier
                    .notify(Notification::success(format!("Applied {}", response.describe())));
                Ok(response)
            }
            Err(err) => {
                self.notifier
                    .notify(Notification::error(format!("Profile apply failed: {err}")));
                Err(err.into())
            }
        }
    }
}

fn chamber_index(chamber_id: u8) -> Result<usize, CommandError> {
    match chamber_id {
        1 | 2 => Ok(usize::from(chamber_id - 1)),
        _ => Err(CommandError::UnknownChamber(chamber_id)),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use greenhouse_common::{DashboardConfig, ToggleResponse};

    use super::*;
    use crate::{
        client::fake::FakeDevice,
        guard::ControlPanel,
        notify::NotificationQueue,
        poll::PollLoop,
        store::temp_store,
    };

    struct Harness {
        device: Arc<FakeDevice>,
        panel: Arc<ControlPanel>,
        queue: Arc<NotificationQueue>,
        poll: PollLoop<FakeDevice>,
        commands: Commands<FakeDevice>,
        dir: PathBuf,
    }

    fn harness() -> Harness {
        let device = Arc::new(FakeDevice::default());
        device.set_status(Ok(json!({
            "time": "12:00:00",
            "time_synced": true,
            "timezone": "UTC",
            "chambers": [{ "id": 1, "name": "Herbs" }],
            "relays": {
                "light1": { "state": 1, "auto": 1 },
                "fan": { "state": 0, "auto": 0 },
                "pump": { "state": 0, "auto": 0 }
            }
        })));
        let panel = Arc::new(ControlPanel::with_relay_controls());
        let queue = Arc::new(NotificationQueue::new(20));
        let (store, dir) = temp_store();
        let (poll, refresh, view) = PollLoop::new(
            Arc::clone(&device),
            DashboardConfig::default(),
            HistoryRange::default(),
            Arc::clone(&panel),
            queue.clone(),
        );
        let guard = RelayGuard::new(Arc::clone(&panel), queue.clone());
        let commands = Commands::new(Arc::clone(&device), guard, queue.clone(), refresh, view, store);

        Harness {
            device,
            panel,
            queue,
            poll,
            commands,
            dir,
        }
    }

    #[tokio::test]
    async fn pump_needs_confirmation_while_known_off() {
        let mut h = harness();
        h.poll.tick().await;

        let err = h.commands.toggle(RelayId::Pump, false).await.unwrap_err();
        assert!(matches!(err, CommandError::ConfirmationRequired { prompt } if prompt == PUMP_CONFIRM_PROMPT));
        assert!(!h.device.calls().contains(&"toggle pump".to_string()));

        let outcome = h.commands.toggle(RelayId::Pump, true).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Sent);
        assert!(h.device.calls().contains(&"toggle pump".to_string()));
        assert_eq!(h.queue.recent(), vec![Notification::info("Toggle sent")]);
    }

    #[tokio::test]
    async fn toggle_is_refused_locally_in_auto() {
        let mut h = harness();
        h.poll.tick().await;

        let err = h.commands.toggle(RelayId::Light1, true).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Unavailable(Lockout::Disabled {
                id: RelayId::Light1,
                kind: ControlKind::Toggle
            })
        ));
        assert!(h.device.calls().is_empty());
    }

    #[tokio::test]
    async fn second_command_on_a_busy_relay_is_refused() {
        let h = harness();
        let (release, released) = tokio::sync::oneshot::channel::<()>();
        let held = h.commands.guard().run(
            RelayId::Fan,
            ControlKind::AutoSegment,
            GuardOptions::default(),
            async move {
                released
                    .await
                    .map_err(|_| CommandError::Api(ApiError::Transport("dropped".to_string())))
            },
        );
        let commands = &h.commands;
        let competing = async move {
            tokio::task::yield_now().await;
            let result = commands.set_mode(RelayId::Fan, false).await;
            let _ = release.send(());
            result
        };
        let (held, competing) = tokio::join!(held, competing);

        assert!(held.is_ok());
        assert!(matches!(
            competing,
            Err(CommandError::Unavailable(Lockout::Busy { id: RelayId::Fan }))
        ));
        assert!(h.device.calls().is_empty());
        for kind in ControlKind::ALL {
            assert!(!h.panel.is_disabled(RelayId::Fan, kind));
        }
    }

    #[tokio::test]
    async fn device_auto_rejection_is_informational() {
        let h = harness();
        h.device.set_toggle_answer(Ok(ToggleResponse {
            changed: false,
            reason: Some("AUTO".to_string()),
        }));

        let outcome = h.commands.toggle(RelayId::Fan, false).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::RejectedAuto);
        assert_eq!(h.queue.recent(), vec![Notification::info("Switch to MAN to toggle")]);
    }

    #[tokio::test]
    async fn failed_mode_change_restores_controls() {
        let h = harness();
        h.device.set_mode_answer(Err(ApiError::Transport("connection reset".to_string())));

        let err = h.commands.set_mode(RelayId::Fan, true).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(
            h.queue.recent(),
            vec![Notification::error("Mode change failed: connection reset")]
        );
        for kind in ControlKind::ALL {
            assert!(!h.panel.is_disabled(RelayId::Fan, kind));
        }
    }

    #[tokio::test]
    async fn mode_change_notifies_when_changed() {
        let h = harness();
        let response = h.commands.set_mode(RelayId::Light2, false).await.unwrap();
        assert!(response.changed);
        assert_eq!(h.device.calls(), vec!["mode light2 auto=0".to_string()]);
        assert_eq!(h.queue.recent(), vec![Notification::info("Mode updated")]);
    }

    #[tokio::test]
    async fn profile_apply_reports_label_or_error() {
        let h = harness();
        h.device.set_apply_answer(Ok(ApplyProfileResponse {
            ok: true,
            applied_profile: Some("Seedling".to_string()),
            label: Some("Seedling -> Herbs".to_string()),
            ..ApplyProfileResponse::default()
        }));
        h.commands.apply_profile(1, 1).await.unwrap();

        h.device.set_apply_answer(Err(ApiError::Status {
            code: 500,
            reason: "Internal Server Error".to_string(),
        }));
        assert!(h.commands.apply_profile_all(2).await.is_err());

        assert!(matches!(
            h.commands.apply_profile(3, 1).await,
            Err(CommandError::UnknownChamber(3))
        ));
        assert!(matches!(
            h.commands.apply_profile(1, 9).await,
            Err(CommandError::UnknownProfile(9))
        ));

        assert_eq!(
            h.queue.recent(),
            vec![
                Notification::success("Applied Seedling -> Herbs"),
                Notification::error("Profile apply failed: 500 Internal Server Error"),
            ]
        );
        assert_eq!(
            h.device.calls(),
            vec!["apply chamber=1 profile=1".to_string(), "apply_all profile=2".to_string()]
        );
    }

    #[tokio::test]
    async fn preview_uses_current_chamber_names() {
        let mut h = harness();
        h.poll.tick().await;

        let preview = h.commands.preview_profile(1, 1).unwrap();
        assert_eq!(preview.chamber_name, "Herbs");
        assert_eq!(preview.soil, "40% dry / 55% wet");

        let preview = h.commands.preview_profile(2, 0).unwrap();
        assert_eq!(preview.chamber_name, "Chamber 2");
    }

    #[tokio::test]
    async fn reboot_requires_confirmation() {
        let h = harness();
        assert!(matches!(
            h.commands.reboot(false).await,
            Err(CommandError::ConfirmationRequired { .. })
        ));
        assert!(h.device.calls().is_empty());

        h.device.set_reboot_answer(Ok(RebootResponse {
            message: Some("Rebooting now".to_string()),
        }));
        h.commands.reboot(true).await.unwrap();
        assert_eq!(h.queue.recent(), vec![Notification::info("Rebooting now")]);
    }

    #[tokio::test]
    async fn history_range_is_clamped_and_persisted() {
        let h = harness();
        let range = h.commands.set_history_range(12).await;
        assert_eq!(range.days(), 7);

        let reopened = AppStore::in_dir(&h.dir);
        assert_eq!(reopened.load_history_range().await.unwrap().days(), 7);
        tokio::fs::remove_dir_all(&h.dir).await.unwrap();
    }
}
