use std::{
    collections::BTreeMap,
    fmt::Display,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use greenhouse_common::{Notification, RelayId, RelayState};

use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    AutoSegment,
    ManualSegment,
    Toggle,
}

impl ControlKind {
    pub const ALL: [ControlKind; 3] = [Self::AutoSegment, Self::ManualSegment, Self::Toggle];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Control {
    pub disabled: bool,
    pub busy: bool,
}

pub type ControlsView = BTreeMap<RelayId, BTreeMap<ControlKind, Control>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Lockout {
    #[error("{id} is busy with another request")]
    Busy { id: RelayId },
    #[error("{id} control is disabled")]
    Disabled { id: RelayId, kind: ControlKind },
}

#[derive(Debug, Default)]
pub struct ControlPanel {
    controls: Mutex<BTreeMap<(RelayId, ControlKind), Control>>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relay_controls() -> Self {
        let panel = Self::new();
        for id in RelayId::ALL {
            for kind in ControlKind::ALL {
                panel.insert(id, kind, Control::default());
            }
        }
        panel
    }

    pub fn insert(&self, id: RelayId, kind: ControlKind, control: Control) {
        self.lock().insert((id, kind), control);
    }

    pub fn control(&self, id: RelayId, kind: ControlKind) -> Option<Control> {
        self.lock().get(&(id, kind)).copied()
    }

    pub fn is_disabled(&self, id: RelayId, kind: ControlKind) -> bool {
        self.control(id, kind).is_some_and(|control| control.disabled)
    }

    pub fn snapshot(&self) -> ControlsView {
        let mut view = ControlsView::new();
        for (&(id, kind), &control) in self.lock().iter() {
            view.entry(id).or_default().insert(kind, control);
        }
        view
    }

    // Busy controls are left alone; the next poll catches up.
    pub fn sync_relays(&self, relays: &BTreeMap<RelayId, RelayState>) {
        let mut controls = self.lock();
        for (&id, state) in relays {
            if let Some(toggle) = controls.get_mut(&(id, ControlKind::Toggle)) {
                if !toggle.busy {
                    toggle.disabled = state.auto;
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(RelayId, ControlKind), Control>> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct BusyControls {
    panel: Arc<ControlPanel>,
    id: RelayId,
    previous: Vec<(ControlKind, bool)>,
}

impl BusyControls {
    // Check and lock under one guard so two requests cannot both get in.
    fn acquire(panel: &Arc<ControlPanel>, id: RelayId, kind: ControlKind) -> Result<Self, Lockout> {
        let previous = {
            let mut controls = panel.lock();
            let held = ControlKind::ALL
                .into_iter()
                .any(|kind| controls.get(&(id, kind)).is_some_and(|control| control.busy));
            if held {
                return Err(Lockout::Busy { id });
            }
            if controls.get(&(id, kind)).is_some_and(|control| control.disabled) {
                return Err(Lockout::Disabled { id, kind });
            }

            ControlKind::ALL
                .into_iter()
                .filter_map(|kind| {
                    let control = controls.get_mut(&(id, kind))?;
                    let was_disabled = control.disabled;
                    control.disabled = true;
                    control.busy = true;
                    Some((kind, was_disabled))
                })
                .collect()
        };

        Ok(Self {
            panel: Arc::clone(panel),
            id,
            previous,
        })
    }
}

impl Drop for BusyControls {
    fn drop(&mut self) {
        let mut controls = self.panel.lock();
        for &(kind, was_disabled) in &self.previous {
            if let Some(control) = controls.get_mut(&(self.id, kind)) {
                control.disabled = was_disabled;
                control.busy = false;
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuardOptions {
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

impl GuardOptions {
    pub fn failing_with(message: impl Into<String>) -> Self {
        Self {
            success_message: None,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Clone)]
pub struct RelayGuard {
    panel: Arc<ControlPanel>,
    notifier: Arc<dyn Notifier>,
}

impl RelayGuard {
    pub fn new(panel: Arc<ControlPanel>, notifier: Arc<dyn Notifier>) -> Self {
        Self { panel, notifier }
    }

    pub fn panel(&self) -> &Arc<ControlPanel> {
        &self.panel
    }

    // Refused without running `action` when `kind` is disabled or the relay
    // already has a request in flight. Controls come back however the action
    // ends, including a panic or the future being dropped.
    pub async fn run<T, E, F>(
        &self,
        id: RelayId,
        kind: ControlKind,
        options: GuardOptions,
        action: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display + From<Lockout>,
    {
        let _busy = BusyControls::acquire(&self.panel, id, kind)?;
        debug!("relay {id}: controls locked");

        match action.await {
            Ok(value) => {
                if let Some(message) = options.success_message {
                    self.notifier.notify(Notification::success(message));
                }
                Ok(value)
            }
            Err(err) => {
                let prefix = options.error_message.as_deref().unwrap_or("Request failed");
                self.notifier
                    .notify(Notification::error(format!("{prefix}: {err}")));
                Err(err)
            }
        }
    }
}
