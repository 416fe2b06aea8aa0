use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use tracing::{info, warn};

use greenhouse_common::{Notification, NotificationLevel};

pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

#[derive(Debug)]
pub struct NotificationQueue {
    capacity: usize,
    entries: Mutex<VecDeque<Notification>>,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn recent(&self) -> Vec<Notification> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().cloned().collect()
    }

    pub fn drain(&self) -> Vec<Notification> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.drain(..).collect()
    }
}

impl Notifier for NotificationQueue {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => warn!("notification: {}", notification.message),
            NotificationLevel::Info | NotificationLevel::Success => {
                info!("notification: {}", notification.message)
            }
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(notification);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn keeps_the_most_recent_entries() {
        let queue = NotificationQueue::new(2);
        queue.notify(Notification::info("one"));
        queue.notify(Notification::error("two"));
        queue.notify(Notification::success("three"));

        assert_eq!(
            queue.recent(),
            vec![Notification::error("two"), Notification::success("three")]
        );
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.recent().is_empty());
    }
}
