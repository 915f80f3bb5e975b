//! The contract a monitored item fulfils towards its owning subscription
//! (component C2, spec §6). Monitored-item evaluation itself — sampling,
//! filtering, queueing per-item — is external to this engine; all a
//! `Subscription` ever does with one is ask whether it has something to say
//! and, if so, take some of it.

use opcua_types::MonitoredItemNotification;

pub trait NotificationSource {
    fn has_pending_notifications(&self) -> bool;

    /// Takes at most `max` notifications (0 meaning "no limit"). Returns the
    /// notifications taken and whether more remain after this harvest.
    fn harvest_notifications(&mut self, max: usize) -> (Vec<MonitoredItemNotification>, bool);
}

/// Not `#[cfg(test)]`-gated: the integration tests under `server/tests/`
/// compile against this crate as an ordinary dependency (no `cfg(test)` of
/// their own), and embedders driving their own tests against the engine
/// need a canned `NotificationSource` just as much as this crate's tests do.
pub mod test_support {
    use super::*;
    use std::collections::VecDeque;

    /// A canned `NotificationSource` for driving the state machine in tests
    /// without a real monitored item.
    #[derive(Debug, Default)]
    pub struct RecordingNotificationSource {
        pending: VecDeque<MonitoredItemNotification>,
    }

    impl RecordingNotificationSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&mut self, notification: MonitoredItemNotification) {
            self.pending.push_back(notification);
        }
    }

    impl NotificationSource for RecordingNotificationSource {
        fn has_pending_notifications(&self) -> bool {
            !self.pending.is_empty()
        }

        fn harvest_notifications(&mut self, max: usize) -> (Vec<MonitoredItemNotification>, bool) {
            let budget = if max == 0 { self.pending.len() } else { max };
            let mut taken = Vec::with_capacity(budget.min(self.pending.len()));
            for _ in 0..budget {
                match self.pending.pop_front() {
                    Some(n) => taken.push(n),
                    None => break,
                }
            }
            let more_pending = !self.pending.is_empty();
            (taken, more_pending)
        }
    }

    /// A `RecordingNotificationSource` behind a shared handle, so a test can
    /// keep pushing values into a monitored item after it has been moved
    /// into a `Subscription` (which only takes ownership via `Box<dyn
    /// NotificationSource>`).
    #[derive(Debug, Clone, Default)]
    pub struct SharedRecordingSource(std::rc::Rc<std::cell::RefCell<RecordingNotificationSource>>);

    impl SharedRecordingSource {
        pub fn new() -> Self {
            Self(std::rc::Rc::new(std::cell::RefCell::new(RecordingNotificationSource::new())))
        }

        pub fn push(&self, notification: MonitoredItemNotification) {
            self.0.borrow_mut().push(notification);
        }
    }

    impl NotificationSource for SharedRecordingSource {
        fn has_pending_notifications(&self) -> bool {
            self.0.borrow().has_pending_notifications()
        }

        fn harvest_notifications(&mut self, max: usize) -> (Vec<MonitoredItemNotification>, bool) {
            self.0.borrow_mut().harvest_notifications(max)
        }
    }
}
