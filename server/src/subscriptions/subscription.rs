//! The per-subscription publishing state machine (component C4, spec §3-4.3).
//!
//! The original server this was distilled from threads the `Subscription`
//! through a `publishEngine` back-reference and mutates engine state from
//! subscription methods. Per spec §9's design note, this rewrite inverts
//! that: a `Subscription` exposes pure methods (`tick`, `serve_late`,
//! `force_keep_alive`) that return a `SubscriptionAction`, and the
//! `PublishEngine` is the only thing that ever touches the request queue or
//! decides what gets sent.

use std::collections::BTreeMap;
use std::fmt;

use log::warn;

use opcua_types::{DateTime, MonitoredItemNotification, NotificationMessage, StatusCode};

use crate::config::PublishEngineConfig;
use crate::subscriptions::notification_source::NotificationSource;

/// spec §3: `state ∈ {CREATING, NORMAL, LATE, KEEPALIVE, CLOSED}`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Creating,
    Normal,
    Late,
    KeepAlive,
    Closed,
}

/// spec §9: "Use a tagged variant `Action ∈ { None, EmitResponse(...),
/// EmitKeepAlive, EnterClosed }` to keep the state machine total."
#[derive(Debug)]
pub enum SubscriptionAction {
    None,
    EmitResponse(NotificationMessage),
    EmitKeepAlive(NotificationMessage),
    EnterClosed(NotificationMessage),
}

/// Per-subscription state machine, sequence numbering and retransmission
/// queue (spec §3 "Subscription").
pub struct Subscription {
    id: u32,
    publishing_interval_ms: i64,
    max_keep_alive_count: u32,
    life_time_count: u32,
    max_notifications_per_publish: usize,
    publishing_enabled: bool,
    state: SubscriptionState,
    keep_alive_counter: u32,
    life_time_counter: u32,
    next_sequence_number: u32,
    /// The retransmission queue (spec §3: "ordered mapping seq ->
    /// NotificationMessage, holding every message that has been sent ... and
    /// not yet acknowledged"). A `BTreeMap` keeps keys in ascending order for
    /// free, satisfying the `availableSequenceNumbers` invariant.
    sent_notifications: BTreeMap<u32, NotificationMessage>,
    max_retransmission_queue_size: usize,
    monitored_items: Vec<Box<dyn NotificationSource>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("publishing_interval_ms", &self.publishing_interval_ms)
            .field("max_keep_alive_count", &self.max_keep_alive_count)
            .field("life_time_count", &self.life_time_count)
            .field("state", &self.state)
            .field("keep_alive_counter", &self.keep_alive_counter)
            .field("life_time_counter", &self.life_time_counter)
            .field("next_sequence_number", &self.next_sequence_number)
            .field("available_sequence_numbers", &self.available_sequence_numbers())
            .field("monitored_item_count", &self.monitored_items.len())
            .finish()
    }
}

impl Subscription {
    /// spec §3: `lifeTimeCount` "on construction re-adjusted upward to at
    /// least 3 * maxKeepAliveCount"; `publishingInterval` is clamped to the
    /// server-configured floor/ceiling.
    pub fn new(
        id: u32,
        publishing_interval_ms: i64,
        max_keep_alive_count: u32,
        life_time_count: u32,
        max_notifications_per_publish: usize,
        publishing_enabled: bool,
        config: &PublishEngineConfig,
    ) -> Subscription {
        assert!(max_keep_alive_count > 0, "max_keep_alive_count must be positive");
        let life_time_count = life_time_count.max(opcua_core::constants::MIN_LIFETIME_COUNT_RATIO * max_keep_alive_count);
        let publishing_interval_ms = config.clamp_publishing_interval(publishing_interval_ms);
        let max_retransmission_queue_size =
            config.retransmission_queue_cap(max_notifications_per_publish, max_keep_alive_count);
        Subscription {
            id,
            publishing_interval_ms,
            max_keep_alive_count,
            life_time_count,
            max_notifications_per_publish,
            publishing_enabled,
            state: SubscriptionState::Creating,
            keep_alive_counter: max_keep_alive_count,
            life_time_counter: life_time_count,
            next_sequence_number: 1,
            sent_notifications: BTreeMap::new(),
            max_retransmission_queue_size,
            monitored_items: Vec::with_capacity(opcua_core::constants::DEFAULT_MONITORED_ITEM_CAPACITY),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn is_late(&self) -> bool {
        self.state == SubscriptionState::Late
    }

    pub fn is_closed(&self) -> bool {
        self.state == SubscriptionState::Closed
    }

    pub fn publishing_interval_ms(&self) -> i64 {
        self.publishing_interval_ms
    }

    pub fn set_publishing_interval_ms(&mut self, ms: i64) {
        self.publishing_interval_ms = ms;
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    pub fn set_publishing_enabled(&mut self, enabled: bool) {
        self.publishing_enabled = enabled;
    }

    pub fn keep_alive_counter(&self) -> u32 {
        self.keep_alive_counter
    }

    pub fn life_time_counter(&self) -> u32 {
        self.life_time_counter
    }

    pub fn max_keep_alive_count(&self) -> u32 {
        self.max_keep_alive_count
    }

    pub fn life_time_count(&self) -> u32 {
        self.life_time_count
    }

    /// spec §3 derived value: `timeToExpiration = lifeTimeCounter *
    /// publishingInterval`. Used by `findLateSubscriptionsSortedByAge`.
    pub fn time_to_expiration_ms(&self) -> i64 {
        self.life_time_counter as i64 * self.publishing_interval_ms
    }

    /// spec §3: `availableSequenceNumbers` is the ordered key set of
    /// `sentNotifications`.
    pub fn available_sequence_numbers(&self) -> Vec<u32> {
        self.sent_notifications.keys().copied().collect()
    }

    pub fn add_monitored_item(&mut self, item: Box<dyn NotificationSource>) {
        self.monitored_items.push(item);
    }

    pub fn has_pending_notifications(&self) -> bool {
        self.monitored_items.iter().any(|item| item.has_pending_notifications())
    }

    /// spec §4.3: an acknowledgement against this subscription's sequence
    /// number. `Good` if known, `BadSequenceNumberUnknown` (and the queue
    /// left untouched) otherwise.
    pub fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        if self.sent_notifications.remove(&sequence_number).is_some() {
            StatusCode::Good
        } else {
            StatusCode::BadSequenceNumberUnknown
        }
    }

    /// spec §4.1, evaluated once per elapsed publishing interval. `now` is
    /// used only to stamp the outgoing `NotificationMessage`;
    /// `request_available` tells the subscription whether the engine has a
    /// queued `PublishRequest` it could hand this subscription right now.
    pub fn tick(&mut self, now: DateTime, request_available: bool) -> SubscriptionAction {
        match self.state {
            SubscriptionState::Closed => SubscriptionAction::None,
            SubscriptionState::Late => self.tick_late(),
            SubscriptionState::Creating => self.tick_creating(now, request_available),
            SubscriptionState::Normal | SubscriptionState::KeepAlive => {
                self.tick_normal_or_keep_alive(now, request_available)
            }
        }
    }

    /// spec §4.1: "On the first tick after creation, the subscription
    /// publishes regardless of whether it has data; if it had data it
    /// transitions to NORMAL, otherwise to KEEPALIVE."
    fn tick_creating(&mut self, now: DateTime, request_available: bool) -> SubscriptionAction {
        if self.publishing_enabled && self.has_pending_notifications() {
            if request_available {
                let message = self.emit_publish(now);
                self.state = SubscriptionState::Normal;
                SubscriptionAction::EmitResponse(message)
            } else {
                self.state = SubscriptionState::Late;
                SubscriptionAction::None
            }
        } else if request_available {
            let message = self.emit_keep_alive(now);
            self.state = SubscriptionState::KeepAlive;
            SubscriptionAction::EmitKeepAlive(message)
        } else {
            self.state = SubscriptionState::Late;
            SubscriptionAction::None
        }
    }

    /// spec §4.1 steps 1-2.
    fn tick_normal_or_keep_alive(&mut self, now: DateTime, request_available: bool) -> SubscriptionAction {
        if self.publishing_enabled && self.has_pending_notifications() {
            // Step 1: data is pending, try to publish it.
            if request_available {
                let message = self.emit_publish(now);
                self.state = SubscriptionState::Normal;
                SubscriptionAction::EmitResponse(message)
            } else {
                self.state = SubscriptionState::Late;
                SubscriptionAction::None
            }
        } else {
            // Step 2: nothing to publish, count down to the next keep-alive.
            self.keep_alive_counter -= 1;
            if self.keep_alive_counter == 0 {
                if request_available {
                    let message = self.emit_keep_alive(now);
                    self.state = SubscriptionState::KeepAlive;
                    SubscriptionAction::EmitKeepAlive(message)
                } else {
                    self.state = SubscriptionState::Late;
                    SubscriptionAction::None
                }
            } else {
                SubscriptionAction::None
            }
        }
    }

    /// spec §4.1 step 3: LATE is sticky on ordinary ticks — only
    /// `lifeTimeCounter` decrements until the engine's late-subscription pass
    /// serves this subscription a request (see `serve_late`).
    fn tick_late(&mut self) -> SubscriptionAction {
        self.life_time_counter -= 1;
        if self.life_time_counter == 0 {
            self.state = SubscriptionState::Closed;
            let message = self.build_status_change(DateTime::now(), StatusCode::BadTimeout);
            SubscriptionAction::EnterClosed(message)
        } else {
            SubscriptionAction::None
        }
    }

    /// spec §4.1: "A LATE subscription that receives a notification shall
    /// send a PublishResponse immediately, without waiting for next publish
    /// interval." Called by the engine's late-subscription pass once it has
    /// a request in hand for this subscription; never call this unless
    /// `state() == SubscriptionState::Late`.
    pub fn serve_late(&mut self, now: DateTime) -> SubscriptionAction {
        debug_assert_eq!(self.state, SubscriptionState::Late, "serve_late called on a non-LATE subscription");
        if self.publishing_enabled && self.has_pending_notifications() {
            let message = self.emit_publish(now);
            self.state = SubscriptionState::Normal;
            SubscriptionAction::EmitResponse(message)
        } else {
            let message = self.emit_keep_alive(now);
            self.state = SubscriptionState::KeepAlive;
            SubscriptionAction::EmitKeepAlive(message)
        }
    }

    /// spec §6: `send_keep_alive_response(sub)` — forces a keep-alive out of
    /// turn (e.g. right after CreateSubscription), regardless of the current
    /// keep-alive counter.
    pub fn force_keep_alive(&mut self, now: DateTime) -> SubscriptionAction {
        let message = self.emit_keep_alive(now);
        self.state = SubscriptionState::KeepAlive;
        SubscriptionAction::EmitKeepAlive(message)
    }

    /// spec §5: "`subscription.terminate()` transitions the subscription to
    /// CLOSED immediately ... and schedules one final StatusChangeNotification
    /// delivery as in §4.5."
    pub fn terminate(&mut self, now: DateTime) -> SubscriptionAction {
        if self.state == SubscriptionState::Closed {
            return SubscriptionAction::None;
        }
        self.state = SubscriptionState::Closed;
        let message = self.build_status_change(now, StatusCode::BadTimeout);
        SubscriptionAction::EnterClosed(message)
    }

    /// spec §4.2: harvest, assign a sequence number, store it in the
    /// retransmission queue, and reset both counters.
    fn emit_publish(&mut self, now: DateTime) -> NotificationMessage {
        let harvested = self.harvest(self.max_notifications_per_publish);
        let sequence_number = self.next_sequence_number;
        self.advance_sequence_number();
        let message = NotificationMessage::data_change(sequence_number, now, harvested);
        self.store_sent(sequence_number, message.clone());
        self.reset_counters();
        message
    }

    /// spec §4.2: "A keep-alive PublishResponse is identical except
    /// `notificationData` is empty and `sequenceNumber` is a placeholder
    /// (not stored)."
    fn emit_keep_alive(&mut self, now: DateTime) -> NotificationMessage {
        let message = NotificationMessage::keep_alive(self.next_sequence_number, now);
        self.reset_counters();
        message
    }

    fn build_status_change(&mut self, now: DateTime, status: StatusCode) -> NotificationMessage {
        let sequence_number = self.next_sequence_number;
        self.advance_sequence_number();
        NotificationMessage::status_change(sequence_number, now, status)
    }

    fn advance_sequence_number(&mut self) {
        self.next_sequence_number = if self.next_sequence_number == u32::MAX {
            1
        } else {
            self.next_sequence_number + 1
        };
    }

    fn reset_counters(&mut self) {
        self.keep_alive_counter = self.max_keep_alive_count;
        self.life_time_counter = self.life_time_count;
    }

    fn store_sent(&mut self, sequence_number: u32, message: NotificationMessage) {
        self.sent_notifications.insert(sequence_number, message);
        while self.sent_notifications.len() > self.max_retransmission_queue_size {
            let oldest = match self.sent_notifications.keys().next().copied() {
                Some(key) => key,
                None => break,
            };
            warn!(
                "subscription {} retransmission queue over cap ({}), dropping seq {}",
                self.id, self.max_retransmission_queue_size, oldest
            );
            self.sent_notifications.remove(&oldest);
        }
    }

    /// spec §4.2: "Harvest at most `maxNotificationsPerPublish` items (0 ⇒
    /// all available) from the monitored items in a deterministic order."
    fn harvest(&mut self, max: usize) -> Vec<MonitoredItemNotification> {
        let mut harvested = Vec::new();
        if max == 0 {
            for item in &mut self.monitored_items {
                let (mut taken, _more) = item.harvest_notifications(0);
                harvested.append(&mut taken);
            }
        } else {
            let mut remaining = max;
            for item in &mut self.monitored_items {
                if remaining == 0 {
                    break;
                }
                let (mut taken, _more) = item.harvest_notifications(remaining);
                remaining -= taken.len();
                harvested.append(&mut taken);
            }
        }
        harvested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::notification_source::test_support::RecordingNotificationSource;
    use opcua_types::{DataValue, NotificationData, StatusChangeNotification, Variant};

    fn config() -> PublishEngineConfig {
        PublishEngineConfig::default()
    }

    fn push_value(source_idx: usize, sources: &mut Vec<RecordingNotificationSource>, value: i32) {
        sources[source_idx].push(MonitoredItemNotification {
            client_handle: source_idx as u32,
            value: DataValue { value: Variant::Int32(value), source_timestamp: DateTime::now() },
        });
    }

    #[test]
    fn life_time_count_is_coerced_upward() {
        let sub = Subscription::new(1, 1000, 20, 0, 0, true, &config());
        assert_eq!(sub.life_time_count(), 60);
        assert_eq!(sub.life_time_counter(), 60);
    }

    #[test]
    fn life_time_count_left_alone_when_already_sufficient() {
        let sub = Subscription::new(1, 1000, 20, 1000, 0, true, &config());
        assert_eq!(sub.life_time_count(), 1000);
    }

    #[test]
    fn creating_state_emits_keep_alive_on_first_tick_with_no_data() {
        let mut sub = Subscription::new(1, 1000, 20, 60, 0, true, &config());
        let action = sub.tick(DateTime::now(), true);
        assert!(matches!(action, SubscriptionAction::EmitKeepAlive(_)));
        assert_eq!(sub.state(), SubscriptionState::KeepAlive);
    }

    #[test]
    fn creating_state_goes_late_without_a_request() {
        let mut sub = Subscription::new(1, 1000, 20, 60, 0, true, &config());
        let action = sub.tick(DateTime::now(), false);
        assert!(matches!(action, SubscriptionAction::None));
        assert_eq!(sub.state(), SubscriptionState::Late);
    }

    #[test]
    fn available_sequence_numbers_grow_and_ack_shrinks_them() {
        let mut sub = Subscription::new(1, 1000, 20, 60, 0, true, &config());
        // First tick: no data yet -> keep-alive, moves to KeepAlive.
        let _ = sub.tick(DateTime::now(), true);

        let mut sources = vec![RecordingNotificationSource::new()];
        push_value(0, &mut sources, 1);
        sub.add_monitored_item(Box::new(sources.pop().unwrap()));

        let action = sub.tick(DateTime::now(), true);
        assert!(matches!(action, SubscriptionAction::EmitResponse(_)));
        assert_eq!(sub.available_sequence_numbers(), vec![2]);

        assert_eq!(sub.acknowledge(2), StatusCode::Good);
        assert!(sub.available_sequence_numbers().is_empty());
        assert_eq!(sub.acknowledge(2), StatusCode::BadSequenceNumberUnknown);
    }

    #[test]
    fn closed_state_never_leaves_closed() {
        let mut sub = Subscription::new(1, 1000, 1, 3, 0, true, &config());
        // Drive into Late, then let lifetime run out.
        let _ = sub.tick(DateTime::now(), false);
        assert_eq!(sub.state(), SubscriptionState::Late);
        let _ = sub.tick(DateTime::now(), false);
        let _ = sub.tick(DateTime::now(), false);
        let action = sub.tick(DateTime::now(), false);
        assert!(matches!(action, SubscriptionAction::EnterClosed(_)));
        assert_eq!(sub.state(), SubscriptionState::Closed);
        let action = sub.tick(DateTime::now(), true);
        assert!(matches!(action, SubscriptionAction::None));
        assert_eq!(sub.state(), SubscriptionState::Closed);
    }

    #[test]
    fn retransmission_queue_drops_oldest_past_cap() {
        let config = PublishEngineConfig { max_retransmission_queue_size: Some(2), ..PublishEngineConfig::default() };
        let mut sub = Subscription::new(1, 1000, 20, 60, 1, true, &config);
        let mut source = RecordingNotificationSource::new();
        for i in 0..3 {
            source.push(MonitoredItemNotification {
                client_handle: 0,
                value: DataValue { value: Variant::Int32(i), source_timestamp: DateTime::now() },
            });
        }
        sub.add_monitored_item(Box::new(source));
        let _ = sub.tick(DateTime::now(), true); // keep-alive first
        for _ in 0..3 {
            let _ = sub.tick(DateTime::now(), true);
        }
        assert!(sub.available_sequence_numbers().len() <= 2);
    }

    /// spec §5 Cancellation: `terminate()` moves straight to CLOSED and
    /// produces exactly one final `BadTimeout` status-change notification,
    /// regardless of what state the subscription was in.
    #[test]
    fn terminate_closes_and_emits_a_bad_timeout_status_change() {
        let mut sub = Subscription::new(1, 1000, 20, 60, 0, true, &config());
        let action = sub.terminate(DateTime::now());
        match action {
            SubscriptionAction::EnterClosed(message) => {
                assert!(matches!(
                    message.notification_data.as_slice(),
                    [NotificationData::StatusChange(StatusChangeNotification { status: StatusCode::BadTimeout })]
                ));
            }
            other => panic!("expected EnterClosed, got {:?}", other),
        }
        assert_eq!(sub.state(), SubscriptionState::Closed);
    }

    /// Calling `terminate()` again on an already-closed subscription is a
    /// no-op: it must not emit a second status-change notification.
    #[test]
    fn terminate_is_idempotent_once_closed() {
        let mut sub = Subscription::new(1, 1000, 20, 60, 0, true, &config());
        let _ = sub.terminate(DateTime::now());
        let action = sub.terminate(DateTime::now());
        assert!(matches!(action, SubscriptionAction::None));
        assert_eq!(sub.state(), SubscriptionState::Closed);
    }
}
