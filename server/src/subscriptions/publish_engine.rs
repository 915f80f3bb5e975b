//! Owner of all subscriptions and the shared request queue (component C5,
//! spec §4.4-4.6). Decides which subscription serves the next long-polled
//! request, runs the late-subscription pass, finalizes closed subscriptions
//! and times out stale requests.
//!
//! The source this was distilled from drives responses out through
//! `_send_response` / `_send_response_for_request` callbacks into the
//! transport layer. Per spec §9's "pure methods" design note, every engine
//! entry point here instead *returns* the `PublishOutcome`s it produced —
//! there can be more than one per call, since enqueueing a request can both
//! displace an older one (a fault) and immediately clear a backlog of LATE
//! subscriptions in the same pass.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use log::debug;

use opcua_core::diagnostics::ServerDiagnostics;
use opcua_types::{
    DateTime, NotificationMessage, PublishRequest, PublishResponse, ResponseHeader, ServiceFault,
    StatusCode, SubscriptionAcknowledgement,
};

use crate::config::PublishEngineConfig;
use crate::subscriptions::publish_request_queue::{PublishRequestQueue, QueuedRequest};
use crate::subscriptions::subscription::{Subscription, SubscriptionAction};

/// What the transport layer does with the outcome of one engine call (spec
/// §6: `onPublishRequest` "never throws"; accepts `PublishResponse` /
/// `ServiceFault` objects).
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    Response(PublishResponse),
    Fault(ServiceFault),
}

/// A subscription that reached CLOSED by lifetime expiry and is waiting for
/// one more request to carry its final `StatusChangeNotification` (spec §3
/// "PublishEngine owns ... a list of closed subscriptions awaiting
/// status-change delivery").
#[derive(Debug)]
struct ClosedSubscription {
    id: u32,
    notification: NotificationMessage,
}

/// One entry in the engine's tick schedule (spec §4.6/§9: "a single min-heap
/// keyed by next-tick time, re-inserted on each fire"). `generation` is
/// bumped whenever a subscription's interval changes or it is removed; a
/// popped entry whose generation is stale is silently dropped instead of
/// re-armed, which is how "the old schedule is cancelled and a new one
/// installed" (spec §4.6) is implemented without a heap-removal operation.
#[derive(Debug, Eq, PartialEq)]
struct ScheduleEntry {
    next_fire_ms: i64,
    subscription_id: u32,
    generation: u64,
}

impl Ord for ScheduleEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.next_fire_ms.cmp(&other.next_fire_ms).then(self.subscription_id.cmp(&other.subscription_id))
    }
}

impl PartialOrd for ScheduleEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

pub struct PublishEngine {
    config: PublishEngineConfig,
    subscriptions: HashMap<u32, Subscription>,
    generations: HashMap<u32, u64>,
    queue: PublishRequestQueue,
    pending_closed: VecDeque<ClosedSubscription>,
    schedule: BinaryHeap<Reverse<ScheduleEntry>>,
    diagnostics: ServerDiagnostics,
}

impl PublishEngine {
    pub fn new(config: PublishEngineConfig) -> Self {
        config.validate().expect("invalid PublishEngineConfig");
        let max_len = config.max_publish_request_in_queue(0);
        PublishEngine {
            config,
            subscriptions: HashMap::new(),
            generations: HashMap::new(),
            queue: PublishRequestQueue::new(max_len),
            pending_closed: VecDeque::new(),
            schedule: BinaryHeap::new(),
            diagnostics: ServerDiagnostics::default(),
        }
    }

    pub fn diagnostics(&self) -> &ServerDiagnostics {
        &self.diagnostics
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn pending_publish_request_count(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_closed_subscription_count(&self) -> usize {
        self.pending_closed.len()
    }

    pub fn get_subscription_by_id(&self, id: u32) -> Option<&Subscription> {
        self.subscriptions.get(&id)
    }

    /// spec §6 `add_subscription(sub)`: registers the subscription (state
    /// CREATING) and arms its first tick, aligned to registration time (spec
    /// §4.6).
    pub fn add_subscription(&mut self, subscription: Subscription, now: DateTime) {
        let id = subscription.id();
        assert!(!self.subscriptions.contains_key(&id), "subscription {} already registered", id);
        self.diagnostics.on_create_subscription(id);
        let generation = 0;
        self.generations.insert(id, generation);
        self.arm_schedule(id, subscription.publishing_interval_ms(), generation, now);
        self.subscriptions.insert(id, subscription);
        self.rebalance_queue_capacity();
    }

    /// spec §6 `remove_subscription(id)` driving spec §5 Cancellation:
    /// "`subscription.terminate()` transitions the subscription to CLOSED
    /// immediately, detaches its schedule, and schedules one final
    /// StatusChangeNotification delivery as in §4.5." Routes through the
    /// same pending-closed path lifetime expiry uses (`close_subscription`),
    /// so an explicitly removed subscription still gets its final
    /// `BadTimeout` StatusChangeNotification delivered to the client.
    pub fn remove_subscription(&mut self, id: u32, now: DateTime) {
        if let Some(mut subscription) = self.subscriptions.remove(&id) {
            self.diagnostics.on_destroy_subscription(id);
            match subscription.terminate(now) {
                SubscriptionAction::EnterClosed(notification) => self.close_subscription(id, notification),
                _ => {
                    self.generations.remove(&id);
                    self.rebalance_queue_capacity();
                }
            }
        } else {
            self.generations.remove(&id);
        }
    }

    /// spec §4.6: "When a subscription changes interval, the old schedule is
    /// cancelled and a new one installed."
    pub fn set_publishing_interval(&mut self, id: u32, new_interval_ms: i64, now: DateTime) {
        let clamped = self.config.clamp_publishing_interval(new_interval_ms);
        if let Some(subscription) = self.subscriptions.get_mut(&id) {
            subscription.set_publishing_interval_ms(clamped);
            let generation = self.generations.entry(id).or_insert(0);
            *generation += 1;
            let generation = *generation;
            self.arm_schedule(id, clamped, generation, now);
        }
    }

    /// spec §3: "A subscription with `publishingEnabled == false` still
    /// advances the keep-alive and lifetime counters but never emits data
    /// notifications."
    pub fn set_publishing_enabled(&mut self, id: u32, enabled: bool) {
        if let Some(subscription) = self.subscriptions.get_mut(&id) {
            subscription.set_publishing_enabled(enabled);
        }
    }

    fn arm_schedule(&mut self, id: u32, interval_ms: i64, generation: u64, now: DateTime) {
        self.schedule.push(Reverse(ScheduleEntry {
            next_fire_ms: now.as_chrono().timestamp_millis() + interval_ms,
            subscription_id: id,
            generation,
        }));
    }

    fn rebalance_queue_capacity(&mut self) {
        let max_len = self.config.max_publish_request_in_queue(self.subscriptions.len());
        self.queue.set_max_len(max_len);
    }

    /// spec §4.1 tie-break: "serve by ascending `timeToExpiration` (most
    /// urgent first), then by smaller subscription id." Exposed directly
    /// (spec §6 lists it as an engine operation in its own right).
    pub fn find_late_subscriptions_sorted_by_age(&self) -> Vec<u32> {
        let mut late: Vec<&Subscription> = self.subscriptions.values().filter(|s| s.is_late()).collect();
        late.sort_by(|a, b| a.time_to_expiration_ms().cmp(&b.time_to_expiration_ms()).then(a.id().cmp(&b.id())));
        late.into_iter().map(Subscription::id).collect()
    }

    /// spec §5: "subscriptions read [the queue] via the engine's
    /// `pullRequest(subscriptionId)` helper, which dequeues the oldest
    /// request in the queue and returns it (or `None`)." The helper never
    /// actually needs `subscriptionId` here (the queue is not partitioned
    /// per subscription), but the name is kept for the one-to-one mapping to
    /// the documented operation.
    fn pull_request(&mut self) -> Option<QueuedRequest> {
        self.queue.pop_front()
    }

    /// spec §6 `onPublishRequest(req)`: the only entry point for client
    /// requests. Never panics on client input.
    pub fn on_publish_request(&mut self, request: PublishRequest, now: DateTime) -> Vec<PublishOutcome> {
        let request_handle = request.request_header.request_handle;

        // spec §4.4 step 1.
        if self.subscriptions.is_empty() && self.pending_closed.is_empty() {
            return vec![PublishOutcome::Fault(ServiceFault::new(now, request_handle, StatusCode::BadNoSubscription))];
        }

        let mut outcomes = Vec::new();

        // spec §4.4 steps 2-3.
        let entry = QueuedRequest::from_request(&request, now);
        let displaced = self.queue.enqueue(entry);
        self.diagnostics.on_publish_request_queued();
        if let Some(displaced) = displaced {
            self.diagnostics.on_publish_request_rejected_queue_full(displaced.request_handle);
            outcomes.push(PublishOutcome::Fault(ServiceFault::new(
                now,
                displaced.request_handle,
                StatusCode::BadTooManyPublishRequests,
            )));
        }

        // spec §4.4 step 4.
        outcomes.extend(self.run_late_pass(now));
        outcomes
    }

    /// spec §4.6 / §4.5: called once per elapsed scheduling quantum by the
    /// engine's cooperative timer. Times out stale requests, fires every
    /// subscription whose publishing interval has elapsed, then runs the
    /// late-subscription pass so any request freed up by a timeout can
    /// immediately serve a backlog.
    pub fn tick(&mut self, now: DateTime) -> Vec<PublishOutcome> {
        let mut outcomes = Vec::new();

        // spec §4.5: request timeouts are scanned "on every internal tick".
        for timed_out in self.queue.drain_timed_out(now) {
            self.diagnostics.on_publish_request_timed_out(timed_out.request_handle);
            outcomes.push(PublishOutcome::Fault(ServiceFault::new(now, timed_out.request_handle, StatusCode::BadTimeout)));
        }

        let due = self.pop_due_schedule_entries(now);
        for entry in due {
            let still_live = self.generations.get(&entry.subscription_id) == Some(&entry.generation);
            if still_live {
                if let Some(outcome) = self.fire_subscription_tick(entry.subscription_id, now) {
                    outcomes.push(outcome);
                }
                if let Some(subscription) = self.subscriptions.get(&entry.subscription_id) {
                    let interval = subscription.publishing_interval_ms();
                    self.arm_schedule(entry.subscription_id, interval, entry.generation, now);
                }
            }
        }

        outcomes.extend(self.run_late_pass(now));
        outcomes
    }

    fn pop_due_schedule_entries(&mut self, now: DateTime) -> Vec<ScheduleEntry> {
        let now_ms = now.as_chrono().timestamp_millis();
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.schedule.peek() {
            if entry.next_fire_ms > now_ms {
                break;
            }
            if let Some(Reverse(entry)) = self.schedule.pop() {
                due.push(entry);
            }
        }
        due
    }

    fn fire_subscription_tick(&mut self, id: u32, now: DateTime) -> Option<PublishOutcome> {
        let request_available = !self.queue.is_empty();
        let action = self.subscriptions.get_mut(&id)?.tick(now, request_available);
        match action {
            SubscriptionAction::None => None,
            SubscriptionAction::EmitResponse(_) | SubscriptionAction::EmitKeepAlive(_) => {
                let request = self.pull_request().expect("tick only emits when request_available was true");
                Some(self.finish_request(id, request, action, now))
            }
            SubscriptionAction::EnterClosed(notification) => {
                self.diagnostics.on_subscription_expired(id);
                self.close_subscription(id, notification);
                None
            }
        }
    }

    /// Finishes tearing down a subscription that has already produced its
    /// final `EnterClosed` notification, queuing that notification for
    /// delivery on the next request (spec §4.5). Shared by lifetime expiry
    /// (`fire_subscription_tick`) and explicit removal (`remove_subscription`);
    /// callers are responsible for their own diagnostics counter, since the
    /// two paths report different events (expiry vs. explicit destroy).
    fn close_subscription(&mut self, id: u32, notification: NotificationMessage) {
        self.subscriptions.remove(&id);
        self.generations.remove(&id);
        self.pending_closed.push_back(ClosedSubscription { id, notification });
        self.rebalance_queue_capacity();
    }

    /// spec §4.4 step 4 / §4.5: "repeatedly, while the queue is non-empty and
    /// at least one subscription is LATE (or has a pending closed-subscription
    /// status to deliver), pop the oldest request and let the most-urgent
    /// such subscription consume it." Pending closed-subscription deliveries
    /// are served ahead of LATE subscriptions, since they represent work
    /// already finished that is only waiting on a request to carry it out
    /// (an Open Question the spec leaves unresolved; see DESIGN.md).
    fn run_late_pass(&mut self, now: DateTime) -> Vec<PublishOutcome> {
        let mut outcomes = Vec::new();
        loop {
            if self.queue.is_empty() {
                break;
            }
            if let Some(closed) = self.pending_closed.pop_front() {
                let request = self.pull_request().expect("queue non-empty checked above");
                outcomes.push(self.build_closed_response(closed, &request, now));
                continue;
            }
            let late_ids = self.find_late_subscriptions_sorted_by_age();
            let target_id = match late_ids.first() {
                Some(id) => *id,
                None => break,
            };
            let request = self.pull_request().expect("queue non-empty checked above");
            let action = self.subscriptions.get_mut(&target_id).expect("late id came from live map").serve_late(now);
            outcomes.push(self.finish_request(target_id, request, action, now));
        }
        outcomes
    }

    /// spec §6 `send_keep_alive_response(sub)`: forces a keep-alive out of
    /// turn, consuming one queued request if one is available.
    pub fn send_keep_alive_response(&mut self, id: u32, now: DateTime) -> Option<PublishOutcome> {
        if !self.subscriptions.contains_key(&id) || self.queue.is_empty() {
            return None;
        }
        let request = self.pull_request()?;
        let action = self.subscriptions.get_mut(&id)?.force_keep_alive(now);
        Some(self.finish_request(id, request, action, now))
    }

    /// spec §5 `engine.shutdown()`: "cancels all schedules and answers every
    /// queued request with `ServiceFault{BadSessionClosed}`."
    pub fn shutdown(&mut self, now: DateTime) -> Vec<PublishOutcome> {
        let outcomes = self
            .queue
            .drain_all()
            .into_iter()
            .map(|request| PublishOutcome::Fault(ServiceFault::new(now, request.request_handle, StatusCode::BadSessionClosed)))
            .collect();
        self.schedule.clear();
        self.generations.clear();
        self.subscriptions.clear();
        self.pending_closed.clear();
        outcomes
    }

    /// spec §6 `_send_response(sub, req, resp)` / `_send_response_for_request`
    /// inlined: builds the full `PublishResponse` for a request a subscription
    /// just consumed, including ack processing (spec §4.3).
    fn finish_request(&mut self, subscription_id: u32, request: QueuedRequest, action: SubscriptionAction, now: DateTime) -> PublishOutcome {
        let message = match action {
            SubscriptionAction::EmitResponse(message) | SubscriptionAction::EmitKeepAlive(message) => message,
            SubscriptionAction::None | SubscriptionAction::EnterClosed(_) => {
                unreachable!("finish_request is only called with an action that consumed a request")
            }
        };
        let results = self.process_acknowledgements(&request.subscription_acknowledgements);
        let subscription = self.subscriptions.get(&subscription_id).expect("subscription still live while serving it");
        debug!("subscription {} publishing response, seq {}", subscription_id, message.sequence_number);
        PublishOutcome::Response(PublishResponse {
            response_header: ResponseHeader::new_good(now, request.request_handle),
            subscription_id,
            available_sequence_numbers: subscription.available_sequence_numbers(),
            more_notifications: subscription.has_pending_notifications(),
            notification_message: message,
            results,
        })
    }

    fn build_closed_response(&mut self, closed: ClosedSubscription, request: &QueuedRequest, now: DateTime) -> PublishOutcome {
        let results = self.process_acknowledgements(&request.subscription_acknowledgements);
        PublishOutcome::Response(PublishResponse {
            response_header: ResponseHeader::new_good(now, request.request_handle),
            subscription_id: closed.id,
            available_sequence_numbers: Vec::new(),
            more_notifications: false,
            notification_message: closed.notification,
            results,
        })
    }

    /// spec §4.3: each ack is applied to whichever live subscription it
    /// names — the one that just consumed the request, or another one
    /// entirely (redirection) — and an unknown subscription id produces
    /// `BadSubscriptionIdInvalid` at that index. Order follows the request's
    /// ack array order.
    fn process_acknowledgements(&mut self, acks: &[SubscriptionAcknowledgement]) -> Vec<StatusCode> {
        acks.iter()
            .map(|ack| match self.subscriptions.get_mut(&ack.subscription_id) {
                Some(subscription) => subscription.acknowledge(ack.sequence_number),
                None => StatusCode::BadSubscriptionIdInvalid,
            })
            .collect()
    }
}
