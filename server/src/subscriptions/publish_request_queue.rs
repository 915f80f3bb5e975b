//! The bounded FIFO of client-initiated long-polled requests (component C3,
//! spec §3 "PublishRequestQueue entry"). The queue is a dumb container; the
//! `PublishEngine` is its only mutator (spec §5: "the request queue is the
//! only contended resource").

use std::collections::VecDeque;

use opcua_types::{DateTime, PublishRequest, SubscriptionAcknowledgement};

/// A decoded `PublishRequest` plus the arrival bookkeeping the queue needs.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request_handle: u32,
    pub arrival_time: DateTime,
    /// Milliseconds; 0 means "no timeout" (spec §3).
    pub timeout_hint_ms: u32,
    pub subscription_acknowledgements: Vec<SubscriptionAcknowledgement>,
}

impl QueuedRequest {
    pub fn from_request(request: &PublishRequest, arrival_time: DateTime) -> QueuedRequest {
        QueuedRequest {
            request_handle: request.request_header.request_handle,
            arrival_time,
            timeout_hint_ms: request.request_header.timeout_hint,
            subscription_acknowledgements: request.subscription_acknowledgements.clone(),
        }
    }

    pub fn has_timed_out(&self, now: DateTime) -> bool {
        self.timeout_hint_ms != 0 && now.since_ms(&self.arrival_time) >= self.timeout_hint_ms as i64
    }
}

#[derive(Debug, Default)]
pub struct PublishRequestQueue {
    max_len: usize,
    entries: VecDeque<QueuedRequest>,
}

impl PublishRequestQueue {
    pub fn new(max_len: usize) -> Self {
        PublishRequestQueue { max_len, entries: VecDeque::new() }
    }

    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// spec §4.4 step 2: "If `queue.length == maxPublishRequestInQueue`,
    /// dequeue the oldest request ... then enqueue the new request." Returns
    /// the displaced entry, if any.
    pub fn enqueue(&mut self, entry: QueuedRequest) -> Option<QueuedRequest> {
        let displaced = if self.entries.len() >= self.max_len {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        displaced
    }

    pub fn pop_front(&mut self) -> Option<QueuedRequest> {
        self.entries.pop_front()
    }

    /// spec §4.5: "the engine scans the queue front-to-back and, for each
    /// entry whose `timeoutHint > 0` and `now - arrivalTime >= timeoutHint`,
    /// removes it".
    pub fn drain_timed_out(&mut self, now: DateTime) -> Vec<QueuedRequest> {
        let mut timed_out = Vec::new();
        self.entries.retain(|entry| {
            if entry.has_timed_out(now) {
                timed_out.push(entry.clone());
                false
            } else {
                true
            }
        });
        timed_out
    }

    /// spec §5 `engine.shutdown()`: drains every queued request.
    pub fn drain_all(&mut self) -> Vec<QueuedRequest> {
        self.entries.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::RequestHeader;

    fn entry(handle: u32, now: DateTime, timeout_hint_ms: u32) -> QueuedRequest {
        QueuedRequest {
            request_handle: handle,
            arrival_time: now,
            timeout_hint_ms,
            subscription_acknowledgements: Vec::new(),
        }
    }

    #[test]
    fn overflow_displaces_oldest() {
        let mut queue = PublishRequestQueue::new(2);
        let now = DateTime::now();
        assert!(queue.enqueue(entry(1, now, 0)).is_none());
        assert!(queue.enqueue(entry(2, now, 0)).is_none());
        let displaced = queue.enqueue(entry(3, now, 0)).expect("queue was full");
        assert_eq!(displaced.request_handle, 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn zero_timeout_hint_never_expires() {
        let now = DateTime::now();
        let mut queue = PublishRequestQueue::new(10);
        queue.enqueue(entry(1, now, 0));
        let later = now + chrono::Duration::milliseconds(1_000_000);
        assert!(queue.drain_timed_out(later).is_empty());
    }

    #[test]
    fn positive_timeout_hint_expires_on_schedule() {
        let now = DateTime::now();
        let mut queue = PublishRequestQueue::new(10);
        queue.enqueue(entry(1, now, 1000));
        let not_yet = now + chrono::Duration::milliseconds(999);
        assert!(queue.drain_timed_out(not_yet).is_empty());
        let expired = now + chrono::Duration::milliseconds(1000);
        let timed_out = queue.drain_timed_out(expired);
        assert_eq!(timed_out.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn from_request_copies_acknowledgements() {
        let now = DateTime::now();
        let request = PublishRequest {
            request_header: RequestHeader::new(7, now, 5000),
            subscription_acknowledgements: vec![SubscriptionAcknowledgement { subscription_id: 1, sequence_number: 2 }],
        };
        let queued = QueuedRequest::from_request(&request, now);
        assert_eq!(queued.request_handle, 7);
        assert_eq!(queued.timeout_hint_ms, 5000);
        assert_eq!(queued.subscription_acknowledgements.len(), 1);
    }
}
