//! A small counter sink for subscription lifecycle events, in the spirit of
//! this workspace's existing `ServerDiagnostics` hooks
//! (`on_create_subscription` / `on_destroy_subscription`). No persistence,
//! no external reporting — just counts an embedder can read back, useful for
//! tests asserting "how many subscriptions expired" without threading that
//! logic through the engine's public API.

use log::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct ServerDiagnostics {
    pub subscriptions_created: u64,
    pub subscriptions_destroyed: u64,
    pub subscriptions_expired: u64,
    pub publish_requests_queued: u64,
    pub publish_requests_timed_out: u64,
    pub publish_requests_rejected_queue_full: u64,
}

impl ServerDiagnostics {
    pub fn on_create_subscription(&mut self, subscription_id: u32) {
        self.subscriptions_created += 1;
        info!("subscription {} created", subscription_id);
    }

    pub fn on_destroy_subscription(&mut self, subscription_id: u32) {
        self.subscriptions_destroyed += 1;
        info!("subscription {} destroyed", subscription_id);
    }

    pub fn on_subscription_expired(&mut self, subscription_id: u32) {
        self.subscriptions_expired += 1;
        info!("subscription {} expired (lifetime count reached zero)", subscription_id);
    }

    pub fn on_publish_request_queued(&mut self) {
        self.publish_requests_queued += 1;
    }

    pub fn on_publish_request_timed_out(&mut self, request_handle: u32) {
        self.publish_requests_timed_out += 1;
        info!("publish request {} timed out while queued", request_handle);
    }

    pub fn on_publish_request_rejected_queue_full(&mut self, request_handle: u32) {
        self.publish_requests_rejected_queue_full += 1;
        info!("publish request {} displaced by queue overflow", request_handle);
    }
}
