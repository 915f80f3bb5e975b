//! Status codes surfaced by the publish engine.
//!
//! The full OPC UA status code space is a 32-bit value with severity,
//! sub-code and structure bits (Part 4, 7.34). Only the handful of codes the
//! Publish service can actually produce are represented here; address-space
//! and service-dispatcher status codes are out of scope (spec §1).

use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Good,
    BadNoSubscription,
    BadTooManyPublishRequests,
    BadTimeout,
    BadSequenceNumberUnknown,
    BadSubscriptionIdInvalid,
    BadSessionClosed,
}

impl StatusCode {
    pub fn is_good(self) -> bool {
        self == StatusCode::Good
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::Good
    }
}
