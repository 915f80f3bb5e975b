use serde_derive::{Deserialize, Serialize};

use crate::date_time::DateTime;

/// Trimmed down to the fields the Publish service actually reads; the full
/// header also carries authentication tokens and diagnostics masks, which
/// belong to the session layer this engine treats as an external collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub request_handle: u32,
    pub timestamp: DateTime,
    /// 0 means "no timeout", matching spec §3's PublishRequestQueue entry.
    pub timeout_hint: u32,
}

impl RequestHeader {
    pub fn new(request_handle: u32, timestamp: DateTime, timeout_hint: u32) -> Self {
        RequestHeader { request_handle, timestamp, timeout_hint }
    }
}
