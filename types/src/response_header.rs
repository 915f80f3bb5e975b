use serde_derive::{Deserialize, Serialize};

use crate::date_time::DateTime;
use crate::status_code::StatusCode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub timestamp: DateTime,
    pub request_handle: u32,
    pub service_result: StatusCode,
}

impl ResponseHeader {
    pub fn new_good(now: DateTime, request_handle: u32) -> Self {
        ResponseHeader { timestamp: now, request_handle, service_result: StatusCode::Good }
    }

    pub fn new_service_result(now: DateTime, request_handle: u32, service_result: StatusCode) -> Self {
        ResponseHeader { timestamp: now, request_handle, service_result }
    }
}
