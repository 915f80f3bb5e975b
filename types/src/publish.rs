use serde_derive::{Deserialize, Serialize};

use crate::notification::NotificationMessage;
use crate::request_header::RequestHeader;
use crate::response_header::ResponseHeader;
use crate::status_code::StatusCode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionAcknowledgement {
    pub subscription_id: u32,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub request_header: RequestHeader,
    pub subscription_acknowledgements: Vec<SubscriptionAcknowledgement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub response_header: ResponseHeader,
    pub subscription_id: u32,
    pub available_sequence_numbers: Vec<u32>,
    pub more_notifications: bool,
    pub notification_message: NotificationMessage,
    pub results: Vec<StatusCode>,
}

/// A bare response header, sent when the Publish service cannot answer with
/// a `PublishResponse` at all (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}

impl ServiceFault {
    pub fn new(now: crate::date_time::DateTime, request_handle: u32, service_result: StatusCode) -> Self {
        ServiceFault {
            response_header: ResponseHeader::new_service_result(now, request_handle, service_result),
        }
    }
}
