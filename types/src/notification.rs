use serde_derive::{Deserialize, Serialize};

use crate::date_time::DateTime;
use crate::status_code::StatusCode;
use crate::variant::DataValue;

/// One changed value reported by a monitored item (Part 4, 7.21).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

/// A closed subscription's final message (Part 4, 7.20.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeNotification {
    pub status: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationData {
    DataChange(Vec<MonitoredItemNotification>),
    StatusChange(StatusChangeNotification),
}

/// The payload of a `PublishResponse`. An empty `notification_data` is a
/// keep-alive message (spec §4.2: "identical except `notificationData` is
/// empty").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub sequence_number: u32,
    pub publish_time: DateTime,
    pub notification_data: Vec<NotificationData>,
}

impl NotificationMessage {
    pub fn data_change(
        sequence_number: u32,
        publish_time: DateTime,
        notifications: Vec<MonitoredItemNotification>,
    ) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: vec![NotificationData::DataChange(notifications)],
        }
    }

    pub fn status_change(
        sequence_number: u32,
        publish_time: DateTime,
        status: StatusCode,
    ) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: vec![NotificationData::StatusChange(StatusChangeNotification { status })],
        }
    }

    pub fn keep_alive(sequence_number: u32, publish_time: DateTime) -> NotificationMessage {
        NotificationMessage { sequence_number, publish_time, notification_data: Vec::new() }
    }
}
