// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains `NotificationMessage` and the notification data it carries. In the standard
//! the notification data is an array of extension objects; here it is an enum over the
//! two shapes the publish engine produces.

use serde::{Deserialize, Serialize};

use crate::types::{data_value::DataValue, date_time::DateTime, status_code::StatusCode};

/// A single sampled value belonging to a monitored item, keyed by the handle the client
/// assigned to the item when it was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChangeNotification {
    pub monitored_items: Vec<MonitoredItemNotification>,
}

/// Conveys that the status of the subscription itself has changed, e.g. it was closed
/// because its lifetime expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeNotification {
    pub status: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationData {
    DataChange(DataChangeNotification),
    StatusChange(StatusChangeNotification),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub sequence_number: u32,
    pub publish_time: DateTime,
    /// `None` for a keep-alive message
    pub notification_data: Option<Vec<NotificationData>>,
}

impl NotificationMessage {
    /// Create a notification message from data change notifications. Calling this with no
    /// notifications is a programming error.
    pub fn data_change(
        sequence_number: u32,
        publish_time: DateTime,
        monitored_items: Vec<MonitoredItemNotification>,
    ) -> NotificationMessage {
        if monitored_items.is_empty() {
            panic!("No notifications supplied to data_change()");
        }
        let data_change = DataChangeNotification { monitored_items };
        trace!("data change notification = {:?}", data_change);
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![NotificationData::DataChange(data_change)]),
        }
    }

    /// Create a status change notification message
    pub fn status_change(
        sequence_number: u32,
        publish_time: DateTime,
        status: StatusCode,
    ) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![NotificationData::StatusChange(
                StatusChangeNotification { status },
            )]),
        }
    }

    /// Create a keep-alive notification message. The sequence number is a placeholder for
    /// the next message to be sent and is not retained by the subscription.
    pub fn keep_alive(sequence_number: u32, publish_time: DateTime) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: None,
        }
    }

    /// Tests if this is a keep-alive message
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_value::DataValue;

    #[test]
    fn keep_alive_has_no_data() {
        let m = NotificationMessage::keep_alive(12, DateTime::now());
        assert!(m.is_keep_alive());
        assert_eq!(m.sequence_number, 12);
    }

    #[test]
    fn status_change_carries_status() {
        let m = NotificationMessage::status_change(1, DateTime::now(), StatusCode::BadTimeout);
        let Some(data) = &m.notification_data else {
            panic!("Expecting notification data");
        };
        assert_eq!(data.len(), 1);
        let NotificationData::StatusChange(sc) = &data[0] else {
            panic!("Expecting a status change");
        };
        assert_eq!(sc.status, StatusCode::BadTimeout);
    }

    #[test]
    #[should_panic]
    fn data_change_requires_notifications() {
        let _ = NotificationMessage::data_change(1, DateTime::now(), vec![]);
    }

    #[test]
    fn data_change_wraps_items() {
        let m = NotificationMessage::data_change(
            3,
            DateTime::now(),
            vec![MonitoredItemNotification {
                client_handle: 100,
                value: DataValue::new_now(42),
            }],
        );
        assert!(!m.is_keep_alive());
        let Some(data) = &m.notification_data else {
            panic!("Expecting notification data");
        };
        let NotificationData::DataChange(dc) = &data[0] else {
            panic!("Expecting a data change");
        };
        assert_eq!(dc.monitored_items.len(), 1);
        assert_eq!(dc.monitored_items[0].client_handle, 100);
    }
}
