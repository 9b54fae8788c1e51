// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the contract between a subscription and its monitored items. Item evaluation -
//! sampling, filtering, deadbands - happens outside the publish engine; the engine only
//! polls items for pending notifications when a subscription is about to publish.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use crate::types::{DataValue, MonitoredItemNotification};

/// A source of notifications attached to a subscription. The subscription polls the source
/// on each publishing interval and harvests from it when it publishes.
pub trait NotificationSource {
    /// Tests if the source holds notifications that have not been harvested yet
    fn has_pending_notifications(&self) -> bool;

    /// Removes and returns up to `max` notifications, oldest first. A `max` of 0 means no
    /// limit. The flag reports whether notifications are still pending after the harvest.
    fn harvest_notifications(&mut self, max: usize) -> (Vec<MonitoredItemNotification>, bool);
}

/// A monitored item holding a bounded queue of sampled values. The owner of the item
/// pushes values in with [`notify_data_value`](MonitoredItem::notify_data_value); the
/// subscription drains them through the [`NotificationSource`] contract.
#[derive(Debug, Clone)]
pub struct MonitoredItem {
    /// The handle the client assigned to this item, quoted back in every notification
    client_handle: u32,
    /// Maximum number of queued values, 0 for no limit
    queue_size: usize,
    values: VecDeque<DataValue>,
}

impl MonitoredItem {
    pub fn new(client_handle: u32, queue_size: usize) -> MonitoredItem {
        MonitoredItem {
            client_handle,
            queue_size,
            values: VecDeque::new(),
        }
    }

    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// Queues a sampled value on the item. When the queue is full the oldest value is
    /// discarded to make room.
    pub fn notify_data_value(&mut self, value: DataValue) {
        if self.queue_size > 0 && self.values.len() >= self.queue_size {
            debug!(
                "Monitored item with client handle {} dropped its oldest value, queue is full",
                self.client_handle
            );
            self.values.pop_front();
        }
        self.values.push_back(value);
    }
}

impl NotificationSource for MonitoredItem {
    fn has_pending_notifications(&self) -> bool {
        !self.values.is_empty()
    }

    fn harvest_notifications(&mut self, max: usize) -> (Vec<MonitoredItemNotification>, bool) {
        let take = if max == 0 || max > self.values.len() {
            self.values.len()
        } else {
            max
        };
        let notifications = self
            .values
            .drain(..take)
            .map(|value| MonitoredItemNotification {
                client_handle: self.client_handle,
                value,
            })
            .collect();
        (notifications, !self.values.is_empty())
    }
}

// The engine is single threaded, so a shared handle to an item is an `Rc<RefCell<_>>`.
// This lets the host keep pushing values into an item it has already attached.
impl NotificationSource for Rc<RefCell<MonitoredItem>> {
    fn has_pending_notifications(&self) -> bool {
        self.borrow().has_pending_notifications()
    }

    fn harvest_notifications(&mut self, max: usize) -> (Vec<MonitoredItemNotification>, bool) {
        self.borrow_mut().harvest_notifications(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harvest_in_arrival_order() {
        let mut item = MonitoredItem::new(7, 10);
        item.notify_data_value(DataValue::new_now(1));
        item.notify_data_value(DataValue::new_now(2));
        assert!(item.has_pending_notifications());

        let (notifications, more) = item.harvest_notifications(0);
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].client_handle, 7);
        assert_eq!(
            notifications[0].value.value,
            Some(crate::types::Variant::Int32(1))
        );
        assert_eq!(
            notifications[1].value.value,
            Some(crate::types::Variant::Int32(2))
        );
        assert!(!more);
        assert!(!item.has_pending_notifications());
    }

    #[test]
    fn harvest_respects_max() {
        let mut item = MonitoredItem::new(1, 10);
        for i in 0..5 {
            item.notify_data_value(DataValue::new_now(i));
        }
        let (notifications, more) = item.harvest_notifications(3);
        assert_eq!(notifications.len(), 3);
        assert!(more);
        let (notifications, more) = item.harvest_notifications(3);
        assert_eq!(notifications.len(), 2);
        assert!(!more);
    }

    #[test]
    fn full_queue_discards_oldest() {
        let mut item = MonitoredItem::new(1, 2);
        item.notify_data_value(DataValue::new_now(1));
        item.notify_data_value(DataValue::new_now(2));
        item.notify_data_value(DataValue::new_now(3));
        let (notifications, _) = item.harvest_notifications(0);
        assert_eq!(notifications.len(), 2);
        assert_eq!(
            notifications[0].value.value,
            Some(crate::types::Variant::Int32(2))
        );
    }
}
