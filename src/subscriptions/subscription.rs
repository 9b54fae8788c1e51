// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    collections::BTreeMap,
    fmt,
    time::Duration,
};

use serde::Serialize;

use crate::{
    constants,
    core::handle::Handle,
    subscriptions::monitored_item::NotificationSource,
    types::{
        DateTime, DateTimeUtc, MonitoredItemNotification, NotificationMessage, StatusCode,
    },
};

/// The state of the subscription
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum SubscriptionState {
    Closed,
    Creating,
    Normal,
    Late,
    KeepAlive,
}

/// What a subscription wants done after a tick. The subscription itself never touches the
/// publish request queue - the engine owns it and turns the action into queue traffic.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TickAction {
    None,
    /// Consume a publish request and return a notification message
    PublishNotifications,
    /// Consume a publish request and return an empty keep-alive message
    PublishKeepAlive,
    /// The subscription expired; the engine owes the client one final status change
    EnterClosed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TickReason {
    /// A publish request became available while the subscription was waiting for one
    ReceivePublishRequest,
    /// The subscription's publishing interval elapsed
    TickTimerFired,
}

/// A subscription paired to a session. The subscription accumulates notifications from its
/// monitored items and emits them as sequence numbered `NotificationMessage`s whenever the
/// engine can pair it with a publish request.
pub struct Subscription {
    subscription_id: u32,
    /// Publishing interval
    publishing_interval: Duration,
    /// The max lifetime count (not the current lifetime count)
    max_lifetime_count: u32,
    /// Keep alive count enforced
    max_keep_alive_count: u32,
    /// Maximum number of notifications per publish, 0 for no limit
    max_notifications_per_publish: usize,
    /// The parameter that requests publishing to be enabled or disabled
    publishing_enabled: bool,
    /// State of the subscription
    state: SubscriptionState,
    /// A value that contains the number of consecutive publishing timer expirations without
    /// Client activity before the Subscription is terminated.
    lifetime_counter: u32,
    /// Keep alive counter decrements when there are no notifications to publish and when it
    /// expires requests to send an empty notification as a keep alive event
    keep_alive_counter: u32,
    /// Number of publishing intervals that have elapsed since the subscription was created
    publish_interval_count: u64,
    /// The next sequence number to be sent
    sequence_number: Handle,
    /// Notification messages that have been sent but not yet acknowledged, by sequence
    /// number (the retransmission queue)
    sent_notifications: BTreeMap<u32, NotificationMessage>,
    /// Retention cap on `sent_notifications`, 0 for no cap. Oldest entries are dropped
    /// beyond this.
    max_sent_notifications: usize,
    /// Monitored items by item id, harvested in ascending id order
    monitored_items: BTreeMap<u32, Box<dyn NotificationSource>>,
    /// The last monitored item id
    last_monitored_item_id: u32,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscription_id", &self.subscription_id)
            .field("state", &self.state)
            .field("publishing_interval", &self.publishing_interval)
            .field("keep_alive_counter", &self.keep_alive_counter)
            .field("lifetime_counter", &self.lifetime_counter)
            .field("sent_notifications", &self.sent_notifications.len())
            .field("monitored_items", &self.monitored_items.len())
            .finish()
    }
}

impl Subscription {
    /// Creates a subscription from revised values. The keep alive count and lifetime count
    /// are coerced the way the standard requires - a keep alive count of 0 takes the
    /// server default, and the lifetime count is raised to no less than 3 times the keep
    /// alive count, so e.g. a requested lifetime count of 0 with the default keep alive
    /// count of 4 becomes 12.
    pub fn new(
        subscription_id: u32,
        publishing_enabled: bool,
        publishing_interval: Duration,
        lifetime_count: u32,
        keep_alive_count: u32,
        max_notifications_per_publish: usize,
        max_sent_notifications: usize,
    ) -> Subscription {
        assert!(
            publishing_interval > Duration::ZERO,
            "Publishing interval should have been revised to the server's minimum interval"
        );
        let max_keep_alive_count = if keep_alive_count == 0 {
            constants::DEFAULT_KEEP_ALIVE_COUNT
        } else {
            keep_alive_count
        };
        let max_lifetime_count = lifetime_count.max(3 * max_keep_alive_count);
        Subscription {
            subscription_id,
            publishing_interval,
            max_lifetime_count,
            max_keep_alive_count,
            max_notifications_per_publish,
            publishing_enabled,
            // State variables
            state: SubscriptionState::Creating,
            lifetime_counter: max_lifetime_count,
            keep_alive_counter: max_keep_alive_count,
            publish_interval_count: 0,
            sequence_number: Handle::new(1),
            sent_notifications: BTreeMap::new(),
            max_sent_notifications,
            monitored_items: BTreeMap::new(),
            last_monitored_item_id: 0,
        }
    }

    pub fn subscription_id(&self) -> u32 {
        self.subscription_id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn publishing_interval(&self) -> Duration {
        self.publishing_interval
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    pub fn max_keep_alive_count(&self) -> u32 {
        self.max_keep_alive_count
    }

    pub fn max_lifetime_count(&self) -> u32 {
        self.max_lifetime_count
    }

    pub fn max_notifications_per_publish(&self) -> usize {
        self.max_notifications_per_publish
    }

    pub fn keep_alive_counter(&self) -> u32 {
        self.keep_alive_counter
    }

    pub fn lifetime_counter(&self) -> u32 {
        self.lifetime_counter
    }

    /// Number of publishing intervals that have elapsed since creation
    pub fn publish_interval_count(&self) -> u64 {
        self.publish_interval_count
    }

    /// How long the subscription has left before its lifetime expires if no more messages
    /// are sent. Used to order late subscriptions by urgency.
    pub fn time_to_expiration(&self) -> Duration {
        self.publishing_interval * self.lifetime_counter
    }

    pub(crate) fn set_publishing_interval(&mut self, publishing_interval: Duration) {
        assert!(publishing_interval > Duration::ZERO);
        self.publishing_interval = publishing_interval;
        self.reset_lifetime_counter();
    }

    pub(crate) fn set_publishing_enabled(&mut self, publishing_enabled: bool) {
        self.publishing_enabled = publishing_enabled;
        self.reset_lifetime_counter();
    }

    pub(crate) fn set_max_keep_alive_count(&mut self, max_keep_alive_count: u32) {
        assert!(max_keep_alive_count > 0);
        self.max_keep_alive_count = max_keep_alive_count;
        self.reset_keep_alive_counter();
    }

    pub(crate) fn set_max_lifetime_count(&mut self, max_lifetime_count: u32) {
        assert!(max_lifetime_count > 0);
        self.max_lifetime_count = max_lifetime_count;
        self.reset_lifetime_counter();
    }

    pub(crate) fn set_max_sent_notifications(&mut self, max_sent_notifications: usize) {
        self.max_sent_notifications = max_sent_notifications;
    }

    /// Attaches a notification source to the subscription, returning the item id it was
    /// registered under.
    pub fn attach_monitored_item(&mut self, source: Box<dyn NotificationSource>) -> u32 {
        self.last_monitored_item_id += 1;
        let monitored_item_id = self.last_monitored_item_id;
        self.monitored_items.insert(monitored_item_id, source);
        monitored_item_id
    }

    /// Removes the monitored item with the supplied id
    pub fn remove_monitored_item(&mut self, monitored_item_id: u32) -> bool {
        self.monitored_items.remove(&monitored_item_id).is_some()
    }

    pub fn monitored_item_count(&self) -> usize {
        self.monitored_items.len()
    }

    /// Sequence numbers of every message still held for retransmission, ascending
    pub fn available_sequence_numbers(&self) -> Option<Vec<u32>> {
        if self.sent_notifications.is_empty() {
            None
        } else {
            Some(self.sent_notifications.keys().copied().collect())
        }
    }

    /// Looks up a sent notification message by sequence number, for republishing
    pub fn sent_notification(&self, sequence_number: u32) -> Option<&NotificationMessage> {
        self.sent_notifications.get(&sequence_number)
    }

    /// Removes the acknowledged sequence number from the retransmission queue. Returns
    /// `Good` if the message was held, else `BadSequenceNumberUnknown`.
    pub(crate) fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        if self.sent_notifications.remove(&sequence_number).is_some() {
            trace!(
                "Subscription {} ack sequence number {}",
                self.subscription_id,
                sequence_number
            );
            StatusCode::Good
        } else {
            error!(
                "Subscription {} cannot find acknowledged notification with sequence number {}",
                self.subscription_id, sequence_number
            );
            StatusCode::BadSequenceNumberUnknown
        }
    }

    fn notifications_available(&self) -> bool {
        self.monitored_items
            .values()
            .any(|source| source.has_pending_notifications())
    }

    /// Advances the subscription state machine by one event and says what the engine should
    /// do for it. `request_available` reports whether the engine has a publish request that
    /// the subscription could consume.
    pub(crate) fn tick(&mut self, tick_reason: TickReason, request_available: bool) -> TickAction {
        if tick_reason == TickReason::TickTimerFired {
            self.publish_interval_count += 1;
        }
        trace!(
            "Subscription {} tick - reason {:?} / state {:?} / keep alive {} / lifetime {} / request available {}",
            self.subscription_id,
            tick_reason,
            self.state,
            self.keep_alive_counter,
            self.lifetime_counter,
            request_available
        );
        match (self.state, tick_reason) {
            (SubscriptionState::Closed, _) => TickAction::None,
            // A late subscription is served the moment a request arrives, without waiting
            // for the next publishing interval
            (SubscriptionState::Late, TickReason::ReceivePublishRequest) => {
                if self.publishing_enabled && self.notifications_available() {
                    self.reset_lifetime_counter();
                    self.reset_keep_alive_counter();
                    self.state = SubscriptionState::Normal;
                    TickAction::PublishNotifications
                } else {
                    self.reset_lifetime_counter();
                    self.reset_keep_alive_counter();
                    self.state = SubscriptionState::KeepAlive;
                    TickAction::PublishKeepAlive
                }
            }
            (_, TickReason::ReceivePublishRequest) => TickAction::None,
            // The first interval after creation always attempts to send - data if there is
            // any, else a keep alive
            (SubscriptionState::Creating, TickReason::TickTimerFired) => {
                if self.publishing_enabled && self.notifications_available() {
                    if request_available {
                        self.reset_lifetime_counter();
                        self.reset_keep_alive_counter();
                        self.state = SubscriptionState::Normal;
                        TickAction::PublishNotifications
                    } else {
                        self.state = SubscriptionState::Late;
                        TickAction::None
                    }
                } else if request_available {
                    self.reset_lifetime_counter();
                    self.reset_keep_alive_counter();
                    self.state = SubscriptionState::KeepAlive;
                    TickAction::PublishKeepAlive
                } else {
                    self.state = SubscriptionState::Late;
                    TickAction::None
                }
            }
            (
                SubscriptionState::Normal | SubscriptionState::KeepAlive,
                TickReason::TickTimerFired,
            ) => {
                if self.publishing_enabled && self.notifications_available() {
                    if request_available {
                        self.reset_lifetime_counter();
                        self.reset_keep_alive_counter();
                        self.state = SubscriptionState::Normal;
                        TickAction::PublishNotifications
                    } else {
                        self.state = SubscriptionState::Late;
                        TickAction::None
                    }
                } else {
                    self.keep_alive_counter = self.keep_alive_counter.saturating_sub(1);
                    if self.keep_alive_counter > 0 {
                        TickAction::None
                    } else if request_available {
                        self.reset_lifetime_counter();
                        self.reset_keep_alive_counter();
                        self.state = SubscriptionState::KeepAlive;
                        TickAction::PublishKeepAlive
                    } else {
                        self.state = SubscriptionState::Late;
                        TickAction::None
                    }
                }
            }
            // Late and no request in sight. The keep alive counter is frozen; only the
            // lifetime counter runs down.
            (SubscriptionState::Late, TickReason::TickTimerFired) => {
                self.lifetime_counter = self.lifetime_counter.saturating_sub(1);
                if self.lifetime_counter == 0 {
                    info!(
                        "Subscription {} has expired and will be removed shortly",
                        self.subscription_id
                    );
                    self.state = SubscriptionState::Closed;
                    TickAction::EnterClosed
                } else {
                    TickAction::None
                }
            }
        }
    }

    /// Harvests notifications from the monitored items and builds the next sequence
    /// numbered notification message, retaining it for retransmission. The flag reports
    /// whether items still held notifications after the harvest.
    pub(crate) fn publish(&mut self, now: &DateTimeUtc) -> (NotificationMessage, bool) {
        let (notifications, more_notifications) = self.harvest();
        let sequence_number = self.sequence_number.next();
        let message =
            NotificationMessage::data_change(sequence_number, DateTime::from(*now), notifications);
        self.retain_sent_notification(sequence_number, message.clone());
        (message, more_notifications)
    }

    /// Builds a keep alive message. The sequence number quoted is the next one to be sent;
    /// it is not consumed and the message is not retained.
    pub(crate) fn keep_alive_message(&self, now: &DateTimeUtc) -> NotificationMessage {
        NotificationMessage::keep_alive(self.sequence_number.peek(), DateTime::from(*now))
    }

    /// Builds the final status change message for a subscription that expired
    pub(crate) fn status_change_message(&mut self, now: &DateTimeUtc) -> NotificationMessage {
        NotificationMessage::status_change(
            self.sequence_number.next(),
            DateTime::from(*now),
            StatusCode::BadTimeout,
        )
    }

    fn harvest(&mut self) -> (Vec<MonitoredItemNotification>, bool) {
        let max = self.max_notifications_per_publish;
        let mut notifications = Vec::new();
        for source in self.monitored_items.values_mut() {
            if max > 0 && notifications.len() >= max {
                break;
            }
            if !source.has_pending_notifications() {
                continue;
            }
            let limit = if max > 0 { max - notifications.len() } else { 0 };
            let (mut batch, _) = source.harvest_notifications(limit);
            notifications.append(&mut batch);
        }
        let more_notifications = self.notifications_available();
        (notifications, more_notifications)
    }

    fn retain_sent_notification(&mut self, sequence_number: u32, message: NotificationMessage) {
        while self.max_sent_notifications > 0
            && self.sent_notifications.len() >= self.max_sent_notifications
        {
            let Some((dropped, _)) = self.sent_notifications.pop_first() else {
                break;
            };
            warn!(
                "Subscription {} dropped unacknowledged notification {} - retransmission queue is full",
                self.subscription_id, dropped
            );
        }
        self.sent_notifications.insert(sequence_number, message);
    }

    /// Reset the keep-alive counter to the maximum keep-alive count of the Subscription.
    /// The maximum keep-alive count is set by the Client when the Subscription is created
    /// and may be modified using the ModifySubscription Service
    fn reset_keep_alive_counter(&mut self) {
        self.keep_alive_counter = self.max_keep_alive_count;
    }

    /// Reset the lifetime counter to the value specified for the life time of the
    /// subscription in the create subscription service
    fn reset_lifetime_counter(&mut self) {
        self.lifetime_counter = self.max_lifetime_count;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::{Subscription, SubscriptionState, TickAction, TickReason};
    use crate::{
        subscriptions::monitored_item::MonitoredItem,
        types::{DataValue, NotificationData, StatusCode, Variant},
    };

    const LIFETIME_COUNT: u32 = 300;
    const KEEP_ALIVE_COUNT: u32 = 100;

    fn make_subscription(state: SubscriptionState) -> Subscription {
        let mut subscription = Subscription::new(
            1,
            true,
            Duration::from_millis(1000),
            LIFETIME_COUNT,
            KEEP_ALIVE_COUNT,
            0,
            1024,
        );
        subscription.state = state;
        subscription
    }

    fn add_item_with_value(subscription: &mut Subscription, value: i32) -> u32 {
        let mut item = MonitoredItem::new(10, 5);
        item.notify_data_value(DataValue::new_now(value));
        subscription.attach_monitored_item(Box::new(item))
    }

    #[test]
    fn new_subscription_is_creating() {
        let s = make_subscription(SubscriptionState::Creating);
        assert_eq!(s.state(), SubscriptionState::Creating);
        assert_eq!(s.keep_alive_counter(), KEEP_ALIVE_COUNT);
        assert_eq!(s.lifetime_counter(), LIFETIME_COUNT);
    }

    #[test]
    fn lifetime_count_is_coerced_upward() {
        // A lifetime count below 3x the keep alive count is raised to it
        let s = Subscription::new(1, true, Duration::from_millis(1000), 10, 20, 0, 1024);
        assert_eq!(s.lifetime_counter(), 60);
        // A zero keep alive count takes the default of 4, so lifetime 0 becomes 12
        let s = Subscription::new(1, true, Duration::from_millis(1000), 0, 0, 0, 1024);
        assert_eq!(s.keep_alive_counter(), 4);
        assert_eq!(s.lifetime_counter(), 12);
    }

    #[test]
    fn first_tick_with_data_and_request_publishes() {
        let mut s = make_subscription(SubscriptionState::Creating);
        add_item_with_value(&mut s, 123);
        let action = s.tick(TickReason::TickTimerFired, true);
        assert_eq!(action, TickAction::PublishNotifications);
        assert_eq!(s.state(), SubscriptionState::Normal);
    }

    #[test]
    fn first_tick_without_data_sends_keep_alive() {
        let mut s = make_subscription(SubscriptionState::Creating);
        let action = s.tick(TickReason::TickTimerFired, true);
        assert_eq!(action, TickAction::PublishKeepAlive);
        assert_eq!(s.state(), SubscriptionState::KeepAlive);
    }

    #[test]
    fn first_tick_without_request_goes_late() {
        let mut s = make_subscription(SubscriptionState::Creating);
        let action = s.tick(TickReason::TickTimerFired, false);
        assert_eq!(action, TickAction::None);
        assert_eq!(s.state(), SubscriptionState::Late);
    }

    #[test]
    fn normal_with_data_and_request_publishes() {
        let mut s = make_subscription(SubscriptionState::Normal);
        add_item_with_value(&mut s, 1);
        s.lifetime_counter = 3;
        let action = s.tick(TickReason::TickTimerFired, true);
        assert_eq!(action, TickAction::PublishNotifications);
        assert_eq!(s.state(), SubscriptionState::Normal);
        // Publishing resets both counters
        assert_eq!(s.lifetime_counter(), LIFETIME_COUNT);
        assert_eq!(s.keep_alive_counter(), KEEP_ALIVE_COUNT);
    }

    #[test]
    fn normal_with_data_and_no_request_goes_late() {
        let mut s = make_subscription(SubscriptionState::Normal);
        add_item_with_value(&mut s, 1);
        let action = s.tick(TickReason::TickTimerFired, false);
        assert_eq!(action, TickAction::None);
        assert_eq!(s.state(), SubscriptionState::Late);
    }

    #[test]
    fn keep_alive_counter_runs_down_to_a_keep_alive() {
        let mut s = make_subscription(SubscriptionState::KeepAlive);
        for i in 0..KEEP_ALIVE_COUNT - 1 {
            let action = s.tick(TickReason::TickTimerFired, true);
            assert_eq!(action, TickAction::None);
            assert_eq!(s.keep_alive_counter(), KEEP_ALIVE_COUNT - i - 1);
        }
        let action = s.tick(TickReason::TickTimerFired, true);
        assert_eq!(action, TickAction::PublishKeepAlive);
        assert_eq!(s.state(), SubscriptionState::KeepAlive);
        assert_eq!(s.keep_alive_counter(), KEEP_ALIVE_COUNT);
    }

    #[test]
    fn keep_alive_due_without_request_goes_late() {
        let mut s = make_subscription(SubscriptionState::KeepAlive);
        s.keep_alive_counter = 1;
        let action = s.tick(TickReason::TickTimerFired, false);
        assert_eq!(action, TickAction::None);
        assert_eq!(s.state(), SubscriptionState::Late);
    }

    #[test]
    fn late_tick_only_runs_down_lifetime() {
        let mut s = make_subscription(SubscriptionState::Late);
        s.keep_alive_counter = 5;
        let action = s.tick(TickReason::TickTimerFired, false);
        assert_eq!(action, TickAction::None);
        assert_eq!(s.state(), SubscriptionState::Late);
        assert_eq!(s.keep_alive_counter(), 5);
        assert_eq!(s.lifetime_counter(), LIFETIME_COUNT - 1);
    }

    #[test]
    fn late_with_request_is_served_immediately() {
        let mut s = make_subscription(SubscriptionState::Late);
        add_item_with_value(&mut s, 1);
        s.lifetime_counter = 3;
        let action = s.tick(TickReason::ReceivePublishRequest, true);
        assert_eq!(action, TickAction::PublishNotifications);
        assert_eq!(s.state(), SubscriptionState::Normal);
        assert_eq!(s.lifetime_counter(), LIFETIME_COUNT);
    }

    #[test]
    fn late_with_request_and_no_data_sends_keep_alive() {
        let mut s = make_subscription(SubscriptionState::Late);
        let action = s.tick(TickReason::ReceivePublishRequest, true);
        assert_eq!(action, TickAction::PublishKeepAlive);
        assert_eq!(s.state(), SubscriptionState::KeepAlive);
    }

    #[test]
    fn lifetime_expiry_closes_the_subscription() {
        let mut s = make_subscription(SubscriptionState::Late);
        s.lifetime_counter = 1;
        let action = s.tick(TickReason::TickTimerFired, false);
        assert_eq!(action, TickAction::EnterClosed);
        assert_eq!(s.state(), SubscriptionState::Closed);
        // Closed is terminal, no further tick changes it
        for _ in 0..3 {
            let action = s.tick(TickReason::TickTimerFired, true);
            assert_eq!(action, TickAction::None);
            assert_eq!(s.state(), SubscriptionState::Closed);
        }
    }

    #[test]
    fn publishing_disabled_still_sends_keep_alives() {
        let mut s = Subscription::new(
            1,
            false,
            Duration::from_millis(1000),
            LIFETIME_COUNT,
            2,
            0,
            1024,
        );
        s.state = SubscriptionState::Normal;
        add_item_with_value(&mut s, 1);
        // Data is pending but publishing is disabled - the keep alive path runs instead
        let action = s.tick(TickReason::TickTimerFired, true);
        assert_eq!(action, TickAction::None);
        assert_eq!(s.keep_alive_counter(), 1);
        let action = s.tick(TickReason::TickTimerFired, true);
        assert_eq!(action, TickAction::PublishKeepAlive);
    }

    #[test]
    fn publish_assigns_sequence_numbers_and_retains() {
        let now = Utc::now();
        let mut s = make_subscription(SubscriptionState::Normal);
        add_item_with_value(&mut s, 1);

        let (message, more) = s.publish(&now);
        assert_eq!(message.sequence_number, 1);
        assert!(!more);
        assert_eq!(s.available_sequence_numbers(), Some(vec![1]));

        // The retransmission queue grows until something is acknowledged
        add_item_with_value(&mut s, 2);
        let (message, _) = s.publish(&now);
        assert_eq!(message.sequence_number, 2);
        assert_eq!(s.available_sequence_numbers(), Some(vec![1, 2]));
    }

    #[test]
    fn keep_alive_message_does_not_consume_a_sequence_number() {
        let now = Utc::now();
        let mut s = make_subscription(SubscriptionState::Normal);
        let message = s.keep_alive_message(&now);
        assert_eq!(message.sequence_number, 1);
        assert!(message.is_keep_alive());
        assert_eq!(s.available_sequence_numbers(), None);

        add_item_with_value(&mut s, 1);
        let (message, _) = s.publish(&now);
        assert_eq!(message.sequence_number, 1);
    }

    #[test]
    fn acknowledge_removes_known_sequence_numbers() {
        let now = Utc::now();
        let mut s = make_subscription(SubscriptionState::Normal);
        for i in 0..3 {
            add_item_with_value(&mut s, i);
            let _ = s.publish(&now);
        }
        assert_eq!(s.available_sequence_numbers(), Some(vec![1, 2, 3]));

        assert_eq!(s.acknowledge(2), StatusCode::Good);
        assert_eq!(s.available_sequence_numbers(), Some(vec![1, 3]));

        // Unknown sequence numbers leave the queue untouched
        assert_eq!(s.acknowledge(2), StatusCode::BadSequenceNumberUnknown);
        assert_eq!(s.acknowledge(99), StatusCode::BadSequenceNumberUnknown);
        assert_eq!(s.available_sequence_numbers(), Some(vec![1, 3]));
    }

    #[test]
    fn retention_cap_drops_oldest() {
        let now = Utc::now();
        let mut s = Subscription::new(
            1,
            true,
            Duration::from_millis(1000),
            LIFETIME_COUNT,
            KEEP_ALIVE_COUNT,
            0,
            2,
        );
        s.state = SubscriptionState::Normal;
        for i in 0..3 {
            add_item_with_value(&mut s, i);
            let _ = s.publish(&now);
        }
        assert_eq!(s.available_sequence_numbers(), Some(vec![2, 3]));
    }

    #[test]
    fn harvest_honours_max_notifications_per_publish() {
        let now = Utc::now();
        let mut s = Subscription::new(
            1,
            true,
            Duration::from_millis(1000),
            LIFETIME_COUNT,
            KEEP_ALIVE_COUNT,
            2,
            1024,
        );
        s.state = SubscriptionState::Normal;
        let mut item = MonitoredItem::new(10, 5);
        for i in 0..3 {
            item.notify_data_value(DataValue::new_now(i));
        }
        s.attach_monitored_item(Box::new(item));

        let (message, more) = s.publish(&now);
        assert!(more);
        let Some(data) = &message.notification_data else {
            panic!("Expecting notification data");
        };
        let NotificationData::DataChange(dc) = &data[0] else {
            panic!("Expecting a data change");
        };
        assert_eq!(dc.monitored_items.len(), 2);
        assert_eq!(dc.monitored_items[0].value.value, Some(Variant::Int32(0)));

        let (message, more) = s.publish(&now);
        assert!(!more);
        let Some(data) = &message.notification_data else {
            panic!("Expecting notification data");
        };
        let NotificationData::DataChange(dc) = &data[0] else {
            panic!("Expecting a data change");
        };
        assert_eq!(dc.monitored_items.len(), 1);
    }

    #[test]
    fn time_to_expiration_tracks_lifetime() {
        let mut s = make_subscription(SubscriptionState::Late);
        assert_eq!(
            s.time_to_expiration(),
            Duration::from_millis(1000) * LIFETIME_COUNT
        );
        let _ = s.tick(TickReason::TickTimerFired, false);
        assert_eq!(
            s.time_to_expiration(),
            Duration::from_millis(1000) * (LIFETIME_COUNT - 1)
        );
    }
}
