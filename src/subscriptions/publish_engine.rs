// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the publish engine. The engine owns the subscriptions of a session together
//! with the publish request queue, and decides which subscription serves the next response.
//! The transport layer pushes decoded requests in through [`PublishEngine::on_publish_request`]
//! and drains responses out through [`PublishEngine::take_publish_responses`]; a timer
//! drives [`PublishEngine::tick`].

use std::{
    collections::{BTreeMap, VecDeque},
    time::Instant,
};

use serde::Serialize;

use crate::{
    clock::TickSchedule,
    config::PublishEngineConfig,
    subscriptions::{
        duration_from_ms,
        subscription::{Subscription, SubscriptionState, TickAction, TickReason},
        PublishRequestEntry, PublishResponseEntry,
    },
    types::{
        DateTime, DateTimeUtc, NotificationMessage, PublishRequest, PublishResponse,
        ResponseHeader, ServiceFault, StatusCode, SupportedMessage,
    },
};

/// A subscription that expired or was terminated. The engine holds onto it until one more
/// publish request has been consumed to carry the final status change to the client.
struct ClosedSubscription {
    subscription_id: u32,
    status_change: NotificationMessage,
    available_sequence_numbers: Option<Vec<u32>>,
}

/// Point in time counters for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionMetrics {
    pub subscription_id: u32,
    pub state: SubscriptionState,
    pub publishing_interval_ms: f64,
    pub keep_alive_counter: u32,
    pub lifetime_counter: u32,
    pub sent_notifications: usize,
    pub monitored_items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub subscriptions: Vec<SubscriptionMetrics>,
    pub publish_request_queue_len: usize,
    pub publish_response_queue_len: usize,
    pub pending_closed_subscriptions: usize,
}

pub struct PublishEngine {
    config: PublishEngineConfig,
    /// Subscriptions associated with the session
    subscriptions: BTreeMap<u32, Subscription>,
    /// The publish request queue (requests by the client on the session), oldest at the front
    publish_request_queue: VecDeque<PublishRequestEntry>,
    /// The publish response queue arranged oldest to latest
    publish_response_queue: VecDeque<PublishResponseEntry>,
    /// Closed subscriptions awaiting delivery of their final status change
    pending_closed_subscriptions: VecDeque<ClosedSubscription>,
    /// One shared schedule of pending subscription ticks
    schedule: TickSchedule,
}

impl PublishEngine {
    pub fn new(config: PublishEngineConfig) -> PublishEngine {
        assert!(
            config.max_publish_requests_in_queue > 0,
            "Max publish requests in queue must be positive"
        );
        PublishEngine {
            subscriptions: BTreeMap::new(),
            publish_request_queue: VecDeque::with_capacity(config.max_publish_requests_in_queue),
            publish_response_queue: VecDeque::new(),
            pending_closed_subscriptions: VecDeque::new(),
            schedule: TickSchedule::new(),
            config,
        }
    }

    pub fn config(&self) -> &PublishEngineConfig {
        &self.config
    }

    /// Attaches a freshly created subscription to the engine and schedules its first tick
    /// one publishing interval from now. The publishing interval, keep alive count,
    /// lifetime count and retention cap are all revised to the server's configured limits.
    /// Attaching a subscription whose id is already in use is a programming error.
    pub fn add_subscription(&mut self, mut subscription: Subscription, now_instant: Instant) {
        let subscription_id = subscription.subscription_id();
        assert!(
            !self.subscriptions.contains_key(&subscription_id),
            "Subscription {} is already registered with the engine",
            subscription_id
        );
        assert_eq!(
            subscription.state(),
            SubscriptionState::Creating,
            "Subscription {} should not have been ticked before it is added",
            subscription_id
        );
        debug_assert!(!self.schedule.contains(subscription_id));
        let requested_interval_ms = subscription.publishing_interval().as_secs_f64() * 1000.0;
        let revised_interval_ms = self.config.revise_publishing_interval(requested_interval_ms);
        if revised_interval_ms != requested_interval_ms {
            debug!(
                "Subscription {} publishing interval revised from {}ms to {}ms",
                subscription_id, requested_interval_ms, revised_interval_ms
            );
            subscription.set_publishing_interval(duration_from_ms(revised_interval_ms));
        }
        let revised_keep_alive_count = self
            .config
            .revise_keep_alive_count(subscription.max_keep_alive_count());
        if revised_keep_alive_count != subscription.max_keep_alive_count() {
            debug!(
                "Subscription {} keep alive count revised from {} to {}",
                subscription_id,
                subscription.max_keep_alive_count(),
                revised_keep_alive_count
            );
            subscription.set_max_keep_alive_count(revised_keep_alive_count);
        }
        let revised_lifetime_count = self
            .config
            .revise_lifetime_count(subscription.max_lifetime_count(), revised_keep_alive_count);
        if revised_lifetime_count != subscription.max_lifetime_count() {
            debug!(
                "Subscription {} lifetime count revised from {} to {}",
                subscription_id,
                subscription.max_lifetime_count(),
                revised_lifetime_count
            );
            subscription.set_max_lifetime_count(revised_lifetime_count);
        }
        subscription.set_max_sent_notifications(self.config.resolve_max_sent_notifications(
            subscription.max_notifications_per_publish(),
            revised_keep_alive_count,
        ));
        self.schedule
            .schedule(subscription_id, now_instant + subscription.publishing_interval());
        self.subscriptions.insert(subscription_id, subscription);
    }

    /// Detaches and returns a subscription without any status change delivery
    pub fn remove_subscription(&mut self, subscription_id: u32) -> Option<Subscription> {
        self.schedule.cancel(subscription_id);
        self.pending_closed_subscriptions
            .retain(|closed| closed.subscription_id != subscription_id);
        self.subscriptions.remove(&subscription_id)
    }

    pub fn get(&self, subscription_id: u32) -> Option<&Subscription> {
        self.subscriptions.get(&subscription_id)
    }

    pub fn get_mut(&mut self, subscription_id: u32) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&subscription_id)
    }

    pub fn contains(&self, subscription_id: u32) -> bool {
        self.subscriptions.contains_key(&subscription_id)
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns the number of live subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn pending_publish_request_count(&self) -> usize {
        self.publish_request_queue.len()
    }

    pub fn pending_closed_subscription_count(&self) -> usize {
        self.pending_closed_subscriptions.len()
    }

    /// Ids of every late subscription, most urgent first - ascending time to expiration,
    /// ties broken by the smaller id.
    pub fn find_late_subscriptions_sorted_by_age(&self) -> Vec<u32> {
        let mut late: Vec<_> = self
            .subscriptions
            .values()
            .filter(|subscription| subscription.state() == SubscriptionState::Late)
            .map(|subscription| (subscription.time_to_expiration(), subscription.subscription_id()))
            .collect();
        late.sort();
        late.into_iter().map(|(_, id)| id).collect()
    }

    /// The only entry point for client publish requests. Never fails - every outcome is a
    /// response on the outgoing queue, either now or when a subscription consumes the
    /// request later.
    pub fn on_publish_request(
        &mut self,
        now: &DateTimeUtc,
        now_instant: Instant,
        request_id: u32,
        request: PublishRequest,
    ) {
        // A request with nothing to serve it fails straight away
        if self.subscriptions.is_empty() && self.pending_closed_subscriptions.is_empty() {
            debug!(
                "Publish request {} rejected, there are no subscriptions",
                request.request_header.request_handle
            );
            let fault = ServiceFault::new(&request.request_header, StatusCode::BadNoSubscription);
            self.send_response(request_id, fault.into());
            return;
        }

        // A full queue displaces the oldest request to make room for the new one
        if self.publish_request_queue.len() >= self.config.max_publish_requests_in_queue {
            let displaced = self.publish_request_queue.pop_front().unwrap();
            error!(
                "Too many publish requests for capacity {}, displacing request {}",
                self.config.max_publish_requests_in_queue,
                displaced.request.request_header.request_handle
            );
            let fault = ServiceFault::new(
                &displaced.request.request_header,
                StatusCode::BadTooManyPublishRequests,
            );
            self.send_response(displaced.request_id, fault.into());
        }

        self.publish_request_queue.push_back(PublishRequestEntry {
            request_id,
            request,
            arrival_time: now_instant,
        });

        self.serve_late_subscriptions(now);
    }

    /// Drives the engine forward to `now`. Expires stale requests, then replays every
    /// elapsed publishing interval of every subscription in deadline order.
    pub fn tick(&mut self, now: &DateTimeUtc, now_instant: Instant) {
        self.expire_stale_publish_requests(now_instant);

        while let Some((subscription_id, due)) = self.schedule.pop_due(now_instant) {
            let request_available = !self.publish_request_queue.is_empty();
            let (interval, action) = {
                let Some(subscription) = self.subscriptions.get_mut(&subscription_id) else {
                    continue;
                };
                (
                    subscription.publishing_interval(),
                    subscription.tick(TickReason::TickTimerFired, request_available),
                )
            };
            match action {
                TickAction::None => {}
                TickAction::PublishNotifications => {
                    self.send_notifications_response(subscription_id, now);
                }
                TickAction::PublishKeepAlive => {
                    let _ = self.send_keep_alive_response(subscription_id, now);
                }
                TickAction::EnterClosed => {
                    self.close_subscription(subscription_id, now);
                    continue;
                }
            }
            self.schedule.schedule(subscription_id, due + interval);
        }

        self.serve_late_subscriptions(now);
    }

    /// Takes the publish responses which are queued for the client and returns them to the
    /// caller, or returns None if there are none to process.
    pub fn take_publish_responses(&mut self) -> Option<VecDeque<PublishResponseEntry>> {
        if self.publish_response_queue.is_empty() {
            None
        } else {
            let mut publish_responses = VecDeque::with_capacity(self.publish_response_queue.len());
            publish_responses.append(&mut self.publish_response_queue);
            Some(publish_responses)
        }
    }

    /// Pops a publish request and answers it with an empty keep alive for the supplied
    /// subscription. Returns false if the subscription does not exist or no request was
    /// queued.
    pub fn send_keep_alive_response(&mut self, subscription_id: u32, now: &DateTimeUtc) -> bool {
        if !self.subscriptions.contains_key(&subscription_id) {
            return false;
        }
        let Some(entry) = self.publish_request_queue.pop_front() else {
            return false;
        };
        let results = self.process_acknowledgements(&entry.request);
        let subscription = self.subscriptions.get(&subscription_id).unwrap();
        let notification_message = subscription.keep_alive_message(now);
        let available_sequence_numbers = subscription.available_sequence_numbers();
        let response = PublishResponse {
            response_header: ResponseHeader::new_timestamped_service_result(
                DateTime::from(*now),
                &entry.request.request_header,
                StatusCode::Good,
            ),
            subscription_id,
            available_sequence_numbers,
            more_notifications: false,
            notification_message,
            results,
            diagnostic_infos: None,
        };
        self.send_response(entry.request_id, response.into());
        true
    }

    /// Immediately closes a subscription and queues its final `BadTimeout` status change
    /// for delivery on the next available publish request.
    pub fn terminate_subscription(
        &mut self,
        subscription_id: u32,
        now: &DateTimeUtc,
    ) -> Result<(), StatusCode> {
        if !self.subscriptions.contains_key(&subscription_id) {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        }
        self.close_subscription(subscription_id, now);
        self.serve_late_subscriptions(now);
        Ok(())
    }

    /// Revises and applies a new publishing interval, re-installing the subscription's
    /// schedule relative to now. Returns the revised interval in millis.
    pub fn set_publishing_interval(
        &mut self,
        subscription_id: u32,
        publishing_interval_ms: f64,
        now_instant: Instant,
    ) -> Result<f64, StatusCode> {
        let revised_interval_ms = self.config.revise_publishing_interval(publishing_interval_ms);
        let Some(subscription) = self.subscriptions.get_mut(&subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        let interval = duration_from_ms(revised_interval_ms);
        subscription.set_publishing_interval(interval);
        // The old schedule entry is superseded, not fired
        self.schedule.schedule(subscription_id, now_instant + interval);
        Ok(revised_interval_ms)
    }

    pub fn set_publishing_enabled(
        &mut self,
        subscription_id: u32,
        publishing_enabled: bool,
    ) -> Result<(), StatusCode> {
        let Some(subscription) = self.subscriptions.get_mut(&subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        subscription.set_publishing_enabled(publishing_enabled);
        Ok(())
    }

    /// Finds a notification message in a subscription's retransmission queue matching the
    /// supplied sequence number, for the Republish service. Returns
    /// `BadSubscriptionIdInvalid` or `BadMessageNotAvailable` if there is no match.
    pub fn find_notification_message(
        &self,
        subscription_id: u32,
        sequence_number: u32,
    ) -> Result<NotificationMessage, StatusCode> {
        let Some(subscription) = self.subscriptions.get(&subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        subscription
            .sent_notification(sequence_number)
            .cloned()
            .ok_or(StatusCode::BadMessageNotAvailable)
    }

    /// Cancels all schedules and answers every queued request with `BadSessionClosed`
    pub fn shutdown(&mut self) {
        info!(
            "Publish engine is shutting down, failing {} queued publish requests",
            self.publish_request_queue.len()
        );
        self.schedule.clear();
        self.subscriptions.clear();
        self.pending_closed_subscriptions.clear();
        while let Some(entry) = self.publish_request_queue.pop_front() {
            let fault =
                ServiceFault::new(&entry.request.request_header, StatusCode::BadSessionClosed);
            self.send_response(entry.request_id, fault.into());
        }
    }

    pub fn metrics(&self) -> Metrics {
        let subscriptions = self
            .subscriptions
            .values()
            .map(|subscription| SubscriptionMetrics {
                subscription_id: subscription.subscription_id(),
                state: subscription.state(),
                publishing_interval_ms: subscription.publishing_interval().as_secs_f64() * 1000.0,
                keep_alive_counter: subscription.keep_alive_counter(),
                lifetime_counter: subscription.lifetime_counter(),
                sent_notifications: subscription
                    .available_sequence_numbers()
                    .map_or(0, |s| s.len()),
                monitored_items: subscription.monitored_item_count(),
            })
            .collect();
        Metrics {
            subscriptions,
            publish_request_queue_len: self.publish_request_queue.len(),
            publish_response_queue_len: self.publish_response_queue.len(),
            pending_closed_subscriptions: self.pending_closed_subscriptions.len(),
        }
    }

    /// Serves queued requests to whoever needs one right now. Closed subscriptions owed a
    /// status change go first, then late subscriptions in urgency order. Runs until the
    /// queue is empty or nobody is waiting.
    fn serve_late_subscriptions(&mut self, now: &DateTimeUtc) {
        loop {
            if self.publish_request_queue.is_empty() {
                break;
            }
            if let Some(closed) = self.pending_closed_subscriptions.pop_front() {
                let entry = self.publish_request_queue.pop_front().unwrap();
                let results = self.process_acknowledgements(&entry.request);
                debug!(
                    "Subscription {} status change delivered on request {}",
                    closed.subscription_id, entry.request.request_header.request_handle
                );
                let response = PublishResponse {
                    response_header: ResponseHeader::new_timestamped_service_result(
                        DateTime::from(*now),
                        &entry.request.request_header,
                        StatusCode::Good,
                    ),
                    subscription_id: closed.subscription_id,
                    available_sequence_numbers: closed.available_sequence_numbers,
                    more_notifications: false,
                    notification_message: closed.status_change,
                    results,
                    diagnostic_infos: None,
                };
                self.send_response(entry.request_id, response.into());
                continue;
            }
            let Some(subscription_id) =
                self.find_late_subscriptions_sorted_by_age().first().copied()
            else {
                break;
            };
            let action = self
                .subscriptions
                .get_mut(&subscription_id)
                .unwrap()
                .tick(TickReason::ReceivePublishRequest, true);
            match action {
                TickAction::PublishNotifications => {
                    self.send_notifications_response(subscription_id, now)
                }
                TickAction::PublishKeepAlive => {
                    let _ = self.send_keep_alive_response(subscription_id, now);
                }
                // A late subscription asked for a request must consume one
                TickAction::None | TickAction::EnterClosed => break,
            }
        }
    }

    /// Consumes the oldest request and answers it with the subscription's next
    /// notification message.
    fn send_notifications_response(&mut self, subscription_id: u32, now: &DateTimeUtc) {
        let entry = self.publish_request_queue.pop_front().unwrap();
        let results = self.process_acknowledgements(&entry.request);
        let subscription = self.subscriptions.get_mut(&subscription_id).unwrap();
        let (notification_message, more_notifications) = subscription.publish(now);
        let available_sequence_numbers = subscription.available_sequence_numbers();
        let response = PublishResponse {
            response_header: ResponseHeader::new_timestamped_service_result(
                DateTime::from(*now),
                &entry.request.request_header,
                StatusCode::Good,
            ),
            subscription_id,
            available_sequence_numbers,
            more_notifications,
            notification_message,
            results,
            diagnostic_infos: None,
        };
        self.send_response(entry.request_id, response.into());
    }

    /// Moves a subscription onto the pending closed list, detaching its schedule. The
    /// final status change is built now so the subscription itself can be dropped.
    fn close_subscription(&mut self, subscription_id: u32, now: &DateTimeUtc) {
        self.schedule.cancel(subscription_id);
        let Some(mut subscription) = self.subscriptions.remove(&subscription_id) else {
            return;
        };
        let available_sequence_numbers = subscription.available_sequence_numbers();
        let status_change = subscription.status_change_message(now);
        self.pending_closed_subscriptions.push_back(ClosedSubscription {
            subscription_id,
            status_change,
            available_sequence_numbers,
        });
    }

    /// Iterates through the existing queued publish requests and creates a timeout
    /// response for any that outlived their timeout hint.
    fn expire_stale_publish_requests(&mut self, now_instant: Instant) {
        let mut idx = 0;
        while idx < self.publish_request_queue.len() {
            if self.publish_request_queue[idx].is_expired(now_instant) {
                let entry = self.publish_request_queue.remove(idx).unwrap();
                debug!(
                    "Publish request {} has expired - timeout hint = {}",
                    entry.request.request_header.request_handle,
                    entry.request.request_header.timeout_hint
                );
                let fault =
                    ServiceFault::new(&entry.request.request_header, StatusCode::BadTimeout);
                self.send_response(entry.request_id, fault.into());
            } else {
                idx += 1;
            }
        }
    }

    /// Deletes the acknowledged notifications, returning a list of status code for each
    /// according to whether it was found or not.
    ///
    /// Good - deleted notification
    /// BadSubscriptionIdInvalid - Subscription doesn't exist
    /// BadSequenceNumberUnknown - Sequence number doesn't exist
    ///
    fn process_acknowledgements(&mut self, request: &PublishRequest) -> Option<Vec<StatusCode>> {
        let acks = request.subscription_acknowledgements.as_ref()?;
        if acks.is_empty() {
            return None;
        }
        let results = acks
            .iter()
            .map(|ack| {
                if let Some(subscription) = self.subscriptions.get_mut(&ack.subscription_id) {
                    subscription.acknowledge(ack.sequence_number)
                } else {
                    error!(
                        "Cannot find acknowledged notification subscription id {}",
                        ack.subscription_id
                    );
                    StatusCode::BadSubscriptionIdInvalid
                }
            })
            .collect();
        Some(results)
    }

    fn send_response(&mut self, request_id: u32, response: SupportedMessage) {
        trace!(
            "Queuing response for request id {}, service result {}",
            request_id,
            response.service_result()
        );
        self.publish_response_queue
            .push_back(PublishResponseEntry {
                request_id,
                response,
            });
    }
}
