// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The publish engine of an OPC UA server. It pairs long-polled `PublishRequest` messages
//! coming from clients with `NotificationMessage`s produced by subscriptions, drives each
//! subscription's publishing state machine, manages sequence number acknowledgements and
//! retransmission, enforces limits on the publish request queue, and reports lifetime /
//! keep-alive / request timeout conditions on the wire.
//!
//! The engine is single-threaded and cooperative. Nothing in here starts a timer or a task -
//! the hosting server calls [`PublishEngine::tick`] from its own timer and
//! [`PublishEngine::on_publish_request`] from its transport layer, passing the current time
//! in. Tests drive the same entry points with a fabricated clock.

#![allow(clippy::bool_assert_comparison)]

#[macro_use]
extern crate log;

pub mod config;
pub mod constants;
pub mod core;
pub mod subscriptions;
pub mod types;

mod clock;

pub use crate::{
    config::PublishEngineConfig,
    subscriptions::{
        monitored_item::{MonitoredItem, NotificationSource},
        publish_engine::{Metrics, PublishEngine},
        subscription::{Subscription, SubscriptionState},
        PublishRequestEntry, PublishResponseEntry,
    },
};
