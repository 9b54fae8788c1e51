// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains constants for default configuration values. These are for the most part
//! possible to override through [`PublishEngineConfig`](crate::config::PublishEngineConfig).

/// Maximum number of publish requests the engine will hold before displacing the oldest
pub const DEFAULT_MAX_PUBLISH_REQUESTS_IN_QUEUE: usize = 100;
/// Minimum publishing interval for subscriptions in millis
pub const DEFAULT_MIN_PUBLISHING_INTERVAL_MS: f64 = 100.0;
/// Maximum publishing interval for subscriptions in millis
pub const DEFAULT_MAX_PUBLISHING_INTERVAL_MS: f64 = 3_600_000.0;
/// Publishing interval assigned to subscriptions that request a non-positive interval
pub const DEFAULT_PUBLISHING_INTERVAL_MS: f64 = 500.0;
/// Keep alive count assigned to subscriptions that request a keep alive count of 0
pub const DEFAULT_KEEP_ALIVE_COUNT: u32 = 4;
/// Maximum keep alive count
pub const MAX_KEEP_ALIVE_COUNT: u32 = 30_000;
/// Maximum lifetime count (3 times as large as max keep alive)
pub const MAX_LIFETIME_COUNT: u32 = 3 * MAX_KEEP_ALIVE_COUNT;
/// Retention cap on unacknowledged sent notifications when no cap can be derived from
/// the subscription's own limits
pub const DEFAULT_MAX_SENT_NOTIFICATIONS: usize = 1024;
