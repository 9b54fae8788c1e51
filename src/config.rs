// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Configured limits on the publish engine. Every field has a default so a config file
//! only needs to name the values it overrides.

use serde::{Deserialize, Serialize};

use crate::constants;

mod defaults {
    use crate::constants;

    pub fn max_publish_requests_in_queue() -> usize {
        constants::DEFAULT_MAX_PUBLISH_REQUESTS_IN_QUEUE
    }

    pub fn min_publishing_interval_ms() -> f64 {
        constants::DEFAULT_MIN_PUBLISHING_INTERVAL_MS
    }

    pub fn max_publishing_interval_ms() -> f64 {
        constants::DEFAULT_MAX_PUBLISHING_INTERVAL_MS
    }

    pub fn default_publishing_interval_ms() -> f64 {
        constants::DEFAULT_PUBLISHING_INTERVAL_MS
    }

    pub fn default_keep_alive_count() -> u32 {
        constants::DEFAULT_KEEP_ALIVE_COUNT
    }

    pub fn max_keep_alive_count() -> u32 {
        constants::MAX_KEEP_ALIVE_COUNT
    }

    pub fn max_lifetime_count() -> u32 {
        constants::MAX_LIFETIME_COUNT
    }

    pub fn max_sent_notifications() -> usize {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishEngineConfig {
    /// Maximum number of publish requests held in the queue before an arrival displaces
    /// the oldest entry
    #[serde(default = "defaults::max_publish_requests_in_queue")]
    pub max_publish_requests_in_queue: usize,
    /// Specifies the minimum publishing interval for this server in millis
    #[serde(default = "defaults::min_publishing_interval_ms")]
    pub min_publishing_interval_ms: f64,
    /// Specifies the maximum publishing interval for this server in millis
    #[serde(default = "defaults::max_publishing_interval_ms")]
    pub max_publishing_interval_ms: f64,
    /// Publishing interval assigned when a subscription requests a non-positive interval
    #[serde(default = "defaults::default_publishing_interval_ms")]
    pub default_publishing_interval_ms: f64,
    /// Keep alive count assigned when a subscription requests a keep alive count of 0
    #[serde(default = "defaults::default_keep_alive_count")]
    pub default_keep_alive_count: u32,
    #[serde(default = "defaults::max_keep_alive_count")]
    pub max_keep_alive_count: u32,
    /// Maximum lifetime count (3 times as large as max keep alive)
    #[serde(default = "defaults::max_lifetime_count")]
    pub max_lifetime_count: u32,
    /// Retention cap on sent, unacknowledged notifications per subscription. 0 derives a
    /// cap from the subscription's own limits.
    #[serde(default = "defaults::max_sent_notifications")]
    pub max_sent_notifications: usize,
}

impl Default for PublishEngineConfig {
    fn default() -> Self {
        Self {
            max_publish_requests_in_queue: defaults::max_publish_requests_in_queue(),
            min_publishing_interval_ms: defaults::min_publishing_interval_ms(),
            max_publishing_interval_ms: defaults::max_publishing_interval_ms(),
            default_publishing_interval_ms: defaults::default_publishing_interval_ms(),
            default_keep_alive_count: defaults::default_keep_alive_count(),
            max_keep_alive_count: defaults::max_keep_alive_count(),
            max_lifetime_count: defaults::max_lifetime_count(),
            max_sent_notifications: defaults::max_sent_notifications(),
        }
    }
}

impl PublishEngineConfig {
    /// Takes the publishing interval requested for a subscription and returns a revised
    /// interval that conforms to the server's limits.
    pub fn revise_publishing_interval(&self, requested_interval_ms: f64) -> f64 {
        if requested_interval_ms <= 0.0 {
            self.default_publishing_interval_ms
        } else {
            requested_interval_ms
                .max(self.min_publishing_interval_ms)
                .min(self.max_publishing_interval_ms)
        }
    }

    /// Takes the keep alive count requested for a subscription and returns a revised count
    /// that conforms to the server's limits.
    pub fn revise_keep_alive_count(&self, requested_keep_alive_count: u32) -> u32 {
        if requested_keep_alive_count == 0 {
            self.default_keep_alive_count
        } else {
            requested_keep_alive_count.min(self.max_keep_alive_count)
        }
    }

    /// Takes the lifetime count requested for a subscription and returns a revised count
    /// that conforms to the server's limits. The revised keep alive count must already be
    /// known because the lifetime count has to exceed it by at least a multiple of 3.
    pub fn revise_lifetime_count(
        &self,
        requested_lifetime_count: u32,
        revised_keep_alive_count: u32,
    ) -> u32 {
        let min_lifetime_count = revised_keep_alive_count * 3;
        if requested_lifetime_count < min_lifetime_count {
            min_lifetime_count
        } else if requested_lifetime_count > self.max_lifetime_count {
            self.max_lifetime_count
        } else {
            requested_lifetime_count
        }
    }

    /// Resolves the per-subscription retention cap on sent notifications. With no explicit
    /// cap configured, the cap derives from what the subscription can have outstanding over
    /// a keep alive period, or a fixed ceiling when notifications per publish is unlimited.
    pub fn resolve_max_sent_notifications(
        &self,
        max_notifications_per_publish: usize,
        max_keep_alive_count: u32,
    ) -> usize {
        if self.max_sent_notifications > 0 {
            self.max_sent_notifications
        } else if max_notifications_per_publish > 0 {
            max_notifications_per_publish * max_keep_alive_count as usize
        } else {
            constants::DEFAULT_MAX_SENT_NOTIFICATIONS
        }
    }
}
