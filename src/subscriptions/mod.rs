// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::time::{Duration, Instant};

use crate::types::{service_types::PublishRequest, SupportedMessage};

/// The publish request entry preserves the request_id which is part of the chunk layer but
/// clients are fickle about receiving responses from the same as the request. Normally this
/// is easy because request and response are synchronous, but publish requests are async, so
/// we preserve the request_id so that later we can send out responses that have the proper
/// req id
#[derive(Debug, Clone)]
pub struct PublishRequestEntry {
    // The request id
    pub request_id: u32,
    // The request itself
    pub request: PublishRequest,
    // When the request was placed on the queue, for expiring it against the timeout hint
    pub arrival_time: Instant,
}

impl PublishRequestEntry {
    /// Tests if the request has outlived its timeout hint. A hint of 0 never expires.
    pub fn is_expired(&self, now: Instant) -> bool {
        let timeout_hint = self.request.request_header.timeout_hint;
        timeout_hint > 0
            && now.saturating_duration_since(self.arrival_time)
                >= Duration::from_millis(u64::from(timeout_hint))
    }
}

#[derive(Debug, Clone)]
pub struct PublishResponseEntry {
    pub request_id: u32,
    pub response: SupportedMessage,
}

/// This converts an OPC UA Duration (a floating point number of millis) into a time
/// duration used for interval arithmetic
pub(crate) fn duration_from_ms(d: f64) -> Duration {
    // 1 millisecond = 1000 microseconds, use micros for greater accuracy
    Duration::from_micros((d * 1000f64) as u64)
}

pub mod monitored_item;
pub mod publish_engine;
pub mod subscription;
