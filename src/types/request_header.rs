// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use serde::{Deserialize, Serialize};

use crate::types::date_time::DateTime;

/// The `RequestHeader` contains information common to every request from client to server.
/// Only the fields the publish engine reads are carried; the transport layer owns the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHeader {
    /// A requestHandle associated with the request. This client defined handle can be used
    /// to cancel the request. It is also returned in the response.
    pub request_handle: u32,
    /// The time the client sent the request
    pub timestamp: DateTime,
    /// This timeout in milliseconds is used in the client side communication stack to set
    /// the timeout on a per-call basis. A value of zero indicates no timeout.
    pub timeout_hint: u32,
}

impl RequestHeader {
    pub fn new(request_handle: u32, timestamp: DateTime, timeout_hint: u32) -> RequestHeader {
        RequestHeader {
            request_handle,
            timestamp,
            timeout_hint,
        }
    }
}
