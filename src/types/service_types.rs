// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the Publish service request and response shapes.

use serde::{Deserialize, Serialize};

use crate::types::{
    diagnostic_info::DiagnosticInfo, notification_message::NotificationMessage,
    request_header::RequestHeader, response_header::ResponseHeader, status_code::StatusCode,
};

/// Acknowledges a notification message received in a previous publish response, so the
/// server can drop it from its retransmission queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionAcknowledgement {
    pub subscription_id: u32,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub request_header: RequestHeader,
    pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub response_header: ResponseHeader,
    /// The subscription that produced the notification message
    pub subscription_id: u32,
    /// Sequence numbers of every message the server is still willing to retransmit for
    /// this subscription, in ascending order
    pub available_sequence_numbers: Option<Vec<u32>>,
    /// True if the subscription held more notifications than fitted in this message
    pub more_notifications: bool,
    pub notification_message: NotificationMessage,
    /// One status per acknowledgement in the consumed request, in request order
    pub results: Option<Vec<StatusCode>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

/// A fault response carrying nothing but a response header with a bad service result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}

impl ServiceFault {
    pub fn new(request_header: &RequestHeader, service_result: StatusCode) -> ServiceFault {
        ServiceFault {
            response_header: ResponseHeader::new_service_result(request_header, service_result),
        }
    }
}

/// The messages the publish engine hands back to the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SupportedMessage {
    PublishResponse(PublishResponse),
    ServiceFault(ServiceFault),
}

impl SupportedMessage {
    /// The service result in the message's response header
    pub fn service_result(&self) -> StatusCode {
        match self {
            SupportedMessage::PublishResponse(r) => r.response_header.service_result,
            SupportedMessage::ServiceFault(r) => r.response_header.service_result,
        }
    }

    /// The request handle the message answers
    pub fn request_handle(&self) -> u32 {
        match self {
            SupportedMessage::PublishResponse(r) => r.response_header.request_handle,
            SupportedMessage::ServiceFault(r) => r.response_header.request_handle,
        }
    }
}

impl From<PublishResponse> for SupportedMessage {
    fn from(value: PublishResponse) -> Self {
        SupportedMessage::PublishResponse(value)
    }
}

impl From<ServiceFault> for SupportedMessage {
    fn from(value: ServiceFault) -> Self {
        SupportedMessage::ServiceFault(value)
    }
}
