// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The types used on the wire by the Publish service. The generated type shapes of the
//! full standard are not carried here - only the hand written pieces the engine needs.

pub mod data_value;
pub mod date_time;
pub mod diagnostic_info;
pub mod notification_message;
pub mod request_header;
pub mod response_header;
pub mod service_types;
pub mod status_code;
pub mod variant;

pub use data_value::DataValue;
pub use date_time::{DateTime, DateTimeUtc};
pub use diagnostic_info::DiagnosticInfo;
pub use notification_message::{
    DataChangeNotification, MonitoredItemNotification, NotificationData, NotificationMessage,
    StatusChangeNotification,
};
pub use request_header::RequestHeader;
pub use response_header::ResponseHeader;
pub use service_types::{
    PublishRequest, PublishResponse, ServiceFault, SubscriptionAcknowledgement, SupportedMessage,
};
pub use status_code::StatusCode;
pub use variant::Variant;
