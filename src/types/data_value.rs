// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DataValue`.

use serde::{Deserialize, Serialize};

use crate::types::{date_time::DateTime, status_code::StatusCode, variant::Variant};

/// A value with its status and source timestamp, as sampled from a monitored item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    /// The value. BadValues are expressed through the status instead.
    pub value: Option<Variant>,
    /// The status associated with the value. A `None` means Good.
    pub status: Option<StatusCode>,
    /// The source timestamp associated with the value
    pub source_timestamp: Option<DateTime>,
}

impl DataValue {
    /// Creates a data value given the supplied value and a timestamp of now
    pub fn new_now<V>(value: V) -> DataValue
    where
        V: Into<Variant>,
    {
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(DateTime::now()),
        }
    }

    /// Creates a data value given the supplied value and timestamp
    pub fn new_at<V>(value: V, time: DateTime) -> DataValue
    where
        V: Into<Variant>,
    {
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(time),
        }
    }

    /// The effective status of the value
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }
}
