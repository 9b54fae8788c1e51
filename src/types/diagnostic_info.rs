// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use serde::{Deserialize, Serialize};

use crate::types::status_code::StatusCode;

/// Diagnostic information associated with a result. The publish engine never populates
/// these; the field exists so responses carry the standard's shape and a service layer
/// above can fill it in.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagnosticInfo {
    /// Index into the string table of the response header
    pub symbolic_id: Option<i32>,
    pub namespace_uri: Option<i32>,
    pub locale: Option<i32>,
    pub localized_text: Option<i32>,
    /// Vendor specific diagnostics
    pub additional_info: Option<String>,
    pub inner_status_code: Option<StatusCode>,
}

impl DiagnosticInfo {
    pub fn null() -> DiagnosticInfo {
        DiagnosticInfo::default()
    }
}
