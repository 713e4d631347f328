// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for device descriptor parsing.

use crate::DeviceId;

/// Errors that can occur when loading device information.
///
/// Every variant means the device info or device list is malformed.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The JSON could not be parsed.
    #[error("failed to parse {what}: {source}")]
    ParseError {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The device list is neither an array, `{}` nor `{"devices": [...]}`.
    #[error("device list must be a JSON array or an object with a 'devices' array")]
    InvalidListShape,

    /// A required capability field is absent.
    #[error("device '{device}' is missing required field '{field}'")]
    MissingField { device: String, field: &'static str },

    /// A capability value is out of range.
    #[error("device '{device}' has invalid {field}: {detail}")]
    InvalidValue {
        device: String,
        field: &'static str,
        detail: String,
    },

    #[error("duplicate device id '{0}'")]
    DuplicateDevice(DeviceId),
}
