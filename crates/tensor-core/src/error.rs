// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor construction, payload decoding and kernels.

use crate::Shape;

/// Errors that can occur when building tensors or running kernels.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The number of values does not match the element count of the shape.
    #[error("element count mismatch for shape {shape}: expected {expected}, got {actual}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        actual: usize,
    },

    /// Two tensors have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// An operator parameter is inconsistent with its input.
    #[error("invalid argument for {op}: {detail}")]
    InvalidArgument { op: &'static str, detail: String },

    /// The host payload could not be decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A numeric computation produced a non-finite value.
    #[error("numeric error in {op}: {detail}")]
    Numeric { op: &'static str, detail: String },
}
