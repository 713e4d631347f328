// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Text payloads exchanged with the host.
//!
//! The host speaks plain text: a tensor is its values separated by commas,
//! and several tensors are separated by semicolons.
//!
//! ```text
//! "1, 0"            one input tensor with two elements
//! "1,0; 0.5,0.5"    two input tensors
//! ```
//!
//! Shapes are never carried in the payload; the receiver supplies them.

use crate::{Shape, Tensor, TensorError};

/// Separator between tensors in a payload.
pub const TENSOR_SEPARATOR: char = ';';

/// Separator between values of one tensor.
pub const VALUE_SEPARATOR: char = ',';

/// Decodes `text` into one tensor per entry of `shapes`, in order.
///
/// # Errors
/// Returns [`TensorError::InvalidPayload`] when the number of tensor groups
/// differs from `shapes.len()` or a value is not a number, and
/// [`TensorError::ElementCountMismatch`] when a group has the wrong length.
///
/// # Examples
/// ```
/// use tensor_core::{payload, Shape};
/// let t = payload::decode("1, 0", &[Shape::vector(2)]).unwrap();
/// assert_eq!(t[0].values(), &[1.0, 0.0]);
/// ```
pub fn decode(text: &str, shapes: &[Shape]) -> Result<Vec<Tensor>, TensorError> {
    let groups: Vec<&str> = text.split(TENSOR_SEPARATOR).collect();
    if groups.len() != shapes.len() {
        return Err(TensorError::InvalidPayload(format!(
            "expected {} tensor(s), found {}",
            shapes.len(),
            groups.len()
        )));
    }

    groups
        .iter()
        .zip(shapes)
        .map(|(group, shape)| {
            let values = decode_values(group)?;
            Tensor::new(shape.clone(), values)
        })
        .collect()
}

fn decode_values(group: &str) -> Result<Vec<f32>, TensorError> {
    let group = group.trim();
    if group.is_empty() {
        return Err(TensorError::InvalidPayload("empty tensor group".into()));
    }
    group
        .split(VALUE_SEPARATOR)
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f32>()
                .map_err(|_| TensorError::InvalidPayload(format!("'{token}' is not a number")))
        })
        .collect()
}

/// Encodes tensors as `"v, v, v; v, v"`.
pub fn encode<'a>(tensors: impl IntoIterator<Item = &'a Tensor>) -> String {
    tensors
        .into_iter()
        .map(|t| {
            t.values()
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}
