// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Multi-input kernels: element-wise sum and concatenation.

use crate::{Shape, Tensor, TensorError};

/// Element-wise sum of tensors that all share one shape.
pub fn add(inputs: &[&Tensor]) -> Result<Tensor, TensorError> {
    let (first, rest) = inputs.split_first().ok_or(TensorError::InvalidArgument {
        op: "add",
        detail: "no inputs".into(),
    })?;

    let mut acc = first.values().to_vec();
    for t in rest {
        if t.shape() != first.shape() {
            return Err(TensorError::ShapeMismatch {
                op: "add",
                lhs: first.shape().clone(),
                rhs: t.shape().clone(),
            });
        }
        for (a, b) in acc.iter_mut().zip(t.values()) {
            *a += b;
        }
    }
    Ok(Tensor::from_raw(first.shape().clone(), acc))
}

/// Concatenates tensors along `axis`.
///
/// All inputs must have the same rank and agree on every dimension other
/// than `axis`.
pub fn concat(inputs: &[&Tensor], axis: usize) -> Result<Tensor, TensorError> {
    let first = inputs.first().ok_or(TensorError::InvalidArgument {
        op: "concat",
        detail: "no inputs".into(),
    })?;
    let rank = first.shape().rank();
    if axis >= rank {
        return Err(TensorError::InvalidArgument {
            op: "concat",
            detail: format!("axis {axis} out of range for rank {rank}"),
        });
    }

    let mut out_dims = first.shape().dims().to_vec();
    out_dims[axis] = 0;
    for t in inputs {
        let dims = t.shape().dims();
        let compatible = dims.len() == rank
            && dims
                .iter()
                .zip(first.shape().dims())
                .enumerate()
                .all(|(i, (a, b))| i == axis || a == b);
        if !compatible {
            return Err(TensorError::ShapeMismatch {
                op: "concat",
                lhs: first.shape().clone(),
                rhs: t.shape().clone(),
            });
        }
        out_dims[axis] += dims[axis];
    }

    // Each input contributes a contiguous chunk per outer index.
    let outer: usize = first.shape().dims()[..axis].iter().product();
    let mut out = Vec::with_capacity(out_dims.iter().product());
    for o in 0..outer {
        for t in inputs {
            let chunk: usize = t.shape().dims()[axis..].iter().product();
            out.extend_from_slice(&t.values()[o * chunk..(o + 1) * chunk]);
        }
    }
    Ok(Tensor::from_raw(Shape::new(out_dims), out))
}
