// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fully connected (linear) layer.

use crate::{Tensor, TensorError};

/// Computes `y = x · Wᵀ + b` over the innermost dimension of `input`.
///
/// `weight` is row-major `[out_features][in_features]`; `bias`, when
/// present, has `out_features` entries. Every leading dimension of the
/// input is treated as a batch row.
///
/// # Errors
/// Returns [`TensorError::InvalidArgument`] when the parameter lengths or
/// the input's innermost dimension disagree with the declared features.
pub fn linear(
    input: &Tensor,
    weight: &[f32],
    bias: Option<&[f32]>,
    in_features: usize,
    out_features: usize,
) -> Result<Tensor, TensorError> {
    if input.shape().last_dim() != in_features {
        return Err(TensorError::InvalidArgument {
            op: "linear",
            detail: format!(
                "input {} has innermost dimension {}, expected {in_features}",
                input.shape(),
                input.shape().last_dim()
            ),
        });
    }
    if weight.len() != in_features * out_features {
        return Err(TensorError::InvalidArgument {
            op: "linear",
            detail: format!(
                "weight has {} values, expected {in_features}x{out_features}",
                weight.len()
            ),
        });
    }
    if let Some(b) = bias {
        if b.len() != out_features {
            return Err(TensorError::InvalidArgument {
                op: "linear",
                detail: format!("bias has {} values, expected {out_features}", b.len()),
            });
        }
    }

    let rows = input.num_elements() / in_features.max(1);
    let mut out = Vec::with_capacity(rows * out_features);
    for x in input.values().chunks(in_features.max(1)) {
        for (o, w_row) in weight.chunks(in_features.max(1)).enumerate() {
            let dot: f32 = x.iter().zip(w_row).map(|(a, w)| a * w).sum();
            out.push(dot + bias.map_or(0.0, |b| b[o]));
        }
    }

    Ok(Tensor::from_raw(input.shape().with_last_dim(out_features), out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;

    #[test]
    fn test_linear_vector() {
        // XOR hidden layer: h0 = x0 + x1, h1 = x0 + x1 - 1.
        let x = Tensor::new(Shape::vector(2), vec![1.0, 1.0]).unwrap();
        let y = linear(&x, &[1.0, 1.0, 1.0, 1.0], Some(&[0.0, -1.0]), 2, 2).unwrap();
        assert_eq!(y.shape(), &Shape::vector(2));
        assert_eq!(y.values(), &[2.0, 1.0]);
    }

    #[test]
    fn test_linear_batched_rows() {
        let x = Tensor::new(Shape::matrix(2, 3), vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap();
        let w = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // 2 x 3
        let y = linear(&x, &w, None, 3, 2).unwrap();
        assert_eq!(y.shape(), &Shape::matrix(2, 2));
        assert_eq!(y.values(), &[1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_linear_rejects_wrong_input_width() {
        let x = Tensor::new(Shape::vector(3), vec![1.0; 3]).unwrap();
        assert!(linear(&x, &[1.0; 4], None, 2, 2).is_err());
    }

    #[test]
    fn test_linear_rejects_wrong_weight_len() {
        let x = Tensor::new(Shape::vector(2), vec![1.0; 2]).unwrap();
        assert!(linear(&x, &[1.0; 3], None, 2, 2).is_err());
        assert!(linear(&x, &[1.0; 4], Some(&[0.0]), 2, 2).is_err());
    }
}
