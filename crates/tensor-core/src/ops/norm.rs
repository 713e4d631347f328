// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Inference-mode batch normalization.

use crate::{Tensor, TensorError};

/// Normalizes each channel of the innermost dimension with frozen statistics:
///
/// `y = gamma * (x - mean) / sqrt(variance + epsilon) + beta`
///
/// # Errors
/// Returns [`TensorError::InvalidArgument`] if any parameter vector length
/// differs from the channel count, and [`TensorError::Numeric`] if the
/// result is not finite.
pub fn batch_norm(
    input: &Tensor,
    mean: &[f32],
    variance: &[f32],
    gamma: &[f32],
    beta: &[f32],
    epsilon: f32,
) -> Result<Tensor, TensorError> {
    let channels = input.shape().last_dim();
    for (name, p) in [("mean", mean), ("variance", variance), ("gamma", gamma), ("beta", beta)] {
        if p.len() != channels {
            return Err(TensorError::InvalidArgument {
                op: "batch_norm",
                detail: format!("{name} has {} values, expected {channels}", p.len()),
            });
        }
    }

    let scale: Vec<f32> = variance
        .iter()
        .zip(gamma)
        .map(|(v, g)| g / (v + epsilon).sqrt())
        .collect();

    let mut out = input.values().to_vec();
    for row in out.chunks_mut(channels.max(1)) {
        for (c, x) in row.iter_mut().enumerate() {
            *x = (*x - mean[c]) * scale[c] + beta[c];
        }
    }

    let out = Tensor::from_raw(input.shape().clone(), out);
    out.ensure_finite("batch_norm")?;
    Ok(out)
}
