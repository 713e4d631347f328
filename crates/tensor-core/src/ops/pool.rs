// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Average and max pooling over `[channels, height, width]` tensors.

use super::conv::Window2d;
use crate::{Shape, Tensor, TensorError};

/// Reduction applied by a `pool` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolMode {
    /// Mean of the covered input positions; padding is not counted.
    Avg,
    Max,
}

impl PoolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Max => "max",
        }
    }
}

impl std::fmt::Display for PoolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pools every channel of `input` independently.
///
/// # Errors
/// Returns [`TensorError::InvalidArgument`] for a non rank-3 input or a
/// window that does not fit, and [`TensorError::Numeric`] if a window
/// covers padding only.
pub fn pool2d(input: &Tensor, mode: PoolMode, window: Window2d) -> Result<Tensor, TensorError> {
    let ([c, h, w], [oh, ow]) = window.plan("pool", input.shape())?;
    let plane = h * w;
    let mut out = Vec::with_capacity(c * oh * ow);
    for channel in input.values().chunks(plane.max(1)).take(c) {
        for oy in 0..oh {
            for ox in 0..ow {
                let mut count = 0usize;
                let mut acc = match mode {
                    PoolMode::Avg => 0.0,
                    PoolMode::Max => f32::NEG_INFINITY,
                };
                window.for_each_tap((oy, ox), (h, w), |i, _| {
                    count += 1;
                    acc = match mode {
                        PoolMode::Avg => acc + channel[i],
                        PoolMode::Max => acc.max(channel[i]),
                    };
                });
                if count == 0 {
                    return Err(TensorError::Numeric {
                        op: "pool",
                        detail: format!("window at ({oy}, {ox}) covers padding only"),
                    });
                }
                out.push(match mode {
                    PoolMode::Avg => acc / count as f32,
                    PoolMode::Max => acc,
                });
            }
        }
    }

    Ok(Tensor::from_raw(Shape::new(vec![c, oh, ow]), out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(k: usize, s: usize, p: usize) -> Window2d {
        Window2d {
            kernel: [k, k],
            stride: [s, s],
            padding: [p, p],
        }
    }

    fn ramp() -> Tensor {
        Tensor::new(Shape::new(vec![1, 4, 4]), (0..16).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn test_max_pool() {
        let y = pool2d(&ramp(), PoolMode::Max, window(2, 2, 0)).unwrap();
        assert_eq!(y.shape(), &Shape::new(vec![1, 2, 2]));
        assert_eq!(y.values(), &[5.0, 7.0, 13.0, 15.0]);
    }

    #[test]
    fn test_avg_pool_ignores_padding() {
        let y = pool2d(&ramp(), PoolMode::Avg, window(2, 2, 0)).unwrap();
        assert_eq!(y.values(), &[2.5, 4.5, 10.5, 12.5]);

        // The corner window covers only input (0, 0) once padded by one.
        let padded = pool2d(&ramp(), PoolMode::Avg, window(2, 2, 1)).unwrap();
        assert_eq!(padded.shape(), &Shape::new(vec![1, 3, 3]));
        assert_eq!(padded.values()[0], 0.0);
        assert_eq!(padded.values()[8], 15.0);
    }

    #[test]
    fn test_pool_channels_are_independent() {
        let x = Tensor::new(Shape::new(vec![2, 1, 2]), vec![1.0, 3.0, -4.0, -2.0]).unwrap();
        let y = pool2d(&x, PoolMode::Max, window(1, 1, 0)).unwrap();
        assert_eq!(y.values(), x.values());
        let whole = Window2d {
            kernel: [1, 2],
            stride: [1, 2],
            padding: [0, 0],
        };
        assert_eq!(pool2d(&x, PoolMode::Avg, whole).unwrap().values(), &[2.0, -3.0]);
    }

    #[test]
    fn test_pool_rejects_padding_only_window() {
        assert!(pool2d(&ramp(), PoolMode::Max, window(1, 1, 1)).is_err());
        let flat = Tensor::new(Shape::vector(4), vec![0.0; 4]).unwrap();
        assert!(pool2d(&flat, PoolMode::Max, window(2, 2, 0)).is_err());
    }
}
