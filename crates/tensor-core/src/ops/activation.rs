// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise activations and softmax.

use crate::Tensor;

/// Coefficient `sqrt(2/π)` of the tanh GELU approximation.
const SQRT_2_OVER_PI: f32 = 0.797_884_6;

/// Cubic coefficient of the tanh GELU approximation.
const GELU_COEFF: f32 = 0.044_715;

/// Activation function applied by an `activation` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    Relu,
    Sigmoid,
    /// Softmax over the innermost dimension.
    Softmax,
    /// `x * sigmoid(x)`; identical to [`ActivationKind::Silu`].
    Swish,
    Silu,
    Gelu,
}

impl ActivationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::Sigmoid => "sigmoid",
            Self::Softmax => "softmax",
            Self::Swish => "swish",
            Self::Silu => "silu",
            Self::Gelu => "gelu",
        }
    }

    /// Relative compute weight per element, used for cost estimates.
    pub fn flops_per_element(&self) -> u64 {
        match self {
            Self::Relu => 1,
            Self::Sigmoid | Self::Swish | Self::Silu => 4,
            Self::Softmax => 5,
            Self::Gelu => 8,
        }
    }
}

impl std::fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies `kind` to `input`.
pub fn activate(input: &Tensor, kind: ActivationKind) -> Tensor {
    match kind {
        ActivationKind::Relu => input.map(|x| x.max(0.0)),
        ActivationKind::Sigmoid => input.map(sigmoid),
        ActivationKind::Swish | ActivationKind::Silu => input.map(|x| x * sigmoid(x)),
        ActivationKind::Gelu => input.map(|x| {
            let inner = SQRT_2_OVER_PI * (x + GELU_COEFF * x * x * x);
            0.5 * x * (1.0 + inner.tanh())
        }),
        ActivationKind::Softmax => softmax_last_dim(input),
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable softmax over each innermost row.
fn softmax_last_dim(input: &Tensor) -> Tensor {
    let width = input.shape().last_dim().max(1);
    let mut out = input.values().to_vec();
    for row in out.chunks_mut(width) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
    Tensor::from_raw(input.shape().clone(), out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;

    fn t(values: &[f32]) -> Tensor {
        Tensor::new(Shape::vector(values.len()), values.to_vec()).unwrap()
    }

    #[test]
    fn test_relu() {
        let out = activate(&t(&[-1.0, 0.0, 2.5]), ActivationKind::Relu);
        assert_eq!(out.values(), &[0.0, 0.0, 2.5]);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        let out = activate(&t(&[0.0]), ActivationKind::Sigmoid);
        assert!((out.values()[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_swish_matches_silu() {
        let input = t(&[-2.0, 0.5, 3.0]);
        assert_eq!(
            activate(&input, ActivationKind::Swish),
            activate(&input, ActivationKind::Silu)
        );
    }

    #[test]
    fn test_gelu_shape_of_curve() {
        let out = activate(&t(&[0.0, 3.0, -3.0]), ActivationKind::Gelu);
        assert!(out.values()[0].abs() < 1e-6);
        assert!((out.values()[1] - 3.0).abs() < 0.01);
        assert!(out.values()[2].abs() < 0.01);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let input = Tensor::new(Shape::matrix(2, 3), vec![1.0, 2.0, 3.0, 1000.0, 1000.0, 1000.0])
            .unwrap();
        let out = activate(&input, ActivationKind::Softmax);
        for row in out.values().chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        assert!((out.values()[3] - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_serde_names() {
        let k: ActivationKind = serde_json::from_str("\"silu\"").unwrap();
        assert_eq!(k, ActivationKind::Silu);
        assert_eq!(ActivationKind::Relu.to_string(), "relu");
    }

    proptest::proptest! {
        #[test]
        fn prop_softmax_is_distribution(values in proptest::collection::vec(-50.0f32..50.0, 1..32)) {
            let out = activate(&t(&values), ActivationKind::Softmax);
            let sum: f32 = out.values().iter().sum();
            proptest::prop_assert!((sum - 1.0).abs() < 1e-4);
            proptest::prop_assert!(out.values().iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }
}
