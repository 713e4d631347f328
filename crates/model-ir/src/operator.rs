// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator kinds carried by graph nodes.
//!
//! The execution core treats operators as opaque units: the graph only needs
//! to know each operator's arity, the shape it produces and a rough cost.
//! Parameters (weights, statistics) travel inline so that any executor can
//! run the node without side-loading files.

use tensor_core::{ActivationKind, PoolMode, Shape, Window2d, ELEMENT_BYTES};

/// Default `epsilon` for `batch_norm` nodes that omit it.
pub const DEFAULT_BN_EPSILON: f32 = 1e-5;

fn default_epsilon() -> f32 {
    DEFAULT_BN_EPSILON
}

fn unit_stride() -> [usize; 2] {
    [1, 1]
}

/// What a node computes.
///
/// Serialized with the tag in `"op"` and parameters alongside it:
///
/// ```json
/// { "op": "linear", "in_features": 2, "out_features": 1, "weight": [1, -2], "bias": [0] }
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperatorKind {
    /// Graph entry point; its tensor comes from the request payload.
    Input,
    Identity,
    /// `y = x · Wᵀ + b`, with `weight` row-major `[out_features][in_features]`.
    Linear {
        in_features: usize,
        out_features: usize,
        weight: Vec<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bias: Option<Vec<f32>>,
    },
    Activation {
        function: ActivationKind,
    },
    /// Inference-mode batch normalization over the innermost dimension.
    BatchNorm {
        mean: Vec<f32>,
        variance: Vec<f32>,
        gamma: Vec<f32>,
        beta: Vec<f32>,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
    Concat {
        axis: usize,
    },
    /// Element-wise sum of two or more equally shaped inputs.
    Add,
    /// Collapses everything after the outermost dimension.
    Flatten,
    Reshape {
        shape: Shape,
    },
    /// 2-D convolution over `[in_channels, height, width]`. `weight` is
    /// `[out_channels][in_channels][kernel_h][kernel_w]`; window sizes are
    /// `[height, width]`.
    Conv2d {
        in_channels: usize,
        out_channels: usize,
        kernel: [usize; 2],
        #[serde(default = "unit_stride")]
        stride: [usize; 2],
        #[serde(default)]
        padding: [usize; 2],
        weight: Vec<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bias: Option<Vec<f32>>,
    },
    /// Per-channel pooling over `[channels, height, width]`. `stride`
    /// defaults to `kernel`.
    Pool {
        mode: PoolMode,
        kernel: [usize; 2],
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stride: Option<[usize; 2]>,
        #[serde(default)]
        padding: [usize; 2],
    },
}

impl OperatorKind {
    /// Every tag accepted in a manifest.
    pub const TAGS: &'static [&'static str] = &[
        "input",
        "identity",
        "linear",
        "activation",
        "batch_norm",
        "concat",
        "add",
        "flatten",
        "reshape",
        "conv2d",
        "pool",
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Identity => "identity",
            Self::Linear { .. } => "linear",
            Self::Activation { .. } => "activation",
            Self::BatchNorm { .. } => "batch_norm",
            Self::Concat { .. } => "concat",
            Self::Add => "add",
            Self::Flatten => "flatten",
            Self::Reshape { .. } => "reshape",
            Self::Conv2d { .. } => "conv2d",
            Self::Pool { .. } => "pool",
        }
    }

    /// The sliding window of a `conv2d` or `pool` node.
    pub fn window(&self) -> Option<Window2d> {
        match self {
            Self::Conv2d {
                kernel,
                stride,
                padding,
                ..
            } => Some(Window2d {
                kernel: *kernel,
                stride: *stride,
                padding: *padding,
            }),
            Self::Pool {
                kernel,
                stride,
                padding,
                ..
            } => Some(Window2d {
                kernel: *kernel,
                stride: stride.unwrap_or(*kernel),
                padding: *padding,
            }),
            _ => None,
        }
    }

    /// Accepted number of inputs as `(min, max)`.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Self::Input => (0, 0),
            Self::Concat { .. } => (1, usize::MAX),
            Self::Add => (2, usize::MAX),
            _ => (1, 1),
        }
    }

    /// Checks internal parameter consistency (independent of inputs).
    pub fn check_params(&self) -> Result<(), String> {
        match self {
            Self::Linear {
                in_features,
                out_features,
                weight,
                bias,
            } => {
                if *in_features == 0 || *out_features == 0 {
                    return Err("in_features and out_features must be positive".into());
                }
                if in_features.checked_mul(*out_features) != Some(weight.len()) {
                    return Err(format!(
                        "weight has {} values, expected {in_features} x {out_features}",
                        weight.len()
                    ));
                }
                if let Some(b) = bias {
                    if b.len() != *out_features {
                        return Err(format!(
                            "bias has {} values, expected {out_features}",
                            b.len()
                        ));
                    }
                }
                Ok(())
            }
            Self::BatchNorm {
                mean,
                variance,
                gamma,
                beta,
                epsilon,
            } => {
                let n = mean.len();
                if n == 0 || variance.len() != n || gamma.len() != n || beta.len() != n {
                    return Err("mean, variance, gamma and beta must share one non-zero length".into());
                }
                if *epsilon < 0.0 || variance.iter().any(|v| *v < 0.0) {
                    return Err("variance and epsilon must be non-negative".into());
                }
                Ok(())
            }
            Self::Reshape { shape } => match shape.checked_size_bytes() {
                None => Err(format!("reshape target {shape} is too large")),
                Some(0) => Err("reshape target has zero elements".into()),
                Some(_) => Ok(()),
            },
            Self::Conv2d {
                in_channels,
                out_channels,
                kernel,
                weight,
                bias,
                ..
            } => {
                if *in_channels == 0 || *out_channels == 0 {
                    return Err("in_channels and out_channels must be positive".into());
                }
                check_window(self)?;
                let expected = out_channels
                    .checked_mul(*in_channels)
                    .and_then(|n| n.checked_mul(kernel[0]))
                    .and_then(|n| n.checked_mul(kernel[1]));
                if expected != Some(weight.len()) {
                    return Err(format!(
                        "weight has {} values, expected {out_channels} x {in_channels} x {} x {}",
                        weight.len(),
                        kernel[0],
                        kernel[1]
                    ));
                }
                if let Some(b) = bias {
                    if b.len() != *out_channels {
                        return Err(format!(
                            "bias has {} values, expected {out_channels}",
                            b.len()
                        ));
                    }
                }
                Ok(())
            }
            Self::Pool { kernel, padding, .. } => {
                check_window(self)?;
                if padding[0] >= kernel[0] || padding[1] >= kernel[1] {
                    return Err("pool padding must be smaller than the kernel".into());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Computes the output shape from the input shapes.
    ///
    /// Returns `None` for [`OperatorKind::Input`], whose shape must be
    /// declared in the manifest.
    pub fn infer_shape(&self, inputs: &[&Shape]) -> Result<Option<Shape>, String> {
        let (min, max) = self.arity();
        if inputs.len() < min || inputs.len() > max {
            return Err(format!(
                "{} takes {} input(s), got {}",
                self.tag(),
                arity_label(min, max),
                inputs.len()
            ));
        }

        let shape = match self {
            Self::Input => return Ok(None),
            Self::Identity | Self::Activation { .. } => inputs[0].clone(),
            Self::Linear {
                in_features,
                out_features,
                ..
            } => {
                if inputs[0].last_dim() != *in_features {
                    return Err(format!(
                        "input {} does not end in {in_features} features",
                        inputs[0]
                    ));
                }
                inputs[0].with_last_dim(*out_features)
            }
            Self::BatchNorm { mean, .. } => {
                if inputs[0].last_dim() != mean.len() {
                    return Err(format!(
                        "input {} does not have {} channels",
                        inputs[0],
                        mean.len()
                    ));
                }
                inputs[0].clone()
            }
            Self::Add => {
                if let Some(other) = inputs.iter().find(|s| **s != inputs[0]) {
                    return Err(format!("operands {} and {} differ", inputs[0], other));
                }
                inputs[0].clone()
            }
            Self::Concat { axis } => {
                let first = inputs[0];
                if *axis >= first.rank() {
                    return Err(format!("axis {axis} out of range for {first}"));
                }
                let mut dims = first.dims().to_vec();
                dims[*axis] = 0;
                for s in inputs {
                    let compatible = s.rank() == first.rank()
                        && s.dims()
                            .iter()
                            .zip(first.dims())
                            .enumerate()
                            .all(|(i, (a, b))| i == *axis || a == b);
                    if !compatible {
                        return Err(format!("operands {first} and {s} cannot be concatenated"));
                    }
                    dims[*axis] = dims[*axis]
                        .checked_add(s.dims()[*axis])
                        .ok_or_else(|| format!("concatenated axis {axis} is too large"))?;
                }
                Shape::new(dims)
            }
            Self::Flatten => inputs[0].flattened(),
            Self::Reshape { shape } => {
                if shape.checked_num_elements() != inputs[0].checked_num_elements() {
                    return Err(format!("cannot reshape {} into {shape}", inputs[0]));
                }
                shape.clone()
            }
            Self::Conv2d {
                in_channels,
                out_channels,
                ..
            } => {
                let [h, w] = planar(inputs[0], self.tag())?;
                if inputs[0].dims()[0] != *in_channels {
                    return Err(format!("input {} does not have {in_channels} channels", inputs[0]));
                }
                let [oh, ow] = self.window_output(inputs[0], [h, w])?;
                Shape::new(vec![*out_channels, oh, ow])
            }
            Self::Pool { .. } => {
                let [h, w] = planar(inputs[0], self.tag())?;
                let [oh, ow] = self.window_output(inputs[0], [h, w])?;
                Shape::new(vec![inputs[0].dims()[0], oh, ow])
            }
        };
        if shape.checked_size_bytes().is_none() {
            return Err(format!("output {shape} is too large"));
        }
        Ok(Some(shape))
    }

    fn window_output(&self, input: &Shape, plane: [usize; 2]) -> Result<[usize; 2], String> {
        self.window()
            .and_then(|w| w.output_size(plane))
            .ok_or_else(|| format!("{} window does not fit input {input}", self.tag()))
    }

    /// Estimates `(flops, working_bytes)` for a node producing `output`.
    /// Saturates rather than overflowing on shapes that validation will
    /// reject.
    pub fn estimate_cost(&self, inputs: &[&Shape], output: &Shape) -> (u64, u64) {
        let out_elems = elements(output);
        let in_elems = inputs.iter().fold(0u64, |acc, s| acc.saturating_add(elements(s)));
        let param_bytes = |n: usize| (n as u64).saturating_mul(ELEMENT_BYTES as u64);

        match self {
            Self::Input => (0, 0),
            Self::Identity | Self::Flatten | Self::Reshape { .. } | Self::Concat { .. } => {
                (in_elems, 0)
            }
            Self::Linear {
                in_features,
                weight,
                bias,
                ..
            } => {
                let flops = out_elems.saturating_mul(2).saturating_mul(*in_features as u64);
                let bytes = param_bytes(weight.len() + bias.as_ref().map_or(0, Vec::len));
                (flops, bytes)
            }
            Self::Activation { function } => (out_elems.saturating_mul(function.flops_per_element()), 0),
            Self::BatchNorm { mean, .. } => (out_elems.saturating_mul(2), param_bytes(4 * mean.len())),
            Self::Add => (in_elems.saturating_sub(out_elems), 0),
            Self::Conv2d {
                in_channels,
                kernel,
                weight,
                bias,
                ..
            } => {
                let taps = (kernel[0] as u64).saturating_mul(kernel[1] as u64);
                let flops = out_elems
                    .saturating_mul(2)
                    .saturating_mul(*in_channels as u64)
                    .saturating_mul(taps);
                let bytes = param_bytes(weight.len() + bias.as_ref().map_or(0, Vec::len));
                (flops, bytes)
            }
            Self::Pool { kernel, .. } => {
                let taps = (kernel[0] as u64).saturating_mul(kernel[1] as u64);
                (out_elems.saturating_mul(taps), 0)
            }
        }
    }
}

fn elements(shape: &Shape) -> u64 {
    shape.checked_num_elements().map_or(u64::MAX, |n| n as u64)
}

/// The `[height, width]` of a `[channels, height, width]` input.
fn planar(input: &Shape, op: &str) -> Result<[usize; 2], String> {
    match input.dims() {
        [_, h, w] => Ok([*h, *w]),
        _ => Err(format!("{op} expects [channels, height, width], got {input}")),
    }
}

fn check_window(op: &OperatorKind) -> Result<(), String> {
    let Some(window) = op.window() else {
        return Ok(());
    };
    if window.kernel.contains(&0) || window.stride.contains(&0) {
        return Err("kernel and stride must be positive".into());
    }
    Ok(())
}

fn arity_label(min: usize, max: usize) -> String {
    match (min, max) {
        (a, b) if a == b => a.to_string(),
        (a, usize::MAX) => format!("at least {a}"),
        (a, b) => format!("{a} to {b}"),
    }
}
