// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference operator kernels.
//!
//! Every kernel takes its inputs by reference and returns a new tensor.
//! Layout is feature-last: per-channel parameters apply to the innermost
//! dimension. Convolution and pooling are the exception and take
//! `[channels, height, width]`.

mod activation;
mod combine;
mod conv;
mod linear;
mod norm;
mod pool;

pub use activation::{activate, ActivationKind};
pub use combine::{add, concat};
pub use conv::{conv2d, Window2d};
pub use linear::linear;
pub use norm::batch_norm;
pub use pool::{pool2d, PoolMode};
