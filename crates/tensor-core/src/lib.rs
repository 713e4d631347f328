// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! The data carrier of the EdgeFlow execution core.
//!
//! This crate provides:
//! - [`Tensor`]: an owned, row-major `f32` tensor. Tensors are immutable
//!   once produced by an operator; the runtime shares them by `Arc`.
//! - [`Shape`]: dimension descriptors with element and byte accounting.
//! - [`payload`]: the text encoding exchanged with the host
//!   (`"1, 2, 3"`, multiple tensors separated by `;`).
//! - Reference kernels ([`linear`], [`activate`], [`add`], [`concat`],
//!   [`batch_norm`], [`conv2d`], [`pool2d`]) used by the default CPU
//!   executor.
//!
//! The kernels are deliberately simple scalar loops: the execution core
//! treats operators as opaque units and real deployments swap in their own
//! executor per device.

mod error;
mod ops;
pub mod payload;
mod shape;
mod tensor;

pub use error::TensorError;
pub use ops::{activate, add, batch_norm, concat, conv2d, linear, pool2d, ActivationKind, PoolMode, Window2d};
pub use shape::{Shape, ELEMENT_BYTES};
pub use tensor::Tensor;
