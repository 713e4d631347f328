// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core tensor type.

use crate::{Shape, TensorError};

/// An owned, n-dimensional `f32` tensor in row-major order.
///
/// Kernels never mutate their inputs: every operation returns a fresh
/// tensor, so a produced tensor can be shared read-only between the
/// consumers scheduled on different devices.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor from values, checking the element count.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Shape, Tensor};
    /// let t = Tensor::new(Shape::vector(3), vec![1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.values(), &[1.0, 2.0, 3.0]);
    /// assert!(Tensor::new(Shape::vector(2), vec![1.0]).is_err());
    /// ```
    pub fn new(shape: Shape, data: Vec<f32>) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if data.len() != expected {
            return Err(TensorError::ElementCountMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Builds a tensor whose element count the caller already guarantees.
    pub(crate) fn from_raw(shape: Shape, data: Vec<f32>) -> Self {
        debug_assert_eq!(shape.num_elements(), data.len());
        Self { shape, data }
    }

    /// Creates a zero-filled tensor.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.num_elements();
        Self {
            shape,
            data: vec![0.0; n],
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    pub fn into_values(self) -> Vec<f32> {
        self.data
    }

    pub fn num_elements(&self) -> usize {
        self.data.len()
    }

    /// Bytes this tensor occupies (and would occupy on the wire).
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes()
    }

    /// Reinterprets the data under a new shape with the same element count.
    pub fn reshape(self, shape: Shape) -> Result<Self, TensorError> {
        if shape.num_elements() != self.data.len() {
            return Err(TensorError::ShapeMismatch {
                op: "reshape",
                lhs: self.shape,
                rhs: shape,
            });
        }
        Ok(Self {
            shape,
            data: self.data,
        })
    }

    /// Applies `f` element-wise, producing a tensor of the same shape.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Returns an error naming `op` if any element is NaN or infinite.
    pub fn ensure_finite(&self, op: &'static str) -> Result<(), TensorError> {
        match self.data.iter().position(|x| !x.is_finite()) {
            Some(i) => Err(TensorError::Numeric {
                op,
                detail: format!("non-finite value {} at element {i}", self.data[i]),
            }),
            None => Ok(()),
        }
    }
}
