// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors.

use std::fmt;

/// Size of one tensor element in bytes. All EdgeFlow tensors are `f32`.
pub const ELEMENT_BYTES: usize = 4;

/// The dimensions of a [`crate::Tensor`], outermost first.
///
/// Graph manifests use shapes to describe node outputs, so `Shape` is
/// serialized as a plain JSON array (`[1, 768]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a shape from explicit dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![2, 3, 4]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), 24);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a 1-D shape.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    /// Creates a 2-D shape.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the size of dimension `axis`, or `None` if out of range.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }

    /// Returns the innermost (feature) dimension, or `1` for rank 0.
    pub fn last_dim(&self) -> usize {
        self.dims.last().copied().unwrap_or(1)
    }

    /// Total element count. A rank-0 shape holds one element.
    ///
    /// Assumes a shape that has passed [`Shape::checked_size_bytes`]; graph
    /// validation guarantees this for every node shape.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Memory footprint of a tensor with this shape.
    pub fn size_bytes(&self) -> usize {
        self.num_elements() * ELEMENT_BYTES
    }

    /// Element count, or `None` if it does not fit in `usize`.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d))
    }

    /// Byte size, or `None` if it does not fit in `usize`.
    pub fn checked_size_bytes(&self) -> Option<usize> {
        self.checked_num_elements()?.checked_mul(ELEMENT_BYTES)
    }

    /// Returns a copy with the innermost dimension replaced.
    pub fn with_last_dim(&self, last: usize) -> Self {
        let mut dims = self.dims.clone();
        match dims.last_mut() {
            Some(d) => *d = last,
            None => dims.push(last),
        }
        Self { dims }
    }

    /// Collapses every dimension except the outermost one.
    ///
    /// `[2, 3, 4]` flattens to `[2, 12]`; rank ≤ 1 shapes are unchanged.
    pub fn flattened(&self) -> Self {
        if self.dims.len() <= 1 {
            return self.clone();
        }
        let outer = self.dims[0];
        Self::matrix(outer, self.num_elements() / outer.max(1))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, "x")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}
