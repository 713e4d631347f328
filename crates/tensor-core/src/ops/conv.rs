// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D convolution over `[channels, height, width]` tensors, and the
//! sliding-window geometry it shares with pooling.

use crate::{Shape, Tensor, TensorError};

/// Kernel, stride and zero padding of a 2-D sliding window, each given as
/// `[height, width]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window2d {
    pub kernel: [usize; 2],
    pub stride: [usize; 2],
    pub padding: [usize; 2],
}

impl Window2d {
    /// Output `[height, width]` for an input plane of `input`, or `None` if
    /// a kernel or stride is zero or the padded input is smaller than the
    /// kernel.
    pub fn output_size(&self, input: [usize; 2]) -> Option<[usize; 2]> {
        let mut out = [0; 2];
        for axis in 0..2 {
            let (kernel, stride) = (self.kernel[axis], self.stride[axis]);
            if kernel == 0 || stride == 0 {
                return None;
            }
            let padded = input[axis].checked_add(self.padding[axis].checked_mul(2)?)?;
            if padded < kernel {
                return None;
            }
            out[axis] = (padded - kernel) / stride + 1;
        }
        Some(out)
    }

    /// Input coordinate along `axis` for output position `out` and kernel
    /// offset `k`, or `None` when it falls in the padding.
    fn source(&self, axis: usize, out: usize, k: usize, extent: usize) -> Option<usize> {
        (out * self.stride[axis] + k)
            .checked_sub(self.padding[axis])
            .filter(|i| *i < extent)
    }

    /// Reads a `[channels, height, width]` input and the output plane size.
    pub(crate) fn plan(&self, op: &'static str, input: &Shape) -> Result<([usize; 3], [usize; 2]), TensorError> {
        let [c, h, w] = match input.dims() {
            [c, h, w] => [*c, *h, *w],
            _ => {
                return Err(TensorError::InvalidArgument {
                    op,
                    detail: format!("input {input} is not [channels, height, width]"),
                })
            }
        };
        let out = self.output_size([h, w]).ok_or_else(|| TensorError::InvalidArgument {
            op,
            detail: format!("window {self:?} does not fit input {input}"),
        })?;
        Ok(([c, h, w], out))
    }

    /// Visits the input positions covered by output `(oy, ox)`, padding
    /// skipped, with the flat kernel offset of each.
    pub(crate) fn for_each_tap(&self, (oy, ox): (usize, usize), (h, w): (usize, usize), mut f: impl FnMut(usize, usize)) {
        let [kh, kw] = self.kernel;
        for ky in 0..kh {
            let Some(iy) = self.source(0, oy, ky, h) else { continue };
            for kx in 0..kw {
                let Some(ix) = self.source(1, ox, kx, w) else { continue };
                f(iy * w + ix, ky * kw + kx);
            }
        }
    }
}

/// Convolves `input` (`[in_channels, height, width]`) with `weight`, laid
/// out `[out_channels][in_channels][kernel_h][kernel_w]`.
///
/// # Errors
/// Returns [`TensorError::InvalidArgument`] for a non rank-3 input, a
/// window that does not fit, or parameter lengths that disagree with the
/// channel counts.
pub fn conv2d(
    input: &Tensor,
    weight: &[f32],
    bias: Option<&[f32]>,
    out_channels: usize,
    window: Window2d,
) -> Result<Tensor, TensorError> {
    let ([c, h, w], [oh, ow]) = window.plan("conv2d", input.shape())?;
    let taps = window.kernel[0] * window.kernel[1];
    if weight.len() != out_channels * c * taps {
        return Err(TensorError::InvalidArgument {
            op: "conv2d",
            detail: format!(
                "weight has {} values, expected {out_channels}x{c}x{}x{}",
                weight.len(),
                window.kernel[0],
                window.kernel[1]
            ),
        });
    }
    if let Some(b) = bias {
        if b.len() != out_channels {
            return Err(TensorError::InvalidArgument {
                op: "conv2d",
                detail: format!("bias has {} values, expected {out_channels}", b.len()),
            });
        }
    }

    let x = input.values();
    let plane = h * w;
    let mut out = Vec::with_capacity(out_channels * oh * ow);
    for oc in 0..out_channels {
        let filters = &weight[oc * c * taps..(oc + 1) * c * taps];
        for oy in 0..oh {
            for ox in 0..ow {
                let mut acc = bias.map_or(0.0, |b| b[oc]);
                for ic in 0..c {
                    let channel = &x[ic * plane..(ic + 1) * plane];
                    let kernel = &filters[ic * taps..(ic + 1) * taps];
                    window.for_each_tap((oy, ox), (h, w), |i, k| acc += channel[i] * kernel[k]);
                }
                out.push(acc);
            }
        }
    }

    Ok(Tensor::from_raw(Shape::new(vec![out_channels, oh, ow]), out))
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

    fn image(c: usize, h: usize, w: usize) -> Tensor {
        let n = c * h * w;
        Tensor::new(Shape::new(vec![c, h, w]), (0..n).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn test_output_size() {
        assert_eq!(window(3, 1, 0).output_size([5, 5]), Some([3, 3]));
        assert_eq!(window(3, 1, 1).output_size([5, 5]), Some([5, 5]));
        assert_eq!(window(2, 2, 0).output_size([5, 4]), Some([2, 2]));
        assert_eq!(window(6, 1, 0).output_size([5, 5]), None);
        assert_eq!(window(3, 0, 0).output_size([5, 5]), None);
        assert_eq!(window(1, 1, usize::MAX).output_size([5, 5]), None);
    }

    #[test]
    fn test_conv_sums_window() {
        // A 2x2 all-ones kernel sums each 2x2 patch of a 3x3 ramp.
        let y = conv2d(&image(1, 3, 3), &[1.0; 4], Some(&[0.5]), 1, window(2, 1, 0)).unwrap();
        assert_eq!(y.shape(), &Shape::new(vec![1, 2, 2]));
        assert_eq!(y.values(), &[8.5, 12.5, 20.5, 24.5]);
    }

    #[test]
    fn test_conv_padding_and_channels() {
        // Two input channels, identity 1x1 kernels picking each channel.
        let x = image(2, 2, 2);
        let w = [1.0, 0.0, 0.0, 1.0];
        let y = conv2d(&x, &w, None, 2, window(1, 1, 0)).unwrap();
        assert_eq!(y.values(), x.values());

        let padded = conv2d(&image(1, 1, 1), &[1.0; 9], None, 1, window(3, 1, 1)).unwrap();
        assert_eq!(padded.shape(), &Shape::new(vec![1, 1, 1]));
        assert_eq!(padded.values(), &[0.0]);
    }

    #[test]
    fn test_conv_rejects_bad_params() {
        assert!(conv2d(&image(1, 3, 3), &[1.0; 3], None, 1, window(2, 1, 0)).is_err());
        assert!(conv2d(&image(1, 3, 3), &[1.0; 4], Some(&[0.0, 0.0]), 1, window(2, 1, 0)).is_err());
        let flat = Tensor::new(Shape::vector(9), vec![0.0; 9]).unwrap();
        assert!(conv2d(&flat, &[1.0; 4], None, 1, window(2, 1, 0)).is_err());
    }
}
