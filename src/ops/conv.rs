use smallvec::smallvec;

use super::{count_product, nchw, window_output_size, OpCost, OpError};
use crate::graph::Shape;

/// 2D convolution.
///
/// Spatial parameters are `[height, width]` pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv {
    pub num_output: usize,
    pub kernel_size: [usize; 2],
    pub stride: [usize; 2],
    pub pad: [usize; 2],
    pub dilation: [usize; 2],
}

impl Conv {
    /// Return the spatial output size for an input of size `[in_h, in_w]`.
    pub fn output_size(&self, [in_h, in_w]: [usize; 2]) -> Result<[usize; 2], OpError> {
        let out_h = window_output_size(
            in_h,
            self.kernel_size[0],
            self.stride[0],
            self.pad[0],
            self.dilation[0],
        )?;
        let out_w = window_output_size(
            in_w,
            self.kernel_size[1],
            self.stride[1],
            self.pad[1],
            self.dilation[1],
        )?;
        Ok([out_h, out_w])
    }

    /// Compute the cost of convolving an NCHW input.
    ///
    /// Only the first input is used. Bias terms are not counted.
    pub fn compute(&self, inputs: &[Shape]) -> Result<OpCost, OpError> {
        let [input, ..] = inputs else {
            return Err(OpError::IncorrectInputCount);
        };
        let [_batch, in_c, in_h, in_w] = nchw(input)?;
        let [out_h, out_w] = self.output_size([in_h, in_w])?;
        let [k_h, k_w] = self.kernel_size;

        let mac_count = count_product(&[in_c, k_h, k_w, out_h, out_w, self.num_output])?;

        OpCost::multiply_accumulate(
            vec![smallvec![1, self.num_output, out_h, out_w]],
            smallvec![k_h, k_w, in_c, self.num_output],
            mac_count,
        )
    }
}
