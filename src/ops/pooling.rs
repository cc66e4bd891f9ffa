use smallvec::smallvec;

use super::{nchw, window_output_size, OpCost, OpError};
use crate::graph::Shape;

/// 2D max or average pooling.
#[derive(Clone, Debug, PartialEq)]
pub struct Pooling {
    pub kernel_size: [usize; 2],
    pub stride: [usize; 2],

    /// Declared padding. This is not applied when computing the output size.
    pub pad: [usize; 2],
    pub dilation: [usize; 2],
}

impl Pooling {
    pub fn output_size(&self, [in_h, in_w]: [usize; 2]) -> Result<[usize; 2], OpError> {
        let out_h = window_output_size(in_h, self.kernel_size[0], self.stride[0], 0, 1)?;
        let out_w = window_output_size(in_w, self.kernel_size[1], self.stride[1], 0, 1)?;
        Ok([out_h, out_w])
    }

    pub fn compute(&self, inputs: &[Shape]) -> Result<OpCost, OpError> {
        let [input, ..] = inputs else {
            return Err(OpError::IncorrectInputCount);
        };
        let [batch, chans, in_h, in_w] = nchw(input)?;
        let [out_h, out_w] = self.output_size([in_h, in_w])?;
        OpCost::elementwise(vec![smallvec![batch, chans, out_h, out_w]])
    }
}
