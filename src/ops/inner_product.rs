use smallvec::smallvec;

use super::{count_product, OpCost, OpError};
use crate::graph::Shape;

/// Fully connected layer.
#[derive(Clone, Debug, PartialEq)]
pub struct InnerProduct {
    pub num_output: usize,
}

impl InnerProduct {
    /// Compute the cost of the layer given an input with channels in
    /// dimension 1.
    ///
    /// The last two dimensions of the input are carried over to the output.
    pub fn compute(&self, inputs: &[Shape]) -> Result<OpCost, OpError> {
        let [input, ..] = inputs else {
            return Err(OpError::IncorrectInputCount);
        };
        let ndim = input.len();
        if ndim < 2 {
            return Err(OpError::IncorrectRank {
                expected: 2,
                actual: ndim,
            });
        }
        let in_c = input[1];
        let mac_count = count_product(&[in_c, self.num_output])?;

        OpCost::multiply_accumulate(
            vec![smallvec![1, self.num_output, input[ndim - 2], input[ndim - 1]]],
            smallvec![in_c, self.num_output],
            mac_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::InnerProduct;
    use crate::graph::Shape;
    use crate::ops::OpError;

    #[test]
    fn test_inner_product() {
        let fc = InnerProduct { num_output: 10 };
        let cost = fc.compute(&[smallvec![1, 512, 1, 1]]).unwrap();

        let expected: Shape = smallvec![1, 10, 1, 1];
        assert_eq!(cost.output_dims, [expected]);
        assert_eq!(cost.weight_dims.as_slice(), &[512, 10]);
        assert_eq!(cost.mac_count, 5120);
        assert_eq!(cost.op_count, 10240);
    }

    #[test]
    fn test_inner_product_keeps_trailing_dims() {
        let fc = InnerProduct { num_output: 4 };
        let cost = fc.compute(&[smallvec![1, 8, 3, 5]]).unwrap();
        let expected: Shape = smallvec![1, 4, 3, 5];
        assert_eq!(cost.output_dims, [expected]);

        // Spatial dims don't contribute to the MAC count.
        assert_eq!(cost.mac_count, 32);
    }

    #[test]
    fn test_inner_product_invalid_rank() {
        let fc = InnerProduct { num_output: 4 };
        assert_eq!(
            fc.compute(&[smallvec![8]]),
            Err(OpError::IncorrectRank {
                expected: 2,
                actual: 1
            })
        );
    }
}
