//! Shape and cost model for operators.
//!
//! Each supported operator kind is a variant of [`Op`]. An `Op` is created
//! from a node's attributes by the [`OpRegistry`](crate::OpRegistry) and then
//! applied to the node's input shapes via [`Op::compute`], which returns the
//! output shapes, weight shape and operation counts as an [`OpCost`].
//!
//! Operators that don't override the cost model produce a copy of their first
//! input, have no weights and count one operation per output element.

use std::error::Error;
use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;

use crate::graph::Shape;

mod conv;
mod inner_product;
mod input;
mod pooling;

pub use conv::Conv;
pub use inner_product::InnerProduct;
pub use input::Input;
pub use pooling::Pooling;

/// Output shapes and arithmetic cost of an operator.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OpCost {
    pub output_dims: Vec<Shape>,

    /// Shape of the learned parameters. Empty for operators without weights.
    pub weight_dims: Shape,

    /// Total number of arithmetic operations.
    pub op_count: u64,

    /// Number of multiply-accumulate operations.
    pub mac_count: u64,
}

impl OpCost {
    /// Return the cost of a weightless operator which performs one operation
    /// per output element.
    pub fn elementwise(output_dims: Vec<Shape>) -> Result<OpCost, OpError> {
        let op_count = output_dims.iter().try_fold(0u64, |total, shape| {
            element_count(shape)
                .and_then(|count| total.checked_add(count))
                .ok_or(OpError::InvalidValue(COUNT_OVERFLOW))
        })?;
        Ok(OpCost {
            output_dims,
            weight_dims: SmallVec::new(),
            op_count,
            mac_count: 0,
        })
    }

    /// Return the cost of an operator which performs `mac_count`
    /// multiply-accumulates, each counted as two operations.
    pub fn multiply_accumulate(
        output_dims: Vec<Shape>,
        weight_dims: Shape,
        mac_count: u64,
    ) -> Result<OpCost, OpError> {
        let op_count = mac_count
            .checked_mul(2)
            .ok_or(OpError::InvalidValue(COUNT_OVERFLOW))?;
        if element_count(&weight_dims).is_none() {
            return Err(OpError::InvalidValue(COUNT_OVERFLOW));
        }
        Ok(OpCost {
            output_dims,
            weight_dims,
            op_count,
            mac_count,
        })
    }

    /// Return the number of learned parameters.
    pub fn param_count(&self) -> u64 {
        if self.weight_dims.is_empty() {
            0
        } else {
            element_count(&self.weight_dims).unwrap_or(u64::MAX)
        }
    }
}

const COUNT_OVERFLOW: &str = "operation count does not fit in 64 bits";

/// Return the product of `factors`, or an error if it overflows.
fn count_product(factors: &[usize]) -> Result<u64, OpError> {
    element_count(factors).ok_or(OpError::InvalidValue(COUNT_OVERFLOW))
}

/// Return the number of elements in a tensor with a given shape, or `None`
/// if it does not fit in a `u64`.
pub fn element_count(shape: &[usize]) -> Option<u64> {
    shape
        .iter()
        .try_fold(1u64, |count, &size| count.checked_mul(size as u64))
}

/// Errors that occur when applying an operator's cost model to its inputs.
#[derive(Clone, Debug, PartialEq)]
pub enum OpError {
    /// The operator received no inputs.
    IncorrectInputCount,

    /// An input's rank does not match that expected by the operator.
    IncorrectRank { expected: usize, actual: usize },

    /// An attribute or input size makes the output shape invalid.
    InvalidValue(&'static str),
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpError::IncorrectInputCount => write!(f, "incorrect input count"),
            OpError::IncorrectRank { expected, actual } => write!(
                f,
                "expected input with {} dims but input has {}",
                expected, actual
            ),
            OpError::InvalidValue(details) => write!(f, "invalid value: {}", details),
        }
    }
}

impl Error for OpError {}

/// An operator whose shape and cost can be computed.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    BatchNorm,
    Convolution(Conv),
    Eltwise,
    InnerProduct(InnerProduct),
    Input(Input),
    Pooling(Pooling),
    Relu,
    Scale,
    Softmax,

    /// An operator kind with no specific cost model. It is treated as
    /// shape-preserving.
    Other(String),
}

impl Op {
    /// Return the operator type tag.
    pub fn kind(&self) -> &str {
        match self {
            Op::BatchNorm => "BatchNorm",
            Op::Convolution(_) => "Convolution",
            Op::Eltwise => "Eltwise",
            Op::InnerProduct(_) => "InnerProduct",
            Op::Input(_) => "Input",
            Op::Pooling(_) => "Pooling",
            Op::Relu => "ReLU",
            Op::Scale => "Scale",
            Op::Softmax => "Softmax",
            Op::Other(kind) => kind,
        }
    }

    /// Compute output shapes and cost given the shapes of the inputs.
    pub fn compute(&self, inputs: &[Shape]) -> Result<OpCost, OpError> {
        match self {
            Op::Convolution(conv) => conv.compute(inputs),
            Op::InnerProduct(fc) => fc.compute(inputs),
            Op::Input(input) => input.compute(inputs),
            Op::Pooling(pool) => pool.compute(inputs),
            Op::BatchNorm | Op::Eltwise | Op::Relu | Op::Scale | Op::Softmax | Op::Other(_) => {
                pass_through(inputs)
            }
        }
    }

    /// Return true if this operator reports inputs beyond the first one,
    /// which it ignores.
    pub fn reports_extra_inputs(&self) -> bool {
        matches!(self, Op::Convolution(_))
    }
}

/// Cost model for shape-preserving operators.
pub fn pass_through(inputs: &[Shape]) -> Result<OpCost, OpError> {
    let [first, ..] = inputs else {
        return Err(OpError::IncorrectInputCount);
    };
    OpCost::elementwise(vec![first.clone()])
}

/// Split a 4D NCHW shape into its dimensions.
fn nchw(shape: &[usize]) -> Result<[usize; 4], OpError> {
    shape.try_into().map_err(|_| OpError::IncorrectRank {
        expected: 4,
        actual: shape.len(),
    })
}

/// Return the size of a spatial output axis for a sliding-window operator.
fn window_output_size(
    in_size: usize,
    kernel: usize,
    stride: usize,
    pad: usize,
    dilation: usize,
) -> Result<usize, OpError> {
    if stride == 0 {
        return Err(OpError::InvalidValue("stride must be positive"));
    }
    if kernel == 0 {
        return Err(OpError::InvalidValue("kernel size must be positive"));
    }
    let overflow = || OpError::InvalidValue("window size overflows");
    let padded = pad
        .checked_mul(2)
        .and_then(|pad| pad.checked_add(in_size))
        .ok_or_else(overflow)?;
    let span = dilation
        .checked_mul(kernel - 1)
        .and_then(|span| span.checked_add(1))
        .ok_or_else(overflow)?;
    if padded < span {
        return Err(OpError::InvalidValue("kernel is larger than the padded input"));
    }
    Ok((padded - span) / stride + 1)
}

#[cfg(test)]
mod tests {
    use netcost_testing::TestCases;
    use smallvec::smallvec;

    use super::{element_count, pass_through, window_output_size, Op, OpCost, OpError};
    use crate::graph::Shape;

    #[test]
    fn test_pass_through_kinds() {
        let input: Shape = smallvec![1, 16, 8, 8];
        let ops = [
            Op::BatchNorm,
            Op::Eltwise,
            Op::Relu,
            Op::Scale,
            Op::Softmax,
            Op::Other("Dropout".into()),
        ];

        ops.test_each(|op| {
            let cost = op.compute(&[input.clone()]).unwrap();
            assert_eq!(cost.output_dims, [input.clone()]);
            assert!(cost.weight_dims.is_empty());
            assert_eq!(cost.op_count, 16 * 8 * 8);
            assert_eq!(cost.mac_count, 0);
            assert_eq!(cost.param_count(), 0);
        })
    }

    #[test]
    fn test_pass_through_uses_first_input() {
        let a: Shape = smallvec![1, 4, 2, 2];
        let b: Shape = smallvec![1, 8, 2, 2];
        let cost = Op::Eltwise.compute(&[a.clone(), b]).unwrap();
        assert_eq!(cost.output_dims, [a]);
    }

    #[test]
    fn test_pass_through_without_inputs() {
        assert_eq!(pass_through(&[]), Err(OpError::IncorrectInputCount));
    }

    #[test]
    fn test_op_kind() {
        assert_eq!(Op::Relu.kind(), "ReLU");
        assert_eq!(Op::Other("Flatten".into()).kind(), "Flatten");
    }

    #[test]
    fn test_element_count() {
        assert_eq!(element_count(&[1, 3, 4, 5]), Some(60));
        assert_eq!(element_count(&[]), Some(1));
        assert_eq!(element_count(&[1 << 32, 1 << 32]), None);
    }

    #[test]
    fn test_count_overflow() {
        let huge: Shape = smallvec![1 << 32, 1 << 32];
        let half: Shape = smallvec![1 << 31, 1 << 31];
        let expected = Err(OpError::InvalidValue(
            "operation count does not fit in 64 bits",
        ));

        assert_eq!(Op::Relu.compute(&[huge.clone()]), expected);

        // Each output fits, but the total does not.
        let fits = OpCost::elementwise(vec![half.clone(), half.clone(), smallvec![1]]);
        assert_eq!(fits.map(|cost| cost.op_count), Ok((1 << 63) + 1));
        let overflows = OpCost::elementwise(vec![half.clone(), half.clone(), half.clone(), half]);
        assert_eq!(overflows, expected);

        assert_eq!(
            OpCost::multiply_accumulate(vec![smallvec![1]], smallvec![1], u64::MAX),
            expected
        );
        assert_eq!(
            OpCost::multiply_accumulate(vec![smallvec![1]], huge, 1),
            expected
        );
    }

    #[test]
    fn test_param_count() {
        let cost =
            OpCost::multiply_accumulate(vec![smallvec![1, 10, 1, 1]], smallvec![512, 10], 5120)
                .unwrap();
        assert_eq!(cost.param_count(), 5120);
        assert_eq!(cost.op_count, 10240);
    }

    #[test]
    fn test_window_output_size() {
        #[derive(Debug)]
        struct Case {
            in_size: usize,
            kernel: usize,
            stride: usize,
            pad: usize,
            dilation: usize,
            expected: Result<usize, OpError>,
        }

        let cases = [
            Case {
                in_size: 32,
                kernel: 3,
                stride: 1,
                pad: 1,
                dilation: 1,
                expected: Ok(32),
            },
            Case {
                in_size: 224,
                kernel: 7,
                stride: 2,
                pad: 3,
                dilation: 1,
                expected: Ok(112),
            },
            Case {
                in_size: 32,
                kernel: 3,
                stride: 1,
                pad: 0,
                dilation: 2,
                expected: Ok(28),
            },
            Case {
                in_size: 7,
                kernel: 2,
                stride: 2,
                pad: 0,
                dilation: 1,
                expected: Ok(3),
            },
            Case {
                in_size: 2,
                kernel: 5,
                stride: 1,
                pad: 0,
                dilation: 1,
                expected: Err(OpError::InvalidValue(
                    "kernel is larger than the padded input",
                )),
            },
            Case {
                in_size: 8,
                kernel: 3,
                stride: 0,
                pad: 0,
                dilation: 1,
                expected: Err(OpError::InvalidValue("stride must be positive")),
            },
            Case {
                in_size: 8,
                kernel: 3,
                stride: 1,
                pad: usize::MAX / 2 + 1,
                dilation: 1,
                expected: Err(OpError::InvalidValue("window size overflows")),
            },
            Case {
                in_size: 8,
                kernel: 3,
                stride: 1,
                pad: 0,
                dilation: usize::MAX,
                expected: Err(OpError::InvalidValue("window size overflows")),
            },
        ];

        cases.test_each(|case| {
            let size = window_output_size(
                case.in_size,
                case.kernel,
                case.stride,
                case.pad,
                case.dilation,
            );
            assert_eq!(size, case.expected);
        })
    }
}
