use super::{pass_through, OpCost, OpError};
use crate::graph::Shape;

/// Network input placeholder.
///
/// If the node has a declared shape it is passed through, otherwise the
/// shape comes from the `shape` attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Input {
    pub shape: Option<Shape>,
}

impl Input {
    pub fn compute(&self, inputs: &[Shape]) -> Result<OpCost, OpError> {
        match (inputs, &self.shape) {
            ([], Some(shape)) => OpCost::elementwise(vec![shape.clone()]),
            _ => pass_through(inputs),
        }
    }
}
