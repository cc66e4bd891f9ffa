use std::fmt;

use crate::graph::{NodeId, Shape};

/// A problem found during graph construction or shape propagation which
/// does not stop the analysis.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// An output declaration lists more than one value. Only the first is
    /// registered as produced by the node.
    MultipleOutputValues {
        node: NodeId,
        output: String,
        count: usize,
    },

    /// A declared tensor shape has symbolic or unknown dimensions and was
    /// ignored.
    UnusableShapeHint { node: NodeId, tensor: String },

    /// The operator only uses its first input. `count` further inputs were
    /// ignored.
    ExtraInputsIgnored { node: NodeId, count: usize },

    /// The predecessors of a node with several inputs produce different
    /// shapes. The shapes are passed to the operator as-is.
    JoinShapeMismatch { node: NodeId, shapes: Vec<Shape> },

    /// The node cannot be reached from the root and was not computed.
    UnreachableNode { node: NodeId },
}

impl Diagnostic {
    /// Return the node this diagnostic is about.
    pub fn node(&self) -> NodeId {
        match self {
            Diagnostic::MultipleOutputValues { node, .. }
            | Diagnostic::UnusableShapeHint { node, .. }
            | Diagnostic::ExtraInputsIgnored { node, .. }
            | Diagnostic::JoinShapeMismatch { node, .. }
            | Diagnostic::UnreachableNode { node } => *node,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MultipleOutputValues {
                node,
                output,
                count,
            } => write!(
                f,
                "node {}: output \"{}\" has {} values, only the first is used",
                node, output, count
            ),
            Diagnostic::UnusableShapeHint { node, tensor } => write!(
                f,
                "node {}: shape of \"{}\" is not fully known and was ignored",
                node, tensor
            ),
            Diagnostic::ExtraInputsIgnored { node, count } => write!(
                f,
                "node {}: operator uses one input, {} more were ignored",
                node, count
            ),
            Diagnostic::JoinShapeMismatch { node, shapes } => write!(
                f,
                "node {}: inputs have different shapes {:?}",
                node, shapes
            ),
            Diagnostic::UnreachableNode { node } => {
                write!(f, "node {}: not reachable from the root node", node)
            }
        }
    }
}
