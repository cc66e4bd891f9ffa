//! Shape propagation.
//!
//! Propagation walks the graph breadth-first from the root node and computes
//! the output shape and cost of each node from the outputs of its
//! predecessors. Breadth-first order can reach a node with several inputs
//! (a join) before all of its predecessors have been computed, for example
//! at the end of a residual block where one branch is longer than the other.
//! In that case the uncomputed ancestors are computed first, in dependency
//! order, see [`unresolved_ancestors`].

use std::error::Error;
use std::fmt;

use rustc_hash::FxHashSet;

use crate::diagnostics::Diagnostic;
use crate::graph::{Graph, NodeId, Shape};
use crate::op_registry::{OpRegistry, ReadOpError};
use crate::ops::OpError;
use crate::report::NodeReport;

/// Options that control shape propagation.
#[derive(Clone, Debug, Default)]
pub struct PropagateOptions {
    /// Print a report line for each node as it is computed.
    pub verbose: bool,
}

/// Reasons why shape propagation failed.
#[derive(Clone, Debug, PartialEq)]
pub enum PropagateError {
    /// A node without predecessors has no declared input or output shape.
    MissingInputShape { node: NodeId, name: String },

    /// The node's attributes could not be read.
    InvalidOperator {
        node: NodeId,
        name: String,
        error: ReadOpError,
    },

    /// The node's cost model could not be applied to its inputs.
    OperatorFailed {
        node: NodeId,
        name: String,
        error: OpError,
    },
}

impl fmt::Display for PropagateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagateError::MissingInputShape { node, name } => {
                write!(f, "in node \"{}\" ({}): no input shape available", name, node)
            }
            PropagateError::InvalidOperator { node, name, error } => {
                write!(f, "in node \"{}\" ({}): {}", name, node, error)
            }
            PropagateError::OperatorFailed { node, name, error } => {
                write!(f, "in node \"{}\" ({}): {}", name, node, error)
            }
        }
    }
}

impl Error for PropagateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PropagateError::MissingInputShape { .. } => None,
            PropagateError::InvalidOperator { error, .. } => Some(error),
            PropagateError::OperatorFailed { error, .. } => Some(error),
        }
    }
}

/// Result of a shape propagation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Propagation {
    /// IDs of nodes computed in this pass, in the order they were computed.
    pub order: Vec<NodeId>,

    /// Non-fatal problems found during the pass.
    pub diagnostics: Vec<Diagnostic>,
}

/// Compute the output shapes and costs of all nodes reachable from the root.
///
/// Nodes which already have a recorded cost are skipped, so running this a
/// second time on the same graph computes nothing.
pub fn propagate_shapes(
    graph: &mut Graph,
    registry: &OpRegistry,
    options: &PropagateOptions,
) -> Result<Propagation, PropagateError> {
    let mut propagator = Propagator {
        graph,
        registry,
        options,
        result: Propagation::default(),
    };
    propagator.run()?;
    Ok(propagator.result)
}

struct Propagator<'a> {
    graph: &'a mut Graph,
    registry: &'a OpRegistry,
    options: &'a PropagateOptions,
    result: Propagation,
}

impl Propagator<'_> {
    fn run(&mut self) -> Result<(), PropagateError> {
        let Some(root) = self.graph.root() else {
            return Ok(());
        };
        if !self.is_computed(root) {
            self.compute(root)?;
        }

        for (_pred, node) in self.graph.bfs_edges(root) {
            if self.is_computed(node) {
                continue;
            }
            for ancestor in unresolved_ancestors(self.graph, node) {
                self.compute(ancestor)?;
            }
            self.compute(node)?;
        }

        for node in self.graph.nodes() {
            if !node.is_computed() {
                self.result
                    .diagnostics
                    .push(Diagnostic::UnreachableNode { node: node.id() });
            }
        }

        Ok(())
    }

    fn is_computed(&self, id: NodeId) -> bool {
        self.graph.node(id).is_some_and(|node| node.is_computed())
    }

    /// Compute and record the cost of a node whose predecessors have all been
    /// computed.
    fn compute(&mut self, id: NodeId) -> Result<(), PropagateError> {
        let Some(node) = self.graph.node(id) else {
            return Ok(());
        };
        let name = node.name().to_string();
        let preds = self.graph.predecessors(id);

        let input_dims: Vec<Shape> = if preds.is_empty() {
            node.seed_dims().to_vec()
        } else {
            // Only the first output of each predecessor is used.
            preds
                .iter()
                .filter_map(|&pred| self.graph.node(pred)?.output_dims()?.first().cloned())
                .collect()
        };

        if preds.len() > 1 && input_dims.windows(2).any(|pair| pair[0] != pair[1]) {
            self.result.diagnostics.push(Diagnostic::JoinShapeMismatch {
                node: id,
                shapes: input_dims.clone(),
            });
        }

        let op = self
            .registry
            .read_op(node.op_kind(), node.attributes())
            .map_err(|error| PropagateError::InvalidOperator {
                node: id,
                name: name.clone(),
                error,
            })?;

        if op.reports_extra_inputs() && input_dims.len() > 1 {
            self.result.diagnostics.push(Diagnostic::ExtraInputsIgnored {
                node: id,
                count: input_dims.len() - 1,
            });
        }

        let cost = op.compute(&input_dims).map_err(|error| match error {
            OpError::IncorrectInputCount if input_dims.is_empty() => {
                PropagateError::MissingInputShape {
                    node: id,
                    name: name.clone(),
                }
            }
            error => PropagateError::OperatorFailed {
                node: id,
                name: name.clone(),
                error,
            },
        })?;

        if let Some(node) = self.graph.node_mut(id) {
            node.record_cost(input_dims, cost);
        }
        self.result.order.push(id);

        if self.options.verbose {
            if let Some(report) = NodeReport::for_node(self.graph, id) {
                println!("{}", report);
            }
        }

        Ok(())
    }
}

/// Return the ancestors of `node` which have not been computed yet.
///
/// The search walks backwards from each uncomputed predecessor of `node` until
/// it reaches computed nodes. The result is ordered so that every ID comes
/// after all of its own uncomputed predecessors, ie. it can be computed in
/// sequence.
pub fn unresolved_ancestors(graph: &Graph, node: NodeId) -> Vec<NodeId> {
    let is_pending = |id: NodeId| graph.node(id).is_some_and(|node| !node.is_computed());

    let mut order = Vec::new();
    let mut seen = FxHashSet::default();

    // Depth-first post-order traversal. The flag is true when the entry's
    // predecessors have already been pushed.
    let mut stack: Vec<(NodeId, bool)> = graph
        .predecessors(node)
        .iter()
        .rev()
        .filter(|&&pred| is_pending(pred))
        .map(|&pred| (pred, false))
        .collect();

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        if !seen.insert(id) {
            continue;
        }
        stack.push((id, true));
        for &pred in graph.predecessors(id).iter().rev() {
            if is_pending(pred) && !seen.contains(&pred) {
                stack.push((pred, false));
            }
        }
    }

    order
}
