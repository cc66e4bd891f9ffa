//! Construction of a [`Graph`] from a network document.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{Graph, NodeId, Shape};
use crate::diagnostics::Diagnostic;
use crate::model::{first_line, NetworkDef, NodeDef, ValueDef};

/// Options that control graph construction.
#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    /// Print each node after it is added to the graph.
    pub verbose: bool,
}

/// Map from tensor name to the ID of the node which produced it.
///
/// This only exists while a graph is being built. When several nodes write
/// to the same tensor name, the most recent one is the producer seen by
/// nodes that come after it.
#[derive(Clone, Debug, Default)]
pub struct ConnectionIndex {
    producers: FxHashMap<String, NodeId>,
}

impl ConnectionIndex {
    pub fn new() -> ConnectionIndex {
        ConnectionIndex::default()
    }

    /// Record `node` as the producer of `tensor`, replacing any earlier one.
    pub fn register(&mut self, tensor: &str, node: NodeId) {
        self.producers.insert(tensor.to_string(), node);
    }

    /// Return the node which most recently produced `tensor`.
    pub fn producer(&self, tensor: &str) -> Option<NodeId> {
        self.producers.get(tensor).copied()
    }
}

impl Graph {
    /// Build a graph from the node records in a network document.
    ///
    /// Records are processed in document order and each is assigned the next
    /// node ID. Records in a node's `chain` follow the node they are attached
    /// to, and each is linked to the node before it regardless of the tensor
    /// names it declares.
    pub fn from_network(network: &NetworkDef, options: &BuildOptions) -> Graph {
        let mut builder = GraphBuilder::new(options);
        for record in &network.nodes {
            builder.add_record(record, false);
            for link in &record.chain {
                builder.add_record(link, true);
            }
        }
        builder.graph
    }
}

struct GraphBuilder<'a> {
    graph: Graph,
    index: ConnectionIndex,
    options: &'a BuildOptions,
}

impl<'a> GraphBuilder<'a> {
    fn new(options: &'a BuildOptions) -> Self {
        GraphBuilder {
            graph: Graph::new(),
            index: ConnectionIndex::new(),
            options,
        }
    }

    /// Add a node for `record`. If `chained` is true, the node is also linked
    /// to the previously added node.
    fn add_record(&mut self, record: &NodeDef, chained: bool) -> NodeId {
        let inputs: Vec<(&str, &ValueDef)> =
            record.inputs.iter().flat_map(|decl| decl.tensors()).collect();

        let id = self.graph.add_node(
            first_line(&record.name),
            &record.op_type,
            record.attributes.clone(),
        );

        for &(_, value) in &inputs {
            if let Some(shape) = self.shape_hint(id, value) {
                self.node_mut(id).push_input_hint(shape);
            }
        }

        for output in &record.outputs {
            let Some(value) = output.value.first() else {
                continue;
            };
            if output.value.len() > 1 {
                self.graph.push_diagnostic(Diagnostic::MultipleOutputValues {
                    node: id,
                    output: output.name.clone(),
                    count: output.value.len(),
                });
            }
            self.index.register(value.tensor_name(), id);
            if let Some(shape) = self.shape_hint(id, value) {
                self.node_mut(id).push_output_hint(shape);
            }
        }

        if chained && id != NodeId::ROOT {
            let prev = NodeId::from_u32(id.as_u32() - 1);
            self.graph.add_edge(prev, id);
        }

        for &(tensor, _) in &inputs {
            if let Some(producer) = self.index.producer(tensor) {
                // `add_edge` ignores the case where a node reads a tensor
                // name that it also writes.
                self.graph.add_edge(producer, id);
            }
        }

        if self.options.verbose {
            let node = &self.graph.nodes()[id.as_usize()];
            println!(
                "Node {}: name={:?} op={:?} inputs={:?} preds={:?}",
                id,
                node.name(),
                node.op_kind(),
                node.input_dims(),
                self.graph.predecessors(id)
            );
        }

        id
    }

    fn node_mut(&mut self, id: NodeId) -> &mut super::Node {
        &mut self.graph.nodes[id.as_usize()]
    }

    /// Return the declared shape of `value`, if it has one that is fully
    /// known.
    fn shape_hint(&mut self, id: NodeId, value: &ValueDef) -> Option<Shape> {
        let shape = value.shape()?;
        match shape.fixed_dims() {
            Some(dims) => Some(SmallVec::from_vec(dims)),
            None => {
                self.graph.push_diagnostic(Diagnostic::UnusableShapeHint {
                    node: id,
                    tensor: value.tensor_name().to_string(),
                });
                None
            }
        }
    }
}
