use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashSet;
use serde_json::Value;
use smallvec::SmallVec;

use crate::diagnostics::Diagnostic;
use crate::model::AttributeDef;
use crate::ops::OpCost;

mod build;


pub use build::{BuildOptions, ConnectionIndex};

/// Sizes of a tensor's dimensions, outermost first.
pub type Shape = SmallVec<[usize; 4]>;

/// ID of a node in a [`Graph`].
///
/// IDs are assigned in the order nodes are discovered while building the
/// graph, starting from zero.
#[derive(Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(u32);

impl NodeId {
    /// ID of the node where shape propagation starts.
    pub const ROOT: NodeId = NodeId(0);

    pub fn from_u32(value: u32) -> NodeId {
        NodeId(value)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Return the ID as a usize, for slice indexing.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// An operator instance in the graph.
///
/// The identity, operator kind and attributes are fixed when the node is
/// created. Input shapes can be seeded during graph construction and are
/// replaced by the outputs of the node's predecessors when its cost is
/// computed. The cost is recorded exactly once.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    op_kind: String,
    attributes: Vec<AttributeDef>,
    input_dims: Vec<Shape>,
    output_hints: Vec<Shape>,
    cost: Option<OpCost>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operator type tag, eg. "Convolution".
    pub fn op_kind(&self) -> &str {
        &self.op_kind
    }

    /// Attributes as declared in the network document.
    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    /// Return the value of the attribute named `name`.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }

    /// Shapes of this node's inputs.
    ///
    /// Before the cost is computed these are the shapes declared in the
    /// document, if any.
    pub fn input_dims(&self) -> &[Shape] {
        &self.input_dims
    }

    /// Shapes declared for this node's outputs in the document.
    pub fn output_hints(&self) -> &[Shape] {
        &self.output_hints
    }

    /// Computed output shapes, or `None` if the node has not been visited.
    pub fn output_dims(&self) -> Option<&[Shape]> {
        self.cost.as_ref().map(|cost| cost.output_dims.as_slice())
    }

    pub fn cost(&self) -> Option<&OpCost> {
        self.cost.as_ref()
    }

    pub fn is_computed(&self) -> bool {
        self.cost.is_some()
    }

    /// Shapes used as inputs when this node has no predecessors: the declared
    /// input shapes, or failing that, the declared output shapes.
    pub(crate) fn seed_dims(&self) -> &[Shape] {
        if self.input_dims.is_empty() {
            &self.output_hints
        } else {
            &self.input_dims
        }
    }

    pub(crate) fn push_input_hint(&mut self, shape: Shape) {
        self.input_dims.push(shape);
    }

    pub(crate) fn push_output_hint(&mut self, shape: Shape) {
        self.output_hints.push(shape);
    }

    /// Record the resolved inputs and computed cost of this node.
    ///
    /// Panics if the cost has already been recorded.
    pub(crate) fn record_cost(&mut self, input_dims: Vec<Shape>, cost: OpCost) {
        assert!(
            self.cost.is_none(),
            "cost of node {} (\"{}\") recorded twice",
            self.id,
            self.name
        );
        self.input_dims = input_dims;
        self.cost = Some(cost);
    }
}

/// Directed graph of operators, where an edge `(a, b)` means that node `b`
/// consumes a tensor produced by node `a`.
///
/// Nodes are stored in an arena indexed by [`NodeId`]. Nodes and edges are
/// never removed.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,

    /// Edges in insertion order.
    edges: Vec<(NodeId, NodeId)>,
    edge_set: FxHashSet<(NodeId, NodeId)>,

    /// Predecessors and successors of each node, in edge insertion order.
    predecessors: Vec<Vec<NodeId>>,
    successors: Vec<Vec<NodeId>>,

    diagnostics: Vec<Diagnostic>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Graph {
        Graph::default()
    }

    /// Add an operator node and return its ID.
    pub fn add_node(&mut self, name: &str, op_kind: &str, attributes: Vec<AttributeDef>) -> NodeId {
        let id = NodeId::from_u32(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            name: name.to_string(),
            op_kind: op_kind.to_string(),
            attributes,
            input_dims: Vec::new(),
            output_hints: Vec::new(),
            cost: None,
        });
        self.predecessors.push(Vec::new());
        self.successors.push(Vec::new());
        id
    }

    /// Add an edge from `producer` to `consumer`.
    ///
    /// Returns false if the edge was not added because it already exists or
    /// would be a self-loop.
    ///
    /// Panics if either node does not exist.
    pub fn add_edge(&mut self, producer: NodeId, consumer: NodeId) -> bool {
        assert!(
            producer.as_usize() < self.nodes.len() && consumer.as_usize() < self.nodes.len(),
            "edge ({}, {}) references a missing node",
            producer,
            consumer
        );
        if producer == consumer || !self.edge_set.insert((producer, consumer)) {
            return false;
        }
        self.edges.push((producer, consumer));
        self.successors[producer.as_usize()].push(consumer);
        self.predecessors[consumer.as_usize()].push(producer);
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_usize())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.as_usize())
    }

    /// Return all nodes, ordered by ID.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return all edges in the order they were added.
    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    pub fn has_edge(&self, producer: NodeId, consumer: NodeId) -> bool {
        self.edge_set.contains(&(producer, consumer))
    }

    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        self.predecessors
            .get(id.as_usize())
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        self.successors
            .get(id.as_usize())
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
    }

    /// Return the node where shape propagation starts, or `None` if the graph
    /// is empty.
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId::ROOT)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Non-fatal problems found while building the graph.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Return the edges of a breadth-first search tree rooted at `source`.
    ///
    /// Each node reachable from `source` appears as the consumer of exactly
    /// one edge, in the order nodes are discovered. Successors are explored
    /// in edge insertion order.
    pub fn bfs_edges(&self, source: NodeId) -> Vec<(NodeId, NodeId)> {
        let mut tree_edges = Vec::new();
        if self.node(source).is_none() {
            return tree_edges;
        }

        let mut discovered = vec![false; self.nodes.len()];
        discovered[source.as_usize()] = true;

        let mut queue = VecDeque::from([source]);
        while let Some(id) = queue.pop_front() {
            for &succ in self.successors(id) {
                if !discovered[succ.as_usize()] {
                    discovered[succ.as_usize()] = true;
                    tree_edges.push((id, succ));
                    queue.push_back(succ);
                }
            }
        }

        tree_edges
    }
}
