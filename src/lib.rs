//! netcost estimates the compute cost of neural networks.
//!
//! It reads a network exported from a model viewer as JSON (see [`model`]),
//! builds a directed graph of operators and propagates tensor shapes through
//! it, starting from the first node. For each operator it computes the output
//! shape, the shape of its weights and the number of arithmetic operations
//! and multiply-accumulates (MACs) needed to evaluate it.
//!
//! # Usage
//!
//! The simplest way to analyze a network is [`analyze_file`]:
//!
//! ```no_run
//! use netcost::{analyze_file, AnalysisOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let analysis = analyze_file("network.json", &AnalysisOptions::default())?;
//! let report = analysis.report();
//! print!("{}", report);
//! println!("Total MACs: {}", report.totals.mac_count);
//! # Ok(())
//! # }
//! ```
//!
//! The individual steps can also be run separately:
//!
//! 1. Parse the document with [`model::load_network`] or
//!    [`model::parse_network`].
//! 2. Build a graph with [`Graph::from_network`].
//! 3. Compute shapes and costs with [`propagate_shapes`], using the
//!    operators registered in an [`OpRegistry`].
//! 4. Summarize the results with [`Report`] or export the graph with
//!    [`dot::write_dot`].
//!
//! # Supported operators
//!
//! Cost formulas are implemented for `Convolution`, `Pooling` and
//! `InnerProduct`. `Input`, `BatchNorm`, `Scale`, `ReLU`, `Softmax` and
//! `Eltwise` preserve the shape of their first input and cost one operation
//! per output element. Operators of any other type are treated in the same
//! way as the element-wise operators.
//!
//! Problems which do not prevent the analysis from completing, such as a
//! node which cannot be reached from the first node, are reported as
//! [`Diagnostic`]s.

use std::path::Path;

mod diagnostics;
mod error;
mod graph;
mod op_registry;
mod propagate;
mod report;

pub mod dot;
pub mod model;
pub mod ops;

pub use diagnostics::Diagnostic;
pub use error::AnalysisError;
pub use graph::{BuildOptions, ConnectionIndex, Graph, Node, NodeId, Shape};
pub use model::{LoadError, NetworkDef};
pub use op_registry::{Attr, Attrs, OpRegistry, ReadOpError, ScalarPair};
pub use ops::{Op, OpCost, OpError};
pub use propagate::{
    propagate_shapes, unresolved_ancestors, PropagateError, PropagateOptions, Propagation,
};
pub use report::{format_count, shape_to_string, CostTotals, NodeReport, Report};

/// Options for [`analyze`] and [`analyze_file`].
#[derive(Clone, Debug, Default)]
pub struct AnalysisOptions {
    /// Print each node as it is added to the graph and as its cost is
    /// computed.
    pub verbose: bool,
}

/// The result of analyzing a network.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// Graph with the computed shape and cost of each reachable node.
    pub graph: Graph,
    pub propagation: Propagation,
}

impl Analysis {
    /// Return a report for the computed nodes, in the order they were
    /// computed.
    pub fn report(&self) -> Report {
        Report::new(&self.graph, &self.propagation.order)
    }

    /// Return the diagnostics from graph construction followed by those from
    /// shape propagation.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.graph
            .diagnostics()
            .iter()
            .chain(self.propagation.diagnostics.iter())
    }
}

/// Build the graph for a network and compute the cost of each node, using
/// the standard set of operators.
pub fn analyze(network: &NetworkDef, options: &AnalysisOptions) -> Result<Analysis, PropagateError> {
    let build_opts = BuildOptions {
        verbose: options.verbose,
    };
    let mut graph = Graph::from_network(network, &build_opts);

    let registry = OpRegistry::with_all_ops();
    let propagate_opts = PropagateOptions {
        verbose: options.verbose,
    };
    let propagation = propagate_shapes(&mut graph, &registry, &propagate_opts)?;

    Ok(Analysis { graph, propagation })
}

/// Load a network document from a file and analyze it.
///
/// See [`analyze`].
pub fn analyze_file(
    path: impl AsRef<Path>,
    options: &AnalysisOptions,
) -> Result<Analysis, AnalysisError> {
    let network = model::load_network(path)?;
    Ok(analyze(&network, options)?)
}
