//! Reports of computed node shapes and costs.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::graph::{Graph, NodeId, Shape};

/// Shapes and cost of one computed node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeReport {
    pub predecessors: Vec<u32>,
    pub id: u32,
    pub name: String,
    pub kind: String,
    pub input_dims: Vec<Shape>,
    pub output_dims: Vec<Shape>,
    pub weight_dims: Shape,
    pub op_count: u64,
    pub mac_count: u64,
    pub params: u64,
}

impl NodeReport {
    /// Create a report for a node, or return `None` if the node does not
    /// exist or has not been computed.
    pub fn for_node(graph: &Graph, id: NodeId) -> Option<NodeReport> {
        let node = graph.node(id)?;
        let cost = node.cost()?;
        Some(NodeReport {
            predecessors: graph.predecessors(id).iter().map(|p| p.as_u32()).collect(),
            id: id.as_u32(),
            name: node.name().to_string(),
            kind: node.op_kind().to_string(),
            input_dims: node.input_dims().to_vec(),
            output_dims: cost.output_dims.clone(),
            weight_dims: cost.weight_dims.clone(),
            op_count: cost.op_count,
            mac_count: cost.mac_count,
            params: cost.param_count(),
        })
    }
}

impl fmt::Display for NodeReport {
    /// Format as `<preds> <id> <name> <input dims> <op count> <output dims>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} {} {} {} {}",
            self.predecessors,
            self.id,
            self.name,
            shapes_to_string(&self.input_dims),
            self.op_count,
            shapes_to_string(&self.output_dims)
        )
    }
}

/// Sum of costs over a set of nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CostTotals {
    pub nodes: usize,
    pub op_count: u64,
    pub mac_count: u64,
    pub params: u64,
}

impl CostTotals {
    /// Add a node's costs. Counts saturate at `u64::MAX`.
    fn add(&mut self, node: &NodeReport) {
        self.nodes += 1;
        self.op_count = self.op_count.saturating_add(node.op_count);
        self.mac_count = self.mac_count.saturating_add(node.mac_count);
        self.params = self.params.saturating_add(node.params);
    }
}

/// Report for all computed nodes of a graph.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    /// Per-node reports, in computation order.
    pub nodes: Vec<NodeReport>,
    pub totals: CostTotals,
}

impl Report {
    /// Create a report for the nodes in `order`. Nodes which have not been
    /// computed are skipped.
    pub fn new(graph: &Graph, order: &[NodeId]) -> Report {
        let nodes: Vec<NodeReport> = order
            .iter()
            .filter_map(|&id| NodeReport::for_node(graph, id))
            .collect();
        let mut totals = CostTotals::default();
        for node in &nodes {
            totals.add(node);
        }
        Report { nodes, totals }
    }

    /// Return totals grouped by operator kind, sorted by descending op count
    /// and then by kind.
    pub fn totals_by_kind(&self) -> Vec<(String, CostTotals)> {
        let mut by_kind: FxHashMap<&str, CostTotals> = FxHashMap::default();
        for node in &self.nodes {
            by_kind.entry(node.kind.as_str()).or_default().add(node);
        }
        let mut totals: Vec<(String, CostTotals)> = by_kind
            .into_iter()
            .map(|(kind, totals)| (kind.to_string(), totals))
            .collect();
        totals.sort_by(|(a_kind, a), (b_kind, b)| {
            b.op_count.cmp(&a.op_count).then_with(|| a_kind.cmp(b_kind))
        });
        totals
    }

    /// Return a table of totals by operator kind, followed by a row for the
    /// whole graph.
    pub fn summary(&self) -> impl fmt::Display + '_ {
        SummaryTable {
            rows: self.totals_by_kind(),
            totals: &self.totals,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            writeln!(f, "{}", node)?;
        }
        Ok(())
    }
}

struct SummaryTable<'a> {
    rows: Vec<(String, CostTotals)>,
    totals: &'a CostTotals,
}

impl SummaryTable<'_> {
    const HEADINGS: [&'static str; 5] = ["Kind", "Nodes", "MACs", "Ops", "Params"];

    fn cells(kind: &str, totals: &CostTotals) -> [String; 5] {
        [
            kind.to_string(),
            totals.nodes.to_string(),
            format_count(totals.mac_count),
            format_count(totals.op_count),
            format_count(totals.params),
        ]
    }
}

impl fmt::Display for SummaryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const INDENT: &str = "  ";
        const GAP: usize = 2;

        let mut lines: Vec<[String; 5]> = Vec::with_capacity(self.rows.len() + 3);
        lines.push(Self::HEADINGS.map(String::from));
        lines.push(Default::default());
        lines.extend(
            self.rows
                .iter()
                .map(|(kind, totals)| Self::cells(kind, totals)),
        );
        lines.push(Self::cells("Total", self.totals));

        let mut widths = [0usize; 5];
        for line in &lines {
            for (width, cell) in widths.iter_mut().zip(line) {
                *width = (*width).max(cell.len());
            }
        }
        // The second line is the rule under the headings.
        lines[1] = widths.map(|width| "-".repeat(width));

        for line in &lines {
            write!(f, "{}", INDENT)?;
            for (cell, width) in line.iter().zip(widths) {
                write!(f, "{:<width$}", cell, width = width + GAP)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Format a count with an SI suffix, eg. "1.2 G".
pub fn format_count(n: u64) -> String {
    let n_f = n as f64;
    if n >= 1_000_000_000 {
        format!("{:.2} G", n_f / 1e9)
    } else if n >= 1_000_000 {
        format!("{:.2} M", n_f / 1e6)
    } else if n >= 1000 {
        format!("{:.2} K", n_f / 1e3)
    } else {
        n.to_string()
    }
}

/// Format a tensor shape as a "[dim_0, dim_1, ...]" string.
pub fn shape_to_string(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(|size| size.to_string()).collect();
    format!("[{}]", dims.join(", "))
}

/// Format a list of shapes as a string.
fn shapes_to_string(shapes: &[Shape]) -> String {
    let shapes: Vec<String> = shapes.iter().map(|shape| shape_to_string(shape)).collect();
    format!("[{}]", shapes.join(", "))
}

#[cfg(test)]
mod tests {
    use netcost_testing::{network, NodeFixture, TestCases};
    use serde_json::json;

    use super::{format_count, CostTotals, Report};
    use crate::graph::{BuildOptions, Graph};
    use crate::model::NetworkDef;
    use crate::op_registry::OpRegistry;
    use crate::propagate::{propagate_shapes, PropagateOptions};

    fn analyzed_graph() -> (Graph, Report) {
        let doc = network([
            NodeFixture::new("data", "Input").output_with_shape("data", &[1, 3, 32, 32]),
            NodeFixture::new("conv1", "Convolution")
                .input("data")
                .output("conv1")
                .attr("num_output", json!(16))
                .attr("kernel_size", json!([3]))
                .attr("pad", json!([1])),
            NodeFixture::new("relu1", "ReLU").input("conv1").output("relu1"),
        ]);
        let network: NetworkDef = serde_json::from_value(doc).unwrap();
        let mut graph = Graph::from_network(&network, &BuildOptions::default());
        let result = propagate_shapes(
            &mut graph,
            &OpRegistry::with_all_ops(),
            &PropagateOptions::default(),
        )
        .unwrap();
        let report = Report::new(&graph, &result.order);
        (graph, report)
    }

    #[test]
    fn test_node_report_line() {
        let (_graph, report) = analyzed_graph();
        let lines: Vec<String> = report.nodes.iter().map(|n| n.to_string()).collect();
        assert_eq!(
            lines,
            [
                "[] 0 data [[1, 3, 32, 32]] 3072 [[1, 3, 32, 32]]",
                "[0] 1 conv1 [[1, 3, 32, 32]] 884736 [[1, 16, 32, 32]]",
                "[1] 2 relu1 [[1, 16, 32, 32]] 16384 [[1, 16, 32, 32]]",
            ]
        );
    }

    #[test]
    fn test_totals() {
        let (_graph, report) = analyzed_graph();
        assert_eq!(report.totals.nodes, 3);
        assert_eq!(report.totals.mac_count, 442368);
        assert_eq!(report.totals.op_count, 3072 + 884736 + 16384);
        assert_eq!(report.totals.params, 432);

        let kinds: Vec<_> = report
            .totals_by_kind()
            .into_iter()
            .map(|(kind, totals)| (kind, totals.nodes))
            .collect();
        assert_eq!(
            kinds,
            [
                ("Convolution".to_string(), 1),
                ("ReLU".to_string(), 1),
                ("Input".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_totals_saturate() {
        let (_graph, report) = analyzed_graph();
        let mut node = report.nodes[1].clone();
        node.op_count = u64::MAX - 1;

        let mut totals = CostTotals::default();
        totals.add(&node);
        totals.add(&node);
        assert_eq!(totals.nodes, 2);
        assert_eq!(totals.op_count, u64::MAX);
        assert_eq!(totals.mac_count, 2 * 442368);
    }

    #[test]
    fn test_summary_table() {
        let (_graph, report) = analyzed_graph();
        let summary = report.summary().to_string();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].trim_start().starts_with("Kind"));
        assert!(lines[2].contains("Convolution"));
        assert!(lines[2].contains("442.37 K"));
        assert!(lines[5].contains("Total"));
    }

    #[test]
    fn test_json_report() {
        let (_graph, report) = analyzed_graph();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["nodes"][1]["name"], "conv1");
        assert_eq!(json["nodes"][1]["output_dims"], json!([[1, 16, 32, 32]]));
        assert_eq!(json["nodes"][1]["weight_dims"], json!([3, 3, 3, 16]));
        assert_eq!(json["totals"]["mac_count"], 442368);
    }

    #[test]
    fn test_format_count() {
        #[derive(Debug)]
        struct Case {
            n: u64,
            expected: &'static str,
        }

        let cases = [
            Case { n: 12, expected: "12" },
            Case {
                n: 5120,
                expected: "5.12 K",
            },
            Case {
                n: 884736,
                expected: "884.74 K",
            },
            Case {
                n: 3_860_000_000,
                expected: "3.86 G",
            },
        ];

        cases.test_each(|case| assert_eq!(format_count(case.n), case.expected));
    }
}
