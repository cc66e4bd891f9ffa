//! Export of graphs in Graphviz DOT format.

use std::io::{self, Write};

use crate::graph::{Graph, Node};
use crate::report::shape_to_string;

/// Write `graph` to `out` as a Graphviz digraph.
///
/// Each node is labeled with its ID, name and operator kind, plus its first
/// output shape if it has been computed. Nodes which have not been computed
/// are drawn dashed.
pub fn write_dot<W: Write>(graph: &Graph, out: &mut W) -> io::Result<()> {
    writeln!(out, "digraph Network {{")?;
    writeln!(out, "    rankdir=TB;")?;
    writeln!(out, "    node [shape=box];")?;

    for node in graph.nodes() {
        let style = if node.is_computed() { "" } else { ", style=dashed" };
        writeln!(
            out,
            "    n{} [label=\"{}\"{}];",
            node.id(),
            escape(&node_label(node)),
            style
        )?;
    }

    for (producer, consumer) in graph.edges() {
        writeln!(out, "    n{} -> n{};", producer, consumer)?;
    }

    writeln!(out, "}}")
}

/// Return `graph` formatted as a Graphviz digraph.
pub fn to_dot(graph: &Graph) -> String {
    let mut buf = Vec::new();
    // Writing to a `Vec` cannot fail.
    let _ = write_dot(graph, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn node_label(node: &Node) -> String {
    let mut label = format!("{}: {}\n{}", node.id(), node.name(), node.op_kind());
    if let Some(shape) = node.output_dims().and_then(|dims| dims.first()) {
        label.push('\n');
        label.push_str(&shape_to_string(shape));
    }
    label
}

fn escape(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());
    for ch in label.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            ch => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use netcost_testing::{network, NodeFixture};

    use super::{escape, to_dot};
    use crate::graph::{BuildOptions, Graph};
    use crate::model::NetworkDef;
    use crate::op_registry::OpRegistry;
    use crate::propagate::{propagate_shapes, PropagateOptions};

    fn build(doc: serde_json::Value) -> Graph {
        let network: NetworkDef = serde_json::from_value(doc).unwrap();
        Graph::from_network(&network, &BuildOptions::default())
    }

    #[test]
    fn test_to_dot() {
        let mut graph = build(network([
            NodeFixture::new("data", "Input").output_with_shape("data", &[1, 3, 8, 8]),
            NodeFixture::new("relu", "ReLU").input("data").output("relu"),
            NodeFixture::new("orphan", "ReLU").input("missing").output("orphan"),
        ]));
        propagate_shapes(
            &mut graph,
            &OpRegistry::with_all_ops(),
            &PropagateOptions::default(),
        )
        .unwrap();

        let dot = to_dot(&graph);
        assert!(dot.starts_with("digraph Network {\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("n0 [label=\"0: data\\nInput\\n[1, 3, 8, 8]\"];"));
        assert!(dot.contains("n1 [label=\"1: relu\\nReLU\\n[1, 3, 8, 8]\"];"));
        assert!(dot.contains("n2 [label=\"2: orphan\\nReLU\", style=dashed];"));
        assert!(dot.contains("n0 -> n1;"));
        assert_eq!(dot.matches("->").count(), 1);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a\"b"), "a\\\"b");
        assert_eq!(escape("a\\b"), "a\\\\b");
        assert_eq!(escape("a\nb"), "a\\nb");
        assert_eq!(escape("plain"), "plain");
    }
}
