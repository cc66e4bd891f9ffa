//! Builders for network documents used in tests.

use serde_json::{json, Value};

/// Builder for one node record of a network document.
///
/// ```
/// use netcost_testing::{network, NodeFixture};
///
/// let doc = network([
///     NodeFixture::new("data", "Input").output_with_shape("data", &[1, 3, 8, 8]),
///     NodeFixture::new("relu", "ReLU").input("data").output("relu"),
/// ]);
/// assert_eq!(doc["nodes"][1]["inputs"][0]["value"][0]["name"], "data");
/// ```
#[derive(Clone, Debug)]
pub struct NodeFixture {
    name: String,
    op_type: String,
    attributes: Vec<Value>,
    inputs: Vec<Value>,
    outputs: Vec<Value>,
    chain: Vec<NodeFixture>,
}

impl NodeFixture {
    pub fn new(name: &str, op_type: &str) -> NodeFixture {
        NodeFixture {
            name: name.to_string(),
            op_type: op_type.to_string(),
            attributes: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            chain: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: Value) -> Self {
        self.attributes.push(json!({ "name": name, "value": value }));
        self
    }

    /// Add an input declaration that reads `tensor`.
    pub fn input(mut self, tensor: &str) -> Self {
        self.inputs.push(group("input", &[value(tensor, None)]));
        self
    }

    /// Add an input declaration that reads `tensor` with a declared shape.
    pub fn input_with_shape(mut self, tensor: &str, shape: &[usize]) -> Self {
        self.inputs.push(group("input", &[value(tensor, Some(json!(shape)))]));
        self
    }

    /// Add an input declaration consisting of a nested list of groups, one
    /// per tensor.
    pub fn nested_input(mut self, tensors: &[&str]) -> Self {
        let groups: Vec<Value> = tensors
            .iter()
            .map(|tensor| group(tensor, &[value(tensor, None)]))
            .collect();
        self.inputs.push(Value::Array(groups));
        self
    }

    /// Add an input declaration consisting of a nested list of groups, where
    /// each entry is a group name and the names of the values it lists.
    pub fn nested_groups(mut self, groups: &[(&str, &[&str])]) -> Self {
        let groups: Vec<Value> = groups
            .iter()
            .map(|(name, tensors)| {
                let values: Vec<Value> = tensors.iter().map(|tensor| value(tensor, None)).collect();
                group(name, &values)
            })
            .collect();
        self.inputs.push(Value::Array(groups));
        self
    }

    /// Add an output declaration that writes `tensor`.
    pub fn output(mut self, tensor: &str) -> Self {
        self.outputs.push(group("output", &[value(tensor, None)]));
        self
    }

    /// Add an output declaration that writes `tensor` with a declared shape.
    pub fn output_with_shape(mut self, tensor: &str, shape: &[usize]) -> Self {
        self.outputs.push(group("output", &[value(tensor, Some(json!(shape)))]));
        self
    }

    /// Add an output declaration that lists several values.
    pub fn output_values(mut self, tensors: &[&str]) -> Self {
        let values: Vec<Value> = tensors.iter().map(|tensor| value(tensor, None)).collect();
        self.outputs.push(group("output", &values));
        self
    }

    /// Attach a fused operator to this node.
    pub fn chain(mut self, link: NodeFixture) -> Self {
        self.chain.push(link);
        self
    }

    /// Return the JSON record for this node.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "type": self.op_type,
            "attributes": self.attributes,
            "inputs": self.inputs,
            "outputs": self.outputs,
            "chain": self.chain.iter().map(|link| link.to_json()).collect::<Vec<_>>(),
        })
    }
}

/// Return a network document containing `nodes`.
pub fn network(nodes: impl IntoIterator<Item = NodeFixture>) -> Value {
    let nodes: Vec<Value> = nodes.into_iter().map(|node| node.to_json()).collect();
    json!({ "nodes": nodes })
}

fn group(name: &str, values: &[Value]) -> Value {
    json!({ "name": name, "value": values })
}

fn value(tensor: &str, shape: Option<Value>) -> Value {
    match shape {
        Some(dims) => json!({
            "name": tensor,
            "type": { "dataType": "float32", "shape": { "dimensions": dims } },
        }),
        None => json!({ "name": tensor }),
    }
}
