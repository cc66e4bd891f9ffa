//! Types describing a serialized network document.
//!
//! A document is a JSON object with a `nodes` array. Each entry describes one
//! operator: its name, operator type, attributes, the tensors it reads and
//! writes and optionally a `chain` of fused operators which are applied to
//! its output. This is the format produced when exporting a Caffe-style
//! network from a model viewer.
//!
//! These types mirror the document closely and perform no validation. They
//! are converted into a [`Graph`](crate::Graph) by
//! [`Graph::from_network`](crate::Graph::from_network).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

mod load_error;

pub use load_error::LoadError;

/// Top-level network document.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NetworkDef {
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
}

/// One operator record in a network document.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NodeDef {
    /// Display name. Only the first line is significant.
    #[serde(default)]
    pub name: String,

    /// Operator type tag, eg. "Convolution".
    #[serde(rename = "type", default, deserialize_with = "op_type_name")]
    pub op_type: String,

    #[serde(default)]
    pub attributes: Vec<AttributeDef>,

    #[serde(default)]
    pub inputs: Vec<InputDecl>,

    #[serde(default)]
    pub outputs: Vec<ValueGroup>,

    /// Fused operators applied in sequence to this operator's output.
    #[serde(default)]
    pub chain: Vec<NodeDef>,
}

/// A named attribute. Values are kept as raw JSON and interpreted by the
/// operator registry.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AttributeDef {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl AttributeDef {
    pub fn new(name: &str, value: impl Into<Value>) -> AttributeDef {
        AttributeDef {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// An input declaration. This is either a single group of values, or a
/// list of groups which together form one multi-tensor input.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum InputDecl {
    Group(ValueGroup),
    Nested(Vec<ValueGroup>),
}

impl InputDecl {
    /// Iterate over the tensors read by this declaration, as pairs of tensor
    /// name and value.
    ///
    /// For a single group each value is read under its own name. In a nested
    /// list, each group is read under the group's name, once per value it
    /// contains.
    pub fn tensors(&self) -> Box<dyn Iterator<Item = (&str, &ValueDef)> + '_> {
        match self {
            InputDecl::Group(group) => Box::new(
                group
                    .value
                    .iter()
                    .map(|value| (value.tensor_name(), value)),
            ),
            InputDecl::Nested(groups) => Box::new(groups.iter().flat_map(|group| {
                let name = first_line(&group.name);
                group.value.iter().map(move |value| (name, value))
            })),
        }
    }
}

/// A named argument of an operator (eg. "input", "weights") and the tensor
/// values bound to it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ValueGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Vec<ValueDef>,
}

/// A tensor value, identified by name.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ValueDef {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: Option<TypeDef>,
}

impl ValueDef {
    /// Return the tensor name, with everything after the first line removed.
    pub fn tensor_name(&self) -> &str {
        first_line(&self.name)
    }

    /// Return the declared shape of this value, if the document supplies one.
    pub fn shape(&self) -> Option<&ShapeDef> {
        self.value_type.as_ref().and_then(|t| t.shape.as_ref())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TypeDef {
    #[serde(rename = "dataType", default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub shape: Option<ShapeDef>,
}

/// Declared tensor shape.
///
/// Dimensions are kept as raw JSON since documents may contain symbolic
/// sizes (eg. `"batch"`) or `null` for unknown sizes.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ShapeDef {
    Mapping { dimensions: Vec<Value> },
    Dims(Vec<Value>),
}

impl ShapeDef {
    /// Return the dimension sizes, or `None` if any dimension is not a
    /// non-negative integer.
    pub fn fixed_dims(&self) -> Option<Vec<usize>> {
        let dims = match self {
            ShapeDef::Mapping { dimensions } => dimensions,
            ShapeDef::Dims(dims) => dims,
        };
        dims.iter()
            .map(|dim| dim.as_u64().map(|size| size as usize))
            .collect()
    }
}

/// Return the first line of a possibly multi-line name.
pub fn first_line(name: &str) -> &str {
    name.lines().next().unwrap_or_default()
}

/// Accept the operator type either as a plain string or as an object with
/// a `name` field.
fn op_type_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OpTypeTag {
        Name(String),
        Object { name: String },
    }

    Ok(match OpTypeTag::deserialize(deserializer)? {
        OpTypeTag::Name(name) => name,
        OpTypeTag::Object { name } => name,
    })
}

/// Parse a network document from a JSON string.
pub fn parse_network(json: &str) -> Result<NetworkDef, LoadError> {
    serde_json::from_str(json).map_err(LoadError::Parse)
}

/// Read and parse a network document from a file.
pub fn load_network(path: impl AsRef<Path>) -> Result<NetworkDef, LoadError> {
    let json = fs::read_to_string(path).map_err(LoadError::Io)?;
    parse_network(&json)
}
