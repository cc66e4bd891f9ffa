use std::error::Error;
use std::fmt::{Display, Formatter};

use rustc_hash::FxHashMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::graph::Shape;
use crate::model::AttributeDef;
use crate::ops::{self, Op};

/// Registry which maps operator type tags to functions that read the
/// operator's attributes.
///
/// New registries have no operators registered. To create a registry with all
/// built-in cost models registered, use [`OpRegistry::with_all_ops`].
/// Operator types that are not registered are read as [`Op::Other`], which
/// uses the default shape-preserving cost model.
#[derive(Default)]
pub struct OpRegistry {
    /// Map from operator type (the `type` field of a node record) to
    /// attribute reading function.
    ops: FxHashMap<&'static str, Box<ReadOpFunction>>,
}

type ReadOpFunction = dyn Fn(&Attrs) -> Result<Op, ReadOpError>;

impl OpRegistry {
    /// Create a new empty registry.
    pub fn new() -> OpRegistry {
        OpRegistry {
            ops: FxHashMap::default(),
        }
    }

    /// Register a function which reads operators of type `op_type`.
    ///
    /// This replaces any existing registration for the type. It can also be
    /// used to alias a type tag to a built-in cost model.
    pub fn register(
        &mut self,
        op_type: &'static str,
        read: impl Fn(&Attrs) -> Result<Op, ReadOpError> + 'static,
    ) {
        self.ops.insert(op_type, Box::new(read));
    }

    /// Return true if `op_type` has a registered reader.
    pub fn is_registered(&self, op_type: &str) -> bool {
        self.ops.contains_key(op_type)
    }

    /// Create an operator of type `op_type` from its attributes.
    pub fn read_op(&self, op_type: &str, attrs: &[AttributeDef]) -> Result<Op, ReadOpError> {
        match self.ops.get(op_type) {
            Some(read_fn) => read_fn(&Attrs::new(attrs)),
            None => Ok(Op::Other(op_type.to_string())),
        }
    }

    /// Create a new registry with all built-in operators registered.
    pub fn with_all_ops() -> OpRegistry {
        let mut reg = OpRegistry::new();

        macro_rules! register_op {
            ($op_type:literal, read = $read:ident) => {
                reg.register($op_type, $read)
            };

            ($op_type:literal, $op:expr) => {
                reg.register($op_type, |_attrs: &Attrs| Ok($op))
            };
        }

        register_op!("BatchNorm", Op::BatchNorm);
        register_op!("Convolution", read = read_conv);
        register_op!("Eltwise", Op::Eltwise);
        register_op!("InnerProduct", read = read_inner_product);
        register_op!("Input", read = read_input);
        register_op!("Pooling", read = read_pooling);
        register_op!("ReLU", Op::Relu);
        register_op!("Scale", Op::Scale);
        register_op!("Softmax", Op::Softmax);

        reg
    }
}

/// Error type for errors that occur when reading an operator's attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadOpError {
    /// An attribute is missing or has an unsupported or invalid value.
    AttrError {
        /// Name of the attribute.
        attr: String,
        /// Description of the attribute error.
        error: String,
    },
}

impl ReadOpError {
    fn attr_error(attr: impl AsRef<str>, error: impl AsRef<str>) -> Self {
        Self::AttrError {
            attr: attr.as_ref().to_string(),
            error: error.as_ref().to_string(),
        }
    }
}

impl Display for ReadOpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadOpError::AttrError { attr, error } => {
                write!(f, "error in attribute \"{}\": {}", attr, error)
            }
        }
    }
}

impl Error for ReadOpError {}

/// Wrapper around the attributes of a node.
///
/// This provides methods to find attributes by name and convert them to a
/// target type.
pub struct Attrs<'a> {
    attrs: &'a [AttributeDef],
}

impl<'a> Attrs<'a> {
    pub fn new(attrs: &'a [AttributeDef]) -> Self {
        Self { attrs }
    }

    /// Get an optional attribute.
    pub fn get(&self, name: &'static str) -> Option<Attr<'a>> {
        let attr = self.attrs.iter().find(|attr| attr.name == name)?;
        Some(Attr::new(name, &attr.value))
    }

    /// Get a required attribute.
    pub fn require(&self, name: &'static str) -> Result<Attr<'a>, ReadOpError> {
        self.get(name)
            .ok_or_else(|| ReadOpError::attr_error(name, "required attribute missing"))
    }
}

/// Whether a bare number is accepted where a `[height, width]` pair is
/// expected.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ScalarPair {
    Accept,
    Reject,
}

/// Wrapper around an attribute value.
///
/// This provides methods to extract the value of a given type.
#[derive(Copy, Clone)]
pub struct Attr<'a> {
    name: &'static str,
    value: &'a Value,
}

impl<'a> Attr<'a> {
    fn new(name: &'static str, value: &'a Value) -> Self {
        Self { name, value }
    }

    pub fn is_empty_list(&self) -> bool {
        self.value.as_array().is_some_and(|values| values.is_empty())
    }

    pub fn as_usize(&self) -> Result<usize, ReadOpError> {
        self.value
            .as_u64()
            .map(|val| val as usize)
            .ok_or_else(|| ReadOpError::attr_error(self.name, "expected a non-negative integer"))
    }

    pub fn as_usize_list(&self) -> Result<Vec<usize>, ReadOpError> {
        let values = self
            .value
            .as_array()
            .ok_or_else(|| ReadOpError::attr_error(self.name, "expected a list"))?;
        values
            .iter()
            .map(|val| {
                val.as_u64().map(|val| val as usize).ok_or_else(|| {
                    ReadOpError::attr_error(self.name, "expected a list of non-negative integers")
                })
            })
            .collect()
    }

    /// Get the value of a `[height, width]` attribute.
    ///
    /// A single-element list is broadcast to both axes. Entries after the
    /// second are ignored.
    pub fn as_pair(&self, scalar: ScalarPair) -> Result<[usize; 2], ReadOpError> {
        if self.value.is_number() {
            return match scalar {
                ScalarPair::Accept => self.as_usize().map(|val| [val, val]),
                ScalarPair::Reject => Err(ReadOpError::attr_error(self.name, "expected a list")),
            };
        }
        match self.as_usize_list()?.as_slice() {
            [] => Err(ReadOpError::attr_error(self.name, "expected at least one value")),
            [val] => Ok([*val, *val]),
            [h, w, ..] => Ok([*h, *w]),
        }
    }

    /// Get the value of a shape attribute, given either as a list of sizes or
    /// as a list of `{"dim": [...]}` objects, of which the first is used.
    pub fn as_shape(&self) -> Result<Shape, ReadOpError> {
        let first_dims = self
            .value
            .as_array()
            .and_then(|values| values.first())
            .and_then(|first| first.get("dim"));
        let dims = match first_dims {
            Some(dims) => Attr::new(self.name, dims).as_usize_list()?,
            None => self.as_usize_list()?,
        };
        Ok(SmallVec::from_vec(dims))
    }
}

/// Spatial parameters shared by convolution and pooling.
struct WindowAttrs {
    kernel_size: [usize; 2],
    stride: [usize; 2],
    pad: [usize; 2],
    dilation: [usize; 2],
}

fn get_common_window_attrs(attrs: &Attrs, scalar: ScalarPair) -> Result<WindowAttrs, ReadOpError> {
    let pair_or = |name, default| -> Result<[usize; 2], ReadOpError> {
        match attrs.get(name) {
            Some(attr) => attr.as_pair(scalar),
            None => Ok(default),
        }
    };

    let kernel_size = attrs.require("kernel_size")?.as_pair(scalar)?;
    let stride = pair_or("stride", [1, 1])?;
    let pad = pair_or("pad", [0, 0])?;
    let dilation = match attrs.get("dilation") {
        Some(attr) if attr.is_empty_list() => [1, 1],
        Some(attr) => attr.as_pair(scalar)?,
        None => [1, 1],
    };

    Ok(WindowAttrs {
        kernel_size,
        stride,
        pad,
        dilation,
    })
}

fn read_conv(attrs: &Attrs) -> Result<Op, ReadOpError> {
    let WindowAttrs {
        kernel_size,
        stride,
        pad,
        dilation,
    } = get_common_window_attrs(attrs, ScalarPair::Reject)?;
    let num_output = attrs.require("num_output")?.as_usize()?;

    Ok(Op::Convolution(ops::Conv {
        num_output,
        kernel_size,
        stride,
        pad,
        dilation,
    }))
}

fn read_pooling(attrs: &Attrs) -> Result<Op, ReadOpError> {
    let WindowAttrs {
        kernel_size,
        stride,
        pad,
        dilation,
    } = get_common_window_attrs(attrs, ScalarPair::Accept)?;

    Ok(Op::Pooling(ops::Pooling {
        kernel_size,
        stride,
        pad,
        dilation,
    }))
}

fn read_inner_product(attrs: &Attrs) -> Result<Op, ReadOpError> {
    let num_output = attrs.require("num_output")?.as_usize()?;
    Ok(Op::InnerProduct(ops::InnerProduct { num_output }))
}

fn read_input(attrs: &Attrs) -> Result<Op, ReadOpError> {
    let shape = attrs.get("shape").map(|attr| attr.as_shape()).transpose()?;
    Ok(Op::Input(ops::Input { shape }))
}
