//! Operator descriptors
//!
//! An [`OperatorDef`] names a computation, its input and output blobs, its
//! arguments and the device kind it runs on. Arguments are fixed when the
//! operator is constructed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OpsError, OpsResult};

/// Device kinds operators are registered for
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceKind {
    /// Custom HIP kernels
    #[default]
    Hip,
    /// Vendor normalization library
    Miopen,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Hip => write!(f, "HIP"),
            DeviceKind::Miopen => write!(f, "MIOPEN"),
        }
    }
}

/// Value of one operator argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Strings(Vec<String>),
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        ArgValue::Int(v as i64)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<f32> for ArgValue {
    fn from(v: f32) -> Self {
        ArgValue::Float(v as f64)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<Vec<i64>> for ArgValue {
    fn from(v: Vec<i64>) -> Self {
        ArgValue::Ints(v)
    }
}

impl From<Vec<f64>> for ArgValue {
    fn from(v: Vec<f64>) -> Self {
        ArgValue::Floats(v)
    }
}

impl From<Vec<&str>> for ArgValue {
    fn from(v: Vec<&str>) -> Self {
        ArgValue::Strings(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ArgValue {
    fn from(v: Vec<String>) -> Self {
        ArgValue::Strings(v)
    }
}

/// Types an argument value can be read as
pub trait FromArgument: Sized {
    fn from_argument(value: &ArgValue) -> Option<Self>;
}

impl FromArgument for i64 {
    fn from_argument(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Int(v) => Some(*v),
            ArgValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }
}

impl FromArgument for i32 {
    fn from_argument(value: &ArgValue) -> Option<Self> {
        i64::from_argument(value).and_then(|v| i32::try_from(v).ok())
    }
}

impl FromArgument for usize {
    fn from_argument(value: &ArgValue) -> Option<Self> {
        i64::from_argument(value).and_then(|v| usize::try_from(v).ok())
    }
}

impl FromArgument for bool {
    fn from_argument(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Bool(v) => Some(*v),
            ArgValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl FromArgument for f64 {
    fn from_argument(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(v) => Some(*v),
            ArgValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl FromArgument for f32 {
    fn from_argument(value: &ArgValue) -> Option<Self> {
        f64::from_argument(value).map(|v| v as f32)
    }
}

impl FromArgument for String {
    fn from_argument(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromArgument for Vec<i64> {
    fn from_argument(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Ints(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromArgument for Vec<String> {
    fn from_argument(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Strings(v) => Some(v.clone()),
            // An empty list deserializes as Ints
            ArgValue::Ints(v) if v.is_empty() => Some(Vec::new()),
            _ => None,
        }
    }
}

/// A named argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: ArgValue,
}

/// Descriptor of one operator instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorDef {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub device: DeviceKind,
}

impl OperatorDef {
    pub fn new(op_type: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        OperatorDef {
            op_type: op_type.to_string(),
            name: String::new(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            args: Vec::new(),
            device: DeviceKind::Hip,
        }
    }

    pub fn with_arg(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.args.push(Argument {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn with_device(mut self, device: DeviceKind) -> Self {
        self.device = device;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Last value given for `name`
    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.args
            .iter()
            .rev()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.arg(name).is_some()
    }

    /// Argument value, or `default` when absent
    pub fn get_single_argument<T: FromArgument>(&self, name: &str, default: T) -> OpsResult<T> {
        match self.arg(name) {
            None => Ok(default),
            Some(value) => self.convert_argument(name, value),
        }
    }

    pub fn get_required_argument<T: FromArgument>(&self, name: &str) -> OpsResult<T> {
        let value = self.arg(name).ok_or_else(|| {
            OpsError::MissingArgument(format!("{} requires argument '{}'", self.op_type, name))
        })?;
        self.convert_argument(name, value)
    }

    fn convert_argument<T: FromArgument>(&self, name: &str, value: &ArgValue) -> OpsResult<T> {
        T::from_argument(value).ok_or_else(|| {
            OpsError::InvalidArgument(format!(
                "{}: argument '{}' has unexpected value {:?}",
                self.op_type, name, value
            ))
        })
    }
}
