//! Element types and attributes of dataset variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name that is not a known [`DataType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown data type: {0}")]
pub struct UnknownDataType(pub String);

/// Element type of a variable in the source dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Signed 8-bit integer.
    Byte,
    /// 8-bit character.
    Char,
    /// Signed 16-bit integer.
    Short,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// Variable-length string.
    String,
}

impl DataType {
    /// Size of one element in bytes, or `None` for variable-length strings.
    pub fn element_size(&self) -> Option<u64> {
        match self {
            Self::Byte | Self::Char => Some(1),
            Self::Short => Some(2),
            Self::Int | Self::Float => Some(4),
            Self::Int64 | Self::Double => Some(8),
            Self::String => None,
        }
    }

    /// Whether elements have variable length.
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String)
    }
}

impl FromStr for DataType {
    type Err = UnknownDataType;

    /// Case-insensitive; `long` is accepted for `int64`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "byte" => Ok(Self::Byte),
            "char" => Ok(Self::Char),
            "short" => Ok(Self::Short),
            "int" => Ok(Self::Int),
            "int64" | "long" => Ok(Self::Int64),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "string" => Ok(Self::String),
            _ => Err(UnknownDataType(s.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte => write!(f, "byte"),
            Self::Char => write!(f, "char"),
            Self::Short => write!(f, "short"),
            Self::Int => write!(f, "int"),
            Self::Int64 => write!(f, "int64"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::String => write!(f, "string"),
        }
    }
}

/// Value carried by an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    /// Text attribute.
    Text(String),
    /// String-array attribute.
    Strings(Vec<String>),
    /// Byte values.
    Bytes(Vec<i8>),
    /// Short values.
    Shorts(Vec<i16>),
    /// Int values.
    Ints(Vec<i32>),
    /// Int64 values.
    Longs(Vec<i64>),
    /// Float values.
    Floats(Vec<f32>),
    /// Double values.
    Doubles(Vec<f64>),
}

impl AttributeValue {
    /// Number of bytes the values occupy in a file header.
    ///
    /// Text values are measured by their actual encoded bytes.
    pub fn encoded_len(&self) -> u64 {
        match self {
            Self::Text(s) => s.len() as u64,
            Self::Strings(values) => values.iter().map(|s| s.len() as u64).sum(),
            Self::Bytes(values) => values.len() as u64,
            Self::Shorts(values) => 2 * values.len() as u64,
            Self::Ints(values) => 4 * values.len() as u64,
            Self::Longs(values) => 8 * values.len() as u64,
            Self::Floats(values) => 4 * values.len() as u64,
            Self::Doubles(values) => 8 * values.len() as u64,
        }
    }
}

/// Named attribute attached to a variable or the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: AttributeValue,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Create a text attribute.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, AttributeValue::Text(value.into()))
    }
}
