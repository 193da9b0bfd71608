//! Plain value types shared by the alignment stages.

pub mod range;
pub mod data_type;
pub mod typed_range;
pub mod assignment;

pub use range::{DimensionRange, InvalidRange};
pub use data_type::{Attribute, AttributeValue, DataType, UnknownDataType};
pub use typed_range::{CoordinateValues, ScalarKind, TypeMismatch, TypedRange};
pub use assignment::VariableAssignment;
