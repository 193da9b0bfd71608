//! Typed coordinate-value ranges.
//!
//! A [`TypedRange`] records the first and last coordinate value covered by a
//! split window, e.g. the first and last timestamp of a file. It is encoded
//! into file identities as `TAG~start~end` with percent-escaped tokens.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::escaper::{escape, unescape};
use crate::codec::CodecError;

/// Separator between the tag and the two values.
pub const VALUE_SEP: char = '~';

/// Scalar kind of a [`TypedRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Boolean.
    Bool,
    /// Single character.
    Char,
    /// String.
    String,
}

impl ScalarKind {
    /// Type tag used in encoded ranges.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Int8 => "BYTE",
            Self::Int16 => "SHORT",
            Self::Int32 => "INT",
            Self::Int64 => "LONG",
            Self::Float32 => "FLOAT",
            Self::Float64 => "DOUBLE",
            Self::Bool => "BOOLEAN",
            Self::Char => "CHAR",
            Self::String => "STRING",
        }
    }

    /// Parse a type tag. Tags are matched case-insensitively.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "BYTE" => Some(Self::Int8),
            "SHORT" => Some(Self::Int16),
            "INT" => Some(Self::Int32),
            "LONG" => Some(Self::Int64),
            "FLOAT" => Some(Self::Float32),
            "DOUBLE" => Some(Self::Float64),
            "BOOLEAN" => Some(Self::Bool),
            "CHAR" => Some(Self::Char),
            "STRING" => Some(Self::String),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Accessor called for the wrong scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Type mismatch: range holds {actual} values, {requested} was requested")]
pub struct TypeMismatch {
    /// Kind that was asked for.
    pub requested: ScalarKind,
    /// Kind the range actually holds.
    pub actual: ScalarKind,
}

/// Inclusive range of coordinate values of one scalar kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "bounds")]
pub enum TypedRange {
    /// `i8` bounds.
    Int8(i8, i8),
    /// `i16` bounds.
    Int16(i16, i16),
    /// `i32` bounds.
    Int32(i32, i32),
    /// `i64` bounds.
    Int64(i64, i64),
    /// `f32` bounds.
    Float32(f32, f32),
    /// `f64` bounds.
    Float64(f64, f64),
    /// `bool` bounds.
    Bool(bool, bool),
    /// `char` bounds.
    Char(char, char),
    /// `String` bounds.
    String(String, String),
}

macro_rules! accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $kind:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self) -> Result<($ty, $ty), TypeMismatch> {
            match self {
                Self::$variant(start, end) => Ok((*start, *end)),
                _ => Err(self.mismatch(ScalarKind::$kind)),
            }
        }
    };
}

impl TypedRange {
    /// Scalar kind of the bounds.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Int8(..) => ScalarKind::Int8,
            Self::Int16(..) => ScalarKind::Int16,
            Self::Int32(..) => ScalarKind::Int32,
            Self::Int64(..) => ScalarKind::Int64,
            Self::Float32(..) => ScalarKind::Float32,
            Self::Float64(..) => ScalarKind::Float64,
            Self::Bool(..) => ScalarKind::Bool,
            Self::Char(..) => ScalarKind::Char,
            Self::String(..) => ScalarKind::String,
        }
    }

    fn mismatch(&self, requested: ScalarKind) -> TypeMismatch {
        TypeMismatch {
            requested,
            actual: self.kind(),
        }
    }

    accessor!(
        /// Bounds as `i8`.
        as_i8, Int8, Int8, i8
    );
    accessor!(
        /// Bounds as `i16`.
        as_i16, Int16, Int16, i16
    );
    accessor!(
        /// Bounds as `i32`.
        as_i32, Int32, Int32, i32
    );
    accessor!(
        /// Bounds as `i64`.
        as_i64, Int64, Int64, i64
    );
    accessor!(
        /// Bounds as `f32`.
        as_f32, Float32, Float32, f32
    );
    accessor!(
        /// Bounds as `f64`.
        as_f64, Float64, Float64, f64
    );
    accessor!(
        /// Bounds as `bool`.
        as_bool, Bool, Bool, bool
    );
    accessor!(
        /// Bounds as `char`.
        as_char, Char, Char, char
    );

    /// Bounds as string slices.
    pub fn as_str(&self) -> Result<(&str, &str), TypeMismatch> {
        match self {
            Self::String(start, end) => Ok((start.as_str(), end.as_str())),
            _ => Err(self.mismatch(ScalarKind::String)),
        }
    }

    /// Bounds rendered as their textual values.
    fn value_strings(&self) -> Result<(String, String), CodecError> {
        let pair = match self {
            Self::Int8(s, e) => (s.to_string(), e.to_string()),
            Self::Int16(s, e) => (s.to_string(), e.to_string()),
            Self::Int32(s, e) => (s.to_string(), e.to_string()),
            Self::Int64(s, e) => (s.to_string(), e.to_string()),
            Self::Float32(s, e) => {
                if s.is_nan() || e.is_nan() {
                    return Err(self.encoding_failure("NaN float bound"));
                }
                (s.to_string(), e.to_string())
            }
            Self::Float64(s, e) => {
                if s.is_nan() || e.is_nan() {
                    return Err(self.encoding_failure("NaN float bound"));
                }
                (s.to_string(), e.to_string())
            }
            Self::Bool(s, e) => (s.to_string(), e.to_string()),
            Self::Char(s, e) => (s.to_string(), e.to_string()),
            Self::String(s, e) => {
                if s.is_empty() || e.is_empty() {
                    return Err(self.encoding_failure("empty string bound"));
                }
                (s.clone(), e.clone())
            }
        };
        Ok(pair)
    }

    fn encoding_failure(&self, reason: &str) -> CodecError {
        CodecError::RangeEncoding {
            kind: self.kind(),
            reason: reason.to_string(),
        }
    }

    /// Append `TAG~start~end` to `out`.
    ///
    /// On failure nothing is appended.
    pub fn append_to(&self, out: &mut String) -> Result<(), CodecError> {
        let (start, end) = self.value_strings()?;
        out.push_str(self.kind().tag());
        out.push(VALUE_SEP);
        out.push_str(&escape(&start));
        out.push(VALUE_SEP);
        out.push_str(&escape(&end));
        Ok(())
    }

    /// Encode as `TAG~start~end`.
    pub fn encode(&self) -> Result<String, CodecError> {
        let mut out = String::new();
        self.append_to(&mut out)?;
        Ok(out)
    }

    /// Decode a `TAG~start~end` token.
    pub fn decode(input: &str) -> Result<Self, CodecError> {
        let parts: Vec<&str> = input.split(VALUE_SEP).collect();
        if parts.len() != 3 {
            return Err(CodecError::InvalidFormat {
                input: input.to_string(),
                reason: "expected TYPE~START~END".to_string(),
            });
        }
        let kind = ScalarKind::from_tag(parts[0])
            .ok_or_else(|| CodecError::UnknownTypeTag(parts[0].to_string()))?;
        let start = unescape(parts[1])?;
        let end = unescape(parts[2])?;
        Self::from_value_strings(kind, &start, &end)
    }

    fn from_value_strings(kind: ScalarKind, start: &str, end: &str) -> Result<Self, CodecError> {
        Ok(match kind {
            ScalarKind::Int8 => Self::Int8(parse_value(kind, start)?, parse_value(kind, end)?),
            ScalarKind::Int16 => Self::Int16(parse_value(kind, start)?, parse_value(kind, end)?),
            ScalarKind::Int32 => Self::Int32(parse_value(kind, start)?, parse_value(kind, end)?),
            ScalarKind::Int64 => Self::Int64(parse_value(kind, start)?, parse_value(kind, end)?),
            ScalarKind::Float32 => {
                Self::Float32(parse_value(kind, start)?, parse_value(kind, end)?)
            }
            ScalarKind::Float64 => {
                Self::Float64(parse_value(kind, start)?, parse_value(kind, end)?)
            }
            ScalarKind::Bool => Self::Bool(parse_value(kind, start)?, parse_value(kind, end)?),
            ScalarKind::Char => Self::Char(single_char(start)?, single_char(end)?),
            ScalarKind::String => Self::String(start.to_string(), end.to_string()),
        })
    }

    /// Range of `values` at the `start` and `end` indices.
    ///
    /// Returns `None` if either index is out of bounds.
    pub fn from_values(values: &CoordinateValues, start: u64, end: u64) -> Option<Self> {
        let (s, e) = (usize::try_from(start).ok()?, usize::try_from(end).ok()?);
        Some(match values {
            CoordinateValues::Int8(v) => Self::Int8(*v.get(s)?, *v.get(e)?),
            CoordinateValues::Int16(v) => Self::Int16(*v.get(s)?, *v.get(e)?),
            CoordinateValues::Int32(v) => Self::Int32(*v.get(s)?, *v.get(e)?),
            CoordinateValues::Int64(v) => Self::Int64(*v.get(s)?, *v.get(e)?),
            CoordinateValues::Float32(v) => Self::Float32(*v.get(s)?, *v.get(e)?),
            CoordinateValues::Float64(v) => Self::Float64(*v.get(s)?, *v.get(e)?),
            CoordinateValues::Bool(v) => Self::Bool(*v.get(s)?, *v.get(e)?),
            CoordinateValues::Char(v) => Self::Char(*v.get(s)?, *v.get(e)?),
            CoordinateValues::String(v) => Self::String(v.get(s)?.clone(), v.get(e)?.clone()),
        })
    }
}

impl fmt::Display for TypedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int8(s, e) => write!(f, "{}[{}, {}]", self.kind(), s, e),
            Self::Int16(s, e) => write!(f, "{}[{}, {}]", self.kind(), s, e),
            Self::Int32(s, e) => write!(f, "{}[{}, {}]", self.kind(), s, e),
            Self::Int64(s, e) => write!(f, "{}[{}, {}]", self.kind(), s, e),
            Self::Float32(s, e) => write!(f, "{}[{}, {}]", self.kind(), s, e),
            Self::Float64(s, e) => write!(f, "{}[{}, {}]", self.kind(), s, e),
            Self::Bool(s, e) => write!(f, "{}[{}, {}]", self.kind(), s, e),
            Self::Char(s, e) => write!(f, "{}[{}, {}]", self.kind(), s, e),
            Self::String(s, e) => write!(f, "{}[{}, {}]", self.kind(), s, e),
        }
    }
}

fn parse_value<T: std::str::FromStr>(kind: ScalarKind, value: &str) -> Result<T, CodecError> {
    value.parse::<T>().map_err(|_| CodecError::InvalidValue {
        kind,
        value: value.to_string(),
    })
}

fn single_char(value: &str) -> Result<char, CodecError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(CodecError::InvalidValue {
            kind: ScalarKind::Char,
            value: value.to_string(),
        }),
    }
}

/// Values of a one-dimensional coordinate variable.
///
/// Only captured for coordinate variables whose value range should appear
/// in file identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateValues {
    /// `i8` values.
    Int8(Vec<i8>),
    /// `i16` values.
    Int16(Vec<i16>),
    /// `i32` values.
    Int32(Vec<i32>),
    /// `i64` values.
    Int64(Vec<i64>),
    /// `f32` values.
    Float32(Vec<f32>),
    /// `f64` values.
    Float64(Vec<f64>),
    /// `bool` values.
    Bool(Vec<bool>),
    /// `char` values.
    Char(Vec<char>),
    /// `String` values.
    String(Vec<String>),
}

impl CoordinateValues {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Char(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    /// Whether there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scalar kind of the values.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Int8(_) => ScalarKind::Int8,
            Self::Int16(_) => ScalarKind::Int16,
            Self::Int32(_) => ScalarKind::Int32,
            Self::Int64(_) => ScalarKind::Int64,
            Self::Float32(_) => ScalarKind::Float32,
            Self::Float64(_) => ScalarKind::Float64,
            Self::Bool(_) => ScalarKind::Bool,
            Self::Char(_) => ScalarKind::Char,
            Self::String(_) => ScalarKind::String,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_int_range() {
        let r = TypedRange::Int32(-5, 120);
        assert_eq!(r.encode().unwrap(), "INT~-5~120");
        assert_eq!(TypedRange::decode("INT~-5~120").unwrap(), r);
    }

    #[test]
    fn test_float_round_trip() {
        let r = TypedRange::Float64(0.5, 1.25e-7);
        let encoded = r.encode().unwrap();
        assert!(encoded.starts_with("DOUBLE~"));
        assert_eq!(TypedRange::decode(&encoded).unwrap(), r);
    }

    #[test]
    fn test_string_with_separators_round_trip() {
        let r = TypedRange::String("1990_01~a".into(), "2000 12".into());
        let encoded = r.encode().unwrap();
        assert_eq!(encoded.matches(VALUE_SEP).count(), 2);
        assert!(!encoded.contains('_'));
        assert_eq!(TypedRange::decode(&encoded).unwrap(), r);
    }

    #[test]
    fn test_char_and_bool_round_trip() {
        for r in [TypedRange::Char('_', '~'), TypedRange::Bool(false, true)] {
            let encoded = r.encode().unwrap();
            assert_eq!(TypedRange::decode(&encoded).unwrap(), r);
        }
    }

    #[test]
    fn test_infinite_bounds_round_trip() {
        let r = TypedRange::Float64(f64::NEG_INFINITY, 0.0);
        let encoded = r.encode().unwrap();
        assert_eq!(encoded, "DOUBLE~-inf~0");
        assert_eq!(TypedRange::decode(&encoded).unwrap(), r);

        let r = TypedRange::Float32(-1.5, f32::INFINITY);
        assert_eq!(TypedRange::decode(&r.encode().unwrap()).unwrap(), r);
    }

    #[test]
    fn test_nan_float_fails_without_output() {
        let r = TypedRange::Float32(f32::NAN, 1.0);
        let mut out = String::from("prefix");
        assert!(matches!(
            r.append_to(&mut out),
            Err(CodecError::RangeEncoding { .. })
        ));
        assert_eq!(out, "prefix");
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        assert!(matches!(
            TypedRange::decode("COMPLEX~1~2"),
            Err(CodecError::UnknownTypeTag(tag)) if tag == "COMPLEX"
        ));
        assert!(matches!(
            TypedRange::decode("INT~1"),
            Err(CodecError::InvalidFormat { .. })
        ));
        assert!(matches!(
            TypedRange::decode("BYTE~1~300"),
            Err(CodecError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_accessor_type_mismatch() {
        let r = TypedRange::Int64(1, 2);
        assert_eq!(r.as_i64().unwrap(), (1, 2));
        let err = r.as_f64().unwrap_err();
        assert_eq!(err.requested, ScalarKind::Float64);
        assert_eq!(err.actual, ScalarKind::Int64);
        assert!(r.as_str().is_err());
    }

    #[test]
    fn test_from_values() {
        let values = CoordinateValues::Float64(vec![0.0, 0.5, 1.0, 1.5]);
        assert_eq!(
            TypedRange::from_values(&values, 1, 3),
            Some(TypedRange::Float64(0.5, 1.5))
        );
        assert_eq!(TypedRange::from_values(&values, 1, 4), None);
    }
}
