//! File identity codec.
//!
//! Every output file carries a reversible name describing which variables it
//! holds and which window of the split dimension it covers:
//!
//! ```text
//! (var_)*FULL
//! (var_)*splitVar~TYPE~start~end      coordinate value range
//! (var_)*splitVar~DIM~start~end       raw index range
//! (var_)*splitVar~NONE                split without a recorded range
//! ```
//!
//! Variable names and range values are escaped with [`escaper`] so the
//! `_` and `~` separators are unambiguous.

pub mod escaper;

use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::descriptor::DataDescriptor;
use crate::types::{DimensionRange, InvalidRange, ScalarKind, TypedRange};
use escaper::{escape, unescape};

/// Separator between variable names.
pub const NAME_SEP: char = '_';
/// Separator between the split variable and its range.
pub const RANGE_SEP: char = '~';
/// Marker for files holding complete variables.
pub const FULL_KEY: &str = "FULL";
/// Tag for raw index ranges.
pub const DIM_KEY: &str = "DIM";
/// Marker for a split without a recorded range.
pub const NONE_KEY: &str = "NONE";
/// Suffix of every emitted file.
pub const FILE_SUFFIX: &str = ".nc";

/// Errors raised while encoding or decoding file identities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// Name does not follow the identity grammar.
    #[error("Invalid file identity {input:?}: {reason}")]
    InvalidFormat {
        /// Offending input.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Range token names an unknown scalar type.
    #[error("Unknown range type tag: {0}")]
    UnknownTypeTag(String),

    /// Value could not be parsed as its declared kind.
    #[error("Invalid {kind} value: {value:?}")]
    InvalidValue {
        /// Declared kind.
        kind: ScalarKind,
        /// Unparsable value.
        value: String,
    },

    /// Escaped token does not decode to UTF-8.
    #[error("Invalid escape sequence in token {0:?}")]
    InvalidEscape(String),

    /// Index range with end before start.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRange),

    /// Typed range cannot be written into a name.
    #[error("Range encoding failure for {kind} range: {reason}")]
    RangeEncoding {
        /// Kind of the range.
        kind: ScalarKind,
        /// Why encoding failed.
        reason: String,
    },
}

/// Decoded identity of one output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    /// Variables stored in the file, excluding the split variable.
    pub vars: Vec<String>,
    /// Variable named after the split dimension, if the file is a split.
    pub split_var: Option<String>,
    /// Coordinate value range of the window.
    pub typed_range: Option<TypedRange>,
    /// Index range of the window.
    pub dim_range: Option<DimensionRange>,
}

impl FileInfo {
    /// Identity of a file holding complete variables.
    pub fn full(vars: Vec<String>) -> Self {
        Self {
            vars,
            split_var: None,
            typed_range: None,
            dim_range: None,
        }
    }

    /// Identity of a split without a recorded range.
    pub fn unranged(vars: Vec<String>, split_var: impl Into<String>) -> Self {
        Self {
            vars,
            split_var: Some(split_var.into()),
            typed_range: None,
            dim_range: None,
        }
    }

    /// Identity of a split recorded by its index range.
    pub fn with_dim_range(vars: Vec<String>, range: DimensionRange) -> Self {
        Self {
            vars,
            split_var: Some(range.name.clone()),
            typed_range: None,
            dim_range: Some(range),
        }
    }

    /// Identity of a split recorded by its coordinate value range.
    pub fn with_typed_range(
        vars: Vec<String>,
        split_var: impl Into<String>,
        range: TypedRange,
    ) -> Self {
        Self {
            vars,
            split_var: Some(split_var.into()),
            typed_range: Some(range),
            dim_range: None,
        }
    }

    /// Identity with both a coordinate value range and an index range.
    ///
    /// Only the typed range survives encoding unless it fails to encode.
    pub fn with_ranges(vars: Vec<String>, typed: TypedRange, range: DimensionRange) -> Self {
        Self {
            vars,
            split_var: Some(range.name.clone()),
            typed_range: Some(typed),
            dim_range: Some(range),
        }
    }

    /// Identity of the file a descriptor will be written to.
    ///
    /// A split file lists every variable except the split dimension's
    /// coordinate variable. When that coordinate variable is 1-D and its
    /// values are known, the window's coordinate range is recorded too.
    pub fn from_descriptor(descriptor: &DataDescriptor) -> Self {
        let Some(range) = descriptor.split_range() else {
            return Self::full(descriptor.vars().iter().cloned().collect());
        };
        let vars: Vec<String> = descriptor
            .vars()
            .iter()
            .filter(|v| **v != range.name)
            .cloned()
            .collect();

        let metadata = descriptor.metadata();
        let typed = metadata
            .variable(&range.name)
            .filter(|coordinate| coordinate.dimensions.len() == 1)
            .and_then(|_| metadata.coordinate_values(&range.name))
            .and_then(|values| TypedRange::from_values(values, range.start, range.end));

        match typed {
            Some(typed) => Self::with_ranges(vars, typed, range.clone()),
            None => Self::with_dim_range(vars, range.clone()),
        }
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialise(self))
    }
}

/// Encode a file identity.
///
/// A typed range that fails to encode is replaced by the index range, or by
/// `NONE` if there is no index range either.
pub fn serialise(info: &FileInfo) -> String {
    let mut out = String::new();
    for var in &info.vars {
        out.push_str(&escape(var));
        out.push(NAME_SEP);
    }
    let Some(split_var) = &info.split_var else {
        out.push_str(FULL_KEY);
        return out;
    };
    out.push_str(&escape(split_var));
    out.push(RANGE_SEP);

    let mark = out.len();
    if let Some(typed) = &info.typed_range {
        match typed.append_to(&mut out) {
            Ok(()) => return out,
            Err(err) => {
                warn!(split_var = %split_var, error = %err, "Falling back to index range in file name");
                out.truncate(mark);
            }
        }
    }
    match &info.dim_range {
        Some(range) => {
            out.push_str(DIM_KEY);
            out.push(RANGE_SEP);
            out.push_str(&range.start.to_string());
            out.push(RANGE_SEP);
            out.push_str(&range.end.to_string());
        }
        None => out.push_str(NONE_KEY),
    }
    out
}

/// Decode a file identity produced by [`serialise`].
pub fn deserialise(name: &str) -> Result<FileInfo, CodecError> {
    let invalid = |reason: &str| CodecError::InvalidFormat {
        input: name.to_string(),
        reason: reason.to_string(),
    };

    let Some((prefix, suffix)) = name.split_once(RANGE_SEP) else {
        let mut tokens: Vec<&str> = name.split(NAME_SEP).collect();
        if tokens.pop() != Some(FULL_KEY) {
            return Err(invalid("unsplit identity must end with FULL"));
        }
        return Ok(FileInfo::full(decode_names(&tokens, name)?));
    };

    let mut tokens: Vec<&str> = prefix.split(NAME_SEP).collect();
    let split_token = tokens.pop().unwrap_or_default();
    if split_token.is_empty() {
        return Err(invalid("missing split variable"));
    }
    let split_var = unescape(split_token)?;
    let vars = decode_names(&tokens, name)?;

    if suffix.eq_ignore_ascii_case(NONE_KEY) {
        return Ok(FileInfo::unranged(vars, split_var));
    }

    let parts: Vec<&str> = suffix.split(RANGE_SEP).collect();
    if parts[0] == DIM_KEY {
        if parts.len() != 3 {
            return Err(invalid("expected DIM~START~END"));
        }
        let start = parse_index(parts[1])?;
        let end = parse_index(parts[2])?;
        let range = DimensionRange::new(split_var, start, end, false)?;
        return Ok(FileInfo::with_dim_range(vars, range));
    }

    let typed = TypedRange::decode(suffix)?;
    Ok(FileInfo::with_typed_range(vars, split_var, typed))
}

/// File name for a descriptor, including the [`FILE_SUFFIX`].
pub fn file_name(descriptor: &DataDescriptor) -> String {
    let mut name = serialise(&FileInfo::from_descriptor(descriptor));
    name.push_str(FILE_SUFFIX);
    name
}

/// Decode a file name produced by [`file_name`].
pub fn parse_file_name(file_name: &str) -> Result<FileInfo, CodecError> {
    let stem = file_name
        .strip_suffix(FILE_SUFFIX)
        .ok_or_else(|| CodecError::InvalidFormat {
            input: file_name.to_string(),
            reason: format!("missing {FILE_SUFFIX} suffix"),
        })?;
    deserialise(stem)
}

fn decode_names(tokens: &[&str], input: &str) -> Result<Vec<String>, CodecError> {
    tokens
        .iter()
        .map(|token| {
            if token.is_empty() {
                return Err(CodecError::InvalidFormat {
                    input: input.to_string(),
                    reason: "empty variable name".to_string(),
                });
            }
            unescape(token)
        })
        .collect()
}

fn parse_index(value: &str) -> Result<u64, CodecError> {
    value.parse::<u64>().map_err(|_| CodecError::InvalidValue {
        kind: ScalarKind::Int64,
        value: value.to_string(),
    })
}
