//! Data descriptors and output size estimation.
//!
//! A [`DataDescriptor`] is the plan for one output file: a set of variables
//! plus the index range to write for every dimension they span. Its size is
//! estimated with the layout of the classic NetCDF format: a header listing
//! dimensions, attributes and variables, followed by padded data sections.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::metadata::DatasetMetadata;
use crate::types::DimensionRange;

/// Byte sizes of the fixed fields of the classic NetCDF layout.
pub mod layout {
    /// File magic.
    pub const MAGIC_SIZE: u64 = 4;
    /// List tag (dimension, attribute, variable lists).
    pub const TAG_SIZE: u64 = 4;
    /// Count or length field.
    pub const N_SIZE: u64 = 4;
    /// Data offset field (64-bit offsets).
    pub const OFFSET_SIZE: u64 = 8;
    /// Type tag field.
    pub const DTYPE_SIZE: u64 = 4;
    /// Alignment allowance per data section.
    pub const ALIGN_SIZE: u64 = 8;
    /// Minimum element size after padding.
    pub const PADDING_SIZE: u64 = 4;
}

use layout::*;

/// Errors raised while building descriptors or estimating their size.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EstimateError {
    /// String variables have no predictable size.
    #[error("Unsupported feature: size of string variable {0} cannot be estimated without reading its content")]
    StringVariable(String),

    /// Variable not present in the dataset.
    #[error("Unknown variable in descriptor: {0}")]
    UnknownVariable(String),

    /// Variable spans a dimension with no range in the descriptor.
    #[error("Variable {variable} spans dimension {dimension} which has no range in the descriptor")]
    MissingRange {
        /// Variable being estimated.
        variable: String,
        /// Dimension without a range.
        dimension: String,
    },
}

/// Plan for one output file.
///
/// Invariant: every dimension spanned by a variable in `vars` has an entry
/// in `dims`.
#[derive(Debug, Clone, Serialize)]
pub struct DataDescriptor {
    #[serde(skip)]
    metadata: Arc<DatasetMetadata>,
    vars: BTreeSet<String>,
    dims: BTreeMap<String, DimensionRange>,
    split_dimension: Option<String>,
}

impl DataDescriptor {
    /// Descriptor with explicit ranges.
    pub fn new(
        metadata: Arc<DatasetMetadata>,
        vars: BTreeSet<String>,
        dims: BTreeMap<String, DimensionRange>,
    ) -> Result<Self, EstimateError> {
        for var in &vars {
            let info = metadata
                .variable(var)
                .ok_or_else(|| EstimateError::UnknownVariable(var.clone()))?;
            if let Some(missing) = info.dimensions.iter().find(|d| !dims.contains_key(*d)) {
                return Err(EstimateError::MissingRange {
                    variable: var.clone(),
                    dimension: missing.clone(),
                });
            }
        }
        Ok(Self {
            metadata,
            vars,
            dims,
            split_dimension: None,
        })
    }

    /// Descriptor covering every dimension of `vars` in full.
    pub fn full(metadata: Arc<DatasetMetadata>, vars: BTreeSet<String>) -> Result<Self, EstimateError> {
        let mut dims = BTreeMap::new();
        for var in &vars {
            let info = metadata
                .variable(var)
                .ok_or_else(|| EstimateError::UnknownVariable(var.clone()))?;
            for name in &info.dimensions {
                if dims.contains_key(name) {
                    continue;
                }
                let range = metadata
                    .dimension(name)
                    .and_then(|d| DimensionRange::full(name.clone(), d.length, d.unlimited))
                    .ok_or_else(|| EstimateError::MissingRange {
                        variable: var.clone(),
                        dimension: name.clone(),
                    })?;
                dims.insert(name.clone(), range);
            }
        }
        Ok(Self {
            metadata,
            vars,
            dims,
            split_dimension: None,
        })
    }

    /// Copy with `range` replacing the range of its dimension, marked as the
    /// split dimension.
    pub fn with_split(&self, range: DimensionRange) -> Self {
        let mut dims = self.dims.clone();
        let name = range.name.clone();
        dims.insert(name.clone(), range);
        Self {
            metadata: Arc::clone(&self.metadata),
            vars: self.vars.clone(),
            dims,
            split_dimension: Some(name),
        }
    }

    /// Source dataset metadata.
    pub fn metadata(&self) -> &Arc<DatasetMetadata> {
        &self.metadata
    }

    /// Variables in the file.
    pub fn vars(&self) -> &BTreeSet<String> {
        &self.vars
    }

    /// Dimension ranges by name.
    pub fn dims(&self) -> &BTreeMap<String, DimensionRange> {
        &self.dims
    }

    /// Range of a dimension.
    pub fn range(&self, name: &str) -> Option<&DimensionRange> {
        self.dims.get(name)
    }

    /// Name of the split dimension, if any.
    pub fn split_dimension(&self) -> Option<&str> {
        self.split_dimension.as_deref()
    }

    /// Range of the split dimension, if any.
    pub fn split_range(&self) -> Option<&DimensionRange> {
        self.split_dimension.as_deref().and_then(|d| self.dims.get(d))
    }

    /// Number of elements of `var` covered by the descriptor.
    pub fn element_count(&self, var: &str) -> Result<u64, EstimateError> {
        let info = self
            .metadata
            .variable(var)
            .ok_or_else(|| EstimateError::UnknownVariable(var.to_string()))?;
        info.dimensions.iter().try_fold(1u64, |count, dim| {
            let range = self.dims.get(dim).ok_or_else(|| EstimateError::MissingRange {
                variable: var.to_string(),
                dimension: dim.clone(),
            })?;
            Ok(count.saturating_mul(range.size()))
        })
    }

    /// Estimated size of the output file in bytes.
    pub fn estimate_size(&self) -> Result<u64, EstimateError> {
        Ok(self.estimate_header_size()? + self.estimate_data_size()?)
    }

    /// Estimated header size in bytes.
    pub fn estimate_header_size(&self) -> Result<u64, EstimateError> {
        // magic, numrecs, dimension list tag
        let mut size = MAGIC_SIZE + N_SIZE + TAG_SIZE;
        if !self.dims.is_empty() {
            size += N_SIZE;
            for name in self.dims.keys() {
                size += N_SIZE + name.len() as u64 + N_SIZE;
            }
        }
        // global attributes are not copied
        size += TAG_SIZE;
        size += TAG_SIZE;
        if !self.vars.is_empty() {
            size += N_SIZE;
            for var in &self.vars {
                let info = self
                    .metadata
                    .variable(var)
                    .ok_or_else(|| EstimateError::UnknownVariable(var.clone()))?;
                size += N_SIZE + var.len() as u64;
                size += N_SIZE + N_SIZE * info.rank() as u64;
                size += TAG_SIZE + N_SIZE;
                for attribute in &info.attributes {
                    size += N_SIZE + attribute.name.len() as u64;
                    size += DTYPE_SIZE + N_SIZE;
                    size += attribute.value.encoded_len();
                }
                size += DTYPE_SIZE + N_SIZE + OFFSET_SIZE;
            }
        }
        Ok(size)
    }

    /// Estimated size of the data sections in bytes.
    pub fn estimate_data_size(&self) -> Result<u64, EstimateError> {
        let mut size = 0u64;
        for var in &self.vars {
            let info = self
                .metadata
                .variable(var)
                .ok_or_else(|| EstimateError::UnknownVariable(var.clone()))?;
            let element_size = info
                .data_type
                .element_size()
                .ok_or_else(|| EstimateError::StringVariable(var.clone()))?;
            let count = self.element_count(var)?;
            size += ALIGN_SIZE + count.saturating_mul(element_size.max(PADDING_SIZE));
        }
        Ok(size)
    }
}

impl PartialEq for DataDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.vars == other.vars
            && self.dims == other.dims
            && self.split_dimension == other.split_dimension
    }
}

impl fmt::Display for DataDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataDescriptor(file={}, vars=[", self.metadata.location())?;
        for (i, var) in self.vars.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{var}")?;
        }
        write!(f, "], dims=[")?;
        for (i, range) in self.dims.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{range}")?;
        }
        write!(f, "]")?;
        if let Some(split) = &self.split_dimension {
            write!(f, ", split={split}")?;
        }
        write!(f, ")")
    }
}
