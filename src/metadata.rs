//! Structural metadata of a source dataset.
//!
//! [`DatasetSchema`] is the serde-loadable description of a dataset's
//! header: dimensions, variables, attributes and optionally the values of
//! 1-D coordinate variables. [`DatasetMetadata::from_schema`] validates it and
//! builds the read-only indexes used by every alignment stage.
//!
//! ## Classification
//!
//! - **constant**: a variable with no dimensions
//! - **description**: a variable whose name equals a dimension name
//!   (a coordinate variable)
//! - **bounds**: a variable whose name ends with `bnds` and which spans a
//!   bounds dimension, i.e. a dimension used only by such variables
//! - **ordinary**: everything else

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::types::{Attribute, CoordinateValues, DataType};

/// Name suffix marking bounds variables.
pub const BOUNDS_SUFFIX: &str = "bnds";

/// Metadata inconsistencies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// Variable references a dimension that is not declared.
    #[error("Variable {variable} references unknown dimension {dimension}")]
    UnknownDimension {
        /// Referencing variable.
        variable: String,
        /// Missing dimension.
        dimension: String,
    },

    /// Name lookup for a variable that does not exist.
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Dimension declared twice.
    #[error("Duplicate dimension: {0}")]
    DuplicateDimension(String),

    /// Variable declared twice.
    #[error("Duplicate variable: {0}")]
    DuplicateVariable(String),

    /// Dimension of length zero.
    #[error("Dimension {0} is empty")]
    EmptyDimension(String),

    /// Coordinate values do not match their variable.
    #[error("Coordinate values for {variable} have length {actual}, expected {expected}")]
    CoordinateLength {
        /// Coordinate variable.
        variable: String,
        /// Length of the variable's single dimension.
        expected: u64,
        /// Number of supplied values.
        actual: u64,
    },

    /// Coordinate values supplied for a variable that is not 1-D.
    #[error("Coordinate values for {0} require a one-dimensional variable")]
    CoordinateRank(String),

    /// Non-constant variable not reachable from any group root.
    #[error("Variable {0} does not belong to any variable group")]
    UngroupedVariable(String),
}

/// Declared dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Dimension name.
    pub name: String,
    /// Current length.
    pub length: u64,
    /// Whether this is the record (unlimited) dimension.
    #[serde(default)]
    pub unlimited: bool,
}

/// Declared variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name.
    pub name: String,
    /// Element type.
    pub data_type: DataType,
    /// Dimensions in declaration order; empty for constants.
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Variable attributes.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Serde-loadable description of a dataset header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Location of the source file.
    #[serde(default)]
    pub location: String,
    /// Dimensions in declaration order.
    #[serde(default)]
    pub dimensions: Vec<DimensionSpec>,
    /// Variables in declaration order.
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    /// Global attributes.
    #[serde(default)]
    pub global_attributes: Vec<Attribute>,
    /// Captured values of 1-D coordinate variables.
    #[serde(default)]
    pub coordinates: BTreeMap<String, CoordinateValues>,
}

impl DatasetSchema {
    /// Empty schema for the file at `location`.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    /// Add a fixed-size dimension.
    pub fn dimension(mut self, name: impl Into<String>, length: u64) -> Self {
        self.dimensions.push(DimensionSpec {
            name: name.into(),
            length,
            unlimited: false,
        });
        self
    }

    /// Add the unlimited dimension with its current length.
    pub fn unlimited_dimension(mut self, name: impl Into<String>, length: u64) -> Self {
        self.dimensions.push(DimensionSpec {
            name: name.into(),
            length,
            unlimited: true,
        });
        self
    }

    /// Add a variable without attributes.
    pub fn variable(self, name: impl Into<String>, data_type: DataType, dims: &[&str]) -> Self {
        self.variable_with_attributes(name, data_type, dims, Vec::new())
    }

    /// Add a variable with attributes.
    pub fn variable_with_attributes(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        dims: &[&str],
        attributes: Vec<Attribute>,
    ) -> Self {
        self.variables.push(VariableSpec {
            name: name.into(),
            data_type,
            dimensions: dims.iter().map(|d| d.to_string()).collect(),
            attributes,
        });
        self
    }

    /// Add a global attribute.
    pub fn global_attribute(mut self, attribute: Attribute) -> Self {
        self.global_attributes.push(attribute);
        self
    }

    /// Record the values of a 1-D coordinate variable.
    pub fn coordinate(mut self, name: impl Into<String>, values: CoordinateValues) -> Self {
        self.coordinates.insert(name.into(), values);
        self
    }

    /// Parse a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Role of a variable within the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum VariableKind {
    /// No dimensions.
    Constant,
    /// Named after a dimension.
    Description,
    /// Bounds of a coordinate.
    Bounds,
    /// Anything else.
    Ordinary,
}

/// Indexed dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionInfo {
    /// Dimension name.
    pub name: String,
    /// Current length.
    pub length: u64,
    /// Whether this is the record dimension.
    pub unlimited: bool,
    /// Whether only bounds variables use the dimension.
    pub bounds_only: bool,
}

/// Indexed variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    /// Variable name.
    pub name: String,
    /// Element type.
    pub data_type: DataType,
    /// Dimensions in declaration order.
    pub dimensions: Vec<String>,
    /// Variable attributes.
    pub attributes: Vec<Attribute>,
    /// Role of the variable.
    pub kind: VariableKind,
    /// Total size in bytes, absent for strings.
    pub byte_size: Option<u64>,
}

impl VariableInfo {
    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
}

/// Validated, indexed dataset metadata. Read-only after construction.
#[derive(Debug, Clone)]
pub struct DatasetMetadata {
    location: String,
    dimension_order: Vec<String>,
    dimensions: BTreeMap<String, DimensionInfo>,
    variable_order: Vec<String>,
    variables: BTreeMap<String, VariableInfo>,
    bounds: BTreeMap<String, String>,
    constants: BTreeSet<String>,
    global_attributes: Vec<Attribute>,
    coordinates: BTreeMap<String, CoordinateValues>,
}

impl DatasetMetadata {
    /// Validate a schema and build the indexes.
    pub fn from_schema(schema: DatasetSchema) -> Result<Self, MetadataError> {
        let mut dimensions = BTreeMap::new();
        let mut dimension_order = Vec::with_capacity(schema.dimensions.len());
        for dim in &schema.dimensions {
            if dim.length == 0 {
                return Err(MetadataError::EmptyDimension(dim.name.clone()));
            }
            let info = DimensionInfo {
                name: dim.name.clone(),
                length: dim.length,
                unlimited: dim.unlimited,
                bounds_only: false,
            };
            if dimensions.insert(dim.name.clone(), info).is_some() {
                return Err(MetadataError::DuplicateDimension(dim.name.clone()));
            }
            dimension_order.push(dim.name.clone());
        }

        let mut seen = BTreeSet::new();
        for var in &schema.variables {
            if !seen.insert(var.name.as_str()) {
                return Err(MetadataError::DuplicateVariable(var.name.clone()));
            }
            for dim in &var.dimensions {
                if !dimensions.contains_key(dim) {
                    return Err(MetadataError::UnknownDimension {
                        variable: var.name.clone(),
                        dimension: dim.clone(),
                    });
                }
            }
        }

        // Bounds dimensions: used by bnds-suffixed variables and nothing else.
        let mut bounds_candidates = BTreeSet::new();
        let mut other_used = BTreeSet::new();
        for var in &schema.variables {
            let target = if var.name.ends_with(BOUNDS_SUFFIX) {
                &mut bounds_candidates
            } else {
                &mut other_used
            };
            target.extend(var.dimensions.iter().cloned());
        }
        let bounds_dims: BTreeSet<String> =
            bounds_candidates.difference(&other_used).cloned().collect();
        for name in &bounds_dims {
            if let Some(info) = dimensions.get_mut(name) {
                info.bounds_only = true;
            }
        }

        let mut variables = BTreeMap::new();
        let mut variable_order = Vec::with_capacity(schema.variables.len());
        let mut bounds = BTreeMap::new();
        let mut constants = BTreeSet::new();
        for var in schema.variables {
            let bounds_dim = var
                .dimensions
                .iter()
                .find(|d| bounds_dims.contains(*d))
                .filter(|_| var.name.ends_with(BOUNDS_SUFFIX));
            let kind = if var.dimensions.is_empty() {
                VariableKind::Constant
            } else if dimensions.contains_key(&var.name) {
                VariableKind::Description
            } else if bounds_dim.is_some() {
                VariableKind::Bounds
            } else {
                VariableKind::Ordinary
            };
            match kind {
                VariableKind::Constant => {
                    constants.insert(var.name.clone());
                }
                VariableKind::Bounds => {
                    if let Some(dim) = bounds_dim {
                        bounds.insert(var.name.clone(), dim.clone());
                    }
                }
                _ => {}
            }
            let byte_size = var.data_type.element_size().map(|size| {
                var.dimensions
                    .iter()
                    .filter_map(|d| dimensions.get(d))
                    .fold(size, |acc, d| acc.saturating_mul(d.length))
            });
            variable_order.push(var.name.clone());
            variables.insert(
                var.name.clone(),
                VariableInfo {
                    name: var.name,
                    data_type: var.data_type,
                    dimensions: var.dimensions,
                    attributes: var.attributes,
                    kind,
                    byte_size,
                },
            );
        }

        for (name, values) in &schema.coordinates {
            let var = variables
                .get(name)
                .ok_or_else(|| MetadataError::UnknownVariable(name.clone()))?;
            let [dim] = var.dimensions.as_slice() else {
                return Err(MetadataError::CoordinateRank(name.clone()));
            };
            let expected = dimensions.get(dim).map(|d| d.length).unwrap_or_default();
            let actual = values.len() as u64;
            if actual != expected {
                return Err(MetadataError::CoordinateLength {
                    variable: name.clone(),
                    expected,
                    actual,
                });
            }
        }

        debug!(
            location = %schema.location,
            dimensions = dimensions.len(),
            variables = variables.len(),
            constants = constants.len(),
            bounds = bounds.len(),
            "Indexed dataset metadata"
        );

        Ok(Self {
            location: schema.location,
            dimension_order,
            dimensions,
            variable_order,
            variables,
            bounds,
            constants,
            global_attributes: schema.global_attributes,
            coordinates: schema.coordinates,
        })
    }

    /// Location of the source file.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Look up a dimension.
    pub fn dimension(&self, name: &str) -> Option<&DimensionInfo> {
        self.dimensions.get(name)
    }

    /// Dimensions in declaration order.
    pub fn dimensions(&self) -> impl Iterator<Item = &DimensionInfo> {
        self.dimension_order
            .iter()
            .filter_map(|name| self.dimensions.get(name))
    }

    /// Look up a variable.
    pub fn variable(&self, name: &str) -> Option<&VariableInfo> {
        self.variables.get(name)
    }

    /// Variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &VariableInfo> {
        self.variable_order
            .iter()
            .filter_map(|name| self.variables.get(name))
    }

    /// Number of variables.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Dimensions spanned by a variable.
    pub fn variable_dimensions(&self, name: &str) -> Result<&[String], MetadataError> {
        self.variables
            .get(name)
            .map(|v| v.dimensions.as_slice())
            .ok_or_else(|| MetadataError::UnknownVariable(name.to_string()))
    }

    /// Total byte size of a variable, `None` for string variables.
    pub fn variable_byte_size(&self, name: &str) -> Result<Option<u64>, MetadataError> {
        self.variables
            .get(name)
            .map(|v| v.byte_size)
            .ok_or_else(|| MetadataError::UnknownVariable(name.to_string()))
    }

    /// Whether the variable has no dimensions.
    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    /// All constant variables.
    pub fn constants(&self) -> &BTreeSet<String> {
        &self.constants
    }

    /// Whether the variable is a bounds variable.
    pub fn is_bounds(&self, name: &str) -> bool {
        self.bounds.contains_key(name)
    }

    /// Bounds dimension a bounds variable is mapped to.
    pub fn bounds_dimension(&self, name: &str) -> Option<&str> {
        self.bounds.get(name).map(String::as_str)
    }

    /// Whether the variable is named after a dimension.
    pub fn is_description(&self, name: &str) -> bool {
        self.variables
            .get(name)
            .map(|v| v.kind == VariableKind::Description)
            .unwrap_or(false)
    }

    /// Whether `variable` is the coordinate variable of `dimension`.
    pub fn is_description_of(&self, variable: &str, dimension: &str) -> bool {
        variable == dimension && self.is_description(variable)
    }

    /// Whether the variable spans an unlimited dimension.
    pub fn is_unlimited_variable(&self, name: &str) -> bool {
        self.variables
            .get(name)
            .map(|v| {
                v.dimensions
                    .iter()
                    .any(|d| self.dimensions.get(d).map(|d| d.unlimited).unwrap_or(false))
            })
            .unwrap_or(false)
    }

    /// Captured values of a coordinate variable.
    pub fn coordinate_values(&self, name: &str) -> Option<&CoordinateValues> {
        self.coordinates.get(name)
    }

    /// Global attributes.
    pub fn global_attributes(&self) -> &[Attribute] {
        &self.global_attributes
    }
}
