//! Variable assignments: the set of variables destined for one file group.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Variables that will share one group of output files, by role.
///
/// The five sets are pairwise disjoint and immutable after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableAssignment {
    unlimited: BTreeSet<String>,
    dimension: BTreeSet<String>,
    bounds: BTreeSet<String>,
    other: BTreeSet<String>,
    constants: BTreeSet<String>,
}

impl VariableAssignment {
    /// Create an assignment from its five role sets.
    pub fn new(
        unlimited: BTreeSet<String>,
        dimension: BTreeSet<String>,
        bounds: BTreeSet<String>,
        other: BTreeSet<String>,
        constants: BTreeSet<String>,
    ) -> Self {
        let assignment = Self {
            unlimited,
            dimension,
            bounds,
            other,
            constants,
        };
        debug_assert!(assignment.is_disjoint(), "role sets overlap: {assignment}");
        assignment
    }

    /// Assignment holding only constant (rank-0) variables.
    pub fn constants_only(constants: BTreeSet<String>) -> Self {
        Self {
            constants,
            ..Self::default()
        }
    }

    /// Variables spanning an unlimited dimension.
    pub fn unlimited(&self) -> &BTreeSet<String> {
        &self.unlimited
    }

    /// Coordinate variables named after a dimension.
    pub fn dimension(&self) -> &BTreeSet<String> {
        &self.dimension
    }

    /// Bounds variables.
    pub fn bounds(&self) -> &BTreeSet<String> {
        &self.bounds
    }

    /// Remaining variables.
    pub fn other(&self) -> &BTreeSet<String> {
        &self.other
    }

    /// Constant variables, shared by every assignment.
    pub fn constants(&self) -> &BTreeSet<String> {
        &self.constants
    }

    /// Union of all five sets.
    pub fn all_variables(&self) -> BTreeSet<String> {
        self.unlimited
            .iter()
            .chain(&self.dimension)
            .chain(&self.bounds)
            .chain(&self.other)
            .chain(&self.constants)
            .cloned()
            .collect()
    }

    /// Total number of variables.
    pub fn len(&self) -> usize {
        self.unlimited.len()
            + self.dimension.len()
            + self.bounds.len()
            + self.other.len()
            + self.constants.len()
    }

    /// Whether the assignment holds no variables.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `name` belongs to any of the sets.
    pub fn contains(&self, name: &str) -> bool {
        self.unlimited.contains(name)
            || self.dimension.contains(name)
            || self.bounds.contains(name)
            || self.other.contains(name)
            || self.constants.contains(name)
    }

    /// Whether no variable appears in more than one set.
    pub fn is_disjoint(&self) -> bool {
        self.all_variables().len() == self.len()
    }
}

fn write_set(f: &mut fmt::Formatter<'_>, label: &str, set: &BTreeSet<String>) -> fmt::Result {
    write!(f, "{label}=[")?;
    for (i, name) in set.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{name}")?;
    }
    write!(f, "]")
}

impl fmt::Display for VariableAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(")?;
        write_set(f, "unlimited", &self.unlimited)?;
        write_set(f, ", dimension", &self.dimension)?;
        write_set(f, ", bounds", &self.bounds)?;
        write_set(f, ", other", &self.other)?;
        write_set(f, ", constants", &self.constants)?;
        write!(f, ")")
    }
}
