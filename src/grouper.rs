//! Variable grouping by dimension dependencies.
//!
//! Variables and dimensions form a directed graph:
//!
//! ```text
//! variable ──▶ dimension          for every dimension the variable spans
//! dimension ──▶ variable          if the variable is the dimension's
//!                                 coordinate variable or a bounds variable
//!                                 spanning it
//! ```
//!
//! Variables with no incoming edge are group roots. Everything reachable
//! from a root must be written together with it, so each root and its
//! reachable variables form one [`VariableGroup`].

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use tracing::debug;

use crate::metadata::{DatasetMetadata, MetadataError};

/// Vertex of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum VertexName {
    /// A dimension.
    Dimension(String),
    /// A variable.
    Variable(String),
}

impl VertexName {
    /// Variable name, if this is a variable vertex.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            Self::Dimension(_) => None,
        }
    }
}

impl fmt::Display for VertexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dimension(name) => write!(f, "dim:{name}"),
            Self::Variable(name) => write!(f, "var:{name}"),
        }
    }
}

/// Directed multigraph over dimensions and variables.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Outgoing edges, in insertion order.
    successors: BTreeMap<VertexName, Vec<VertexName>>,
    /// Incoming edge counts.
    in_degree: BTreeMap<VertexName, usize>,
    num_edges: usize,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a dataset.
    ///
    /// Constant variables have no edges and are left out.
    pub fn build(metadata: &DatasetMetadata) -> Self {
        let mut graph = Self::new();
        for dim in metadata.dimensions() {
            graph.add_vertex(VertexName::Dimension(dim.name.clone()));
        }
        for var in metadata.variables() {
            if metadata.is_constant(&var.name) {
                continue;
            }
            let vertex = VertexName::Variable(var.name.clone());
            graph.add_vertex(vertex.clone());
            let bounds = metadata.is_bounds(&var.name);
            for dim in &var.dimensions {
                let dim_vertex = VertexName::Dimension(dim.clone());
                graph.add_edge(vertex.clone(), dim_vertex.clone());
                if bounds || metadata.is_description_of(&var.name, dim) {
                    graph.add_edge(dim_vertex, vertex.clone());
                }
            }
        }
        graph
    }

    /// Add a vertex without edges.
    pub fn add_vertex(&mut self, vertex: VertexName) {
        self.in_degree.entry(vertex.clone()).or_insert(0);
        self.successors.entry(vertex).or_default();
    }

    /// Add a directed edge, creating missing vertices.
    pub fn add_edge(&mut self, from: VertexName, to: VertexName) {
        self.add_vertex(from.clone());
        self.add_vertex(to.clone());
        *self.in_degree.entry(to.clone()).or_insert(0) += 1;
        self.successors.entry(from).or_default().push(to);
        self.num_edges += 1;
    }

    /// Whether the vertex exists.
    pub fn contains(&self, vertex: &VertexName) -> bool {
        self.successors.contains_key(vertex)
    }

    /// Outgoing neighbours of a vertex.
    pub fn successors(&self, vertex: &VertexName) -> &[VertexName] {
        self.successors
            .get(vertex)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of incoming edges.
    pub fn in_degree(&self, vertex: &VertexName) -> usize {
        self.in_degree.get(vertex).copied().unwrap_or(0)
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.successors.len()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Shortest hop distance from `source` to every reachable vertex.
    ///
    /// The source itself is included at distance 0.
    pub fn distances_from(&self, source: &VertexName) -> BTreeMap<VertexName, u32> {
        let mut distances = BTreeMap::new();
        if !self.contains(source) {
            return distances;
        }
        let mut queue = VecDeque::new();
        distances.insert(source.clone(), 0);
        queue.push_back(source.clone());
        while let Some(vertex) = queue.pop_front() {
            let next = distances[&vertex] + 1;
            for successor in self.successors(&vertex) {
                if !distances.contains_key(successor) {
                    distances.insert(successor.clone(), next);
                    queue.push_back(successor.clone());
                }
            }
        }
        distances
    }
}

/// A root variable and the variables it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableGroup {
    root: String,
    reachable: BTreeMap<String, u32>,
}

impl VariableGroup {
    /// Root variable.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Variables reachable from the root, with hop distance. Excludes the root.
    pub fn reachable(&self) -> &BTreeMap<String, u32> {
        &self.reachable
    }

    /// Hop distance of a member from the root.
    pub fn distance(&self, name: &str) -> Option<u32> {
        if name == self.root {
            return Some(0);
        }
        self.reachable.get(name).copied()
    }

    /// Root followed by the reachable variables in name order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.root.as_str()).chain(self.reachable.keys().map(String::as_str))
    }

    /// Number of member variables including the root.
    pub fn len(&self) -> usize {
        1 + self.reachable.len()
    }

    /// Always false: a group holds at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for VariableGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VG({} -> [", self.root)?;
        for (i, (name, distance)) in self.reachable.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}@{distance}")?;
        }
        write!(f, "])")
    }
}

/// Group the non-constant variables of a dataset.
///
/// Groups are returned in the declaration order of their roots. Fails if a
/// non-constant variable is not reachable from any root, e.g. when it sits
/// on a cycle with no entry point.
pub fn group_variables(metadata: &DatasetMetadata) -> Result<Vec<VariableGroup>, MetadataError> {
    let graph = DependencyGraph::build(metadata);

    let roots: Vec<&str> = metadata
        .variables()
        .map(|v| v.name.as_str())
        .filter(|name| !metadata.is_constant(name))
        .filter(|name| graph.in_degree(&VertexName::Variable(name.to_string())) == 0)
        .collect();

    let mut covered: BTreeSet<String> = BTreeSet::new();
    let mut groups = Vec::with_capacity(roots.len());
    for root in roots {
        let root_vertex = VertexName::Variable(root.to_string());
        let reachable: BTreeMap<String, u32> = graph
            .distances_from(&root_vertex)
            .into_iter()
            .filter(|(vertex, _)| *vertex != root_vertex)
            .filter_map(|(vertex, distance)| {
                vertex.as_variable().map(|name| (name.to_string(), distance))
            })
            .collect();
        covered.insert(root.to_string());
        covered.extend(reachable.keys().cloned());
        groups.push(VariableGroup {
            root: root.to_string(),
            reachable,
        });
    }

    if let Some(orphan) = metadata
        .variables()
        .find(|v| !metadata.is_constant(&v.name) && !covered.contains(&v.name))
    {
        return Err(MetadataError::UngroupedVariable(orphan.name.clone()));
    }

    debug!(
        vertices = graph.num_vertices(),
        edges = graph.num_edges(),
        groups = groups.len(),
        "Grouped variables"
    );
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DatasetSchema;
    use crate::types::DataType;

    fn make_cf() -> DatasetMetadata {
        let schema = DatasetSchema::new("mem://cf.nc")
            .unlimited_dimension("time", 12)
            .dimension("lat", 4)
            .dimension("lon", 8)
            .dimension("bnds", 2)
            .variable("time", DataType::Double, &["time"])
            .variable("time_bnds", DataType::Double, &["time", "bnds"])
            .variable("lat", DataType::Double, &["lat"])
            .variable("lon", DataType::Double, &["lon"])
            .variable("tas", DataType::Float, &["time", "lat", "lon"])
            .variable("pr", DataType::Float, &["time", "lat", "lon"])
            .variable("height", DataType::Double, &[]);
        DatasetMetadata::from_schema(schema).unwrap()
    }

    #[test]
    fn test_graph_edges() {
        let md = make_cf();
        let graph = DependencyGraph::build(&md);

        let time = VertexName::Dimension("time".into());
        // time var, time_bnds, tas, pr
        assert_eq!(graph.in_degree(&time), 4);
        // coordinate variable and bounds variable
        assert_eq!(graph.successors(&time).len(), 2);
        assert_eq!(graph.in_degree(&VertexName::Variable("tas".into())), 0);
        assert!(!graph.contains(&VertexName::Variable("height".into())));
    }

    #[test]
    fn test_groups_follow_dependencies() {
        let md = make_cf();
        let groups = group_variables(&md).unwrap();

        let roots: Vec<_> = groups.iter().map(VariableGroup::root).collect();
        assert_eq!(roots, vec!["tas", "pr"]);

        let tas = &groups[0];
        let members: Vec<_> = tas.members().collect();
        assert_eq!(members, vec!["tas", "lat", "lon", "time", "time_bnds"]);
        assert_eq!(tas.distance("time"), Some(2));
        assert_eq!(tas.distance("tas"), Some(0));
        assert_eq!(tas.distance("pr"), None);
    }

    #[test]
    fn test_independent_variables_form_separate_groups() {
        let schema = DatasetSchema::new("mem://two.nc")
            .dimension("x", 10)
            .dimension("y", 20)
            .variable("a", DataType::Int, &["x"])
            .variable("b", DataType::Int, &["y"]);
        let md = DatasetMetadata::from_schema(schema).unwrap();
        let groups = group_variables(&md).unwrap();

        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.reachable().is_empty()));
    }

    #[test]
    fn test_lone_coordinate_variable_is_ungrouped() {
        let schema = DatasetSchema::new("mem://coord.nc")
            .dimension("x", 10)
            .variable("x", DataType::Double, &["x"]);
        let md = DatasetMetadata::from_schema(schema).unwrap();
        assert_eq!(
            group_variables(&md),
            Err(MetadataError::UngroupedVariable("x".into()))
        );
    }

    #[test]
    fn test_constants_only_dataset_has_no_groups() {
        let schema = DatasetSchema::new("mem://c.nc").variable("height", DataType::Double, &[]);
        let md = DatasetMetadata::from_schema(schema).unwrap();
        assert!(group_variables(&md).unwrap().is_empty());
    }

    #[test]
    fn test_distances_from_unknown_vertex() {
        let graph = DependencyGraph::new();
        assert!(graph
            .distances_from(&VertexName::Variable("nope".into()))
            .is_empty());
    }
}
