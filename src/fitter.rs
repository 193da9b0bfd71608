//! Fitting assignments into block-sized files.
//!
//! ## Algorithm
//!
//! 1. Build the full descriptor of the assignment and estimate its size
//! 2. If it is below `block_size - margin`, it is the only file
//! 3. Otherwise pick a split dimension: an explicit override if splittable,
//!    else finite dimensions before unlimited ones, larger first, ties by name;
//!    dimensions of size 1 are skipped
//! 4. `slice_count = floor(limit / full_size * dim_size)` indices per window
//! 5. If the first window is still over the limit, derive the per-index cost
//!    from two probe estimates and shrink `slice_count` to the largest count
//!    that fits
//! 6. Tile the dimension into windows and verify every window's estimate

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::AlignerConfig;
use crate::descriptor::{DataDescriptor, EstimateError};
use crate::metadata::DatasetMetadata;
use crate::types::{DimensionRange, VariableAssignment};

/// Bytes kept free below the block size by default.
pub const ESTIMATION_MARGIN: u64 = 100;

/// Why an assignment could not be fitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FitFailure {
    /// Every dimension has size 1.
    #[error("no non-constant dimension to split over")]
    NoSplittableDimension,

    /// A single index of the split dimension already exceeds the limit.
    #[error("cannot split {dimension} finely enough; multi-dimension splitting is unsupported")]
    SliceCountZero {
        /// Chosen split dimension.
        dimension: String,
    },

    /// A produced window is over the limit.
    #[error("window {window} is estimated at {estimate} bytes, limit is {limit} bytes")]
    OverBudget {
        /// Offending window.
        window: DimensionRange,
        /// Its estimated size.
        estimate: u64,
        /// The block limit.
        limit: u64,
    },

    /// Size estimation failed.
    #[error(transparent)]
    Estimate(#[from] EstimateError),
}

/// Fitting failure with the assignment and descriptor it occurred on.
#[derive(Debug, Clone, PartialEq)]
pub struct FittingError {
    /// Underlying reason.
    pub reason: FitFailure,
    /// Assignment being fitted.
    pub assignment: Box<VariableAssignment>,
    /// Descriptor being estimated or split, if one was built.
    pub descriptor: Option<Box<DataDescriptor>>,
}

impl FittingError {
    fn new(
        reason: FitFailure,
        assignment: &VariableAssignment,
        descriptor: Option<&DataDescriptor>,
    ) -> Self {
        Self {
            reason,
            assignment: Box::new(assignment.clone()),
            descriptor: descriptor.map(|dd| Box::new(dd.clone())),
        }
    }

    /// Whether the failure stems from an unsupported feature: a string-typed
    /// variable or a split that would need more than one dimension.
    pub fn is_unsupported_feature(&self) -> bool {
        matches!(
            self.reason,
            FitFailure::Estimate(EstimateError::StringVariable(_))
                | FitFailure::SliceCountZero { .. }
        )
    }
}

impl fmt::Display for FittingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fitting failure: {}; assignment: {}", self.reason, self.assignment)?;
        if let Some(descriptor) = &self.descriptor {
            write!(f, "; descriptor: {descriptor}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FittingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

/// Result of fitting one assignment: its ordered file plans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableFit {
    /// Element count per variable in the first descriptor.
    records: BTreeMap<String, u64>,
    descriptors: Vec<DataDescriptor>,
}

impl VariableFit {
    /// Fit from ordered descriptors.
    pub fn from_descriptors(descriptors: Vec<DataDescriptor>) -> Result<Self, EstimateError> {
        let mut records = BTreeMap::new();
        if let Some(first) = descriptors.first() {
            for var in first.vars() {
                records.insert(var.clone(), first.element_count(var)?);
            }
        }
        Ok(Self {
            records,
            descriptors,
        })
    }

    /// Records of `var` in the first file.
    pub fn records(&self, var: &str) -> Option<u64> {
        self.records.get(var).copied()
    }

    /// Records per variable in the first file.
    pub fn all_records(&self) -> &BTreeMap<String, u64> {
        &self.records
    }

    /// Number of files.
    pub fn file_count(&self) -> usize {
        self.descriptors.len()
    }

    /// File plans in order.
    pub fn descriptors(&self) -> &[DataDescriptor] {
        &self.descriptors
    }

    /// Whether the assignment was split.
    pub fn is_split(&self) -> bool {
        self.descriptors
            .first()
            .map(|dd| dd.split_dimension().is_some())
            .unwrap_or(false)
    }
}

/// Fits assignments into files of at most `block_size - margin` bytes.
#[derive(Debug, Clone)]
pub struct BlockFitter {
    metadata: Arc<DatasetMetadata>,
    block_size: u64,
    margin: u64,
    split_dimension: Option<String>,
}

impl BlockFitter {
    /// Fitter with the default margin.
    pub fn new(metadata: Arc<DatasetMetadata>, block_size: u64) -> Self {
        Self {
            metadata,
            block_size,
            margin: ESTIMATION_MARGIN,
            split_dimension: None,
        }
    }

    /// Fitter using the sizes and split override of a configuration.
    pub fn from_config(metadata: Arc<DatasetMetadata>, config: &AlignerConfig) -> Self {
        Self {
            metadata,
            block_size: config.block_size,
            margin: config.estimation_margin,
            split_dimension: config.split_dimension.clone(),
        }
    }

    /// Override the estimation margin.
    pub fn with_margin(mut self, margin: u64) -> Self {
        self.margin = margin;
        self
    }

    /// Prefer splitting along `dimension` when it is splittable.
    pub fn with_split_dimension(mut self, dimension: Option<String>) -> Self {
        self.split_dimension = dimension;
        self
    }

    /// Files must be estimated strictly below this many bytes.
    pub fn block_limit(&self) -> u64 {
        self.block_size.saturating_sub(self.margin)
    }

    /// Unsplit descriptor of an assignment.
    pub fn full_descriptor(&self, assignment: &VariableAssignment) -> Result<DataDescriptor, FittingError> {
        DataDescriptor::full(Arc::clone(&self.metadata), assignment.all_variables())
            .map_err(|e| FittingError::new(e.into(), assignment, None))
    }

    /// Fit one assignment.
    pub fn fit(&self, assignment: &VariableAssignment) -> Result<VariableFit, FittingError> {
        let full = self.full_descriptor(assignment)?;
        let full_size = full
            .estimate_size()
            .map_err(|e| FittingError::new(e.into(), assignment, Some(&full)))?;
        let limit = self.block_limit();

        let descriptors = if full_size < limit {
            debug!(assignment = %assignment, size = full_size, limit, "Assignment fits in one file");
            vec![full]
        } else {
            self.split(assignment, &full, full_size)?
        };

        VariableFit::from_descriptors(descriptors)
            .map_err(|e| FittingError::new(e.into(), assignment, None))
    }

    /// Fit every assignment of a candidate, in order.
    pub fn fit_all(
        &self,
        assignments: &[VariableAssignment],
    ) -> Result<Vec<(VariableAssignment, VariableFit)>, FittingError> {
        assignments
            .iter()
            .map(|assignment| Ok((assignment.clone(), self.fit(assignment)?)))
            .collect()
    }

    /// Dimensions of a descriptor in split preference order.
    pub fn rank_dimensions<'d>(&self, descriptor: &'d DataDescriptor) -> Vec<&'d DimensionRange> {
        let mut ranked: Vec<&DimensionRange> = descriptor.dims().values().collect();
        ranked.sort_by(|a, b| compare_split_candidates(a, b));
        if let Some(preferred) = self.split_dimension.as_deref() {
            if let Some(position) = ranked.iter().position(|r| r.name == preferred) {
                let range = ranked.remove(position);
                ranked.insert(0, range);
            }
        }
        ranked
    }

    fn split(
        &self,
        assignment: &VariableAssignment,
        full: &DataDescriptor,
        full_size: u64,
    ) -> Result<Vec<DataDescriptor>, FittingError> {
        let limit = self.block_limit();
        let fail = |reason: FitFailure, dd: &DataDescriptor| FittingError::new(reason, assignment, Some(dd));
        let estimate = |dd: &DataDescriptor| dd.estimate_size().map_err(|e| fail(e.into(), dd));

        let dim = self
            .rank_dimensions(full)
            .into_iter()
            .find(|r| r.size() > 1)
            .cloned()
            .ok_or_else(|| fail(FitFailure::NoSplittableDimension, full))?;
        let slice_zero = || {
            fail(
                FitFailure::SliceCountZero {
                    dimension: dim.name.clone(),
                },
                full,
            )
        };

        let ratio = limit as f64 / full_size as f64;
        let mut slice_count = ((ratio * dim.size() as f64).floor() as u64).min(dim.size());
        if slice_count == 0 {
            return Err(slice_zero());
        }

        let first = full.with_split(dim.first_window(slice_count));
        let first_size = estimate(&first)?;
        if first_size >= limit {
            let one = estimate(&full.with_split(dim.first_window(1)))?;
            let two = estimate(&full.with_split(dim.first_window(2)))?;
            if one >= limit {
                return Err(slice_zero());
            }
            let per_index = two.saturating_sub(one);
            let base = one.saturating_sub(per_index);
            let fitting = if per_index == 0 {
                dim.size()
            } else {
                (limit - 1 - base) / per_index
            };
            debug!(
                dimension = %dim.name,
                first_size,
                previous = slice_count,
                shrunk = fitting,
                "Shrinking slice count"
            );
            slice_count = slice_count.min(fitting);
            if slice_count == 0 {
                return Err(slice_zero());
            }
        }

        let descriptors: Vec<DataDescriptor> = dim
            .windows(slice_count)
            .into_iter()
            .map(|window| full.with_split(window))
            .collect();
        for dd in &descriptors {
            let size = estimate(dd)?;
            if size >= limit {
                let window = dd.split_range().cloned().unwrap_or_else(|| dim.clone());
                return Err(fail(
                    FitFailure::OverBudget {
                        window,
                        estimate: size,
                        limit,
                    },
                    dd,
                ));
            }
        }

        debug!(
            assignment = %assignment,
            dimension = %dim.name,
            full_size,
            slice_count,
            files = descriptors.len(),
            "Split assignment"
        );
        Ok(descriptors)
    }
}

/// Finite before unlimited, larger before smaller, then by name.
fn compare_split_candidates(a: &DimensionRange, b: &DimensionRange) -> Ordering {
    a.unbounded
        .cmp(&b.unbounded)
        .then_with(|| b.size().cmp(&a.size()))
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DatasetSchema;
    use crate::types::DataType;
    use std::collections::BTreeSet;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn make_rows(rows: u64) -> Arc<DatasetMetadata> {
        let schema = DatasetSchema::new("mem://rows.nc")
            .unlimited_dimension("rows", rows)
            .variable("values", DataType::Int, &["rows"]);
        Arc::new(DatasetMetadata::from_schema(schema).unwrap())
    }

    fn make_assignment(unlimited: &[&str], other: &[&str]) -> VariableAssignment {
        VariableAssignment::new(set(unlimited), set(&[]), set(&[]), set(other), set(&[]))
    }

    #[test]
    fn test_small_assignment_keeps_full_descriptor() {
        let md = make_rows(100);
        let fitter = BlockFitter::new(Arc::clone(&md), 64_000_000);
        let va = make_assignment(&["values"], &[]);

        let fit = fitter.fit(&va).unwrap();
        assert_eq!(fit.file_count(), 1);
        assert!(!fit.is_split());
        assert_eq!(fit.descriptors()[0], fitter.full_descriptor(&va).unwrap());
        assert_eq!(fit.records("values"), Some(100));
    }

    #[test]
    fn test_split_tiles_dimension() {
        // 82 header + 8 align + 4 per row
        let md = make_rows(1000);
        let fitter = BlockFitter::new(md, 1190).with_margin(0);
        let fit = fitter.fit(&make_assignment(&["values"], &[])).unwrap();

        assert!(fit.file_count() > 1);
        let mut next = 0;
        for dd in fit.descriptors() {
            let range = dd.split_range().unwrap();
            assert_eq!(range.start, next);
            assert!(dd.estimate_size().unwrap() < 1190);
            next = range.end + 1;
        }
        assert_eq!(next, 1000);
    }

    #[test]
    fn test_shrink_pass_makes_first_window_fit() {
        // The proportional slice count is 271 rows (1174 bytes); only 248 rows
        // fit once the header is included.
        let md = make_rows(100_000);
        let fitter = BlockFitter::new(md, 1086).with_margin(0);
        let fit = fitter.fit(&make_assignment(&["values"], &[])).unwrap();

        let first = &fit.descriptors()[0];
        assert!(first.estimate_size().unwrap() < 1086);
        assert_eq!(first.split_range().unwrap().size(), 248);
    }

    #[test]
    fn test_no_splittable_dimension() {
        let schema = DatasetSchema::new("mem://one.nc")
            .dimension("x", 1)
            .variable("v", DataType::Double, &["x"]);
        let md = Arc::new(DatasetMetadata::from_schema(schema).unwrap());
        let fitter = BlockFitter::new(md, 50).with_margin(0);
        let err = fitter.fit(&make_assignment(&[], &["v"])).unwrap_err();

        assert_eq!(err.reason, FitFailure::NoSplittableDimension);
        assert!(err.descriptor.is_some());
        assert!(err.to_string().contains("assignment: VA("));
    }

    #[test]
    fn test_single_index_over_limit() {
        let md = make_rows(10);
        let fitter = BlockFitter::new(md, 60).with_margin(0);
        let err = fitter.fit(&make_assignment(&["values"], &[])).unwrap_err();
        assert!(matches!(err.reason, FitFailure::SliceCountZero { .. }));
        assert!(err.is_unsupported_feature());
    }

    #[test]
    fn test_string_variable_is_unsupported() {
        let schema = DatasetSchema::new("mem://s.nc")
            .dimension("n", 3)
            .variable("names", DataType::String, &["n"]);
        let md = Arc::new(DatasetMetadata::from_schema(schema).unwrap());
        let err = BlockFitter::new(md, 1 << 20)
            .fit(&make_assignment(&[], &["names"]))
            .unwrap_err();
        assert!(err.is_unsupported_feature());
    }

    fn make_grid() -> Arc<DatasetMetadata> {
        let schema = DatasetSchema::new("mem://grid.nc")
            .unlimited_dimension("time", 100)
            .dimension("lat", 50)
            .dimension("lon", 80)
            .dimension("level", 1)
            .variable("tas", DataType::Float, &["time", "lat", "lon", "level"]);
        Arc::new(DatasetMetadata::from_schema(schema).unwrap())
    }

    #[test]
    fn test_rank_prefers_large_finite_dimensions() {
        let md = make_grid();
        let fitter = BlockFitter::new(Arc::clone(&md), 1 << 20);
        let full = DataDescriptor::full(md, set(&["tas"])).unwrap();

        let ranked: Vec<_> = fitter.rank_dimensions(&full).iter().map(|r| r.name.as_str()).collect();
        assert_eq!(ranked, vec!["lon", "lat", "level", "time"]);
    }

    #[test]
    fn test_split_override_goes_first() {
        let md = make_grid();
        let fitter = BlockFitter::new(Arc::clone(&md), 1 << 20)
            .with_split_dimension(Some("time".into()));
        let full = DataDescriptor::full(Arc::clone(&md), set(&["tas"])).unwrap();
        assert_eq!(fitter.rank_dimensions(&full)[0].name, "time");

        let fit = fitter.fit(&make_assignment(&["tas"], &[])).unwrap();
        assert!(fit.descriptors().iter().all(|dd| dd.split_dimension() == Some("time")));
    }
}
