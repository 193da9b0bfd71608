//! Alignment orchestration.
//!
//! ## Pipeline
//!
//! ```text
//! DatasetMetadata → group_variables → SetPartitions → BlockFitter → measure
//!                                          (per candidate)      ↓
//!                                                      best VariableAlignment
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Candidates are enumerated in a fixed order, the single-assignment
//!   candidate first
//! - The first candidate with the highest score wins; NaN never wins
//! - Same metadata + same config + same measure → same alignment fingerprint

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::canonical::canonical_hash_hex;
use crate::codec;
use crate::config::AlignerConfig;
use crate::descriptor::DataDescriptor;
use crate::fitter::{BlockFitter, FittingError, VariableFit};
use crate::grouper::{group_variables, VariableGroup};
use crate::measure::{AssignmentQualityMeasure, MeasureRegistry};
use crate::metadata::{DatasetMetadata, MetadataError};
use crate::partition::{bell_number, to_assignments, SetPartitions};
use crate::types::VariableAssignment;

/// Errors that abort the alignment of a dataset.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlignError {
    /// Metadata inconsistency.
    #[error("Metadata inconsistency: {0}")]
    Metadata(#[from] MetadataError),

    /// A candidate assignment could not be fitted.
    #[error(transparent)]
    Fitting(#[from] FittingError),

    /// Measure key not in the registry.
    #[error("Unknown assignment quality measure: {0}")]
    UnknownMeasure(String),

    /// More groups than the configured maximum.
    #[error("{groups} variable groups exceed the configured maximum of {max}")]
    TooManyGroups {
        /// Groups found.
        groups: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Dataset has no variables at all.
    #[error("Dataset {0} has no variables to align")]
    EmptyDataset(String),
}

/// Assignments paired with their fits, in candidate order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableAlignment {
    assignments: Vec<VariableAssignment>,
    fits: Vec<VariableFit>,
}

impl VariableAlignment {
    /// Build from `(assignment, fit)` pairs.
    pub fn new(pairs: Vec<(VariableAssignment, VariableFit)>) -> Self {
        let (assignments, fits) = pairs.into_iter().unzip();
        Self { assignments, fits }
    }

    /// Pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&VariableAssignment, &VariableFit)> {
        self.assignments.iter().zip(&self.fits)
    }

    /// Assignments in order.
    pub fn assignments(&self) -> &[VariableAssignment] {
        &self.assignments
    }

    /// Fits in order.
    pub fn fits(&self) -> &[VariableFit] {
        &self.fits
    }

    /// Number of assignments.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether there are no assignments.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Total number of files across all fits.
    pub fn file_count(&self) -> usize {
        self.fits.iter().map(VariableFit::file_count).sum()
    }

    /// Every file plan, assignment by assignment.
    pub fn descriptors(&self) -> impl Iterator<Item = &DataDescriptor> {
        self.fits.iter().flat_map(|fit| fit.descriptors())
    }

    /// Names of every file to write.
    pub fn file_names(&self) -> Vec<String> {
        self.descriptors().map(codec::file_name).collect()
    }

    /// Deterministic fingerprint of the plan.
    pub fn fingerprint(&self) -> String {
        canonical_hash_hex(&(crate::PLAN_FORMAT_VERSION, self))
    }
}

impl fmt::Display for VariableAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "VariableAlignment({} files)", self.file_count())?;
        for (assignment, fit) in self.iter() {
            writeln!(f, "  {assignment} -> {} file(s)", fit.file_count())?;
        }
        Ok(())
    }
}

/// Chooses the best-scoring way to split a dataset into block-sized files.
pub struct BlockAligner {
    metadata: Arc<DatasetMetadata>,
    measure: Arc<dyn AssignmentQualityMeasure>,
    config: AlignerConfig,
}

impl BlockAligner {
    /// Create an aligner with an explicit measure.
    pub fn new(
        metadata: Arc<DatasetMetadata>,
        measure: Arc<dyn AssignmentQualityMeasure>,
        config: AlignerConfig,
    ) -> Self {
        Self {
            metadata,
            measure,
            config,
        }
    }

    /// Create an aligner using the measure named in `config`.
    pub fn from_registry(
        metadata: Arc<DatasetMetadata>,
        registry: &MeasureRegistry,
        config: AlignerConfig,
    ) -> Result<Self, AlignError> {
        let measure = registry.resolve(&config.measure)?;
        Ok(Self::new(metadata, measure, config))
    }

    /// Dataset being aligned.
    pub fn metadata(&self) -> &Arc<DatasetMetadata> {
        &self.metadata
    }

    /// Active configuration.
    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Every candidate list of assignments, in evaluation order.
    pub fn enumerate_candidates(&self) -> Result<Vec<Vec<VariableAssignment>>, AlignError> {
        let groups = self.groups()?;
        let candidates = self.candidates(&groups)?.collect();
        Ok(candidates)
    }

    /// Fit and score one candidate.
    pub fn evaluate(&self, candidate: &[VariableAssignment]) -> Result<(VariableAlignment, f64), AlignError> {
        let fitter = BlockFitter::from_config(Arc::clone(&self.metadata), &self.config);
        self.evaluate_with(&fitter, candidate)
    }

    /// Find the best-scoring alignment.
    pub fn align(&self) -> Result<VariableAlignment, AlignError> {
        let groups = self.groups()?;
        let fitter = BlockFitter::from_config(Arc::clone(&self.metadata), &self.config);

        let mut best: Option<(VariableAlignment, f64)> = None;
        let mut evaluated = 0usize;
        for candidate in self.candidates(&groups)? {
            let (alignment, score) = self.evaluate_with(&fitter, &candidate)?;
            evaluated += 1;
            debug!(
                candidate = evaluated,
                assignments = alignment.len(),
                files = alignment.file_count(),
                score,
                "Scored candidate"
            );
            let replace = match &best {
                None => true,
                Some((_, best_score)) => {
                    score > *best_score || (best_score.is_nan() && !score.is_nan())
                }
            };
            if replace {
                best = Some((alignment, score));
            }
        }

        let (alignment, score) = best.ok_or_else(|| {
            AlignError::EmptyDataset(self.metadata.location().to_string())
        })?;
        info!(
            location = %self.metadata.location(),
            measure = self.measure.key(),
            score,
            candidates = evaluated,
            assignments = alignment.len(),
            files = alignment.file_count(),
            fingerprint = %alignment.fingerprint(),
            "Selected alignment"
        );
        Ok(alignment)
    }

    fn groups(&self) -> Result<Vec<VariableGroup>, AlignError> {
        let groups = group_variables(&self.metadata)?;
        if let Some(max) = self.config.max_groups {
            if groups.len() > max {
                return Err(AlignError::TooManyGroups {
                    groups: groups.len(),
                    max,
                });
            }
        }
        debug!(
            groups = groups.len(),
            candidates = ?bell_number(groups.len()),
            "Enumerating candidates"
        );
        Ok(groups)
    }

    fn candidates<'a>(
        &'a self,
        groups: &'a [VariableGroup],
    ) -> Result<Box<dyn Iterator<Item = Vec<VariableAssignment>> + 'a>, AlignError> {
        if groups.is_empty() {
            let constants = self.metadata.constants();
            if constants.is_empty() {
                return Err(AlignError::EmptyDataset(self.metadata.location().to_string()));
            }
            let only = vec![VariableAssignment::constants_only(constants.clone())];
            return Ok(Box::new(std::iter::once(only)));
        }
        let metadata = &self.metadata;
        Ok(Box::new(
            SetPartitions::new(groups.len())
                .map(move |partition| to_assignments(&partition, groups, metadata)),
        ))
    }

    fn evaluate_with(
        &self,
        fitter: &BlockFitter,
        candidate: &[VariableAssignment],
    ) -> Result<(VariableAlignment, f64), AlignError> {
        let alignment = VariableAlignment::new(fitter.fit_all(candidate)?);
        let score = self.measure.score(&alignment, &self.metadata);
        Ok((alignment, score))
    }
}

impl fmt::Debug for BlockAligner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockAligner")
            .field("location", &self.metadata.location())
            .field("measure", &self.measure.key())
            .field("config", &self.config)
            .finish()
    }
}
