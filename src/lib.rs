//! # block-aligner
//!
//! Block-size aware repartitioning plans for multi-dimensional scientific
//! array datasets.
//!
//! The aligner answers one question:
//!
//! > How should a dataset's variables be split into files so that every file
//! > fits in one storage block?
//!
//! ## Core Contract
//!
//! 1. Group variables by the dimensions and coordinates they depend on
//! 2. Enumerate every way to combine groups into file groups
//! 3. Fit each file group into block-sized files, splitting along one
//!    dimension when needed
//! 4. Score every candidate with a pluggable measure and keep the best
//! 5. Name each planned file with a reversible identity
//!
//! ## Architecture
//!
//! ```text
//! DatasetSchema → DatasetMetadata → Grouper → Partitioner
//!                                                 ↓
//!                     Measure ⇄ BlockAligner ⇄ BlockFitter ⇄ DataDescriptor
//!                                   ↓
//!                           VariableAlignment → codec::file_name → writer
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same metadata + same config + same measure → identical alignment
//!   fingerprint
//! - Variable and dimension sets are ordered by name
//! - Candidates are evaluated in a fixed order and the first best one wins

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod metadata;
pub mod descriptor;
pub mod grouper;
pub mod partition;
pub mod measure;
pub mod fitter;
pub mod aligner;
pub mod codec;
pub mod queue;
pub mod config;
pub mod canonical;
pub mod telemetry;

// Re-exports
pub use types::{
    Attribute, AttributeValue, CoordinateValues, DataType, DimensionRange, InvalidRange,
    ScalarKind, TypeMismatch, TypedRange, UnknownDataType, VariableAssignment,
};
pub use metadata::{
    DatasetMetadata, DatasetSchema, DimensionInfo, DimensionSpec, MetadataError, VariableInfo,
    VariableKind, VariableSpec,
};
pub use descriptor::{DataDescriptor, EstimateError};
pub use grouper::{group_variables, DependencyGraph, VariableGroup, VertexName};
pub use partition::{bell_number, SetPartitions};
pub use measure::{
    AssignmentQualityMeasure, MaxUnlimitedRecordsMeasure, MeasureRegistry, MinFilesMeasure,
    DEFAULT_MEASURE,
};
pub use fitter::{BlockFitter, FitFailure, FittingError, VariableFit, ESTIMATION_MARGIN};
pub use aligner::{AlignError, BlockAligner, VariableAlignment};
pub use codec::{deserialise, file_name, parse_file_name, serialise, CodecError, FileInfo, FILE_SUFFIX};
pub use queue::{QueueClosed, WorkQueue};
pub use config::{AlignerConfig, DEFAULT_BLOCK_SIZE};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use telemetry::init_tracing;

/// Version of the plan serialization, bumped when fingerprints change.
pub const PLAN_FORMAT_VERSION: &str = "block_plan_v1";
