//! Minimize the number of output files.

use super::AssignmentQualityMeasure;
use crate::aligner::VariableAlignment;
use crate::metadata::DatasetMetadata;

/// Registry key.
pub const KEY: &str = "MFM";

/// Scores an alignment by the negated total number of files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinFilesMeasure;

impl AssignmentQualityMeasure for MinFilesMeasure {
    fn score(&self, alignment: &VariableAlignment, _metadata: &DatasetMetadata) -> f64 {
        -(alignment.file_count() as f64)
    }

    fn key(&self) -> &'static str {
        KEY
    }

    fn title(&self) -> &'static str {
        "Min Files"
    }

    fn description(&self) -> &'static str {
        "Minimises the total number of files"
    }
}
