//! Maximize unlimited-variable records per file.

use super::AssignmentQualityMeasure;
use crate::aligner::VariableAlignment;
use crate::metadata::DatasetMetadata;

/// Registry key.
pub const KEY: &str = "MIVRM";

/// Prefers alignments that keep many records of unlimited variables in few
/// files.
///
/// ```text
/// score = Σ assignments ( Σ records(unlimited var) - file count )
/// ```
///
/// Records of a variable are its element count in the first descriptor of
/// the assignment's fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxUnlimitedRecordsMeasure;

impl AssignmentQualityMeasure for MaxUnlimitedRecordsMeasure {
    fn score(&self, alignment: &VariableAlignment, _metadata: &DatasetMetadata) -> f64 {
        alignment
            .iter()
            .map(|(assignment, fit)| {
                let records: u64 = assignment
                    .unlimited()
                    .iter()
                    .filter_map(|var| fit.records(var))
                    .sum();
                records as f64 - fit.file_count() as f64
            })
            .sum()
    }

    fn key(&self) -> &'static str {
        KEY
    }

    fn title(&self) -> &'static str {
        "Max Unlimited Variable Records"
    }

    fn description(&self) -> &'static str {
        "Maximises records of unlimited variables per file while minimising the number of files"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DataDescriptor;
    use crate::fitter::VariableFit;
    use crate::metadata::DatasetSchema;
    use crate::types::{DataType, DimensionRange, VariableAssignment};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_records_minus_files() {
        let schema = DatasetSchema::new("mem://rows.nc")
            .unlimited_dimension("rows", 100)
            .dimension("x", 3)
            .variable("values", DataType::Int, &["rows"])
            .variable("fixed", DataType::Int, &["x"]);
        let md = Arc::new(DatasetMetadata::from_schema(schema).unwrap());

        let full = DataDescriptor::full(Arc::clone(&md), set(&["values"])).unwrap();
        let windows: Vec<_> = DimensionRange::full("rows", 100, true)
            .unwrap()
            .windows(40)
            .into_iter()
            .map(|w| full.with_split(w))
            .collect();
        let split = VariableAssignment::new(set(&["values"]), set(&[]), set(&[]), set(&[]), set(&[]));
        let fixed = VariableAssignment::new(set(&[]), set(&[]), set(&[]), set(&["fixed"]), set(&[]));
        let fixed_fit = VariableFit::from_descriptors(vec![
            DataDescriptor::full(Arc::clone(&md), set(&["fixed"])).unwrap(),
        ])
        .unwrap();

        let alignment = VariableAlignment::new(vec![
            (split, VariableFit::from_descriptors(windows).unwrap()),
            (fixed, fixed_fit),
        ]);

        // 40 records over 3 files, then 0 records in 1 file
        let score = MaxUnlimitedRecordsMeasure.score(&alignment, &md);
        assert_eq!(score, (40.0 - 3.0) + (0.0 - 1.0));
    }
}
