//! Quality measures for scoring candidate alignments.
//!
//! A measure maps a fitted [`VariableAlignment`] to a score; the aligner
//! keeps the candidate with the highest score. Measures are registered by
//! key in a [`MeasureRegistry`] built by the caller.

pub mod max_records;
pub mod min_files;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::aligner::{AlignError, VariableAlignment};
use crate::canonical::canonical_hash_hex;
use crate::metadata::DatasetMetadata;

pub use max_records::MaxUnlimitedRecordsMeasure;
pub use min_files::MinFilesMeasure;

/// Key of the default measure.
pub const DEFAULT_MEASURE: &str = max_records::KEY;

/// Scores a fitted alignment. Higher is better.
pub trait AssignmentQualityMeasure: Send + Sync {
    /// Score an alignment.
    fn score(&self, alignment: &VariableAlignment, metadata: &DatasetMetadata) -> f64;

    /// Registry key, e.g. `MIVRM`.
    fn key(&self) -> &'static str;

    /// Human-readable title.
    fn title(&self) -> &'static str;

    /// One-line description of what the measure optimizes.
    fn description(&self) -> &'static str;
}

/// Registry of quality measures by key.
#[derive(Clone)]
pub struct MeasureRegistry {
    measures: BTreeMap<String, Arc<dyn AssignmentQualityMeasure>>,
    registry_fingerprint: String,
}

impl MeasureRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let mut registry = Self {
            measures: BTreeMap::new(),
            registry_fingerprint: String::new(),
        };
        registry.update_fingerprint();
        registry
    }

    /// Registry holding `MIVRM` and `MFM`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MaxUnlimitedRecordsMeasure));
        registry.register(Arc::new(MinFilesMeasure));
        registry
    }

    /// Register a measure under its key, replacing any previous one.
    pub fn register(&mut self, measure: Arc<dyn AssignmentQualityMeasure>) {
        self.measures.insert(measure.key().to_string(), measure);
        self.update_fingerprint();
    }

    /// Look up a measure.
    pub fn get(&self, key: &str) -> Option<Arc<dyn AssignmentQualityMeasure>> {
        self.measures.get(key).cloned()
    }

    /// Look up a measure, failing for unknown keys.
    pub fn resolve(&self, key: &str) -> Result<Arc<dyn AssignmentQualityMeasure>, AlignError> {
        self.get(key)
            .ok_or_else(|| AlignError::UnknownMeasure(key.to_string()))
    }

    /// Registered keys in order.
    pub fn keys(&self) -> Vec<&str> {
        self.measures.keys().map(String::as_str).collect()
    }

    /// `key (title): description` lines in key order.
    pub fn describe(&self) -> String {
        self.measures
            .iter()
            .map(|(key, m)| format!("{key} ({}): {}", m.title(), m.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fingerprint of the registered keys.
    pub fn fingerprint(&self) -> &str {
        &self.registry_fingerprint
    }

    /// Number of registered measures.
    pub fn len(&self) -> usize {
        self.measures.len()
    }

    /// Whether no measure is registered.
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    fn update_fingerprint(&mut self) {
        let keys: Vec<_> = self.measures.keys().collect();
        self.registry_fingerprint = canonical_hash_hex(&keys);
    }
}

impl Default for MeasureRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for MeasureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasureRegistry")
            .field("keys", &self.keys())
            .field("fingerprint", &self.registry_fingerprint)
            .finish()
    }
}
