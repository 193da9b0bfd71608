//! Aligner configuration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::canonical::canonical_hash_hex;
use crate::fitter::ESTIMATION_MARGIN;
use crate::measure::DEFAULT_MEASURE;

/// Default block size: 64 MiB, the usual HDFS block.
pub const DEFAULT_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Default capacity of the writer hand-off queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Settings for one alignment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Target file size in bytes (default: 64 MiB).
    pub block_size: u64,
    /// Bytes kept free below the block size (default: 100).
    pub estimation_margin: u64,
    /// Registry key of the quality measure (default: `MIVRM`).
    pub measure: String,
    /// Dimension to split along whenever it is splittable.
    pub split_dimension: Option<String>,
    /// Maximum number of variable groups to enumerate partitions for.
    pub max_groups: Option<usize>,
    /// Capacity of the writer hand-off queue (default: 1000).
    pub queue_capacity: usize,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            estimation_margin: ESTIMATION_MARGIN,
            measure: DEFAULT_MEASURE.to_string(),
            split_dimension: None,
            max_groups: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl AlignerConfig {
    /// Default configuration with a custom block size.
    pub fn with_block_size(block_size: u64) -> Self {
        Self {
            block_size,
            ..Self::default()
        }
    }

    /// Load configuration from `ALIGNER_*` environment variables.
    ///
    /// Unparsable values are logged and replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            block_size: parse_or(&lookup, "ALIGNER_BLOCK_SIZE", defaults.block_size),
            estimation_margin: parse_or(&lookup, "ALIGNER_MARGIN", defaults.estimation_margin),
            measure: lookup("ALIGNER_MEASURE")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.measure),
            split_dimension: lookup("ALIGNER_SPLIT_DIM").filter(|d| !d.trim().is_empty()),
            max_groups: lookup("ALIGNER_MAX_GROUPS").and_then(|raw| match raw.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(key = "ALIGNER_MAX_GROUPS", value = %raw, "Ignoring unparsable setting");
                    None
                }
            }),
            queue_capacity: parse_or(&lookup, "ALIGNER_QUEUE_CAPACITY", defaults.queue_capacity),
        }
    }

    /// Largest file size that is accepted, `block_size - estimation_margin`.
    pub fn block_limit(&self) -> u64 {
        self.block_size.saturating_sub(self.estimation_margin)
    }

    /// Deterministic fingerprint of the configuration.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparsable setting, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
impl AlignerConfig {
    /// Small blocks for unit tests.
    pub fn minimal() -> Self {
        Self {
            block_size: 4096,
            estimation_margin: 0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AlignerConfig::default();
        assert_eq!(config.block_size, 67_108_864);
        assert_eq!(config.estimation_margin, 100);
        assert_eq!(config.measure, "MIVRM");
        assert_eq!(config.block_limit(), 67_108_764);
        assert_eq!(config.queue_capacity, 1000);
        assert!(config.max_groups.is_none());
    }

    #[test]
    fn test_from_lookup() {
        let config = AlignerConfig::from_lookup(lookup_from(&[
            ("ALIGNER_BLOCK_SIZE", "64000000"),
            ("ALIGNER_MEASURE", "MFM"),
            ("ALIGNER_SPLIT_DIM", "time"),
            ("ALIGNER_MAX_GROUPS", "8"),
        ]));
        assert_eq!(config.block_size, 64_000_000);
        assert_eq!(config.measure, "MFM");
        assert_eq!(config.split_dimension.as_deref(), Some("time"));
        assert_eq!(config.max_groups, Some(8));
        assert_eq!(config.estimation_margin, 100);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = AlignerConfig::from_lookup(lookup_from(&[
            ("ALIGNER_BLOCK_SIZE", "lots"),
            ("ALIGNER_MAX_GROUPS", "-1"),
            ("ALIGNER_SPLIT_DIM", " "),
        ]));
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert!(config.max_groups.is_none());
        assert!(config.split_dimension.is_none());
    }

    #[test]
    fn test_params_hash() {
        let a = AlignerConfig::default();
        let b = AlignerConfig::default();
        assert_eq!(a.params_hash(), b.params_hash());
        assert_ne!(a.params_hash(), AlignerConfig::minimal().params_hash());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AlignerConfig = serde_json::from_str(r#"{"block_size": 1024}"#).unwrap();
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.measure, "MIVRM");
    }
}
