use std::time::Duration;

use crate::error::{Error, Result};
use crate::extractor::ExtractorConfig;
use crate::hasher::FINGERPRINT_BITS;
use crate::matching::DetectorConfig;

pub const KEY_THRESHOLD: &str = "near_dup_threshold";
pub const KEY_METHOD: &str = "near_dup_method";
pub const KEY_MIN_CLUSTER_SIZE: &str = "min_cluster_size";
pub const KEY_CHUNK_SIZE: &str = "chunk_size";
pub const KEY_TIME_BUDGET_MS: &str = "time_budget_ms";

/// Keys accepted in the catalog's config table.
pub const CONFIG_KEYS: &[&str] = &[
    KEY_THRESHOLD,
    KEY_METHOD,
    KEY_MIN_CLUSTER_SIZE,
    KEY_CHUNK_SIZE,
    KEY_TIME_BUDGET_MS,
];

/// Everything the extractor and the clusterer are constructed with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub extractor: ExtractorConfig,
    pub detector: DetectorConfig,
}

impl EngineConfig {
    /// Apply one stored override. Unknown keys and unparsable or
    /// out-of-range values fail with `InvalidConfig`.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || Error::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
        };
        let value = value.trim();

        match key {
            KEY_THRESHOLD => {
                self.detector.threshold = value
                    .parse::<u32>()
                    .ok()
                    .filter(|&t| t <= FINGERPRINT_BITS)
                    .ok_or_else(invalid)?;
            }
            KEY_METHOD => {
                if value.is_empty() {
                    return Err(invalid());
                }
                self.detector.method = value.to_string();
            }
            KEY_MIN_CLUSTER_SIZE => {
                self.detector.min_cluster_size = parse_positive(value).ok_or_else(invalid)?;
            }
            KEY_CHUNK_SIZE => {
                self.extractor.chunk_size = parse_positive(value).ok_or_else(invalid)?;
            }
            KEY_TIME_BUDGET_MS => {
                let ms = parse_positive(value).ok_or_else(invalid)?;
                self.extractor.time_budget = Duration::from_millis(ms as u64);
            }
            _ => return Err(invalid()),
        }
        Ok(())
    }

    /// The resolved value of every key, in `CONFIG_KEYS` order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_THRESHOLD, self.detector.threshold.to_string()),
            (KEY_METHOD, self.detector.method.clone()),
            (KEY_MIN_CLUSTER_SIZE, self.detector.min_cluster_size.to_string()),
            (KEY_CHUNK_SIZE, self.extractor.chunk_size.to_string()),
            (
                KEY_TIME_BUDGET_MS,
                self.extractor.time_budget.as_millis().to_string(),
            ),
        ]
    }
}

fn parse_positive(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|&v| v > 0)
}
