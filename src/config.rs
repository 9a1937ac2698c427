use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};
use strum::{Display, EnumString};

use crate::{EngineError, EngineResult};

/// How a batch run reacts when one instance group raises a runtime error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchErrorPolicy {
    /// Abort on the first failure and keep no results at all.
    FailFast,
    /// Drop only the failing instance groups.
    #[default]
    SkipFailing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Entry names that function parameters auto-bind to.
    #[serde(default = "default_entry_names")]
    pub entry_names: Vec<String>,

    /// Sample size used by `create` when none is requested; `None` means the whole dataset.
    #[serde(default)]
    pub default_test_size: Option<usize>,

    #[serde(default)]
    pub batch_error_policy: BatchErrorPolicy,

    #[serde(default = "default_primary_metric")]
    pub primary_metric: String,

    #[serde(default = "default_outlier_iqr_factor")]
    pub outlier_iqr_factor: f64,

    #[serde(default = "default_rare_category_ratio")]
    pub rare_category_ratio: f64,

    #[serde(default = "default_bin_count")]
    pub bin_count: usize,

    #[serde(default = "default_top_categories")]
    pub top_categories: usize,

    #[serde(default)]
    pub default_model: Option<String>,

    #[serde(default)]
    pub selected_rewrite: Option<String>,

    #[serde(default)]
    pub sample_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_names: default_entry_names(),
            default_test_size: None,
            batch_error_policy: BatchErrorPolicy::default(),
            primary_metric: default_primary_metric(),
            outlier_iqr_factor: default_outlier_iqr_factor(),
            rare_category_ratio: default_rare_category_ratio(),
            bin_count: default_bin_count(),
            top_categories: default_top_categories(),
            default_model: None,
            selected_rewrite: None,
            sample_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_str(s: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.bin_count == 0 {
            return Err(EngineError::configuration("bin_count must be positive"));
        }
        if !(0.0..=1.0).contains(&self.rare_category_ratio) {
            return Err(EngineError::configuration(
                "rare_category_ratio must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

fn default_entry_names() -> Vec<String> {
    ["question", "context", "groundtruths", "predictions"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_primary_metric() -> String {
    "f1".to_string()
}
fn default_outlier_iqr_factor() -> f64 {
    1.5
}
fn default_rare_category_ratio() -> f64 {
    0.05
}
fn default_bin_count() -> usize {
    5
}
fn default_top_categories() -> usize {
    10
}
