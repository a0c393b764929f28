//! Configuration loading and management.
//!
//! [`ReconstructionConfig`] is the parameter object consumed by the reconstruction
//! engine. It can be created programmatically, loaded from TOML, YAML or JSON files, or
//! discovered by walking up from the current directory looking for `tafel.toml`.

use crate::{Result, TafelError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reconstruction parameters.
///
/// Every field has a documented default, so a partial config file only overrides the
/// values it names.
///
/// # Example
///
/// ```rust
/// use tafel::core::config::ReconstructionConfig;
///
/// let config = ReconstructionConfig {
///     column_epsilon_factor: 0.4,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    /// Row epsilon = median font size x this factor
    #[serde(default = "default_row_epsilon_factor")]
    pub row_epsilon_factor: f64,

    /// Lower clamp for the row epsilon (guards near-zero font sizes)
    #[serde(default = "default_min_row_epsilon")]
    pub min_row_epsilon: f64,

    /// Upper clamp for the row epsilon (guards huge fonts merging rows)
    #[serde(default = "default_max_row_epsilon")]
    pub max_row_epsilon: f64,

    /// Column epsilon = median fragment width x this factor
    #[serde(default = "default_column_epsilon_factor")]
    pub column_epsilon_factor: f64,

    #[serde(default = "default_min_column_epsilon")]
    pub min_column_epsilon: f64,

    #[serde(default = "default_max_column_epsilon")]
    pub max_column_epsilon: f64,

    /// Adjacent column starts closer than this are merged into one column
    #[serde(default = "default_min_column_width")]
    pub min_column_width: f64,

    /// A vertical gap larger than this many mean row heights starts a new table region
    #[serde(default = "default_max_row_gap_ratio")]
    pub max_row_gap_ratio: f64,

    /// Candidates that fall below this confidence after losing fragments are discarded
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Candidates that fall below this fill ratio after losing fragments are discarded
    #[serde(default = "default_min_fill_ratio_for_discard")]
    pub min_fill_ratio_for_discard: f64,

    /// Pages with more fragments than this are rejected as too large
    #[serde(default = "default_max_fragments_per_page")]
    pub max_fragments_per_page: usize,

    /// Number of page results kept in the LRU cache (0 disables caching)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Page worker threads (None = number of CPUs)
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Confidence factor weights
    #[serde(default)]
    pub scoring: ScoringWeights,
}

/// Weights of the confidence factors.
///
/// The weights are normalised by their sum, so only their ratios matter. The size gate
/// weight is only earned by grids of at least 2 x 2; smaller grids score 0 regardless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_factor_weight")]
    pub row_regularity: f64,

    #[serde(default = "default_factor_weight")]
    pub fill_ratio: f64,

    #[serde(default = "default_factor_weight")]
    pub edge_consistency: f64,

    #[serde(default = "default_size_gate_weight")]
    pub size_gate: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            row_regularity: default_factor_weight(),
            fill_ratio: default_factor_weight(),
            edge_consistency: default_factor_weight(),
            size_gate: default_size_gate_weight(),
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.row_regularity + self.fill_ratio + self.edge_consistency + self.size_gate
    }
}

fn default_row_epsilon_factor() -> f64 {
    0.6
}

fn default_min_row_epsilon() -> f64 {
    1.0
}

fn default_max_row_epsilon() -> f64 {
    48.0
}

fn default_column_epsilon_factor() -> f64 {
    0.5
}

fn default_min_column_epsilon() -> f64 {
    2.0
}

fn default_max_column_epsilon() -> f64 {
    120.0
}

fn default_min_column_width() -> f64 {
    8.0
}

fn default_max_row_gap_ratio() -> f64 {
    3.0
}

fn default_min_confidence() -> f64 {
    0.3
}

fn default_min_fill_ratio_for_discard() -> f64 {
    0.25
}

fn default_max_fragments_per_page() -> usize {
    20_000
}

fn default_cache_capacity() -> usize {
    128
}

fn default_factor_weight() -> f64 {
    0.3
}

fn default_size_gate_weight() -> f64 {
    0.1
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            row_epsilon_factor: default_row_epsilon_factor(),
            min_row_epsilon: default_min_row_epsilon(),
            max_row_epsilon: default_max_row_epsilon(),
            column_epsilon_factor: default_column_epsilon_factor(),
            min_column_epsilon: default_min_column_epsilon(),
            max_column_epsilon: default_max_column_epsilon(),
            min_column_width: default_min_column_width(),
            max_row_gap_ratio: default_max_row_gap_ratio(),
            min_confidence: default_min_confidence(),
            min_fill_ratio_for_discard: default_min_fill_ratio_for_discard(),
            max_fragments_per_page: default_max_fragments_per_page(),
            cache_capacity: default_cache_capacity(),
            max_workers: None,
            scoring: ScoringWeights::default(),
        }
    }
}

impl ReconstructionConfig {
    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns `TafelError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("row_epsilon_factor", self.row_epsilon_factor),
            ("min_row_epsilon", self.min_row_epsilon),
            ("max_row_epsilon", self.max_row_epsilon),
            ("column_epsilon_factor", self.column_epsilon_factor),
            ("min_column_epsilon", self.min_column_epsilon),
            ("max_column_epsilon", self.max_column_epsilon),
            ("max_row_gap_ratio", self.max_row_gap_ratio),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TafelError::validation(format!(
                    "{} must be a positive finite number, got {}",
                    name, value
                )));
            }
        }

        if self.min_row_epsilon > self.max_row_epsilon {
            return Err(TafelError::validation(format!(
                "min_row_epsilon ({}) exceeds max_row_epsilon ({})",
                self.min_row_epsilon, self.max_row_epsilon
            )));
        }
        if self.min_column_epsilon > self.max_column_epsilon {
            return Err(TafelError::validation(format!(
                "min_column_epsilon ({}) exceeds max_column_epsilon ({})",
                self.min_column_epsilon, self.max_column_epsilon
            )));
        }

        if !self.min_column_width.is_finite() || self.min_column_width < 0.0 {
            return Err(TafelError::validation(format!(
                "min_column_width must be a non-negative finite number, got {}",
                self.min_column_width
            )));
        }

        for (name, value) in [
            ("min_confidence", self.min_confidence),
            ("min_fill_ratio_for_discard", self.min_fill_ratio_for_discard),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TafelError::validation(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.max_fragments_per_page == 0 {
            return Err(TafelError::validation("max_fragments_per_page must be at least 1"));
        }
        if self.max_workers == Some(0) {
            return Err(TafelError::validation("max_workers must be at least 1 when set"));
        }

        let weights = [
            ("scoring.row_regularity", self.scoring.row_regularity),
            ("scoring.fill_ratio", self.scoring.fill_ratio),
            ("scoring.edge_consistency", self.scoring.edge_consistency),
            ("scoring.size_gate", self.scoring.size_gate),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(TafelError::validation(format!(
                    "{} must be a non-negative finite weight, got {}",
                    name, value
                )));
            }
        }
        if self.scoring.total() <= 0.0 {
            return Err(TafelError::validation("scoring weights must not all be zero"));
        }

        Ok(())
    }

    /// Worker pool size, falling back to the number of CPUs.
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `TafelError::Validation` if the file doesn't exist or is invalid TOML.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TafelError::validation(format!("Failed to read config file {}: {}", path.as_ref().display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| TafelError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TafelError::validation(format!("Failed to read config file {}: {}", path.as_ref().display(), e))
        })?;

        serde_yaml_ng::from_str(&content)
            .map_err(|e| TafelError::validation(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TafelError::validation(format!("Failed to read config file {}: {}", path.as_ref().display(), e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| TafelError::validation(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a file, picking the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns `TafelError::Validation` for unknown extensions or invalid content.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("toml") => Self::from_toml_file(path),
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(TafelError::validation(format!(
                "Unsupported config file format: {} (expected .toml, .yaml, .yml or .json)",
                path.display()
            ))),
        }
    }

    /// Discover configuration file in parent directories.
    ///
    /// Searches for `tafel.toml` in current directory and parent directories.
    ///
    /// # Returns
    ///
    /// - `Some(config)` if found
    /// - `None` if no config file found
    pub fn discover() -> Result<Option<Self>> {
        let current = std::env::current_dir().map_err(TafelError::Io)?;
        Self::discover_from(&current)
    }

    /// Same as [`discover`](Self::discover), starting from `start` instead of the
    /// current directory.
    pub fn discover_from(start: &Path) -> Result<Option<Self>> {
        let mut current = start.to_path_buf();

        loop {
            let tafel_toml = current.join("tafel.toml");
            if tafel_toml.exists() {
                return Ok(Some(Self::from_toml_file(tafel_toml)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ReconstructionConfig::default();
        assert_eq!(config.row_epsilon_factor, 0.6);
        assert_eq!(config.column_epsilon_factor, 0.5);
        assert_eq!(config.cache_capacity, 128);
        assert_eq!(config.scoring.total(), 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file_partial_override() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("tafel.toml");
        fs::write(
            &config_path,
            r#"
row_epsilon_factor = 0.8
cache_capacity = 4

[scoring]
fill_ratio = 0.5
"#,
        )
        .unwrap();

        let config = ReconstructionConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(config.row_epsilon_factor, 0.8);
        assert_eq!(config.cache_capacity, 4);
        assert_eq!(config.scoring.fill_ratio, 0.5);
        assert_eq!(config.scoring.row_regularity, 0.3);
        assert_eq!(config.min_column_width, 8.0);
    }

    #[test]
    fn test_from_toml_file_invalid() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("tafel.toml");
        fs::write(&config_path, "row_epsilon_factor = \"wide\"").unwrap();

        let result = ReconstructionConfig::from_toml_file(&config_path);
        assert!(matches!(result, Err(TafelError::Validation { .. })));
    }

    #[test]
    fn test_from_toml_file_missing() {
        let dir = tempdir().unwrap();
        let result = ReconstructionConfig::from_toml_file(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(TafelError::Validation { .. })));
    }

    #[test]
    fn test_discover_from_parent_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("tafel.toml"), "min_column_width = 12.0\n").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let config = ReconstructionConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(config.min_column_width, 12.0);
    }

    #[test]
    fn test_validate_rejects_bad_factor() {
        let config = ReconstructionConfig {
            row_epsilon_factor: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TafelError::Validation { .. })));

        let config = ReconstructionConfig {
            column_epsilon_factor: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_clamp() {
        let config = ReconstructionConfig {
            min_row_epsilon: 10.0,
            max_row_epsilon: 5.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_thresholds_out_of_range() {
        let config = ReconstructionConfig {
            min_confidence: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_weights() {
        let config = ReconstructionConfig {
            scoring: ScoringWeights {
                row_regularity: 0.0,
                fill_ratio: 0.0,
                edge_consistency: 0.0,
                size_gate: 0.0,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = ReconstructionConfig {
            max_workers: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_count_default_positive() {
        assert!(ReconstructionConfig::default().worker_count() >= 1);
        let config = ReconstructionConfig {
            max_workers: Some(3),
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 3);
    }
}
