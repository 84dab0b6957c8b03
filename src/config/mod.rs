//! Engine Configuration Module
//!
//! Tunable alignment and feature-extraction parameters loaded from TOML,
//! replacing hardcoded constants with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `PIPETRACK_CONFIG` environment variable (path to TOML file)
//! 2. `pipetrack.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Unlike a process-global config, the resulting [`EngineConfig`] is an
//! explicit value handed to [`crate::engine::TrackingEngine`] — reruns of
//! the engine share no process-wide state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Feature weights change alignment results; bump this when they do.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("config parse error ({0}): {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub alignment: AlignmentConfig,
    pub features: FeatureWeights,
}

/// Banded DTW parameters: band half-width and acceptance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Sakoe-Chiba band half-width in index positions.
    pub window: usize,
    /// Maximum Euclidean distance (weighted feature space) for a path pair
    /// to be accepted as a match.
    pub distance_threshold: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            window: 500,
            distance_threshold: 2.0,
        }
    }
}

/// Weights for the 4-dimensional alignment feature vector.
///
/// Ordered by decreasing physical stability across surveys: joint length
/// rarely changes, relative position disambiguates within a joint, the
/// angle pair disambiguates circumferentially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    pub j_len: f64,
    pub relative_position: f64,
    pub angle_sin: f64,
    pub angle_cos: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            j_len: 2.0,
            relative_position: 1.0,
            angle_sin: 0.5,
            angle_cos: 0.5,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alignment: AlignmentConfig::default(),
            features: FeatureWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration using the standard search order.
    ///
    /// A path named by `PIPETRACK_CONFIG` is explicit operator intent, so
    /// any failure loading it is fatal. A `pipetrack.toml` that merely
    /// sits in the working directory degrades to a warning plus built-in
    /// defaults, matching how a missing file behaves.
    pub fn load() -> Result<Self, ConfigError> {
        let override_path = std::env::var("PIPETRACK_CONFIG").ok().map(PathBuf::from);
        Self::load_with_override(override_path.as_deref())
    }

    /// Search-order loading with the env override made explicit for tests.
    pub fn load_with_override(override_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = override_path {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded engine config from PIPETRACK_CONFIG");
            return Ok(config);
        }

        let local = PathBuf::from("pipetrack.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./pipetrack.toml");
                    return Ok(config);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./pipetrack.toml, using defaults");
                }
            }
        }

        info!("No pipetrack.toml found — using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every tunable, accumulating all violations before
    /// failing so the operator sees the full list at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.alignment.window == 0 {
            errors.push("alignment.window must be >= 1".to_string());
        }
        if self.alignment.distance_threshold <= 0.0 {
            errors.push(format!(
                "alignment.distance_threshold must be > 0 (got {})",
                self.alignment.distance_threshold
            ));
        }
        for (name, w) in [
            ("features.j_len", self.features.j_len),
            ("features.relative_position", self.features.relative_position),
            ("features.angle_sin", self.features.angle_sin),
            ("features.angle_cos", self.features.angle_cos),
        ] {
            if !w.is_finite() || w < 0.0 {
                errors.push(format!("{name} must be a finite non-negative weight (got {w})"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}
