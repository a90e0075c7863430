//! Reconstruction configuration.

use meshtrace_link::{LinkCostParams, LinkParamsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Link model parameters are out of range.
    #[error("invalid link parameters: {0}")]
    Link(#[from] LinkParamsError),

    /// Ghost quality is not a finite number.
    #[error("ghost_quality_dbm must be finite, got {0}")]
    InvalidGhostQuality(f64),

    /// Ghost quality is better than the reference, which would make ghosts
    /// cheaper than free.
    #[error("ghost_quality_dbm {quality} is above the reference quality {reference}")]
    GhostAboveReference {
        /// Configured ghost quality.
        quality: f64,
        /// Link reference quality.
        reference: f64,
    },

    /// Clustering radius must be positive.
    #[error("clustering radius_km must be positive, got {0}")]
    InvalidClusterRadius(f64),

    /// Clustering needs at least one point per cluster.
    #[error("clustering min_points must be at least 1")]
    ZeroMinPoints,

    /// Localization needs at least one iteration.
    #[error("localization max_iters must be at least 1")]
    ZeroLocalizationIters,

    /// Horizon overshoot weight must be non-negative.
    #[error("localization horizon_weight must be non-negative, got {0}")]
    InvalidHorizonWeight(f64),

    /// Link cost weight must be non-negative.
    #[error("localization link_cost_weight must be non-negative, got {0}")]
    InvalidLinkCostWeight(f64),

    /// At least one decode pass is required.
    #[error("max_iterations must be at least 1")]
    ZeroIterations,
}

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Link quality charged for every transition into or out of a ghost, in
    /// dBm. `None` disables ghost states.
    pub ghost_quality_dbm: Option<f64>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ghost_quality_dbm: Some(-122.0),
        }
    }
}

/// Density clustering of ghost evidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Neighborhood radius in km.
    pub radius_km: f64,
    /// Minimum neighborhood size for a core point, and minimum number of
    /// distinct supporting packets for a cluster to be promoted.
    pub min_points: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            radius_km: 5.0,
            min_points: 3,
        }
    }
}

/// Location refinement for promoted clusters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    /// Nelder-Mead iteration cap.
    pub max_iters: u64,
    /// Residual weight per km a candidate location puts an anchor beyond
    /// the horizon.
    pub horizon_weight: f64,
    /// Km of geometric residual one unit of implied link cost is worth.
    pub link_cost_weight: f64,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            max_iters: 200,
            horizon_weight: 10.0,
            link_cost_weight: 1.0,
        }
    }
}

/// Complete reconstruction configuration.
///
/// Every field has a default, so an empty YAML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Link cost model.
    pub link: LinkCostParams,
    /// Decoder settings.
    pub decoder: DecoderConfig,
    /// Ghost clustering.
    pub clustering: ClusteringConfig,
    /// Cluster location refinement.
    pub localization: LocalizationConfig,
    /// Cap on decode/promote passes.
    pub max_iterations: usize,
    /// Decode worker threads; 0 uses one per core.
    pub workers: usize,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            link: LinkCostParams::default(),
            decoder: DecoderConfig::default(),
            clustering: ClusteringConfig::default(),
            localization: LocalizationConfig::default(),
            max_iterations: 3,
            workers: 0,
        }
    }
}

impl ReconstructionConfig {
    /// Checks the whole configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.link.validate()?;

        if let Some(quality) = self.decoder.ghost_quality_dbm {
            if !quality.is_finite() {
                return Err(ConfigError::InvalidGhostQuality(quality));
            }
            if quality > self.link.reference_quality_dbm {
                return Err(ConfigError::GhostAboveReference {
                    quality,
                    reference: self.link.reference_quality_dbm,
                });
            }
        }

        let radius = self.clustering.radius_km;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ConfigError::InvalidClusterRadius(radius));
        }
        if self.clustering.min_points == 0 {
            return Err(ConfigError::ZeroMinPoints);
        }
        if self.localization.max_iters == 0 {
            return Err(ConfigError::ZeroLocalizationIters);
        }
        let weight = self.localization.horizon_weight;
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(ConfigError::InvalidHorizonWeight(weight));
        }
        let weight = self.localization.link_cost_weight;
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(ConfigError::InvalidLinkCostWeight(weight));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }

    /// Fixed cost of a transition into or out of a ghost, if ghosts are enabled.
    pub fn ghost_cost(&self) -> Option<f64> {
        self.decoder
            .ghost_quality_dbm
            .map(|q| self.link.quality_to_cost(q))
    }
}
