//! Error types for battlemap generation.
//!
//! Input problems surface as [`ValidationError`] before any layer runs.
//! Failures inside a layer are reported as [`LayerError`] and wrapped with the
//! layer's name into [`GenerationError::LayerGenerationFailed`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::{Biome, ElevationZone, HydrologyType};

/// Largest valid seed value (2^31 - 1).
pub const MAX_SEED: i64 = 2_147_483_647;

/// Rejected input, raised before generation starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Integer seed outside `[1, 2^31 - 1]`.
    #[error("seed {0} is outside the valid range [1, {MAX_SEED}]")]
    SeedOutOfRange(i64),

    /// Seed supplied as a number with a fractional part (or NaN/inf).
    #[error("seed must be an integer, got {0}")]
    SeedNotInteger(f64),

    /// Seed string was empty.
    #[error("seed string must not be empty")]
    EmptySeedString,

    /// Width or height outside the configured limits.
    #[error("map dimensions {width}x{height} are outside [{min}, {max}]")]
    InvalidDimensions {
        width: usize,
        height: usize,
        min: usize,
        max: usize,
    },

    /// Biome and hydrology cannot coexist.
    #[error("biome {biome} cannot have {hydrology} hydrology: {reason}")]
    IncompatibleHydrology {
        biome: Biome,
        hydrology: HydrologyType,
        reason: &'static str,
    },

    /// Biome and elevation zone cannot coexist.
    #[error("biome {biome} cannot occur at {elevation} elevation: {reason}")]
    IncompatibleElevation {
        biome: Biome,
        elevation: ElevationZone,
        reason: &'static str,
    },

    /// A numeric configuration value outside its documented range.
    #[error("config value `{field}` = {value} is outside [{min}, {max}]")]
    ConfigOutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    /// Configured dimension limits are themselves inconsistent.
    #[error("dimension limits min {min} > max {max}")]
    InvalidLimits { min: usize, max: usize },

    /// Unparseable enum token.
    #[error("unknown {kind} `{value}`")]
    UnknownValue { kind: &'static str, value: String },
}

/// The stages of the generation pipeline, used to label failures and violations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerName {
    Geology,
    Topography,
    Hydrology,
    Vegetation,
    Structures,
    Features,
    Converter,
    Global,
}

impl LayerName {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerName::Geology => "geology",
            LayerName::Topography => "topography",
            LayerName::Hydrology => "hydrology",
            LayerName::Vegetation => "vegetation",
            LayerName::Structures => "structures",
            LayerName::Features => "features",
            LayerName::Converter => "converter",
            LayerName::Global => "global",
        }
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure inside a single layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayerError {
    /// An input grid does not have the dimensions of the run.
    #[error("{input} grid is {found_width}x{found_height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        input: LayerName,
        expected_width: usize,
        expected_height: usize,
        found_width: usize,
        found_height: usize,
    },

    /// The formation catalog has nothing for this biome.
    #[error("no rock formations catalogued for biome {0}")]
    EmptyFormationCatalog(Biome),

    /// Any other unexpected condition.
    #[error("{0}")]
    Internal(String),
}

/// Top-level error returned by the pipeline and seed helpers.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Seed layer name not present in the layer table.
    #[error("unknown seed layer `{0}`")]
    UnknownLayer(String),

    /// A layer failed; later layers were not run.
    #[error("{layer} layer generation failed: {source}")]
    LayerGenerationFailed {
        layer: LayerName,
        #[source]
        source: LayerError,
    },

    /// The blocking generation task panicked or was cancelled.
    #[error("generation task aborted: {0}")]
    TaskAborted(String),
}

impl GenerationError {
    /// Wrap a layer failure with the originating layer's name.
    pub fn layer(layer: LayerName) -> impl FnOnce(LayerError) -> GenerationError {
        move |source| GenerationError::LayerGenerationFailed { layer, source }
    }
}

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Errors raised while exporting a generated map.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("image export failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),

    #[error("scale must be at least 1")]
    InvalidScale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_failure_message_names_layer() {
        let err = GenerationError::layer(LayerName::Hydrology)(LayerError::Internal(
            "boom".to_string(),
        ));
        let msg = err.to_string();
        assert!(msg.starts_with("hydrology layer"), "unexpected message: {}", msg);
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_validation_converts_into_generation_error() {
        let err: GenerationError = ValidationError::EmptySeedString.into();
        assert!(matches!(err, GenerationError::Validation(ValidationError::EmptySeedString)));
    }
}
