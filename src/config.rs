//! Generation configuration.
//!
//! Every section has a serde default, so a config file only needs to mention
//! the values it changes:
//!
//! ```json
//! { "vegetation": { "density": 1.5 }, "topography": { "ruggedness": 0.8 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};

/// Accepted range for map width and height, in tiles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionLimits {
    pub min: usize,
    pub max: usize,
}

impl Default for DimensionLimits {
    fn default() -> Self {
        Self { min: 10, max: 200 }
    }
}

impl DimensionLimits {
    /// Fail fast if either dimension is outside the limits.
    pub fn check(&self, width: usize, height: usize) -> Result<(), ValidationError> {
        let ok = |d: usize| d >= self.min && d <= self.max;
        if ok(width) && ok(height) {
            Ok(())
        } else {
            Err(ValidationError::InvalidDimensions {
                width,
                height,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Terrain shape controls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopographyConfig {
    /// 0.0 = gentle, 0.5 = default, 1.0 = broken terrain
    pub ruggedness: f32,
    /// Multiplier on the elevation zone's relief
    pub variance: f32,
}

impl Default for TopographyConfig {
    fn default() -> Self {
        Self {
            ruggedness: 0.5,
            variance: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrologyConfig {
    /// Water abundance multiplier; 0 dries out streams and springs
    pub abundance: f32,
}

impl Default for HydrologyConfig {
    fn default() -> Self {
        Self { abundance: 1.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    /// Scales target basal area per acre; 0 yields no trees
    pub density: f32,
    /// Whether forested tiles without trunks receive understory plants
    pub understory: bool,
    /// Cellular automaton relaxation passes applied to the forest mask
    pub automaton_passes: usize,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            density: 1.0,
            understory: true,
            automaton_passes: 4,
        }
    }
}

/// Heuristic thresholds used by the natural-law validator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaturalLawThresholds {
    /// Ridges in rock softer than this are reported as warnings
    pub ridge_min_hardness: f32,
    /// Rock at or above this hardness is "hard rock" for soil checks
    pub hard_rock_hardness: f32,
    /// Maximum plausible soil depth (ft) over hard rock
    pub hard_rock_max_soil_depth: f32,
    /// Allowed uphill step (ft) along a flow direction
    pub flow_tolerance: f32,
    pub max_stream_order: u8,
    pub max_slope: f32,
    pub max_fracture_intensity: f32,
}

impl Default for NaturalLawThresholds {
    fn default() -> Self {
        Self {
            ridge_min_hardness: 3.0,
            hard_rock_hardness: 7.0,
            hard_rock_max_soil_depth: 2.0,
            flow_tolerance: 0.1,
            max_stream_order: 10,
            max_slope: 90.0,
            max_fracture_intensity: 1.0,
        }
    }
}

/// Complete configuration for one generation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub limits: DimensionLimits,
    pub topography: TopographyConfig,
    pub hydrology: HydrologyConfig,
    pub vegetation: VegetationConfig,
    pub validator: NaturalLawThresholds,
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ValidationError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::ConfigOutOfRange { field, value, min, max })
    }
}

impl TopographyConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("topography.ruggedness", self.ruggedness, 0.0, 1.0)?;
        check_range("topography.variance", self.variance, 0.25, 3.0)
    }
}

impl HydrologyConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("hydrology.abundance", self.abundance, 0.0, 3.0)
    }
}

impl VegetationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("vegetation.density", self.density, 0.0, 3.0)?;
        check_range("vegetation.automaton_passes", self.automaton_passes as f32, 0.0, 10.0)
    }
}

impl NaturalLawThresholds {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("validator.flow_tolerance", self.flow_tolerance, 0.0, 10.0)?;
        check_range("validator.max_slope", self.max_slope, 0.0, 90.0)
    }
}

impl GenerationConfig {
    /// Check every numeric field against its documented range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limits.min == 0 || self.limits.min > self.limits.max {
            return Err(ValidationError::InvalidLimits {
                min: self.limits.min,
                max: self.limits.max,
            });
        }
        self.topography.validate()?;
        self.hydrology.validate()?;
        self.vegetation.validate()?;
        self.validator.validate()
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        assert!(GenerationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GenerationConfig::from_json_str(r#"{"vegetation": {"density": 1.5}}"#).unwrap();
        assert_eq!(config.vegetation.density, 1.5);
        assert!(config.vegetation.understory);
        assert_eq!(config.limits, DimensionLimits::default());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = GenerationConfig::from_json_str(r#"{"topography": {"ruggedness": 1.5}}"#);
        assert!(matches!(
            err,
            Err(ConfigError::Invalid(ValidationError::ConfigOutOfRange { field: "topography.ruggedness", .. }))
        ));
    }

    #[test]
    fn test_dimension_limits() {
        let limits = DimensionLimits::default();
        assert!(limits.check(10, 200).is_ok());
        assert!(limits.check(9, 50).is_err());
        assert!(limits.check(50, 201).is_err());
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        assert!(matches!(GenerationConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
    }
}
