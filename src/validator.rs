//! Cross-layer physical plausibility checks.
//!
//! The validator only reports. It never changes layer data or stops a run;
//! callers decide what to do with the violations.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NaturalLawThresholds;
use crate::error::LayerName;
use crate::features::FeaturesLayerData;
use crate::geology::GeologyLayerData;
use crate::hydrology::HydrologyLayerData;
use crate::structures::StructuresLayerData;
use crate::topography::TopographyLayerData;
use crate::vegetation::VegetationLayerData;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// The rule a violation breaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Law {
    SlopeBounds,
    FractureBounds,
    StreamOrderBounds,
    ElevationRange,
    RidgeDrainageConflict,
    SoftRockRidge,
    SoilOnHardRock,
    FlowUphill,
    StructureUnderwater,
    BridgeOverDryLand,
    DimensionMismatch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub layer: LayerName,
    pub law: Law,
    pub severity: Severity,
    /// Tile, for per-tile rules
    pub position: Option<(usize, usize)>,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub warnings: usize,
    pub errors: usize,
    pub critical: usize,
}

impl fmt::Display for ValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} warning(s), {} error(s), {} critical",
            self.warnings, self.errors, self.critical
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// False if any ERROR or CRITICAL violation exists
    pub is_valid: bool,
    pub violations: Vec<Violation>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    fn from_violations(violations: Vec<Violation>) -> Self {
        let mut summary = ValidationSummary::default();
        for v in &violations {
            match v.severity {
                Severity::Warning => summary.warnings += 1,
                Severity::Error => summary.errors += 1,
                Severity::Critical => summary.critical += 1,
            }
        }
        Self {
            is_valid: summary.errors == 0 && summary.critical == 0,
            violations,
            summary,
        }
    }

    pub fn count(&self, law: Law) -> usize {
        self.violations.iter().filter(|v| v.law == law).count()
    }

    pub fn worst(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }
}

/// Borrowed view of one run's layers.
#[derive(Clone, Copy)]
pub struct LayerStack<'a> {
    pub geology: &'a GeologyLayerData,
    pub topography: &'a TopographyLayerData,
    pub hydrology: &'a HydrologyLayerData,
    pub vegetation: &'a VegetationLayerData,
    pub structures: &'a StructuresLayerData,
    pub features: &'a FeaturesLayerData,
}

impl LayerStack<'_> {
    fn dimensions(&self) -> [(LayerName, usize, usize); 6] {
        [
            (LayerName::Geology, self.geology.width, self.geology.height),
            (LayerName::Topography, self.topography.width, self.topography.height),
            (LayerName::Hydrology, self.hydrology.width, self.hydrology.height),
            (LayerName::Vegetation, self.vegetation.width, self.vegetation.height),
            (LayerName::Structures, self.structures.width, self.structures.height),
            (LayerName::Features, self.features.width, self.features.height),
        ]
    }
}

#[derive(Clone, Debug, Default)]
pub struct NaturalLawValidator {
    thresholds: NaturalLawThresholds,
}

impl NaturalLawValidator {
    pub fn new(thresholds: NaturalLawThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &NaturalLawThresholds {
        &self.thresholds
    }

    pub fn validate(&self, layers: LayerStack<'_>) -> ValidationReport {
        let mut out = Vec::new();

        // Cross-layer checks index every layer by the same coordinates, so
        // they only run once the grids are known to agree.
        let consistent = self.check_dimensions(&layers, &mut out);
        self.check_geology(layers.geology, &mut out);
        self.check_topography(layers.topography, &mut out);
        self.check_hydrology(layers.hydrology, &mut out);
        if consistent {
            self.check_ridges(layers.geology, layers.topography, &mut out);
            self.check_flow(layers.topography, layers.hydrology, &mut out);
            self.check_structures(layers.hydrology, layers.structures, &mut out);
        }

        let report = ValidationReport::from_violations(out);
        debug!(valid = report.is_valid, summary = %report.summary, "natural law validation");
        report
    }

    fn check_dimensions(&self, layers: &LayerStack<'_>, out: &mut Vec<Violation>) -> bool {
        let dims = layers.dimensions();
        let (_, width, height) = dims[0];
        let mut consistent = true;
        for (layer, w, h) in dims.into_iter().skip(1) {
            if (w, h) != (width, height) {
                consistent = false;
                out.push(Violation {
                    layer: LayerName::Global,
                    law: Law::DimensionMismatch,
                    severity: Severity::Critical,
                    position: None,
                    message: format!("{} is {}x{}, geology is {}x{}", layer, w, h, width, height),
                });
            }
        }
        consistent
    }

    fn check_geology(&self, geology: &GeologyLayerData, out: &mut Vec<Violation>) {
        let t = &self.thresholds;
        for (x, y, tile) in geology.tiles.iter() {
            let fracture = tile.fracture_intensity;
            if !(0.0..=t.max_fracture_intensity).contains(&fracture) {
                out.push(Violation {
                    layer: LayerName::Geology,
                    law: Law::FractureBounds,
                    severity: Severity::Error,
                    position: Some((x, y)),
                    message: format!("fracture intensity {:.3} outside [0, {}]", fracture, t.max_fracture_intensity),
                });
            }
            if tile.hardness() >= t.hard_rock_hardness && tile.soil_depth > t.hard_rock_max_soil_depth {
                out.push(Violation {
                    layer: LayerName::Geology,
                    law: Law::SoilOnHardRock,
                    severity: Severity::Warning,
                    position: Some((x, y)),
                    message: format!(
                        "{:.1} ft of soil over {:?} (hardness {:.1})",
                        tile.soil_depth,
                        tile.formation,
                        tile.hardness()
                    ),
                });
            }
        }
    }

    fn check_topography(&self, topography: &TopographyLayerData, out: &mut Vec<Violation>) {
        let t = &self.thresholds;
        if topography.min_elevation > topography.max_elevation {
            out.push(Violation {
                layer: LayerName::Topography,
                law: Law::ElevationRange,
                severity: Severity::Critical,
                position: None,
                message: format!(
                    "min elevation {:.2} above max elevation {:.2}",
                    topography.min_elevation, topography.max_elevation
                ),
            });
        }
        for (x, y, tile) in topography.tiles.iter() {
            if !(0.0..=t.max_slope).contains(&tile.slope) {
                out.push(Violation {
                    layer: LayerName::Topography,
                    law: Law::SlopeBounds,
                    severity: Severity::Error,
                    position: Some((x, y)),
                    message: format!("slope {:.2} outside [0, {}]", tile.slope, t.max_slope),
                });
            }
            if tile.is_ridge && tile.is_drainage {
                out.push(Violation {
                    layer: LayerName::Topography,
                    law: Law::RidgeDrainageConflict,
                    severity: Severity::Error,
                    position: Some((x, y)),
                    message: "tile is both ridge and drainage".to_string(),
                });
            }
        }
    }

    fn check_hydrology(&self, hydrology: &HydrologyLayerData, out: &mut Vec<Violation>) {
        let max = self.thresholds.max_stream_order;
        for (x, y, tile) in hydrology.tiles.iter() {
            if tile.stream_order > max {
                out.push(Violation {
                    layer: LayerName::Hydrology,
                    law: Law::StreamOrderBounds,
                    severity: Severity::Error,
                    position: Some((x, y)),
                    message: format!("stream order {} above {}", tile.stream_order, max),
                });
            }
        }
    }

    fn check_ridges(&self, geology: &GeologyLayerData, topography: &TopographyLayerData, out: &mut Vec<Violation>) {
        let min = self.thresholds.ridge_min_hardness;
        for (x, y, tile) in topography.tiles.iter() {
            let hardness = geology.tile(x, y).hardness();
            if tile.is_ridge && hardness < min {
                out.push(Violation {
                    layer: LayerName::Topography,
                    law: Law::SoftRockRidge,
                    severity: Severity::Warning,
                    position: Some((x, y)),
                    message: format!("ridge in rock of hardness {:.1}", hardness),
                });
            }
        }
    }

    fn check_flow(&self, topography: &TopographyLayerData, hydrology: &HydrologyLayerData, out: &mut Vec<Violation>) {
        let tolerance = self.thresholds.flow_tolerance;
        for (x, y, tile) in hydrology.tiles.iter() {
            let Some((tx, ty)) = tile.flow_direction.target(x, y, hydrology.width, hydrology.height) else {
                continue;
            };
            let here = topography.elevation(x, y);
            let there = topography.elevation(tx, ty);
            if there > here + tolerance {
                out.push(Violation {
                    layer: LayerName::Hydrology,
                    law: Law::FlowUphill,
                    severity: Severity::Error,
                    position: Some((x, y)),
                    message: format!(
                        "flow {:?} climbs from {:.2} to {:.2} ft",
                        tile.flow_direction, here, there
                    ),
                });
            }
        }
    }

    fn check_structures(
        &self,
        hydrology: &HydrologyLayerData,
        structures: &StructuresLayerData,
        out: &mut Vec<Violation>,
    ) {
        for (x, y, tile) in structures.tiles.iter() {
            let wet = hydrology.is_water(x, y);
            match tile.structure {
                Some(kind) if wet && !tile.is_bridge() => out.push(Violation {
                    layer: LayerName::Structures,
                    law: Law::StructureUnderwater,
                    severity: Severity::Error,
                    position: Some((x, y)),
                    message: format!("{:?} stands in water", kind),
                }),
                Some(_) if tile.is_bridge() && !wet => out.push(Violation {
                    layer: LayerName::Structures,
                    law: Law::BridgeOverDryLand,
                    severity: Severity::Warning,
                    position: Some((x, y)),
                    message: "bridge span over dry ground".to_string(),
                }),
                _ => {}
            }
        }
    }
}
