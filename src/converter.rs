//! Flattens the layer stack into one tactical tile grid.

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, LayerError, LayerName};
use crate::hydrology::HydrologyLayerData;
use crate::structures::{StructureKind, StructuresLayerData};
use crate::tilemap::Tilemap;
use crate::topography::TopographyLayerData;
use crate::vegetation::{Passability, VegetationLayerData};

/// Slope (degrees) above which open ground reads as mountain.
pub const MOUNTAIN_SLOPE: f32 = 30.0;

const HEIGHT_MIN: f32 = 0.5;
const HEIGHT_SPAN: f32 = 1.5;
const MOUNTAIN_BONUS: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainType {
    Wall,
    Building,
    Road,
    Water,
    Forest,
    Mountain,
    #[default]
    Grass,
}

impl TerrainType {
    pub const ALL: [TerrainType; 7] = [
        TerrainType::Wall,
        TerrainType::Building,
        TerrainType::Road,
        TerrainType::Water,
        TerrainType::Forest,
        TerrainType::Mountain,
        TerrainType::Grass,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TerrainType::Wall => "wall",
            TerrainType::Building => "building",
            TerrainType::Road => "road",
            TerrainType::Water => "water",
            TerrainType::Forest => "forest",
            TerrainType::Mountain => "mountain",
            TerrainType::Grass => "grass",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: usize,
    pub y: usize,
    pub terrain: TerrainType,
    pub height_multiplier: f32,
    pub blocked: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TacticalMap {
    pub width: usize,
    pub height: usize,
    pub tiles: Tilemap<Tile>,
}

impl TacticalMap {
    pub fn tile(&self, x: usize, y: usize) -> &Tile {
        self.tiles.get(x, y)
    }

    pub fn count(&self, terrain: TerrainType) -> usize {
        self.tiles.iter().filter(|(_, _, t)| t.terrain == terrain).count()
    }

    pub fn blocked_count(&self) -> usize {
        self.tiles.iter().filter(|(_, _, t)| t.blocked).count()
    }
}

/// Terrain for a structure tile; `None` lets lower layers decide.
fn structure_terrain(kind: Option<StructureKind>, road: bool) -> Option<TerrainType> {
    match kind {
        Some(StructureKind::Wall) => Some(TerrainType::Wall),
        Some(StructureKind::Bridge) => Some(TerrainType::Road),
        Some(
            StructureKind::Floor
            | StructureKind::Door
            | StructureKind::Well
            | StructureKind::Shrine
            | StructureKind::Signpost,
        ) => Some(TerrainType::Building),
        None if road => Some(TerrainType::Road),
        None => None,
    }
}

/// Linear map of elevation into the height band, plus a bonus on mountains.
///
/// A perfectly flat map sits at the middle of the band.
pub fn height_multiplier(elevation: f32, min: f32, max: f32, terrain: TerrainType) -> f32 {
    let range = max - min;
    let t = if range > f32::EPSILON {
        ((elevation - min) / range).clamp(0.0, 1.0)
    } else {
        0.5
    };
    let bonus = if terrain == TerrainType::Mountain { MOUNTAIN_BONUS } else { 0.0 };
    HEIGHT_MIN + t * HEIGHT_SPAN + bonus
}

/// Collapse the layers into tactical tiles.
///
/// Priority per tile: structure, then water, then forest, then steep ground,
/// then grass.
pub fn convert(
    topography: &TopographyLayerData,
    hydrology: &HydrologyLayerData,
    vegetation: &VegetationLayerData,
    structures: &StructuresLayerData,
) -> Result<TacticalMap, GenerationError> {
    let (width, height) = (topography.width, topography.height);
    for (input, w, h) in [
        (LayerName::Hydrology, hydrology.width, hydrology.height),
        (LayerName::Vegetation, vegetation.width, vegetation.height),
        (LayerName::Structures, structures.width, structures.height),
    ] {
        if (w, h) != (width, height) {
            return Err(GenerationError::layer(LayerName::Converter)(LayerError::DimensionMismatch {
                input,
                expected_width: width,
                expected_height: height,
                found_width: w,
                found_height: h,
            }));
        }
    }

    let (min, max) = (topography.min_elevation, topography.max_elevation);
    let tiles = Tilemap::from_fn(width, height, |x, y| {
        let built = structures.tile(x, y);
        let veg = vegetation.tile(x, y);
        let topo = topography.tile(x, y);

        let terrain = structure_terrain(built.structure, built.is_road()).unwrap_or_else(|| {
            if hydrology.is_water(x, y) {
                TerrainType::Water
            } else if veg.vegetation_type.is_forest() {
                TerrainType::Forest
            } else if topo.slope > MOUNTAIN_SLOPE {
                TerrainType::Mountain
            } else {
                TerrainType::Grass
            }
        });

        let obstructed = built.structure.is_some_and(|s| !s.is_road_structure());
        Tile {
            x,
            y,
            terrain,
            height_multiplier: height_multiplier(topo.elevation, min, max, terrain),
            blocked: obstructed || veg.passability == Passability::Impassable,
        }
    });

    Ok(TacticalMap { width, height, tiles })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DimensionLimits, GenerationConfig};
    use crate::context::{Biome, Context, DevelopmentLevel, ElevationZone, HydrologyType, Season};
    use crate::seeds::{LayeredSeed, Seed};
    use crate::{geology, hydrology, structures, topography, vegetation};

    #[test]
    fn test_height_multiplier_band() {
        assert!((height_multiplier(0.0, 0.0, 100.0, TerrainType::Grass) - 0.5).abs() < 1e-6);
        assert!((height_multiplier(100.0, 0.0, 100.0, TerrainType::Grass) - 2.0).abs() < 1e-6);
        assert!((height_multiplier(100.0, 0.0, 100.0, TerrainType::Mountain) - 2.5).abs() < 1e-6);
        assert!((height_multiplier(7.0, 7.0, 7.0, TerrainType::Grass) - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_structure_priority() {
        assert_eq!(structure_terrain(Some(StructureKind::Wall), false), Some(TerrainType::Wall));
        assert_eq!(structure_terrain(Some(StructureKind::Door), false), Some(TerrainType::Building));
        assert_eq!(structure_terrain(Some(StructureKind::Bridge), true), Some(TerrainType::Road));
        assert_eq!(structure_terrain(None, true), Some(TerrainType::Road));
        assert_eq!(structure_terrain(None, false), None);
    }

    #[test]
    fn test_convert_matches_layers() {
        let ctx = Context::new(
            Biome::Forest,
            ElevationZone::Foothills,
            HydrologyType::River,
            DevelopmentLevel::Settled,
            Season::Summer,
        )
        .unwrap();
        let seeds = LayeredSeed::new(Seed::from_number(4242).unwrap());
        let config = GenerationConfig::default();
        let geo = geology::generate(50, 40, &ctx, &seeds, &DimensionLimits::default()).unwrap();
        let topo = topography::generate(&geo, &ctx, &seeds, &config.topography).unwrap();
        let hyd = hydrology::generate(&topo, &geo, &ctx, &seeds, &config.hydrology).unwrap();
        let veg = vegetation::generate(&hyd, &topo, &geo, &ctx, &seeds, &config.vegetation).unwrap();
        let st = structures::generate(&veg, &hyd, &topo, &ctx, &seeds).unwrap();

        let map = convert(&topo, &hyd, &veg, &st).unwrap();
        assert_eq!((map.width, map.height), (50, 40));
        for (x, y, tile) in map.tiles.iter() {
            assert_eq!((tile.x, tile.y), (x, y));
            assert!(tile.height_multiplier >= 0.5 && tile.height_multiplier <= 2.5);
            if st.tile(x, y).structure == Some(StructureKind::Wall) {
                assert_eq!(tile.terrain, TerrainType::Wall);
                assert!(tile.blocked);
            }
            if !st.tile(x, y).has_structure() && !st.tile(x, y).is_road() && hyd.is_water(x, y) {
                assert_eq!(tile.terrain, TerrainType::Water);
            }
            if tile.terrain == TerrainType::Road {
                assert!(!tile.blocked || veg.tile(x, y).passability == Passability::Impassable);
            }
        }
        let total: usize = TerrainType::ALL.iter().map(|t| map.count(*t)).sum();
        assert_eq!(total, 50 * 40);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let ctx = Context::new(
            Biome::Grassland,
            ElevationZone::Lowland,
            HydrologyType::Stream,
            DevelopmentLevel::Wilderness,
            Season::Spring,
        )
        .unwrap();
        let seeds = LayeredSeed::new(Seed::from_number(5).unwrap());
        let config = GenerationConfig::default();
        let geo = geology::generate(20, 20, &ctx, &seeds, &DimensionLimits::default()).unwrap();
        let topo = topography::generate(&geo, &ctx, &seeds, &config.topography).unwrap();
        let hyd = hydrology::generate(&topo, &geo, &ctx, &seeds, &config.hydrology).unwrap();
        let veg = vegetation::generate(&hyd, &topo, &geo, &ctx, &seeds, &config.vegetation).unwrap();
        let mut st = structures::generate(&veg, &hyd, &topo, &ctx, &seeds).unwrap();
        st.width = 21;

        let err = convert(&topo, &hyd, &veg, &st).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::LayerGenerationFailed {
                layer: LayerName::Converter,
                ..
            }
        ));
    }
}
