//! Structures layer: buildings, roads, bridges and decorations.
//!
//! 1. Score candidate sites (dry, flat, treeless) best first
//! 2. Place a development-dependent number of buildings with spacing
//! 3. Join building approaches with a greedy spanning tree of roads
//! 4. Bridge every dry-wet-dry road crossing
//! 5. Scatter wells, shrines and signposts
//!
//! Wilderness maps never receive structures or roads.

pub mod buildings;
pub mod decorations;
pub mod roads;
pub mod sites;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{Context, DevelopmentLevel};
use crate::error::{GenerationError, LayerError, LayerName};
use crate::hydrology::HydrologyLayerData;
use crate::noise_field::NoiseGenerator;
use crate::seeds::{LayeredSeed, SeedLayer};
use crate::tilemap::Tilemap;
use crate::topography::TopographyLayerData;
use crate::vegetation::VegetationLayerData;

pub use buildings::{Building, BuildingType, Condition, Material};
pub use decorations::{Decoration, DecorationKind};
pub use roads::{Bridge, BridgeMaterial, RoadClass, RoadSegment};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    Wall,
    Floor,
    Door,
    Bridge,
    Well,
    Shrine,
    Signpost,
}

impl StructureKind {
    /// Structures that carry traffic rather than obstruct it.
    pub fn is_road_structure(&self) -> bool {
        matches!(self, StructureKind::Bridge)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureTile {
    pub structure: Option<StructureKind>,
    pub building_id: Option<usize>,
    pub building_type: Option<BuildingType>,
    pub material: Option<Material>,
    pub condition: Option<Condition>,
    pub road: Option<RoadClass>,
}

impl StructureTile {
    pub fn has_structure(&self) -> bool {
        self.structure.is_some()
    }

    pub fn is_road(&self) -> bool {
        self.road.is_some()
    }

    pub fn is_path(&self) -> bool {
        self.road == Some(RoadClass::Path)
    }

    pub fn is_bridge(&self) -> bool {
        self.structure == Some(StructureKind::Bridge)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuresLayerData {
    pub width: usize,
    pub height: usize,
    pub tiles: Tilemap<StructureTile>,
    pub buildings: Vec<Building>,
    pub roads: Vec<RoadSegment>,
    pub bridges: Vec<Bridge>,
    pub decorations: Vec<Decoration>,
}

impl StructuresLayerData {
    fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tiles: Tilemap::new(width, height),
            buildings: Vec::new(),
            roads: Vec::new(),
            bridges: Vec::new(),
            decorations: Vec::new(),
        }
    }

    pub fn tile(&self, x: usize, y: usize) -> &StructureTile {
        self.tiles.get(x, y)
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// Distinct tiles carrying a road.
    pub fn road_length(&self) -> usize {
        self.tiles.iter().filter(|(_, _, t)| t.is_road()).count()
    }
}

pub fn generate(
    vegetation: &VegetationLayerData,
    hydrology: &HydrologyLayerData,
    topography: &TopographyLayerData,
    ctx: &Context,
    seeds: &LayeredSeed,
) -> Result<StructuresLayerData, GenerationError> {
    build(vegetation, hydrology, topography, ctx, seeds).map_err(GenerationError::layer(LayerName::Structures))
}

fn build(
    vegetation: &VegetationLayerData,
    hydrology: &HydrologyLayerData,
    topography: &TopographyLayerData,
    ctx: &Context,
    seeds: &LayeredSeed,
) -> Result<StructuresLayerData, LayerError> {
    let (width, height) = (topography.width, topography.height);
    for (input, w, h) in [
        (LayerName::Vegetation, vegetation.width, vegetation.height),
        (LayerName::Hydrology, hydrology.width, hydrology.height),
    ] {
        if (w, h) != (width, height) {
            return Err(LayerError::DimensionMismatch {
                input,
                expected_width: width,
                expected_height: height,
                found_width: w,
                found_height: h,
            });
        }
    }

    let level = ctx.development();
    if level == DevelopmentLevel::Wilderness {
        debug!("wilderness: no structures");
        return Ok(StructuresLayerData::empty(width, height));
    }

    let streams = seeds.streams();
    let mut building_rng = streams.stream(SeedLayer::StructuresBuildings, "placement");

    let sites = sites::score_sites(vegetation, hydrology, topography, seeds);
    let count = buildings::building_count(level, width, height, &mut building_rng);
    let placed = buildings::place_buildings(
        &sites,
        count,
        level,
        ctx.biome(),
        (width, height),
        |x, y| sites::is_buildable(x, y, vegetation, hydrology, topography),
        &mut building_rng,
    );

    let mut tiles: Tilemap<StructureTile> = Tilemap::new(width, height);
    for building in &placed {
        for (x, y) in building.tiles() {
            let kind = if (x, y) == building.entrance {
                StructureKind::Door
            } else if building.is_perimeter(x, y) {
                StructureKind::Wall
            } else {
                StructureKind::Floor
            };
            tiles.set(
                x,
                y,
                StructureTile {
                    structure: Some(kind),
                    building_id: Some(building.id),
                    building_type: Some(building.building_type),
                    material: Some(building.material),
                    condition: Some(building.condition),
                    road: None,
                },
            );
        }
    }

    // Roads
    let wet = hydrology.tiles.map(|_, _, t| t.is_water());
    let footprints = tiles.map(|_, _, t| t.has_structure());
    let class = RoadClass::for_level(level);
    let approaches: Vec<(usize, usize)> = placed.iter().map(|b| b.approach).collect();
    let segments = roads::connect(&approaches, class, &wet, &footprints);
    for segment in &segments {
        for &(x, y) in &segment.tiles {
            let tile = tiles.get_mut(x, y);
            // Footprints take priority over roads
            if !tile.has_structure() {
                tile.road = Some(class);
            }
        }
    }

    let bridge_noise = NoiseGenerator::new(seeds.layer(SeedLayer::StructuresRoads));
    let bridges = roads::find_bridges(&segments, &wet, &bridge_noise);
    for bridge in &bridges {
        for &(x, y) in &bridge.tiles {
            let tile = tiles.get_mut(x, y);
            if tile.building_id.is_none() {
                tile.structure = Some(StructureKind::Bridge);
                tile.road = Some(class);
            }
        }
    }

    // Decorations
    let mut free = Tilemap::from_fn(width, height, |x, y| {
        let t = tiles.get(x, y);
        !t.has_structure()
            && !t.is_road()
            && !*wet.get(x, y)
            && vegetation.tile(x, y).tree_count() == 0
            && topography.tile(x, y).slope <= sites::MAX_BUILD_SLOPE
    });
    let mut deco_rng = streams.stream(SeedLayer::StructuresDecorations, "decorations");
    let well_chance = if level >= DevelopmentLevel::Settled { 0.4 } else { 0.3 };

    let mut decorations = decorations::place_wells(&placed, well_chance, &mut free, &mut deco_rng);
    decorations.extend(decorations::place_shrines(&vegetation.clearings, &mut free, &mut deco_rng));
    let road_mask = tiles.map(|_, _, t| t.is_road());
    decorations.extend(decorations::place_signposts(&segments, &road_mask, &mut free));

    for d in &decorations {
        let kind = match d.kind {
            DecorationKind::Well => StructureKind::Well,
            DecorationKind::Shrine => StructureKind::Shrine,
            DecorationKind::Signpost => StructureKind::Signpost,
        };
        tiles.get_mut(d.x, d.y).structure = Some(kind);
    }

    let data = StructuresLayerData {
        width,
        height,
        tiles,
        buildings: placed,
        roads: segments,
        bridges,
        decorations,
    };

    debug!(
        buildings = data.building_count(),
        road_tiles = data.road_length(),
        bridges = data.bridges.len(),
        decorations = data.decorations.len(),
        "structures generated"
    );

    Ok(data)
}
