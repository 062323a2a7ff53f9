//! Features layer: hazards, resources and landmarks laid over the finished map.
//!
//! Every feature type has a terrain suitability gate. Required features from
//! the context are placed first at their best suitable tile; the rest are
//! scattered where noise and suitability agree, keeping a minimum spacing.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{normalize_token, Biome, Context, DevelopmentLevel, Season};
use crate::error::{GenerationError, LayerError, LayerName, ValidationError};
use crate::geology::{GeologyLayerData, RockFormation, TerrainFeature};
use crate::hydrology::{HydrologyLayerData, MoistureClass};
use crate::noise_field::NoiseGenerator;
use crate::seeds::{LayeredSeed, SeedLayer};
use crate::structures::StructuresLayerData;
use crate::tilemap::Tilemap;
use crate::topography::TopographyLayerData;
use crate::vegetation::plants::average_dbh;
use crate::vegetation::{Concealment, VegetationLayerData, VegetationType};

/// Minimum Chebyshev distance between two scattered features.
const MIN_SPACING: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    Quicksand,
    Rockfall,
    ThinIce,
    Brambles,
    SinkholeHazard,
    MineralDeposit,
    HerbPatch,
    AncientTree,
    StandingStone,
    Ruins,
    CaveEntrance,
    FungalRing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureCategory {
    Hazard,
    Resource,
    Landmark,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Hidden,
    Noticeable,
    Obvious,
}

impl Visibility {
    fn reduced(self) -> Self {
        match self {
            Visibility::Obvious => Visibility::Noticeable,
            _ => Visibility::Hidden,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interaction {
    Avoid,
    Harvest,
    Inspect,
    Enter,
}

impl FeatureType {
    pub const ALL: [FeatureType; 12] = [
        FeatureType::Quicksand,
        FeatureType::Rockfall,
        FeatureType::ThinIce,
        FeatureType::Brambles,
        FeatureType::SinkholeHazard,
        FeatureType::MineralDeposit,
        FeatureType::HerbPatch,
        FeatureType::AncientTree,
        FeatureType::StandingStone,
        FeatureType::Ruins,
        FeatureType::CaveEntrance,
        FeatureType::FungalRing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Quicksand => "quicksand",
            FeatureType::Rockfall => "rockfall",
            FeatureType::ThinIce => "thin_ice",
            FeatureType::Brambles => "brambles",
            FeatureType::SinkholeHazard => "sinkhole",
            FeatureType::MineralDeposit => "mineral_deposit",
            FeatureType::HerbPatch => "herb_patch",
            FeatureType::AncientTree => "ancient_tree",
            FeatureType::StandingStone => "standing_stone",
            FeatureType::Ruins => "ruins",
            FeatureType::CaveEntrance => "cave_entrance",
            FeatureType::FungalRing => "fungal_ring",
        }
    }

    pub fn category(&self) -> FeatureCategory {
        match self {
            FeatureType::Quicksand
            | FeatureType::Rockfall
            | FeatureType::ThinIce
            | FeatureType::Brambles
            | FeatureType::SinkholeHazard => FeatureCategory::Hazard,
            FeatureType::MineralDeposit | FeatureType::HerbPatch => FeatureCategory::Resource,
            FeatureType::AncientTree
            | FeatureType::StandingStone
            | FeatureType::Ruins
            | FeatureType::CaveEntrance
            | FeatureType::FungalRing => FeatureCategory::Landmark,
        }
    }

    fn base_visibility(&self) -> Visibility {
        match self {
            FeatureType::Quicksand | FeatureType::ThinIce | FeatureType::SinkholeHazard => Visibility::Hidden,
            FeatureType::MineralDeposit | FeatureType::HerbPatch | FeatureType::FungalRing => Visibility::Noticeable,
            FeatureType::Rockfall
            | FeatureType::Brambles
            | FeatureType::AncientTree
            | FeatureType::StandingStone
            | FeatureType::Ruins
            | FeatureType::CaveEntrance => Visibility::Obvious,
        }
    }

    pub fn interaction(&self) -> Interaction {
        match self.category() {
            FeatureCategory::Hazard => Interaction::Avoid,
            FeatureCategory::Resource => Interaction::Harvest,
            FeatureCategory::Landmark if *self == FeatureType::CaveEntrance => Interaction::Enter,
            FeatureCategory::Landmark => Interaction::Inspect,
        }
    }

    /// (noise gate, most instances per 40x40 map) for scattered placement.
    fn rarity(&self) -> (f32, usize) {
        match self {
            FeatureType::Brambles | FeatureType::HerbPatch => (0.45, 4),
            FeatureType::Rockfall | FeatureType::Quicksand | FeatureType::MineralDeposit => (0.55, 3),
            FeatureType::ThinIce | FeatureType::SinkholeHazard | FeatureType::FungalRing => (0.6, 2),
            FeatureType::AncientTree | FeatureType::CaveEntrance | FeatureType::Ruins => (0.65, 1),
            FeatureType::StandingStone => (0.7, 1),
        }
    }

    fn seed_layer(&self) -> SeedLayer {
        match self.category() {
            FeatureCategory::Hazard => SeedLayer::FeaturesHazards,
            FeatureCategory::Resource => SeedLayer::Features,
            FeatureCategory::Landmark => SeedLayer::FeaturesLandmarks,
        }
    }

    /// Position in [`FeatureType::ALL`]; variants are declared in that order.
    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_token(s);
        FeatureType::ALL
            .iter()
            .copied()
            .find(|f| normalize_token(f.as_str()) == wanted)
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "feature type",
                value: s.to_string(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: usize,
    pub feature_type: FeatureType,
    pub x: usize,
    pub y: usize,
    /// Hazards only
    pub severity: Option<Severity>,
    pub visibility: Visibility,
    pub interaction: Interaction,
    pub required: bool,
}

impl Feature {
    pub fn category(&self) -> FeatureCategory {
        self.feature_type.category()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeaturesLayerData {
    pub width: usize,
    pub height: usize,
    /// Index into `features` for occupied tiles
    pub tiles: Tilemap<Option<usize>>,
    pub features: Vec<Feature>,
    /// Required features with no suitable tile on this map
    pub unsatisfied: Vec<FeatureType>,
}

impl FeaturesLayerData {
    pub fn feature_at(&self, x: usize, y: usize) -> Option<&Feature> {
        (*self.tiles.get(x, y)).and_then(|i| self.features.get(i))
    }

    pub fn count(&self, category: FeatureCategory) -> usize {
        self.features.iter().filter(|f| f.category() == category).count()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

/// Read-only view of every layer at one run's dimensions.
struct Stack<'a> {
    geology: &'a GeologyLayerData,
    topography: &'a TopographyLayerData,
    hydrology: &'a HydrologyLayerData,
    vegetation: &'a VegetationLayerData,
    structures: &'a StructuresLayerData,
    ctx: &'a Context,
}

impl Stack<'_> {
    /// Terrain suitability of a tile for a feature, in `[0, 1]`; 0 means never.
    fn suitability(&self, feature: FeatureType, x: usize, y: usize) -> f32 {
        let built = self.structures.tile(x, y);
        if built.has_structure() || built.is_road() {
            return 0.0;
        }

        let geo = self.geology.tile(x, y);
        let topo = self.topography.tile(x, y);
        let hyd = self.hydrology.tile(x, y);
        let veg = self.vegetation.tile(x, y);
        let biome = self.ctx.biome();
        let wet = hyd.is_water();

        // Only ice sits on open water
        if wet != (feature == FeatureType::ThinIce) {
            return 0.0;
        }

        let score = match feature {
            FeatureType::Quicksand => {
                let loose = geo.hardness() < 4.0 && geo.soil_depth >= 1.5;
                let sodden = hyd.moisture_class >= MoistureClass::Wet;
                let ground = matches!(biome, Biome::Desert | Biome::Swamp | Biome::Coastal | Biome::Jungle);
                if loose && sodden && ground && topo.slope < 10.0 {
                    hyd.moisture
                } else {
                    0.0
                }
            }
            FeatureType::Rockfall => {
                let debris = geo.features.iter().any(|f| f.is_loose_debris());
                if topo.slope >= 25.0 && (debris || geo.fracture_intensity >= 0.4) {
                    (topo.slope / 90.0 + geo.fracture_intensity) * 0.5 + if debris { 0.3 } else { 0.0 }
                } else {
                    0.0
                }
            }
            FeatureType::ThinIce => {
                let cold = self.ctx.season() == Season::Winter || biome == Biome::Tundra;
                if cold && !hyd.is_sea {
                    (1.0 - hyd.water_depth / 10.0).clamp(0.2, 1.0)
                } else {
                    0.0
                }
            }
            FeatureType::Brambles => {
                let scrub = matches!(veg.vegetation_type, VegetationType::Shrubland | VegetationType::Woodland);
                if scrub && veg.growth_potential >= 0.3 {
                    veg.growth_potential
                } else {
                    0.0
                }
            }
            FeatureType::SinkholeHazard => {
                let karst = geo.features.iter().any(|f| {
                    matches!(f, TerrainFeature::Sinkhole | TerrainFeature::KarstPavement)
                });
                let soluble = matches!(geo.formation, RockFormation::Limestone | RockFormation::Marble);
                match (karst, soluble) {
                    (true, _) => 0.9,
                    (false, true) if geo.weathering >= 0.5 => geo.weathering * 0.6,
                    _ => 0.0,
                }
            }
            FeatureType::MineralDeposit => {
                let exposed = geo.features.iter().any(|f| {
                    matches!(f, TerrainFeature::Outcrop | TerrainFeature::Ledge | TerrainFeature::Exfoliation)
                });
                if geo.soil_depth < 2.0 && (geo.hardness() >= 6.0 || exposed) {
                    (geo.hardness() / 8.0 + if exposed { 0.2 } else { 0.0 }).min(1.0)
                } else {
                    0.0
                }
            }
            FeatureType::HerbPatch => {
                let damp = matches!(hyd.moisture_class, MoistureClass::Moist | MoistureClass::Wet);
                if damp && veg.tree_count() == 0 && veg.growth_potential >= 0.4 {
                    veg.growth_potential
                } else {
                    0.0
                }
            }
            FeatureType::AncientTree => {
                let girth = veg.trees().map(|t| t.dbh).fold(0.0f32, f32::max);
                if girth > 0.0 {
                    (girth / (2.0 * average_dbh(biome))).min(1.0)
                } else {
                    0.0
                }
            }
            FeatureType::StandingStone => {
                if biome != Biome::Underground && topo.slope <= 15.0 && veg.tree_count() == 0 {
                    0.4 + if topo.is_ridge { 0.4 } else { 0.0 } + if veg.in_clearing { 0.2 } else { 0.0 }
                } else {
                    0.0
                }
            }
            FeatureType::Ruins => {
                if topo.slope <= 15.0 && veg.tree_count() == 0 {
                    match self.ctx.development() {
                        DevelopmentLevel::Wilderness | DevelopmentLevel::Frontier => 0.8,
                        DevelopmentLevel::Rural => 0.5,
                        DevelopmentLevel::Settled | DevelopmentLevel::Urban => 0.2,
                    }
                } else {
                    0.0
                }
            }
            FeatureType::CaveEntrance => {
                let mouth = geo.features.contains(&TerrainFeature::CaveEntrance);
                let cliff = topo.slope >= 30.0 && geo.hardness() >= 3.5;
                if mouth {
                    1.0
                } else if cliff {
                    if biome == Biome::Underground { 0.8 } else { 0.5 }
                } else {
                    0.0
                }
            }
            FeatureType::FungalRing => {
                let fungal_biome = matches!(biome, Biome::Forest | Biome::Swamp | Biome::Jungle | Biome::Underground);
                let shaded = veg.vegetation_type == VegetationType::Fungal || veg.is_forested || veg.in_clearing;
                if fungal_biome && shaded && hyd.moisture_class >= MoistureClass::Moist {
                    0.5 + hyd.moisture * 0.5
                } else {
                    0.0
                }
            }
        };

        score.clamp(0.0, 1.0)
    }

    fn make_feature(&self, id: usize, feature_type: FeatureType, x: usize, y: usize, score: f32, required: bool) -> Feature {
        let severity = (feature_type.category() == FeatureCategory::Hazard).then(|| {
            if score >= 0.75 {
                Severity::Severe
            } else if score >= 0.45 {
                Severity::Moderate
            } else {
                Severity::Minor
            }
        });
        let mut visibility = feature_type.base_visibility();
        if self.vegetation.tile(x, y).concealment == Concealment::Heavy {
            visibility = visibility.reduced();
        }
        Feature {
            id,
            feature_type,
            x,
            y,
            severity,
            visibility,
            interaction: feature_type.interaction(),
            required,
        }
    }
}

fn too_close(placed: &[Feature], x: usize, y: usize) -> bool {
    placed
        .iter()
        .any(|f| f.x.abs_diff(x).max(f.y.abs_diff(y)) < MIN_SPACING)
}

/// Descending by score, row-major on ties.
fn by_score(a: &(usize, usize, f32), b: &(usize, usize, f32)) -> Ordering {
    match b.2.total_cmp(&a.2) {
        Ordering::Equal => (a.1, a.0).cmp(&(b.1, b.0)),
        other => other,
    }
}

/// Feature types worth scattering in a biome.
pub fn biome_pool(biome: Biome) -> &'static [FeatureType] {
    use FeatureType::*;
    match biome {
        Biome::Forest => &[Brambles, HerbPatch, AncientTree, FungalRing, StandingStone, Ruins],
        Biome::Jungle => &[Quicksand, Brambles, HerbPatch, AncientTree, Ruins, FungalRing],
        Biome::Grassland => &[HerbPatch, StandingStone, Ruins, Brambles, SinkholeHazard],
        Biome::Desert => &[Quicksand, Rockfall, MineralDeposit, Ruins, CaveEntrance, SinkholeHazard],
        Biome::Mountain => &[Rockfall, MineralDeposit, CaveEntrance, StandingStone, ThinIce],
        Biome::Tundra => &[ThinIce, Rockfall, StandingStone, MineralDeposit],
        Biome::Swamp => &[Quicksand, HerbPatch, FungalRing, AncientTree, Ruins],
        Biome::Coastal => &[Quicksand, Rockfall, CaveEntrance, Ruins, HerbPatch],
        Biome::Underground => &[Rockfall, SinkholeHazard, MineralDeposit, FungalRing, CaveEntrance],
    }
}

pub fn generate(
    geology: &GeologyLayerData,
    topography: &TopographyLayerData,
    hydrology: &HydrologyLayerData,
    vegetation: &VegetationLayerData,
    structures: &StructuresLayerData,
    ctx: &Context,
    seeds: &LayeredSeed,
) -> Result<FeaturesLayerData, GenerationError> {
    let stack = Stack {
        geology,
        topography,
        hydrology,
        vegetation,
        structures,
        ctx,
    };
    build(&stack, seeds).map_err(GenerationError::layer(LayerName::Features))
}

fn build(stack: &Stack<'_>, seeds: &LayeredSeed) -> Result<FeaturesLayerData, LayerError> {
    let (width, height) = (stack.geology.width, stack.geology.height);
    for (input, w, h) in [
        (LayerName::Topography, stack.topography.width, stack.topography.height),
        (LayerName::Hydrology, stack.hydrology.width, stack.hydrology.height),
        (LayerName::Vegetation, stack.vegetation.width, stack.vegetation.height),
        (LayerName::Structures, stack.structures.width, stack.structures.height),
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

    let mut features: Vec<Feature> = Vec::new();
    let mut unsatisfied = Vec::new();
    let mut occupied = Tilemap::new_with(width, height, false);

    // Required features: best suitable tile, spacing ignored
    for &wanted in stack.ctx.required_features() {
        let layer = wanted.seed_layer();
        let best = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .filter(|&(x, y)| !*occupied.get(x, y))
            .filter_map(|(x, y)| {
                let s = stack.suitability(wanted, x, y);
                (s > 0.0).then(|| (x, y, s + seeds.tile_unit(layer, x, y) * 0.05))
            })
            .min_by(by_score);
        match best {
            Some((x, y, s)) => {
                occupied.set(x, y, true);
                features.push(stack.make_feature(features.len(), wanted, x, y, s.min(1.0), true));
            }
            None => unsatisfied.push(wanted),
        }
    }

    // Scattered features
    let area_scale = (width * height) as f32 / 1600.0;
    let streams = seeds.streams();
    for &feature_type in biome_pool(stack.ctx.biome()) {
        let layer = feature_type.seed_layer();
        let (gate, per_map) = feature_type.rarity();
        let cap = ((per_map as f32 * area_scale).round() as usize).max(1);
        let mut rng = streams.stream(layer, feature_type.as_str());
        let wanted = rng.gen_range(0..=cap);
        if wanted == 0 {
            continue;
        }

        let noise = NoiseGenerator::with_frequency(seeds.layer(layer), 0.15);
        let shift = feature_type.index() as f64 * 97.0;
        let mut candidates: Vec<(usize, usize, f32)> = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let s = stack.suitability(feature_type, x, y);
                if s <= 0.0 {
                    continue;
                }
                let n = noise.generate_at(x as f64 + shift, y as f64 - shift) as f32;
                let v = s * (0.5 + n);
                if v >= gate {
                    candidates.push((x, y, v));
                }
            }
        }
        candidates.sort_by(by_score);

        let mut placed = 0;
        for (x, y, _) in candidates {
            if placed >= wanted {
                break;
            }
            if *occupied.get(x, y) || too_close(&features, x, y) {
                continue;
            }
            occupied.set(x, y, true);
            let score = stack.suitability(feature_type, x, y);
            features.push(stack.make_feature(features.len(), feature_type, x, y, score, false));
            placed += 1;
        }
    }

    let mut tiles = Tilemap::new_with(width, height, None);
    for f in &features {
        tiles.set(f.x, f.y, Some(f.id));
    }

    let data = FeaturesLayerData {
        width,
        height,
        tiles,
        features,
        unsatisfied,
    };

    debug!(
        hazards = data.count(FeatureCategory::Hazard),
        resources = data.count(FeatureCategory::Resource),
        landmarks = data.count(FeatureCategory::Landmark),
        unsatisfied = data.unsatisfied.len(),
        "features generated"
    );

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DimensionLimits, GenerationConfig};
    use crate::context::{ElevationZone, HydrologyType};
    use crate::seeds::Seed;
    use crate::{geology, hydrology, structures, topography, vegetation};

    fn run(ctx: &Context, seed: i64) -> (StructuresLayerData, HydrologyLayerData, FeaturesLayerData) {
        let seeds = LayeredSeed::new(Seed::from_number(seed).unwrap());
        let config = GenerationConfig::default();
        let geo = geology::generate(48, 48, ctx, &seeds, &DimensionLimits::default()).unwrap();
        let topo = topography::generate(&geo, ctx, &seeds, &config.topography).unwrap();
        let hyd = hydrology::generate(&topo, &geo, ctx, &seeds, &config.hydrology).unwrap();
        let veg = vegetation::generate(&hyd, &topo, &geo, ctx, &seeds, &config.vegetation).unwrap();
        let st = structures::generate(&veg, &hyd, &topo, ctx, &seeds).unwrap();
        let features = generate(&geo, &topo, &hyd, &veg, &st, ctx, &seeds).unwrap();
        (st, hyd, features)
    }

    #[test]
    fn test_feature_type_parse() {
        assert_eq!("ANCIENT_TREE".parse::<FeatureType>().unwrap(), FeatureType::AncientTree);
        assert_eq!("thin-ice".parse::<FeatureType>().unwrap(), FeatureType::ThinIce);
        assert!("dragon".parse::<FeatureType>().is_err());
    }

    #[test]
    fn test_categories_and_interactions() {
        assert_eq!(FeatureType::Quicksand.interaction(), Interaction::Avoid);
        assert_eq!(FeatureType::HerbPatch.interaction(), Interaction::Harvest);
        assert_eq!(FeatureType::CaveEntrance.interaction(), Interaction::Enter);
        assert_eq!(FeatureType::Ruins.category(), FeatureCategory::Landmark);
        for (i, f) in FeatureType::ALL.into_iter().enumerate() {
            assert_eq!(f.index(), i);
        }
    }

    #[test]
    fn test_features_avoid_structures_and_water() {
        let ctx = Context::new(
            Biome::Forest,
            ElevationZone::Lowland,
            HydrologyType::Stream,
            DevelopmentLevel::Rural,
            Season::Summer,
        )
        .unwrap();
        let (st, hyd, features) = run(&ctx, 31);
        for f in &features.features {
            assert!(!st.tile(f.x, f.y).has_structure());
            assert!(!st.tile(f.x, f.y).is_road());
            if f.feature_type != FeatureType::ThinIce {
                assert!(!hyd.is_water(f.x, f.y), "{:?} placed in water", f.feature_type);
            }
            assert_eq!(features.feature_at(f.x, f.y).map(|g| g.id), Some(f.id));
            assert_eq!(f.severity.is_some(), f.category() == FeatureCategory::Hazard);
        }
    }

    #[test]
    fn test_required_feature_placed_or_reported() {
        let ctx = Context::with_required_features(
            Biome::Grassland,
            ElevationZone::Lowland,
            HydrologyType::Stream,
            DevelopmentLevel::Wilderness,
            Season::Summer,
            vec![FeatureType::Ruins, FeatureType::ThinIce],
        )
        .unwrap();
        let (_, _, features) = run(&ctx, 8);
        // Open summer grassland: ruins always fit, ice never does
        assert!(features.features.iter().any(|f| f.required && f.feature_type == FeatureType::Ruins));
        assert_eq!(features.unsatisfied, vec![FeatureType::ThinIce]);
    }

    #[test]
    fn test_features_deterministic() {
        let ctx = Context::new(
            Biome::Mountain,
            ElevationZone::Highland,
            HydrologyType::Stream,
            DevelopmentLevel::Frontier,
            Season::Winter,
        )
        .unwrap();
        let (_, _, a) = run(&ctx, 77);
        let (_, _, b) = run(&ctx, 77);
        assert_eq!(a, b);
    }
}
