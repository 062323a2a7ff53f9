//! Geology layer: bedrock, weathering and soil.
//!
//! Picks a primary (and optional secondary) rock formation for the biome,
//! paints them across the map with noise, runs a weathering pass that decides
//! which micro-features each formation may expose, and derives soil depth from
//! weathering intensity and rock hardness.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DimensionLimits;
use crate::context::{Biome, Context};
use crate::error::{GenerationError, LayerError, LayerName};
use crate::noise_field::NoiseGenerator;
use crate::seeds::{LayeredSeed, SeedLayer};
use crate::tilemap::{Tilemap, NEIGHBORS_4};

/// Rock formations in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RockFormation {
    Granite,
    Basalt,
    Gneiss,
    Quartzite,
    Marble,
    Slate,
    Limestone,
    Sandstone,
    Shale,
    /// Unconsolidated river and flood deposits
    Alluvium,
}

/// Small-scale landforms produced by weathering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainFeature {
    Tor,
    Dome,
    Exfoliation,
    Boulders,
    Outcrop,
    Ledge,
    BasaltColumns,
    CrackedPavement,
    Talus,
    Scree,
    Sinkhole,
    KarstPavement,
    CaveEntrance,
    Hoodoo,
    Arch,
    Gully,
    Mudflat,
    SandBar,
}

impl TerrainFeature {
    /// Landforms that take a large volume of rock to express.
    pub fn is_large_scale(&self) -> bool {
        matches!(
            self,
            TerrainFeature::Tor
                | TerrainFeature::Dome
                | TerrainFeature::Arch
                | TerrainFeature::Hoodoo
                | TerrainFeature::CaveEntrance
                | TerrainFeature::Sinkhole
                | TerrainFeature::BasaltColumns
        )
    }

    /// Landforms that need fast erosion or mass wasting.
    pub fn is_rapid(&self) -> bool {
        matches!(
            self,
            TerrainFeature::Gully
                | TerrainFeature::Sinkhole
                | TerrainFeature::Talus
                | TerrainFeature::Scree
                | TerrainFeature::Mudflat
        )
    }

    /// Loose rock on the surface.
    pub fn is_loose_debris(&self) -> bool {
        matches!(self, TerrainFeature::Talus | TerrainFeature::Scree | TerrainFeature::Boulders)
    }
}

/// Weathering intensity band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatheringBand {
    High,
    Medium,
    Low,
    /// Net deposition rather than removal
    Negative,
}

impl WeatheringBand {
    pub fn from_intensity(intensity: f32) -> Self {
        if intensity >= 0.7 {
            WeatheringBand::High
        } else if intensity >= 0.5 {
            WeatheringBand::Medium
        } else if intensity >= 0.3 {
            WeatheringBand::Low
        } else {
            WeatheringBand::Negative
        }
    }

    /// Chance per tile that a feature is attempted in this band.
    fn feature_chance(&self) -> f32 {
        match self {
            WeatheringBand::High => 0.12,
            WeatheringBand::Medium => 0.08,
            WeatheringBand::Low => 0.04,
            WeatheringBand::Negative => 0.05,
        }
    }
}

/// Which features a formation exposes in each weathering band.
#[derive(Clone, Copy, Debug)]
pub struct WeatheringProfile {
    pub high: &'static [TerrainFeature],
    pub medium: &'static [TerrainFeature],
    pub low: &'static [TerrainFeature],
    pub negative: &'static [TerrainFeature],
}

impl WeatheringProfile {
    pub fn features(&self, band: WeatheringBand) -> &'static [TerrainFeature] {
        match band {
            WeatheringBand::High => self.high,
            WeatheringBand::Medium => self.medium,
            WeatheringBand::Low => self.low,
            WeatheringBand::Negative => self.negative,
        }
    }
}

impl RockFormation {
    pub const ALL: [RockFormation; 10] = [
        RockFormation::Granite,
        RockFormation::Basalt,
        RockFormation::Gneiss,
        RockFormation::Quartzite,
        RockFormation::Marble,
        RockFormation::Slate,
        RockFormation::Limestone,
        RockFormation::Sandstone,
        RockFormation::Shale,
        RockFormation::Alluvium,
    ];

    /// Hardness on a 1-10 scale.
    pub fn hardness(&self) -> f32 {
        match self {
            RockFormation::Granite => 7.0,
            RockFormation::Basalt => 6.5,
            RockFormation::Gneiss => 7.0,
            RockFormation::Quartzite => 8.0,
            RockFormation::Marble => 4.0,
            RockFormation::Slate => 5.0,
            RockFormation::Limestone => 3.5,
            RockFormation::Sandstone => 4.5,
            RockFormation::Shale => 2.5,
            RockFormation::Alluvium => 1.0,
        }
    }

    /// Base permeability (0-1) before fracturing.
    pub fn permeability(&self) -> f32 {
        match self {
            RockFormation::Granite => 0.15,
            RockFormation::Basalt => 0.45,
            RockFormation::Gneiss => 0.1,
            RockFormation::Quartzite => 0.05,
            RockFormation::Marble => 0.3,
            RockFormation::Slate => 0.05,
            RockFormation::Limestone => 0.6,
            RockFormation::Sandstone => 0.7,
            RockFormation::Shale => 0.1,
            RockFormation::Alluvium => 0.8,
        }
    }

    /// Typical jointing/fracture intensity (0-1).
    pub fn base_fracture(&self) -> f32 {
        match self {
            RockFormation::Granite => 0.35,
            RockFormation::Basalt => 0.55,
            RockFormation::Gneiss => 0.3,
            RockFormation::Quartzite => 0.45,
            RockFormation::Marble => 0.3,
            RockFormation::Slate => 0.5,
            RockFormation::Limestone => 0.45,
            RockFormation::Sandstone => 0.3,
            RockFormation::Shale => 0.4,
            RockFormation::Alluvium => 0.05,
        }
    }

    pub fn weathering_profile(&self) -> WeatheringProfile {
        use TerrainFeature::*;
        match self {
            RockFormation::Granite => WeatheringProfile {
                high: &[Tor, Dome, Exfoliation],
                medium: &[Boulders, Outcrop],
                low: &[Outcrop],
                negative: &[Talus],
            },
            RockFormation::Basalt => WeatheringProfile {
                high: &[BasaltColumns, Ledge],
                medium: &[Boulders, Ledge],
                low: &[CrackedPavement],
                negative: &[Scree],
            },
            RockFormation::Gneiss => WeatheringProfile {
                high: &[Tor, Outcrop],
                medium: &[Boulders],
                low: &[Outcrop],
                negative: &[Talus],
            },
            RockFormation::Quartzite => WeatheringProfile {
                high: &[Ledge, Outcrop],
                medium: &[Boulders],
                low: &[],
                negative: &[Scree],
            },
            RockFormation::Marble => WeatheringProfile {
                high: &[Sinkhole, KarstPavement],
                medium: &[KarstPavement],
                low: &[Outcrop],
                negative: &[],
            },
            RockFormation::Slate => WeatheringProfile {
                high: &[Ledge, Scree],
                medium: &[Scree],
                low: &[Outcrop],
                negative: &[Talus],
            },
            RockFormation::Limestone => WeatheringProfile {
                high: &[Sinkhole, CaveEntrance, KarstPavement],
                medium: &[KarstPavement, Gully],
                low: &[Outcrop],
                negative: &[],
            },
            RockFormation::Sandstone => WeatheringProfile {
                high: &[Hoodoo, Arch, Gully],
                medium: &[Gully, Ledge],
                low: &[Outcrop],
                negative: &[SandBar],
            },
            RockFormation::Shale => WeatheringProfile {
                high: &[Gully, Talus],
                medium: &[Gully],
                low: &[],
                negative: &[Mudflat],
            },
            RockFormation::Alluvium => WeatheringProfile {
                high: &[Gully],
                medium: &[],
                low: &[],
                negative: &[Mudflat, SandBar],
            },
        }
    }
}

/// Weighted formation candidates for a biome.
pub fn formation_catalog(biome: Biome) -> &'static [(RockFormation, f32)] {
    use RockFormation::*;
    match biome {
        Biome::Forest => &[(Granite, 3.0), (Sandstone, 2.0), (Shale, 2.0), (Limestone, 1.5)],
        Biome::Grassland => &[(Limestone, 3.0), (Shale, 2.0), (Sandstone, 2.0), (Alluvium, 1.5)],
        Biome::Desert => &[(Sandstone, 4.0), (Limestone, 2.0), (Basalt, 1.5)],
        Biome::Mountain => &[(Granite, 3.0), (Gneiss, 2.5), (Quartzite, 1.5), (Slate, 2.0), (Basalt, 1.0)],
        Biome::Swamp => &[(Alluvium, 4.0), (Shale, 2.0), (Limestone, 1.0)],
        Biome::Coastal => &[(Sandstone, 3.0), (Limestone, 2.0), (Basalt, 1.5), (Alluvium, 2.0)],
        Biome::Tundra => &[(Granite, 3.0), (Gneiss, 2.0), (Basalt, 1.5), (Slate, 1.0)],
        Biome::Jungle => &[(Limestone, 3.0), (Basalt, 2.0), (Shale, 1.5)],
        Biome::Underground => &[(Limestone, 4.0), (Marble, 2.0), (Granite, 1.5), (Basalt, 1.0)],
    }
}

/// Geology of one tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeologyTile {
    pub formation: RockFormation,
    /// Soil depth in feet
    pub soil_depth: f32,
    pub permeability: f32,
    pub fracture_intensity: f32,
    /// Weathering intensity (0-1)
    pub weathering: f32,
    pub weathering_band: WeatheringBand,
    pub features: Vec<TerrainFeature>,
    /// Contact between two formations
    pub is_transition: bool,
}

impl GeologyTile {
    pub fn hardness(&self) -> f32 {
        self.formation.hardness()
    }
}

/// A tile where the formation changes to a different one next door.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionZone {
    pub x: usize,
    pub y: usize,
    pub from: RockFormation,
    pub to: RockFormation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeologyLayerData {
    pub width: usize,
    pub height: usize,
    pub primary_formation: RockFormation,
    pub secondary_formation: Option<RockFormation>,
    pub tiles: Tilemap<GeologyTile>,
    pub transition_zones: Vec<TransitionZone>,
}

impl GeologyLayerData {
    pub fn tile(&self, x: usize, y: usize) -> &GeologyTile {
        self.tiles.get(x, y)
    }

    pub fn feature_count(&self) -> usize {
        self.tiles.iter().map(|(_, _, t)| t.features.len()).sum()
    }
}

/// Generate the geology layer.
pub fn generate(
    width: usize,
    height: usize,
    ctx: &Context,
    seeds: &LayeredSeed,
    limits: &DimensionLimits,
) -> Result<GeologyLayerData, GenerationError> {
    limits.check(width, height)?;
    build(width, height, ctx, seeds).map_err(GenerationError::layer(LayerName::Geology))
}

fn build(
    width: usize,
    height: usize,
    ctx: &Context,
    seeds: &LayeredSeed,
) -> Result<GeologyLayerData, LayerError> {
    let (primary, secondary) = select_formations(ctx.biome(), seeds)?;

    let formations = paint_bedrock(width, height, primary, secondary, seeds);
    let transitions = find_transitions(&formations);

    let weathering_noise = NoiseGenerator::with_frequency(seeds.layer(SeedLayer::GeologyWeathering), 0.11);
    let fracture_noise = NoiseGenerator::with_frequency(seeds.layer(SeedLayer::Geology), 0.23);
    let climate = 0.7 + ctx.biome().base_moisture() * 0.6;
    let soil_bonus = biome_soil_bonus(ctx.biome());

    let mut transition_mask = Tilemap::new_with(width, height, false);
    for t in &transitions {
        transition_mask.set(t.x, t.y, true);
    }

    let tiles = Tilemap::from_fn(width, height, |x, y| {
        let formation = *formations.get(x, y);
        let is_transition = *transition_mask.get(x, y);
        let hardness = formation.hardness();

        let raw = weathering_noise.fbm_at(x as f64, y as f64, 3, 0.5) as f32;
        let intensity = (raw * climate).clamp(0.0, 1.0);
        let band = WeatheringBand::from_intensity(intensity);

        let mut rng = seeds.tile_rng(SeedLayer::GeologyWeathering, x, y);
        let features = weather_features(formation, band, &mut rng);

        let fracture_var = (fracture_noise.generate_at(x as f64, y as f64) as f32 - 0.5) * 0.4;
        let fracture_intensity = (formation.base_fracture()
            + fracture_var
            + intensity * 0.2
            + if is_transition { 0.15 } else { 0.0 })
        .clamp(0.0, 1.0);

        let permeability = (formation.permeability() + fracture_intensity * 0.3).clamp(0.0, 1.0);
        let soil_depth = soil_depth(intensity, band, hardness, soil_bonus);

        GeologyTile {
            formation,
            soil_depth,
            permeability,
            fracture_intensity,
            weathering: intensity,
            weathering_band: band,
            features,
            is_transition,
        }
    });

    let data = GeologyLayerData {
        width,
        height,
        primary_formation: primary,
        secondary_formation: secondary,
        tiles,
        transition_zones: transitions,
    };

    debug!(
        primary = ?data.primary_formation,
        secondary = ?data.secondary_formation,
        transitions = data.transition_zones.len(),
        features = data.feature_count(),
        "geology generated"
    );

    Ok(data)
}

fn select_formations(
    biome: Biome,
    seeds: &LayeredSeed,
) -> Result<(RockFormation, Option<RockFormation>), LayerError> {
    let catalog = formation_catalog(biome);
    let mut rng = seeds.streams().stream(SeedLayer::GeologyFormation, "formations");

    let primary = catalog
        .choose_weighted(&mut rng, |(_, w)| *w)
        .map(|(f, _)| *f)
        .map_err(|_| LayerError::EmptyFormationCatalog(biome))?;

    let secondary = if catalog.len() > 1 && rng.gen::<f32>() < 0.6 {
        let others: Vec<_> = catalog.iter().filter(|(f, _)| *f != primary).copied().collect();
        others.choose_weighted(&mut rng, |(_, w)| *w).ok().map(|(f, _)| *f)
    } else {
        None
    };

    Ok((primary, secondary))
}

fn paint_bedrock(
    width: usize,
    height: usize,
    primary: RockFormation,
    secondary: Option<RockFormation>,
    seeds: &LayeredSeed,
) -> Tilemap<RockFormation> {
    let Some(secondary) = secondary else {
        return Tilemap::new_with(width, height, primary);
    };
    let noise = NoiseGenerator::with_frequency(seeds.layer(SeedLayer::GeologyBedrock), 0.06);
    Tilemap::from_fn(width, height, |x, y| {
        if noise.fbm_at(x as f64, y as f64, 2, 0.5) > 0.58 {
            secondary
        } else {
            primary
        }
    })
}

fn find_transitions(formations: &Tilemap<RockFormation>) -> Vec<TransitionZone> {
    let mut zones = Vec::new();
    for (x, y, &from) in formations.iter() {
        let contact = NEIGHBORS_4.iter().find_map(|&(dx, dy)| {
            formations
                .get_checked(x as i32 + dx, y as i32 + dy)
                .filter(|other| **other != from)
                .copied()
        });
        if let Some(to) = contact {
            zones.push(TransitionZone { x, y, from, to });
        }
    }
    zones
}

/// Pick at most one weathering feature for a tile.
///
/// Hard rock resists forming large or fast-developing landforms, so those
/// are only kept with reduced probability.
fn weather_features(
    formation: RockFormation,
    band: WeatheringBand,
    rng: &mut impl Rng,
) -> Vec<TerrainFeature> {
    // Always draw the same number of values per tile
    let attempt: f32 = rng.gen();
    let pick: f32 = rng.gen();
    let keep: f32 = rng.gen();

    let candidates = formation.weathering_profile().features(band);
    if candidates.is_empty() || attempt >= band.feature_chance() {
        return Vec::new();
    }

    let idx = ((pick * candidates.len() as f32) as usize).min(candidates.len() - 1);
    let feature = candidates[idx];
    let resist = formation.hardness() >= 6.0 && (feature.is_large_scale() || feature.is_rapid());
    if resist && keep >= 0.4 {
        return Vec::new();
    }
    vec![feature]
}

fn biome_soil_bonus(biome: Biome) -> f32 {
    match biome {
        Biome::Swamp | Biome::Jungle => 0.5,
        Biome::Forest | Biome::Grassland => 0.3,
        Biome::Coastal => 0.1,
        Biome::Mountain | Biome::Tundra => -0.2,
        Biome::Desert | Biome::Underground => -0.4,
    }
}

/// Soil depth in feet. Harder rock sheds thinner soil.
fn soil_depth(intensity: f32, band: WeatheringBand, hardness: f32, biome_bonus: f32) -> f32 {
    let deposition = if band == WeatheringBand::Negative {
        (0.3 - intensity) / 0.3 * 1.5
    } else {
        0.0
    };
    let softness = 1.0 - hardness / 12.0;
    ((intensity * 4.5 + deposition + biome_bonus) * softness).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DevelopmentLevel, ElevationZone, HydrologyType, Season};
    use crate::seeds::Seed;

    fn ctx(biome: Biome) -> Context {
        let hydrology = match biome {
            Biome::Coastal => HydrologyType::Coastal,
            Biome::Swamp => HydrologyType::Wetland,
            Biome::Desert => HydrologyType::Arid,
            _ => HydrologyType::Stream,
        };
        Context::new(biome, ElevationZone::Lowland, hydrology, DevelopmentLevel::Rural, Season::Summer).unwrap()
    }

    fn seeds(n: i64) -> LayeredSeed {
        LayeredSeed::new(Seed::from_number(n).unwrap())
    }

    #[test]
    fn test_dimensions_validated_first() {
        let result = generate(5, 40, &ctx(Biome::Forest), &seeds(1), &DimensionLimits::default());
        assert!(matches!(result, Err(GenerationError::Validation(_))));
        let result = generate(40, 201, &ctx(Biome::Forest), &seeds(1), &DimensionLimits::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_grid_dimensions() {
        let data = generate(30, 20, &ctx(Biome::Mountain), &seeds(9), &DimensionLimits::default()).unwrap();
        assert_eq!(data.tiles.width, 30);
        assert_eq!(data.tiles.height, 20);
        assert!(data.tiles.rows().all(|r| r.len() == 30));
    }

    #[test]
    fn test_formations_from_biome_catalog() {
        for biome in Biome::ALL {
            let data = generate(20, 20, &ctx(biome), &seeds(31), &DimensionLimits::default()).unwrap();
            let catalog: Vec<_> = formation_catalog(biome).iter().map(|(f, _)| *f).collect();
            assert!(catalog.contains(&data.primary_formation));
            if let Some(s) = data.secondary_formation {
                assert!(catalog.contains(&s));
                assert_ne!(s, data.primary_formation);
            }
            for (_, _, tile) in data.tiles.iter() {
                assert!(catalog.contains(&tile.formation));
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let a = generate(40, 40, &ctx(Biome::Forest), &seeds(77), &DimensionLimits::default()).unwrap();
        let b = generate(40, 40, &ctx(Biome::Forest), &seeds(77), &DimensionLimits::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_transitions_touch_other_formation() {
        // Look for a seed that produces two formations
        for n in 1..40 {
            let data = generate(50, 50, &ctx(Biome::Mountain), &seeds(n), &DimensionLimits::default()).unwrap();
            if data.secondary_formation.is_none() || data.transition_zones.is_empty() {
                continue;
            }
            for zone in &data.transition_zones {
                assert_ne!(zone.from, zone.to);
                assert_eq!(data.tile(zone.x, zone.y).formation, zone.from);
                assert!(data.tile(zone.x, zone.y).is_transition);
            }
            return;
        }
        panic!("no seed produced a formation contact");
    }

    #[test]
    fn test_values_bounded() {
        let data = generate(60, 60, &ctx(Biome::Jungle), &seeds(5), &DimensionLimits::default()).unwrap();
        for (_, _, t) in data.tiles.iter() {
            assert!((0.0..=1.0).contains(&t.fracture_intensity));
            assert!((0.0..=1.0).contains(&t.permeability));
            assert!(t.soil_depth >= 0.0);
            assert!(t.features.len() <= 1);
        }
    }

    #[test]
    fn test_harder_rock_thinner_soil() {
        let soft = soil_depth(0.8, WeatheringBand::High, RockFormation::Shale.hardness(), 0.0);
        let hard = soil_depth(0.8, WeatheringBand::High, RockFormation::Quartzite.hardness(), 0.0);
        assert!(hard < soft, "hard {} should be < soft {}", hard, soft);
    }

    #[test]
    fn test_features_come_from_profile() {
        let data = generate(80, 80, &ctx(Biome::Desert), &seeds(12), &DimensionLimits::default()).unwrap();
        for (_, _, t) in data.tiles.iter() {
            for f in &t.features {
                let allowed = t.formation.weathering_profile().features(t.weathering_band);
                assert!(allowed.contains(f), "{:?} not in {:?} profile", f, t.formation);
            }
        }
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(WeatheringBand::from_intensity(0.9), WeatheringBand::High);
        assert_eq!(WeatheringBand::from_intensity(0.55), WeatheringBand::Medium);
        assert_eq!(WeatheringBand::from_intensity(0.3), WeatheringBand::Low);
        assert_eq!(WeatheringBand::from_intensity(0.1), WeatheringBand::Negative);
    }
}
