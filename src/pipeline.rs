//! Battlemap generation pipeline
//!
//! Runs the six layers in dependency order, flattens them into a tactical
//! grid and attaches a natural-law report:
//!
//! geology → topography → hydrology → vegetation → structures → features
//!
//! A failing layer aborts the run. Validation never does.

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::config::GenerationConfig;
use crate::context::Context;
use crate::converter::{self, TacticalMap};
use crate::error::GenerationError;
use crate::features::{self, FeaturesLayerData};
use crate::geology::{self, GeologyLayerData};
use crate::hydrology::{self, HydrologyLayerData};
use crate::seeds::{LayeredSeed, Seed};
use crate::structures::{self, StructuresLayerData};
use crate::topography::{self, TopographyLayerData};
use crate::validator::{LayerStack, NaturalLawValidator, ValidationReport};
use crate::vegetation::{self, VegetationLayerData};

/// Everything produced by one generation run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Battlemap {
    pub width: usize,
    pub height: usize,
    pub seed: Seed,
    pub context: Context,
    pub geology: GeologyLayerData,
    pub topography: TopographyLayerData,
    pub hydrology: HydrologyLayerData,
    pub vegetation: VegetationLayerData,
    pub structures: StructuresLayerData,
    pub features: FeaturesLayerData,
    pub tactical: TacticalMap,
    pub validation: ValidationReport,
}

/// Headline numbers of a run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BattlemapSummary {
    pub min_elevation: f32,
    pub max_elevation: f32,
    pub stream_count: usize,
    pub tree_count: usize,
    pub forest_patches: usize,
    pub building_count: usize,
    pub road_length: usize,
    pub bridge_count: usize,
    pub feature_count: usize,
}

impl Battlemap {
    pub fn layers(&self) -> LayerStack<'_> {
        LayerStack {
            geology: &self.geology,
            topography: &self.topography,
            hydrology: &self.hydrology,
            vegetation: &self.vegetation,
            structures: &self.structures,
            features: &self.features,
        }
    }

    pub fn summary(&self) -> BattlemapSummary {
        BattlemapSummary {
            min_elevation: self.topography.min_elevation,
            max_elevation: self.topography.max_elevation,
            stream_count: self.hydrology.stream_count(),
            tree_count: self.vegetation.tree_count(),
            forest_patches: self.vegetation.patches.len(),
            building_count: self.structures.building_count(),
            road_length: self.structures.road_length(),
            bridge_count: self.structures.bridges.len(),
            feature_count: self.features.feature_count(),
        }
    }
}

/// Generate a complete battlemap.
///
/// Dimensions and config are validated before any layer runs.
pub fn generate_battlemap(
    width: usize,
    height: usize,
    ctx: &Context,
    seed: Seed,
    config: &GenerationConfig,
) -> Result<Battlemap, GenerationError> {
    config.validate()?;
    config.limits.check(width, height)?;

    info!(
        seed = seed.value(),
        width,
        height,
        biome = %ctx.biome(),
        elevation = %ctx.elevation(),
        hydrology = %ctx.hydrology(),
        development = %ctx.development(),
        season = %ctx.season(),
        "generating battlemap"
    );

    let seeds = LayeredSeed::new(seed);

    let geology = info_span!("layer", name = "geology")
        .in_scope(|| geology::generate(width, height, ctx, &seeds, &config.limits))?;
    let topography = info_span!("layer", name = "topography")
        .in_scope(|| topography::generate(&geology, ctx, &seeds, &config.topography))?;
    let hydrology = info_span!("layer", name = "hydrology")
        .in_scope(|| hydrology::generate(&topography, &geology, ctx, &seeds, &config.hydrology))?;
    let vegetation = info_span!("layer", name = "vegetation").in_scope(|| {
        vegetation::generate(&hydrology, &topography, &geology, ctx, &seeds, &config.vegetation)
    })?;
    let structures = info_span!("layer", name = "structures")
        .in_scope(|| structures::generate(&vegetation, &hydrology, &topography, ctx, &seeds))?;
    let features = info_span!("layer", name = "features").in_scope(|| {
        features::generate(&geology, &topography, &hydrology, &vegetation, &structures, ctx, &seeds)
    })?;

    let tactical = info_span!("layer", name = "converter")
        .in_scope(|| converter::convert(&topography, &hydrology, &vegetation, &structures))?;

    let validation = NaturalLawValidator::new(config.validator.clone()).validate(LayerStack {
        geology: &geology,
        topography: &topography,
        hydrology: &hydrology,
        vegetation: &vegetation,
        structures: &structures,
        features: &features,
    });
    if !validation.is_valid {
        warn!(summary = %validation.summary, "battlemap breaks natural laws");
    }

    let map = Battlemap {
        width,
        height,
        seed,
        context: ctx.clone(),
        geology,
        topography,
        hydrology,
        vegetation,
        structures,
        features,
        tactical,
        validation,
    };

    let s = map.summary();
    info!(
        streams = s.stream_count,
        trees = s.tree_count,
        buildings = s.building_count,
        features = s.feature_count,
        "battlemap complete"
    );

    Ok(map)
}

/// Run [`generate_battlemap`] on tokio's blocking pool.
///
/// Independent requests share no state and may run concurrently. There is no
/// cancellation inside a run; race the returned future to abandon one.
pub async fn generate_battlemap_async(
    width: usize,
    height: usize,
    ctx: Context,
    seed: Seed,
    config: GenerationConfig,
) -> Result<Battlemap, GenerationError> {
    tokio::task::spawn_blocking(move || generate_battlemap(width, height, &ctx, seed, &config))
        .await
        .map_err(|e| GenerationError::TaskAborted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Biome, DevelopmentLevel, ElevationZone, HydrologyType, Season};
    use crate::error::ValidationError;
    use crate::structures::buildings::MAX_BUILDINGS;

    fn scenario_context() -> Context {
        Context::new(
            Biome::Forest,
            ElevationZone::Highland,
            HydrologyType::River,
            DevelopmentLevel::Settled,
            Season::Autumn,
        )
        .unwrap()
    }

    fn scenario_seed() -> Seed {
        Seed::from_string("deterministic-test").unwrap()
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let ctx = scenario_context();
        let config = GenerationConfig::default();
        let a = generate_battlemap(40, 40, &ctx, scenario_seed(), &config).unwrap();
        let b = generate_battlemap(40, 40, &ctx, scenario_seed(), &config).unwrap();

        assert_eq!(a.topography.max_elevation, b.topography.max_elevation);
        assert_eq!(a.hydrology.stream_count(), b.hydrology.stream_count());
        assert_eq!(a.vegetation.tree_count(), b.vegetation.tree_count());
        assert_eq!(a.structures.building_count(), b.structures.building_count());
        for y in 0..40 {
            for x in 0..40 {
                assert_eq!(a.topography.elevation(x, y), b.topography.elevation(x, y));
                assert_eq!(a.hydrology.tile(x, y).water_depth, b.hydrology.tile(x, y).water_depth);
                assert_eq!(
                    a.vegetation.tile(x, y).vegetation_type,
                    b.vegetation.tile(x, y).vegetation_type
                );
            }
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let ctx = scenario_context();
        let config = GenerationConfig::default();
        let a = generate_battlemap(40, 40, &ctx, Seed::from_number(1).unwrap(), &config).unwrap();
        let b = generate_battlemap(40, 40, &ctx, Seed::from_number(2).unwrap(), &config).unwrap();
        assert_ne!(a.topography.tiles, b.topography.tiles);
    }

    #[test]
    fn test_all_layers_share_dimensions() {
        let ctx = scenario_context();
        let map = generate_battlemap(37, 23, &ctx, scenario_seed(), &GenerationConfig::default()).unwrap();
        let dims = [
            (map.geology.width, map.geology.height, map.geology.tiles.width, map.geology.tiles.height),
            (map.topography.width, map.topography.height, map.topography.tiles.width, map.topography.tiles.height),
            (map.hydrology.width, map.hydrology.height, map.hydrology.tiles.width, map.hydrology.tiles.height),
            (map.vegetation.width, map.vegetation.height, map.vegetation.tiles.width, map.vegetation.tiles.height),
            (map.structures.width, map.structures.height, map.structures.tiles.width, map.structures.tiles.height),
            (map.features.width, map.features.height, map.features.tiles.width, map.features.tiles.height),
            (map.tactical.width, map.tactical.height, map.tactical.tiles.width, map.tactical.tiles.height),
        ];
        for d in dims {
            assert_eq!(d, (37, 23, 37, 23));
        }
        assert_eq!(map.geology.tiles.rows().count(), 23);
        assert!(map.geology.tiles.rows().all(|row| row.len() == 37));
    }

    #[test]
    fn test_water_flows_downhill() {
        let ctx = scenario_context();
        let map = generate_battlemap(40, 40, &ctx, scenario_seed(), &GenerationConfig::default()).unwrap();
        for (x, y, tile) in map.hydrology.tiles.iter() {
            if let Some((tx, ty)) = tile.flow_direction.target(x, y, map.width, map.height) {
                let here = map.topography.elevation(x, y);
                let there = map.topography.elevation(tx, ty);
                assert!(there <= here + 0.1, "({}, {}) flows uphill {} -> {}", x, y, here, there);
            }
        }
    }

    #[test]
    fn test_slope_and_stream_order_bounds() {
        let ctx = scenario_context();
        let map = generate_battlemap(40, 40, &ctx, scenario_seed(), &GenerationConfig::default()).unwrap();
        assert!(map.topography.tiles.iter().all(|(_, _, t)| (0.0..=90.0).contains(&t.slope)));
        assert!(map.hydrology.tiles.iter().all(|(_, _, t)| t.stream_order <= 10));
        assert!(map.topography.min_elevation <= map.topography.max_elevation);
    }

    #[test]
    fn test_density_monotonic() {
        let ctx = scenario_context();
        let mut previous = 0;
        for density in [0.0, 0.5, 1.0, 2.0, 3.0] {
            let mut config = GenerationConfig::default();
            config.vegetation.density = density;
            let map = generate_battlemap(40, 40, &ctx, scenario_seed(), &config).unwrap();
            let trees = map.vegetation.tree_count();
            if density == 0.0 {
                assert_eq!(trees, 0);
            }
            assert!(trees >= previous, "density {} gave {} trees, fewer than {}", density, trees, previous);
            previous = trees;
        }
    }

    #[test]
    fn test_development_gating() {
        let wild = Context::new(
            Biome::Grassland,
            ElevationZone::Lowland,
            HydrologyType::Stream,
            DevelopmentLevel::Wilderness,
            Season::Summer,
        )
        .unwrap();
        let urban = Context::new(
            Biome::Grassland,
            ElevationZone::Lowland,
            HydrologyType::Stream,
            DevelopmentLevel::Urban,
            Season::Summer,
        )
        .unwrap();
        let config = GenerationConfig::default();
        for n in 1..4 {
            let seed = Seed::from_number(n * 1000).unwrap();
            let map = generate_battlemap(40, 40, &wild, seed, &config).unwrap();
            assert_eq!(map.structures.building_count(), 0);
            assert_eq!(map.structures.road_length(), 0);

            let map = generate_battlemap(40, 40, &urban, seed, &config).unwrap();
            assert!(map.structures.building_count() <= MAX_BUILDINGS);
        }
    }

    #[test]
    fn test_incompatible_contexts_rejected() {
        assert!(Context::new(
            Biome::Desert,
            ElevationZone::Lowland,
            HydrologyType::River,
            DevelopmentLevel::Rural,
            Season::Summer,
        )
        .is_err());
        assert!(Context::new(
            Biome::Coastal,
            ElevationZone::Lowland,
            HydrologyType::Arid,
            DevelopmentLevel::Rural,
            Season::Summer,
        )
        .is_err());
    }

    #[test]
    fn test_invalid_dimensions_fail_fast() {
        let ctx = scenario_context();
        let err = generate_battlemap(9, 40, &ctx, scenario_seed(), &GenerationConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Validation(ValidationError::InvalidDimensions { width: 9, .. })
        ));
        let err = generate_battlemap(40, 201, &ctx, scenario_seed(), &GenerationConfig::default()).unwrap_err();
        assert!(matches!(err, GenerationError::Validation(_)));
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = GenerationConfig::default();
        config.topography.ruggedness = 2.0;
        let err = generate_battlemap(40, 40, &scenario_context(), scenario_seed(), &config).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Validation(ValidationError::ConfigOutOfRange { .. })
        ));
    }

    #[test]
    fn test_generated_map_is_physically_valid() {
        let map = generate_battlemap(40, 40, &scenario_context(), scenario_seed(), &GenerationConfig::default()).unwrap();
        assert!(map.validation.is_valid, "violations: {}", map.validation.summary);
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let ctx = scenario_context();
        let config = GenerationConfig::default();
        let sync = generate_battlemap(40, 40, &ctx, scenario_seed(), &config).unwrap();
        let (a, b) = tokio::join!(
            generate_battlemap_async(40, 40, ctx.clone(), scenario_seed(), config.clone()),
            generate_battlemap_async(40, 40, ctx.clone(), Seed::from_number(99).unwrap(), config.clone()),
        );
        assert_eq!(a.unwrap(), sync);
        assert_eq!(b.unwrap().width, 40);
    }
}
