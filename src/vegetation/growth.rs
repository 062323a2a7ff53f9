//! Per-tile growth potential.

use crate::context::{Biome, ElevationZone};
use crate::geology::GeologyLayerData;
use crate::hydrology::HydrologyLayerData;
use crate::tilemap::Tilemap;
use crate::topography::TopographyLayerData;

pub fn biome_base_potential(biome: Biome) -> f32 {
    match biome {
        Biome::Jungle => 0.95,
        Biome::Forest => 0.85,
        Biome::Swamp => 0.75,
        Biome::Grassland => 0.55,
        Biome::Mountain => 0.55,
        Biome::Coastal => 0.5,
        Biome::Tundra => 0.25,
        Biome::Desert => 0.15,
        Biome::Underground => 0.05,
    }
}

fn zone_adjustment(zone: ElevationZone) -> f32 {
    match zone {
        ElevationZone::Lowland => 1.0,
        ElevationZone::Foothills => 0.95,
        ElevationZone::Highland => 0.85,
        ElevationZone::Alpine => 0.6,
    }
}

fn moisture_factor(biome: Biome, moisture: f32) -> f32 {
    let waterlogged = moisture > 0.9 && !matches!(biome, Biome::Swamp | Biome::Jungle);
    if waterlogged {
        0.7
    } else {
        (0.35 + moisture * 0.9).min(1.0)
    }
}

fn slope_penalty(slope: f32) -> f32 {
    (1.0 - slope / 70.0).clamp(0.1, 1.0)
}

fn soil_penalty(soil_depth: f32) -> f32 {
    (0.3 + soil_depth / 2.0 * 0.7).min(1.0)
}

/// Growth potential in `[0, 1]`. Open water supports nothing.
pub fn growth_potential(
    biome: Biome,
    zone: ElevationZone,
    moisture: f32,
    slope: f32,
    soil_depth: f32,
    open_water: bool,
) -> f32 {
    if open_water {
        return 0.0;
    }
    let p = biome_base_potential(biome)
        * moisture_factor(biome, moisture)
        * slope_penalty(slope)
        * soil_penalty(soil_depth)
        * zone_adjustment(zone);
    p.clamp(0.0, 1.0)
}

pub fn potential_map(
    biome: Biome,
    zone: ElevationZone,
    geology: &GeologyLayerData,
    topography: &TopographyLayerData,
    hydrology: &HydrologyLayerData,
) -> Tilemap<f32> {
    Tilemap::from_fn(topography.width, topography.height, |x, y| {
        let h = hydrology.tile(x, y);
        growth_potential(
            biome,
            zone,
            h.moisture,
            topography.tile(x, y).slope,
            geology.tile(x, y).soil_depth,
            h.is_water() && !h.is_marsh,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_has_no_potential() {
        assert_eq!(growth_potential(Biome::Jungle, ElevationZone::Lowland, 1.0, 0.0, 5.0, true), 0.0);
    }

    #[test]
    fn test_penalties_reduce_potential() {
        let base = growth_potential(Biome::Forest, ElevationZone::Lowland, 0.6, 2.0, 3.0, false);
        let steep = growth_potential(Biome::Forest, ElevationZone::Lowland, 0.6, 50.0, 3.0, false);
        let thin = growth_potential(Biome::Forest, ElevationZone::Lowland, 0.6, 2.0, 0.0, false);
        let alpine = growth_potential(Biome::Forest, ElevationZone::Alpine, 0.6, 2.0, 3.0, false);
        assert!(steep < base && thin < base && alpine < base);
        assert!((0.0..=1.0).contains(&base));
    }

    #[test]
    fn test_desert_poorer_than_forest() {
        let desert = growth_potential(Biome::Desert, ElevationZone::Lowland, 0.3, 2.0, 2.0, false);
        let forest = growth_potential(Biome::Forest, ElevationZone::Lowland, 0.3, 2.0, 2.0, false);
        assert!(desert < forest);
    }
}
