//! Topography layer: elevation, slope, aspect and landform flags.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TopographyConfig;
use crate::context::Context;
use crate::error::{GenerationError, LayerError, LayerName};
use crate::geology::GeologyLayerData;
use crate::noise_field::NoiseGenerator;
use crate::seeds::{LayeredSeed, SeedLayer};
use crate::tilemap::Tilemap;

/// Horizontal size of one tile in feet.
pub const TILE_FEET: f32 = 5.0;

/// Formations softer than this get an extra smoothing pass.
const SOFT_ROCK_HARDNESS: f32 = 4.0;

/// Formations softer than this erode too quickly to hold a ridge.
const RIDGE_HARDNESS: f32 = 2.0;

/// Noise shape derived from the ruggedness setting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuggednessParams {
    pub octaves: usize,
    pub persistence: f64,
    pub amplitude: f32,
}

// (ruggedness, octaves, persistence, amplitude) at min / default / max
const BREAKPOINTS: [(f32, f32, f64, f32); 3] = [(0.0, 2.0, 0.3, 0.5), (0.5, 4.0, 0.5, 1.0), (1.0, 6.0, 0.65, 1.6)];

/// Piecewise-linear interpolation between the ruggedness breakpoints.
pub fn ruggedness_params(ruggedness: f32) -> RuggednessParams {
    let r = ruggedness.clamp(0.0, 1.0);
    let (lo, hi) = if r <= BREAKPOINTS[1].0 {
        (BREAKPOINTS[0], BREAKPOINTS[1])
    } else {
        (BREAKPOINTS[1], BREAKPOINTS[2])
    };
    let t = (r - lo.0) / (hi.0 - lo.0);
    RuggednessParams {
        octaves: (lo.1 + (hi.1 - lo.1) * t).round() as usize,
        persistence: lo.2 + (hi.2 - lo.2) * t as f64,
        amplitude: lo.3 + (hi.3 - lo.3) * t,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopographyTile {
    /// Elevation in feet
    pub elevation: f32,
    /// Slope in degrees, 0-90
    pub slope: f32,
    /// Downslope compass bearing in degrees; `None` on flat ground
    pub aspect: Option<f32>,
    pub is_ridge: bool,
    pub is_valley: bool,
    pub is_drainage: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopographyLayerData {
    pub width: usize,
    pub height: usize,
    pub tiles: Tilemap<TopographyTile>,
    pub min_elevation: f32,
    pub max_elevation: f32,
    pub mean_slope: f32,
}

impl TopographyLayerData {
    pub fn tile(&self, x: usize, y: usize) -> &TopographyTile {
        self.tiles.get(x, y)
    }

    pub fn elevation(&self, x: usize, y: usize) -> f32 {
        self.tiles.get(x, y).elevation
    }

    /// Elevation grid as a plain map.
    pub fn elevations(&self) -> Tilemap<f32> {
        self.tiles.map(|_, _, t| t.elevation)
    }

    pub fn ridge_count(&self) -> usize {
        self.tiles.iter().filter(|(_, _, t)| t.is_ridge).count()
    }
}

pub fn generate(
    geology: &GeologyLayerData,
    ctx: &Context,
    seeds: &LayeredSeed,
    config: &TopographyConfig,
) -> Result<TopographyLayerData, GenerationError> {
    config.validate()?;
    build(geology, ctx, seeds, config).map_err(GenerationError::layer(LayerName::Topography))
}

fn build(
    geology: &GeologyLayerData,
    ctx: &Context,
    seeds: &LayeredSeed,
    config: &TopographyConfig,
) -> Result<TopographyLayerData, LayerError> {
    let width = geology.width;
    let height = geology.height;
    if geology.tiles.width != width || geology.tiles.height != height {
        return Err(LayerError::DimensionMismatch {
            input: LayerName::Geology,
            expected_width: width,
            expected_height: height,
            found_width: geology.tiles.width,
            found_height: geology.tiles.height,
        });
    }

    let params = ruggedness_params(config.ruggedness);
    let zone = ctx.elevation();
    let base = zone.base_elevation();
    let relief = zone.relief() * params.amplitude * config.variance;

    let noise = NoiseGenerator::new(seeds.layer(SeedLayer::TopographyElevation));
    let detail = NoiseGenerator::with_frequency(seeds.layer(SeedLayer::TopographyDetail), 0.35);

    let raw: Vec<f32> = (0..width * height)
        .into_par_iter()
        .map(|idx| {
            let (x, y) = (idx % width, idx / width);
            let hardness = geology.tile(x, y).hardness();
            // Harder formations resist erosion and stand higher
            let hardness_factor = 0.7 + hardness / 10.0 * 0.6;
            let n = noise.fbm_at(x as f64, y as f64, params.octaves, params.persistence) as f32;
            let d = (detail.generate_at(x as f64, y as f64) as f32 - 0.5) * 0.1;
            base + (n + d).max(0.0) * relief * hardness_factor
        })
        .collect();
    let raw = Tilemap::from_vec(width, height, raw)
        .ok_or_else(|| LayerError::Internal("elevation buffer has wrong length".into()))?;

    let elevation = smooth_soft_rock(&raw, geology);
    let (tiles, mean_slope) = derive_tiles(&elevation, geology);

    let (min_elevation, max_elevation) = tiles
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), (_, _, t)| {
            (lo.min(t.elevation), hi.max(t.elevation))
        });

    let data = TopographyLayerData {
        width,
        height,
        tiles,
        min_elevation,
        max_elevation,
        mean_slope,
    };

    debug!(
        min_elevation = data.min_elevation,
        max_elevation = data.max_elevation,
        mean_slope = data.mean_slope,
        ridges = data.ridge_count(),
        "topography generated"
    );

    Ok(data)
}

/// Blend soft-rock tiles toward their 3x3 mean.
fn smooth_soft_rock(elevation: &Tilemap<f32>, geology: &GeologyLayerData) -> Tilemap<f32> {
    elevation.map(|x, y, &e| {
        if geology.tile(x, y).hardness() >= SOFT_ROCK_HARDNESS {
            return e;
        }
        let (sum, count) = elevation
            .neighbors_8(x, y)
            .fold((e, 1.0), |(s, c), (nx, ny)| (s + *elevation.get(nx, ny), c + 1.0));
        0.5 * e + 0.5 * (sum / count)
    })
}

fn derive_tiles(elevation: &Tilemap<f32>, geology: &GeologyLayerData) -> (Tilemap<TopographyTile>, f32) {
    let mut slope_sum = 0.0;
    let tiles = Tilemap::from_fn(elevation.width, elevation.height, |x, y| {
        let e = *elevation.get(x, y);
        let (dzdx, dzdy) = gradient(elevation, x, y);
        let grad = (dzdx * dzdx + dzdy * dzdy).sqrt();
        let slope = grad.atan().to_degrees().clamp(0.0, 90.0);
        slope_sum += slope;

        let aspect = (grad > 1e-4).then(|| {
            // Downslope vector is (-dzdx, -dzdy); north is -y
            let bearing = (-dzdx).atan2(dzdy).to_degrees().rem_euclid(360.0);
            if bearing >= 360.0 {
                0.0
            } else {
                bearing
            }
        });

        let (higher_axes, lower_axes) = axis_extrema(elevation, x, y);
        let is_ridge = higher_axes >= 2 && geology.tile(x, y).hardness() >= RIDGE_HARDNESS;
        let is_valley = lower_axes >= 2;
        let is_drainage = !is_ridge && (is_valley || (slope < 5.0 && e < local_mean(elevation, x, y, 2)));

        TopographyTile {
            elevation: e,
            slope,
            aspect,
            is_ridge,
            is_valley,
            is_drainage,
        }
    });
    let mean = slope_sum / tiles.len().max(1) as f32;
    (tiles, mean)
}

/// Elevation gradient in feet per foot, one-sided at the map edge.
fn gradient(elevation: &Tilemap<f32>, x: usize, y: usize) -> (f32, f32) {
    let x0 = x.saturating_sub(1);
    let x1 = (x + 1).min(elevation.width - 1);
    let y0 = y.saturating_sub(1);
    let y1 = (y + 1).min(elevation.height - 1);

    let dx = if x1 > x0 {
        (elevation.get(x1, y) - elevation.get(x0, y)) / ((x1 - x0) as f32 * TILE_FEET)
    } else {
        0.0
    };
    let dy = if y1 > y0 {
        (elevation.get(x, y1) - elevation.get(x, y0)) / ((y1 - y0) as f32 * TILE_FEET)
    } else {
        0.0
    };
    (dx, dy)
}

/// Count axes (horizontal, vertical, both diagonals) along which the tile is
/// above both neighbours, and along which it is below both.
fn axis_extrema(elevation: &Tilemap<f32>, x: usize, y: usize) -> (usize, usize) {
    const AXES: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];
    let e = *elevation.get(x, y);
    let (mut higher, mut lower) = (0, 0);
    for (dx, dy) in AXES {
        let a = elevation.get_checked(x as i32 + dx, y as i32 + dy);
        let b = elevation.get_checked(x as i32 - dx, y as i32 - dy);
        if let (Some(&a), Some(&b)) = (a, b) {
            if e > a && e > b {
                higher += 1;
            } else if e < a && e < b {
                lower += 1;
            }
        }
    }
    (higher, lower)
}

fn local_mean(elevation: &Tilemap<f32>, x: usize, y: usize, radius: i32) -> f32 {
    let mut sum = 0.0;
    let mut count = 0.0;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if let Some(e) = elevation.get_checked(x as i32 + dx, y as i32 + dy) {
                sum += e;
                count += 1.0;
            }
        }
    }
    sum / count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DimensionLimits;
    use crate::context::{Biome, DevelopmentLevel, ElevationZone, HydrologyType, Season};
    use crate::geology;
    use crate::seeds::Seed;

    fn run(zone: ElevationZone, seed: i64, config: &TopographyConfig) -> TopographyLayerData {
        let ctx = Context::new(Biome::Mountain, zone, HydrologyType::Stream, DevelopmentLevel::Rural, Season::Summer)
            .unwrap();
        let seeds = LayeredSeed::new(Seed::from_number(seed).unwrap());
        let geo = geology::generate(40, 30, &ctx, &seeds, &DimensionLimits::default()).unwrap();
        generate(&geo, &ctx, &seeds, config).unwrap()
    }

    #[test]
    fn test_breakpoints_interpolate() {
        let lo = ruggedness_params(0.0);
        let mid = ruggedness_params(0.5);
        let hi = ruggedness_params(1.0);
        assert_eq!((lo.octaves, mid.octaves, hi.octaves), (2, 4, 6));
        let q = ruggedness_params(0.25);
        assert_eq!(q.octaves, 3);
        assert!((q.persistence - 0.4).abs() < 1e-6);
        assert!((q.amplitude - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_slope_bounds_and_extent() {
        let data = run(ElevationZone::Alpine, 3, &TopographyConfig { ruggedness: 1.0, variance: 3.0 });
        assert_eq!((data.tiles.width, data.tiles.height), (40, 30));
        for (_, _, t) in data.tiles.iter() {
            assert!((0.0..=90.0).contains(&t.slope));
            if let Some(a) = t.aspect {
                assert!((0.0..360.0).contains(&a));
            }
        }
        assert!(data.min_elevation <= data.max_elevation);
    }

    #[test]
    fn test_zone_raises_elevation() {
        let config = TopographyConfig::default();
        let low = run(ElevationZone::Lowland, 8, &config);
        let high = run(ElevationZone::Highland, 8, &config);
        assert!(high.min_elevation > low.max_elevation);
    }

    #[test]
    fn test_ridge_and_drainage_exclusive() {
        let data = run(ElevationZone::Highland, 21, &TopographyConfig::default());
        for (_, _, t) in data.tiles.iter() {
            assert!(!(t.is_ridge && t.is_drainage));
        }
    }

    #[test]
    fn test_invalid_ruggedness_rejected() {
        let ctx = Context::new(
            Biome::Forest,
            ElevationZone::Lowland,
            HydrologyType::Stream,
            DevelopmentLevel::Rural,
            Season::Summer,
        )
        .unwrap();
        let seeds = LayeredSeed::new(Seed::from_number(1).unwrap());
        let geo = geology::generate(20, 20, &ctx, &seeds, &DimensionLimits::default()).unwrap();
        let bad = TopographyConfig { ruggedness: 2.0, variance: 1.0 };
        assert!(matches!(generate(&geo, &ctx, &seeds, &bad), Err(GenerationError::Validation(_))));
    }

    #[test]
    fn test_flat_map_has_no_aspect() {
        let flat = Tilemap::new_with(5, 5, 100.0f32);
        let (dx, dy) = gradient(&flat, 2, 2);
        assert_eq!((dx, dy), (0.0, 0.0));
        assert_eq!(axis_extrema(&flat, 2, 2), (0, 0));
    }
}
