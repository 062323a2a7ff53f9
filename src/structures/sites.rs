//! Building site suitability.

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::hydrology::HydrologyLayerData;
use crate::seeds::{LayeredSeed, SeedLayer};
use crate::tilemap::Tilemap;
use crate::topography::TopographyLayerData;
use crate::vegetation::{Passability, VegetationLayerData, VegetationType};

/// Steepest ground a footprint may sit on, in degrees.
pub const MAX_BUILD_SLOPE: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Site {
    pub x: usize,
    pub y: usize,
    pub score: f32,
}

/// Whether a tile can hold part of a building footprint.
pub fn is_buildable(
    x: usize,
    y: usize,
    vegetation: &VegetationLayerData,
    hydrology: &HydrologyLayerData,
    topography: &TopographyLayerData,
) -> bool {
    let v = vegetation.tile(x, y);
    !hydrology.is_water(x, y)
        && topography.tile(x, y).slope <= MAX_BUILD_SLOPE
        && v.tree_count() == 0
        && v.vegetation_type != VegetationType::DenseForest
        && v.passability != Passability::Impassable
}

/// Tile distance (8-connected) to the nearest water, capped at `cap`.
fn water_distance(hydrology: &HydrologyLayerData, cap: u32) -> Tilemap<u32> {
    let mut distance = Tilemap::new_with(hydrology.width, hydrology.height, cap);
    let mut queue = VecDeque::new();
    for (x, y, t) in hydrology.tiles.iter() {
        if t.is_water() {
            distance.set(x, y, 0);
            queue.push_back((x, y));
        }
    }
    while let Some((x, y)) = queue.pop_front() {
        let next = distance.get(x, y) + 1;
        if next >= cap {
            continue;
        }
        for (nx, ny) in hydrology.tiles.neighbors_8(x, y) {
            if *distance.get(nx, ny) > next {
                distance.set(nx, ny, next);
                queue.push_back((nx, ny));
            }
        }
    }
    distance
}

/// Score every buildable, non-border tile and sort best first.
///
/// Flat ground, clearings and nearby (but not adjacent) water score higher.
pub fn score_sites(
    vegetation: &VegetationLayerData,
    hydrology: &HydrologyLayerData,
    topography: &TopographyLayerData,
    seeds: &LayeredSeed,
) -> Vec<Site> {
    let (w, h) = (topography.width, topography.height);
    let distance = water_distance(hydrology, 64);

    let mut sites = Vec::new();
    for (x, y, t) in topography.tiles.iter() {
        if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
            continue;
        }
        if !is_buildable(x, y, vegetation, hydrology, topography) {
            continue;
        }
        let flatness = 1.0 - t.slope / MAX_BUILD_SLOPE;
        let clearing = if vegetation.tile(x, y).in_clearing { 0.3 } else { 0.0 };
        let d = *distance.get(x, y);
        let water = if d <= 1 { 0.05 } else { 0.3 * (-(d as f32) / 6.0).exp() };
        let jitter = seeds.tile_unit(SeedLayer::StructuresBuildings, x, y) * 0.05;

        sites.push(Site {
            x,
            y,
            score: flatness * 0.4 + clearing + water + jitter,
        });
    }

    sites.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => (a.y, a.x).cmp(&(b.y, b.x)),
        other => other,
    });
    sites
}
