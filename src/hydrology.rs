//! Hydrology layer: D8 flow routing, accumulation, streams and standing water.
//!
//! 1. D8 flow direction - each tile drains to its steepest-descent neighbour
//! 2. Flow accumulation - upstream contributing area, processed high to low
//! 3. Streams - tiles above an accumulation threshold, ordered by Strahler rules
//! 4. Springs, pools, marsh and sea - standing water from local conditions
//! 5. Moisture - distance to water plus climate

use std::cmp::Ordering;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::HydrologyConfig;
use crate::context::{Context, HydrologyType};
use crate::error::{GenerationError, LayerError, LayerName};
use crate::geology::GeologyLayerData;
use crate::seeds::{LayeredSeed, SeedLayer};
use crate::tilemap::{Tilemap, NEIGHBORS_8};
use crate::topography::TopographyLayerData;

/// Upper bound on Strahler order.
pub const MAX_STREAM_ORDER: u8 = 10;

/// D8 flow direction. Directions are listed clockwise from north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowDirection {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    /// No lower neighbour
    Sink,
}

impl FlowDirection {
    const DIRECTIONS: [FlowDirection; 8] = [
        FlowDirection::North,
        FlowDirection::NorthEast,
        FlowDirection::East,
        FlowDirection::SouthEast,
        FlowDirection::South,
        FlowDirection::SouthWest,
        FlowDirection::West,
        FlowDirection::NorthWest,
    ];

    /// Tile offset of the downstream neighbour.
    pub fn offset(&self) -> Option<(i32, i32)> {
        let idx = Self::DIRECTIONS.iter().position(|d| d == self)?;
        Some(NEIGHBORS_8[idx])
    }

    /// Downstream tile on a `width` x `height` grid; `None` for sinks and
    /// for directions that leave the map.
    pub fn target(&self, x: usize, y: usize, width: usize, height: usize) -> Option<(usize, usize)> {
        let (dx, dy) = self.offset()?;
        let tx = x.checked_add_signed(dx as isize).filter(|&tx| tx < width)?;
        let ty = y.checked_add_signed(dy as isize).filter(|&ty| ty < height)?;
        Some((tx, ty))
    }

    pub fn is_sink(&self) -> bool {
        *self == FlowDirection::Sink
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MoistureClass {
    Arid,
    Dry,
    Moist,
    Wet,
    Saturated,
}

impl MoistureClass {
    pub fn from_moisture(m: f32) -> Self {
        if m < 0.2 {
            MoistureClass::Arid
        } else if m < 0.4 {
            MoistureClass::Dry
        } else if m < 0.6 {
            MoistureClass::Moist
        } else if m < 0.8 {
            MoistureClass::Wet
        } else {
            MoistureClass::Saturated
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HydrologyTile {
    pub flow_direction: FlowDirection,
    /// Upstream contributing area in tiles, including this one
    pub flow_accumulation: f32,
    /// Standing or running water depth in feet
    pub water_depth: f32,
    pub moisture: f32,
    pub moisture_class: MoistureClass,
    pub is_spring: bool,
    pub is_stream: bool,
    pub is_pool: bool,
    pub is_marsh: bool,
    pub is_sea: bool,
    /// Strahler order; 0 off-stream
    pub stream_order: u8,
}

impl HydrologyTile {
    pub fn is_water(&self) -> bool {
        self.water_depth > 0.0
    }
}

/// A run of stream tiles between a head (source or confluence) and the next head.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub id: usize,
    pub tiles: Vec<(usize, usize)>,
    pub order: u8,
    pub source: (usize, usize),
    pub mouth: (usize, usize),
    /// Segment that this one drains into
    pub flows_into: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HydrologyLayerData {
    pub width: usize,
    pub height: usize,
    pub tiles: Tilemap<HydrologyTile>,
    pub streams: Vec<Stream>,
    pub springs: Vec<(usize, usize)>,
    pub stream_threshold: f32,
}

impl HydrologyLayerData {
    pub fn tile(&self, x: usize, y: usize) -> &HydrologyTile {
        self.tiles.get(x, y)
    }

    pub fn is_water(&self, x: usize, y: usize) -> bool {
        self.tiles.get(x, y).is_water()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn max_stream_order(&self) -> u8 {
        self.streams.iter().map(|s| s.order).max().unwrap_or(0)
    }

    pub fn water_tile_count(&self) -> usize {
        self.tiles.iter().filter(|(_, _, t)| t.is_water()).count()
    }
}

pub fn generate(
    topography: &TopographyLayerData,
    geology: &GeologyLayerData,
    ctx: &Context,
    seeds: &LayeredSeed,
    config: &HydrologyConfig,
) -> Result<HydrologyLayerData, GenerationError> {
    config.validate()?;
    build(topography, geology, ctx, seeds, config).map_err(GenerationError::layer(LayerName::Hydrology))
}

fn build(
    topography: &TopographyLayerData,
    geology: &GeologyLayerData,
    ctx: &Context,
    seeds: &LayeredSeed,
    config: &HydrologyConfig,
) -> Result<HydrologyLayerData, LayerError> {
    let width = topography.width;
    let height = topography.height;
    if geology.width != width || geology.height != height {
        return Err(LayerError::DimensionMismatch {
            input: LayerName::Geology,
            expected_width: width,
            expected_height: height,
            found_width: geology.width,
            found_height: geology.height,
        });
    }

    let hydrology = ctx.hydrology();
    let elevation = topography.elevations();
    let flow = compute_flow_directions(&elevation);
    let mut accumulation = compute_flow_accumulation(&elevation, &flow);

    let threshold = stream_threshold(width * height, hydrology, config.abundance);
    let springs = place_springs(topography, geology, hydrology, seeds, config.abundance);

    // Spring discharge feeds everything downstream of it
    let spring_yield = if threshold.is_finite() { threshold * 0.5 } else { 0.0 };
    for &(sx, sy) in &springs {
        let mut cursor = Some((sx, sy));
        while let Some((x, y)) = cursor {
            *accumulation.get_mut(x, y) += spring_yield;
            cursor = flow.get(x, y).target(x, y, flow.width, flow.height);
        }
    }

    let stream_mask = accumulation.map(|_, _, &a| a >= threshold);
    let orders = compute_strahler_orders(&elevation, &flow, &stream_mask);
    let streams = trace_streams(&elevation, &flow, &stream_mask, &orders);

    let mut depth = Tilemap::new_with(width, height, 0.0f32);
    let mut pools = Tilemap::new_with(width, height, false);
    let mut marsh = Tilemap::new_with(width, height, false);
    let mut sea = Tilemap::new_with(width, height, false);

    let river_scale = if hydrology == HydrologyType::River { 1.5 } else { 1.0 };
    for (x, y, &order) in orders.iter() {
        if order > 0 {
            depth.set(x, y, (0.5 + 0.5 * order as f32) * river_scale);
        }
    }
    for &(x, y) in &springs {
        let d = depth.get_mut(x, y);
        *d = d.max(0.25);
    }

    fill_pools(&elevation, &flow, &accumulation, hydrology, &mut depth, &mut pools);
    if hydrology == HydrologyType::Wetland {
        flood_marsh(topography, &mut depth, &mut marsh);
    }
    if hydrology == HydrologyType::Coastal {
        flood_sea(&elevation, &mut depth, &mut sea);
    }

    let moisture = compute_moisture(ctx, &depth, &accumulation, config.abundance);

    let mut spring_mask = Tilemap::new_with(width, height, false);
    for &(x, y) in &springs {
        spring_mask.set(x, y, true);
    }

    let tiles = Tilemap::from_fn(width, height, |x, y| {
        let m = *moisture.get(x, y);
        HydrologyTile {
            flow_direction: *flow.get(x, y),
            flow_accumulation: *accumulation.get(x, y),
            water_depth: *depth.get(x, y),
            moisture: m,
            moisture_class: MoistureClass::from_moisture(m),
            is_spring: *spring_mask.get(x, y),
            is_stream: *stream_mask.get(x, y),
            is_pool: *pools.get(x, y),
            is_marsh: *marsh.get(x, y),
            is_sea: *sea.get(x, y),
            stream_order: *orders.get(x, y),
        }
    });

    let data = HydrologyLayerData {
        width,
        height,
        tiles,
        streams,
        springs,
        stream_threshold: threshold,
    };

    debug!(
        streams = data.stream_count(),
        max_order = data.max_stream_order(),
        springs = data.springs.len(),
        water_tiles = data.water_tile_count(),
        threshold = data.stream_threshold,
        "hydrology generated"
    );

    Ok(data)
}

/// Accumulation needed to call a tile a stream.
pub fn stream_threshold(area: usize, hydrology: HydrologyType, abundance: f32) -> f32 {
    if abundance <= 0.0 {
        return f32::INFINITY;
    }
    let factor = match hydrology {
        HydrologyType::Arid => 3.0,
        HydrologyType::Seasonal => 1.5,
        HydrologyType::River => 0.6,
        HydrologyType::Wetland => 0.8,
        _ => 1.0,
    };
    (area as f32 * 0.02).max(8.0) / abundance * factor
}

/// D8 flow direction: steepest descent among the 8 neighbours, distance
/// weighted. Ties keep the first direction clockwise from north.
pub fn compute_flow_directions(elevation: &Tilemap<f32>) -> Tilemap<FlowDirection> {
    elevation.map(|x, y, &h| {
        let mut steepest = FlowDirection::Sink;
        let mut steepest_drop = 0.0f32;

        for (dir, &(dx, dy)) in FlowDirection::DIRECTIONS.iter().zip(NEIGHBORS_8.iter()) {
            let Some(&nh) = elevation.get_checked(x as i32 + dx, y as i32 + dy) else {
                continue;
            };
            let distance = if dx != 0 && dy != 0 { 1.414 } else { 1.0 };
            let drop = (h - nh) / distance;
            if drop > steepest_drop {
                steepest_drop = drop;
                steepest = *dir;
            }
        }
        steepest
    })
}

/// Tiles sorted highest first; equal elevations fall back to row-major order.
fn descending_order(elevation: &Tilemap<f32>) -> Vec<(usize, usize)> {
    let mut cells: Vec<(usize, usize, f32)> = elevation.iter().map(|(x, y, &h)| (x, y, h)).collect();
    cells.sort_by(|a, b| match b.2.total_cmp(&a.2) {
        Ordering::Equal => (a.1, a.0).cmp(&(b.1, b.0)),
        other => other,
    });
    cells.into_iter().map(|(x, y, _)| (x, y)).collect()
}

/// Upstream contributing area. Every tile contributes 1.
pub fn compute_flow_accumulation(elevation: &Tilemap<f32>, flow: &Tilemap<FlowDirection>) -> Tilemap<f32> {
    let mut accumulation = Tilemap::new_with(elevation.width, elevation.height, 1.0f32);
    for (x, y) in descending_order(elevation) {
        if let Some((nx, ny)) = flow.get(x, y).target(x, y, flow.width, flow.height) {
            let acc = *accumulation.get(x, y);
            *accumulation.get_mut(nx, ny) += acc;
        }
    }
    accumulation
}

fn upstream_streams<'a>(
    flow: &'a Tilemap<FlowDirection>,
    mask: &'a Tilemap<bool>,
    x: usize,
    y: usize,
) -> impl Iterator<Item = (usize, usize)> + 'a {
    flow.neighbors_8(x, y).filter(move |&(nx, ny)| {
        *mask.get(nx, ny) && flow.get(nx, ny).target(nx, ny, flow.width, flow.height) == Some((x, y))
    })
}

/// Strahler ordering over the stream mask.
///
/// Headwaters get order 1. Where two or more tributaries of the highest
/// incoming order meet the order increases by one; otherwise the highest
/// incoming order carries through.
pub fn compute_strahler_orders(
    elevation: &Tilemap<f32>,
    flow: &Tilemap<FlowDirection>,
    mask: &Tilemap<bool>,
) -> Tilemap<u8> {
    let mut orders = Tilemap::new_with(elevation.width, elevation.height, 0u8);

    // Flow is strictly downhill, so every upstream tile is processed first
    for (x, y) in descending_order(elevation) {
        if !*mask.get(x, y) {
            continue;
        }
        let incoming: Vec<u8> = upstream_streams(flow, mask, x, y)
            .map(|(nx, ny)| *orders.get(nx, ny))
            .collect();

        let order = match incoming.iter().max() {
            None => 1,
            Some(&max) => {
                let count_max = incoming.iter().filter(|&&o| o == max).count();
                if count_max >= 2 {
                    max + 1
                } else {
                    max
                }
            }
        };
        orders.set(x, y, order.min(MAX_STREAM_ORDER));
    }

    orders
}

/// Split the stream network into segments starting at sources and confluences.
fn trace_streams(
    elevation: &Tilemap<f32>,
    flow: &Tilemap<FlowDirection>,
    mask: &Tilemap<bool>,
    orders: &Tilemap<u8>,
) -> Vec<Stream> {
    let is_head = |x: usize, y: usize| upstream_streams(flow, mask, x, y).count() != 1;

    let mut segment_of: Tilemap<Option<usize>> = Tilemap::new_with(mask.width, mask.height, None);
    let mut streams = Vec::new();

    for (x, y) in descending_order(elevation) {
        if !*mask.get(x, y) || !is_head(x, y) {
            continue;
        }
        let id = streams.len();
        let mut tiles = vec![(x, y)];
        segment_of.set(x, y, Some(id));

        let mut cursor = (x, y);
        let (w, h) = (flow.width, flow.height);
        while let Some(next) = flow.get(cursor.0, cursor.1).target(cursor.0, cursor.1, w, h) {
            if !*mask.get(next.0, next.1) || is_head(next.0, next.1) {
                break;
            }
            tiles.push(next);
            segment_of.set(next.0, next.1, Some(id));
            cursor = next;
        }

        let order = tiles.iter().map(|&(tx, ty)| *orders.get(tx, ty)).max().unwrap_or(1);
        streams.push(Stream {
            id,
            source: (x, y),
            mouth: cursor,
            order,
            tiles,
            flows_into: None,
        });
    }

    for stream in &mut streams {
        let (mx, my) = stream.mouth;
        stream.flows_into = flow
            .get(mx, my)
            .target(mx, my, flow.width, flow.height)
            .and_then(|(nx, ny)| *segment_of.get(nx, ny));
    }

    streams
}

fn place_springs(
    topography: &TopographyLayerData,
    geology: &GeologyLayerData,
    hydrology: HydrologyType,
    seeds: &LayeredSeed,
    abundance: f32,
) -> Vec<(usize, usize)> {
    let type_factor = match hydrology {
        HydrologyType::Springs => 4.0,
        HydrologyType::Arid => 0.25,
        HydrologyType::Seasonal => 0.5,
        _ => 1.0,
    };
    let probability = 0.04 * abundance * type_factor;
    let range = (topography.max_elevation - topography.min_elevation).max(f32::EPSILON);

    let mut springs = Vec::new();
    for (x, y, t) in topography.tiles.iter() {
        let percentile = (t.elevation - topography.min_elevation) / range;
        if percentile < 0.6 || geology.tile(x, y).permeability < 0.5 {
            continue;
        }
        if seeds.tile_unit(SeedLayer::HydrologySprings, x, y) < probability {
            springs.push((x, y));
        }
    }
    springs
}

/// Standing water in interior sinks, spilling into adjacent low ground.
fn fill_pools(
    elevation: &Tilemap<f32>,
    flow: &Tilemap<FlowDirection>,
    accumulation: &Tilemap<f32>,
    hydrology: HydrologyType,
    depth: &mut Tilemap<f32>,
    pools: &mut Tilemap<bool>,
) {
    let (min_accumulation, spill, max_tiles) = match hydrology {
        HydrologyType::Lake => (2.0, 2.0, 400),
        HydrologyType::Arid => (6.0, 0.3, 4),
        _ => (3.0, 0.6, 24),
    };
    let interior = |x: usize, y: usize| x > 0 && y > 0 && x + 1 < elevation.width && y + 1 < elevation.height;

    for (x, y) in descending_order(elevation).into_iter().rev() {
        if !flow.get(x, y).is_sink() || !interior(x, y) || *accumulation.get(x, y) < min_accumulation {
            continue;
        }
        let level = *elevation.get(x, y) + spill;
        let mut queue = VecDeque::from([(x, y)]);
        let mut visited = Tilemap::new_with(elevation.width, elevation.height, false);
        visited.set(x, y, true);
        let mut filled = 0;

        while let Some((cx, cy)) = queue.pop_front() {
            if filled >= max_tiles {
                break;
            }
            let h = *elevation.get(cx, cy);
            pools.set(cx, cy, true);
            let d = depth.get_mut(cx, cy);
            *d = d.max(level - h + 0.5);
            filled += 1;

            for (nx, ny) in elevation.neighbors(cx, cy) {
                if !*visited.get(nx, ny) && *elevation.get(nx, ny) < level {
                    visited.set(nx, ny, true);
                    queue.push_back((nx, ny));
                }
            }
        }
    }
}

/// Flat low ground holds shallow water in wetlands.
fn flood_marsh(topography: &TopographyLayerData, depth: &mut Tilemap<f32>, marsh: &mut Tilemap<bool>) {
    let range = (topography.max_elevation - topography.min_elevation).max(f32::EPSILON);
    for (x, y, t) in topography.tiles.iter() {
        let percentile = (t.elevation - topography.min_elevation) / range;
        if t.slope < 3.0 && percentile < 0.35 {
            marsh.set(x, y, true);
            let d = depth.get_mut(x, y);
            *d = d.max(0.5);
        }
    }
}

/// Sea occupies a band along the lowest map edge, deepening toward the edge.
fn flood_sea(elevation: &Tilemap<f32>, depth: &mut Tilemap<f32>, sea: &mut Tilemap<bool>) {
    let (w, h) = (elevation.width, elevation.height);
    let mean = |cells: &mut dyn Iterator<Item = (usize, usize)>| {
        let (sum, n) = cells.fold((0.0, 0.0), |(s, n), (x, y)| (s + *elevation.get(x, y), n + 1.0));
        sum / n
    };
    let edges = [
        mean(&mut (0..w).map(|x| (x, 0))),
        mean(&mut (0..h).map(|y| (w - 1, y))),
        mean(&mut (0..w).map(|x| (x, h - 1))),
        mean(&mut (0..h).map(|y| (0, y))),
    ];
    let lowest = (0..4).fold(0, |best, i| if edges[i] < edges[best] { i } else { best });

    let band = (w.min(h) / 8).max(2);
    for (x, y, d) in depth.iter_mut() {
        let distance = match lowest {
            0 => y,
            1 => w - 1 - x,
            2 => h - 1 - y,
            _ => x,
        };
        if distance < band {
            sea.set(x, y, true);
            *d = d.max(1.0 + (band - distance) as f32 * 1.5);
        }
    }
}

fn compute_moisture(
    ctx: &Context,
    depth: &Tilemap<f32>,
    accumulation: &Tilemap<f32>,
    abundance: f32,
) -> Tilemap<f32> {
    // Multi-source BFS distance (in tiles) to the nearest water
    let mut distance = Tilemap::new_with(depth.width, depth.height, u32::MAX);
    let mut queue = VecDeque::new();
    for (x, y, &d) in depth.iter() {
        if d > 0.0 {
            distance.set(x, y, 0);
            queue.push_back((x, y));
        }
    }
    while let Some((x, y)) = queue.pop_front() {
        let next = distance.get(x, y) + 1;
        for (nx, ny) in depth.neighbors_8(x, y) {
            if *distance.get(nx, ny) > next {
                distance.set(nx, ny, next);
                queue.push_back((nx, ny));
            }
        }
    }

    let climate = (ctx.biome().base_moisture() + ctx.season().moisture_shift()).clamp(0.0, 1.0);
    let wetness = abundance.min(1.5) / 1.5;

    distance.map(|x, y, &d| {
        if d == 0 {
            return 1.0;
        }
        let proximity = if d == u32::MAX { 0.0 } else { (-(d as f32) / 4.0).exp() };
        let catchment = (accumulation.get(x, y).ln() / 10.0).min(0.2);
        (climate * 0.6 + proximity * 0.35 * wetness + catchment).clamp(0.0, 1.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DimensionLimits, TopographyConfig};
    use crate::context::{Biome, DevelopmentLevel, ElevationZone, Season};
    use crate::seeds::Seed;
    use crate::{geology, topography};

    fn run(biome: Biome, hydrology: HydrologyType, seed: i64, abundance: f32) -> (TopographyLayerData, HydrologyLayerData) {
        let ctx = Context::new(biome, ElevationZone::Foothills, hydrology, DevelopmentLevel::Rural, Season::Spring)
            .unwrap();
        let seeds = LayeredSeed::new(Seed::from_number(seed).unwrap());
        let geo = geology::generate(48, 40, &ctx, &seeds, &DimensionLimits::default()).unwrap();
        let topo = topography::generate(&geo, &ctx, &seeds, &TopographyConfig::default()).unwrap();
        let hydro = generate(&topo, &geo, &ctx, &seeds, &HydrologyConfig { abundance }).unwrap();
        (topo, hydro)
    }

    fn ramp(w: usize, h: usize) -> Tilemap<f32> {
        // Slopes down toward the east
        Tilemap::from_fn(w, h, |x, y| 100.0 - x as f32 * 2.0 + (y as f32 - h as f32 / 2.0).abs() * 0.5)
    }

    #[test]
    fn test_target_stays_on_map() {
        assert_eq!(FlowDirection::North.target(3, 0, 5, 5), None);
        assert_eq!(FlowDirection::West.target(0, 2, 5, 5), None);
        assert_eq!(FlowDirection::SouthEast.target(4, 4, 5, 5), None);
        assert_eq!(FlowDirection::SouthEast.target(4, 2, 6, 5), Some((5, 3)));
        assert_eq!(FlowDirection::Sink.target(2, 2, 5, 5), None);
    }

    #[test]
    fn test_flow_goes_downhill() {
        let (topo, hydro) = run(Biome::Forest, HydrologyType::Stream, 17, 1.0);
        for (x, y, t) in hydro.tiles.iter() {
            if let Some((nx, ny)) = t.flow_direction.target(x, y, hydro.width, hydro.height) {
                assert!(topo.elevation(nx, ny) <= topo.elevation(x, y) + 0.1);
            }
        }
    }

    #[test]
    fn test_ramp_flows_east() {
        let elevation = ramp(10, 7);
        let flow = compute_flow_directions(&elevation);
        assert_eq!(*flow.get(3, 3), FlowDirection::East);
        // East edge has no lower neighbour on the map
        assert!(flow.get(9, 3).is_sink());
    }

    #[test]
    fn test_accumulation_conserves_area() {
        let elevation = ramp(12, 9);
        let flow = compute_flow_directions(&elevation);
        let acc = compute_flow_accumulation(&elevation, &flow);
        let at_sinks: f32 = acc
            .iter()
            .filter(|(x, y, _)| flow.get(*x, *y).is_sink())
            .map(|(_, _, a)| *a)
            .sum();
        assert_eq!(at_sinks, (12 * 9) as f32);
    }

    #[test]
    fn test_strahler_confluence() {
        // Two headwater streams meeting at (2, 2) and draining south
        //   (0,0)->(1,1)->(2,2)<-(3,1)<-(4,0), then (2,2)->(2,3)->(2,4)
        let elevation = Tilemap::from_fn(5, 5, |x, y| {
            let dx = (x as f32 - 2.0).abs();
            50.0 - y as f32 * 5.0 + dx * 4.0
        });
        let flow = compute_flow_directions(&elevation);
        let mut mask = Tilemap::new_with(5, 5, false);
        for (x, y) in [(0, 0), (1, 1), (4, 0), (3, 1), (2, 2), (2, 3), (2, 4)] {
            mask.set(x, y, true);
        }
        assert_eq!(flow.get(1, 1).target(1, 1, 5, 5), Some((2, 2)));
        assert_eq!(flow.get(3, 1).target(3, 1, 5, 5), Some((2, 2)));

        let orders = compute_strahler_orders(&elevation, &flow, &mask);
        assert_eq!(*orders.get(0, 0), 1);
        assert_eq!(*orders.get(1, 1), 1);
        assert_eq!(*orders.get(2, 2), 2);
        assert_eq!(*orders.get(2, 4), 2);
        assert_eq!(*orders.get(4, 4), 0);
    }

    #[test]
    fn test_stream_order_bounds() {
        let (_, hydro) = run(Biome::Forest, HydrologyType::River, 5, 2.0);
        for (_, _, t) in hydro.tiles.iter() {
            assert!(t.stream_order <= MAX_STREAM_ORDER);
            assert_eq!(t.is_stream, t.stream_order > 0);
        }
        for s in &hydro.streams {
            assert!(!s.tiles.is_empty());
            assert_eq!(s.tiles[0], s.source);
            assert_eq!(*s.tiles.last().unwrap(), s.mouth);
        }
    }

    #[test]
    fn test_segments_partition_stream_tiles() {
        let (_, hydro) = run(Biome::Grassland, HydrologyType::River, 44, 2.5);
        let stream_tiles = hydro.tiles.iter().filter(|(_, _, t)| t.is_stream).count();
        let segment_tiles: usize = hydro.streams.iter().map(|s| s.tiles.len()).sum();
        assert_eq!(stream_tiles, segment_tiles);
    }

    #[test]
    fn test_zero_abundance_has_no_streams_or_springs() {
        let (_, hydro) = run(Biome::Forest, HydrologyType::Springs, 9, 0.0);
        assert_eq!(hydro.stream_count(), 0);
        assert!(hydro.springs.is_empty());
    }

    #[test]
    fn test_coastal_has_sea() {
        let (_, hydro) = run(Biome::Coastal, HydrologyType::Coastal, 13, 1.0);
        let sea = hydro.tiles.iter().filter(|(_, _, t)| t.is_sea).count();
        assert!(sea >= 48 * 2.min(40));
        for (_, _, t) in hydro.tiles.iter().filter(|(_, _, t)| t.is_sea) {
            assert!(t.water_depth >= 1.0);
            assert_eq!(t.moisture_class, MoistureClass::Saturated);
        }
    }

    #[test]
    fn test_moisture_in_range() {
        let (_, hydro) = run(Biome::Swamp, HydrologyType::Wetland, 2, 1.0);
        for (_, _, t) in hydro.tiles.iter() {
            assert!((0.0..=1.0).contains(&t.moisture));
            assert_eq!(t.moisture_class, MoistureClass::from_moisture(t.moisture));
        }
    }

    #[test]
    fn test_threshold_scales_with_abundance() {
        let dry = stream_threshold(1600, HydrologyType::Stream, 0.5);
        let wet = stream_threshold(1600, HydrologyType::Stream, 2.0);
        assert!(wet < dry);
        assert!(stream_threshold(1600, HydrologyType::Stream, 0.0).is_infinite());
    }
}
