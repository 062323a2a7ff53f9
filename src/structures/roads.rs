//! Road network between buildings, and bridges where roads cross water.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::context::DevelopmentLevel;
use crate::noise_field::NoiseGenerator;
use crate::tilemap::{Tilemap, NEIGHBORS_8};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoadClass {
    /// Trodden dirt
    Path,
    /// Graded cart road
    Road,
    /// Paved street
    Street,
}

impl RoadClass {
    pub fn for_level(level: DevelopmentLevel) -> Self {
        match level {
            DevelopmentLevel::Urban => RoadClass::Street,
            DevelopmentLevel::Settled => RoadClass::Road,
            _ => RoadClass::Path,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeMaterial {
    Wood,
    Stone,
    Rope,
}

/// Road between two buildings, by building id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub from: usize,
    pub to: usize,
    pub class: RoadClass,
    pub tiles: Vec<(usize, usize)>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bridge {
    /// Wet tiles spanned, in road order
    pub tiles: Vec<(usize, usize)>,
    /// Dry landing on either bank
    pub start: (usize, usize),
    pub end: (usize, usize),
    pub material: BridgeMaterial,
}

impl Bridge {
    pub fn span(&self) -> usize {
        self.tiles.len()
    }
}

fn chebyshev(a: (usize, usize), b: (usize, usize)) -> usize {
    a.0.abs_diff(b.0).max(a.1.abs_diff(b.1))
}

fn squared(a: (usize, usize), b: (usize, usize)) -> usize {
    let dx = a.0.abs_diff(b.0);
    let dy = a.1.abs_diff(b.1);
    dx * dx + dy * dy
}

/// Greedy spanning tree: repeatedly join the closest unconnected point to
/// the connected set. Returns (connected, newly joined) index pairs.
pub fn spanning_edges(points: &[(usize, usize)]) -> Vec<(usize, usize)> {
    if points.len() < 2 {
        return Vec::new();
    }
    let mut connected = vec![false; points.len()];
    let mut edges = Vec::with_capacity(points.len() - 1);
    // Min-heap of (squared distance, from, to)
    let mut heap = BinaryHeap::new();

    connected[0] = true;
    for j in 1..points.len() {
        heap.push(Reverse((squared(points[0], points[j]), 0, j)));
    }

    while let Some(Reverse((_, from, to))) = heap.pop() {
        if connected[to] {
            continue;
        }
        connected[to] = true;
        edges.push((from, to));
        for j in 0..points.len() {
            if !connected[j] {
                heap.push(Reverse((squared(points[to], points[j]), to, j)));
            }
        }
    }

    edges
}

/// Perpendicular distance (squared, unnormalised) from `p` to the line a-b.
fn line_offset(p: (usize, usize), a: (usize, usize), b: (usize, usize)) -> i64 {
    let (px, py) = (p.0 as i64, p.1 as i64);
    let (ax, ay) = (a.0 as i64, a.1 as i64);
    let (bx, by) = (b.0 as i64, b.1 as i64);
    ((bx - ax) * (py - ay) - (by - ay) * (px - ax)).abs()
}

/// Walk from `start` to `end`, each step strictly closing the Chebyshev
/// distance. Dry, unblocked steps are preferred; among those the one
/// nearest the straight line wins.
pub fn trace_path(
    start: (usize, usize),
    end: (usize, usize),
    wet: &Tilemap<bool>,
    blocked: &Tilemap<bool>,
) -> Vec<(usize, usize)> {
    let mut path = vec![start];
    let mut current = start;

    while current != end {
        let remaining = chebyshev(current, end);
        let next = NEIGHBORS_8
            .iter()
            .filter_map(|&(dx, dy)| {
                let (nx, ny) = (current.0 as i32 + dx, current.1 as i32 + dy);
                wet.in_bounds(nx, ny).then_some((nx as usize, ny as usize))
            })
            .filter(|&n| chebyshev(n, end) < remaining)
            .min_by_key(|&n| {
                let obstructed = n != end && *blocked.get(n.0, n.1);
                (obstructed, *wet.get(n.0, n.1), line_offset(n, start, end), squared(n, end))
            });

        // A closer neighbour always exists while current != end
        let Some(next) = next else { break };
        path.push(next);
        current = next;
    }

    path
}

/// Connect every building approach with roads.
pub fn connect(
    approaches: &[(usize, usize)],
    class: RoadClass,
    wet: &Tilemap<bool>,
    blocked: &Tilemap<bool>,
) -> Vec<RoadSegment> {
    spanning_edges(approaches)
        .into_iter()
        .map(|(from, to)| RoadSegment {
            from,
            to,
            class,
            tiles: trace_path(approaches[from], approaches[to], wet, blocked),
        })
        .collect()
}

fn bridge_material(noise: &NoiseGenerator, tiles: &[(usize, usize)]) -> BridgeMaterial {
    let (mx, my) = tiles[tiles.len() / 2];
    let n = noise.generate_at(mx as f64, my as f64);
    if tiles.len() > 4 {
        // Long spans are stone or hung on ropes
        if n < 0.5 {
            BridgeMaterial::Stone
        } else {
            BridgeMaterial::Rope
        }
    } else if n < 0.5 {
        BridgeMaterial::Wood
    } else if n < 0.8 {
        BridgeMaterial::Stone
    } else {
        BridgeMaterial::Rope
    }
}

/// Emit a bridge for every dry-wet-dry crossing along the roads.
///
/// Crossings shared by several segments produce one bridge.
pub fn find_bridges(segments: &[RoadSegment], wet: &Tilemap<bool>, noise: &NoiseGenerator) -> Vec<Bridge> {
    let mut seen: BTreeSet<Vec<(usize, usize)>> = BTreeSet::new();
    let mut bridges = Vec::new();

    for segment in segments {
        let tiles = &segment.tiles;
        let mut i = 0;
        while i < tiles.len() {
            if !*wet.get(tiles[i].0, tiles[i].1) {
                i += 1;
                continue;
            }
            let run_start = i;
            while i < tiles.len() && *wet.get(tiles[i].0, tiles[i].1) {
                i += 1;
            }
            // Needs dry ground on both banks
            if run_start == 0 || i == tiles.len() {
                continue;
            }
            let span: Vec<(usize, usize)> = tiles[run_start..i].to_vec();
            let mut key = span.clone();
            key.sort_unstable();
            if !seen.insert(key) {
                continue;
            }
            bridges.push(Bridge {
                material: bridge_material(noise, &span),
                start: tiles[run_start - 1],
                end: tiles[i],
                tiles: span,
            });
        }
    }

    bridges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::Seed;

    #[test]
    fn test_spanning_edges_connect_all() {
        let points = [(0, 0), (10, 0), (11, 1), (30, 30), (2, 2)];
        let edges = spanning_edges(&points);
        assert_eq!(edges.len(), points.len() - 1);
        let mut reached = vec![false; points.len()];
        reached[0] = true;
        for (from, to) in &edges {
            assert!(reached[*from], "edge from unconnected point");
            reached[*to] = true;
        }
        assert!(reached.iter().all(|&r| r));
        // Nearest neighbour is joined first
        assert_eq!(edges[0], (0, 4));
    }

    #[test]
    fn test_path_reaches_end() {
        let wet = Tilemap::new_with(20, 20, false);
        let blocked = Tilemap::new_with(20, 20, false);
        let path = trace_path((1, 1), (15, 7), &wet, &blocked);
        assert_eq!(path.first(), Some(&(1, 1)));
        assert_eq!(path.last(), Some(&(15, 7)));
        assert_eq!(path.len(), 15);
        for pair in path.windows(2) {
            assert_eq!(chebyshev(pair[0], pair[1]), 1);
        }
    }

    #[test]
    fn test_path_avoids_pond_when_possible() {
        let mut wet = Tilemap::new_with(20, 20, false);
        wet.set(5, 5, true);
        let blocked = Tilemap::new_with(20, 20, false);
        let path = trace_path((0, 5), (10, 5), &wet, &blocked);
        assert!(!path.contains(&(5, 5)));
    }

    #[test]
    fn test_river_crossing_makes_bridge() {
        // River running north-south at x = 6..=7
        let wet = Tilemap::from_fn(16, 10, |x, _| x == 6 || x == 7);
        let blocked = Tilemap::new_with(16, 10, false);
        let segments = connect(&[(1, 4), (12, 4)], RoadClass::Road, &wet, &blocked);
        assert_eq!(segments.len(), 1);

        let noise = NoiseGenerator::new(Seed::from_number(3).unwrap());
        let bridges = find_bridges(&segments, &wet, &noise);
        assert_eq!(bridges.len(), 1);
        let bridge = &bridges[0];
        assert_eq!(bridge.span(), 2);
        assert!(bridge.tiles.iter().all(|&(x, y)| *wet.get(x, y)));
        assert!(!*wet.get(bridge.start.0, bridge.start.1));
        assert!(!*wet.get(bridge.end.0, bridge.end.1));
    }

    #[test]
    fn test_no_bridge_without_both_banks() {
        let wet = Tilemap::from_fn(10, 3, |x, _| x >= 5);
        let segment = RoadSegment {
            from: 0,
            to: 1,
            class: RoadClass::Path,
            tiles: (2..10).map(|x| (x, 1)).collect(),
        };
        let noise = NoiseGenerator::new(Seed::from_number(3).unwrap());
        assert!(find_bridges(&[segment], &wet, &noise).is_empty());
    }
}
