//! Clearing detection inside forest cover.

use serde::{Deserialize, Serialize};

use crate::tilemap::Tilemap;

/// Inner radius of the ring that must be forested around a candidate.
const RING_RADIUS: i32 = 2;
const MIN_RING_FORESTED: usize = 5;
const MAX_RADIUS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clearing {
    pub x: usize,
    pub y: usize,
    /// Largest radius (tiles) whose disc holds no tree
    pub radius: usize,
}

impl Clearing {
    pub fn contains(&self, x: usize, y: usize) -> bool {
        within(self.x, self.y, x, y, self.radius)
    }
}

fn within(cx: usize, cy: usize, x: usize, y: usize, radius: usize) -> bool {
    let dx = cx as i64 - x as i64;
    let dy = cy as i64 - y as i64;
    dx * dx + dy * dy <= (radius * radius) as i64
}

/// Forested tiles at Chebyshev distance exactly `RING_RADIUS` from the centre.
fn ring_forested(forest: &Tilemap<bool>, x: usize, y: usize) -> usize {
    let mut count = 0;
    for dy in -RING_RADIUS..=RING_RADIUS {
        for dx in -RING_RADIUS..=RING_RADIUS {
            if dx.abs() <= 1 && dy.abs() <= 1 {
                continue;
            }
            if forest.get_checked(x as i32 + dx, y as i32 + dy) == Some(&true) {
                count += 1;
            }
        }
    }
    count
}

fn disc_has_tree(trees: &Tilemap<bool>, cx: usize, cy: usize, radius: usize) -> bool {
    let r = radius as i32;
    for dy in -r..=r {
        for dx in -r..=r {
            let (x, y) = (cx as i32 + dx, cy as i32 + dy);
            if !trees.in_bounds(x, y) || !within(cx, cy, x as usize, y as usize, radius) {
                continue;
            }
            if *trees.get(x as usize, y as usize) {
                return true;
            }
        }
    }
    false
}

/// Find clearings: open, growable tiles ringed by forest, grown outward
/// until the disc would touch a tree trunk.
///
/// `open` marks candidate centres (unforested land), `forest` the relaxed
/// forest mask and `trees` the tiles that carry at least one trunk.
pub fn find_clearings(open: &Tilemap<bool>, forest: &Tilemap<bool>, trees: &Tilemap<bool>) -> Vec<Clearing> {
    let mut clearings: Vec<Clearing> = Vec::new();

    for (x, y, &is_open) in open.iter() {
        if !is_open || clearings.iter().any(|c| c.contains(x, y)) {
            continue;
        }
        if ring_forested(forest, x, y) < MIN_RING_FORESTED {
            continue;
        }

        let mut radius = 0;
        while radius < MAX_RADIUS && !disc_has_tree(trees, x, y, radius + 1) {
            radius += 1;
        }
        if radius >= 1 {
            clearings.push(Clearing { x, y, radius });
        }
    }

    clearings
}
