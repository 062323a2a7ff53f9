//! Small standalone structures: wells, shrines and signposts.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tilemap::Tilemap;
use crate::vegetation::Clearing;

use super::buildings::Building;
use super::roads::RoadSegment;

const MAX_SHRINES: usize = 2;
const MAX_SIGNPOSTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecorationKind {
    Well,
    Shrine,
    Signpost,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decoration {
    pub kind: DecorationKind,
    pub x: usize,
    pub y: usize,
}

/// Wells a short walk from buildings.
///
/// `free` marks tiles that are dry, open and not yet used; taken tiles are cleared.
pub fn place_wells(
    buildings: &[Building],
    chance: f64,
    free: &mut Tilemap<bool>,
    rng: &mut impl Rng,
) -> Vec<Decoration> {
    let limit = (buildings.len() / 3).max(1);
    let mut wells = Vec::new();

    for building in buildings {
        if wells.len() >= limit {
            break;
        }
        if !rng.gen_bool(chance) {
            continue;
        }
        let (cx, cy) = building.center();
        let reach = (building.width.max(building.height) / 2 + 3) as i32;
        let spot = ring(cx, cy, reach).find(|&(x, y)| free.get_checked(x, y) == Some(&true));
        if let Some((x, y)) = spot {
            let (x, y) = (x as usize, y as usize);
            free.set(x, y, false);
            wells.push(Decoration {
                kind: DecorationKind::Well,
                x,
                y,
            });
        }
    }
    wells
}

/// Square ring of tiles at Chebyshev distance `r`, clockwise from the top-left.
fn ring(cx: usize, cy: usize, r: i32) -> impl Iterator<Item = (i32, i32)> {
    let (cx, cy) = (cx as i32, cy as i32);
    let top = (-r..=r).map(move |d| (cx + d, cy - r));
    let right = (-r + 1..=r).map(move |d| (cx + r, cy + d));
    let bottom = (-r..r).rev().map(move |d| (cx + d, cy + r));
    let left = (-r + 1..r).rev().map(move |d| (cx - r, cy + d));
    top.chain(right).chain(bottom).chain(left)
}

/// Shrines at clearing centres.
pub fn place_shrines(clearings: &[Clearing], free: &mut Tilemap<bool>, rng: &mut impl Rng) -> Vec<Decoration> {
    let mut shrines = Vec::new();
    for clearing in clearings {
        if shrines.len() >= MAX_SHRINES {
            break;
        }
        let roll = rng.gen_bool(0.5);
        if !roll || !*free.get(clearing.x, clearing.y) {
            continue;
        }
        free.set(clearing.x, clearing.y, false);
        shrines.push(Decoration {
            kind: DecorationKind::Shrine,
            x: clearing.x,
            y: clearing.y,
        });
    }
    shrines
}

/// Signposts beside tiles where three or more road directions meet.
pub fn place_signposts(segments: &[RoadSegment], road: &Tilemap<bool>, free: &mut Tilemap<bool>) -> Vec<Decoration> {
    let mut posts = Vec::new();
    let mut visited = Tilemap::new_with(road.width, road.height, false);

    for segment in segments {
        for &(x, y) in &segment.tiles {
            if posts.len() >= MAX_SIGNPOSTS {
                return posts;
            }
            if *visited.get(x, y) {
                continue;
            }
            visited.set(x, y, true);

            let branches = road.neighbors(x, y).filter(|&(nx, ny)| *road.get(nx, ny)).count();
            if branches < 3 {
                continue;
            }
            let spot = road.neighbors_8(x, y).find(|&(nx, ny)| *free.get(nx, ny));
            if let Some((sx, sy)) = spot {
                free.set(sx, sy, false);
                posts.push(Decoration {
                    kind: DecorationKind::Signpost,
                    x: sx,
                    y: sy,
                });
            }
        }
    }
    posts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::buildings::{BuildingType, Condition, Material};
    use crate::structures::roads::RoadClass;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cabin(x: usize, y: usize) -> Building {
        Building {
            id: 0,
            building_type: BuildingType::Cabin,
            x,
            y,
            width: 3,
            height: 3,
            material: Material::Wood,
            condition: Condition::Good,
            entrance: (x + 1, y + 2),
            approach: (x + 1, y + 3),
        }
    }

    #[test]
    fn test_ring_size() {
        assert_eq!(ring(10, 10, 1).count(), 8);
        assert_eq!(ring(10, 10, 3).count(), 24);
        assert!(ring(10, 10, 2).all(|(x, y)| (x - 10).abs().max((y - 10).abs()) == 2));
    }

    #[test]
    fn test_well_lands_on_free_tile() {
        let mut free = Tilemap::new_with(20, 20, true);
        let wells = place_wells(&[cabin(8, 8)], 1.0, &mut free, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(wells.len(), 1);
        let w = wells[0];
        assert!(!*free.get(w.x, w.y));
        assert!(!cabin(8, 8).contains(w.x, w.y));
    }

    #[test]
    fn test_signpost_at_crossroads() {
        let mut road = Tilemap::new_with(9, 9, false);
        let mut tiles = Vec::new();
        for i in 0..9 {
            road.set(i, 4, true);
            road.set(4, i, true);
            tiles.push((i, 4));
        }
        let segment = RoadSegment {
            from: 0,
            to: 1,
            class: RoadClass::Path,
            tiles,
        };
        let mut free = road.map(|_, _, &r| !r);
        let posts = place_signposts(&[segment], &road, &mut free);
        assert_eq!(posts.len(), 1);
        let p = posts[0];
        assert!(p.x.abs_diff(4) <= 1 && p.y.abs_diff(4) <= 1);
        assert!(!*road.get(p.x, p.y));
    }
}
