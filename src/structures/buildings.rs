//! Building types, footprint tables and greedy placement.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::context::{Biome, DevelopmentLevel};

use super::sites::Site;

/// Hard ceiling on buildings per map.
pub const MAX_BUILDINGS: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingType {
    Cabin,
    Farmhouse,
    Barn,
    House,
    Shop,
    Tavern,
    Smithy,
    Temple,
    Warehouse,
    Manor,
    Tower,
    Watchpost,
}

impl BuildingType {
    /// Footprint (width, height) in tiles.
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            BuildingType::Watchpost => (2, 2),
            BuildingType::Cabin | BuildingType::Shop | BuildingType::Tower => (3, 3),
            BuildingType::House => (3, 4),
            BuildingType::Farmhouse | BuildingType::Smithy => (4, 3),
            BuildingType::Barn | BuildingType::Tavern => (5, 4),
            BuildingType::Temple => (5, 6),
            BuildingType::Warehouse => (6, 4),
            BuildingType::Manor => (6, 5),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuildingType::Cabin => "Cabin",
            BuildingType::Farmhouse => "Farmhouse",
            BuildingType::Barn => "Barn",
            BuildingType::House => "House",
            BuildingType::Shop => "Shop",
            BuildingType::Tavern => "Tavern",
            BuildingType::Smithy => "Smithy",
            BuildingType::Temple => "Temple",
            BuildingType::Warehouse => "Warehouse",
            BuildingType::Manor => "Manor",
            BuildingType::Tower => "Tower",
            BuildingType::Watchpost => "Watchpost",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Wood,
    Thatch,
    Stone,
    Brick,
    Adobe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Condition {
    Pristine,
    Good,
    Worn,
    Dilapidated,
    Ruined,
}

/// Weighted building types for a development level.
pub fn building_table(level: DevelopmentLevel) -> &'static [(BuildingType, f32)] {
    use BuildingType::*;
    match level {
        DevelopmentLevel::Wilderness => &[],
        DevelopmentLevel::Frontier => &[(Cabin, 4.0), (Watchpost, 2.0), (Barn, 1.0)],
        DevelopmentLevel::Rural => &[(Farmhouse, 4.0), (Barn, 3.0), (Cabin, 2.0), (Smithy, 1.0)],
        DevelopmentLevel::Settled => &[
            (House, 5.0),
            (Shop, 2.0),
            (Barn, 1.0),
            (Tavern, 1.0),
            (Smithy, 1.0),
            (Temple, 0.5),
        ],
        DevelopmentLevel::Urban => &[
            (House, 5.0),
            (Shop, 3.0),
            (Warehouse, 2.0),
            (Tavern, 1.5),
            (Temple, 1.0),
            (Manor, 0.5),
            (Tower, 0.5),
        ],
    }
}

/// Inclusive building count range before area scaling.
pub fn count_range(level: DevelopmentLevel) -> (usize, usize) {
    match level {
        DevelopmentLevel::Wilderness => (0, 0),
        DevelopmentLevel::Frontier => (1, 2),
        DevelopmentLevel::Rural => (2, 5),
        DevelopmentLevel::Settled => (4, 9),
        DevelopmentLevel::Urban => (8, 15),
    }
}

/// Minimum empty tiles between two footprints.
pub fn spacing(level: DevelopmentLevel) -> usize {
    match level {
        DevelopmentLevel::Wilderness => 0,
        DevelopmentLevel::Frontier => 8,
        DevelopmentLevel::Rural => 6,
        DevelopmentLevel::Settled => 3,
        DevelopmentLevel::Urban => 1,
    }
}

/// Building count for a map, scaled by area relative to a 40x40 map.
pub fn building_count(level: DevelopmentLevel, width: usize, height: usize, rng: &mut impl Rng) -> usize {
    let (min, max) = count_range(level);
    if max == 0 {
        return 0;
    }
    let base = rng.gen_range(min..=max) as f32;
    let scale = ((width * height) as f32 / 1600.0).sqrt().clamp(0.5, 1.5);
    ((base * scale).round() as usize).clamp(1, MAX_BUILDINGS)
}

fn material(biome: Biome, level: DevelopmentLevel, rng: &mut impl Rng) -> Material {
    use Material::*;
    let mut table: Vec<(Material, f32)> = match biome {
        Biome::Desert => vec![(Adobe, 3.0), (Stone, 1.0)],
        Biome::Mountain | Biome::Tundra | Biome::Underground => vec![(Stone, 3.0), (Wood, 1.0)],
        Biome::Forest | Biome::Jungle | Biome::Swamp => vec![(Wood, 3.0), (Thatch, 1.0), (Stone, 0.5)],
        Biome::Grassland | Biome::Coastal => vec![(Wood, 2.0), (Thatch, 1.5), (Stone, 1.0)],
    };
    if level >= DevelopmentLevel::Settled {
        table.push((Stone, 2.0));
        table.push((Brick, if level == DevelopmentLevel::Urban { 2.0 } else { 0.5 }));
    }
    table.choose_weighted(rng, |(_, w)| *w).map(|(m, _)| *m).unwrap_or(Wood)
}

fn condition(level: DevelopmentLevel, rng: &mut impl Rng) -> Condition {
    use Condition::*;
    let table: &[(Condition, f32)] = match level {
        DevelopmentLevel::Wilderness | DevelopmentLevel::Frontier => {
            &[(Good, 1.0), (Worn, 2.0), (Dilapidated, 1.0), (Ruined, 0.3)]
        }
        DevelopmentLevel::Rural => &[(Good, 2.0), (Worn, 2.0), (Dilapidated, 0.5)],
        DevelopmentLevel::Settled | DevelopmentLevel::Urban => &[(Pristine, 1.0), (Good, 3.0), (Worn, 1.0)],
    };
    table.choose_weighted(rng, |(_, w)| *w).map(|(c, _)| *c).unwrap_or(Good)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: usize,
    pub building_type: BuildingType,
    /// Top-left corner of the footprint
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub material: Material,
    pub condition: Condition,
    /// Door tile on the footprint perimeter
    pub entrance: (usize, usize),
    /// Open tile just outside the door where roads arrive
    pub approach: (usize, usize),
}

impl Building {
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    pub fn is_perimeter(&self, x: usize, y: usize) -> bool {
        self.contains(x, y)
            && (x == self.x || y == self.y || x == self.x + self.width - 1 || y == self.y + self.height - 1)
    }

    pub fn tiles(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.y..self.y + self.height).flat_map(move |y| (self.x..self.x + self.width).map(move |x| (x, y)))
    }

    pub fn center(&self) -> (usize, usize) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Empty tiles between two footprints along the wider axis gap.
    pub fn gap_to(&self, other: &Building) -> usize {
        gap(self.x, self.width, other.x, other.width).max(gap(self.y, self.height, other.y, other.height))
    }
}

fn gap(a: usize, a_len: usize, b: usize, b_len: usize) -> usize {
    if a + a_len <= b {
        b - (a + a_len)
    } else if b + b_len <= a {
        a - (b + b_len)
    } else {
        0
    }
}

fn overlaps(a: &Building, b: &Building) -> bool {
    a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
}

/// Door and approach on the side of the footprint facing `toward`.
fn entrance_facing(x: usize, y: usize, w: usize, h: usize, toward: (usize, usize)) -> ((usize, usize), (usize, usize)) {
    let (cx, cy) = (x + w / 2, y + h / 2);
    let dx = toward.0 as i64 - cx as i64;
    let dy = toward.1 as i64 - cy as i64;
    if dx.abs() >= dy.abs() && dx != 0 {
        if dx > 0 {
            ((x + w - 1, cy), (x + w, cy))
        } else {
            ((x, cy), (x.saturating_sub(1), cy))
        }
    } else if dy < 0 {
        ((cx, y), (cx, y.saturating_sub(1)))
    } else {
        ((cx, y + h - 1), (cx, y + h))
    }
}

/// Greedily place buildings at the best sites that fit.
///
/// `buildable(x, y)` reports whether a tile may carry a footprint; the
/// approach tile outside the door must be buildable too.
pub fn place_buildings(
    sites: &[Site],
    count: usize,
    level: DevelopmentLevel,
    biome: Biome,
    map: (usize, usize),
    buildable: impl Fn(usize, usize) -> bool,
    rng: &mut impl Rng,
) -> Vec<Building> {
    let table = building_table(level);
    let min_gap = spacing(level);
    let center = (map.0 / 2, map.1 / 2);
    let mut placed: Vec<Building> = Vec::new();

    for site in sites {
        if placed.len() >= count {
            break;
        }
        let Some(&(building_type, _)) = table.choose_weighted(rng, |(_, w)| *w).ok() else {
            break;
        };
        let (w, h) = building_type.dimensions();
        if site.x < w / 2 + 1 || site.y < h / 2 + 1 {
            continue;
        }
        let (x, y) = (site.x - w / 2, site.y - h / 2);
        // Keep a one-tile margin so every door has an approach on the map
        if x + w + 1 > map.0 || y + h + 1 > map.1 {
            continue;
        }

        let (entrance, approach) = entrance_facing(x, y, w, h, center);
        let candidate = Building {
            id: placed.len(),
            building_type,
            x,
            y,
            width: w,
            height: h,
            material: Material::Wood,
            condition: Condition::Good,
            entrance,
            approach,
        };

        let fits = candidate.tiles().all(|(tx, ty)| buildable(tx, ty)) && buildable(approach.0, approach.1);
        let clear = placed
            .iter()
            .all(|b| !overlaps(b, &candidate) && b.gap_to(&candidate) >= min_gap && !b.contains(approach.0, approach.1));
        if !fits || !clear {
            continue;
        }

        placed.push(Building {
            material: material(biome, level, rng),
            condition: condition(level, rng),
            ..candidate
        });
    }

    placed
}
