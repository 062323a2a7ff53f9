//! Plant types, species tables and forestry constants.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::context::Biome;
use crate::hydrology::MoistureClass;

/// Square feet of ground in one acre divided by one 5 ft tile.
pub const TILES_PER_ACRE: f32 = 43_560.0 / 25.0;

/// Basal area (sq ft) of a stem is this constant times DBH (inches) squared.
pub const BASAL_AREA_FACTOR: f32 = 0.005454;

/// Cross-sectional trunk area at breast height, in square feet.
pub fn basal_area(dbh_inches: f32) -> f32 {
    BASAL_AREA_FACTOR * dbh_inches * dbh_inches
}

/// Target stand basal area in sq ft per acre.
pub fn target_basal_area(biome: Biome) -> f32 {
    match biome {
        Biome::Forest => 150.0,
        Biome::Jungle => 250.0,
        Biome::Swamp => 110.0,
        Biome::Mountain => 120.0,
        Biome::Coastal => 80.0,
        Biome::Tundra => 25.0,
        Biome::Grassland => 30.0,
        Biome::Desert => 8.0,
        Biome::Underground => 0.0,
    }
}

/// Mean stem diameter at breast height, in inches.
pub fn average_dbh(biome: Biome) -> f32 {
    match biome {
        Biome::Forest => 12.0,
        Biome::Jungle => 14.0,
        Biome::Swamp => 11.0,
        Biome::Mountain => 10.0,
        Biome::Coastal => 10.0,
        Biome::Tundra => 5.0,
        Biome::Grassland => 10.0,
        Biome::Desert => 8.0,
        Biome::Underground => 8.0,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafType {
    Deciduous,
    Coniferous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Species {
    Oak,
    Maple,
    Birch,
    Beech,
    Ash,
    Willow,
    Alder,
    Pine,
    Spruce,
    Fir,
    Larch,
    Cedar,
    Cypress,
    Juniper,
    DwarfBirch,
    Mangrove,
    Palm,
    Kapok,
    Mahogany,
    Mesquite,
}

impl Species {
    pub fn leaf_type(&self) -> LeafType {
        match self {
            Species::Pine
            | Species::Spruce
            | Species::Fir
            | Species::Larch
            | Species::Cedar
            | Species::Cypress
            | Species::Juniper => LeafType::Coniferous,
            _ => LeafType::Deciduous,
        }
    }

    /// Height (ft) of a mature specimen.
    pub fn max_height(&self) -> f32 {
        match self {
            Species::Kapok => 150.0,
            Species::Mahogany => 120.0,
            Species::Spruce | Species::Fir | Species::Pine => 100.0,
            Species::Oak | Species::Beech | Species::Ash | Species::Cypress => 90.0,
            Species::Maple | Species::Larch | Species::Cedar => 80.0,
            Species::Birch | Species::Alder | Species::Palm => 60.0,
            Species::Willow | Species::Mangrove => 45.0,
            Species::Juniper | Species::Mesquite => 25.0,
            Species::DwarfBirch => 8.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Species::Oak => "Oak",
            Species::Maple => "Maple",
            Species::Birch => "Birch",
            Species::Beech => "Beech",
            Species::Ash => "Ash",
            Species::Willow => "Willow",
            Species::Alder => "Alder",
            Species::Pine => "Pine",
            Species::Spruce => "Spruce",
            Species::Fir => "Fir",
            Species::Larch => "Larch",
            Species::Cedar => "Cedar",
            Species::Cypress => "Cypress",
            Species::Juniper => "Juniper",
            Species::DwarfBirch => "Dwarf Birch",
            Species::Mangrove => "Mangrove",
            Species::Palm => "Palm",
            Species::Kapok => "Kapok",
            Species::Mahogany => "Mahogany",
            Species::Mesquite => "Mesquite",
        }
    }
}

/// Weighted species candidates for a biome under local moisture.
pub fn species_table(biome: Biome, moisture: MoistureClass) -> &'static [(Species, f32)] {
    use MoistureClass::*;
    use Species::*;
    match (biome, moisture) {
        (Biome::Forest, Arid | Dry) => &[(Oak, 3.0), (Pine, 2.0), (Birch, 1.0)],
        (Biome::Forest, Moist) => &[(Oak, 3.0), (Maple, 3.0), (Beech, 2.0), (Pine, 1.0)],
        (Biome::Forest, Wet | Saturated) => &[(Alder, 3.0), (Willow, 2.0), (Ash, 2.0)],
        (Biome::Mountain, Wet | Saturated) => &[(Spruce, 3.0), (Fir, 2.0), (Alder, 2.0)],
        (Biome::Mountain, _) => &[(Spruce, 3.0), (Fir, 3.0), (Pine, 2.0), (Larch, 1.0)],
        (Biome::Tundra, _) => &[(DwarfBirch, 3.0), (Spruce, 2.0), (Larch, 1.0)],
        (Biome::Jungle, Saturated) => &[(Mangrove, 3.0), (Palm, 1.0)],
        (Biome::Jungle, _) => &[(Mahogany, 3.0), (Kapok, 2.0), (Palm, 2.0)],
        (Biome::Swamp, _) => &[(Cypress, 4.0), (Willow, 2.0), (Alder, 2.0)],
        (Biome::Coastal, _) => &[(Pine, 3.0), (Cedar, 2.0), (Oak, 2.0)],
        (Biome::Grassland, Wet | Saturated) => &[(Willow, 2.0), (Ash, 2.0)],
        (Biome::Grassland, _) => &[(Oak, 3.0), (Ash, 2.0), (Birch, 1.0)],
        (Biome::Desert, _) => &[(Mesquite, 3.0), (Juniper, 2.0), (Palm, 1.0)],
        (Biome::Underground, _) => &[],
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub species: Species,
    /// Diameter at breast height, inches
    pub dbh: f32,
    /// Feet
    pub height: f32,
    /// Feet
    pub crown_radius: f32,
}

impl Tree {
    pub fn grow(species: Species, dbh: f32) -> Self {
        Self {
            species,
            dbh,
            height: (10.0 + dbh * 4.0).min(species.max_height()),
            crown_radius: 2.0 + dbh * 0.3,
        }
    }

    pub fn basal_area(&self) -> f32 {
        basal_area(self.dbh)
    }
}

/// Everything that can grow on a tile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Plant {
    Tree(Tree),
    Sapling(Species),
    Shrub,
    Fern,
    Grass,
    Reeds,
    Cactus,
    Moss,
    Fungus,
}

impl Plant {
    /// Approximate standing height in feet.
    pub fn height(&self) -> f32 {
        match self {
            Plant::Tree(t) => t.height,
            Plant::Sapling(_) => 6.0,
            Plant::Reeds => 5.0,
            Plant::Shrub | Plant::Cactus => 4.0,
            Plant::Fern => 2.0,
            Plant::Grass => 1.5,
            Plant::Fungus => 0.3,
            Plant::Moss => 0.1,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Plant::Tree(_))
    }

    /// Woody growth below the canopy that slows movement.
    pub fn is_thicket(&self) -> bool {
        matches!(self, Plant::Shrub | Plant::Sapling(_) | Plant::Cactus)
    }
}

pub fn choose_species(table: &[(Species, f32)], rng: &mut impl Rng) -> Option<Species> {
    table.choose_weighted(rng, |(_, w)| *w).ok().map(|(s, _)| *s)
}

/// Understory beneath a closed canopy.
pub fn understory(moisture: MoistureClass, dominant: Option<Species>, rng: &mut impl Rng) -> Vec<Plant> {
    let mut plants = Vec::new();
    if moisture >= MoistureClass::Moist && rng.gen_bool(0.6) {
        plants.push(Plant::Fern);
    }
    if let Some(species) = dominant {
        if rng.gen_bool(0.2) {
            plants.push(Plant::Sapling(species));
        }
    }
    if rng.gen_bool(0.25) {
        plants.push(Plant::Shrub);
    }
    if plants.is_empty() {
        plants.push(Plant::Moss);
    }
    plants
}

/// Ground cover for open tiles that can still support growth.
pub fn ground_cover(
    biome: Biome,
    moisture: MoistureClass,
    slope: f32,
    potential: f32,
    marsh: bool,
    rng: &mut impl Rng,
) -> Vec<Plant> {
    // Fixed draw count per tile
    let a: f32 = rng.gen();
    let b: f32 = rng.gen();

    if marsh || (biome == Biome::Swamp && moisture >= MoistureClass::Wet) {
        return vec![Plant::Reeds];
    }
    if potential < 0.1 {
        return Vec::new();
    }

    match biome {
        Biome::Underground => {
            if a < 0.5 {
                vec![Plant::Fungus]
            } else if a < 0.8 {
                vec![Plant::Moss]
            } else {
                Vec::new()
            }
        }
        Biome::Desert => {
            if a < 0.15 {
                vec![Plant::Cactus]
            } else if a < 0.35 {
                vec![Plant::Shrub]
            } else if a < 0.55 {
                vec![Plant::Grass]
            } else {
                Vec::new()
            }
        }
        Biome::Tundra => {
            let mut cover = vec![Plant::Moss];
            if b < 0.15 {
                cover.push(Plant::Shrub);
            }
            cover
        }
        _ if moisture >= MoistureClass::Saturated => vec![Plant::Reeds],
        _ if slope > 35.0 => {
            if a < 0.3 {
                vec![Plant::Shrub]
            } else {
                vec![Plant::Moss]
            }
        }
        _ => {
            let mut cover = vec![Plant::Grass];
            if b < potential * 0.35 {
                cover.push(Plant::Shrub);
            }
            if b < potential * 0.1 {
                cover.push(Plant::Shrub);
            }
            cover
        }
    }
}
