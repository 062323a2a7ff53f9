//! Vegetation layer.
//!
//! 1. Growth potential per tile from biome, moisture, slope, soil and zone
//! 2. Forest mask from noise, relaxed by a cellular automaton
//! 3. Trees on forested tiles from basal-area targets, ground cover elsewhere
//! 4. Clearings ringed by forest
//! 5. Canopy and tactical attributes
//! 6. Named forest patches

pub mod clearings;
pub mod forest;
pub mod growth;
pub mod patches;
pub mod plants;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VegetationConfig;
use crate::context::{Biome, Context};
use crate::error::{GenerationError, LayerError, LayerName};
use crate::geology::GeologyLayerData;
use crate::hydrology::{HydrologyLayerData, MoistureClass};
use crate::noise_field::NoiseGenerator;
use crate::seeds::{LayeredSeed, SeedLayer};
use crate::tilemap::Tilemap;
use crate::topography::{TopographyLayerData, TILE_FEET};

pub use clearings::Clearing;
pub use patches::{ForestPatch, PatchKind};
pub use plants::{LeafType, Plant, Species, Tree};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VegetationType {
    /// Open water
    None,
    Barren,
    Grass,
    Shrubland,
    Marsh,
    Fungal,
    Woodland,
    Forest,
    DenseForest,
}

impl VegetationType {
    pub fn is_forest(&self) -> bool {
        matches!(self, VegetationType::Woodland | VegetationType::Forest | VegetationType::DenseForest)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Passability {
    Passable,
    Difficult,
    Impassable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cover {
    None,
    Half,
    ThreeQuarters,
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Concealment {
    None,
    Light,
    Heavy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VegetationTile {
    pub growth_potential: f32,
    pub vegetation_type: VegetationType,
    pub plants: Vec<Plant>,
    pub dominant_species: Option<Species>,
    /// Feet
    pub canopy_height: f32,
    /// Fraction of sky covered, 0-1
    pub canopy_density: f32,
    pub is_forested: bool,
    pub in_clearing: bool,
    pub passability: Passability,
    pub cover: Cover,
    pub concealment: Concealment,
}

impl VegetationTile {
    pub fn tree_count(&self) -> usize {
        self.plants.iter().filter(|p| p.is_tree()).count()
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.plants.iter().filter_map(|p| match p {
            Plant::Tree(t) => Some(t),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VegetationLayerData {
    pub width: usize,
    pub height: usize,
    pub tiles: Tilemap<VegetationTile>,
    pub patches: Vec<ForestPatch>,
    pub clearings: Vec<Clearing>,
}

impl VegetationLayerData {
    pub fn tile(&self, x: usize, y: usize) -> &VegetationTile {
        self.tiles.get(x, y)
    }

    pub fn tree_count(&self) -> usize {
        self.tiles.iter().map(|(_, _, t)| t.tree_count()).sum()
    }

    pub fn forested_tiles(&self) -> usize {
        self.tiles.iter().filter(|(_, _, t)| t.is_forested).count()
    }

    /// Total basal area in square feet.
    pub fn basal_area(&self) -> f32 {
        self.tiles.iter().flat_map(|(_, _, t)| t.trees()).map(|t| t.basal_area()).sum()
    }
}

pub fn generate(
    hydrology: &HydrologyLayerData,
    topography: &TopographyLayerData,
    geology: &GeologyLayerData,
    ctx: &Context,
    seeds: &LayeredSeed,
    config: &VegetationConfig,
) -> Result<VegetationLayerData, GenerationError> {
    config.validate()?;
    build(hydrology, topography, geology, ctx, seeds, config).map_err(GenerationError::layer(LayerName::Vegetation))
}

fn check_dimensions(width: usize, height: usize, input: LayerName, found: (usize, usize)) -> Result<(), LayerError> {
    if found == (width, height) {
        Ok(())
    } else {
        Err(LayerError::DimensionMismatch {
            input,
            expected_width: width,
            expected_height: height,
            found_width: found.0,
            found_height: found.1,
        })
    }
}

fn build(
    hydrology: &HydrologyLayerData,
    topography: &TopographyLayerData,
    geology: &GeologyLayerData,
    ctx: &Context,
    seeds: &LayeredSeed,
    config: &VegetationConfig,
) -> Result<VegetationLayerData, LayerError> {
    let (width, height) = (topography.width, topography.height);
    check_dimensions(width, height, LayerName::Hydrology, (hydrology.width, hydrology.height))?;
    check_dimensions(width, height, LayerName::Geology, (geology.width, geology.height))?;

    let biome = ctx.biome();
    let potential = growth::potential_map(biome, ctx.elevation(), geology, topography, hydrology);

    let mask_noise = NoiseGenerator::new(seeds.layer(SeedLayer::VegetationForest));
    let seeded = forest::seed_mask(&potential, biome, &mask_noise);
    let forest_mask = forest::relax(seeded, &potential, config.automaton_passes);

    // Trees
    let mut dominant: Tilemap<Option<Species>> = Tilemap::new_with(width, height, None);
    let mut stand: Tilemap<Vec<Plant>> = Tilemap::new_with(width, height, Vec::new());
    for (x, y, &forested) in forest_mask.iter() {
        if !forested {
            continue;
        }
        let h = hydrology.tile(x, y);
        let table = plants::species_table(biome, h.moisture_class);
        let mut attr_rng = seeds.tile_rng(SeedLayer::VegetationForest, x, y);
        let tile_species = plants::choose_species(table, &mut attr_rng);
        dominant.set(x, y, tile_species);

        let mut slot_rng = seeds.tile_rng(SeedLayer::VegetationTrees, x, y);
        let stocking = forest::stocking(biome, config.density, *potential.get(x, y));
        let stems = forest::stem_count(stocking, &mut slot_rng);

        let avg_dbh = plants::average_dbh(biome);
        let tile_plants = stand.get_mut(x, y);
        for _ in 0..stems {
            let species = plants::choose_species(table, &mut attr_rng).or(tile_species);
            if let Some(species) = species {
                let dbh = avg_dbh * (0.5 + attr_rng.gen::<f32>());
                tile_plants.push(Plant::Tree(Tree::grow(species, dbh)));
            }
        }
    }

    let trunks = stand.map(|_, _, p| p.iter().any(Plant::is_tree));
    let (canopy_height, canopy_density) = canopy(&stand, &forest_mask);

    // Clearings and ground cover
    let open = Tilemap::from_fn(width, height, |x, y| {
        !*forest_mask.get(x, y) && *potential.get(x, y) > 0.0
    });
    let clearings = clearings::find_clearings(&open, &forest_mask, &trunks);

    let tiles = Tilemap::from_fn(width, height, |x, y| {
        let h = hydrology.tile(x, y);
        let slope = topography.tile(x, y).slope;
        let p = *potential.get(x, y);
        let forested = *forest_mask.get(x, y);
        let open_water = h.is_water() && !h.is_marsh;

        let mut tile_plants = stand.get(x, y).clone();
        let mut under_rng = seeds.tile_rng(SeedLayer::VegetationUndergrowth, x, y);
        if forested {
            if config.understory && tile_plants.is_empty() {
                tile_plants.extend(plants::understory(h.moisture_class, *dominant.get(x, y), &mut under_rng));
            }
        } else if !open_water {
            tile_plants = plants::ground_cover(biome, h.moisture_class, slope, p, h.is_marsh, &mut under_rng);
        }

        let density = *canopy_density.get(x, y);
        let vegetation_type = classify(forested, open_water, density, &tile_plants);
        let (passability, cover, concealment) = tactical(biome, vegetation_type, &tile_plants, h.moisture_class);

        VegetationTile {
            growth_potential: p,
            vegetation_type,
            dominant_species: *dominant.get(x, y),
            canopy_height: *canopy_height.get(x, y),
            canopy_density: density,
            is_forested: forested,
            in_clearing: !forested && clearings.iter().any(|c| c.contains(x, y)),
            passability,
            cover,
            concealment,
            plants: tile_plants,
        }
    });

    let mut name_rng = seeds.streams().stream(SeedLayer::VegetationPatches, "names");
    let patches = patches::extract_patches(&forest_mask, &dominant, &mut name_rng);

    let data = VegetationLayerData {
        width,
        height,
        tiles,
        patches,
        clearings,
    };

    debug!(
        trees = data.tree_count(),
        forested = data.forested_tiles(),
        patches = data.patches.len(),
        clearings = data.clearings.len(),
        "vegetation generated"
    );

    Ok(data)
}

/// Canopy height and density from the crowns overlapping each tile.
fn canopy(plants: &Tilemap<Vec<Plant>>, forest: &Tilemap<bool>) -> (Tilemap<f32>, Tilemap<f32>) {
    let mut crowns = Tilemap::new_with(plants.width, plants.height, 0u32);
    let mut height = Tilemap::new_with(plants.width, plants.height, 0.0f32);

    for (x, y, tile) in plants.iter() {
        for plant in tile {
            let Plant::Tree(tree) = plant else { continue };
            let reach = tree.crown_radius / TILE_FEET;
            let r = reach.ceil() as i32;
            for dy in -r..=r {
                for dx in -r..=r {
                    if ((dx * dx + dy * dy) as f32).sqrt() > reach {
                        continue;
                    }
                    let (nx, ny) = (x as i32 + dx, y as i32 + dy);
                    if !crowns.in_bounds(nx, ny) {
                        continue;
                    }
                    let (nx, ny) = (nx as usize, ny as usize);
                    *crowns.get_mut(nx, ny) += 1;
                    let h = height.get_mut(nx, ny);
                    *h = h.max(tree.height);
                }
            }
        }
    }

    let density = crowns.map(|x, y, &c| {
        let closed = 1.0 - 0.25f32.powi(c as i32);
        // Young growth shades forested ground even without a mature crown
        if *forest.get(x, y) {
            closed.max(0.2)
        } else {
            closed
        }
    });
    (height, density)
}

fn classify(forested: bool, open_water: bool, canopy_density: f32, plants: &[Plant]) -> VegetationType {
    if open_water {
        return VegetationType::None;
    }
    if forested {
        return if canopy_density >= 0.85 {
            VegetationType::DenseForest
        } else if canopy_density >= 0.5 {
            VegetationType::Forest
        } else {
            VegetationType::Woodland
        };
    }
    if plants.contains(&Plant::Reeds) {
        VegetationType::Marsh
    } else if plants.contains(&Plant::Fungus) {
        VegetationType::Fungal
    } else if plants.iter().any(|p| matches!(p, Plant::Shrub | Plant::Cactus)) {
        VegetationType::Shrubland
    } else if plants.iter().any(|p| matches!(p, Plant::Grass | Plant::Moss)) {
        VegetationType::Grass
    } else {
        VegetationType::Barren
    }
}

fn tactical(
    biome: Biome,
    vegetation: VegetationType,
    plants: &[Plant],
    moisture: MoistureClass,
) -> (Passability, Cover, Concealment) {
    let trees = plants.iter().filter(|p| p.is_tree()).count();
    let thickets = plants.iter().filter(|p| p.is_thicket()).count();

    let passability = if trees >= forest::TREE_SLOTS
        || (vegetation == VegetationType::DenseForest && biome == Biome::Jungle)
    {
        Passability::Impassable
    } else if vegetation == VegetationType::DenseForest
        || vegetation == VegetationType::Marsh
        || thickets >= 2
        || trees == 2
    {
        Passability::Difficult
    } else {
        Passability::Passable
    };

    let cover = match trees {
        0 if thickets > 0 => Cover::Half,
        0 => Cover::None,
        1 => Cover::Half,
        2 => Cover::ThreeQuarters,
        _ => Cover::Full,
    };

    let tall_grass = vegetation == VegetationType::Grass
        && biome == Biome::Grassland
        && moisture >= MoistureClass::Moist;
    let concealment = match vegetation {
        VegetationType::DenseForest | VegetationType::Marsh => Concealment::Heavy,
        VegetationType::Forest | VegetationType::Woodland | VegetationType::Shrubland => Concealment::Light,
        _ if tall_grass => Concealment::Light,
        _ => Concealment::None,
    };

    (passability, cover, concealment)
}
