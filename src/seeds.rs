//! Seed management for battlemap generation.
//!
//! A single [`Seed`] drives a whole run. [`LayeredSeed`] derives one seed per
//! layer and sub-layer with an avalanche mix, plus per-tile and per-region
//! seeds, so each generation concern draws from its own uncorrelated source.
//! [`RandomStreams`] turns those seeds into named `ChaCha8Rng` generators.

use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, ValidationError, MAX_SEED};

/// Deterministic seed in `[1, 2^31 - 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Seed(u32);

impl Seed {
    /// Create a seed from an integer, failing if it is out of range.
    pub fn from_number(n: i64) -> Result<Self, ValidationError> {
        if (1..=MAX_SEED).contains(&n) {
            Ok(Seed(n as u32))
        } else {
            Err(ValidationError::SeedOutOfRange(n))
        }
    }

    /// Create a seed from a float, failing if it has a fractional part.
    pub fn from_f64(n: f64) -> Result<Self, ValidationError> {
        if !n.is_finite() || n.fract() != 0.0 {
            return Err(ValidationError::SeedNotInteger(n));
        }
        if n < 1.0 || n > MAX_SEED as f64 {
            return Err(ValidationError::SeedOutOfRange(n as i64));
        }
        Ok(Seed(n as u32))
    }

    /// Hash an arbitrary non-empty string into a seed.
    ///
    /// Uses a 31-multiplier polynomial hash over the UTF-8 bytes, folded into range.
    pub fn from_string(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::EmptySeedString);
        }
        Ok(fold_into_range(polynomial_hash(s) as u64))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Map the seed to `[0, 1)`.
    pub fn unit(&self) -> f64 {
        (self.0 - 1) as f64 / MAX_SEED as f64
    }
}

impl TryFrom<i64> for Seed {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Seed::from_number(value)
    }
}

impl From<Seed> for i64 {
    fn from(seed: Seed) -> Self {
        seed.0 as i64
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 31-multiplier polynomial string hash with 32-bit wraparound.
fn polynomial_hash(s: &str) -> u32 {
    s.bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
}

/// Fold any integer into `[1, 2^31 - 1]`.
fn fold_into_range(v: u64) -> Seed {
    let folded = (v % MAX_SEED as u64) as u32;
    Seed(if folded == 0 { 1 } else { folded })
}

/// murmur3 32-bit finalizer.
pub(crate) fn mix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Szudzik pairing of two non-negative coordinates.
fn pair(x: u64, y: u64) -> u64 {
    if x >= y {
        x * x + x + y
    } else {
        y * y + x
    }
}

/// Named layers and sub-layers with their own derived seeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SeedLayer {
    Geology,
    GeologyFormation,
    GeologyBedrock,
    GeologyWeathering,
    Topography,
    TopographyElevation,
    TopographyDetail,
    Hydrology,
    HydrologySprings,
    HydrologyCoast,
    Vegetation,
    VegetationForest,
    VegetationTrees,
    VegetationUndergrowth,
    VegetationPatches,
    Structures,
    StructuresBuildings,
    StructuresRoads,
    StructuresDecorations,
    Features,
    FeaturesHazards,
    FeaturesLandmarks,
}

impl SeedLayer {
    pub const ALL: [SeedLayer; 22] = [
        SeedLayer::Geology,
        SeedLayer::GeologyFormation,
        SeedLayer::GeologyBedrock,
        SeedLayer::GeologyWeathering,
        SeedLayer::Topography,
        SeedLayer::TopographyElevation,
        SeedLayer::TopographyDetail,
        SeedLayer::Hydrology,
        SeedLayer::HydrologySprings,
        SeedLayer::HydrologyCoast,
        SeedLayer::Vegetation,
        SeedLayer::VegetationForest,
        SeedLayer::VegetationTrees,
        SeedLayer::VegetationUndergrowth,
        SeedLayer::VegetationPatches,
        SeedLayer::Structures,
        SeedLayer::StructuresBuildings,
        SeedLayer::StructuresRoads,
        SeedLayer::StructuresDecorations,
        SeedLayer::Features,
        SeedLayer::FeaturesHazards,
        SeedLayer::FeaturesLandmarks,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SeedLayer::Geology => "geology",
            SeedLayer::GeologyFormation => "geology.formation",
            SeedLayer::GeologyBedrock => "geology.bedrock",
            SeedLayer::GeologyWeathering => "geology.weathering",
            SeedLayer::Topography => "topography",
            SeedLayer::TopographyElevation => "topography.elevation",
            SeedLayer::TopographyDetail => "topography.detail",
            SeedLayer::Hydrology => "hydrology",
            SeedLayer::HydrologySprings => "hydrology.springs",
            SeedLayer::HydrologyCoast => "hydrology.coast",
            SeedLayer::Vegetation => "vegetation",
            SeedLayer::VegetationForest => "vegetation.forest",
            SeedLayer::VegetationTrees => "vegetation.trees",
            SeedLayer::VegetationUndergrowth => "vegetation.undergrowth",
            SeedLayer::VegetationPatches => "vegetation.patches",
            SeedLayer::Structures => "structures",
            SeedLayer::StructuresBuildings => "structures.buildings",
            SeedLayer::StructuresRoads => "structures.roads",
            SeedLayer::StructuresDecorations => "structures.decorations",
            SeedLayer::Features => "features",
            SeedLayer::FeaturesHazards => "features.hazards",
            SeedLayer::FeaturesLandmarks => "features.landmarks",
        }
    }

    /// Layer-specific prime multiplier used in derivation.
    fn prime(&self) -> u32 {
        match self {
            SeedLayer::Geology => 73_856_093,
            SeedLayer::GeologyFormation => 19_349_663,
            SeedLayer::GeologyBedrock => 83_492_791,
            SeedLayer::GeologyWeathering => 2_654_435_761,
            SeedLayer::Topography => 2_246_822_519,
            SeedLayer::TopographyElevation => 3_266_489_917,
            SeedLayer::TopographyDetail => 668_265_263,
            SeedLayer::Hydrology => 374_761_393,
            SeedLayer::HydrologySprings => 16_777_619,
            SeedLayer::HydrologyCoast => 1_000_003,
            SeedLayer::Vegetation => 15_485_863,
            SeedLayer::VegetationForest => 32_452_843,
            SeedLayer::VegetationTrees => 49_979_687,
            SeedLayer::VegetationUndergrowth => 67_867_967,
            SeedLayer::VegetationPatches => 86_028_121,
            SeedLayer::Structures => 104_395_301,
            SeedLayer::StructuresBuildings => 122_949_823,
            SeedLayer::StructuresRoads => 141_650_939,
            SeedLayer::StructuresDecorations => 160_481_183,
            SeedLayer::Features => 179_424_673,
            SeedLayer::FeaturesHazards => 2_038_074_743,
            SeedLayer::FeaturesLandmarks => 1_299_709,
        }
    }

    /// Position in [`SeedLayer::ALL`]; variants are declared in that order.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Look a layer up by its dotted name.
    pub fn from_name(name: &str) -> Option<SeedLayer> {
        SeedLayer::ALL.iter().copied().find(|l| l.name() == name)
    }
}

impl fmt::Display for SeedLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base seed plus the table of derived per-layer seeds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayeredSeed {
    base: Seed,
    layers: [Seed; SeedLayer::ALL.len()],
}

impl LayeredSeed {
    pub fn new(base: Seed) -> Self {
        let layers = SeedLayer::ALL.map(|layer| derive_layer_seed(base, layer));
        Self { base, layers }
    }

    pub fn base(&self) -> Seed {
        self.base
    }

    /// Seed for a layer in the fixed table.
    pub fn layer(&self, layer: SeedLayer) -> Seed {
        self.layers[layer.index()]
    }

    /// Seed for a layer given by name, e.g. `"vegetation.trees"`.
    pub fn get_layer_seed(&self, name: &str) -> Result<Seed, GenerationError> {
        SeedLayer::from_name(name)
            .map(|layer| self.layer(layer))
            .ok_or_else(|| GenerationError::UnknownLayer(name.to_string()))
    }

    /// Seed for one tile of one layer.
    pub fn tile_seed(&self, layer: SeedLayer, x: usize, y: usize) -> Seed {
        let p = pair(x as u64, y as u64);
        let coord = mix32((p as u32) ^ mix32((p >> 32) as u32 ^ 0x9e37_79b9));
        let layer_seed = self.layer(layer).value();
        fold_into_range(mix32(layer_seed.wrapping_mul(0x27d4_eb2d) ^ coord) as u64)
    }

    /// Tile seed looked up by layer name.
    pub fn get_tile_seed(&self, name: &str, x: usize, y: usize) -> Result<Seed, GenerationError> {
        SeedLayer::from_name(name)
            .map(|layer| self.tile_seed(layer, x, y))
            .ok_or_else(|| GenerationError::UnknownLayer(name.to_string()))
    }

    /// Seed for a coarse region of `region_size` tiles containing tile (x, y).
    pub fn region_seed(&self, layer: SeedLayer, x: usize, y: usize, region_size: usize) -> Seed {
        let size = region_size.max(1);
        let p = pair((x / size) as u64, (y / size) as u64);
        let coord = mix32((p as u32).wrapping_add(0x5bd1_e995) ^ mix32((p >> 32) as u32));
        let layer_seed = self.layer(layer).value();
        fold_into_range(mix32(layer_seed.rotate_left(13) ^ coord ^ size as u32) as u64)
    }

    /// Uniform value in `[0, 1)` for a tile, independent of call order.
    pub fn tile_unit(&self, layer: SeedLayer, x: usize, y: usize) -> f32 {
        self.tile_seed(layer, x, y).unit() as f32
    }

    /// Generator seeded for one tile of one layer.
    pub fn tile_rng(&self, layer: SeedLayer, x: usize, y: usize) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.tile_seed(layer, x, y).value() as u64)
    }

    pub fn streams(&self) -> RandomStreams<'_> {
        RandomStreams { seeds: self }
    }
}

fn derive_layer_seed(base: Seed, layer: SeedLayer) -> Seed {
    let prime = layer.prime();
    let mut h = base.value().wrapping_mul(prime);
    h ^= prime >> 7;
    h = mix32(h);
    h = mix32(h.wrapping_add(0x9e37_79b9) ^ base.value().rotate_left(16));
    fold_into_range(h as u64)
}

/// Named random generators, one per (layer, concern) pair.
///
/// Two streams with different names never share state, so adding draws to one
/// concern cannot shift the output of another.
#[derive(Clone, Copy)]
pub struct RandomStreams<'a> {
    seeds: &'a LayeredSeed,
}

impl RandomStreams<'_> {
    pub fn stream(&self, layer: SeedLayer, name: &str) -> ChaCha8Rng {
        let layer_seed = self.seeds.layer(layer).value() as u64;
        let name_hash = mix32(polynomial_hash(name) ^ 0x68e3_1da4) as u64;
        ChaCha8Rng::seed_from_u64((layer_seed << 32) | name_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;

    #[test]
    fn test_seed_range() {
        assert!(Seed::from_number(1).is_ok());
        assert!(Seed::from_number(MAX_SEED).is_ok());
        assert_eq!(Seed::from_number(0), Err(ValidationError::SeedOutOfRange(0)));
        assert!(Seed::from_number(MAX_SEED + 1).is_err());
        assert!(Seed::from_number(-5).is_err());
    }

    #[test]
    fn test_seed_from_f64_rejects_fraction() {
        assert!(matches!(Seed::from_f64(1.5), Err(ValidationError::SeedNotInteger(_))));
        assert!(matches!(Seed::from_f64(f64::NAN), Err(ValidationError::SeedNotInteger(_))));
        assert_eq!(Seed::from_f64(42.0).unwrap().value(), 42);
    }

    #[test]
    fn test_seed_from_string() {
        assert_eq!(Seed::from_string(""), Err(ValidationError::EmptySeedString));
        let a = Seed::from_string("deterministic-test").unwrap();
        let b = Seed::from_string("deterministic-test").unwrap();
        let c = Seed::from_string("deterministic-tesu").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.value() >= 1 && (a.value() as i64) <= MAX_SEED);
    }

    #[test]
    fn test_deterministic_derivation() {
        let seed = Seed::from_number(12345).unwrap();
        let a = LayeredSeed::new(seed);
        let b = LayeredSeed::new(seed);
        for layer in SeedLayer::ALL {
            assert_eq!(a.layer(layer), b.layer(layer));
        }
        assert_eq!(a.tile_seed(SeedLayer::VegetationTrees, 7, 9), b.tile_seed(SeedLayer::VegetationTrees, 7, 9));
    }

    #[test]
    fn test_different_layers_get_different_seeds() {
        let seeds = LayeredSeed::new(Seed::from_number(12345).unwrap());
        let unique: HashSet<u32> = SeedLayer::ALL.iter().map(|l| seeds.layer(*l).value()).collect();
        assert_eq!(unique.len(), SeedLayer::ALL.len());
    }

    #[test]
    fn test_layer_table_matches_derivation() {
        let base = Seed::from_number(777).unwrap();
        let seeds = LayeredSeed::new(base);
        for (i, layer) in SeedLayer::ALL.into_iter().enumerate() {
            assert_eq!(layer.index(), i);
            assert_eq!(seeds.layer(layer), derive_layer_seed(base, layer), "{}", layer);
        }
    }

    #[test]
    fn test_unknown_layer() {
        let seeds = LayeredSeed::new(Seed::from_number(3).unwrap());
        assert!(seeds.get_layer_seed("geology.weathering").is_ok());
        assert!(matches!(
            seeds.get_layer_seed("plumbing"),
            Err(GenerationError::UnknownLayer(_))
        ));
        assert!(seeds.get_tile_seed("nope", 0, 0).is_err());
    }

    #[test]
    fn test_tile_seeds_do_not_collide_across_layers() {
        let seeds = LayeredSeed::new(Seed::from_number(99).unwrap());
        let mut seen = HashSet::new();
        let mut collisions = 0;
        for layer in [SeedLayer::Geology, SeedLayer::Hydrology, SeedLayer::VegetationTrees] {
            for y in 0..30 {
                for x in 0..30 {
                    if !seen.insert(seeds.tile_seed(layer, x, y)) {
                        collisions += 1;
                    }
                }
            }
        }
        assert!(collisions < 3, "too many tile seed collisions: {}", collisions);
    }

    #[test]
    fn test_tile_units_uncorrelated_across_layers() {
        let seeds = LayeredSeed::new(Seed::from_number(2024).unwrap());
        let n = 2500;
        let a: Vec<f64> = (0..n).map(|i| seeds.tile_unit(SeedLayer::Geology, i % 50, i / 50) as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| seeds.tile_unit(SeedLayer::Vegetation, i % 50, i / 50) as f64).collect();
        let mean_a = a.iter().sum::<f64>() / n as f64;
        let mean_b = b.iter().sum::<f64>() / n as f64;
        let cov: f64 = a.iter().zip(&b).map(|(x, y)| (x - mean_a) * (y - mean_b)).sum();
        let var_a: f64 = a.iter().map(|x| (x - mean_a).powi(2)).sum();
        let var_b: f64 = b.iter().map(|y| (y - mean_b).powi(2)).sum();
        let corr = cov / (var_a.sqrt() * var_b.sqrt());
        assert!(corr.abs() < 0.1, "layers correlated: {}", corr);
        assert!((mean_a - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_region_seed_shared_within_region() {
        let seeds = LayeredSeed::new(Seed::from_number(5).unwrap());
        let a = seeds.region_seed(SeedLayer::Features, 1, 1, 8);
        let b = seeds.region_seed(SeedLayer::Features, 6, 7, 8);
        let c = seeds.region_seed(SeedLayer::Features, 9, 1, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_named_streams_independent() {
        let seeds = LayeredSeed::new(Seed::from_number(77).unwrap());
        let streams = seeds.streams();
        let mut terrain = streams.stream(SeedLayer::Topography, "terrain");
        let mut trees = streams.stream(SeedLayer::Topography, "features_tree");
        let t: Vec<u32> = (0..8).map(|_| terrain.gen()).collect();
        let f: Vec<u32> = (0..8).map(|_| trees.gen()).collect();
        assert_ne!(t, f);

        // Drawing from one stream does not affect a fresh copy of the other
        let mut trees_again = streams.stream(SeedLayer::Topography, "features_tree");
        let f2: Vec<u32> = (0..8).map(|_| trees_again.gen()).collect();
        assert_eq!(f, f2);
    }
}
