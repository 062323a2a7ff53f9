//! Contiguous forest patch extraction and naming.

use std::collections::{HashMap, VecDeque};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tilemap::Tilemap;

use super::plants::{LeafType, Species};

/// Components smaller than this are left unnamed.
pub const MIN_PATCH_TILES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchKind {
    Deciduous,
    Coniferous,
    Mixed,
}

impl PatchKind {
    /// One leaf type must outnumber the other more than 2:1.
    pub fn classify(deciduous: usize, coniferous: usize) -> Self {
        if deciduous > coniferous * 2 {
            PatchKind::Deciduous
        } else if coniferous > deciduous * 2 {
            PatchKind::Coniferous
        } else {
            PatchKind::Mixed
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestPatch {
    pub id: usize,
    pub name: String,
    pub kind: PatchKind,
    pub tiles: Vec<(usize, usize)>,
    pub dominant_species: Option<Species>,
}

impl ForestPatch {
    pub fn size(&self) -> usize {
        self.tiles.len()
    }
}

/// 4-connected components of the forest mask, breadth first.
pub fn components(mask: &Tilemap<bool>) -> Vec<Vec<(usize, usize)>> {
    let mut visited = Tilemap::new_with(mask.width, mask.height, false);
    let mut out = Vec::new();

    for (x, y, &forested) in mask.iter() {
        if !forested || *visited.get(x, y) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([(x, y)]);
        visited.set(x, y, true);

        while let Some((cx, cy)) = queue.pop_front() {
            component.push((cx, cy));
            for (nx, ny) in mask.neighbors(cx, cy) {
                if *mask.get(nx, ny) && !*visited.get(nx, ny) {
                    visited.set(nx, ny, true);
                    queue.push_back((nx, ny));
                }
            }
        }
        out.push(component);
    }
    out
}

const ADJECTIVES: [&str; 8] = ["Old", "Whispering", "Dark", "Green", "Tangled", "Silent", "Mossy", "Hollow"];

fn size_noun(tiles: usize) -> &'static str {
    match tiles {
        0..=9 => "Copse",
        10..=39 => "Grove",
        40..=149 => "Wood",
        _ => "Forest",
    }
}

/// Build named patches from the forest mask.
///
/// `species` gives each forested tile's dominant species; the patch kind is
/// decided by the leaf-type ratio over those tiles.
pub fn extract_patches(
    mask: &Tilemap<bool>,
    species: &Tilemap<Option<Species>>,
    rng: &mut impl Rng,
) -> Vec<ForestPatch> {
    let mut patches = Vec::new();

    for tiles in components(mask) {
        if tiles.len() < MIN_PATCH_TILES {
            continue;
        }
        let mut counts: HashMap<Species, usize> = HashMap::new();
        for &(x, y) in &tiles {
            if let Some(s) = species.get(x, y) {
                *counts.entry(*s).or_default() += 1;
            }
        }
        let by_leaf = |leaf: LeafType| {
            counts
                .iter()
                .filter(|(s, _)| s.leaf_type() == leaf)
                .map(|(_, n)| n)
                .sum::<usize>()
        };
        let kind = PatchKind::classify(by_leaf(LeafType::Deciduous), by_leaf(LeafType::Coniferous));

        // Ties go to the lower species so naming is independent of hash order
        let dominant = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(s, _)| *s);

        let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Old");
        let name = match dominant {
            Some(s) => format!("{} {} {}", adjective, s.name(), size_noun(tiles.len())),
            None => format!("{} {}", adjective, size_noun(tiles.len())),
        };

        patches.push(ForestPatch {
            id: patches.len(),
            name,
            kind,
            tiles,
            dominant_species: dominant,
        });
    }

    patches
}
