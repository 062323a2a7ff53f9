//! Tactical battlemap generation library
//!
//! Six deterministic layers (geology, topography, hydrology, vegetation,
//! structures, features) are generated from one seed and context, flattened
//! into a tactical grid and checked against natural laws.

pub mod config;
pub mod context;
pub mod converter;
pub mod error;
pub mod export;
pub mod features;
pub mod geology;
pub mod hydrology;
pub mod noise_field;
pub mod pipeline;
pub mod seeds;
pub mod structures;
pub mod tilemap;
pub mod topography;
pub mod validator;
pub mod vegetation;

pub use config::GenerationConfig;
pub use context::{Biome, Context, DevelopmentLevel, ElevationZone, HydrologyType, Season};
pub use error::{GenerationError, ValidationError};
pub use pipeline::{generate_battlemap, generate_battlemap_async, Battlemap};
pub use seeds::{LayeredSeed, Seed};
