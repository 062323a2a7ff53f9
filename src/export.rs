//! ASCII, PNG and JSON export of generated battlemaps.

use std::fmt::Write as _;
use std::path::Path;

use image::{ImageBuffer, Rgb, RgbImage};

use crate::converter::TerrainType;
use crate::error::ExportError;
use crate::features::FeatureCategory;
use crate::pipeline::Battlemap;
use crate::structures::StructureKind;
use crate::tilemap::Tilemap;
use crate::vegetation::VegetationType;

/// ASCII rendering modes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsciiMode {
    /// Converted tactical terrain
    Tactical,
    /// Tactical terrain with features and decorations on top
    Detailed,
    /// Elevation gradient
    Elevation,
    /// Moisture gradient
    Moisture,
    /// Vegetation class
    Vegetation,
}

impl AsciiMode {
    pub fn name(&self) -> &'static str {
        match self {
            AsciiMode::Tactical => "Tactical",
            AsciiMode::Detailed => "Detailed",
            AsciiMode::Elevation => "Elevation",
            AsciiMode::Moisture => "Moisture",
            AsciiMode::Vegetation => "Vegetation",
        }
    }

    pub fn all() -> &'static [AsciiMode] {
        &[
            AsciiMode::Tactical,
            AsciiMode::Detailed,
            AsciiMode::Elevation,
            AsciiMode::Moisture,
            AsciiMode::Vegetation,
        ]
    }
}

/// Get ASCII character for a terrain type
pub fn terrain_char(terrain: TerrainType) -> char {
    match terrain {
        TerrainType::Wall => '#',
        TerrainType::Building => '+',
        TerrainType::Road => '=',
        TerrainType::Water => '~',
        TerrainType::Forest => 'T',
        TerrainType::Mountain => '^',
        TerrainType::Grass => '.',
    }
}

pub fn terrain_color(terrain: TerrainType) -> [u8; 3] {
    match terrain {
        TerrainType::Wall => [60, 50, 45],
        TerrainType::Building => [150, 110, 75],
        TerrainType::Road => [190, 170, 130],
        TerrainType::Water => [50, 100, 190],
        TerrainType::Forest => [35, 95, 40],
        TerrainType::Mountain => [130, 125, 120],
        TerrainType::Grass => [120, 170, 80],
    }
}

fn vegetation_char(vegetation: VegetationType) -> char {
    match vegetation {
        VegetationType::None => '~',
        VegetationType::Barren => ' ',
        VegetationType::Grass => '.',
        VegetationType::Shrubland => ',',
        VegetationType::Marsh => '"',
        VegetationType::Fungal => 'f',
        VegetationType::Woodland => 't',
        VegetationType::Forest => 'T',
        VegetationType::DenseForest => '#',
    }
}

/// Overlay glyph for a tile, if any.
fn overlay_char(map: &Battlemap, x: usize, y: usize) -> Option<char> {
    if let Some(feature) = map.features.feature_at(x, y) {
        return Some(match feature.category() {
            FeatureCategory::Hazard => '!',
            FeatureCategory::Resource => '$',
            FeatureCategory::Landmark => '&',
        });
    }
    match map.structures.tile(x, y).structure {
        Some(StructureKind::Door) => Some('D'),
        Some(StructureKind::Well) => Some('o'),
        Some(StructureKind::Shrine) => Some('S'),
        Some(StructureKind::Signpost) => Some('|'),
        _ => None,
    }
}

fn gradient_char(t: f32) -> char {
    const RAMP: [char; 10] = [' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];
    let idx = (t.clamp(0.0, 1.0) * (RAMP.len() - 1) as f32).round() as usize;
    RAMP[idx.min(RAMP.len() - 1)]
}

/// Render a battlemap as ASCII, one text line per tile row.
pub fn render_ascii(map: &Battlemap, mode: AsciiMode) -> String {
    let (min, max) = (map.topography.min_elevation, map.topography.max_elevation);
    let range = (max - min).max(f32::EPSILON);

    let mut out = String::with_capacity((map.width + 1) * map.height);
    for y in 0..map.height {
        for x in 0..map.width {
            let c = match mode {
                AsciiMode::Tactical => terrain_char(map.tactical.tile(x, y).terrain),
                AsciiMode::Detailed => {
                    overlay_char(map, x, y).unwrap_or_else(|| terrain_char(map.tactical.tile(x, y).terrain))
                }
                AsciiMode::Elevation => gradient_char((map.topography.elevation(x, y) - min) / range),
                AsciiMode::Moisture => gradient_char(map.hydrology.tile(x, y).moisture),
                AsciiMode::Vegetation => vegetation_char(map.vegetation.tile(x, y).vegetation_type),
            };
            out.push(c);
        }
        out.push('\n');
    }
    out
}

/// Tactical ASCII view.
pub fn to_ascii(map: &Battlemap) -> String {
    render_ascii(map, AsciiMode::Tactical)
}

/// Legend for the tactical glyphs.
pub fn legend() -> String {
    let mut out = String::new();
    for terrain in TerrainType::ALL {
        let _ = writeln!(out, "{} {}", terrain_char(terrain), terrain.name());
    }
    out
}

fn scaled_image(tiles: &Tilemap<[u8; 3]>, scale: u32) -> Result<RgbImage, ExportError> {
    if scale == 0 {
        return Err(ExportError::InvalidScale);
    }
    let mut img: RgbImage = ImageBuffer::new(tiles.width as u32 * scale, tiles.height as u32 * scale);
    for (x, y, color) in tiles.iter() {
        for dy in 0..scale {
            for dx in 0..scale {
                img.put_pixel(x as u32 * scale + dx, y as u32 * scale + dy, Rgb(*color));
            }
        }
    }
    Ok(img)
}

/// Export the tactical map as a PNG, `scale` pixels per tile.
///
/// Elevation shades each tile slightly; blocked tiles are darkened.
pub fn export_png(map: &Battlemap, path: impl AsRef<Path>, scale: u32) -> Result<(), ExportError> {
    let colors = map.tactical.tiles.map(|_, _, tile| {
        let shade = 0.8 + (tile.height_multiplier - 0.5).clamp(0.0, 2.0) * 0.15;
        let shade = if tile.blocked { shade * 0.75 } else { shade };
        let base = terrain_color(tile.terrain);
        [
            (base[0] as f32 * shade).min(255.0) as u8,
            (base[1] as f32 * shade).min(255.0) as u8,
            (base[2] as f32 * shade).min(255.0) as u8,
        ]
    });
    scaled_image(&colors, scale)?.save(path)?;
    Ok(())
}

/// Export elevation using the spectral colormap.
pub fn export_elevation_png(map: &Battlemap, path: impl AsRef<Path>, scale: u32) -> Result<(), ExportError> {
    let (min, max) = (map.topography.min_elevation, map.topography.max_elevation);
    let range = (max - min).max(f32::EPSILON);
    let colors = map
        .topography
        .tiles
        .map(|_, _, t| spectral_colormap((t.elevation - min) / range));
    scaled_image(&colors, scale)?.save(path)?;
    Ok(())
}

/// Spectral colormap: dark blue -> cyan -> green -> yellow -> orange -> red
fn spectral_colormap(t: f32) -> [u8; 3] {
    let colors: [[f32; 3]; 11] = [
        [0.37, 0.31, 0.64],
        [0.20, 0.53, 0.74],
        [0.40, 0.76, 0.65],
        [0.67, 0.87, 0.64],
        [0.90, 0.96, 0.60],
        [1.00, 1.00, 0.75],
        [1.00, 0.88, 0.55],
        [0.99, 0.68, 0.38],
        [0.96, 0.43, 0.26],
        [0.84, 0.24, 0.31],
        [0.62, 0.00, 0.26],
    ];

    let t_scaled = t.clamp(0.0, 1.0) * 10.0;
    let idx = (t_scaled as usize).min(9);
    let frac = t_scaled - idx as f32;

    let c1 = colors[idx];
    let c2 = colors[idx + 1];

    [
        ((c1[0] + (c2[0] - c1[0]) * frac) * 255.0) as u8,
        ((c1[1] + (c2[1] - c1[1]) * frac) * 255.0) as u8,
        ((c1[2] + (c2[2] - c1[2]) * frac) * 255.0) as u8,
    ]
}

/// Whole battlemap as pretty-printed JSON.
pub fn to_json(map: &Battlemap) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(map)?)
}

pub fn write_json(map: &Battlemap, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), map)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::context::{Biome, Context, DevelopmentLevel, ElevationZone, HydrologyType, Season};
    use crate::pipeline::generate_battlemap;
    use crate::seeds::Seed;

    fn sample() -> Battlemap {
        let ctx = Context::new(
            Biome::Forest,
            ElevationZone::Lowland,
            HydrologyType::Stream,
            DevelopmentLevel::Rural,
            Season::Summer,
        )
        .unwrap();
        generate_battlemap(30, 20, &ctx, Seed::from_number(12).unwrap(), &GenerationConfig::default()).unwrap()
    }

    #[test]
    fn test_ascii_shape() {
        let map = sample();
        for mode in AsciiMode::all() {
            let text = render_ascii(&map, *mode);
            let lines: Vec<&str> = text.lines().collect();
            assert_eq!(lines.len(), 20, "{} rows", mode.name());
            assert!(lines.iter().all(|l| l.chars().count() == 30), "{} columns", mode.name());
        }
    }

    #[test]
    fn test_ascii_matches_tactical() {
        let map = sample();
        let text = to_ascii(&map);
        for (y, line) in text.lines().enumerate() {
            for (x, c) in line.chars().enumerate() {
                assert_eq!(c, terrain_char(map.tactical.tile(x, y).terrain));
            }
        }
    }

    #[test]
    fn test_json_round_trips_summary() {
        let map = sample();
        let json = to_json(&map).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["width"], 30);
        assert_eq!(value["height"], 20);
        assert_eq!(
            value["structures"]["buildings"].as_array().map(|a| a.len()),
            Some(map.structures.building_count())
        );
    }

    #[test]
    fn test_png_scale() {
        let map = sample();
        let dir = std::env::temp_dir();
        let path = dir.join(format!("battlemap_export_test_{}.png", std::process::id()));
        export_png(&map, &path, 4).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (120, 80));
        let _ = std::fs::remove_file(&path);

        assert!(matches!(export_png(&map, &path, 0), Err(ExportError::InvalidScale)));
    }

    #[test]
    fn test_spectral_endpoints() {
        assert_eq!(spectral_colormap(0.0), [94, 79, 163]);
        assert_eq!(spectral_colormap(-3.0), spectral_colormap(0.0));
    }
}
