//! Debug tool: generate one battlemap from flags, print it and its
//! validation report, optionally write PNG/JSON.

use std::process::ExitCode;

use battlemap::export::{self, AsciiMode};
use battlemap::features::FeatureType;
use battlemap::validator::Severity;
use battlemap::{
    generate_battlemap, Biome, Context, DevelopmentLevel, ElevationZone, GenerationConfig, HydrologyType, Seed,
    Season,
};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum View {
    Tactical,
    Detailed,
    Elevation,
    Moisture,
    Vegetation,
}

impl From<View> for AsciiMode {
    fn from(view: View) -> Self {
        match view {
            View::Tactical => AsciiMode::Tactical,
            View::Detailed => AsciiMode::Detailed,
            View::Elevation => AsciiMode::Elevation,
            View::Moisture => AsciiMode::Moisture,
            View::Vegetation => AsciiMode::Vegetation,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "debug_battlemap")]
#[command(about = "Generate a tactical battlemap and inspect its layers")]
struct Args {
    /// Width of the map in 5ft tiles
    #[arg(short = 'W', long, default_value = "40")]
    width: usize,

    /// Height of the map in 5ft tiles
    #[arg(short = 'H', long, default_value = "40")]
    height: usize,

    /// Seed: an integer in [1, 2^31 - 1] or any non-empty string
    #[arg(short, long, default_value = "deterministic-test")]
    seed: String,

    #[arg(short, long, default_value = "forest")]
    biome: Biome,

    #[arg(short, long, default_value = "lowland")]
    elevation: ElevationZone,

    #[arg(long, default_value = "stream")]
    hydrology: HydrologyType,

    #[arg(short, long, default_value = "rural")]
    development: DevelopmentLevel,

    #[arg(long, default_value = "summer")]
    season: Season,

    /// Feature that must appear when the terrain allows (repeatable)
    #[arg(long = "require")]
    required: Vec<FeatureType>,

    /// JSON generation config
    #[arg(short, long)]
    config: Option<String>,

    /// ASCII view to print
    #[arg(long, value_enum, default_value = "tactical")]
    view: View,

    /// Write the tactical map as PNG
    #[arg(long)]
    png: Option<String>,

    /// Write an elevation PNG
    #[arg(long)]
    elevation_png: Option<String>,

    /// Pixels per tile for PNG output
    #[arg(long, default_value = "8")]
    scale: u32,

    /// Write the whole battlemap as JSON
    #[arg(long)]
    json: Option<String>,

    /// Print every violation, not just the summary
    #[arg(short, long)]
    verbose: bool,
}

fn parse_seed(raw: &str) -> Result<Seed, battlemap::ValidationError> {
    match raw.parse::<i64>() {
        Ok(n) => Seed::from_number(n),
        Err(_) => Seed::from_string(raw),
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => GenerationConfig::from_json_file(path)?,
        None => GenerationConfig::default(),
    };
    let seed = parse_seed(&args.seed)?;
    let ctx = Context::with_required_features(
        args.biome,
        args.elevation,
        args.hydrology,
        args.development,
        args.season,
        args.required.clone(),
    )?;

    println!(
        "Generating {}x{} battlemap, seed {} ({}, {}, {}, {}, {})",
        args.width,
        args.height,
        seed.value(),
        ctx.biome(),
        ctx.elevation(),
        ctx.hydrology(),
        ctx.development(),
        ctx.season()
    );

    let map = generate_battlemap(args.width, args.height, &ctx, seed, &config)?;

    println!();
    print!("{}", export::render_ascii(&map, args.view.into()));
    println!();
    if matches!(args.view, View::Tactical | View::Detailed) {
        print!("{}", export::legend());
        println!();
    }

    let s = map.summary();
    println!("Elevation: {:.1} ft to {:.1} ft", s.min_elevation, s.max_elevation);
    println!("Streams: {}  Trees: {}  Forest patches: {}", s.stream_count, s.tree_count, s.forest_patches);
    println!(
        "Buildings: {}  Road tiles: {}  Bridges: {}  Features: {}",
        s.building_count, s.road_length, s.bridge_count, s.feature_count
    );
    if !map.features.unsatisfied.is_empty() {
        let names: Vec<String> = map.features.unsatisfied.iter().map(|f| f.to_string()).collect();
        println!("Unplaceable required features: {}", names.join(", "));
    }

    let report = &map.validation;
    println!(
        "Natural laws: {} ({})",
        if report.is_valid { "valid" } else { "INVALID" },
        report.summary
    );
    for v in &report.violations {
        if args.verbose || v.severity >= Severity::Error {
            let at = v.position.map(|(x, y)| format!(" at ({}, {})", x, y)).unwrap_or_default();
            println!("  [{}] {}{}: {}", v.severity.as_str(), v.layer, at, v.message);
        }
    }

    if let Some(path) = &args.png {
        export::export_png(&map, path, args.scale)?;
        println!("Wrote {}", path);
    }
    if let Some(path) = &args.elevation_png {
        export::export_elevation_png(&map, path, args.scale)?;
        println!("Wrote {}", path);
    }
    if let Some(path) = &args.json {
        export::write_json(&map, path)?;
        println!("Wrote {}", path);
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
