//! MDO Route - offline replay host
//!
//! Usage:
//!   mdo-route --loudspeakers ls.json --objects scene.json
//!   mdo-route --loudspeakers ls.json --objects scene.json --cycles 10 --seed 7
//!
//! Runs the routing engine over a captured object list and prints the last
//! cycle's output as JSON.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::Value;

use mdo_routing::{
    EngineCommand, EngineConfig, MAX_ZONES, MdoRoutingEngine, RoutingMethod, parse_object_list,
};

#[derive(Parser)]
#[command(name = "mdo-route", about = "Replay an object list through the MDO routing engine")]
struct Cli {
    /// Loudspeaker payload ({"mdoLoudspeakers": [...]})
    #[arg(short, long)]
    loudspeakers: PathBuf,

    /// Object list (array or {"objects": [...]})
    #[arg(short, long)]
    objects: PathBuf,

    /// Number of cycles to run
    #[arg(short, long, default_value_t = 1)]
    cycles: u32,

    /// Seed for the zonal shuffle
    #[arg(long)]
    seed: Option<u64>,

    /// Routing method (0 direct, 1 unknown location, 2 zonal, 3 nearest)
    #[arg(short, long)]
    method: Option<i64>,

    /// Number of zones
    #[arg(short, long)]
    zones: Option<u32>,

    /// Print device and object tables
    #[arg(short, long)]
    verbose: bool,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(index) = cli.method {
        config.method = match RoutingMethod::from_index(index) {
            Some(method) => method,
            None => bail!("Invalid method index {}", index),
        };
    }
    if let Some(zones) = cli.zones {
        if zones > MAX_ZONES {
            bail!("Zone count {} exceeds {}", zones, MAX_ZONES);
        }
        config.zone_count = zones;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    config.verbose |= cli.verbose;

    let mut engine = MdoRoutingEngine::new(config);
    engine
        .handle_command(EngineCommand::LoudspeakerConfig(cli.loudspeakers.clone()))
        .with_context(|| format!("Failed to load loudspeakers {}", cli.loudspeakers.display()))?;

    let text = fs::read_to_string(&cli.objects)
        .with_context(|| format!("Failed to read objects {}", cli.objects.display()))?;
    let payload: Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", cli.objects.display()))?;
    let (objects, warnings) = parse_object_list(&payload)?;
    if !warnings.is_empty() {
        log::warn!("{} object field(s) fell back to defaults", warnings.len());
    }

    log::info!(
        "Routing {} object(s) over {} cycle(s)",
        objects.len(),
        cli.cycles
    );

    let mut output = objects.clone();
    for _ in 0..cli.cycles.max(1) {
        output = engine.process(objects.clone());
    }

    let report = engine.last_report();
    log::info!(
        "Last cycle: {} routed, {} muted, {} bed, {} grouped, locked {:?}",
        report.routed,
        report.muted,
        report.bed,
        report.group_copied,
        report.locked
    );

    let json = serde_json::to_string_pretty(&mdo_routing::object_list_value(&output))?;
    println!("{}", json);
    Ok(())
}
