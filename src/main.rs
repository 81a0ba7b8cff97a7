mod config;
mod event;
mod relay;
mod sim;

use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use tessel_cells::CellRegistry;

use crate::sim::Sim;

/// Headless tick loop hosting relays that match structures and scan for partners.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host config (world, scan settings, relays, scripted edits)
    #[arg(long, default_value = "assets/host.toml")]
    config: PathBuf,
    /// Override the number of ticks to run
    #[arg(long)]
    ticks: Option<u64>,
    /// Override the world generation seed
    #[arg(long)]
    seed: Option<i32>,
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(level: LevelFilter, file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Debug)
        .build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = file {
        loggers.push(WriteLogger::new(level, config, File::create(path)?));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.log_level, args.log_file.as_deref())?;

    let mut cfg = config::load_from_path(&args.config)?;
    if let Some(ticks) = args.ticks {
        cfg.ticks = ticks;
    }
    if let Some(seed) = args.seed {
        cfg.world.worldgen.seed = seed;
    }
    let reg = CellRegistry::load_from_path(&cfg.cells)?;
    log::info!("{} cell type(s) from {}", reg.len(), cfg.cells);

    let mut sim = Sim::new(&cfg, reg)?;
    sim.run(cfg.ticks, cfg.tick_ms);
    let settled = sim.settle(Duration::from_secs(5));

    for r in sim.relays() {
        match r.link {
            Some(l) => log::info!(
                target: "relay",
                "{:<10} complete={} link={:?} d={:.2} scans={}",
                r.name,
                r.complete,
                l.pos,
                l.distance,
                r.scans_applied
            ),
            None => log::info!(
                target: "relay",
                "{:<10} complete={} level={:?} unlinked scans={}",
                r.name,
                r.complete,
                r.incomplete_level,
                r.scans_applied
            ),
        }
    }

    let tiles = sim.world().read()?.tile_count();
    if sim.pending_events() > 0 {
        log::warn!(
            "{} scripted event(s) after tick {} never ran",
            sim.pending_events(),
            sim.tick()
        );
    }
    let stats = sim.shutdown();
    log::info!(
        "{} ticks: {} edits, {} completed, {} broken, {} relay tile(s)",
        stats.ticks,
        stats.edits,
        stats.completed,
        stats.broken,
        tiles
    );
    log::info!(
        "scans: {} submitted, {} applied, {} stale, {} cancelled, {} failed",
        stats.submitted,
        stats.applied,
        stats.stale,
        stats.cancelled,
        stats.failed
    );
    if !settled {
        return Err("scan queue did not drain before shutdown".into());
    }
    Ok(())
}
