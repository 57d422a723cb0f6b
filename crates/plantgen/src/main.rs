//! plantgen - grows a procedural plant headlessly and logs its geometry.
//!
//! Usage: `plantgen [config.ron]` or `plantgen --init [config.ron]` to write
//! the default configuration.

mod config;
mod report;

use anyhow::{Context, Result};
use config::{Generator, PlantConfig};
use plant_core::{ClockSource, TickClock, TransformRaw};
use procgen::{BranchGraph, GrowthDriver, GrowthFrame, GrowthSession, LSystem, SpaceColonization};
use report::FrameStats;
use std::path::PathBuf;
use std::time::Duration;

/// Build the branch topology with the configured generator.
fn grow_topology(generator: &Generator) -> Result<BranchGraph> {
    match generator {
        Generator::SpaceColonization(cfg) => {
            let grower = SpaceColonization::new(cfg.clone()).context("invalid space colonization config")?;
            let graph = grower.run();
            log::info!("Space colonization grew {} segments", graph.len());
            Ok(graph)
        }
        Generator::LSystem(cfg) => {
            let lsystem = LSystem::new(cfg.clone()).context("invalid L-system config")?;
            let word = lsystem.expand();
            log::info!("L-system word has {} symbols after {} iterations", word.len(), cfg.iterations);
            let result = lsystem.interpret(&word);
            if result.unbalanced_pops > 0 {
                log::warn!("{} unbalanced ']' ignored", result.unbalanced_pops);
            }
            if result.final_depth > 1 {
                log::warn!("{} branch contexts left open", result.final_depth - 1);
            }
            log::info!(
                "L-system produced {} segments and {} shapes",
                result.graph.len(),
                result.graph.shape_count()
            );
            Ok(result.graph)
        }
    }
}

/// Feed one frame to the clock and run every fixed tick it unlocked.
fn pump(
    driver: &GrowthDriver,
    session: &mut GrowthSession,
    clock: &mut TickClock,
    frame_delta: Duration,
) -> Option<GrowthFrame> {
    match clock.source() {
        ClockSource::WallClock => {
            std::thread::sleep(frame_delta);
            clock.update();
        }
        ClockSource::Simulated => clock.advance(frame_delta),
    }
    let mut last = None;
    while clock.next_tick() {
        last = Some(driver.tick(session, clock.tick_seconds()));
    }
    last
}

fn log_frame(frame: &GrowthFrame) {
    let stats = FrameStats::from_frame(frame);
    let shape_nodes: Vec<TransformRaw> = frame
        .shapes
        .iter()
        .filter(|s| s.visible)
        .map(|s| TransformRaw::from(&s.transform))
        .collect();
    log::info!(
        "t={:.1}s {} | {} vertex bytes, {} shape node bytes",
        frame.time,
        stats,
        FrameStats::vertex_bytes(frame),
        bytemuck::cast_slice::<_, u8>(&shape_nodes).len()
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let first = args.next();
    if first.as_deref() == Some("--init") {
        let path = args.next().map(PathBuf::from).unwrap_or_else(config::default_path);
        PlantConfig::default().save(&path)?;
        log::info!("Wrote default config to {:?}", path);
        return Ok(());
    }

    let path = first.map(PathBuf::from).unwrap_or_else(config::default_path);
    let config = PlantConfig::load(&path)?;

    let graph = grow_topology(&config.generator)?;
    let driver = GrowthDriver::new(config.visual.clone()).context("invalid visual config")?;
    let mut session = driver.start(graph)?;

    let mut clock = if config.realtime {
        let mut clock = TickClock::new(ClockSource::WallClock);
        clock.set_tick_rate(config.tick_rate_hz);
        clock
    } else {
        TickClock::simulated(config.tick_rate_hz)
    };
    let frame_delta = clock.tick_length();

    let mut last_logged = 0.0;
    while !session.is_senescent() {
        if clock.elapsed_seconds() >= config.max_seconds {
            log::warn!("Growth not finished after {:.0}s, stopping", config.max_seconds);
            break;
        }
        if let Some(frame) = pump(&driver, &mut session, &mut clock, frame_delta) {
            if frame.time - last_logged >= 1.0 || frame.senescent {
                last_logged = frame.time;
                log_frame(&frame);
            }
        }
    }

    let linger_until = clock.elapsed_seconds() + config.linger_seconds;
    let mut last_frame = None;
    while clock.elapsed_seconds() < linger_until {
        if let Some(frame) = pump(&driver, &mut session, &mut clock, frame_delta) {
            last_frame = Some(frame);
        }
    }
    if let Some(frame) = last_frame {
        log_frame(&frame);
    }

    log::info!(
        "Done: {} branches, {} ticks, {:.1}s simulated",
        session.branches().len(),
        clock.tick_count(),
        clock.elapsed_seconds()
    );
    Ok(())
}
