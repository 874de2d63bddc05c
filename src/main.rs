//! Drape - render user marks on a headless graphics context.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use anyhow::Context;
use clap::Parser;
use drape::cli::Cli;
use drape::engine::{DrapeEngine, EngineParams};
use drape::frontend::FrontendParams;
use drape::geometry::Point;
use drape::render::RecordingContext;
use drape::screen::Screen;
use drape::user_marks::UserMarkGenerator;
use log::{debug, info};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Cli {
        scene,
        random_marks,
        api,
        width,
        height,
        frames,
        max_pixels_per_tile,
        max_tile_level,
    } = Cli::parse();

    let mut scene = scene.unwrap_or_default();
    scene.add_random_marks(random_marks as usize);

    let params = EngineParams {
        frontend: FrontendParams {
            width,
            height,
            max_pixels_per_tile: max_pixels_per_tile as usize,
            max_tile_level,
        },
        max_user_mark_zoom: UserMarkGenerator::DEFAULT_MAX_ZOOM,
        symbols: scene.symbols.clone(),
        gui: scene.gui.clone(),
    };
    let engine = DrapeEngine::new(params, RecordingContext::new(api))
        .context("Failed to start the drape engine")?;

    scene.load_into(&engine);
    engine.sync();

    // Zoom in step by step, waiting until the tiles of each view are generated.
    for i in 0..frames {
        debug!("[{i}] Zooming in");
        engine.scroll(5.0);
        engine.invalidate();
        engine.sync();
    }

    let compass = scene.gui.compass.resolve(&Screen::new(width, height));
    let tapped = engine.tap(Point::new(compass.x as f64, compass.y as f64));
    info!("Tap on the compass position hit {tapped:?}");

    let stats = engine.stop()?;
    info!(
        "Drew {} frames with {} user mark buckets, generated {} tiles ({} received, {} dropped)",
        stats.frames.frames,
        stats.frames.user_mark_draws,
        stats.backend.generated_tiles,
        stats.frames.flushed_tiles,
        stats.frames.dropped_tiles,
    );

    Ok(())
}
