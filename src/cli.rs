//! Command-line interface.

use crate::config::SceneConfig;
use crate::render::ApiVersion;
use clap::Parser;

/// Render user marks on a headless graphics context.
#[derive(Parser, Debug)]
#[command(name = "Drape")]
#[command(version)]
#[command(author)]
#[command(about = "Render user marks on a headless graphics context", long_about = None)]
pub struct Cli {
    /// JSON file containing the scene (symbols, groups of marks and lines,
    /// GUI layout).
    #[arg(long = "scene", value_parser = clap::value_parser!(SceneConfig))]
    pub scene: Option<SceneConfig>,

    /// Number of random marks to add to the scene.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=100000))]
    pub random_marks: u32,

    /// Graphics API to emulate.
    #[arg(long, value_enum, default_value_t = ApiVersion::OpenGLES3)]
    pub api: ApiVersion,

    /// Window width, in pixels.
    #[arg(long, default_value_t = 800, value_parser = clap::value_parser!(u32).range(1..=16384))]
    pub width: u32,

    /// Window height, in pixels.
    #[arg(long, default_value_t = 600, value_parser = clap::value_parser!(u32).range(1..=16384))]
    pub height: u32,

    /// Number of zoom steps to simulate, each one drawing at least a frame.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(0..=1000))]
    pub frames: u32,

    /// Maximum number of pixels a tile should be scaled to, before switching to
    /// the next zoom level.
    #[arg(long, default_value_t = 512, value_parser = clap::value_parser!(u32).range(100..=10000))]
    pub max_pixels_per_tile: u32,

    /// Maximum zoom level to request tiles for.
    #[arg(long, default_value_t = 18, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_tile_level: u32,
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["drape"]);
        assert!(cli.scene.is_none());
        assert_eq!(cli.api, ApiVersion::OpenGLES3);
        assert_eq!((cli.width, cli.height), (800, 600));
        assert_eq!(cli.max_tile_level, 18);
    }

    #[test]
    fn ranges_are_checked() {
        assert!(Cli::try_parse_from(["drape", "--width", "0"]).is_err());
        assert!(Cli::try_parse_from(["drape", "--max-tile-level", "21"]).is_err());
        let cli = Cli::try_parse_from(["drape", "--api", "vulkan", "--random-marks", "3"]).unwrap();
        assert_eq!(cli.api, ApiVersion::Vulkan);
        assert_eq!(cli.random_marks, 3);
    }
}
