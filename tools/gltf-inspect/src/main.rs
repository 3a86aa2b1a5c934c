//! gltf-inspect - inspect glTF assets with the nether-gltf runtime
//!
//! # Commands
//!
//! - `gltf-inspect info <file>` - scenes, statistics, animations, variants, cameras
//! - `gltf-inspect shaders <file>` - render one headless frame and list shader permutations
//! - `gltf-inspect camera <file>` - export a camera as a minimal glTF document
//!
//! Logging follows `RUST_LOG` (default `info`).

mod camera;
mod info;
mod shaders;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// gltf-inspect - inspect glTF assets with the nether-gltf runtime
#[derive(Parser)]
#[command(name = "gltf-inspect")]
#[command(about = "Inspect glTF 2.0 assets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print scenes, statistics, animations, variants and cameras
    Info(info::InfoArgs),

    /// Render one frame headlessly and list the compiled shader permutations
    Shaders(shaders::ShadersArgs),

    /// Print camera-export JSON for the fitted user camera or a glTF camera
    Camera(camera::CameraArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info(args) => info::execute(args),
        Commands::Shaders(args) => shaders::execute(args),
        Commands::Camera(args) => camera::execute(args),
    }
}
