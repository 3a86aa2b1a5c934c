//! Shaders command - list the permutations one frame compiles
//!
//! The frame is rendered on the headless device, so no GPU is needed; the
//! define lists are exactly what a real context would receive.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use nether_gltf::{load_environment, load_gltf, GltfState, GltfView, HeadlessDevice, RenderingParameters};

/// Arguments for the shaders command
#[derive(Args)]
pub struct ShadersArgs {
    /// Asset to render (.gltf or .glb)
    pub file: PathBuf,

    /// Rendering parameters (TOML); defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Animation time in seconds
    #[arg(short, long)]
    pub time: Option<f32>,

    /// Equirectangular HDR environment to pre-filter before rendering
    #[arg(short, long)]
    pub environment: Option<PathBuf>,

    /// Scene to render (default: the asset's default scene)
    #[arg(short, long)]
    pub scene: Option<usize>,

    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    #[arg(long, default_value_t = 1080)]
    pub height: u32,
}

/// Execute the shaders command
pub fn execute(args: ShadersArgs) -> Result<()> {
    let parameters = match &args.config {
        Some(path) => RenderingParameters::load(path)
            .with_context(|| format!("Failed to read rendering parameters {}", path.display()))?,
        None => RenderingParameters::default(),
    };
    let gltf = load_gltf(&args.file, HashMap::new())
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    let mut device = HeadlessDevice::new();
    let mut view = GltfView::new(&parameters);
    let mut state = GltfState::new(parameters);
    let aspect_ratio = args.width as f32 / args.height.max(1) as f32;
    state.set_gltf(gltf, aspect_ratio);
    if let Some(scene) = args.scene {
        state.scene_index = scene;
    }
    if let Some(time) = args.time {
        state.animation_timer.set_fixed_time(Some(time));
    }

    if let Some(path) = &args.environment {
        let panorama = load_environment(path)
            .with_context(|| format!("Failed to decode environment {}", path.display()))?;
        view.load_environment(&mut device, &mut state, &panorama)
            .context("Failed to filter environment")?;
    }

    tracing::info!("Rendering {}x{} headless frame", args.width, args.height);
    view.render_frame(&mut device, &mut state, args.width, args.height);

    let report = view.renderer().last_frame();
    println!("=== {} ===", args.file.display());
    println!("  Passes: {}", report.passes.join(" -> "));
    println!("  Draws: {} ({} skipped)", report.drawn, report.skipped);
    println!(
        "  Shaders: {} compiled, {} programs linked",
        device.compile_count(),
        device.link_count()
    );

    let mut shaders: Vec<_> = view.shaders().compiled_shaders().collect();
    shaders.sort_by(|(ha, a), (hb, b)| a.identifier.cmp(&b.identifier).then(ha.cmp(hb)));
    for (hash, shader) in shaders {
        println!();
        println!("{} [{:016x}]", shader.identifier, hash);
        if shader.defines.is_empty() {
            println!("  (no defines)");
        }
        for define in &shader.defines {
            println!("  #define {}", define);
        }
    }

    view.release(&mut device, &mut state);
    Ok(())
}
