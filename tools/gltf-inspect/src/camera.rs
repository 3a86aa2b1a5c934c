//! Camera command - export a camera as a minimal glTF document

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use glam::Mat4;
use nether_gltf::gltf::camera_export_json;
use nether_gltf::{load_gltf, GltfState, RenderingParameters};

/// Arguments for the camera command
#[derive(Args)]
pub struct CameraArgs {
    /// Asset to frame (.gltf or .glb)
    pub file: PathBuf,

    /// glTF camera index (default: user camera fitted to the default scene)
    #[arg(short, long)]
    pub camera: Option<usize>,

    /// Viewport aspect ratio used when fitting the user camera
    #[arg(long, default_value_t = 16.0 / 9.0)]
    pub aspect_ratio: f32,
}

/// Execute the camera command
pub fn execute(args: CameraArgs) -> Result<()> {
    let gltf = load_gltf(&args.file, HashMap::new())
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    let mut state = GltfState::new(RenderingParameters::default());
    state.set_gltf(gltf, args.aspect_ratio);
    let scene = state.scene_index;

    let exported = match args.camera {
        Some(index) => {
            let gltf = state.gltf_mut().context("No asset loaded")?;
            gltf.apply_transform_hierarchy(scene, Mat4::IDENTITY);
            let camera = gltf.cameras.get(index).with_context(|| {
                format!("Camera {} does not exist ({} cameras)", index, gltf.cameras.len())
            })?;
            camera_export_json(camera, &camera.world_transform(&gltf.nodes))
        }
        None => camera_export_json(
            &state.user_camera.to_gltf_camera(),
            &state.user_camera.world_transform(),
        ),
    };

    println!("{}", serde_json::to_string_pretty(&exported)?);
    Ok(())
}
