//! Info command - summarize an asset

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use nether_gltf::gltf::CameraType;
use nether_gltf::{load_gltf, GltfState, GltfView, RenderingParameters};

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// Asset to inspect (.gltf or .glb)
    pub file: PathBuf,
}

/// Execute the info command
pub fn execute(args: InfoArgs) -> Result<()> {
    let gltf = load_gltf(&args.file, HashMap::new())
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    println!("=== {} ===", args.file.display());
    if let Some(generator) = &gltf.asset.generator {
        println!("  Generator: {}", generator);
    }

    let default_scene = gltf.default_scene();
    let scene_count = gltf.scenes.len();
    let scene_names: Vec<String> = gltf
        .scenes
        .iter()
        .map(|s| s.name.clone().unwrap_or_default())
        .collect();
    let mut state = GltfState::new(RenderingParameters::default());
    state.set_gltf(gltf, 1.0);

    println!();
    println!("Scenes ({}):", scene_count);
    for (index, name) in scene_names.iter().enumerate() {
        state.scene_index = index;
        let stats = GltfView::gather_statistics(&state);
        let marker = if index == default_scene { "*" } else { " " };
        println!(
            " {}[{}] {:<20} meshes: {:<4} faces: {:<8} opaque materials: {:<3} transparent materials: {}",
            marker,
            index,
            name,
            stats.mesh_count,
            stats.face_count,
            stats.opaque_material_count,
            stats.transparent_material_count
        );
    }

    let Some(gltf) = state.gltf() else {
        return Ok(());
    };

    println!();
    println!("Animations ({}):", gltf.animations.len());
    for (index, animation) in gltf.animations.iter().enumerate() {
        println!(
            "  [{}] {:<20} {:.3}s, {} channels, disjoint with {:?}",
            index,
            animation.name.as_deref().unwrap_or(""),
            animation.max_time,
            animation.channels.len(),
            animation.disjoint_animations
        );
    }

    if !gltf.variants.is_empty() {
        println!();
        println!("Variants ({}):", gltf.variants.len());
        for (index, variant) in gltf.variants.iter().enumerate() {
            println!("  [{}] {}", index, variant);
        }
    }

    println!();
    println!("Cameras ({}):", gltf.cameras.len());
    for (index, camera) in gltf.cameras.iter().enumerate() {
        let kind = match camera.ty {
            CameraType::Perspective => "perspective",
            CameraType::Orthographic => "orthographic",
        };
        let node = camera
            .node
            .map_or_else(|| "unattached".to_string(), |n| format!("node {}", n));
        println!(
            "  [{}] {:<20} {} ({})",
            index,
            camera.name.as_deref().unwrap_or(""),
            kind,
            node
        );
    }

    Ok(())
}
