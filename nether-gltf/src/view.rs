//! Frame driver
//!
//! [`GltfView`] owns the renderer and the IBL filter settings. Each
//! [`GltfView::render_frame`] samples the active animations, refreshes the
//! node hierarchy of the selected scene and draws it.

use glam::Mat4;
use hashbrown::HashSet;

use crate::config::RenderingParameters;
use crate::error::LoadError;
use crate::gpu::GpuDevice;
use crate::ibl::{IblSampler, Panorama};
use crate::render::Renderer;
use crate::shader::ShaderCache;
use crate::state::GltfState;

/// Counts over the meshes reachable from the active scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// One per node instancing a mesh
    pub mesh_count: usize,
    pub face_count: usize,
    pub opaque_material_count: usize,
    pub transparent_material_count: usize,
}

pub struct GltfView {
    renderer: Renderer,
    ibl_sampler: IblSampler,
}

impl GltfView {
    pub fn new(parameters: &RenderingParameters) -> Self {
        Self {
            renderer: Renderer::new(parameters),
            ibl_sampler: IblSampler::default(),
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Compiled shader permutations
    pub fn shaders(&self) -> &ShaderCache {
        self.renderer.shaders()
    }

    pub fn ibl_sampler(&self) -> &IblSampler {
        &self.ibl_sampler
    }

    /// Replace the filter settings used by later [`load_environment`](Self::load_environment) calls
    pub fn set_ibl_sampler(&mut self, sampler: IblSampler) {
        self.ibl_sampler = sampler;
    }

    /// Render one frame of `state` at `width` x `height`
    pub fn render_frame(&mut self, device: &mut dyn GpuDevice, state: &mut GltfState, width: u32, height: u32) {
        self.renderer.resize(width, height);

        let scene = state.scene_index;
        let time = state.animation_timer.elapsed_secs();
        if let Some(gltf) = state.gltf.as_mut() {
            if scene < gltf.scenes.len() {
                gltf.apply_animations(&state.animation_indices, time);
                gltf.apply_transform_hierarchy(scene, Mat4::IDENTITY);
            }
        }

        self.renderer.draw_scene(device, state);
    }

    /// Pre-filter `panorama` and make it the environment of `state`
    pub fn load_environment(
        &mut self,
        device: &mut dyn GpuDevice,
        state: &mut GltfState,
        panorama: &Panorama,
    ) -> Result<(), LoadError> {
        let environment = self
            .ibl_sampler
            .filter(device, self.renderer.shaders_mut(), panorama)?;
        tracing::debug!(
            "Filtered {}x{} panorama into {} specular mips",
            panorama.width,
            panorama.height,
            environment.mip_count
        );
        state.set_environment(device, Some(environment));
        Ok(())
    }

    /// Mesh, face and material counts of the active scene
    pub fn gather_statistics(state: &GltfState) -> Statistics {
        let Some(gltf) = state.gltf() else {
            return Statistics::default();
        };
        let active_variant = state.active_variant();

        let mut statistics = Statistics::default();
        let mut materials = HashSet::new();
        for node in gltf.gather_nodes(state.scene_index) {
            let Some(mesh) = gltf.nodes[node].mesh.and_then(|m| gltf.meshes.get(m)) else {
                continue;
            };
            statistics.mesh_count += 1;
            for primitive in &mesh.primitives {
                let Some(material) = primitive.effective_material(active_variant) else {
                    continue;
                };
                statistics.face_count += primitive.face_count(&gltf.accessors);
                materials.insert(material);
            }
        }

        for material in materials.iter().filter_map(|&m| gltf.materials.get(m)) {
            if material.is_blend() {
                statistics.transparent_material_count += 1;
            } else {
                statistics.opaque_material_count += 1;
            }
        }
        statistics
    }

    /// Delete the renderer's GPU objects and the environment of `state`
    pub fn release(&mut self, device: &mut dyn GpuDevice, state: &mut GltfState) {
        self.renderer.release(device);
        state.set_environment(device, None);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::gltf::Gltf;
    use crate::gpu::HeadlessDevice;

    /// Node 0 animated along +X over one second; node 1 a static child of node 0
    fn animated_scene() -> Gltf {
        let json = br#"{
            "asset": { "version": "2.0" },
            "scenes": [ { "nodes": [0] } ],
            "nodes": [
                { "children": [1], "mesh": 0 },
                { "translation": [0, 1, 0], "mesh": 0 }
            ],
            "meshes": [ { "primitives": [
                { "attributes": { "POSITION": 2 }, "material": 0 },
                { "attributes": { "POSITION": 2 }, "material": 1 },
                { "attributes": { "POSITION": 2 } }
            ] } ],
            "materials": [ {}, { "alphaMode": "BLEND" } ],
            "animations": [ {
                "channels": [ { "sampler": 0, "target": { "node": 0, "path": "translation" } } ],
                "samplers": [ { "input": 0, "output": 1 } ]
            } ],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR" },
                { "bufferView": 1, "componentType": 5126, "count": 2, "type": "VEC3" },
                { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC3" }
            ],
            "bufferViews": [
                { "buffer": 0, "byteLength": 8 },
                { "buffer": 0, "byteOffset": 8, "byteLength": 24 },
                { "buffer": 0, "byteOffset": 32, "byteLength": 36 }
            ],
            "buffers": [ { "byteLength": 68 } ]
        }"#;
        let floats: [f32; 17] = [
            0.0, 1.0, // times
            0.0, 0.0, 0.0, 4.0, 0.0, 0.0, // translations
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, // triangle
        ];
        let mut gltf = Gltf::from_json_slice(json).unwrap();
        gltf.buffers[0].data = bytemuck::cast_slice(&floats).to_vec();
        gltf.initialize();
        gltf
    }

    fn state() -> GltfState {
        let mut state = GltfState::new(RenderingParameters::default());
        state.set_gltf(animated_scene(), 1.0);
        state
    }

    #[test]
    fn frame_samples_animation_before_hierarchy() {
        let mut state = state();
        state.animation_timer.set_fixed_time(Some(0.5));
        let mut view = GltfView::new(&state.rendering_parameters);
        let mut device = HeadlessDevice::new();

        view.render_frame(&mut device, &mut state, 320, 240);

        let nodes = &state.gltf().unwrap().nodes;
        let child = nodes[1].world_transform.w_axis.truncate();
        assert!(child.abs_diff_eq(Vec3::new(2.0, 1.0, 0.0), 1e-5));
        assert!((view.renderer().aspect_ratio() - 320.0 / 240.0).abs() < 1e-6);
        // Two nodes with three primitives each; the unassigned one draws with the default material
        assert_eq!(view.renderer().last_frame().drawn, 6);
    }

    #[test]
    fn stopped_timer_leaves_rest_pose() {
        let mut state = state();
        let mut view = GltfView::new(&state.rendering_parameters);
        let mut device = HeadlessDevice::new();

        view.render_frame(&mut device, &mut state, 16, 16);

        let nodes = &state.gltf().unwrap().nodes;
        let child = nodes[1].world_transform.w_axis.truncate();
        assert!(child.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn statistics_count_instances_and_materials() {
        let state = state();
        let statistics = GltfView::gather_statistics(&state);
        assert_eq!(
            statistics,
            Statistics {
                mesh_count: 2,
                face_count: 6,
                opaque_material_count: 2,
                transparent_material_count: 1,
            }
        );
    }

    #[test]
    fn statistics_without_asset_are_zero() {
        let state = GltfState::new(RenderingParameters::default());
        assert_eq!(GltfView::gather_statistics(&state), Statistics::default());
    }

    #[test]
    fn missing_scene_still_clears() {
        let mut state = state();
        state.scene_index = 7;
        let mut view = GltfView::new(&state.rendering_parameters);
        let mut device = HeadlessDevice::new();

        view.render_frame(&mut device, &mut state, 8, 8);
        assert_eq!(device.draw_count(), 0);
        assert!(view.renderer().last_frame().passes.is_empty());
    }
}
