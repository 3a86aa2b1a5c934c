//! Scene renderer
//!
//! Walks the frame [`RenderGraph`]: an optional offscreen transmission source
//! (opaque and transparent draws, then a mip chain), followed by the
//! environment, opaque, transmissive and transparent passes on the surface.
//! Each primitive selects its shader permutation from vertex and material
//! defines, binds its buffers and textures, uploads uniforms and draws.

use glam::{Mat4, Vec3};
use hashbrown::HashSet;

use super::draw_list::{Bucket, DrawLists, Drawable};
use super::environment::{environment_rotation, EnvironmentRenderer};
use super::graph::{PassKind, PassTarget, RenderGraph};
use super::resources::{full_mip_chain, GpuResources};
use crate::config::RenderingParameters;
use crate::error::ShaderError;
use crate::gltf::{fallback_lights, shader_attribute_name, target_attribute_name, Gltf, MAX_MORPH_WEIGHTS};
use crate::gpu::{
    FramebufferHandle, GpuDevice, RenderState, RenderTarget, SamplerDescriptor, TextureDescriptor,
    TextureDimension, TextureHandle,
};
use crate::ibl::Environment;
use crate::shader::{Define, ShaderCache, ShaderDefines, ShaderProgram, UniformValue};
use crate::state::GltfState;

/// Morph target semantics bound as per-target vertex attributes
const TARGET_SEMANTICS: [&str; 3] = ["POSITION", "NORMAL", "TANGENT"];

/// What the last [`Renderer::draw_scene`] call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Executed passes, in order
    pub passes: Vec<&'static str>,
    /// Primitive draws issued
    pub drawn: usize,
    /// Primitives that could not be drawn (shader or upload failure)
    pub skipped: usize,
}

/// Offscreen target the transmissive pass samples from
#[derive(Debug, Clone, Copy)]
struct TransmissionTarget {
    framebuffer: FramebufferHandle,
    color: TextureHandle,
    depth: TextureHandle,
    size: u32,
}

/// Per-frame values shared by every draw
struct FrameContext<'a> {
    view: Mat4,
    projection: Mat4,
    view_projection: Mat4,
    camera_position: Vec3,
    light_count: usize,
    lights: UniformValue,
    environment: Option<&'a Environment>,
    parameters: &'a RenderingParameters,
}

fn primitive_program<'a>(
    device: &mut dyn GpuDevice,
    shaders: &'a mut ShaderCache,
    vertex_defines: &ShaderDefines,
    fragment_defines: &ShaderDefines,
) -> Result<&'a mut ShaderProgram, ShaderError> {
    let vs = shaders.select_shader(device, "primitive.vert", vertex_defines)?;
    let fs = shaders.select_shader(device, "pbr.frag", fragment_defines)?;
    shaders.get_shader_program(device, vs, fs)
}

/// Lights of the reachable nodes, or the key/fill pair when the scene is
/// unlit and IBL is disabled
fn visible_lights(gltf: &Gltf, nodes: &[usize], parameters: &RenderingParameters) -> Vec<UniformValue> {
    let mut lights = Vec::new();
    if parameters.use_punctual && parameters.enabled_extensions.lights_punctual {
        let reachable: HashSet<usize> = nodes.iter().copied().collect();
        for light in &gltf.lights {
            let Some(node) = light.node else {
                continue;
            };
            if reachable.contains(&node) {
                lights.push(light.to_uniform(&gltf.nodes[node].world_transform));
            }
        }
    }
    if lights.is_empty() && !parameters.use_ibl && parameters.use_directional_lights_with_disabled_ibl {
        lights = fallback_lights()
            .iter()
            .map(|(light, world)| light.to_uniform(world))
            .collect();
    }
    lights
}

pub struct Renderer {
    shaders: ShaderCache,
    resources: GpuResources,
    environment_renderer: EnvironmentRenderer,
    transmission: Option<TransmissionTarget>,
    /// State generation the cached resources belong to
    resource_generation: u64,
    width: u32,
    height: u32,
    last_frame: FrameReport,
}

impl Renderer {
    pub fn new(parameters: &RenderingParameters) -> Self {
        Self {
            shaders: ShaderCache::with_builtin_sources(&parameters.glsl_version),
            resources: GpuResources::new(),
            environment_renderer: EnvironmentRenderer::new(),
            transmission: None,
            resource_generation: 0,
            width: 1,
            height: 1,
            last_frame: FrameReport::default(),
        }
    }

    pub fn shaders(&self) -> &ShaderCache {
        &self.shaders
    }

    pub fn shaders_mut(&mut self) -> &mut ShaderCache {
        &mut self.shaders
    }

    pub fn resources(&self) -> &GpuResources {
        &self.resources
    }

    pub fn last_frame(&self) -> &FrameReport {
        &self.last_frame
    }

    /// Surface size in pixels
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Clear the surface without drawing anything
    pub fn clear_frame(&mut self, device: &mut dyn GpuDevice, color: [f32; 4]) {
        device.bind_render_target(RenderTarget::Surface);
        device.set_viewport(0, 0, self.width, self.height);
        device.clear(Some(color), true);
    }

    /// Delete every GPU object owned by the renderer
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        self.resources.release(device);
        self.environment_renderer.release(device);
        self.release_transmission_target(device);
    }

    /// Render the selected scene of `state` to the surface.
    ///
    /// Node world transforms must be current; [`GltfView`](crate::view::GltfView)
    /// updates them before calling this.
    pub fn draw_scene(&mut self, device: &mut dyn GpuDevice, state: &mut GltfState) {
        self.last_frame = FrameReport::default();
        if state.generation() != self.resource_generation {
            self.resources.release(device);
            self.resource_generation = state.generation();
        }

        let active_variant = state.active_variant();
        let aspect_ratio = self.aspect_ratio();
        let GltfState {
            gltf,
            environment,
            user_camera,
            scene_index,
            camera_index,
            rendering_parameters: parameters,
            ..
        } = state;

        let Some(gltf) = gltf.as_ref() else {
            self.clear_frame(device, parameters.clear_color);
            return;
        };
        if gltf.scenes.get(*scene_index).is_none() {
            tracing::warn!("Scene {} does not exist", scene_index);
            self.clear_frame(device, parameters.clear_color);
            return;
        }

        let selected_camera = match *camera_index {
            Some(index) => {
                let camera = gltf.cameras.get(index);
                if camera.is_none() {
                    tracing::warn!("Camera {} does not exist; using the user camera", index);
                }
                camera
            }
            None => None,
        };
        let (view, projection, camera_position) = match selected_camera {
            Some(camera) => (
                camera.view_matrix(&gltf.nodes),
                camera.projection_matrix(aspect_ratio),
                camera.position(&gltf.nodes),
            ),
            None => (
                user_camera.view_matrix(),
                user_camera.projection_matrix(aspect_ratio),
                user_camera.position(),
            ),
        };

        let nodes = gltf.gather_nodes(*scene_index);

        let lights = visible_lights(gltf, &nodes, parameters);
        let frame = FrameContext {
            view,
            projection,
            view_projection: projection * view,
            camera_position,
            light_count: lights.len(),
            lights: UniformValue::Array(lights),
            environment: environment.as_ref(),
            parameters,
        };

        let lists = DrawLists::build(gltf, &nodes, &view, active_variant);
        let transmission = !lists.transmissive.is_empty()
            && self.ensure_transmission_target(device, parameters.transmission_framebuffer_size);
        let graph = match RenderGraph::frame(transmission) {
            Ok(graph) => graph,
            Err(e) => {
                tracing::error!("Invalid frame graph: {}", e);
                self.clear_frame(device, parameters.clear_color);
                return;
            }
        };

        let mut bound = None;
        for pass in graph.passes() {
            self.last_frame.passes.push(pass.name);
            if bound != Some(pass.target) {
                self.bind_pass_target(device, pass.target, parameters.clear_color);
                bound = Some(pass.target);
            }

            match pass.kind {
                PassKind::Environment => {
                    if let Some(environment) = frame.environment {
                        if parameters.render_environment_map {
                            self.environment_renderer.draw(
                                device,
                                &mut self.shaders,
                                &frame.view_projection,
                                environment,
                                parameters,
                            );
                        }
                    }
                }
                PassKind::Draw(bucket) => {
                    let source = match bucket {
                        Bucket::Transmissive => self.transmission.map(|t| t.color),
                        _ => None,
                    };
                    for drawable in lists.bucket(bucket) {
                        if self.draw_primitive(device, gltf, drawable, &frame, source) {
                            self.last_frame.drawn += 1;
                        } else {
                            self.last_frame.skipped += 1;
                        }
                    }
                }
                PassKind::GenerateMipmaps => {
                    if let Some(target) = self.transmission {
                        device.generate_mipmaps(target.color);
                    }
                }
            }
        }

        tracing::trace!(
            "Frame: {} passes, {} draws, {} skipped",
            self.last_frame.passes.len(),
            self.last_frame.drawn,
            self.last_frame.skipped
        );
    }

    fn bind_pass_target(&mut self, device: &mut dyn GpuDevice, target: PassTarget, clear_color: [f32; 4]) {
        match (target, self.transmission) {
            (PassTarget::TransmissionSource, Some(transmission)) => {
                device.bind_render_target(RenderTarget::Framebuffer(transmission.framebuffer));
                device.set_viewport(0, 0, transmission.size, transmission.size);
            }
            _ => {
                device.bind_render_target(RenderTarget::Surface);
                device.set_viewport(0, 0, self.width, self.height);
            }
        }
        device.clear(Some(clear_color), true);
    }

    /// Create (or resize) the offscreen transmission source; false when unavailable
    fn ensure_transmission_target(&mut self, device: &mut dyn GpuDevice, size: u32) -> bool {
        let size = size.max(1);
        if self.transmission.is_some_and(|t| t.size == size) {
            return true;
        }
        self.release_transmission_target(device);

        let color = device.create_texture(&TextureDescriptor {
            label: "transmission color",
            dimension: TextureDimension::D2,
            width: size,
            height: size,
            format: wgpu::TextureFormat::Rgba8Unorm,
            mip_levels: full_mip_chain(size, size),
        });
        let color = match color {
            Ok(color) => color,
            Err(e) => {
                tracing::error!("Transmission source unavailable: {}", e);
                return false;
            }
        };
        device.set_sampler(color, &SamplerDescriptor::clamped_linear(true));

        let depth = match device.create_texture(&TextureDescriptor {
            label: "transmission depth",
            dimension: TextureDimension::D2,
            width: size,
            height: size,
            format: wgpu::TextureFormat::Depth24Plus,
            mip_levels: 1,
        }) {
            Ok(depth) => depth,
            Err(e) => {
                tracing::error!("Transmission depth unavailable: {}", e);
                device.delete_texture(color);
                return false;
            }
        };

        match device.create_framebuffer(color, Some(depth)) {
            Ok(framebuffer) => {
                tracing::debug!("Created {}x{} transmission source", size, size);
                self.transmission = Some(TransmissionTarget {
                    framebuffer,
                    color,
                    depth,
                    size,
                });
                true
            }
            Err(e) => {
                tracing::error!("Transmission framebuffer unavailable: {}", e);
                device.delete_texture(color);
                device.delete_texture(depth);
                false
            }
        }
    }

    fn release_transmission_target(&mut self, device: &mut dyn GpuDevice) {
        if let Some(target) = self.transmission.take() {
            device.delete_texture(target.color);
            device.delete_texture(target.depth);
        }
    }

    /// Draw one primitive; false when it had to be skipped
    fn draw_primitive(
        &mut self,
        device: &mut dyn GpuDevice,
        gltf: &Gltf,
        drawable: &Drawable,
        frame: &FrameContext<'_>,
        transmission_source: Option<TextureHandle>,
    ) -> bool {
        let parameters = frame.parameters;
        let Some(node) = gltf.nodes.get(drawable.node) else {
            return false;
        };
        let Some(mesh) = gltf.meshes.get(drawable.mesh) else {
            return false;
        };
        let Some(primitive) = mesh.primitives.get(drawable.primitive) else {
            return false;
        };
        let Some(material) = gltf.materials.get(drawable.material) else {
            return false;
        };
        let skin = node.skin.and_then(|s| gltf.skins.get(s));

        // Morph targets get whatever attribute slots the base attributes leave
        let attributes_per_target = primitive.targets.first().map_or(1, |t| t.len().max(1));
        let target_limit = (device.max_vertex_attributes() as usize).saturating_sub(primitive.attributes.len())
            / attributes_per_target;
        let joint_count = skin.map(|s| s.joints.len()).filter(|&n| n > 0);
        let vertex_defines = primitive.defines(&gltf.accessors, parameters, joint_count, target_limit);

        let mut fragment_defines = material.defines(&parameters.enabled_extensions);
        fragment_defines.extend(vertex_defines.iter().copied());
        if frame.light_count > 0 {
            fragment_defines.insert(Define::UsePunctual);
            fragment_defines.insert(Define::LightCount(frame.light_count as u32));
        }
        if parameters.use_ibl && frame.environment.is_some() {
            fragment_defines.insert(Define::UseIbl);
        }
        fragment_defines.insert(Define::ToneMap(parameters.tone_map));
        fragment_defines.insert(Define::Debug(parameters.debug_output));

        let program = match primitive_program(device, &mut self.shaders, &vertex_defines, &fragment_defines) {
            Ok(program) => program,
            Err(e) => {
                tracing::error!(
                    "Skipping primitive {} of mesh {}: {}",
                    drawable.primitive,
                    drawable.mesh,
                    e
                );
                return false;
            }
        };
        device.use_program(program.handle());

        let indices = match primitive.indices {
            Some(accessor) => match self.resources.index_buffer(device, gltf, accessor) {
                Some(indices) => Some(indices),
                None => return false,
            },
            None => None,
        };

        let mut enabled = Vec::new();
        let mut vertex_count = None;
        let mut bindings: Vec<(String, usize)> = primitive
            .attributes
            .iter()
            .map(|(semantic, &accessor)| (shader_attribute_name(semantic), accessor))
            .collect();
        if vertex_defines.contains(&Define::UseMorphing) {
            let count = primitive.active_target_count(target_limit);
            for (i, target) in primitive.targets.iter().take(count).enumerate() {
                for semantic in TARGET_SEMANTICS {
                    if let Some(&accessor) = target.get(semantic) {
                        bindings.push((target_attribute_name(semantic, i), accessor));
                    }
                }
            }
        }
        for (name, accessor) in &bindings {
            let Some(location) = program.attribute_location(name) else {
                continue;
            };
            let Some((buffer, layout)) = self.resources.vertex_buffer(device, gltf, *accessor) else {
                for location in enabled {
                    device.disable_vertex_attribute(location);
                }
                return false;
            };
            device.set_vertex_attribute(location, buffer.handle, layout);
            enabled.push(location);
            if name == "a_position" {
                vertex_count = Some(buffer.count);
            }
        }

        let uniforms = [
            ("u_ViewProjectionMatrix", UniformValue::Mat4(frame.view_projection)),
            ("u_ModelMatrix", UniformValue::Mat4(node.world_transform)),
            ("u_NormalMatrix", UniformValue::Mat4(node.normal_matrix)),
            ("u_Exposure", UniformValue::Float(parameters.exposure)),
            ("u_Camera", UniformValue::Vec3(frame.camera_position)),
        ];
        for (name, value) in &uniforms {
            program.upload_uniform(device, name, value);
        }
        if frame.light_count > 0 {
            program.upload_uniform(device, "u_Lights", &frame.lights);
        }

        if vertex_defines.contains(&Define::UseSkinning) {
            if let Some(matrices) = gltf.joint_matrices(drawable.node) {
                let joints = matrices.joints.into_iter().map(UniformValue::Mat4).collect();
                let normals = matrices.normals.into_iter().map(UniformValue::Mat4).collect();
                program.upload_uniform(device, "u_jointMatrix", &UniformValue::Array(joints));
                program.upload_uniform(device, "u_jointNormalMatrix", &UniformValue::Array(normals));
            }
        }

        if vertex_defines.contains(&Define::UseMorphing) {
            let mut weights = vec![0.0; primitive.targets.len().min(MAX_MORPH_WEIGHTS)];
            let source = node.morph_weights(mesh.weights.as_deref()).unwrap_or(&[]);
            for (weight, value) in weights.iter_mut().zip(source) {
                *weight = *value;
            }
            program.upload_uniform(device, "u_morphWeights", &UniformValue::FloatArray(weights));
        }

        let mut unit = 0u32;
        if fragment_defines.contains(&Define::UseIbl) {
            if let Some(environment) = frame.environment {
                let samplers = [
                    ("u_LambertianEnvSampler", environment.lambertian),
                    ("u_GGXEnvSampler", environment.ggx),
                    ("u_GGXLUT", environment.ggx_lut),
                    ("u_CharlieEnvSampler", environment.charlie),
                    ("u_CharlieLUT", environment.charlie_lut),
                    ("u_SheenELUT", environment.sheen_elut),
                ];
                for (name, texture) in samplers {
                    device.bind_texture(unit, texture);
                    program.upload_uniform(device, name, &UniformValue::Int(unit as i32));
                    unit += 1;
                }
                program.upload_uniform(device, "u_MipCount", &UniformValue::Int(environment.mip_count as i32));
                program.upload_uniform(device, "u_EnvIntensity", &UniformValue::Float(parameters.ibl_intensity));
                program.upload_uniform(
                    device,
                    "u_EnvRotation",
                    &UniformValue::Mat3(environment_rotation(parameters.environment_rotation)),
                );
            }
        }

        if fragment_defines.contains(&Define::MaterialTransmission) {
            if let (Some(source), Some(target)) = (transmission_source, self.transmission) {
                device.bind_texture(unit, source);
                program.upload_uniform(device, "u_TransmissionFramebufferSampler", &UniformValue::Int(unit as i32));
                unit += 1;
                let size = target.size as i32;
                program.upload_uniform(device, "u_TransmissionFramebufferSize", &UniformValue::IVec2([size, size]));
                program.upload_uniform(device, "u_ViewMatrix", &UniformValue::Mat4(frame.view));
                program.upload_uniform(device, "u_ProjectionMatrix", &UniformValue::Mat4(frame.projection));
            }
        }

        for (name, value) in material.properties() {
            program.upload_uniform(device, name, value);
        }
        for texture in material.textures() {
            let handle = match self.resources.texture(device, gltf, texture.info.index) {
                Some(handle) => Some(handle),
                None => self.resources.fallback_white(device),
            };
            let Some(handle) = handle else {
                continue;
            };
            device.bind_texture(unit, handle);
            program.upload_uniform(device, &texture.slot.sampler_uniform(), &UniformValue::Int(unit as i32));
            unit += 1;
        }

        let mut render_state = RenderState::default();
        if node.world_transform.determinant() < 0.0 {
            render_state.front_face = wgpu::FrontFace::Cw;
        }
        if material.double_sided {
            render_state.cull_mode = None;
        }
        if material.is_blend() {
            render_state.blend = Some(RenderState::ALPHA_BLEND);
        }
        device.set_render_state(&render_state);

        let mode = primitive.primitive_mode();
        let drawn = match (indices, vertex_count) {
            (Some(indices), _) => {
                device.draw_elements(mode, indices.buffer.handle, indices.format, indices.buffer.count);
                true
            }
            (None, Some(count)) => {
                device.draw_arrays(mode, 0, count);
                true
            }
            (None, None) => {
                tracing::warn!("Primitive {} of mesh {} has no bound positions", drawable.primitive, drawable.mesh);
                false
            }
        };

        for location in enabled {
            device.disable_vertex_attribute(location);
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCommand, HeadlessDevice};

    const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    /// One triangle mesh instanced by `nodes`, drawn with `materials`
    fn scene(nodes: &str, materials: &str) -> Gltf {
        let json = format!(
            r#"{{
                "asset": {{ "version": "2.0" }},
                "scene": 0,
                "scenes": [ {{ "nodes": [0] }} ],
                "nodes": [ {{ "children": [1, 2] }}, {nodes} ],
                "meshes": [
                    {{ "primitives": [ {{ "attributes": {{ "POSITION": 0 }}, "material": 0 }} ] }},
                    {{ "primitives": [ {{ "attributes": {{ "POSITION": 0 }}, "material": 1 }} ] }}
                ],
                "materials": [ {materials} ],
                "accessors": [ {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" }} ],
                "bufferViews": [ {{ "buffer": 0, "byteLength": 36 }} ],
                "buffers": [ {{ "byteLength": 36 }} ]
            }}"#
        );
        let mut gltf = Gltf::from_json_slice(json.as_bytes()).unwrap();
        gltf.buffers[0].data = bytemuck::cast_slice(&TRIANGLE).to_vec();
        gltf.initialize();
        gltf
    }

    fn state_with(gltf: Gltf, parameters: RenderingParameters) -> GltfState {
        let mut state = GltfState::new(parameters);
        state.set_gltf(gltf, 1.0);
        state.gltf_mut().unwrap().apply_transform_hierarchy(0, Mat4::IDENTITY);
        state
    }

    fn render_states(device: &HeadlessDevice) -> Vec<RenderState> {
        device
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::SetRenderState(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn missing_asset_only_clears() {
        let mut device = HeadlessDevice::new();
        let mut state = GltfState::new(RenderingParameters::default());
        let mut renderer = Renderer::new(&state.rendering_parameters);
        renderer.resize(64, 32);

        renderer.draw_scene(&mut device, &mut state);
        let report = renderer.last_frame().clone();
        assert!(report.passes.is_empty());
        assert_eq!(device.draw_count(), 0);
        assert!(device.commands().contains(&GpuCommand::SetViewport {
            x: 0,
            y: 0,
            width: 64,
            height: 32
        }));
        assert!(matches!(device.commands().last(), Some(GpuCommand::Clear { depth: true, .. })));
    }

    #[test]
    fn opaque_scene_draws_on_surface_only() {
        let gltf = scene(r#"{ "mesh": 0 }, { "mesh": 1 }"#, "{}, {}");
        let mut state = state_with(gltf, RenderingParameters::default());
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);

        renderer.draw_scene(&mut device, &mut state);
        let report = renderer.last_frame().clone();
        assert_eq!(report.passes, vec!["environment", "opaque", "transparent"]);
        assert_eq!(report.drawn, 2);
        assert_eq!(report.skipped, 0);
        assert!(
            !device
                .commands()
                .iter()
                .any(|c| matches!(c, GpuCommand::CreateFramebuffer { .. }))
        );
    }

    #[test]
    fn transmission_renders_offscreen_source_first() {
        let gltf = scene(
            r#"{ "mesh": 0 }, { "mesh": 1 }"#,
            r#"{}, { "extensions": { "KHR_materials_transmission": { "transmissionFactor": 1.0 } } }"#,
        );
        let mut state = state_with(gltf, RenderingParameters::default());
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);

        renderer.draw_scene(&mut device, &mut state);
        let report = renderer.last_frame().clone();
        assert_eq!(report.passes.len(), 8);
        // Opaque twice (offscreen and surface), transmissive once
        assert_eq!(report.drawn, 3);

        let commands = device.commands();
        let framebuffer = commands
            .iter()
            .find_map(|c| match c {
                GpuCommand::CreateFramebuffer { handle, color } => Some((*handle, *color)),
                _ => None,
            })
            .unwrap();
        let offscreen = commands
            .iter()
            .position(|c| *c == GpuCommand::BindRenderTarget(RenderTarget::Framebuffer(framebuffer.0)))
            .unwrap();
        let mipmaps = commands
            .iter()
            .position(|c| *c == GpuCommand::GenerateMipmaps(framebuffer.1))
            .unwrap();
        let surface = commands
            .iter()
            .position(|c| *c == GpuCommand::BindRenderTarget(RenderTarget::Surface))
            .unwrap();
        assert!(offscreen < mipmaps && mipmaps < surface);

        // The transmissive draw samples the mipmapped source
        let sampled = commands[surface..]
            .iter()
            .any(|c| matches!(c, GpuCommand::BindTexture { texture, .. } if *texture == framebuffer.1));
        assert!(sampled);
    }

    #[test]
    fn transmission_target_is_reused() {
        let gltf = scene(
            r#"{ "mesh": 1 }, { "mesh": 1 }"#,
            r#"{}, { "extensions": { "KHR_materials_transmission": {} } }"#,
        );
        let mut state = state_with(gltf, RenderingParameters::default());
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);

        renderer.draw_scene(&mut device, &mut state);
        renderer.draw_scene(&mut device, &mut state);
        let framebuffers = device
            .commands()
            .iter()
            .filter(|c| matches!(c, GpuCommand::CreateFramebuffer { .. }))
            .count();
        assert_eq!(framebuffers, 1);
    }

    #[test]
    fn shared_skin_uses_joint_matrices_of_drawn_node() {
        let json = r#"{
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [ { "nodes": [0] } ],
            "nodes": [
                { "children": [1, 2, 3] },
                { "mesh": 0, "skin": 0, "translation": [5, 0, 0] },
                { "mesh": 0, "skin": 0 },
                {}
            ],
            "skins": [ { "joints": [3] } ],
            "meshes": [ { "primitives": [ {
                "attributes": { "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 }
            } ] } ],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" },
                { "bufferView": 1, "componentType": 5121, "count": 3, "type": "VEC4" },
                { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" }
            ],
            "bufferViews": [
                { "buffer": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 12 },
                { "buffer": 0, "byteOffset": 48, "byteLength": 48 }
            ],
            "buffers": [ { "byteLength": 96 } ]
        }"#;
        let mut gltf = Gltf::from_json_slice(json.as_bytes()).unwrap();
        let weights = [1.0f32, 0.0, 0.0, 0.0].repeat(3);
        let mut data = bytemuck::cast_slice(&TRIANGLE).to_vec();
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(bytemuck::cast_slice(&weights));
        gltf.buffers[0].data = data;
        gltf.initialize();

        let mut state = state_with(gltf, RenderingParameters::default());
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);
        renderer.draw_scene(&mut device, &mut state);
        assert_eq!(renderer.last_frame().drawn, 2);

        // x translation of joint 0 per draw
        let mut program = None;
        let mut translations = Vec::new();
        for command in device.commands() {
            match command {
                GpuCommand::UseProgram(handle) => program = Some(*handle),
                GpuCommand::SetUniform { location, values, .. } => {
                    let joint_location = program.and_then(|p| {
                        device
                            .active_uniforms(p)
                            .into_iter()
                            .find(|u| u.name.starts_with("u_jointMatrix"))
                            .map(|u| u.location)
                    });
                    if joint_location == Some(*location) {
                        translations.push(values[12]);
                    }
                }
                _ => {}
            }
        }
        translations.sort_by(f32::total_cmp);
        assert_eq!(translations, vec![-5.0, 0.0]);
    }

    #[test]
    fn mirrored_nodes_flip_winding() {
        let gltf = scene(r#"{ "mesh": 0, "scale": [-1, 1, 1] }, { "mesh": 0 }"#, "{}, {}");
        let mut state = state_with(gltf, RenderingParameters::default());
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);

        renderer.draw_scene(&mut device, &mut state);
        let faces: Vec<wgpu::FrontFace> = render_states(&device)
            .iter()
            .filter(|s| s.depth_compare.is_some())
            .map(|s| s.front_face)
            .collect();
        assert!(faces.contains(&wgpu::FrontFace::Cw));
        assert!(faces.contains(&wgpu::FrontFace::Ccw));
    }

    #[test]
    fn material_flags_set_culling_and_blending() {
        let gltf = scene(
            r#"{ "mesh": 0 }, { "mesh": 1 }"#,
            r#"{ "doubleSided": true }, { "alphaMode": "BLEND" }"#,
        );
        let mut state = state_with(gltf, RenderingParameters::default());
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);

        renderer.draw_scene(&mut device, &mut state);
        let report = renderer.last_frame().clone();
        assert_eq!(report.drawn, 2);
        let states = render_states(&device);
        assert!(states.iter().any(|s| s.cull_mode.is_none() && s.blend.is_none()));
        assert!(
            states
                .iter()
                .any(|s| s.cull_mode == Some(wgpu::Face::Back) && s.blend == Some(RenderState::ALPHA_BLEND))
        );
    }

    #[test]
    fn fallback_lights_without_ibl() {
        let gltf = scene(r#"{ "mesh": 0 }, { "mesh": 0 }"#, "{}, {}");
        let parameters = RenderingParameters {
            use_ibl: false,
            use_directional_lights_with_disabled_ibl: true,
            ..RenderingParameters::default()
        };
        let mut state = state_with(gltf, parameters);
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);

        renderer.draw_scene(&mut device, &mut state);
        let lit = renderer
            .shaders()
            .compiled_shaders()
            .any(|(_, shader)| shader.identifier == "pbr.frag" && shader.defines.iter().any(|d| d == "LIGHT_COUNT 2"));
        assert!(lit);
    }

    #[test]
    fn unlit_scene_without_fallback_has_no_punctual_define() {
        let gltf = scene(r#"{ "mesh": 0 }, { "mesh": 0 }"#, "{}, {}");
        let mut state = state_with(gltf, RenderingParameters::default());
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);

        renderer.draw_scene(&mut device, &mut state);
        let punctual = renderer
            .shaders()
            .compiled_shaders()
            .any(|(_, shader)| shader.defines.iter().any(|d| d.starts_with("USE_PUNCTUAL")));
        assert!(!punctual);
    }

    #[test]
    fn permutations_compile_once_across_frames() {
        let gltf = scene(r#"{ "mesh": 0 }, { "mesh": 0 }"#, "{}, {}");
        let mut state = state_with(gltf, RenderingParameters::default());
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);

        renderer.draw_scene(&mut device, &mut state);
        let compiled = device.compile_count();
        renderer.draw_scene(&mut device, &mut state);
        renderer.draw_scene(&mut device, &mut state);
        assert_eq!(device.compile_count(), compiled);
        assert_eq!(renderer.shaders().program_count(), 1);
        assert_eq!(device.draw_count(), 6);
    }

    #[test]
    fn new_asset_releases_cached_buffers() {
        let mut state = state_with(
            scene(r#"{ "mesh": 0 }, { "mesh": 0 }"#, "{}, {}"),
            RenderingParameters::default(),
        );
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&state.rendering_parameters);
        renderer.draw_scene(&mut device, &mut state);
        assert_eq!(renderer.resources().buffer_count(), 1);

        state.set_gltf(scene(r#"{ "mesh": 0 }, { "mesh": 0 }"#, "{}, {}"), 1.0);
        state.gltf_mut().unwrap().apply_transform_hierarchy(0, Mat4::IDENTITY);
        device.clear_commands();
        renderer.draw_scene(&mut device, &mut state);
        assert!(
            device
                .commands()
                .iter()
                .any(|c| matches!(c, GpuCommand::DeleteBuffer(_)))
        );
        assert_eq!(renderer.resources().buffer_count(), 1);
    }
}
