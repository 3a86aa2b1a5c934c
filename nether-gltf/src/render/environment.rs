//! Environment background pass

use glam::{Mat3, Mat4};

use crate::config::RenderingParameters;
use crate::error::ShaderError;
use crate::gltf::ComponentType;
use crate::gpu::{
    BufferHandle, BufferTarget, GpuDevice, IndexFormat, PrimitiveMode, RenderState, VertexAttributeLayout,
};
use crate::ibl::Environment;
use crate::shader::{Define, ShaderCache, ShaderDefines, ShaderProgram, UniformValue};

/// Mip fraction sampled when the background is blurred
const BLUR_MIP_FRACTION: f32 = 0.6;

#[rustfmt::skip]
const CUBE_POSITIONS: [f32; 24] = [
    -1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,
     1.0,  1.0, -1.0,
    -1.0,  1.0, -1.0,
    -1.0, -1.0,  1.0,
     1.0, -1.0,  1.0,
     1.0,  1.0,  1.0,
    -1.0,  1.0,  1.0,
];

#[rustfmt::skip]
const CUBE_INDICES: [u16; 36] = [
    1, 2, 0, 2, 3, 0,
    6, 2, 1, 1, 5, 6,
    6, 5, 4, 4, 7, 6,
    6, 3, 2, 7, 3, 6,
    3, 7, 0, 7, 4, 0,
    5, 1, 0, 4, 5, 0,
];

/// Rotation about +Y applied to every environment lookup
pub fn environment_rotation(degrees: f32) -> Mat3 {
    Mat3::from_mat4(Mat4::from_rotation_y(degrees.to_radians()))
}

fn cubemap_program<'a>(
    device: &mut dyn GpuDevice,
    shaders: &'a mut ShaderCache,
    defines: &ShaderDefines,
) -> Result<&'a mut ShaderProgram, ShaderError> {
    let vs = shaders.select_shader(device, "cubemap.vert", &ShaderDefines::new())?;
    let fs = shaders.select_shader(device, "cubemap.frag", defines)?;
    shaders.get_shader_program(device, vs, fs)
}

/// Draws the specular cubemap behind the scene
#[derive(Debug, Default)]
pub struct EnvironmentRenderer {
    cube: Option<(BufferHandle, BufferHandle)>,
}

impl EnvironmentRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn cube(&mut self, device: &mut dyn GpuDevice) -> Option<(BufferHandle, BufferHandle)> {
        if self.cube.is_none() {
            let vertices = device.create_buffer(BufferTarget::Vertex, bytemuck::cast_slice(&CUBE_POSITIONS));
            let indices = device.create_buffer(BufferTarget::Index, bytemuck::cast_slice(&CUBE_INDICES));
            match (vertices, indices) {
                (Ok(vertices), Ok(indices)) => self.cube = Some((vertices, indices)),
                (vertices, indices) => {
                    for buffer in [vertices.ok(), indices.ok()].into_iter().flatten() {
                        device.delete_buffer(buffer);
                    }
                    tracing::error!("Failed to create environment cube buffers");
                }
            }
        }
        self.cube
    }

    /// Draw the background; returns false when nothing was drawn
    pub fn draw(
        &mut self,
        device: &mut dyn GpuDevice,
        shaders: &mut ShaderCache,
        view_projection: &Mat4,
        environment: &Environment,
        parameters: &RenderingParameters,
    ) -> bool {
        let Some((vertices, indices)) = self.cube(device) else {
            return false;
        };

        let defines: ShaderDefines = [Define::ToneMap(parameters.tone_map)].into_iter().collect();
        let program = match cubemap_program(device, shaders, &defines) {
            Ok(program) => program,
            Err(e) => {
                tracing::error!("Environment shader unavailable: {}", e);
                return false;
            }
        };
        device.use_program(program.handle());

        device.bind_texture(0, environment.ggx);
        let blur = if parameters.blur_environment_map {
            BLUR_MIP_FRACTION
        } else {
            0.0
        };
        let uniforms = [
            ("u_ViewProjectionMatrix", UniformValue::Mat4(*view_projection)),
            ("u_GGXEnvSampler", UniformValue::Int(0)),
            ("u_MipCount", UniformValue::Int(environment.mip_count as i32)),
            ("u_EnvBlurNormalized", UniformValue::Float(blur)),
            ("u_EnvIntensity", UniformValue::Float(parameters.ibl_intensity)),
            (
                "u_EnvRotation",
                UniformValue::Mat3(environment_rotation(parameters.environment_rotation)),
            ),
            ("u_Exposure", UniformValue::Float(parameters.exposure)),
        ];
        for (name, value) in &uniforms {
            program.upload_uniform(device, name, value);
        }

        if let Some(location) = program.attribute_location("a_position") {
            device.set_vertex_attribute(
                location,
                vertices,
                VertexAttributeLayout {
                    components: 3,
                    component_type: ComponentType::Float,
                    normalized: false,
                    stride: 0,
                    offset: 0,
                },
            );
        }

        device.set_render_state(&RenderState::fullscreen());
        device.draw_elements(
            PrimitiveMode::Triangles,
            indices,
            IndexFormat::U16,
            CUBE_INDICES.len() as u32,
        );
        true
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some((vertices, indices)) = self.cube.take() {
            device.delete_buffer(vertices);
            device.delete_buffer(indices);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCommand, HeadlessDevice, TextureHandle};

    fn environment() -> Environment {
        Environment {
            lambertian: TextureHandle(1),
            ggx: TextureHandle(2),
            charlie: TextureHandle(3),
            ggx_lut: TextureHandle(4),
            charlie_lut: TextureHandle(5),
            sheen_elut: TextureHandle(6),
            mip_count: 5,
        }
    }

    #[test]
    fn rotation_turns_about_y() {
        let rotated = environment_rotation(90.0) * glam::Vec3::X;
        assert!(rotated.abs_diff_eq(glam::Vec3::NEG_Z, 1e-6));
    }

    #[test]
    fn draws_indexed_cube_with_specular_map() {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderCache::with_builtin_sources("300 es");
        let mut renderer = EnvironmentRenderer::new();
        let parameters = RenderingParameters::default();

        assert!(renderer.draw(&mut device, &mut shaders, &Mat4::IDENTITY, &environment(), &parameters));
        assert!(renderer.draw(&mut device, &mut shaders, &Mat4::IDENTITY, &environment(), &parameters));

        let commands = device.commands();
        assert!(commands.contains(&GpuCommand::BindTexture {
            unit: 0,
            texture: TextureHandle(2)
        }));
        let cube_buffers = commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::CreateBuffer { .. }))
            .count();
        assert_eq!(cube_buffers, 2);
        assert_eq!(device.draw_count(), 2);
        assert_eq!(device.link_count(), 1);
    }
}
