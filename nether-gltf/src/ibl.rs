//! Image based lighting pre-filtering
//!
//! Converts an equirectangular HDR panorama into the environment the PBR
//! shader samples:
//!
//! 1. panorama -> cubemap (full mip chain)
//! 2. Lambertian irradiance cubemap (mip 0 only)
//! 3. GGX and Charlie pre-filtered cubemaps, one roughness per mip level
//! 4. GGX / Charlie BRDF LUTs and the sheen albedo LUT
//!
//! Every pass is a fullscreen triangle through `ibl_filtering.frag`, selected
//! by [`Define::Distribution`] and the LUT switches.

use crate::error::LoadError;
use crate::gpu::{
    GpuDevice, PrimitiveMode, RenderState, RenderTarget, SamplerDescriptor, TextureDescriptor,
    TextureDimension, TextureHandle,
};
use crate::shader::{Define, ShaderCache, ShaderDefines, UniformValue};

/// Importance-sampling distribution of a filter pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Distribution {
    Lambertian,
    Ggx,
    Charlie,
}

impl Distribution {
    /// Value of the `DISTRIBUTION` define
    pub fn define_value(self) -> &'static str {
        match self {
            Distribution::Lambertian => "cLambertian",
            Distribution::Ggx => "cGGX",
            Distribution::Charlie => "cCharlie",
        }
    }
}

/// Number of usable mip levels of a cubemap face of `texture_size`
pub fn mip_count(texture_size: u32, lowest_mip_level: u32) -> u32 {
    let levels = texture_size.max(1).ilog2() + 1;
    levels.saturating_sub(lowest_mip_level).max(1)
}

/// Roughness filtered into mip `level`
pub fn mip_roughness(level: u32, mip_count: u32) -> f32 {
    if mip_count <= 1 {
        0.0
    } else {
        level as f32 / (mip_count - 1) as f32
    }
}

/// Decoded equirectangular panorama, RGBA32F
#[derive(Debug, Clone, PartialEq)]
pub struct Panorama {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

impl Panorama {
    /// Expand tightly packed RGB floats to RGBA
    pub fn from_rgb(width: u32, height: u32, rgb: &[f32]) -> Self {
        let pixels = rgb
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 1.0])
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Filtered environment owned by the state that loaded it
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub lambertian: TextureHandle,
    pub ggx: TextureHandle,
    pub charlie: TextureHandle,
    pub ggx_lut: TextureHandle,
    pub charlie_lut: TextureHandle,
    pub sheen_elut: TextureHandle,
    pub mip_count: u32,
}

impl Environment {
    /// Release every texture
    pub fn destroy(self, device: &mut dyn GpuDevice) {
        for texture in [
            self.lambertian,
            self.ggx,
            self.charlie,
            self.ggx_lut,
            self.charlie_lut,
            self.sheen_elut,
        ] {
            device.delete_texture(texture);
        }
    }
}

/// Filter settings
#[derive(Debug, Clone, PartialEq)]
pub struct IblSampler {
    pub texture_size: u32,
    pub lowest_mip_level: u32,
    pub lut_resolution: u32,
    pub lambertian_sample_count: u32,
    pub ggx_sample_count: u32,
    pub sheen_sample_count: u32,
    pub lut_sample_count: u32,
    pub lod_bias: f32,
}

impl Default for IblSampler {
    fn default() -> Self {
        Self {
            texture_size: 256,
            lowest_mip_level: 4,
            lut_resolution: 1024,
            lambertian_sample_count: 2048,
            ggx_sample_count: 1024,
            sheen_sample_count: 64,
            lut_sample_count: 512,
            lod_bias: 0.0,
        }
    }
}

struct FilterPass {
    distribution: Distribution,
    roughness: f32,
    sample_count: u32,
    width: u32,
    target: TextureHandle,
    mip: u32,
}

impl IblSampler {
    pub fn mip_count(&self) -> u32 {
        mip_count(self.texture_size, self.lowest_mip_level)
    }

    fn cube_format(device: &dyn GpuDevice) -> wgpu::TextureFormat {
        if device.supports_float_render_targets() {
            wgpu::TextureFormat::Rgba32Float
        } else {
            tracing::warn!("Float render targets unsupported; filtering environment in RGBA8");
            wgpu::TextureFormat::Rgba8Unorm
        }
    }

    fn create_cube(
        &self,
        device: &mut dyn GpuDevice,
        label: &'static str,
        format: wgpu::TextureFormat,
        mip_levels: u32,
    ) -> Result<TextureHandle, LoadError> {
        let texture = device.create_texture(&TextureDescriptor {
            label,
            dimension: TextureDimension::Cube,
            width: self.texture_size,
            height: self.texture_size,
            format,
            mip_levels,
        })?;
        device.set_sampler(texture, &SamplerDescriptor::clamped_linear(mip_levels > 1));
        Ok(texture)
    }

    fn create_lut(&self, device: &mut dyn GpuDevice, label: &'static str) -> Result<TextureHandle, LoadError> {
        let texture = device.create_texture(&TextureDescriptor {
            label,
            dimension: TextureDimension::D2,
            width: self.lut_resolution,
            height: self.lut_resolution,
            format: wgpu::TextureFormat::Rgba8Unorm,
            mip_levels: 1,
        })?;
        device.set_sampler(texture, &SamplerDescriptor::clamped_linear(false));
        Ok(texture)
    }

    /// Run every filter pass and return the environment
    pub fn filter(
        &self,
        device: &mut dyn GpuDevice,
        shaders: &mut ShaderCache,
        panorama: &Panorama,
    ) -> Result<Environment, LoadError> {
        let format = Self::cube_format(device);
        let mip_count = self.mip_count();
        let full_chain = mip_count + self.lowest_mip_level;

        device.set_render_state(&RenderState::fullscreen());

        let source = self.panorama_to_cubemap(device, shaders, panorama, format, full_chain)?;

        let lambertian = self.create_cube(device, "ibl lambertian", format, 1)?;
        let ggx = self.create_cube(device, "ibl ggx", format, mip_count)?;
        let charlie = self.create_cube(device, "ibl charlie", format, mip_count)?;

        self.apply_filter(
            device,
            shaders,
            source,
            FilterPass {
                distribution: Distribution::Lambertian,
                roughness: 0.0,
                sample_count: self.lambertian_sample_count,
                width: self.texture_size,
                target: lambertian,
                mip: 0,
            },
        )?;

        for mip in 0..mip_count {
            let roughness = mip_roughness(mip, mip_count);
            let width = (self.texture_size >> mip).max(1);
            for (distribution, target, sample_count) in [
                (Distribution::Ggx, ggx, self.ggx_sample_count),
                (Distribution::Charlie, charlie, self.sheen_sample_count),
            ] {
                self.apply_filter(
                    device,
                    shaders,
                    source,
                    FilterPass {
                        distribution,
                        roughness,
                        sample_count,
                        width,
                        target,
                        mip,
                    },
                )?;
            }
        }

        let ggx_lut = self.create_lut(device, "ggx lut")?;
        self.bake_lut(device, shaders, ggx_lut, Distribution::Ggx, Define::GenerateLut)?;
        let charlie_lut = self.create_lut(device, "charlie lut")?;
        self.bake_lut(device, shaders, charlie_lut, Distribution::Charlie, Define::GenerateLut)?;
        let sheen_elut = self.create_lut(device, "sheen albedo lut")?;
        self.bake_lut(device, shaders, sheen_elut, Distribution::Charlie, Define::GenerateSheenLut)?;

        device.delete_texture(source);
        device.bind_render_target(RenderTarget::Surface);

        tracing::info!(
            "Environment filtered: {}px cube, {} specular mips",
            self.texture_size,
            mip_count
        );

        Ok(Environment {
            lambertian,
            ggx,
            charlie,
            ggx_lut,
            charlie_lut,
            sheen_elut,
            mip_count,
        })
    }

    fn panorama_to_cubemap(
        &self,
        device: &mut dyn GpuDevice,
        shaders: &mut ShaderCache,
        panorama: &Panorama,
        format: wgpu::TextureFormat,
        mip_levels: u32,
    ) -> Result<TextureHandle, LoadError> {
        let input = device.create_texture(&TextureDescriptor {
            label: "panorama",
            dimension: TextureDimension::D2,
            width: panorama.width,
            height: panorama.height,
            format: wgpu::TextureFormat::Rgba32Float,
            mip_levels: 1,
        })?;
        device.upload_texture(input, 0, 0, bytemuck::cast_slice(&panorama.pixels))?;
        device.set_sampler(input, &SamplerDescriptor::clamped_linear(false));

        let cube = self.create_cube(device, "environment cubemap", format, mip_levels)?;

        let vs = shaders.select_shader(device, "fullscreen.vert", &ShaderDefines::new())?;
        let fs = shaders.select_shader(device, "panorama_to_cubemap.frag", &ShaderDefines::new())?;
        let program = shaders.get_shader_program(device, vs, fs)?;
        device.use_program(program.handle());

        for face in 0..6 {
            device.bind_render_target(RenderTarget::TextureLevel {
                texture: cube,
                face,
                mip: 0,
            });
            device.set_viewport(0, 0, self.texture_size, self.texture_size);
            device.clear(Some([0.0, 0.0, 1.0, 0.0]), false);

            device.bind_texture(0, input);
            program.upload_uniform(device, "u_panorama", &UniformValue::Int(0));
            program.upload_uniform(device, "u_currentFace", &UniformValue::Int(face as i32));
            device.draw_arrays(PrimitiveMode::Triangles, 0, 3);
        }

        device.delete_texture(input);
        device.generate_mipmaps(cube);
        Ok(cube)
    }

    fn apply_filter(
        &self,
        device: &mut dyn GpuDevice,
        shaders: &mut ShaderCache,
        source: TextureHandle,
        pass: FilterPass,
    ) -> Result<(), LoadError> {
        let defines: ShaderDefines = [Define::Distribution(pass.distribution)].into_iter().collect();
        let vs = shaders.select_shader(device, "fullscreen.vert", &ShaderDefines::new())?;
        let fs = shaders.select_shader(device, "ibl_filtering.frag", &defines)?;
        let program = shaders.get_shader_program(device, vs, fs)?;
        device.use_program(program.handle());

        let size = (self.texture_size >> pass.mip).max(1);
        for face in 0..6 {
            device.bind_render_target(RenderTarget::TextureLevel {
                texture: pass.target,
                face,
                mip: pass.mip,
            });
            device.set_viewport(0, 0, size, size);
            device.clear(Some([0.0, 0.0, 1.0, 0.0]), false);

            device.bind_texture(0, source);
            program.upload_uniform(device, "u_cubemapTexture", &UniformValue::Int(0));
            program.upload_uniform(device, "u_roughness", &UniformValue::Float(pass.roughness));
            program.upload_uniform(device, "u_sampleCount", &UniformValue::Int(pass.sample_count as i32));
            program.upload_uniform(device, "u_width", &UniformValue::Int(pass.width as i32));
            program.upload_uniform(device, "u_lodBias", &UniformValue::Float(self.lod_bias));
            program.upload_uniform(device, "u_currentFace", &UniformValue::Int(face as i32));
            device.draw_arrays(PrimitiveMode::Triangles, 0, 3);
        }
        Ok(())
    }

    fn bake_lut(
        &self,
        device: &mut dyn GpuDevice,
        shaders: &mut ShaderCache,
        target: TextureHandle,
        distribution: Distribution,
        mode: Define,
    ) -> Result<(), LoadError> {
        let defines: ShaderDefines = [Define::Distribution(distribution), mode].into_iter().collect();
        let vs = shaders.select_shader(device, "fullscreen.vert", &ShaderDefines::new())?;
        let fs = shaders.select_shader(device, "ibl_filtering.frag", &defines)?;
        let program = shaders.get_shader_program(device, vs, fs)?;
        device.use_program(program.handle());

        device.bind_render_target(RenderTarget::TextureLevel {
            texture: target,
            face: 0,
            mip: 0,
        });
        device.set_viewport(0, 0, self.lut_resolution, self.lut_resolution);
        device.clear(Some([0.0, 0.0, 1.0, 0.0]), false);

        program.upload_uniform(device, "u_roughness", &UniformValue::Float(0.0));
        program.upload_uniform(device, "u_sampleCount", &UniformValue::Int(self.lut_sample_count as i32));
        program.upload_uniform(device, "u_width", &UniformValue::Int(0));
        program.upload_uniform(device, "u_lodBias", &UniformValue::Float(0.0));
        program.upload_uniform(device, "u_currentFace", &UniformValue::Int(0));
        device.draw_arrays(PrimitiveMode::Triangles, 0, 3);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCommand, HeadlessDevice};

    fn small_sampler() -> IblSampler {
        IblSampler {
            texture_size: 16,
            lowest_mip_level: 2,
            lut_resolution: 8,
            ..Default::default()
        }
    }

    fn panorama() -> Panorama {
        Panorama::from_rgb(4, 2, &[0.5; 4 * 2 * 3])
    }

    #[test]
    fn mip_chain_mapping() {
        assert_eq!(mip_count(256, 4), 5);
        assert_eq!(mip_count(1, 4), 1);
        assert_eq!(mip_roughness(0, 5), 0.0);
        assert_eq!(mip_roughness(4, 5), 1.0);
        assert_eq!(mip_roughness(2, 5), 0.5);
        assert_eq!(mip_roughness(0, 1), 0.0);
    }

    #[test]
    fn define_values() {
        let define = Define::Distribution(Distribution::Charlie);
        assert_eq!(define.to_string(), "DISTRIBUTION cCharlie");
    }

    #[test]
    fn panorama_expands_to_rgba() {
        let p = Panorama::from_rgb(1, 1, &[1.0, 2.0, 3.0]);
        assert_eq!(p.pixels, vec![1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn filter_issues_every_pass() {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderCache::with_builtin_sources("300 es");
        let sampler = small_sampler();
        let environment = sampler.filter(&mut device, &mut shaders, &panorama()).unwrap();

        assert_eq!(environment.mip_count, 3);
        // panorama + lambertian + (ggx + charlie) per mip + 3 LUTs
        assert_eq!(device.draw_count(), 6 + 6 + 2 * 6 * 3 + 3);
        // fullscreen.vert, panorama, lambertian, ggx, charlie, 2 LUTs, sheen LUT
        assert_eq!(device.compile_count(), 8);
        assert_eq!(shaders.program_count(), 7);
    }

    #[test]
    fn specular_mips_are_rendered_at_their_size() {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderCache::with_builtin_sources("300 es");
        let environment = small_sampler()
            .filter(&mut device, &mut shaders, &panorama())
            .unwrap();

        let commands = device.commands();
        let mut level_sizes = Vec::new();
        for pair in commands.windows(2) {
            if let [
                GpuCommand::BindRenderTarget(RenderTarget::TextureLevel { texture, face: 0, mip }),
                GpuCommand::SetViewport { width, .. },
            ] = pair
            {
                if *texture == environment.ggx {
                    level_sizes.push((*mip, *width));
                }
            }
        }
        assert_eq!(level_sizes, vec![(0, 16), (1, 8), (2, 4)]);
    }

    #[test]
    fn rgba8_fallback_without_float_targets() {
        let mut device = HeadlessDevice::new();
        device.float_render_targets = false;
        let mut shaders = ShaderCache::with_builtin_sources("300 es");
        let environment = small_sampler()
            .filter(&mut device, &mut shaders, &panorama())
            .unwrap();

        let format = device.commands().iter().find_map(|c| match c {
            GpuCommand::CreateTexture { handle, desc } if *handle == environment.ggx => Some(desc.format),
            _ => None,
        });
        assert_eq!(format, Some(wgpu::TextureFormat::Rgba8Unorm));
    }

    #[test]
    fn shader_failure_aborts_filtering() {
        let mut device = HeadlessDevice::new();
        device.fail_compile_marker = Some("DISTRIBUTION cGGX".to_string());
        let mut shaders = ShaderCache::with_builtin_sources("300 es");
        let err = small_sampler()
            .filter(&mut device, &mut shaders, &panorama())
            .unwrap_err();
        assert!(matches!(err, LoadError::Shader(_)));
    }
}
