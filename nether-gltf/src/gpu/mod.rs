//! GPU device boundary
//!
//! The renderer, shader cache and IBL sampler talk to the GPU only through
//! [`GpuDevice`]. Fixed-function state is expressed with wgpu's typed state
//! enums and passed explicitly with every call, so independent devices never
//! share an ambient constant table.
//!
//! [`HeadlessDevice`] implements the trait without a GPU for tests and tooling.

mod headless;

pub use headless::{GpuCommand, HeadlessDevice};

use crate::error::GpuError;
use crate::gltf::ComponentType;

/// Handle to a compiled shader object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

/// Handle to a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Handle to a vertex or index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Handle to a 2D or cube texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Handle to a framebuffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub u32);

/// Location of an active uniform within a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Shader pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Declared GLSL type of an active uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    Bool,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
}

impl UniformType {
    /// Parse a GLSL type keyword
    pub fn from_glsl(name: &str) -> Option<Self> {
        Some(match name {
            "float" => UniformType::Float,
            "vec2" => UniformType::Vec2,
            "vec3" => UniformType::Vec3,
            "vec4" => UniformType::Vec4,
            "int" => UniformType::Int,
            "ivec2" => UniformType::IVec2,
            "ivec3" => UniformType::IVec3,
            "ivec4" => UniformType::IVec4,
            "bool" => UniformType::Bool,
            "mat2" => UniformType::Mat2,
            "mat3" => UniformType::Mat3,
            "mat4" => UniformType::Mat4,
            "sampler2D" => UniformType::Sampler2D,
            "samplerCube" => UniformType::SamplerCube,
            _ => return None,
        })
    }

    /// True for types uploaded through the integer path
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            UniformType::Int
                | UniformType::IVec2
                | UniformType::IVec3
                | UniformType::IVec4
                | UniformType::Bool
                | UniformType::Sampler2D
                | UniformType::SamplerCube
        )
    }
}

/// Active uniform reported by program introspection
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUniform {
    /// Name as reported by the driver (arrays end in `[0]`)
    pub name: String,
    pub ty: UniformType,
    /// Array length (1 for non-arrays)
    pub size: u32,
    pub location: UniformLocation,
}

/// Active vertex attribute reported by program introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttribute {
    pub name: String,
    pub location: u32,
}

/// Flattened uniform payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData<'a> {
    Float(&'a [f32]),
    Int(&'a [i32]),
}

/// Buffer binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Layout of one vertex attribute within its buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttributeLayout {
    /// Components per vertex (1-4)
    pub components: u32,
    pub component_type: ComponentType,
    pub normalized: bool,
    /// Byte stride, 0 for tightly packed
    pub stride: u32,
    pub offset: u32,
}

/// Index element type for indexed draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U8,
    U16,
    U32,
}

/// Draw topology (glTF primitive modes 0-6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    /// Map a glTF `mode` value
    pub fn from_gltf(mode: u32) -> Option<Self> {
        Some(match mode {
            0 => PrimitiveMode::Points,
            1 => PrimitiveMode::Lines,
            2 => PrimitiveMode::LineLoop,
            3 => PrimitiveMode::LineStrip,
            4 => PrimitiveMode::Triangles,
            5 => PrimitiveMode::TriangleStrip,
            6 => PrimitiveMode::TriangleFan,
            _ => return None,
        })
    }

    /// Number of faces drawn for `count` vertices/indices
    pub fn face_count(self, count: usize) -> usize {
        match self {
            PrimitiveMode::Triangles => count / 3,
            PrimitiveMode::TriangleStrip | PrimitiveMode::TriangleFan => count.saturating_sub(2),
            _ => 0,
        }
    }
}

/// Texture shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    Cube,
}

/// Texture creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: &'static str,
    pub dimension: TextureDimension,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub mip_levels: u32,
}

/// Sampling state attached to a texture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDescriptor {
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    /// `None` disables mipmapped minification
    pub mipmap_filter: Option<wgpu::FilterMode>,
    pub anisotropy: Option<f32>,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: Some(wgpu::FilterMode::Linear),
            anisotropy: None,
        }
    }
}

impl SamplerDescriptor {
    /// Clamped linear sampling used for LUTs and render targets
    pub fn clamped_linear(mipmapped: bool) -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mipmap_filter: mipmapped.then_some(wgpu::FilterMode::Linear),
            ..Self::default()
        }
    }
}

/// Destination of subsequent draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// The default framebuffer
    Surface,
    Framebuffer(FramebufferHandle),
    /// One face (0 for 2D) and mip level of a texture
    TextureLevel {
        texture: TextureHandle,
        face: u32,
        mip: u32,
    },
}

/// Per-draw fixed-function state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    /// `None` disables depth testing
    pub depth_compare: Option<wgpu::CompareFunction>,
    pub depth_write: bool,
    /// `None` disables face culling
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
    /// `None` disables blending
    pub blend: Option<wgpu::BlendState>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            depth_write: true,
            cull_mode: Some(wgpu::Face::Back),
            front_face: wgpu::FrontFace::Ccw,
            blend: None,
        }
    }
}

impl RenderState {
    /// Straight alpha blending: `src.rgb * a + dst.rgb * (1 - a)`, alpha `one, 1 - a`
    pub const ALPHA_BLEND: wgpu::BlendState = wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    };

    /// Fullscreen pass state: no depth, no culling, no blending
    pub fn fullscreen() -> Self {
        Self {
            depth_compare: None,
            depth_write: false,
            cull_mode: None,
            front_face: wgpu::FrontFace::Ccw,
            blend: None,
        }
    }
}

/// Capability set the renderer needs from a graphics API.
///
/// Calls are issued strictly in order from one thread; implementations rely
/// on same-queue ordering and no explicit fences are requested.
pub trait GpuDevice {
    /// Compile a shader, returning the diagnostic log on failure
    fn compile_shader(&mut self, stage: ShaderStage, source: &str)
    -> Result<ShaderHandle, GpuError>;

    /// Link two shaders into a program, returning the diagnostic log on failure
    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, GpuError>;

    /// Introspect active uniforms of a linked program
    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ActiveUniform>;

    /// Introspect active vertex attributes of a linked program
    fn active_attributes(&self, program: ProgramHandle) -> Vec<ActiveAttribute>;

    fn use_program(&mut self, program: ProgramHandle);

    fn set_uniform(&mut self, location: UniformLocation, ty: UniformType, data: UniformData<'_>);

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8])
    -> Result<BufferHandle, GpuError>;

    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn set_vertex_attribute(
        &mut self,
        location: u32,
        buffer: BufferHandle,
        layout: VertexAttributeLayout,
    );

    fn disable_vertex_attribute(&mut self, location: u32);

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureHandle, GpuError>;

    /// Upload one mip level of one face (0 for 2D textures), in the texture's format
    fn upload_texture(
        &mut self,
        texture: TextureHandle,
        face: u32,
        level: u32,
        data: &[u8],
    ) -> Result<(), GpuError>;

    fn set_sampler(&mut self, texture: TextureHandle, sampler: &SamplerDescriptor);

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    fn delete_texture(&mut self, texture: TextureHandle);

    fn generate_mipmaps(&mut self, texture: TextureHandle);

    fn create_framebuffer(
        &mut self,
        color: TextureHandle,
        depth: Option<TextureHandle>,
    ) -> Result<FramebufferHandle, GpuError>;

    fn bind_render_target(&mut self, target: RenderTarget);

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);

    /// Clear color (when given) and optionally depth of the bound target
    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool);

    fn set_render_state(&mut self, state: &RenderState);

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32);

    fn draw_elements(
        &mut self,
        mode: PrimitiveMode,
        index_buffer: BufferHandle,
        format: IndexFormat,
        count: u32,
    );

    fn max_vertex_attributes(&self) -> u32;

    /// Maximum anisotropy, `None` when anisotropic filtering is unsupported
    fn max_anisotropy(&self) -> Option<f32>;

    fn supports_float_render_targets(&self) -> bool;
}
