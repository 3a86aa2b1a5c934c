//! Headless GPU device
//!
//! Records every command instead of executing it. Uniform and attribute
//! introspection is emulated by reading declarations out of the submitted GLSL,
//! which is enough for the shader cache and renderer to behave as they would
//! on a real context.

use hashbrown::HashMap;

use super::{
    ActiveAttribute, ActiveUniform, BufferHandle, BufferTarget, FramebufferHandle, GpuDevice,
    IndexFormat, PrimitiveMode, ProgramHandle, RenderState, RenderTarget, SamplerDescriptor,
    ShaderHandle, ShaderStage, TextureDescriptor, TextureHandle, UniformData, UniformLocation,
    UniformType, VertexAttributeLayout,
};
use crate::error::GpuError;

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CompileShader { handle: ShaderHandle, stage: ShaderStage },
    LinkProgram { handle: ProgramHandle },
    UseProgram(ProgramHandle),
    SetUniform { location: UniformLocation, ty: UniformType, values: Vec<f32> },
    CreateBuffer { handle: BufferHandle, target: BufferTarget, size: usize },
    DeleteBuffer(BufferHandle),
    SetVertexAttribute { location: u32, buffer: BufferHandle, layout: VertexAttributeLayout },
    DisableVertexAttribute(u32),
    CreateTexture { handle: TextureHandle, desc: TextureDescriptor },
    UploadTexture { texture: TextureHandle, face: u32, level: u32, size: usize },
    SetSampler { texture: TextureHandle, sampler: SamplerDescriptor },
    BindTexture { unit: u32, texture: TextureHandle },
    DeleteTexture(TextureHandle),
    GenerateMipmaps(TextureHandle),
    CreateFramebuffer { handle: FramebufferHandle, color: TextureHandle },
    BindRenderTarget(RenderTarget),
    SetViewport { x: u32, y: u32, width: u32, height: u32 },
    Clear { color: Option<[f32; 4]>, depth: bool },
    SetRenderState(RenderState),
    DrawArrays { mode: PrimitiveMode, first: u32, count: u32 },
    DrawElements { mode: PrimitiveMode, buffer: BufferHandle, format: IndexFormat, count: u32 },
}

struct CompiledShader {
    stage: ShaderStage,
    source: String,
}

struct LinkedProgram {
    uniforms: Vec<ActiveUniform>,
    attributes: Vec<ActiveAttribute>,
}

/// Recording device with configurable capabilities and failure injection
pub struct HeadlessDevice {
    commands: Vec<GpuCommand>,
    shaders: Vec<CompiledShader>,
    programs: Vec<LinkedProgram>,
    next_buffer: u32,
    next_texture: u32,
    next_framebuffer: u32,
    compile_count: usize,
    link_count: usize,
    /// Compilation fails when the source contains this marker
    pub fail_compile_marker: Option<String>,
    /// Buffer creation fails when set
    pub fail_buffer_creation: bool,
    pub max_vertex_attributes: u32,
    pub max_anisotropy: Option<f32>,
    pub float_render_targets: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            shaders: Vec::new(),
            programs: Vec::new(),
            next_buffer: 1,
            next_texture: 1,
            next_framebuffer: 1,
            compile_count: 0,
            link_count: 0,
            fail_compile_marker: None,
            fail_buffer_creation: false,
            max_vertex_attributes: 16,
            max_anisotropy: Some(16.0),
            float_render_targets: true,
        }
    }

    /// All commands recorded so far
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Drop recorded commands, keeping created resources
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of successful shader compilations
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    /// Number of successful program links
    pub fn link_count(&self) -> usize {
        self.link_count
    }

    /// Source text of a compiled shader
    pub fn shader_source(&self, shader: ShaderHandle) -> Option<&str> {
        self.shaders
            .get(shader.0 as usize)
            .map(|s| s.source.as_str())
    }

    /// Draw calls recorded so far
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::DrawArrays { .. } | GpuCommand::DrawElements { .. }))
            .count()
    }
}

impl GpuDevice for HeadlessDevice {
    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderHandle, GpuError> {
        if let Some(marker) = &self.fail_compile_marker {
            if source.contains(marker.as_str()) {
                return Err(GpuError::Compile {
                    log: format!("ERROR: 0:1: '{}' : injected failure", marker),
                });
            }
        }

        let handle = ShaderHandle(self.shaders.len() as u32);
        self.shaders.push(CompiledShader {
            stage,
            source: source.to_string(),
        });
        self.compile_count += 1;
        self.commands.push(GpuCommand::CompileShader { handle, stage });
        Ok(handle)
    }

    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, GpuError> {
        let (Some(vs), Some(fs)) = (
            self.shaders.get(vertex.0 as usize),
            self.shaders.get(fragment.0 as usize),
        ) else {
            return Err(GpuError::Link {
                log: "invalid shader handle".to_string(),
            });
        };
        if vs.stage != ShaderStage::Vertex || fs.stage != ShaderStage::Fragment {
            return Err(GpuError::Link {
                log: "shader stage mismatch".to_string(),
            });
        }

        let mut uniforms = Vec::new();
        reflect_uniforms(&vs.source, &mut uniforms);
        reflect_uniforms(&fs.source, &mut uniforms);
        let attributes = reflect_attributes(&vs.source);

        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(LinkedProgram {
            uniforms,
            attributes,
        });
        self.link_count += 1;
        self.commands.push(GpuCommand::LinkProgram { handle });
        Ok(handle)
    }

    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ActiveUniform> {
        self.programs
            .get(program.0 as usize)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn active_attributes(&self, program: ProgramHandle) -> Vec<ActiveAttribute> {
        self.programs
            .get(program.0 as usize)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, ty: UniformType, data: UniformData<'_>) {
        let values = match data {
            UniformData::Float(v) => v.to_vec(),
            UniformData::Int(v) => v.iter().map(|&i| i as f32).collect(),
        };
        self.commands.push(GpuCommand::SetUniform {
            location,
            ty,
            values,
        });
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
    ) -> Result<BufferHandle, GpuError> {
        if self.fail_buffer_creation {
            return Err(GpuError::Buffer("injected failure".to_string()));
        }
        let handle = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        self.commands.push(GpuCommand::CreateBuffer {
            handle,
            target,
            size: data.len(),
        });
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.commands.push(GpuCommand::DeleteBuffer(buffer));
    }

    fn set_vertex_attribute(
        &mut self,
        location: u32,
        buffer: BufferHandle,
        layout: VertexAttributeLayout,
    ) {
        self.commands.push(GpuCommand::SetVertexAttribute {
            location,
            buffer,
            layout,
        });
    }

    fn disable_vertex_attribute(&mut self, location: u32) {
        self.commands
            .push(GpuCommand::DisableVertexAttribute(location));
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureHandle, GpuError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::Texture(format!(
                "{}: zero-sized texture",
                desc.label
            )));
        }
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.commands.push(GpuCommand::CreateTexture {
            handle,
            desc: desc.clone(),
        });
        Ok(handle)
    }

    fn upload_texture(
        &mut self,
        texture: TextureHandle,
        face: u32,
        level: u32,
        data: &[u8],
    ) -> Result<(), GpuError> {
        self.commands.push(GpuCommand::UploadTexture {
            texture,
            face,
            level,
            size: data.len(),
        });
        Ok(())
    }

    fn set_sampler(&mut self, texture: TextureHandle, sampler: &SamplerDescriptor) {
        self.commands.push(GpuCommand::SetSampler {
            texture,
            sampler: *sampler,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.commands
            .push(GpuCommand::BindTexture { unit, texture });
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.commands.push(GpuCommand::DeleteTexture(texture));
    }

    fn generate_mipmaps(&mut self, texture: TextureHandle) {
        self.commands.push(GpuCommand::GenerateMipmaps(texture));
    }

    fn create_framebuffer(
        &mut self,
        color: TextureHandle,
        _depth: Option<TextureHandle>,
    ) -> Result<FramebufferHandle, GpuError> {
        let handle = FramebufferHandle(self.next_framebuffer);
        self.next_framebuffer += 1;
        self.commands
            .push(GpuCommand::CreateFramebuffer { handle, color });
        Ok(handle)
    }

    fn bind_render_target(&mut self, target: RenderTarget) {
        self.commands.push(GpuCommand::BindRenderTarget(target));
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.commands.push(GpuCommand::SetViewport {
            x,
            y,
            width,
            height,
        });
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) {
        self.commands.push(GpuCommand::Clear { color, depth });
    }

    fn set_render_state(&mut self, state: &RenderState) {
        self.commands.push(GpuCommand::SetRenderState(*state));
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32) {
        self.commands
            .push(GpuCommand::DrawArrays { mode, first, count });
    }

    fn draw_elements(
        &mut self,
        mode: PrimitiveMode,
        index_buffer: BufferHandle,
        format: IndexFormat,
        count: u32,
    ) {
        self.commands.push(GpuCommand::DrawElements {
            mode,
            buffer: index_buffer,
            format,
            count,
        });
    }

    fn max_vertex_attributes(&self) -> u32 {
        self.max_vertex_attributes
    }

    fn max_anisotropy(&self) -> Option<f32> {
        self.max_anisotropy
    }

    fn supports_float_render_targets(&self) -> bool {
        self.float_render_targets
    }
}

// ============================================================================
// GLSL declaration reflection
// ============================================================================

fn strip_precision<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<&'a str> {
    tokens.find(|t| !matches!(*t, "highp" | "mediump" | "lowp" | "flat"))
}

/// Split `name[N]` into name and array length, resolving `N` through `#define`s
fn parse_declarator(raw: &str, defines: &HashMap<String, String>) -> (String, Option<u32>) {
    let raw = raw.trim_end_matches(';');
    match raw.split_once('[') {
        Some((name, rest)) => {
            let len = rest.trim_end_matches(']');
            let len = len
                .parse::<u32>()
                .ok()
                .or_else(|| defines.get(len).and_then(|v| v.parse().ok()))
                .unwrap_or(1);
            (name.to_string(), Some(len))
        }
        None => (raw.to_string(), None),
    }
}

fn push_uniform(out: &mut Vec<ActiveUniform>, name: String, ty: UniformType, size: u32) {
    if out.iter().any(|u| u.name == name) {
        return;
    }
    let location = UniformLocation(out.len() as u32);
    out.push(ActiveUniform {
        name,
        ty,
        size,
        location,
    });
}

/// Lines surviving `#ifdef`/`#ifndef`/`#else`/`#endif`, plus collected defines
fn active_lines(source: &str) -> (Vec<&str>, HashMap<String, String>) {
    let mut defines: HashMap<String, String> = HashMap::new();
    let mut stack: Vec<bool> = Vec::new();
    let mut lines = Vec::new();

    for line in source.lines().map(str::trim) {
        let active = stack.iter().all(|&b| b);
        if let Some(name) = line.strip_prefix("#ifdef ") {
            stack.push(defines.contains_key(name.trim()));
        } else if let Some(name) = line.strip_prefix("#ifndef ") {
            stack.push(!defines.contains_key(name.trim()));
        } else if line.starts_with("#if ") {
            stack.push(true);
        } else if line.starts_with("#else") {
            if let Some(top) = stack.last_mut() {
                *top = !*top;
            }
        } else if line.starts_with("#endif") {
            stack.pop();
        } else if !active {
            continue;
        } else if let Some(rest) = line.strip_prefix("#define ") {
            let mut parts = rest.split_whitespace();
            if let Some(name) = parts.next() {
                let value = parts.next().unwrap_or("1");
                defines.insert(name.to_string(), value.to_string());
            }
        } else {
            lines.push(line);
        }
    }
    (lines, defines)
}

fn reflect_uniforms(source: &str, out: &mut Vec<ActiveUniform>) {
    let (lines, defines) = active_lines(source);
    let mut structs: HashMap<String, Vec<(UniformType, String)>> = HashMap::new();
    let mut current_struct: Option<(String, Vec<(UniformType, String)>)> = None;

    for line in lines {
        if let Some((name, members)) = current_struct.as_mut() {
            if line.starts_with('}') {
                let (name, members) = (std::mem::take(name), std::mem::take(members));
                structs.insert(name, members);
                current_struct = None;
            } else {
                let mut tokens = line.split_whitespace();
                if let (Some(ty), Some(member)) = (strip_precision(&mut tokens), tokens.next()) {
                    if let Some(ty) = UniformType::from_glsl(ty) {
                        members.push((ty, member.trim_end_matches(';').to_string()));
                    }
                }
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("struct ") {
            let name = rest.trim_end_matches('{').trim().to_string();
            current_struct = Some((name, Vec::new()));
            continue;
        }

        let Some(rest) = line.strip_prefix("uniform ") else {
            continue;
        };
        let mut tokens = rest.split_whitespace();
        let (Some(ty_name), Some(declarator)) = (strip_precision(&mut tokens), tokens.next()) else {
            continue;
        };
        let (name, array_len) = parse_declarator(declarator, &defines);

        if let Some(ty) = UniformType::from_glsl(ty_name) {
            match array_len {
                Some(len) => push_uniform(out, format!("{}[0]", name), ty, len),
                None => push_uniform(out, name, ty, 1),
            }
        } else if let Some(members) = structs.get(ty_name) {
            let elements: Vec<String> = match array_len {
                Some(len) => (0..len).map(|i| format!("{}[{}]", name, i)).collect(),
                None => vec![name],
            };
            for element in elements {
                for (ty, member) in members {
                    push_uniform(out, format!("{}.{}", element, member), *ty, 1);
                }
            }
        }
    }
}

fn reflect_attributes(source: &str) -> Vec<ActiveAttribute> {
    let mut attributes = Vec::new();
    for line in active_lines(source).0 {
        let Some(rest) = line.strip_prefix("in ") else {
            continue;
        };
        let mut tokens = rest.split_whitespace();
        if let (Some(_ty), Some(name)) = (strip_precision(&mut tokens), tokens.next()) {
            let name = name.trim_end_matches(';').to_string();
            if !attributes.iter().any(|a: &ActiveAttribute| a.name == name) {
                attributes.push(ActiveAttribute {
                    location: attributes.len() as u32,
                    name,
                });
            }
        }
    }
    attributes
}
