//! Shader permutation cache
//!
//! Maps `(identifier, defines)` to a compiled shader object and pairs of
//! shader hashes to linked programs. `#include <name>` directives are expanded
//! once when the cache is built.

use hashbrown::HashMap;

use super::defines::ShaderDefines;
use super::program::ShaderProgram;
use crate::error::ShaderError;
use crate::gpu::{GpuDevice, ShaderHandle, ShaderStage};

/// Asymmetric hash combine of a vertex and fragment shader hash
pub fn combine_hashes(h1: u64, h2: u64) -> u64 {
    h1 ^ (h1
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(h2 << 6)
        .wrapping_add(h2 >> 2))
}

/// Expand `#include <name>` directives against `sources`.
///
/// The first directive for a name is replaced by that source; later repeats of
/// the same directive are removed. Included text is not scanned again.
pub fn expand_includes(source: &str, sources: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = sources.keys().collect();
    names.sort();

    let mut expanded = source.to_string();
    for name in names {
        let directive = format!("#include <{}>", name);
        if let Some(position) = expanded.find(&directive) {
            let mut rest = expanded[position + directive.len()..].replace(&directive, "");
            rest.insert_str(0, &sources[name]);
            expanded.truncate(position);
            expanded.push_str(&rest);
        }
    }
    if expanded.contains("#include <") {
        tracing::warn!("Shader source contains an unresolved #include");
    }
    expanded
}

/// A compiled permutation and what produced it
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub handle: ShaderHandle,
    pub identifier: String,
    pub defines: Vec<String>,
}

pub struct ShaderCache {
    sources: HashMap<String, String>,
    glsl_version: String,
    shaders: HashMap<u64, CompiledShader>,
    failed_shaders: HashMap<u64, ShaderError>,
    failed_programs: HashMap<u64, ShaderError>,
    programs: HashMap<u64, ShaderProgram>,
}

impl ShaderCache {
    /// Build a cache over named sources; includes are expanded here
    pub fn new<I, K, V>(sources: I, glsl_version: &str) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let raw: HashMap<String, String> = sources
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let sources = raw
            .iter()
            .map(|(name, source)| (name.clone(), expand_includes(source, &raw)))
            .collect();

        Self {
            sources,
            glsl_version: glsl_version.to_string(),
            shaders: HashMap::new(),
            failed_shaders: HashMap::new(),
            failed_programs: HashMap::new(),
            programs: HashMap::new(),
        }
    }

    /// Cache over the built-in viewer shaders
    pub fn with_builtin_sources(glsl_version: &str) -> Self {
        Self::new(super::sources::BUILTIN_SOURCES.iter().copied(), glsl_version)
    }

    /// Include-expanded source for `identifier`
    pub fn source(&self, identifier: &str) -> Option<&str> {
        self.sources.get(identifier).map(String::as_str)
    }

    /// Full source text compiled for a permutation
    pub fn permutation_source(&self, identifier: &str, defines: &ShaderDefines) -> Option<String> {
        let source = self.source(identifier)?;
        let mut text = format!("#version {}\n", self.glsl_version);
        for define in defines {
            text.push_str(&format!("#define {}\n", define));
        }
        text.push_str(source);
        Some(text)
    }

    /// Compile the permutation if needed and return its hash
    pub fn select_shader(
        &mut self,
        device: &mut dyn GpuDevice,
        identifier: &str,
        defines: &ShaderDefines,
    ) -> Result<u64, ShaderError> {
        let hash = defines.permutation_hash(identifier);
        if self.shaders.contains_key(&hash) {
            return Ok(hash);
        }
        if let Some(error) = self.failed_shaders.get(&hash) {
            return Err(error.clone());
        }

        let text = self
            .permutation_source(identifier, defines)
            .ok_or_else(|| ShaderError::UnknownSource(identifier.to_string()))?;
        let stage = if identifier.ends_with(".vert") {
            ShaderStage::Vertex
        } else {
            ShaderStage::Fragment
        };

        match device.compile_shader(stage, &text) {
            Ok(handle) => {
                tracing::debug!(
                    "Compiled {} ({} defines, hash {:016x})",
                    identifier,
                    defines.len(),
                    hash
                );
                self.shaders.insert(
                    hash,
                    CompiledShader {
                        handle,
                        identifier: identifier.to_string(),
                        defines: defines.to_strings(),
                    },
                );
                Ok(hash)
            }
            Err(source) => {
                let error = ShaderError::Compile {
                    identifier: identifier.to_string(),
                    source,
                };
                tracing::error!("{}", error);
                self.failed_shaders.insert(hash, error.clone());
                Err(error)
            }
        }
    }

    /// Linked program for a vertex/fragment pair, linking on first use
    pub fn get_shader_program(
        &mut self,
        device: &mut dyn GpuDevice,
        vertex_hash: u64,
        fragment_hash: u64,
    ) -> Result<&mut ShaderProgram, ShaderError> {
        let key = combine_hashes(vertex_hash, fragment_hash);
        if let Some(error) = self.failed_programs.get(&key) {
            return Err(error.clone());
        }

        if !self.programs.contains_key(&key) {
            let vertex = self
                .shaders
                .get(&vertex_hash)
                .ok_or(ShaderError::MissingShader(vertex_hash))?
                .handle;
            let fragment = self
                .shaders
                .get(&fragment_hash)
                .ok_or(ShaderError::MissingShader(fragment_hash))?
                .handle;

            let handle = match device.link_program(vertex, fragment) {
                Ok(handle) => handle,
                Err(err) => {
                    let error = ShaderError::Link(err);
                    tracing::error!("{}", error);
                    self.failed_programs.insert(key, error.clone());
                    return Err(error);
                }
            };
            tracing::debug!("Linked program {:016x}", key);
            self.programs
                .insert(key, ShaderProgram::new(device, handle));
        }

        self.programs
            .get_mut(&key)
            .ok_or(ShaderError::MissingShader(key))
    }

    /// All compiled permutations, by hash
    pub fn compiled_shaders(&self) -> impl Iterator<Item = (u64, &CompiledShader)> {
        self.shaders.iter().map(|(hash, shader)| (*hash, shader))
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }
}
