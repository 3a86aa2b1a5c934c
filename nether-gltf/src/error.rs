//! Error types
//!
//! Loading is the only phase that surfaces errors to callers. Per-frame
//! rendering degrades and logs instead (see `render`).

use std::path::PathBuf;

use thiserror::Error;

/// Failure while loading a glTF asset or environment panorama
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glTF JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid GLB container: {0}")]
    Glb(String),

    #[error("unsupported glTF version {0} (only 2.x is supported)")]
    UnsupportedVersion(String),

    #[error("buffer {index} holds {actual} bytes but declares {expected}")]
    TruncatedBuffer {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("could not resolve URI '{0}'")]
    UnresolvedUri(String),

    #[error("invalid data URI: {0}")]
    DataUri(#[from] base64::DecodeError),

    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("{extension} is required by the asset but no decoder is registered")]
    MissingDecoder { extension: &'static str },

    #[error("external decoder failed: {0}")]
    Decoder(String),

    #[error("{kind} index {index} is out of range")]
    InvalidIndex { kind: &'static str, index: usize },

    #[error("GPU upload failed: {0}")]
    Gpu(#[from] GpuError),

    #[error("shader setup failed: {0}")]
    Shader(#[from] ShaderError),
}

/// Failure reported by a [`GpuDevice`](crate::gpu::GpuDevice) implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("buffer creation failed: {0}")]
    Buffer(String),

    #[error("texture creation failed: {0}")]
    Texture(String),

    #[error("framebuffer incomplete: {0}")]
    Framebuffer(String),

    #[error("shader compilation failed:\n{log}")]
    Compile { log: String },

    #[error("program link failed:\n{log}")]
    Link { log: String },
}

/// Failure while selecting or building a shader permutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    #[error("unknown shader source '{0}'")]
    UnknownSource(String),

    #[error("shader '{identifier}' failed to compile: {source}")]
    Compile {
        identifier: String,
        #[source]
        source: GpuError,
    },

    #[error("no compiled shader for hash {0:#018x}")]
    MissingShader(u64),

    #[error("program link failed: {0}")]
    Link(#[source] GpuError),
}

/// Failure while reading rendering parameters
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Invalid render pass ordering
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderGraphError {
    #[error("pass '{pass}' reads {resource:?} before any pass writes it")]
    UnwrittenInput {
        pass: &'static str,
        resource: crate::render::PassResource,
    },

    #[error("pass '{0}' is scheduled twice")]
    DuplicatePass(&'static str),
}
