//! Shader permutations
//!
//! - [`Define`] / [`ShaderDefines`]: the closed set of permutation switches
//! - [`ShaderCache`]: compiles `(identifier, defines)` once and links programs per shader pair
//! - [`ShaderProgram`]: introspected uniforms/attributes and [`UniformValue`] upload

mod cache;
mod defines;
mod program;
mod sources;
mod uniform;

pub use cache::{combine_hashes, expand_includes, CompiledShader, ShaderCache};
pub use defines::{string_hash, Define, ShaderDefines};
pub use program::ShaderProgram;
pub use sources::BUILTIN_SOURCES;
pub use uniform::UniformValue;
