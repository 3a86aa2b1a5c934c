//! Nether glTF - glTF 2.0 scene runtime and PBR renderer core
//!
//! Loads glTF/GLB assets, animates and skins them, and renders them through
//! a backend-agnostic [`GpuDevice`] with image based lighting and a
//! transmission render graph.
//!
//! # Architecture
//!
//! - [`loader`] - `.gltf`/`.glb` parsing, URI resolution, image decoding
//! - [`gltf`] - scene graph, accessors, materials, animation, skins
//! - [`shader`] - permutation cache keyed by define sets
//! - [`render`] - draw lists, render graph and the [`Renderer`]
//! - [`ibl`] - panorama to pre-filtered environment
//! - [`GltfView`] - per-frame driver over a [`GltfState`]

pub mod config;
pub mod error;
pub mod gltf;
pub mod gpu;
pub mod ibl;
pub mod loader;
pub mod math;
pub mod render;
pub mod shader;
pub mod state;
pub mod user_camera;
pub mod view;

pub use config::{DebugOutput, EnabledExtensions, RenderingParameters, ToneMap};
pub use error::{ConfigError, GpuError, LoadError, RenderGraphError, ShaderError};
pub use gltf::Gltf;
pub use gpu::{GpuDevice, HeadlessDevice};
pub use ibl::{Environment, IblSampler, Panorama};
pub use loader::{load_environment, load_environment_from_slice, load_gltf, GltfLoader};
pub use render::{FrameReport, Renderer};
pub use state::{AnimationTimer, GltfState};
pub use user_camera::UserCamera;
pub use view::{GltfView, Statistics};
