//! Frame rendering
//!
//! - [`DrawLists`]: per-frame opaque/transparent/transmissive partition
//! - [`RenderGraph`]: ordered passes with read-after-write validation
//! - [`GpuResources`]: lazily uploaded buffers and textures
//! - [`EnvironmentRenderer`]: cubemap background
//! - [`Renderer`]: executes the graph against a [`GpuDevice`](crate::gpu::GpuDevice)

mod draw_list;
mod environment;
mod graph;
mod renderer;
mod resources;

pub use draw_list::{camera_depth, sort_transmissive, sort_transparent, Bucket, DrawLists, Drawable};
pub use environment::{environment_rotation, EnvironmentRenderer};
pub use graph::{PassKind, PassResource, PassTarget, RenderGraph, RenderPass};
pub use renderer::{FrameReport, Renderer};
pub use resources::{full_mip_chain, GpuBuffer, GpuIndices, GpuResources};
