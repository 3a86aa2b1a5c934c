//! glTF 2.0 object model
//!
//! Authored JSON maps onto these types with serde. Derived runtime state
//! (world matrices, centroids, material defines, animation bounds) lives on
//! the same objects in `#[serde(skip)]` fields and is filled by
//! [`Gltf::initialize`] after the loader has resolved buffers and images.

mod accessor;
mod animation;
mod camera;
mod interpolator;
mod light;
mod material;
mod mesh;
mod node;
mod scene;
mod skin;
mod texture;

pub use accessor::{
    dequantize, Accessor, AccessorType, Buffer, BufferView, ComponentType, Sparse, SparseIndices,
    SparseValues, TypedData,
};
pub use animation::{
    compute_disjoint_animations, Animation, AnimationChannel, AnimationSampler, ChannelTarget,
};
pub use camera::{camera_export_json, Camera, CameraType, Orthographic, Perspective};
pub use interpolator::{Interpolation, Interpolator, TargetPath};
pub use light::{fallback_lights, Light, LightType, Spot};
pub use material::{
    AlphaMode, Material, MaterialExtensions, MaterialTexture, PbrMetallicRoughness, TextureInfo,
    TextureSlot, TextureTransform,
};
pub use mesh::{
    shader_attribute_name, target_attribute_name, DracoCompression, Mesh, Primitive,
    PrimitiveExtensions, VariantMapping, MAX_MORPH_WEIGHTS,
};
pub use node::{Node, NodeExtensions, NodeLight, TransformState};
pub use scene::{Scene, Visit};
pub use skin::{JointMatrices, Skin};
pub use texture::{
    Image, ImageData, Sampler, Texture, CLAMP_TO_EDGE, LINEAR, LINEAR_MIPMAP_LINEAR,
    LINEAR_MIPMAP_NEAREST, MIRRORED_REPEAT, NEAREST, NEAREST_MIPMAP_LINEAR, NEAREST_MIPMAP_NEAREST,
    REPEAT,
};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LightsPunctual {
    #[serde(default)]
    pub lights: Vec<Light>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialsVariants {
    #[serde(default)]
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootExtensions {
    #[serde(rename = "KHR_lights_punctual", default, skip_serializing_if = "Option::is_none")]
    pub lights_punctual: Option<LightsPunctual>,
    #[serde(rename = "KHR_materials_variants", default, skip_serializing_if = "Option::is_none")]
    pub materials_variants: Option<MaterialsVariants>,
}

/// A loaded glTF asset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gltf {
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub meshes: Vec<Mesh>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    #[serde(default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub textures: Vec<Texture>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub samplers: Vec<Sampler>,
    #[serde(default)]
    pub animations: Vec<Animation>,
    #[serde(default)]
    pub skins: Vec<Skin>,
    #[serde(default)]
    pub cameras: Vec<Camera>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
    #[serde(default)]
    pub extensions: RootExtensions,

    /// `KHR_lights_punctual` lights with owning nodes resolved
    #[serde(skip)]
    pub lights: Vec<Light>,
    /// `KHR_materials_variants` names, indexed by variant id
    #[serde(skip)]
    pub variants: Vec<String>,
}

impl Gltf {
    /// Parse glTF JSON and check the asset version
    pub fn from_json_slice(json: &[u8]) -> Result<Self, LoadError> {
        let gltf: Gltf = serde_json::from_slice(json)?;
        if !gltf.asset.version.starts_with("2.") {
            return Err(LoadError::UnsupportedVersion(gltf.asset.version));
        }
        Ok(gltf)
    }

    /// Derive runtime state once buffers and images are resolved
    pub fn initialize(&mut self) {
        for node in &mut self.nodes {
            node.initialize();
        }

        for mesh in &mut self.meshes {
            for primitive in &mut mesh.primitives {
                primitive.initialize(&self.accessors, &self.buffer_views, &self.buffers);
            }
        }

        let unassigned = self
            .meshes
            .iter()
            .flat_map(|m| &m.primitives)
            .any(|p| p.material.is_none());
        if unassigned {
            let default_material = self.materials.len();
            self.materials.push(Material::default());
            for primitive in self.meshes.iter_mut().flat_map(|m| &mut m.primitives) {
                primitive.material.get_or_insert(default_material);
            }
        }

        for material in &mut self.materials {
            material.initialize();
        }

        for animation in &mut self.animations {
            animation.initialize(&self.accessors, &self.buffer_views, &self.buffers);
        }
        let disjoint_sets = compute_disjoint_animations(&self.animations);
        for (animation, disjoint) in self.animations.iter_mut().zip(disjoint_sets) {
            animation.disjoint_animations = disjoint;
        }

        self.lights = self
            .extensions
            .lights_punctual
            .as_ref()
            .map(|l| l.lights.clone())
            .unwrap_or_default();
        self.variants = self
            .extensions
            .materials_variants
            .as_ref()
            .map(|v| v.variants.iter().map(|v| v.name.clone()).collect())
            .unwrap_or_default();

        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(camera) = node.camera.and_then(|c| self.cameras.get_mut(c)) {
                camera.node = Some(index);
            }
            if let Some(light) = node.light().and_then(|l| self.lights.get_mut(l)) {
                light.node = Some(index);
            }
        }

        tracing::debug!(
            "Initialized glTF: {} nodes, {} meshes, {} materials, {} animations",
            self.nodes.len(),
            self.meshes.len(),
            self.materials.len(),
            self.animations.len()
        );
    }

    /// Scene to show by default
    pub fn default_scene(&self) -> usize {
        self.scene.unwrap_or(0)
    }

    /// Variant id for a variant name
    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == name)
    }

    /// Sample the given animations at `t` into node overrides
    pub fn apply_animations(&mut self, animations: &[usize], t: Option<f32>) {
        for &index in animations {
            let Some(animation) = self.animations.get_mut(index) else {
                tracing::warn!("Animation {} does not exist", index);
                continue;
            };
            animation.advance(
                &self.accessors,
                &self.buffer_views,
                &self.buffers,
                &mut self.nodes,
                t,
            );
        }
    }

    /// Remove all animation overrides
    pub fn clear_animations(&mut self) {
        for node in &mut self.nodes {
            node.clear_animation();
        }
        for animation in &mut self.animations {
            animation.reset();
        }
    }

    /// Recompute world matrices for every node reachable from `scene`
    pub fn apply_transform_hierarchy(&mut self, scene: usize, root_transform: Mat4) {
        match self.scenes.get(scene) {
            Some(scene) => scene.apply_transform_hierarchy(&mut self.nodes, root_transform),
            None => tracing::warn!("Scene {} does not exist", scene),
        }
    }

    /// Reachable nodes of `scene` in traversal order
    pub fn gather_nodes(&self, scene: usize) -> Vec<usize> {
        self.scenes
            .get(scene)
            .map(|s| s.gather_nodes(&self.nodes))
            .unwrap_or_default()
    }

    /// Joint matrices of the skin used by mesh node `node`, for that node
    pub fn joint_matrices(&self, node: usize) -> Option<JointMatrices> {
        let mesh_node = self.nodes.get(node)?;
        let skin_index = mesh_node.skin?;
        let Some(skin) = self.skins.get(skin_index) else {
            tracing::warn!("Node {} references missing skin {}", node, skin_index);
            return None;
        };
        let inverse_bind = skin.inverse_bind_matrices(&self.accessors, &self.buffer_views, &self.buffers);
        Some(skin.compute_joints(mesh_node, &self.nodes, &inverse_bind))
    }

    /// World-space bounds of all mesh positions in `scene`, from accessor min/max
    pub fn scene_bounds(&self, scene: usize) -> Option<(Vec3, Vec3)> {
        let mut bounds: Option<(Vec3, Vec3)> = None;
        for node_index in self.gather_nodes(scene) {
            let node = &self.nodes[node_index];
            let Some(mesh) = node.mesh.and_then(|m| self.meshes.get(m)) else {
                continue;
            };
            for primitive in &mesh.primitives {
                let Some(accessor) = primitive.attributes.get("POSITION").and_then(|&a| self.accessors.get(a))
                else {
                    continue;
                };
                let (Some(min), Some(max)) = (&accessor.min, &accessor.max) else {
                    continue;
                };
                if min.len() < 3 || max.len() < 3 {
                    continue;
                }
                let (min, max) = (Vec3::from_slice(min), Vec3::from_slice(max));
                for corner in 0..8 {
                    let point = Vec3::new(
                        if corner & 1 == 0 { min.x } else { max.x },
                        if corner & 2 == 0 { min.y } else { max.y },
                        if corner & 4 == 0 { min.z } else { max.z },
                    );
                    let world = node.world_transform.transform_point3(point);
                    bounds = Some(match bounds {
                        Some((lo, hi)) => (lo.min(world), hi.max(world)),
                        None => (world, world),
                    });
                }
            }
        }
        bounds
    }
}
