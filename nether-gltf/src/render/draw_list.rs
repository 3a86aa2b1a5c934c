//! Per-frame drawable lists
//!
//! Flattens the reachable nodes of a scene into `(node, primitive)` draws and
//! partitions them into the opaque, transparent and transmissive buckets.

use std::cmp::Ordering;

use glam::{Mat4, Vec3};

use crate::gltf::Gltf;

/// One primitive of one mesh node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawable {
    pub node: usize,
    pub mesh: usize,
    pub primitive: usize,
    /// Material after variant resolution
    pub material: usize,
    /// Camera-space z of the primitive centroid (negative is in front)
    pub depth: f32,
}

/// Drawable partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Opaque,
    Transparent,
    Transmissive,
}

/// Camera-space depth of `centroid` placed by `world`
pub fn camera_depth(view: &Mat4, world: &Mat4, centroid: Vec3) -> f32 {
    (*view * *world * centroid.extend(1.0)).z
}

fn farthest_first(a: &Drawable, b: &Drawable) -> Ordering {
    a.depth.total_cmp(&b.depth)
}

/// Blended draws in far-to-near order.
///
/// Draws whose centroid lies behind the camera (`depth > 0`) are dropped.
pub fn sort_transparent(drawables: Vec<Drawable>) -> Vec<Drawable> {
    let mut sorted: Vec<Drawable> = drawables.into_iter().filter(|d| d.depth <= 0.0).collect();
    sorted.sort_by(farthest_first);
    sorted
}

/// Transmissive draws in far-to-near order, nothing dropped
pub fn sort_transmissive(drawables: Vec<Drawable>) -> Vec<Drawable> {
    let mut sorted = drawables;
    sorted.sort_by(farthest_first);
    sorted
}

/// Bucketed drawables for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawLists {
    pub opaque: Vec<Drawable>,
    pub transparent: Vec<Drawable>,
    pub transmissive: Vec<Drawable>,
}

impl DrawLists {
    /// Gather and sort the draws of `nodes` as seen through `view`
    pub fn build(gltf: &Gltf, nodes: &[usize], view: &Mat4, active_variant: Option<usize>) -> Self {
        let mut lists = DrawLists::default();
        let mut transparent = Vec::new();
        let mut transmissive = Vec::new();

        for &node_index in nodes {
            let Some(node) = gltf.nodes.get(node_index) else {
                continue;
            };
            let Some(mesh_index) = node.mesh else {
                continue;
            };
            let Some(mesh) = gltf.meshes.get(mesh_index) else {
                tracing::warn!("Node {} references missing mesh {}", node_index, mesh_index);
                continue;
            };

            for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
                if primitive.skip {
                    continue;
                }
                let Some(material_index) = primitive.effective_material(active_variant) else {
                    continue;
                };
                let Some(material) = gltf.materials.get(material_index) else {
                    tracing::warn!("Primitive references missing material {}", material_index);
                    continue;
                };

                let drawable = Drawable {
                    node: node_index,
                    mesh: mesh_index,
                    primitive: primitive_index,
                    material: material_index,
                    depth: camera_depth(view, &node.world_transform, primitive.centroid),
                };

                if material.has_transmission() {
                    transmissive.push(drawable);
                } else if material.is_blend() {
                    transparent.push(drawable);
                } else {
                    lists.opaque.push(drawable);
                }
            }
        }

        lists.transparent = sort_transparent(transparent);
        lists.transmissive = sort_transmissive(transmissive);
        lists
    }

    pub fn bucket(&self, bucket: Bucket) -> &[Drawable] {
        match bucket {
            Bucket::Opaque => &self.opaque,
            Bucket::Transparent => &self.transparent,
            Bucket::Transmissive => &self.transmissive,
        }
    }

    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len() + self.transmissive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::{AlphaMode, Material, Mesh, Node, Primitive};

    fn at_depth(depth: f32) -> Drawable {
        Drawable {
            node: 0,
            mesh: 0,
            primitive: 0,
            material: 0,
            depth,
        }
    }

    #[test]
    fn transparent_sort_is_far_first_and_drops_behind_camera() {
        let sorted = sort_transparent(vec![at_depth(-5.0), at_depth(-1.0), at_depth(-10.0), at_depth(2.0)]);
        let depths: Vec<f32> = sorted.iter().map(|d| d.depth).collect();
        assert_eq!(depths, vec![-10.0, -5.0, -1.0]);
    }

    #[test]
    fn transmissive_sort_keeps_everything() {
        let sorted = sort_transmissive(vec![at_depth(2.0), at_depth(-3.0)]);
        let depths: Vec<f32> = sorted.iter().map(|d| d.depth).collect();
        assert_eq!(depths, vec![-3.0, 2.0]);
    }

    #[test]
    fn depth_uses_view_and_world() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let world = Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(camera_depth(&view, &world, Vec3::new(0.0, 0.0, 1.0)), -3.0);
    }

    fn material(alpha_mode: AlphaMode, transmission: bool) -> Material {
        let json = if transmission {
            r#"{ "extensions": { "KHR_materials_transmission": {} } }"#
        } else {
            "{}"
        };
        let mut material: Material = serde_json::from_str(json).unwrap();
        material.alpha_mode = alpha_mode;
        material.initialize();
        material
    }

    #[test]
    fn build_partitions_by_material() {
        let mut gltf = Gltf::default();
        gltf.materials = vec![
            material(AlphaMode::Opaque, false),
            material(AlphaMode::Blend, false),
            material(AlphaMode::Blend, true),
        ];
        let primitives = (0..3)
            .map(|m| Primitive {
                material: Some(m),
                ..Default::default()
            })
            .chain(std::iter::once(Primitive {
                material: Some(0),
                skip: true,
                ..Default::default()
            }))
            .collect();
        gltf.meshes = vec![Mesh {
            primitives,
            ..Default::default()
        }];
        let mut node = Node::default();
        node.mesh = Some(0);
        node.set_world_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0)));
        gltf.nodes = vec![node];

        let lists = DrawLists::build(&gltf, &[0], &Mat4::IDENTITY, None);
        assert_eq!(lists.opaque.len(), 1);
        assert_eq!(lists.transparent.len(), 1);
        assert_eq!(lists.transmissive.len(), 1);
        assert_eq!(lists.transmissive[0].material, 2);
        assert_eq!(lists.transparent[0].depth, -2.0);
        assert_eq!(lists.len(), 3);
    }
}
