//! Skins and per-frame joint matrices

use glam::Mat4;
use serde::{Deserialize, Serialize};

use super::{Accessor, Buffer, BufferView, Node};
use crate::math;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_bind_matrices: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<usize>,
    pub joints: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Joint and joint-normal matrices of a skin as seen from one mesh node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointMatrices {
    pub joints: Vec<Mat4>,
    pub normals: Vec<Mat4>,
}

impl Skin {
    /// Inverse bind matrix per joint; identity when absent or truncated
    pub fn inverse_bind_matrices(
        &self,
        accessors: &[Accessor],
        views: &[BufferView],
        buffers: &[Buffer],
    ) -> Vec<Mat4> {
        let data = self
            .inverse_bind_matrices
            .and_then(|i| accessors.get(i))
            .map(|a| a.read_f32(views, buffers))
            .unwrap_or_default();

        (0..self.joints.len())
            .map(|i| {
                data.get(i * 16..i * 16 + 16)
                    .map(Mat4::from_cols_slice)
                    .unwrap_or(Mat4::IDENTITY)
            })
            .collect()
    }

    /// Joint matrices for the mesh node `node` from current world transforms.
    ///
    /// `joint = inverse(node.world) * joint.world * inverseBind`
    pub fn compute_joints(&self, node: &Node, nodes: &[Node], inverse_bind: &[Mat4]) -> JointMatrices {
        let parent_inverse = node.inverse_world_transform.unwrap_or(Mat4::IDENTITY);

        let mut matrices = JointMatrices {
            joints: Vec::with_capacity(self.joints.len()),
            normals: Vec::with_capacity(self.joints.len()),
        };
        for (i, &joint) in self.joints.iter().enumerate() {
            let joint_world = nodes
                .get(joint)
                .map(|n| n.world_transform)
                .unwrap_or_else(|| {
                    tracing::warn!("Skin references missing joint node {}", joint);
                    Mat4::IDENTITY
                });
            let ibm = inverse_bind.get(i).copied().unwrap_or(Mat4::IDENTITY);
            let matrix = parent_inverse * joint_world * ibm;
            matrices.joints.push(matrix);
            matrices
                .normals
                .push(math::normal_matrix(&matrix).unwrap_or(Mat4::IDENTITY));
        }
        matrices
    }
}
