//! glTF cameras and camera export

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::Node;
use crate::math;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perspective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f32>,
    pub yfov: f32,
    /// Absent means an infinite far plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zfar: Option<f32>,
    pub znear: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orthographic {
    pub xmag: f32,
    pub ymag: f32,
    pub zfar: f32,
    pub znear: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    #[serde(rename = "type")]
    pub ty: CameraType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<Perspective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orthographic: Option<Orthographic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Node carrying this camera, resolved on load
    #[serde(skip)]
    pub node: Option<usize>,
}

impl Camera {
    pub fn perspective(yfov: f32, znear: f32, zfar: Option<f32>) -> Self {
        Self {
            ty: CameraType::Perspective,
            perspective: Some(Perspective {
                aspect_ratio: None,
                yfov,
                zfar,
                znear,
            }),
            orthographic: None,
            name: None,
            node: None,
        }
    }

    /// Projection for the given viewport aspect ratio.
    ///
    /// The authored aspect ratio is overridden by the viewport's.
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        match (self.ty, &self.perspective, &self.orthographic) {
            (CameraType::Perspective, Some(p), _) => math::perspective(p.yfov, aspect_ratio, p.znear, p.zfar),
            (CameraType::Orthographic, _, Some(o)) => math::orthographic(o.xmag, o.ymag, o.znear, o.zfar),
            _ => {
                tracing::warn!("Camera {:?} has no {:?} parameters", self.name, self.ty);
                Mat4::IDENTITY
            }
        }
    }

    /// World transform of the owning node
    pub fn world_transform(&self, nodes: &[Node]) -> Mat4 {
        self.node
            .and_then(|n| nodes.get(n))
            .map(|n| n.world_transform)
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn view_matrix(&self, nodes: &[Node]) -> Mat4 {
        math::invert(&self.world_transform(nodes)).unwrap_or(Mat4::IDENTITY)
    }

    pub fn position(&self, nodes: &[Node]) -> Vec3 {
        self.world_transform(nodes).w_axis.truncate()
    }
}

/// Minimal glTF document holding one camera at `world`: `asset`, `cameras[0]`, `nodes[0].matrix`
pub fn camera_export_json(camera: &Camera, world: &Mat4) -> serde_json::Value {
    let mut exported = camera.clone();
    exported.node = None;
    json!({
        "asset": {
            "version": "2.0",
            "generator": concat!("nether-gltf ", env!("CARGO_PKG_VERSION")),
        },
        "cameras": [exported],
        "nodes": [{
            "camera": 0,
            "matrix": math::mat4_to_array(world),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_matrix_inverts_node_world() {
        let mut node = Node::default();
        node.set_world_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)));
        let mut camera = Camera::perspective(0.8, 0.1, Some(100.0));
        camera.node = Some(0);

        let nodes = [node];
        let view = camera.view_matrix(&nodes);
        assert!(view.transform_point3(Vec3::new(0.0, 0.0, 5.0)).abs_diff_eq(Vec3::ZERO, 1e-6));
        assert_eq!(camera.position(&nodes), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn export_json_layout() {
        let camera = Camera::perspective(0.5, 0.01, None);
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let doc = camera_export_json(&camera, &world);

        assert_eq!(doc["asset"]["version"], "2.0");
        assert_eq!(doc["cameras"][0]["type"], "perspective");
        assert_eq!(doc["cameras"][0]["perspective"]["yfov"], 0.5);
        assert!(doc["cameras"][0]["perspective"].get("zfar").is_none());
        let matrix = doc["nodes"][0]["matrix"].as_array().unwrap();
        assert_eq!(matrix.len(), 16);
        assert_eq!(matrix[12], 1.0);
        assert_eq!(matrix[14], 3.0);
    }

    #[test]
    fn orthographic_projection() {
        let camera: Camera = serde_json::from_str(
            r#"{ "type": "orthographic", "orthographic": { "xmag": 2, "ymag": 1, "znear": 0.1, "zfar": 10 } }"#,
        )
        .unwrap();
        let projection = camera.projection_matrix(1.0);
        assert!((projection.x_axis.x - 0.5).abs() < 1e-6);
        assert!((projection.y_axis.y - 1.0).abs() < 1e-6);
    }
}
