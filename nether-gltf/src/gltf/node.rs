//! Scene graph nodes
//!
//! Authored TRS (or a matrix, decomposed on load) plus per-frame derived state.
//! Animation writes override fields; the local transform is only recomposed
//! when the node is marked dirty.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::math;

/// Whether the cached local transform matches the current TRS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformState {
    Clean,
    #[default]
    Dirty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLight {
    pub light: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeExtensions {
    #[serde(
        rename = "KHR_lights_punctual",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub lights_punctual: Option<NodeLight>,
}

fn default_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f32; 16]>,
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<usize>,
    /// Per-node morph weight override of the mesh defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<NodeExtensions>,

    // Animation overrides, written each frame before the hierarchy pass
    #[serde(skip)]
    pub animation_translation: Option<Vec3>,
    #[serde(skip)]
    pub animation_rotation: Option<Quat>,
    #[serde(skip)]
    pub animation_scale: Option<Vec3>,
    #[serde(skip)]
    pub animation_weights: Option<Vec<f32>>,

    // Derived by the hierarchy pass
    #[serde(skip)]
    pub world_transform: Mat4,
    /// `None` when the world transform is singular
    #[serde(skip)]
    pub inverse_world_transform: Option<Mat4>,
    #[serde(skip)]
    pub normal_matrix: Mat4,

    #[serde(skip)]
    local_transform: Mat4,
    #[serde(skip)]
    transform_state: TransformState,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            matrix: None,
            translation: [0.0; 3],
            rotation: default_rotation(),
            scale: default_scale(),
            mesh: None,
            skin: None,
            camera: None,
            weights: None,
            name: None,
            extensions: None,
            animation_translation: None,
            animation_rotation: None,
            animation_scale: None,
            animation_weights: None,
            world_transform: Mat4::IDENTITY,
            inverse_world_transform: Some(Mat4::IDENTITY),
            normal_matrix: Mat4::IDENTITY,
            local_transform: Mat4::IDENTITY,
            transform_state: TransformState::Dirty,
        }
    }
}

impl Node {
    /// Replace an authored matrix with its TRS decomposition
    pub fn initialize(&mut self) {
        if let Some(matrix) = self.matrix.take() {
            let (t, r, s) = math::decompose(&Mat4::from_cols_array(&matrix));
            self.translation = t.to_array();
            self.rotation = r.to_array();
            self.scale = s.to_array();
        }
        self.transform_state = TransformState::Dirty;
    }

    /// Light index from `KHR_lights_punctual`
    pub fn light(&self) -> Option<usize> {
        self.extensions
            .as_ref()
            .and_then(|e| e.lights_punctual)
            .map(|l| l.light)
    }

    pub fn transform_state(&self) -> TransformState {
        self.transform_state
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation.to_array();
        self.transform_state = TransformState::Dirty;
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.to_array();
        self.transform_state = TransformState::Dirty;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale.to_array();
        self.transform_state = TransformState::Dirty;
    }

    pub fn apply_animation_translation(&mut self, translation: Vec3) {
        self.animation_translation = Some(translation);
        self.transform_state = TransformState::Dirty;
    }

    pub fn apply_animation_rotation(&mut self, rotation: Quat) {
        self.animation_rotation = Some(rotation);
        self.transform_state = TransformState::Dirty;
    }

    pub fn apply_animation_scale(&mut self, scale: Vec3) {
        self.animation_scale = Some(scale);
        self.transform_state = TransformState::Dirty;
    }

    /// Drop all animation overrides, restoring the authored pose
    pub fn clear_animation(&mut self) {
        if self.animation_translation.is_some()
            || self.animation_rotation.is_some()
            || self.animation_scale.is_some()
        {
            self.transform_state = TransformState::Dirty;
        }
        self.animation_translation = None;
        self.animation_rotation = None;
        self.animation_scale = None;
        self.animation_weights = None;
    }

    /// Effective TRS with animation overrides taking precedence
    pub fn effective_trs(&self) -> (Vec3, Quat, Vec3) {
        (
            self.animation_translation
                .unwrap_or_else(|| Vec3::from(self.translation)),
            self.animation_rotation
                .unwrap_or_else(|| Quat::from_array(self.rotation)),
            self.animation_scale
                .unwrap_or_else(|| Vec3::from(self.scale)),
        )
    }

    /// Compose the local transform from the effective TRS
    pub fn compute_local_transform(&self) -> Mat4 {
        let (t, r, s) = self.effective_trs();
        math::compose(t, r, s)
    }

    /// Recompose the cached local transform if dirty and return it
    pub fn refresh_local_transform(&mut self) -> Mat4 {
        if self.transform_state == TransformState::Dirty {
            self.local_transform = self.compute_local_transform();
            self.transform_state = TransformState::Clean;
        }
        self.local_transform
    }

    /// Cached local transform as of the last refresh
    pub fn local_transform(&self) -> Mat4 {
        self.local_transform
    }

    /// Store world transform and its derived inverse and normal matrices
    pub fn set_world_transform(&mut self, world: Mat4) {
        self.world_transform = world;
        self.inverse_world_transform = math::invert(&world);
        self.normal_matrix = self
            .inverse_world_transform
            .map(|inverse| inverse.transpose())
            .unwrap_or(Mat4::IDENTITY);
    }

    /// Morph weights in effect: animation, then node, then mesh defaults
    pub fn morph_weights<'a>(&'a self, mesh_weights: Option<&'a [f32]>) -> Option<&'a [f32]> {
        self.animation_weights
            .as_deref()
            .or(self.weights.as_deref())
            .or(mesh_weights)
    }
}
