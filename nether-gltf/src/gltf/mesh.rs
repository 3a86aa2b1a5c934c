//! Meshes and primitives
//!
//! A primitive knows which vertex-stage defines its attributes imply, its
//! draw topology, and its centroid for transparency sorting.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{Accessor, AccessorType, Buffer, BufferView};
use crate::config::RenderingParameters;
use crate::gpu::PrimitiveMode;
use crate::shader::{Define, ShaderDefines};

/// Morph weights are uploaded for at most this many targets
pub const MAX_MORPH_WEIGHTS: usize = 8;

/// `KHR_materials_variants` mapping from variant indices to a material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantMapping {
    pub material: usize,
    pub variants: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveVariants {
    pub mappings: Vec<VariantMapping>,
}

/// `KHR_draco_mesh_compression` payload reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DracoCompression {
    pub buffer_view: usize,
    /// Semantic name to Draco attribute id
    pub attributes: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveExtensions {
    #[serde(
        rename = "KHR_draco_mesh_compression",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub draco: Option<DracoCompression>,
    #[serde(
        rename = "KHR_materials_variants",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub variants: Option<PrimitiveVariants>,
}

fn triangles() -> u32 {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    pub attributes: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    #[serde(default = "triangles")]
    pub mode: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<BTreeMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<PrimitiveExtensions>,

    /// Average position, used as the sort key for blended draws
    #[serde(skip)]
    pub centroid: Vec3,
    /// Excluded from drawing (no usable POSITION data)
    #[serde(skip)]
    pub skip: bool,
}

impl Default for Primitive {
    fn default() -> Self {
        Self {
            attributes: BTreeMap::new(),
            indices: None,
            material: None,
            mode: triangles(),
            targets: Vec::new(),
            extensions: None,
            centroid: Vec3::ZERO,
            skip: false,
        }
    }
}

/// Shader attribute name for a glTF semantic (`TEXCOORD_0` -> `a_texcoord_0`)
pub fn shader_attribute_name(semantic: &str) -> String {
    format!("a_{}", semantic.to_ascii_lowercase())
}

/// Shader attribute name for a morph target semantic (`NORMAL`, 2 -> `a_target_normal2`)
pub fn target_attribute_name(semantic: &str, target: usize) -> String {
    format!("a_target_{}{}", semantic.to_ascii_lowercase(), target)
}

impl Primitive {
    /// Compute centroid and skip flag
    pub fn initialize(&mut self, accessors: &[Accessor], views: &[BufferView], buffers: &[Buffer]) {
        let Some(position) = self.attributes.get("POSITION").and_then(|&i| accessors.get(i)) else {
            tracing::warn!("Primitive has no POSITION attribute; it will not be drawn");
            self.skip = true;
            return;
        };

        let positions = position.read_f32(views, buffers);
        let vertex_count = positions.len() / 3;
        if vertex_count == 0 {
            tracing::warn!("Primitive POSITION data is empty; it will not be drawn");
            self.skip = true;
            return;
        }
        let vertex = |i: usize| Vec3::new(positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]);

        let indices = self
            .indices
            .and_then(|i| accessors.get(i))
            .map(|a| a.typed_view(views, buffers).to_u32_vec());

        let (sum, count) = match indices {
            Some(indices) if !indices.is_empty() => indices
                .iter()
                .map(|&i| i as usize)
                .filter(|&i| i < vertex_count)
                .fold((Vec3::ZERO, 0usize), |(sum, n), i| (sum + vertex(i), n + 1)),
            _ => (0..vertex_count).fold((Vec3::ZERO, 0usize), |(sum, n), i| (sum + vertex(i), n + 1)),
        };
        self.centroid = if count > 0 { sum / count as f32 } else { Vec3::ZERO };
    }

    /// Draw topology, falling back to triangles for unknown modes
    pub fn primitive_mode(&self) -> PrimitiveMode {
        PrimitiveMode::from_gltf(self.mode).unwrap_or_else(|| {
            tracing::warn!("Unknown primitive mode {}; drawing as triangles", self.mode);
            PrimitiveMode::Triangles
        })
    }

    /// Material for this draw: a matching variant mapping wins over `material`
    pub fn effective_material(&self, active_variant: Option<usize>) -> Option<usize> {
        let mapped = active_variant.and_then(|variant| {
            self.extensions
                .as_ref()?
                .variants
                .as_ref()?
                .mappings
                .iter()
                .find(|m| m.variants.contains(&variant))
                .map(|m| m.material)
        });
        mapped.or(self.material)
    }

    pub fn draco(&self) -> Option<&DracoCompression> {
        self.extensions.as_ref().and_then(|e| e.draco.as_ref())
    }

    /// Morph targets that get their own vertex attributes
    pub fn active_target_count(&self, target_limit: usize) -> usize {
        self.targets.len().min(MAX_MORPH_WEIGHTS).min(target_limit)
    }

    /// Vertex-stage defines implied by attributes, skinning and morphing.
    ///
    /// `joint_count` is the node's skin size when the node references a skin;
    /// `target_limit` bounds the morph targets that fit the attribute budget.
    pub fn defines(
        &self,
        accessors: &[Accessor],
        parameters: &RenderingParameters,
        joint_count: Option<usize>,
        target_limit: usize,
    ) -> ShaderDefines {
        let mut defines = ShaderDefines::new();
        let has = |semantic: &str| self.attributes.contains_key(semantic);

        let presence = [
            ("NORMAL", Define::HasNormals),
            ("TANGENT", Define::HasTangents),
            ("TEXCOORD_0", Define::HasUvSet1),
            ("TEXCOORD_1", Define::HasUvSet2),
            ("JOINTS_0", Define::HasJointSet1),
            ("JOINTS_1", Define::HasJointSet2),
            ("WEIGHTS_0", Define::HasWeightSet1),
            ("WEIGHTS_1", Define::HasWeightSet2),
        ];
        defines.extend(
            presence
                .into_iter()
                .filter(|(semantic, _)| has(semantic))
                .map(|(_, define)| define),
        );

        if let Some(color) = self.attributes.get("COLOR_0").and_then(|&i| accessors.get(i)) {
            defines.insert(match color.ty {
                AccessorType::Vec3 => Define::HasVertexColorVec3,
                _ => Define::HasVertexColorVec4,
            });
        }

        let count = self.active_target_count(target_limit);
        for (i, target) in self.targets.iter().take(count).enumerate() {
            let i = i as u8;
            if target.contains_key("POSITION") {
                defines.insert(Define::HasTargetPosition(i));
            }
            if target.contains_key("NORMAL") {
                defines.insert(Define::HasTargetNormal(i));
            }
            if target.contains_key("TANGENT") {
                defines.insert(Define::HasTargetTangent(i));
            }
        }
        if parameters.morphing && !self.targets.is_empty() {
            defines.insert(Define::UseMorphing);
            defines.insert(Define::WeightCount(self.targets.len().min(MAX_MORPH_WEIGHTS) as u32));
        }

        if let Some(joints) = joint_count {
            if parameters.skinning && has("JOINTS_0") && has("WEIGHTS_0") {
                defines.insert(Define::UseSkinning);
                defines.insert(Define::JointCount(joints as u32));
            }
        }
        defines
    }

    /// Faces drawn by this primitive
    pub fn face_count(&self, accessors: &[Accessor]) -> usize {
        let count = self
            .indices
            .and_then(|i| accessors.get(i))
            .or_else(|| self.attributes.get("POSITION").and_then(|&i| accessors.get(i)))
            .map(|a| a.count)
            .unwrap_or(0);
        self.primitive_mode().face_count(count)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
    /// Default morph weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::ComponentType;

    fn positions_buffer(values: &[f32]) -> (Vec<Accessor>, Vec<BufferView>, Vec<Buffer>) {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let views = vec![BufferView {
            buffer: 0,
            byte_length: data.len(),
            ..Default::default()
        }];
        let buffers = vec![Buffer {
            byte_length: data.len(),
            data,
            ..Default::default()
        }];
        let accessors = vec![Accessor::new(
            Some(0),
            ComponentType::Float,
            values.len() / 3,
            AccessorType::Vec3,
        )];
        (accessors, views, buffers)
    }

    #[test]
    fn missing_position_marks_skip() {
        let mut primitive = Primitive::default();
        primitive.initialize(&[], &[], &[]);
        assert!(primitive.skip);
    }

    #[test]
    fn centroid_averages_positions() {
        let (accessors, views, buffers) =
            positions_buffer(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 4.0, -6.0]);
        let mut primitive = Primitive::default();
        primitive.attributes.insert("POSITION".into(), 0);
        primitive.initialize(&accessors, &views, &buffers);
        assert!(!primitive.skip);
        assert!(primitive.centroid.abs_diff_eq(Vec3::new(2.0 / 3.0, 4.0 / 3.0, -2.0), 1e-6));
    }

    #[test]
    fn attribute_defines() {
        let mut primitive = Primitive::default();
        for semantic in ["POSITION", "NORMAL", "TEXCOORD_0", "JOINTS_0", "WEIGHTS_0"] {
            primitive.attributes.insert(semantic.into(), 0);
        }
        let params = RenderingParameters::default();

        let defines = primitive.defines(&[], &params, None, 8);
        assert!(defines.contains(&Define::HasNormals));
        assert!(defines.contains(&Define::HasUvSet1));
        assert!(!defines.contains(&Define::HasUvSet2));
        assert!(!defines.contains(&Define::UseSkinning));

        let skinned = primitive.defines(&[], &params, Some(12), 8);
        assert!(skinned.contains(&Define::UseSkinning));
        assert!(skinned.contains(&Define::JointCount(12)));

        let mut disabled = params.clone();
        disabled.skinning = false;
        assert!(!primitive.defines(&[], &disabled, Some(12), 8).contains(&Define::UseSkinning));
    }

    #[test]
    fn morph_defines_cap_weights_and_targets() {
        let mut primitive = Primitive::default();
        primitive.attributes.insert("POSITION".into(), 0);
        for _ in 0..10 {
            let mut target = BTreeMap::new();
            target.insert("POSITION".to_string(), 0);
            primitive.targets.push(target);
        }
        let defines = primitive.defines(&[], &RenderingParameters::default(), None, 3);
        assert!(defines.contains(&Define::UseMorphing));
        assert!(defines.contains(&Define::WeightCount(8)));
        assert!(defines.contains(&Define::HasTargetPosition(2)));
        assert!(!defines.contains(&Define::HasTargetPosition(3)));
    }

    #[test]
    fn target_defines_follow_targets_when_morphing_disabled() {
        let mut primitive = Primitive::default();
        primitive.attributes.insert("POSITION".into(), 0);
        let mut target = BTreeMap::new();
        target.insert("NORMAL".to_string(), 0);
        primitive.targets.push(target);

        let mut params = RenderingParameters::default();
        params.morphing = false;
        let defines = primitive.defines(&[], &params, None, 8);
        assert!(defines.contains(&Define::HasTargetNormal(0)));
        assert!(!defines.contains(&Define::HasTargetPosition(0)));
        assert!(!defines.contains(&Define::UseMorphing));
        assert!(!defines.iter().any(|d| matches!(d, Define::WeightCount(_))));
    }

    #[test]
    fn variant_mapping_overrides_material_without_mutation() {
        let primitive: Primitive = serde_json::from_str(
            r#"{
                "attributes": { "POSITION": 0 },
                "material": 0,
                "extensions": {
                    "KHR_materials_variants": {
                        "mappings": [ { "material": 2, "variants": [1, 3] } ]
                    }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(primitive.effective_material(None), Some(0));
        assert_eq!(primitive.effective_material(Some(0)), Some(0));
        assert_eq!(primitive.effective_material(Some(3)), Some(2));
        assert_eq!(primitive.material, Some(0));
    }

    #[test]
    fn attribute_names() {
        assert_eq!(shader_attribute_name("TEXCOORD_1"), "a_texcoord_1");
        assert_eq!(target_attribute_name("POSITION", 4), "a_target_position4");
    }
}
