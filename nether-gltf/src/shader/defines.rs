//! Shader feature defines
//!
//! Every permutation input is a variant of the closed [`Define`] enum. A
//! [`ShaderDefines`] set keeps them in canonical order, so the same feature
//! set always yields the same source text and the same hash.

use std::collections::BTreeSet;
use std::fmt;

use xxhash_rust::xxh3::xxh3_64;

use crate::config::{DebugOutput, ToneMap};
use crate::gltf::{AlphaMode, TextureSlot};
use crate::ibl::Distribution;

/// One `#define` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Define {
    // Vertex inputs
    HasNormals,
    HasTangents,
    HasUvSet1,
    HasUvSet2,
    HasVertexColorVec3,
    HasVertexColorVec4,
    HasJointSet1,
    HasJointSet2,
    HasWeightSet1,
    HasWeightSet2,
    HasTargetPosition(u8),
    HasTargetNormal(u8),
    HasTargetTangent(u8),
    UseSkinning,
    JointCount(u32),
    UseMorphing,
    WeightCount(u32),

    // Material model
    MaterialMetallicRoughness,
    MaterialSpecularGlossiness,
    MaterialUnlit,
    MaterialClearcoat,
    MaterialSheen,
    MaterialTransmission,
    MaterialVolume,
    MaterialIor,
    MaterialSpecular,
    MaterialEmissiveStrength,
    AlphaMode(AlphaMode),
    HasMap(TextureSlot),
    HasUvTransform(TextureSlot),

    // Lighting and output
    UsePunctual,
    LightCount(u32),
    UseIbl,
    ToneMap(ToneMap),
    Debug(DebugOutput),

    // Environment filtering
    Distribution(Distribution),
    GenerateLut,
    GenerateSheenLut,
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Define::HasNormals => f.write_str("HAS_NORMALS 1"),
            Define::HasTangents => f.write_str("HAS_TANGENTS 1"),
            Define::HasUvSet1 => f.write_str("HAS_UV_SET1 1"),
            Define::HasUvSet2 => f.write_str("HAS_UV_SET2 1"),
            Define::HasVertexColorVec3 => f.write_str("HAS_VERTEX_COLOR_VEC3 1"),
            Define::HasVertexColorVec4 => f.write_str("HAS_VERTEX_COLOR_VEC4 1"),
            Define::HasJointSet1 => f.write_str("HAS_JOINT_SET1 1"),
            Define::HasJointSet2 => f.write_str("HAS_JOINT_SET2 1"),
            Define::HasWeightSet1 => f.write_str("HAS_WEIGHT_SET1 1"),
            Define::HasWeightSet2 => f.write_str("HAS_WEIGHT_SET2 1"),
            Define::HasTargetPosition(i) => write!(f, "HAS_TARGET_POSITION{} 1", i),
            Define::HasTargetNormal(i) => write!(f, "HAS_TARGET_NORMAL{} 1", i),
            Define::HasTargetTangent(i) => write!(f, "HAS_TARGET_TANGENT{} 1", i),
            Define::UseSkinning => f.write_str("USE_SKINNING 1"),
            Define::JointCount(n) => write!(f, "JOINT_COUNT {}", n),
            Define::UseMorphing => f.write_str("USE_MORPHING 1"),
            Define::WeightCount(n) => write!(f, "WEIGHT_COUNT {}", n),
            Define::MaterialMetallicRoughness => f.write_str("MATERIAL_METALLICROUGHNESS 1"),
            Define::MaterialSpecularGlossiness => f.write_str("MATERIAL_SPECULARGLOSSINESS 1"),
            Define::MaterialUnlit => f.write_str("MATERIAL_UNLIT 1"),
            Define::MaterialClearcoat => f.write_str("MATERIAL_CLEARCOAT 1"),
            Define::MaterialSheen => f.write_str("MATERIAL_SHEEN 1"),
            Define::MaterialTransmission => f.write_str("MATERIAL_TRANSMISSION 1"),
            Define::MaterialVolume => f.write_str("MATERIAL_VOLUME 1"),
            Define::MaterialIor => f.write_str("MATERIAL_IOR 1"),
            Define::MaterialSpecular => f.write_str("MATERIAL_SPECULAR 1"),
            Define::MaterialEmissiveStrength => f.write_str("MATERIAL_EMISSIVE_STRENGTH 1"),
            Define::AlphaMode(mode) => {
                let value = match mode {
                    AlphaMode::Opaque => 0,
                    AlphaMode::Mask => 1,
                    AlphaMode::Blend => 2,
                };
                write!(f, "ALPHAMODE {}", value)
            }
            Define::HasMap(slot) => write!(f, "HAS_{}_MAP 1", slot.define_stem()),
            Define::HasUvTransform(slot) => write!(f, "HAS_{}_UV_TRANSFORM 1", slot.define_stem()),
            Define::UsePunctual => f.write_str("USE_PUNCTUAL 1"),
            Define::LightCount(n) => write!(f, "LIGHT_COUNT {}", n),
            Define::UseIbl => f.write_str("USE_IBL 1"),
            Define::ToneMap(tone_map) => write!(f, "{} 1", tone_map.define_name()),
            Define::Debug(debug) => write!(f, "DEBUG {}", debug.define_value()),
            Define::Distribution(distribution) => {
                write!(f, "DISTRIBUTION {}", distribution.define_value())
            }
            Define::GenerateLut => f.write_str("GENERATE_LUT 1"),
            Define::GenerateSheenLut => f.write_str("GENERATE_SHEEN_LUT 1"),
        }
    }
}

/// Canonically ordered define set
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderDefines(BTreeSet<Define>);

impl ShaderDefines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, define: Define) -> bool {
        self.0.insert(define)
    }

    pub fn contains(&self, define: &Define) -> bool {
        self.0.contains(define)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Define> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Define lines in canonical order, without the `#define` prefix
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Permutation hash of `identifier` with these defines.
    ///
    /// XOR of per-string hashes, so it does not depend on insertion order.
    pub fn permutation_hash(&self, identifier: &str) -> u64 {
        self.0
            .iter()
            .fold(string_hash(identifier), |hash, define| {
                hash ^ string_hash(&define.to_string())
            })
    }
}

impl FromIterator<Define> for ShaderDefines {
    fn from_iter<I: IntoIterator<Item = Define>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Define> for ShaderDefines {
    fn extend<I: IntoIterator<Item = Define>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ShaderDefines {
    type Item = &'a Define;
    type IntoIter = std::collections::btree_set::Iter<'a, Define>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Stable 64-bit string hash
pub fn string_hash(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_glsl_define_lines() {
        assert_eq!(Define::HasNormals.to_string(), "HAS_NORMALS 1");
        assert_eq!(Define::JointCount(24).to_string(), "JOINT_COUNT 24");
        assert_eq!(Define::HasTargetPosition(3).to_string(), "HAS_TARGET_POSITION3 1");
        assert_eq!(
            Define::HasMap(TextureSlot::BaseColor).to_string(),
            "HAS_BASE_COLOR_MAP 1"
        );
        assert_eq!(
            Define::HasUvTransform(TextureSlot::Normal).to_string(),
            "HAS_NORMAL_UV_TRANSFORM 1"
        );
        assert_eq!(
            Define::ToneMap(ToneMap::AcesHill).to_string(),
            "TONEMAP_ACES_HILL 1"
        );
        assert_eq!(
            Define::Debug(DebugOutput::None).to_string(),
            "DEBUG DEBUG_NONE"
        );
    }

    #[test]
    fn hash_ignores_insertion_order() {
        let a: ShaderDefines = [Define::HasNormals, Define::UseIbl, Define::LightCount(2)]
            .into_iter()
            .collect();
        let b: ShaderDefines = [Define::LightCount(2), Define::HasNormals, Define::UseIbl]
            .into_iter()
            .collect();
        assert_eq!(a.permutation_hash("pbr.frag"), b.permutation_hash("pbr.frag"));
        assert_eq!(a.to_strings(), b.to_strings());
    }

    #[test]
    fn hash_depends_on_identifier_and_defines() {
        let defines: ShaderDefines = [Define::HasNormals].into_iter().collect();
        assert_ne!(
            defines.permutation_hash("primitive.vert"),
            defines.permutation_hash("pbr.frag")
        );

        let mut more = defines.clone();
        more.insert(Define::HasTangents);
        assert_ne!(
            defines.permutation_hash("pbr.frag"),
            more.permutation_hash("pbr.frag")
        );
    }

    #[test]
    fn canonical_order_follows_enum_order() {
        let defines: ShaderDefines = [Define::UseIbl, Define::HasNormals].into_iter().collect();
        assert_eq!(defines.to_strings(), vec!["HAS_NORMALS 1", "USE_IBL 1"]);
    }
}
