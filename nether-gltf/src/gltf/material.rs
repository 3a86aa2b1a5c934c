//! Materials and their derived shader state
//!
//! Authored data deserializes straight from glTF JSON. [`Material::initialize`]
//! derives the base permutation defines, the uniform properties and the
//! texture binding order once; [`Material::defines`] adds the extension
//! defines that the rendering parameters currently allow.

use glam::{Mat3, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::config::EnabledExtensions;
use crate::shader::{Define, ShaderDefines, UniformValue};

// ============================================================================
// Texture references
// ============================================================================

/// `KHR_texture_transform` parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureTransform {
    #[serde(default)]
    pub offset: [f32; 2],
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "unit_scale")]
    pub scale: [f32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tex_coord: Option<u32>,
}

fn unit_scale() -> [f32; 2] {
    [1.0, 1.0]
}

impl TextureTransform {
    /// UV transform `T * R * S`
    pub fn matrix(&self) -> Mat3 {
        let translation = Mat3::from_translation(Vec2::from(self.offset));
        let rotation = Mat3::from_angle(-self.rotation);
        let scale = Mat3::from_scale(Vec2::from(self.scale));
        translation * rotation * scale
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureInfoExtensions {
    #[serde(
        rename = "KHR_texture_transform",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub texture_transform: Option<TextureTransform>,
}

/// Reference from a material to a texture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: u32,
    /// Normal map scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
    /// Occlusion strength
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<TextureInfoExtensions>,
}

impl TextureInfo {
    pub fn transform(&self) -> Option<&TextureTransform> {
        self.extensions
            .as_ref()
            .and_then(|e| e.texture_transform.as_ref())
    }

    /// UV set in effect, honouring a transform's `texCoord` override
    pub fn uv_set(&self) -> u32 {
        self.transform()
            .and_then(|t| t.tex_coord)
            .unwrap_or(self.tex_coord)
    }
}

/// Shader binding slot of a material texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureSlot {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
    Diffuse,
    SpecularGlossiness,
    Clearcoat,
    ClearcoatRoughness,
    ClearcoatNormal,
    SheenColor,
    SheenRoughness,
    Transmission,
    Thickness,
    Specular,
    SpecularColor,
}

impl TextureSlot {
    /// Uniform prefix: `u_<prefix>Sampler`, `u_<prefix>UVSet`, `u_<prefix>UVTransform`
    pub fn uniform_prefix(self) -> &'static str {
        match self {
            TextureSlot::BaseColor => "BaseColor",
            TextureSlot::MetallicRoughness => "MetallicRoughness",
            TextureSlot::Normal => "Normal",
            TextureSlot::Occlusion => "Occlusion",
            TextureSlot::Emissive => "Emissive",
            TextureSlot::Diffuse => "Diffuse",
            TextureSlot::SpecularGlossiness => "SpecularGlossiness",
            TextureSlot::Clearcoat => "Clearcoat",
            TextureSlot::ClearcoatRoughness => "ClearcoatRoughness",
            TextureSlot::ClearcoatNormal => "ClearcoatNormal",
            TextureSlot::SheenColor => "SheenColor",
            TextureSlot::SheenRoughness => "SheenRoughness",
            TextureSlot::Transmission => "Transmission",
            TextureSlot::Thickness => "Thickness",
            TextureSlot::Specular => "Specular",
            TextureSlot::SpecularColor => "SpecularColor",
        }
    }

    /// Stem of `HAS_<stem>_MAP` and `HAS_<stem>_UV_TRANSFORM`
    pub fn define_stem(self) -> &'static str {
        match self {
            TextureSlot::BaseColor => "BASE_COLOR",
            TextureSlot::MetallicRoughness => "METALLIC_ROUGHNESS",
            TextureSlot::Normal => "NORMAL",
            TextureSlot::Occlusion => "OCCLUSION",
            TextureSlot::Emissive => "EMISSIVE",
            TextureSlot::Diffuse => "DIFFUSE",
            TextureSlot::SpecularGlossiness => "SPECULAR_GLOSSINESS",
            TextureSlot::Clearcoat => "CLEARCOAT",
            TextureSlot::ClearcoatRoughness => "CLEARCOAT_ROUGHNESS",
            TextureSlot::ClearcoatNormal => "CLEARCOAT_NORMAL",
            TextureSlot::SheenColor => "SHEEN_COLOR",
            TextureSlot::SheenRoughness => "SHEEN_ROUGHNESS",
            TextureSlot::Transmission => "TRANSMISSION",
            TextureSlot::Thickness => "THICKNESS",
            TextureSlot::Specular => "SPECULAR",
            TextureSlot::SpecularColor => "SPECULAR_COLOR",
        }
    }

    pub fn sampler_uniform(self) -> String {
        format!("u_{}Sampler", self.uniform_prefix())
    }
}

/// Texture bound for a material, in binding order
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTexture {
    pub slot: TextureSlot,
    pub info: TextureInfo,
}

// ============================================================================
// Authored material
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

fn one() -> f32 {
    1.0
}

fn white4() -> [f32; 4] {
    [1.0; 4]
}

fn white3() -> [f32; 3] {
    [1.0; 3]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(default = "white4")]
    pub base_color_factor: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    #[serde(default = "one")]
    pub metallic_factor: f32,
    #[serde(default = "one")]
    pub roughness_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: white4(),
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clearcoat {
    #[serde(default)]
    pub clearcoat_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_texture: Option<TextureInfo>,
    #[serde(default)]
    pub clearcoat_roughness_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_roughness_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_normal_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheen {
    #[serde(default)]
    pub sheen_color_factor: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_color_texture: Option<TextureInfo>,
    #[serde(default)]
    pub sheen_roughness_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_roughness_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transmission {
    #[serde(default)]
    pub transmission_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub thickness_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_texture: Option<TextureInfo>,
    /// Absent means infinite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attenuation_distance: Option<f32>,
    #[serde(default = "white3")]
    pub attenuation_color: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ior {
    #[serde(default = "default_ior")]
    pub ior: f32,
}

fn default_ior() -> f32 {
    1.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specular {
    #[serde(default = "one")]
    pub specular_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_texture: Option<TextureInfo>,
    #[serde(default = "white3")]
    pub specular_color_factor: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_color_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecularGlossiness {
    #[serde(default = "white4")]
    pub diffuse_factor: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffuse_texture: Option<TextureInfo>,
    #[serde(default = "white3")]
    pub specular_factor: [f32; 3],
    #[serde(default = "one")]
    pub glossiness_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_glossiness_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unlit {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissiveStrength {
    #[serde(default = "one")]
    pub emissive_strength: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialExtensions {
    #[serde(rename = "KHR_materials_clearcoat", default, skip_serializing_if = "Option::is_none")]
    pub clearcoat: Option<Clearcoat>,
    #[serde(rename = "KHR_materials_sheen", default, skip_serializing_if = "Option::is_none")]
    pub sheen: Option<Sheen>,
    #[serde(rename = "KHR_materials_transmission", default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<Transmission>,
    #[serde(rename = "KHR_materials_volume", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
    #[serde(rename = "KHR_materials_ior", default, skip_serializing_if = "Option::is_none")]
    pub ior: Option<Ior>,
    #[serde(rename = "KHR_materials_specular", default, skip_serializing_if = "Option::is_none")]
    pub specular: Option<Specular>,
    #[serde(
        rename = "KHR_materials_pbrSpecularGlossiness",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub specular_glossiness: Option<SpecularGlossiness>,
    #[serde(rename = "KHR_materials_unlit", default, skip_serializing_if = "Option::is_none")]
    pub unlit: Option<Unlit>,
    #[serde(
        rename = "KHR_materials_emissive_strength",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub emissive_strength: Option<EmissiveStrength>,
}

/// State derived once from the authored material
#[derive(Debug, Clone, Default, PartialEq)]
struct DerivedState {
    defines: ShaderDefines,
    properties: Vec<(String, UniformValue)>,
    textures: Vec<MaterialTexture>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default)]
    pub emissive_factor: [f32; 3],
    #[serde(default)]
    pub alpha_mode: AlphaMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_cutoff: Option<f32>,
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default)]
    pub extensions: MaterialExtensions,

    #[serde(skip)]
    derived: DerivedState,
}

impl Material {
    /// Derive base defines, uniform properties and texture order
    pub fn initialize(&mut self) {
        let mut defines = ShaderDefines::new();
        let mut properties: Vec<(String, UniformValue)> = Vec::new();
        let mut textures: Vec<MaterialTexture> = Vec::new();

        let mut add_texture = |slot: TextureSlot, info: &Option<TextureInfo>, props: &mut Vec<(String, UniformValue)>| {
            let Some(info) = info else {
                return;
            };
            defines.insert(Define::HasMap(slot));
            let prefix = slot.uniform_prefix();
            props.push((format!("u_{}UVSet", prefix), UniformValue::Int(info.uv_set() as i32)));
            if let Some(transform) = info.transform() {
                props.push((format!("u_{}UVTransform", prefix), UniformValue::Mat3(transform.matrix())));
            }
            textures.push(MaterialTexture {
                slot,
                info: info.clone(),
            });
        };

        let ext = &self.extensions;
        if let Some(sg) = &ext.specular_glossiness {
            add_texture(TextureSlot::Diffuse, &sg.diffuse_texture, &mut properties);
            add_texture(TextureSlot::SpecularGlossiness, &sg.specular_glossiness_texture, &mut properties);
            properties.push(("u_DiffuseFactor".into(), Vec4::from(sg.diffuse_factor).into()));
            properties.push(("u_SpecularFactor".into(), Vec3::from(sg.specular_factor).into()));
            properties.push(("u_GlossinessFactor".into(), sg.glossiness_factor.into()));
        } else {
            let pbr = self.pbr_metallic_roughness.clone().unwrap_or_default();
            add_texture(TextureSlot::BaseColor, &pbr.base_color_texture, &mut properties);
            add_texture(TextureSlot::MetallicRoughness, &pbr.metallic_roughness_texture, &mut properties);
            properties.push(("u_BaseColorFactor".into(), Vec4::from(pbr.base_color_factor).into()));
            properties.push(("u_MetallicFactor".into(), pbr.metallic_factor.into()));
            properties.push(("u_RoughnessFactor".into(), pbr.roughness_factor.into()));
        }

        add_texture(TextureSlot::Normal, &self.normal_texture, &mut properties);
        if let Some(normal) = &self.normal_texture {
            properties.push(("u_NormalScale".into(), normal.scale.unwrap_or(1.0).into()));
        }
        add_texture(TextureSlot::Occlusion, &self.occlusion_texture, &mut properties);
        if let Some(occlusion) = &self.occlusion_texture {
            properties.push((
                "u_OcclusionStrength".into(),
                occlusion.strength.unwrap_or(1.0).into(),
            ));
        }
        add_texture(TextureSlot::Emissive, &self.emissive_texture, &mut properties);
        properties.push(("u_EmissiveFactor".into(), Vec3::from(self.emissive_factor).into()));

        if self.alpha_mode == AlphaMode::Mask {
            properties.push(("u_AlphaCutoff".into(), self.alpha_cutoff.unwrap_or(0.5).into()));
        }

        if let Some(cc) = &ext.clearcoat {
            add_texture(TextureSlot::Clearcoat, &cc.clearcoat_texture, &mut properties);
            add_texture(TextureSlot::ClearcoatRoughness, &cc.clearcoat_roughness_texture, &mut properties);
            add_texture(TextureSlot::ClearcoatNormal, &cc.clearcoat_normal_texture, &mut properties);
            properties.push(("u_ClearcoatFactor".into(), cc.clearcoat_factor.into()));
            properties.push(("u_ClearcoatRoughnessFactor".into(), cc.clearcoat_roughness_factor.into()));
            if let Some(normal) = &cc.clearcoat_normal_texture {
                properties.push(("u_ClearcoatNormalScale".into(), normal.scale.unwrap_or(1.0).into()));
            }
        }
        if let Some(sheen) = &ext.sheen {
            add_texture(TextureSlot::SheenColor, &sheen.sheen_color_texture, &mut properties);
            add_texture(TextureSlot::SheenRoughness, &sheen.sheen_roughness_texture, &mut properties);
            properties.push(("u_SheenColorFactor".into(), Vec3::from(sheen.sheen_color_factor).into()));
            properties.push(("u_SheenRoughnessFactor".into(), sheen.sheen_roughness_factor.into()));
        }
        if let Some(transmission) = &ext.transmission {
            add_texture(TextureSlot::Transmission, &transmission.transmission_texture, &mut properties);
            properties.push(("u_TransmissionFactor".into(), transmission.transmission_factor.into()));
        }
        if let Some(volume) = &ext.volume {
            add_texture(TextureSlot::Thickness, &volume.thickness_texture, &mut properties);
            properties.push(("u_ThicknessFactor".into(), volume.thickness_factor.into()));
            properties.push(("u_AttenuationColor".into(), Vec3::from(volume.attenuation_color).into()));
            properties.push((
                "u_AttenuationDistance".into(),
                volume.attenuation_distance.unwrap_or(f32::MAX).into(),
            ));
        }
        if let Some(ior) = &ext.ior {
            properties.push(("u_Ior".into(), ior.ior.into()));
        }
        if let Some(specular) = &ext.specular {
            add_texture(TextureSlot::Specular, &specular.specular_texture, &mut properties);
            add_texture(TextureSlot::SpecularColor, &specular.specular_color_texture, &mut properties);
            properties.push((
                "u_KHR_materials_specular_specularFactor".into(),
                specular.specular_factor.into(),
            ));
            properties.push((
                "u_KHR_materials_specular_specularColorFactor".into(),
                Vec3::from(specular.specular_color_factor).into(),
            ));
        }
        if let Some(strength) = &ext.emissive_strength {
            properties.push(("u_EmissiveStrength".into(), strength.emissive_strength.into()));
        }

        if ext.unlit.is_some() {
            defines.insert(Define::MaterialUnlit);
        } else if ext.specular_glossiness.is_some() {
            defines.insert(Define::MaterialSpecularGlossiness);
        } else {
            defines.insert(Define::MaterialMetallicRoughness);
        }
        defines.insert(Define::AlphaMode(self.alpha_mode));

        self.derived = DerivedState {
            defines,
            properties,
            textures,
        };
    }

    /// Base defines plus extension defines allowed by `enabled`
    pub fn defines(&self, enabled: &EnabledExtensions) -> ShaderDefines {
        let mut defines = self.derived.defines.clone();
        let ext = &self.extensions;

        let gated = [
            (ext.clearcoat.is_some() && enabled.clearcoat, Define::MaterialClearcoat),
            (ext.sheen.is_some() && enabled.sheen, Define::MaterialSheen),
            (ext.transmission.is_some() && enabled.transmission, Define::MaterialTransmission),
            (ext.volume.is_some() && enabled.volume, Define::MaterialVolume),
            (ext.ior.is_some() && enabled.ior, Define::MaterialIor),
            (ext.specular.is_some() && enabled.specular, Define::MaterialSpecular),
            (
                ext.emissive_strength.is_some() && enabled.emissive_strength,
                Define::MaterialEmissiveStrength,
            ),
        ];
        defines.extend(
            gated
                .into_iter()
                .filter_map(|(on, define)| on.then_some(define)),
        );

        if enabled.texture_transform {
            defines.extend(
                self.derived
                    .textures
                    .iter()
                    .filter(|t| t.info.transform().is_some())
                    .map(|t| Define::HasUvTransform(t.slot)),
            );
        }
        defines
    }

    /// Uniform values derived from the authored factors
    pub fn properties(&self) -> &[(String, UniformValue)] {
        &self.derived.properties
    }

    /// Material textures in binding order
    pub fn textures(&self) -> &[MaterialTexture] {
        &self.derived.textures
    }

    /// Authored `KHR_materials_transmission`, regardless of global toggles
    pub fn has_transmission(&self) -> bool {
        self.extensions.transmission.is_some()
    }

    pub fn is_blend(&self) -> bool {
        self.alpha_mode == AlphaMode::Blend
    }
}
