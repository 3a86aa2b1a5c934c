//! Rendering parameters (rendering.toml)
//!
//! Global switches that gate material features, lighting and output. Every
//! field has a default so partial TOML files are valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Global rendering configuration.
///
/// Material-derived shader state depends on [`EnabledExtensions`]; changing a
/// toggle changes the selected permutation without re-parsing materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingParameters {
    /// Apply morph target weights
    pub morphing: bool,
    /// Apply skinning
    pub skinning: bool,
    /// Per-extension global gates
    pub enabled_extensions: EnabledExtensions,
    /// Framebuffer clear color (linear RGBA)
    pub clear_color: [f32; 4],
    /// Exposure multiplier applied before tone mapping
    pub exposure: f32,
    /// Use image based lighting when an environment is loaded
    pub use_ibl: bool,
    /// IBL intensity multiplier
    pub ibl_intensity: f32,
    /// Draw the environment cubemap as background
    pub render_environment_map: bool,
    /// Sample a blurred mip of the background
    pub blur_environment_map: bool,
    /// Environment rotation around +Y, in degrees
    pub environment_rotation: f32,
    /// Use KHR_lights_punctual lights
    pub use_punctual: bool,
    /// Substitute key/fill lights when the scene has none and IBL is off
    pub use_directional_lights_with_disabled_ibl: bool,
    /// Output tone mapping operator
    pub tone_map: ToneMap,
    /// Debug channel visualisation
    pub debug_output: DebugOutput,
    /// GLSL `#version` directive payload
    pub glsl_version: String,
    /// Edge length of the square transmission source framebuffer
    pub transmission_framebuffer_size: u32,
}

impl Default for RenderingParameters {
    fn default() -> Self {
        Self {
            morphing: true,
            skinning: true,
            enabled_extensions: EnabledExtensions::default(),
            clear_color: [0.58, 0.58, 0.58, 1.0],
            exposure: 1.0,
            use_ibl: true,
            ibl_intensity: 1.0,
            render_environment_map: true,
            blur_environment_map: true,
            environment_rotation: 90.0,
            use_punctual: true,
            use_directional_lights_with_disabled_ibl: false,
            tone_map: ToneMap::default(),
            debug_output: DebugOutput::default(),
            glsl_version: "300 es".to_string(),
            transmission_framebuffer_size: 1024,
        }
    }
}

impl RenderingParameters {
    /// Parse parameters from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load parameters from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialize parameters back to TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Global toggles for material and scene extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledExtensions {
    pub clearcoat: bool,
    pub sheen: bool,
    pub transmission: bool,
    pub volume: bool,
    pub ior: bool,
    pub specular: bool,
    pub emissive_strength: bool,
    pub texture_transform: bool,
    pub lights_punctual: bool,
}

impl Default for EnabledExtensions {
    fn default() -> Self {
        Self {
            clearcoat: true,
            sheen: true,
            transmission: true,
            volume: true,
            ior: true,
            specular: true,
            emissive_strength: true,
            texture_transform: true,
            lights_punctual: true,
        }
    }
}

/// Tone mapping operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMap {
    /// Linear output, no curve
    None,
    #[default]
    AcesNarkowicz,
    AcesHill,
    AcesHillExposureBoost,
    KhrPbrNeutral,
}

impl ToneMap {
    /// Fragment shader define name
    pub fn define_name(self) -> &'static str {
        match self {
            ToneMap::None => "LINEAR_OUTPUT",
            ToneMap::AcesNarkowicz => "TONEMAP_ACES_NARKOWICZ",
            ToneMap::AcesHill => "TONEMAP_ACES_HILL",
            ToneMap::AcesHillExposureBoost => "TONEMAP_ACES_HILL_EXPOSURE_BOOST",
            ToneMap::KhrPbrNeutral => "TONEMAP_KHR_PBR_NEUTRAL",
        }
    }
}

/// Debug output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugOutput {
    #[default]
    None,
    Uv0,
    Uv1,
    NormalTexture,
    GeometryNormal,
    Tangent,
    Bitangent,
    ShadingNormal,
    Alpha,
    Occlusion,
    Emissive,
    Metallic,
    Roughness,
    BaseColor,
    Clearcoat,
    Sheen,
    Transmission,
}

impl DebugOutput {
    /// Value of the `DEBUG` define
    pub fn define_value(self) -> &'static str {
        match self {
            DebugOutput::None => "DEBUG_NONE",
            DebugOutput::Uv0 => "DEBUG_UV_0",
            DebugOutput::Uv1 => "DEBUG_UV_1",
            DebugOutput::NormalTexture => "DEBUG_NORMAL_TEXTURE",
            DebugOutput::GeometryNormal => "DEBUG_NORMAL_GEOMETRY",
            DebugOutput::Tangent => "DEBUG_TANGENT",
            DebugOutput::Bitangent => "DEBUG_BITANGENT",
            DebugOutput::ShadingNormal => "DEBUG_NORMAL_SHADING",
            DebugOutput::Alpha => "DEBUG_ALPHA",
            DebugOutput::Occlusion => "DEBUG_OCCLUSION",
            DebugOutput::Emissive => "DEBUG_EMISSIVE",
            DebugOutput::Metallic => "DEBUG_METALLIC",
            DebugOutput::Roughness => "DEBUG_ROUGHNESS",
            DebugOutput::BaseColor => "DEBUG_BASE_COLOR",
            DebugOutput::Clearcoat => "DEBUG_CLEARCOAT",
            DebugOutput::Sheen => "DEBUG_SHEEN",
            DebugOutput::Transmission => "DEBUG_TRANSMISSION",
        }
    }
}
