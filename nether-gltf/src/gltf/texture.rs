//! Textures, images and samplers

use serde::{Deserialize, Serialize};

use crate::gpu::SamplerDescriptor;

pub const NEAREST: u32 = 9728;
pub const LINEAR: u32 = 9729;
pub const NEAREST_MIPMAP_NEAREST: u32 = 9984;
pub const LINEAR_MIPMAP_NEAREST: u32 = 9985;
pub const NEAREST_MIPMAP_LINEAR: u32 = 9986;
pub const LINEAR_MIPMAP_LINEAR: u32 = 9987;

pub const CLAMP_TO_EDGE: u32 = 33071;
pub const MIRRORED_REPEAT: u32 = 33648;
pub const REPEAT: u32 = 10497;

fn repeat() -> u32 {
    REPEAT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<u32>,
    #[serde(default = "repeat")]
    pub wrap_s: u32,
    #[serde(default = "repeat")]
    pub wrap_t: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: None,
            min_filter: None,
            wrap_s: REPEAT,
            wrap_t: REPEAT,
            name: None,
        }
    }
}

fn address_mode(wrap: u32) -> wgpu::AddressMode {
    match wrap {
        CLAMP_TO_EDGE => wgpu::AddressMode::ClampToEdge,
        MIRRORED_REPEAT => wgpu::AddressMode::MirrorRepeat,
        REPEAT => wgpu::AddressMode::Repeat,
        other => {
            tracing::warn!("Unknown sampler wrap mode {}; using REPEAT", other);
            wgpu::AddressMode::Repeat
        }
    }
}

impl Sampler {
    /// True when the minification filter samples a mip chain
    pub fn uses_mipmaps(&self) -> bool {
        matches!(
            self.min_filter.unwrap_or(LINEAR_MIPMAP_LINEAR),
            NEAREST_MIPMAP_NEAREST | LINEAR_MIPMAP_NEAREST | NEAREST_MIPMAP_LINEAR | LINEAR_MIPMAP_LINEAR
        )
    }

    /// Device sampling state; anisotropy is enabled whenever supported
    pub fn descriptor(&self, max_anisotropy: Option<f32>) -> SamplerDescriptor {
        let mag_filter = match self.mag_filter.unwrap_or(LINEAR) {
            NEAREST => wgpu::FilterMode::Nearest,
            _ => wgpu::FilterMode::Linear,
        };
        let (min_filter, mipmap_filter) = match self.min_filter.unwrap_or(LINEAR_MIPMAP_LINEAR) {
            NEAREST => (wgpu::FilterMode::Nearest, None),
            LINEAR => (wgpu::FilterMode::Linear, None),
            NEAREST_MIPMAP_NEAREST => (wgpu::FilterMode::Nearest, Some(wgpu::FilterMode::Nearest)),
            LINEAR_MIPMAP_NEAREST => (wgpu::FilterMode::Linear, Some(wgpu::FilterMode::Nearest)),
            NEAREST_MIPMAP_LINEAR => (wgpu::FilterMode::Nearest, Some(wgpu::FilterMode::Linear)),
            _ => (wgpu::FilterMode::Linear, Some(wgpu::FilterMode::Linear)),
        };
        SamplerDescriptor {
            address_mode_u: address_mode(self.wrap_s),
            address_mode_v: address_mode(self.wrap_t),
            mag_filter,
            min_filter,
            mipmap_filter,
            anisotropy: max_anisotropy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisuSource {
    pub source: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureExtensions {
    #[serde(rename = "KHR_texture_basisu", default, skip_serializing_if = "Option::is_none")]
    pub basisu: Option<BasisuSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Texture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<TextureExtensions>,
}

impl Texture {
    /// Image to upload; a KTX2 source takes precedence
    pub fn image_source(&self) -> Option<usize> {
        self.extensions
            .as_ref()
            .and_then(|e| e.basisu)
            .map(|b| b.source)
            .or(self.source)
    }
}

/// Decoded pixel data ready for upload
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    /// 8-bit RGBA, rows top to bottom
    Rgba8 {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    /// Transcoded GPU format with a prebuilt mip chain
    Compressed {
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        levels: Vec<Vec<u8>>,
    },
}

impl ImageData {
    pub fn size(&self) -> (u32, u32) {
        match self {
            ImageData::Rgba8 { width, height, .. } | ImageData::Compressed { width, height, .. } => {
                (*width, *height)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Filled by the loader; `None` when decoding failed or was skipped
    #[serde(skip)]
    pub data: Option<ImageData>,
}

impl Image {
    pub fn is_ktx2(&self) -> bool {
        self.mime_type.as_deref() == Some("image/ktx2")
            || self
                .uri
                .as_deref()
                .is_some_and(|uri| uri.to_ascii_lowercase().ends_with(".ktx2"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sampler_is_trilinear_repeat() {
        let desc = Sampler::default().descriptor(None);
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(desc.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(desc.mipmap_filter, Some(wgpu::FilterMode::Linear));
        assert!(Sampler::default().uses_mipmaps());
    }

    #[test]
    fn sampler_maps_gl_constants() {
        let sampler = Sampler {
            mag_filter: Some(NEAREST),
            min_filter: Some(LINEAR),
            wrap_s: CLAMP_TO_EDGE,
            wrap_t: MIRRORED_REPEAT,
            name: None,
        };
        let desc = sampler.descriptor(Some(8.0));
        assert_eq!(desc.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(desc.mipmap_filter, None);
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::ClampToEdge);
        assert_eq!(desc.address_mode_v, wgpu::AddressMode::MirrorRepeat);
        assert_eq!(desc.anisotropy, Some(8.0));
        assert!(!sampler.uses_mipmaps());
    }

    #[test]
    fn basisu_source_takes_precedence() {
        let texture: Texture = serde_json::from_str(
            r#"{ "source": 0, "extensions": { "KHR_texture_basisu": { "source": 1 } } }"#,
        )
        .unwrap();
        assert_eq!(texture.image_source(), Some(1));
    }
}
