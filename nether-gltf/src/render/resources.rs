//! GPU buffers and textures of the loaded asset
//!
//! Uploads happen lazily on first use and are cached by glTF index. Failed
//! uploads are remembered so a broken accessor or image is reported once
//! instead of every frame.

use hashbrown::{HashMap, HashSet};

use crate::gltf::{ComponentType, Gltf, ImageData};
use crate::gpu::{
    BufferHandle, BufferTarget, GpuDevice, IndexFormat, SamplerDescriptor, TextureDescriptor,
    TextureDimension, TextureHandle, VertexAttributeLayout,
};

/// Uploaded accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffer {
    pub handle: BufferHandle,
    /// Elements (vertices or indices)
    pub count: u32,
}

/// Index buffer ready for an indexed draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuIndices {
    pub buffer: GpuBuffer,
    pub format: IndexFormat,
}

/// Buffer and texture cache for one asset
#[derive(Debug, Default)]
pub struct GpuResources {
    vertex_buffers: HashMap<usize, (GpuBuffer, VertexAttributeLayout)>,
    index_buffers: HashMap<usize, GpuIndices>,
    textures: HashMap<usize, TextureHandle>,
    failed_buffers: HashSet<usize>,
    failed_textures: HashSet<usize>,
    fallback_white: Option<TextureHandle>,
}

/// Mip levels of a full chain for a `width` x `height` image
pub fn full_mip_chain(width: u32, height: u32) -> u32 {
    width.max(height).max(1).ilog2() + 1
}

impl GpuResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tightly packed vertex buffer for `accessor` (sparse data applied)
    pub fn vertex_buffer(
        &mut self,
        device: &mut dyn GpuDevice,
        gltf: &Gltf,
        accessor: usize,
    ) -> Option<(GpuBuffer, VertexAttributeLayout)> {
        if let Some(entry) = self.vertex_buffers.get(&accessor) {
            return Some(*entry);
        }
        if self.failed_buffers.contains(&accessor) {
            return None;
        }

        let Some(source) = gltf.accessors.get(accessor) else {
            tracing::warn!("Vertex attribute references missing accessor {}", accessor);
            self.failed_buffers.insert(accessor);
            return None;
        };
        let data = source.deinterlaced_view(&gltf.buffer_views, &gltf.buffers);
        match device.create_buffer(BufferTarget::Vertex, data.as_bytes()) {
            Ok(handle) => {
                let entry = (
                    GpuBuffer {
                        handle,
                        count: source.count as u32,
                    },
                    VertexAttributeLayout {
                        components: source.component_count() as u32,
                        component_type: source.component_type,
                        normalized: source.normalized,
                        stride: 0,
                        offset: 0,
                    },
                );
                self.vertex_buffers.insert(accessor, entry);
                Some(entry)
            }
            Err(e) => {
                tracing::error!("Failed to upload accessor {}: {}", accessor, e);
                self.failed_buffers.insert(accessor);
                None
            }
        }
    }

    /// Index buffer for `accessor`
    pub fn index_buffer(
        &mut self,
        device: &mut dyn GpuDevice,
        gltf: &Gltf,
        accessor: usize,
    ) -> Option<GpuIndices> {
        if let Some(entry) = self.index_buffers.get(&accessor) {
            return Some(*entry);
        }
        if self.failed_buffers.contains(&accessor) {
            return None;
        }

        let Some(source) = gltf.accessors.get(accessor) else {
            tracing::warn!("Primitive references missing index accessor {}", accessor);
            self.failed_buffers.insert(accessor);
            return None;
        };
        let format = match source.component_type {
            ComponentType::UnsignedByte => IndexFormat::U8,
            ComponentType::UnsignedShort => IndexFormat::U16,
            ComponentType::UnsignedInt => IndexFormat::U32,
            other => {
                tracing::warn!("Index accessor {} has invalid component type {:?}", accessor, other);
                self.failed_buffers.insert(accessor);
                return None;
            }
        };

        let data = source.deinterlaced_view(&gltf.buffer_views, &gltf.buffers);
        match device.create_buffer(BufferTarget::Index, data.as_bytes()) {
            Ok(handle) => {
                let entry = GpuIndices {
                    buffer: GpuBuffer {
                        handle,
                        count: source.count as u32,
                    },
                    format,
                };
                self.index_buffers.insert(accessor, entry);
                Some(entry)
            }
            Err(e) => {
                tracing::error!("Failed to upload index accessor {}: {}", accessor, e);
                self.failed_buffers.insert(accessor);
                None
            }
        }
    }

    /// Uploaded texture for glTF texture `index`, with its sampler applied
    pub fn texture(&mut self, device: &mut dyn GpuDevice, gltf: &Gltf, index: usize) -> Option<TextureHandle> {
        if let Some(&handle) = self.textures.get(&index) {
            return Some(handle);
        }
        if self.failed_textures.contains(&index) {
            return None;
        }

        match Self::upload_texture(device, gltf, index) {
            Some(handle) => {
                self.textures.insert(index, handle);
                Some(handle)
            }
            None => {
                self.failed_textures.insert(index);
                None
            }
        }
    }

    fn upload_texture(device: &mut dyn GpuDevice, gltf: &Gltf, index: usize) -> Option<TextureHandle> {
        let Some(texture) = gltf.textures.get(index) else {
            tracing::warn!("Material references missing texture {}", index);
            return None;
        };
        let Some(image) = texture.image_source().and_then(|i| gltf.images.get(i)) else {
            tracing::warn!("Texture {} has no image source", index);
            return None;
        };
        let Some(data) = &image.data else {
            tracing::warn!("Image for texture {} was not decoded", index);
            return None;
        };
        let sampler = texture
            .sampler
            .and_then(|s| gltf.samplers.get(s))
            .cloned()
            .unwrap_or_default();
        let mut descriptor = sampler.descriptor(device.max_anisotropy());

        let (width, height) = data.size();
        let (format, mip_levels, generate) = match data {
            ImageData::Rgba8 { .. } if sampler.uses_mipmaps() => {
                (wgpu::TextureFormat::Rgba8Unorm, full_mip_chain(width, height), true)
            }
            ImageData::Rgba8 { .. } => (wgpu::TextureFormat::Rgba8Unorm, 1, false),
            ImageData::Compressed { format, levels, .. } => (*format, levels.len().max(1) as u32, false),
        };
        if mip_levels == 1 {
            descriptor.mipmap_filter = None;
        }

        let handle = match device.create_texture(&TextureDescriptor {
            label: "material texture",
            dimension: TextureDimension::D2,
            width,
            height,
            format,
            mip_levels,
        }) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to create texture {}: {}", index, e);
                return None;
            }
        };

        let uploaded = match data {
            ImageData::Rgba8 { pixels, .. } => device.upload_texture(handle, 0, 0, pixels),
            ImageData::Compressed { levels, .. } => levels
                .iter()
                .enumerate()
                .try_for_each(|(level, bytes)| device.upload_texture(handle, 0, level as u32, bytes)),
        };
        if let Err(e) = uploaded {
            tracing::error!("Failed to upload texture {}: {}", index, e);
            device.delete_texture(handle);
            return None;
        }

        if generate {
            device.generate_mipmaps(handle);
        }
        device.set_sampler(handle, &descriptor);
        Some(handle)
    }

    /// 1x1 white texture bound in place of textures that failed to upload
    pub fn fallback_white(&mut self, device: &mut dyn GpuDevice) -> Option<TextureHandle> {
        if let Some(handle) = self.fallback_white {
            return Some(handle);
        }
        let handle = device
            .create_texture(&TextureDescriptor {
                label: "fallback white",
                dimension: TextureDimension::D2,
                width: 1,
                height: 1,
                format: wgpu::TextureFormat::Rgba8Unorm,
                mip_levels: 1,
            })
            .and_then(|handle| {
                device.upload_texture(handle, 0, 0, &[255, 255, 255, 255])?;
                Ok(handle)
            });
        match handle {
            Ok(handle) => {
                device.set_sampler(handle, &SamplerDescriptor::clamped_linear(false));
                self.fallback_white = Some(handle);
                Some(handle)
            }
            Err(e) => {
                tracing::error!("Failed to create fallback texture: {}", e);
                None
            }
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.vertex_buffers.len() + self.index_buffers.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Delete every uploaded object
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        for (buffer, _) in self.vertex_buffers.values() {
            device.delete_buffer(buffer.handle);
        }
        for indices in self.index_buffers.values() {
            device.delete_buffer(indices.buffer.handle);
        }
        for &texture in self.textures.values().chain(self.fallback_white.iter()) {
            device.delete_texture(texture);
        }
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::{Accessor, AccessorType, Buffer, BufferView, Image, Sampler, Texture};
    use crate::gpu::{GpuCommand, HeadlessDevice};

    fn gltf_with_u16_indices() -> Gltf {
        let data: Vec<u8> = [0u16, 1, 2].iter().flat_map(|i| i.to_le_bytes()).collect();
        let mut gltf = Gltf::default();
        gltf.buffer_views = vec![BufferView {
            buffer: 0,
            byte_length: data.len(),
            ..Default::default()
        }];
        gltf.buffers = vec![Buffer {
            byte_length: data.len(),
            data,
            ..Default::default()
        }];
        gltf.accessors = vec![
            Accessor::new(Some(0), ComponentType::UnsignedShort, 3, AccessorType::Scalar),
            Accessor::new(Some(0), ComponentType::Float, 1, AccessorType::Scalar),
        ];
        gltf
    }

    #[test]
    fn buffers_are_uploaded_once() {
        let gltf = gltf_with_u16_indices();
        let mut device = HeadlessDevice::new();
        let mut resources = GpuResources::new();

        let first = resources.index_buffer(&mut device, &gltf, 0).unwrap();
        let second = resources.index_buffer(&mut device, &gltf, 0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.format, IndexFormat::U16);
        assert_eq!(first.buffer.count, 3);

        let creates = device
            .commands()
            .iter()
            .filter(|c| matches!(c, GpuCommand::CreateBuffer { .. }))
            .count();
        assert_eq!(creates, 1);
    }

    #[test]
    fn float_indices_are_rejected() {
        let gltf = gltf_with_u16_indices();
        let mut device = HeadlessDevice::new();
        let mut resources = GpuResources::new();
        assert!(resources.index_buffer(&mut device, &gltf, 1).is_none());
        assert_eq!(resources.buffer_count(), 0);
    }

    #[test]
    fn failed_uploads_are_not_retried() {
        let gltf = gltf_with_u16_indices();
        let mut device = HeadlessDevice::new();
        device.fail_buffer_creation = true;
        let mut resources = GpuResources::new();

        assert!(resources.vertex_buffer(&mut device, &gltf, 0).is_none());
        device.fail_buffer_creation = false;
        assert!(resources.vertex_buffer(&mut device, &gltf, 0).is_none());
    }

    fn gltf_with_texture(sampler: Sampler) -> Gltf {
        let mut gltf = Gltf::default();
        gltf.samplers = vec![sampler];
        gltf.textures = vec![Texture {
            sampler: Some(0),
            source: Some(0),
            ..Default::default()
        }];
        gltf.images = vec![Image {
            data: Some(ImageData::Rgba8 {
                width: 4,
                height: 2,
                pixels: vec![255; 4 * 2 * 4],
            }),
            ..Default::default()
        }];
        gltf
    }

    #[test]
    fn mipmapped_sampler_generates_chain() {
        let gltf = gltf_with_texture(Sampler::default());
        let mut device = HeadlessDevice::new();
        let mut resources = GpuResources::new();

        let texture = resources.texture(&mut device, &gltf, 0).unwrap();
        assert!(device.commands().iter().any(|c| matches!(
            c,
            GpuCommand::CreateTexture { desc, .. } if desc.mip_levels == 3
        )));
        assert!(device
            .commands()
            .contains(&GpuCommand::GenerateMipmaps(texture)));
        assert!(device.commands().iter().any(|c| matches!(
            c,
            GpuCommand::SetSampler { sampler, .. } if sampler.anisotropy == Some(16.0)
        )));
    }

    #[test]
    fn linear_sampler_skips_mipmaps() {
        let sampler = Sampler {
            min_filter: Some(crate::gltf::LINEAR),
            ..Default::default()
        };
        let gltf = gltf_with_texture(sampler);
        let mut device = HeadlessDevice::new();
        let mut resources = GpuResources::new();

        resources.texture(&mut device, &gltf, 0).unwrap();
        assert!(!device
            .commands()
            .iter()
            .any(|c| matches!(c, GpuCommand::GenerateMipmaps(_))));
    }

    #[test]
    fn undecoded_image_fails_once() {
        let mut gltf = gltf_with_texture(Sampler::default());
        gltf.images[0].data = None;
        let mut device = HeadlessDevice::new();
        let mut resources = GpuResources::new();

        assert!(resources.texture(&mut device, &gltf, 0).is_none());
        assert!(resources.texture(&mut device, &gltf, 0).is_none());
        assert_eq!(resources.texture_count(), 0);
        assert!(resources.fallback_white(&mut device).is_some());
    }
}
