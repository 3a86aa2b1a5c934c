//! Asset loading
//!
//! Resolves a `.gltf` or `.glb` file into a [`Gltf`] with buffer bytes and
//! decoded images filled in, then runs [`Gltf::initialize`]. URIs resolve
//! against `data:` payloads, the additional-files map (drag-and-drop style
//! multi-file loads) and finally the asset's directory.
//!
//! Buffer failures abort the load. Image failures are logged and leave the
//! image undecoded; the renderer binds a fallback texture for it.

mod decoders;
mod glb;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::LoadError;
use crate::gltf::{Gltf, ImageData};
use crate::ibl::Panorama;

pub use decoders::{splice_draco, DecodedAttribute, DecodedMesh, DracoDecoder, Ktx2Transcoder};
pub use glb::{is_glb, parse_glb, write_glb, Glb, CHUNK_BIN, CHUNK_JSON, GLB_MAGIC, GLB_VERSION};

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";
const BASISU_EXTENSION: &str = "KHR_texture_basisu";

/// Configurable glTF loader
#[derive(Default)]
pub struct GltfLoader {
    additional_files: HashMap<String, Vec<u8>>,
    ktx2: Option<Box<dyn Ktx2Transcoder>>,
    draco: Option<Box<dyn DracoDecoder>>,
}

impl GltfLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `bytes` resolvable by URI `name` (or its file name)
    pub fn with_file(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.additional_files.insert(name.into(), bytes);
        self
    }

    pub fn with_files(mut self, files: HashMap<String, Vec<u8>>) -> Self {
        self.additional_files.extend(files);
        self
    }

    pub fn with_ktx2_transcoder(mut self, transcoder: Box<dyn Ktx2Transcoder>) -> Self {
        self.ktx2 = Some(transcoder);
        self
    }

    pub fn with_draco_decoder(mut self, decoder: Box<dyn DracoDecoder>) -> Self {
        self.draco = Some(decoder);
        self
    }

    /// Load and initialize the asset at `path`
    pub fn load(&self, path: &Path) -> Result<Gltf, LoadError> {
        let bytes = read_file(path)?;
        self.load_from_slice(&bytes, path.parent())
    }

    /// Load and initialize an asset from `.gltf` or `.glb` bytes
    pub fn load_from_slice(&self, bytes: &[u8], base_dir: Option<&Path>) -> Result<Gltf, LoadError> {
        let (json, bin) = if is_glb(bytes) {
            let glb = parse_glb(bytes)?;
            (glb.json, glb.bin)
        } else {
            (bytes, None)
        };

        let mut gltf = Gltf::from_json_slice(json)?;
        self.check_required_extensions(&gltf)?;
        validate_indices(&gltf)?;
        self.resolve_buffers(&mut gltf, bin, base_dir)?;
        self.decode_draco(&mut gltf)?;
        self.decode_images(&mut gltf, base_dir);
        gltf.initialize();

        tracing::info!(
            "Loaded glTF {}: {} scenes, {} meshes, {} images",
            gltf.asset.generator.as_deref().unwrap_or("(unknown generator)"),
            gltf.scenes.len(),
            gltf.meshes.len(),
            gltf.images.len()
        );
        Ok(gltf)
    }

    fn check_required_extensions(&self, gltf: &Gltf) -> Result<(), LoadError> {
        for extension in &gltf.extensions_required {
            match extension.as_str() {
                DRACO_EXTENSION if self.draco.is_none() => {
                    return Err(LoadError::MissingDecoder {
                        extension: DRACO_EXTENSION,
                    });
                }
                BASISU_EXTENSION if self.ktx2.is_none() => {
                    return Err(LoadError::MissingDecoder {
                        extension: BASISU_EXTENSION,
                    });
                }
                _ => {}
            }
        }
        for extension in &gltf.extensions_used {
            let missing = match extension.as_str() {
                DRACO_EXTENSION => self.draco.is_none(),
                BASISU_EXTENSION => self.ktx2.is_none(),
                _ => false,
            };
            if missing && !gltf.extensions_required.contains(extension) {
                tracing::warn!("{} is used but no decoder is registered; falling back", extension);
            }
        }
        Ok(())
    }

    fn resolve_buffers(&self, gltf: &mut Gltf, bin: Option<&[u8]>, base_dir: Option<&Path>) -> Result<(), LoadError> {
        let mut bin = bin;
        for (index, buffer) in gltf.buffers.iter_mut().enumerate() {
            let data = match &buffer.uri {
                Some(uri) => self.resolve_uri(uri, base_dir)?,
                // Only the first buffer may refer to the GLB BIN chunk
                None => match bin.take() {
                    Some(bytes) if index == 0 => bytes.to_vec(),
                    _ => return Err(LoadError::UnresolvedUri(format!("buffer {} (no uri, no BIN chunk)", index))),
                },
            };
            if data.len() < buffer.byte_length {
                return Err(LoadError::TruncatedBuffer {
                    index,
                    expected: buffer.byte_length,
                    actual: data.len(),
                });
            }
            buffer.data = data;
        }
        Ok(())
    }

    fn decode_draco(&self, gltf: &mut Gltf) -> Result<(), LoadError> {
        let Some(decoder) = &self.draco else {
            return Ok(());
        };
        let mut jobs = Vec::new();
        for (mesh_index, mesh) in gltf.meshes.iter().enumerate() {
            for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
                if let Some(draco) = primitive.draco() {
                    jobs.push((mesh_index, primitive_index, draco.clone()));
                }
            }
        }

        for (mesh, primitive, draco) in jobs {
            let view = gltf.buffer_views.get(draco.buffer_view).ok_or(LoadError::InvalidIndex {
                kind: "bufferView",
                index: draco.buffer_view,
            })?;
            let data = view.bytes(&gltf.buffers).unwrap_or_default();
            let decoded = decoder.decode(data, &draco.attributes).map_err(LoadError::Decoder)?;
            tracing::debug!(
                "Decoded Draco primitive {} of mesh {}: {} indices",
                primitive,
                mesh,
                decoded.indices.len()
            );
            splice_draco(gltf, mesh, primitive, decoded);
        }
        Ok(())
    }

    fn decode_images(&self, gltf: &mut Gltf, base_dir: Option<&Path>) {
        for index in 0..gltf.images.len() {
            match self.decode_image(gltf, index, base_dir) {
                Ok(data) => gltf.images[index].data = data,
                Err(e) => tracing::warn!("Image {} could not be decoded: {}", index, e),
            }
        }
    }

    fn decode_image(&self, gltf: &Gltf, index: usize, base_dir: Option<&Path>) -> Result<Option<ImageData>, LoadError> {
        let image = &gltf.images[index];
        let bytes = match (&image.uri, image.buffer_view) {
            (Some(uri), _) => self.resolve_uri(uri, base_dir)?,
            (None, Some(view)) => gltf
                .buffer_views
                .get(view)
                .and_then(|v| v.bytes(&gltf.buffers))
                .ok_or(LoadError::InvalidIndex {
                    kind: "bufferView",
                    index: view,
                })?
                .to_vec(),
            (None, None) => return Err(LoadError::UnresolvedUri(format!("image {} has no source", index))),
        };

        if image.is_ktx2() {
            let Some(transcoder) = &self.ktx2 else {
                tracing::warn!("Image {} is KTX2 and no transcoder is registered", index);
                return Ok(None);
            };
            return transcoder.transcode(&bytes).map(Some).map_err(LoadError::Decoder);
        }

        let rgba = image::load_from_memory(&bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Some(ImageData::Rgba8 {
            width,
            height,
            pixels: rgba.into_raw(),
        }))
    }

    /// Bytes behind a glTF URI
    fn resolve_uri(&self, uri: &str, base_dir: Option<&Path>) -> Result<Vec<u8>, LoadError> {
        if let Some(rest) = uri.strip_prefix("data:") {
            let Some((header, payload)) = rest.split_once(',') else {
                return Err(LoadError::UnresolvedUri(uri.chars().take(64).collect()));
            };
            if header.ends_with(";base64") {
                return Ok(BASE64.decode(payload)?);
            }
            return Ok(percent_decode(payload).into_bytes());
        }

        let name = percent_decode(uri);
        let file_name = Path::new(&name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&name);
        if let Some(bytes) = self
            .additional_files
            .get(&name)
            .or_else(|| self.additional_files.get(file_name))
        {
            return Ok(bytes.clone());
        }

        match base_dir {
            Some(dir) => read_file(&dir.join(&name)),
            None => Err(LoadError::UnresolvedUri(name)),
        }
    }
}

/// Load `path` with `additional_files` available for URI resolution
pub fn load_gltf(path: &Path, additional_files: HashMap<String, Vec<u8>>) -> Result<Gltf, LoadError> {
    GltfLoader::new().with_files(additional_files).load(path)
}

/// Decode a Radiance `.hdr` panorama
pub fn load_environment(path: &Path) -> Result<Panorama, LoadError> {
    load_environment_from_slice(&read_file(path)?)
}

pub fn load_environment_from_slice(bytes: &[u8]) -> Result<Panorama, LoadError> {
    let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Hdr)?.to_rgb32f();
    let (width, height) = image.dimensions();
    tracing::debug!("Decoded {}x{} environment panorama", width, height);
    Ok(Panorama::from_rgb(width, height, image.as_raw()))
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: PathBuf::from(path),
        source,
    })
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim
fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Reject references to missing elements before anything dereferences them
fn validate_indices(gltf: &Gltf) -> Result<(), LoadError> {
    let check = |kind: &'static str, index: usize, len: usize| {
        if index < len {
            Ok(())
        } else {
            Err(LoadError::InvalidIndex { kind, index })
        }
    };

    for scene in &gltf.scenes {
        for &node in &scene.nodes {
            check("node", node, gltf.nodes.len())?;
        }
    }
    for node in &gltf.nodes {
        for &child in &node.children {
            check("node", child, gltf.nodes.len())?;
        }
        if let Some(mesh) = node.mesh {
            check("mesh", mesh, gltf.meshes.len())?;
        }
        if let Some(skin) = node.skin {
            check("skin", skin, gltf.skins.len())?;
        }
        if let Some(camera) = node.camera {
            check("camera", camera, gltf.cameras.len())?;
        }
    }
    for primitive in gltf.meshes.iter().flat_map(|m| &m.primitives) {
        let targets = primitive.targets.iter().flat_map(|t| t.values());
        for &accessor in primitive.attributes.values().chain(targets).chain(&primitive.indices) {
            check("accessor", accessor, gltf.accessors.len())?;
        }
        if let Some(material) = primitive.material {
            check("material", material, gltf.materials.len())?;
        }
    }
    for accessor in &gltf.accessors {
        if let Some(view) = accessor.buffer_view {
            check("bufferView", view, gltf.buffer_views.len())?;
        }
        if let Some(sparse) = &accessor.sparse {
            check("bufferView", sparse.indices.buffer_view, gltf.buffer_views.len())?;
            check("bufferView", sparse.values.buffer_view, gltf.buffer_views.len())?;
        }
    }
    for view in &gltf.buffer_views {
        check("buffer", view.buffer, gltf.buffers.len())?;
    }
    for texture in &gltf.textures {
        if let Some(sampler) = texture.sampler {
            check("sampler", sampler, gltf.samplers.len())?;
        }
        if let Some(image) = texture.image_source() {
            check("image", image, gltf.images.len())?;
        }
    }
    for skin in &gltf.skins {
        for &joint in &skin.joints {
            check("node", joint, gltf.nodes.len())?;
        }
    }
    for animation in &gltf.animations {
        for sampler in &animation.samplers {
            check("accessor", sampler.input, gltf.accessors.len())?;
            check("accessor", sampler.output, gltf.accessors.len())?;
        }
        for channel in &animation.channels {
            check("animation sampler", channel.sampler, animation.samplers.len())?;
            if let Some(node) = channel.target.node {
                check("node", node, gltf.nodes.len())?;
            }
        }
    }
    Ok(())
}
