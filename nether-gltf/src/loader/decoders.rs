//! External decoder boundaries
//!
//! Draco mesh decompression and KTX2/Basis transcoding are delegated to
//! implementations supplied by the embedder. The loader only splices their
//! output back into the asset.

use std::collections::BTreeMap;

use crate::gltf::{Accessor, AccessorType, Buffer, BufferView, ComponentType, Gltf, ImageData};

/// Transcodes `image/ktx2` payloads into uploadable texture data
pub trait Ktx2Transcoder {
    /// Decode a whole KTX2 file; the mip chain is carried in the result
    fn transcode(&self, data: &[u8]) -> Result<ImageData, String>;
}

/// One decoded vertex stream, tightly packed
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAttribute {
    pub component_type: ComponentType,
    pub ty: AccessorType,
    pub normalized: bool,
    pub count: usize,
    /// Little-endian component data
    pub data: Vec<u8>,
}

/// Output of a Draco decode: per-semantic streams plus a triangle list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMesh {
    pub attributes: BTreeMap<String, DecodedAttribute>,
    pub indices: Vec<u32>,
}

/// Decodes `KHR_draco_mesh_compression` buffer views
pub trait DracoDecoder {
    /// `attributes` maps glTF semantics to Draco attribute ids
    fn decode(&self, data: &[u8], attributes: &BTreeMap<String, u32>) -> Result<DecodedMesh, String>;
}

/// Append `data` as a new buffer and buffer view, returning the view index
fn push_view(gltf: &mut Gltf, data: Vec<u8>) -> usize {
    let byte_length = data.len();
    gltf.buffers.push(Buffer {
        byte_length,
        data,
        ..Default::default()
    });
    gltf.buffer_views.push(BufferView {
        buffer: gltf.buffers.len() - 1,
        byte_length,
        ..Default::default()
    });
    gltf.buffer_views.len() - 1
}

/// Replace a compressed primitive's attributes and indices with decoded streams.
///
/// Decoded data lands in new buffers, views and accessors owned by the asset;
/// the Draco extension is removed so the primitive is not decoded twice.
pub fn splice_draco(gltf: &mut Gltf, mesh: usize, primitive: usize, decoded: DecodedMesh) {
    let mut accessors = BTreeMap::new();
    for (semantic, attribute) in decoded.attributes {
        let view = push_view(gltf, attribute.data);
        let mut accessor = Accessor::new(Some(view), attribute.component_type, attribute.count, attribute.ty);
        accessor.normalized = attribute.normalized;
        gltf.accessors.push(accessor);
        accessors.insert(semantic, gltf.accessors.len() - 1);
    }

    let indices = if decoded.indices.is_empty() {
        None
    } else {
        let count = decoded.indices.len();
        let data = bytemuck::cast_slice(&decoded.indices).to_vec();
        let view = push_view(gltf, data);
        gltf.accessors.push(Accessor::new(
            Some(view),
            ComponentType::UnsignedInt,
            count,
            AccessorType::Scalar,
        ));
        Some(gltf.accessors.len() - 1)
    };

    let Some(target) = gltf
        .meshes
        .get_mut(mesh)
        .and_then(|m| m.primitives.get_mut(primitive))
    else {
        return;
    };
    for (semantic, accessor) in accessors {
        target.attributes.insert(semantic, accessor);
    }
    if indices.is_some() {
        target.indices = indices;
    }
    if let Some(extensions) = target.extensions.as_mut() {
        extensions.draco = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spliced_streams_replace_compressed_accessors() {
        let json = br#"{
            "asset": { "version": "2.0" },
            "meshes": [ { "primitives": [ {
                "attributes": { "POSITION": 0 },
                "extensions": { "KHR_draco_mesh_compression": { "bufferView": 0, "attributes": { "POSITION": 0 } } }
            } ] } ],
            "accessors": [ { "componentType": 5126, "count": 3, "type": "VEC3" } ]
        }"#;
        let mut gltf = Gltf::from_json_slice(json).unwrap();

        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let mut decoded = DecodedMesh {
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        decoded.attributes.insert(
            "POSITION".into(),
            DecodedAttribute {
                component_type: ComponentType::Float,
                ty: AccessorType::Vec3,
                normalized: false,
                count: 3,
                data: bytemuck::cast_slice(&positions).to_vec(),
            },
        );
        splice_draco(&mut gltf, 0, 0, decoded);

        let primitive = &gltf.meshes[0].primitives[0];
        assert!(primitive.draco().is_none());
        assert_eq!(primitive.attributes["POSITION"], 1);
        assert_eq!(primitive.indices, Some(2));

        let read = gltf.accessors[1].read_f32(&gltf.buffer_views, &gltf.buffers);
        assert_eq!(read, positions);
        let indices = gltf.accessors[2]
            .typed_view(&gltf.buffer_views, &gltf.buffers)
            .to_u32_vec();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
