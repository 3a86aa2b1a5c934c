//! Programmatic asset generation for integration tests.
//!
//! Builds a textured quad with:
//! - POSITION / NORMAL / TEXCOORD_0 and u16 indices
//! - a 2x2 PNG base color texture
//! - a one second rotation animation
//! - a perspective camera three units down +Z

use std::io::Cursor;

use serde_json::{json, Value};

use nether_gltf::loader::write_glb;

pub const TEXTURE_SIZE: u32 = 2;

const POSITIONS: [f32; 12] = [-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 1.0, 0.0, -1.0, 1.0, 0.0];
const NORMALS: [f32; 12] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
const UVS: [f32; 8] = [0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
const INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];
const TIMES: [f32; 2] = [0.0, 1.0];
/// Identity, then a half turn about +Y
const ROTATIONS: [f32; 8] = [0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0];

/// 2x2 RGBA PNG
pub fn png_texture() -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(TEXTURE_SIZE, TEXTURE_SIZE, image::Rgba([200, 40, 40, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes
}

/// Geometry and animation data, 4-byte aligned
pub fn geometry_buffer() -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(bytemuck::cast_slice(&POSITIONS));
    buffer.extend_from_slice(bytemuck::cast_slice(&NORMALS));
    buffer.extend_from_slice(bytemuck::cast_slice(&UVS));
    buffer.extend_from_slice(bytemuck::cast_slice(&INDICES));
    buffer.extend_from_slice(bytemuck::cast_slice(&TIMES));
    buffer.extend_from_slice(bytemuck::cast_slice(&ROTATIONS));
    buffer
}

/// Buffer views over [`geometry_buffer`], optionally followed by an image view
fn buffer_views(image_length: Option<usize>) -> Vec<Value> {
    let mut views = vec![
        json!({ "buffer": 0, "byteOffset": 0, "byteLength": 48 }),
        json!({ "buffer": 0, "byteOffset": 48, "byteLength": 48 }),
        json!({ "buffer": 0, "byteOffset": 96, "byteLength": 32 }),
        json!({ "buffer": 0, "byteOffset": 128, "byteLength": 12 }),
        json!({ "buffer": 0, "byteOffset": 140, "byteLength": 8 }),
        json!({ "buffer": 0, "byteOffset": 148, "byteLength": 32 }),
    ];
    if let Some(length) = image_length {
        views.push(json!({ "buffer": 0, "byteOffset": 180, "byteLength": length }));
    }
    views
}

fn document(buffer: Value, image: Value, views: Vec<Value>) -> Value {
    json!({
        "asset": { "version": "2.0", "generator": "nether-gltf tests" },
        "scene": 0,
        "scenes": [ { "nodes": [0, 1] } ],
        "nodes": [
            { "mesh": 0, "name": "quad" },
            { "camera": 0, "translation": [0.0, 0.0, 3.0] }
        ],
        "cameras": [ { "type": "perspective", "perspective": { "yfov": 0.8, "znear": 0.1, "zfar": 100.0 } } ],
        "meshes": [ { "primitives": [ {
            "attributes": { "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2 },
            "indices": 3,
            "material": 0
        } ] } ],
        "materials": [ { "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } } ],
        "textures": [ { "source": 0, "sampler": 0 } ],
        "samplers": [ { "magFilter": 9729, "minFilter": 9987 } ],
        "images": [ image ],
        "animations": [ {
            "channels": [ { "sampler": 0, "target": { "node": 0, "path": "rotation" } } ],
            "samplers": [ { "input": 4, "output": 5 } ]
        } ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3",
              "min": [-1.0, -1.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5126, "count": 4, "type": "VEC3" },
            { "bufferView": 2, "componentType": 5126, "count": 4, "type": "VEC2" },
            { "bufferView": 3, "componentType": 5123, "count": 6, "type": "SCALAR" },
            { "bufferView": 4, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [1.0] },
            { "bufferView": 5, "componentType": 5126, "count": 2, "type": "VEC4" }
        ],
        "bufferViews": views,
        "buffers": [ buffer ]
    })
}

/// Self-contained GLB with the texture stored in the BIN chunk
pub fn quad_glb() -> Vec<u8> {
    let png = png_texture();
    let mut bin = geometry_buffer();
    bin.extend_from_slice(&png);

    let root = document(
        json!({ "byteLength": bin.len() }),
        json!({ "bufferView": 6, "mimeType": "image/png" }),
        buffer_views(Some(png.len())),
    );
    let json = serde_json::to_vec(&root).expect("Failed to serialize JSON");
    write_glb(&json, Some(&bin))
}

/// `.gltf` JSON referencing `bin_uri` and `image_uri`
pub fn quad_gltf(bin_uri: &str, image_uri: &str) -> Vec<u8> {
    let root = document(
        json!({ "byteLength": geometry_buffer().len(), "uri": bin_uri }),
        json!({ "uri": image_uri }),
        buffer_views(None),
    );
    serde_json::to_vec_pretty(&root).expect("Failed to serialize JSON")
}
