//! Accessors, buffer views and buffers
//!
//! An accessor exposes four lazily computed views of its data: the raw typed
//! view (possibly interleaved), the normalized typed view, the deinterlaced
//! view and the normalized deinterlaced view. Each view is computed at most
//! once and cached for the accessor's lifetime.

use std::cell::OnceCell;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// glTF `componentType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    /// Size of one component in bytes
    pub fn size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }
}

impl TryFrom<u32> for ComponentType {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            5120 => ComponentType::Byte,
            5121 => ComponentType::UnsignedByte,
            5122 => ComponentType::Short,
            5123 => ComponentType::UnsignedShort,
            5125 => ComponentType::UnsignedInt,
            5126 => ComponentType::Float,
            other => return Err(format!("unsupported componentType {}", other)),
        })
    }
}

impl From<ComponentType> for u32 {
    fn from(value: ComponentType) -> Self {
        match value {
            ComponentType::Byte => 5120,
            ComponentType::UnsignedByte => 5121,
            ComponentType::Short => 5122,
            ComponentType::UnsignedShort => 5123,
            ComponentType::UnsignedInt => 5125,
            ComponentType::Float => 5126,
        }
    }
}

/// glTF accessor `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    /// Components per element
    pub fn component_count(self) -> usize {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 | AccessorType::Mat2 => 4,
            AccessorType::Mat3 => 9,
            AccessorType::Mat4 => 16,
        }
    }
}

/// Numeric data in its declared component type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl TypedData {
    /// Zero-filled data of `len` components
    pub fn zeroed(component_type: ComponentType, len: usize) -> Self {
        match component_type {
            ComponentType::Byte => TypedData::I8(vec![0; len]),
            ComponentType::UnsignedByte => TypedData::U8(vec![0; len]),
            ComponentType::Short => TypedData::I16(vec![0; len]),
            ComponentType::UnsignedShort => TypedData::U16(vec![0; len]),
            ComponentType::UnsignedInt => TypedData::U32(vec![0; len]),
            ComponentType::Float => TypedData::F32(vec![0.0; len]),
        }
    }

    /// Decode little-endian bytes; trailing partial components are ignored
    pub fn read(component_type: ComponentType, bytes: &[u8]) -> Self {
        let len = bytes.len() / component_type.size();
        let bytes = &bytes[..len * component_type.size()];
        match component_type {
            ComponentType::Byte => TypedData::I8(bytes.iter().map(|&b| b as i8).collect()),
            ComponentType::UnsignedByte => TypedData::U8(bytes.to_vec()),
            ComponentType::Short => {
                let mut out = vec![0i16; len];
                LittleEndian::read_i16_into(bytes, &mut out);
                TypedData::I16(out)
            }
            ComponentType::UnsignedShort => {
                let mut out = vec![0u16; len];
                LittleEndian::read_u16_into(bytes, &mut out);
                TypedData::U16(out)
            }
            ComponentType::UnsignedInt => {
                let mut out = vec![0u32; len];
                LittleEndian::read_u32_into(bytes, &mut out);
                TypedData::U32(out)
            }
            ComponentType::Float => {
                let mut out = vec![0f32; len];
                LittleEndian::read_f32_into(bytes, &mut out);
                TypedData::F32(out)
            }
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            TypedData::I8(_) => ComponentType::Byte,
            TypedData::U8(_) => ComponentType::UnsignedByte,
            TypedData::I16(_) => ComponentType::Short,
            TypedData::U16(_) => ComponentType::UnsignedShort,
            TypedData::U32(_) => ComponentType::UnsignedInt,
            TypedData::F32(_) => ComponentType::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedData::I8(v) => v.len(),
            TypedData::U8(v) => v.len(),
            TypedData::I16(v) => v.len(),
            TypedData::U16(v) => v.len(),
            TypedData::U32(v) => v.len(),
            TypedData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Component `index` widened to f32 without normalization
    pub fn get(&self, index: usize) -> Option<f32> {
        match self {
            TypedData::I8(v) => v.get(index).map(|&x| x as f32),
            TypedData::U8(v) => v.get(index).map(|&x| x as f32),
            TypedData::I16(v) => v.get(index).map(|&x| x as f32),
            TypedData::U16(v) => v.get(index).map(|&x| x as f32),
            TypedData::U32(v) => v.get(index).map(|&x| x as f32),
            TypedData::F32(v) => v.get(index).copied(),
        }
    }

    /// All components widened to f32 without normalization
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            TypedData::F32(v) => v.clone(),
            _ => (0..self.len()).filter_map(|i| self.get(i)).collect(),
        }
    }

    /// Integer components as u32 (used for indices and joints)
    pub fn to_u32_vec(&self) -> Vec<u32> {
        match self {
            TypedData::U8(v) => v.iter().map(|&x| x as u32).collect(),
            TypedData::U16(v) => v.iter().map(|&x| x as u32).collect(),
            TypedData::U32(v) => v.clone(),
            _ => self.to_f32_vec().into_iter().map(|x| x as u32).collect(),
        }
    }

    /// Raw bytes in native layout, for GPU upload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TypedData::I8(v) => bytemuck::cast_slice(v),
            TypedData::U8(v) => v,
            TypedData::I16(v) => bytemuck::cast_slice(v),
            TypedData::U16(v) => bytemuck::cast_slice(v),
            TypedData::U32(v) => bytemuck::cast_slice(v),
            TypedData::F32(v) => bytemuck::cast_slice(v),
        }
    }

    /// Copy one component from `src` (same component type); false on mismatch or out of range
    fn copy_component(&mut self, dst: usize, src: &TypedData, src_index: usize) -> bool {
        fn copy<T: Copy>(d: &mut [T], dst: usize, s: &[T], src_index: usize) -> bool {
            match (d.get_mut(dst), s.get(src_index)) {
                (Some(d), Some(s)) => {
                    *d = *s;
                    true
                }
                _ => false,
            }
        }
        match (self, src) {
            (TypedData::I8(d), TypedData::I8(s)) => copy(d, dst, s, src_index),
            (TypedData::U8(d), TypedData::U8(s)) => copy(d, dst, s, src_index),
            (TypedData::I16(d), TypedData::I16(s)) => copy(d, dst, s, src_index),
            (TypedData::U16(d), TypedData::U16(s)) => copy(d, dst, s, src_index),
            (TypedData::U32(d), TypedData::U32(s)) => copy(d, dst, s, src_index),
            (TypedData::F32(d), TypedData::F32(s)) => copy(d, dst, s, src_index),
            _ => false,
        }
    }

    /// New data of the same type containing the components at `indices`
    fn select(&self, indices: impl Iterator<Item = usize>) -> TypedData {
        fn pick<T: Copy>(v: &[T], indices: impl Iterator<Item = usize>) -> Vec<T> {
            indices.filter_map(|i| v.get(i).copied()).collect()
        }
        match self {
            TypedData::I8(v) => TypedData::I8(pick(v, indices)),
            TypedData::U8(v) => TypedData::U8(pick(v, indices)),
            TypedData::I16(v) => TypedData::I16(pick(v, indices)),
            TypedData::U16(v) => TypedData::U16(pick(v, indices)),
            TypedData::U32(v) => TypedData::U32(pick(v, indices)),
            TypedData::F32(v) => TypedData::F32(pick(v, indices)),
        }
    }
}

/// Map normalized integer components to floats.
///
/// Signed types clamp at -1 so the most negative value does not overshoot.
/// Unsigned int and float data pass through unchanged.
pub fn dequantize(data: &TypedData) -> TypedData {
    match data {
        TypedData::I8(v) => TypedData::F32(v.iter().map(|&x| (x as f32 / 127.0).max(-1.0)).collect()),
        TypedData::U8(v) => TypedData::F32(v.iter().map(|&x| x as f32 / 255.0).collect()),
        TypedData::I16(v) => {
            TypedData::F32(v.iter().map(|&x| (x as f32 / 32767.0).max(-1.0)).collect())
        }
        TypedData::U16(v) => TypedData::F32(v.iter().map(|&x| x as f32 / 65535.0).collect()),
        TypedData::U32(_) | TypedData::F32(_) => data.clone(),
    }
}

/// glTF buffer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub byte_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Resolved bytes (filled by the loader)
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// glTF buffer view
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl BufferView {
    /// Bytes covered by this view, clamped to the buffer
    pub fn bytes<'a>(&self, buffers: &'a [Buffer]) -> Option<&'a [u8]> {
        let buffer = buffers.get(self.buffer)?;
        let start = self.byte_offset.min(buffer.data.len());
        let end = (self.byte_offset + self.byte_length).min(buffer.data.len());
        Some(&buffer.data[start..end])
    }
}

/// Index part of a sparse accessor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseIndices {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: ComponentType,
}

/// Value part of a sparse accessor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseValues {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
}

/// Sparse patch applied on top of the base view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sparse {
    pub count: usize,
    pub indices: SparseIndices,
    pub values: SparseValues,
}

/// glTF accessor with cached views
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: ComponentType,
    #[serde(default)]
    pub normalized: bool,
    pub count: usize,
    #[serde(rename = "type")]
    pub ty: AccessorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse: Option<Sparse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip)]
    typed_view: OnceCell<TypedData>,
    #[serde(skip)]
    normalized_typed_view: OnceCell<TypedData>,
    #[serde(skip)]
    deinterlaced_view: OnceCell<TypedData>,
    #[serde(skip)]
    normalized_deinterlaced_view: OnceCell<TypedData>,
}

impl Accessor {
    /// Accessor over a buffer view with no sparse patch
    pub fn new(
        buffer_view: Option<usize>,
        component_type: ComponentType,
        count: usize,
        ty: AccessorType,
    ) -> Self {
        Self {
            buffer_view,
            byte_offset: 0,
            component_type,
            normalized: false,
            count,
            ty,
            min: None,
            max: None,
            sparse: None,
            name: None,
            typed_view: OnceCell::new(),
            normalized_typed_view: OnceCell::new(),
            deinterlaced_view: OnceCell::new(),
            normalized_deinterlaced_view: OnceCell::new(),
        }
    }

    pub fn component_count(&self) -> usize {
        self.ty.component_count()
    }

    /// Raw typed view, including stride padding when interleaved
    pub fn typed_view(&self, views: &[BufferView], buffers: &[Buffer]) -> &TypedData {
        self.typed_view
            .get_or_init(|| self.compute_typed_view(views, buffers))
    }

    /// Typed view dequantized to floats when `normalized`
    pub fn normalized_typed_view(&self, views: &[BufferView], buffers: &[Buffer]) -> &TypedData {
        self.normalized_typed_view.get_or_init(|| {
            let typed = self.typed_view(views, buffers);
            if self.normalized {
                dequantize(typed)
            } else {
                typed.clone()
            }
        })
    }

    /// Tightly packed view containing only this accessor's components
    pub fn deinterlaced_view(&self, views: &[BufferView], buffers: &[Buffer]) -> &TypedData {
        self.deinterlaced_view.get_or_init(|| {
            let typed = self.typed_view(views, buffers);
            let components = self.component_count();
            let size = self.component_type.size();
            let stride = self
                .buffer_view
                .and_then(|i| views.get(i))
                .and_then(|v| v.byte_stride)
                .unwrap_or(0);

            let elements_per_stride = stride / size;
            if stride == 0 || elements_per_stride <= components {
                return typed.select(0..(self.count * components).min(typed.len()));
            }

            typed.select(
                (0..self.count)
                    .flat_map(|i| (0..components).map(move |k| i * elements_per_stride + k)),
            )
        })
    }

    /// Deinterlaced view dequantized to floats when `normalized`
    pub fn normalized_deinterlaced_view(
        &self,
        views: &[BufferView],
        buffers: &[Buffer],
    ) -> &TypedData {
        self.normalized_deinterlaced_view.get_or_init(|| {
            let deinterlaced = self.deinterlaced_view(views, buffers);
            if self.normalized {
                dequantize(deinterlaced)
            } else {
                deinterlaced.clone()
            }
        })
    }

    /// Tightly packed float components (dequantized when normalized)
    pub fn read_f32(&self, views: &[BufferView], buffers: &[Buffer]) -> Vec<f32> {
        self.normalized_deinterlaced_view(views, buffers)
            .to_f32_vec()
    }

    fn compute_typed_view(&self, views: &[BufferView], buffers: &[Buffer]) -> TypedData {
        let components = self.component_count();
        let size = self.component_type.size();

        let mut data = match self.buffer_view {
            None => TypedData::zeroed(self.component_type, self.count * components),
            Some(index) => match views.get(index).and_then(|v| Some((v, buffers.get(v.buffer)?))) {
                None => {
                    tracing::warn!(
                        "Accessor references missing buffer view {} (or its buffer); using zeros",
                        index
                    );
                    TypedData::zeroed(self.component_type, self.count * components)
                }
                Some((view, buffer)) => {
                    let stride = view.byte_stride.unwrap_or(0);
                    let mut array_length = if stride != 0 && self.count > 0 {
                        stride / size * (self.count - 1) + components
                    } else {
                        self.count * components
                    };

                    let offset = view.byte_offset + self.byte_offset;
                    let available = buffer.data.len().saturating_sub(offset) / size;
                    if array_length > available {
                        tracing::warn!(
                            "Accessor needs {} components but buffer {} only holds {} past offset {}; truncating",
                            array_length,
                            view.buffer,
                            available,
                            offset
                        );
                        array_length = available;
                    }

                    let start = offset.min(buffer.data.len());
                    TypedData::read(
                        self.component_type,
                        &buffer.data[start..start + array_length * size],
                    )
                }
            },
        };

        if let Some(sparse) = &self.sparse {
            self.apply_sparse(&mut data, sparse, views, buffers);
        }
        data
    }

    /// Scatter `values[i * n + k]` into `data[indices[i] * n + k]`
    fn apply_sparse(
        &self,
        data: &mut TypedData,
        sparse: &Sparse,
        views: &[BufferView],
        buffers: &[Buffer],
    ) {
        let components = self.component_count();

        let indices = match views.get(sparse.indices.buffer_view).and_then(|v| v.bytes(buffers)) {
            Some(bytes) => {
                let start = sparse.indices.byte_offset.min(bytes.len());
                let bytes = &bytes[start..];
                let needed = (sparse.count * sparse.indices.component_type.size()).min(bytes.len());
                TypedData::read(sparse.indices.component_type, &bytes[..needed]).to_u32_vec()
            }
            None => {
                tracing::warn!("Sparse accessor indices reference a missing buffer view");
                return;
            }
        };

        let values = match views.get(sparse.values.buffer_view).and_then(|v| v.bytes(buffers)) {
            Some(bytes) => {
                let start = sparse.values.byte_offset.min(bytes.len());
                let bytes = &bytes[start..];
                let needed =
                    (sparse.count * components * self.component_type.size()).min(bytes.len());
                TypedData::read(self.component_type, &bytes[..needed])
            }
            None => {
                tracing::warn!("Sparse accessor values reference a missing buffer view");
                return;
            }
        };

        let mut skipped = 0usize;
        for (i, &index) in indices.iter().enumerate() {
            for k in 0..components {
                if !data.copy_component(index as usize * components + k, &values, i * components + k) {
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            tracing::warn!("Sparse accessor patch skipped {} out-of-range components", skipped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_buffer(bytes: Vec<u8>, stride: Option<usize>) -> (Vec<BufferView>, Vec<Buffer>) {
        let view = BufferView {
            buffer: 0,
            byte_offset: 0,
            byte_length: bytes.len(),
            byte_stride: stride,
            ..Default::default()
        };
        let buffer = Buffer {
            byte_length: bytes.len(),
            data: bytes,
            ..Default::default()
        };
        (vec![view], vec![buffer])
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn normalized_unsigned_byte_view() {
        let (views, buffers) = single_buffer(vec![0, 127, 255], None);
        let mut accessor = Accessor::new(Some(0), ComponentType::UnsignedByte, 3, AccessorType::Scalar);
        accessor.normalized = true;

        let view = accessor.normalized_typed_view(&views, &buffers).to_f32_vec();
        assert_eq!(view[0], 0.0);
        assert!((view[1] - 0.498).abs() < 1e-3);
        assert_eq!(view[2], 1.0);
    }

    #[test]
    fn dequantize_byte_clamps_at_minus_one() {
        let out = dequantize(&TypedData::I8(vec![127, -128, 0])).to_f32_vec();
        assert_eq!(out, vec![1.0, -1.0, 0.0]);

        let out = dequantize(&TypedData::U8(vec![255, 0])).to_f32_vec();
        assert_eq!(out, vec![1.0, 0.0]);

        let out = dequantize(&TypedData::I16(vec![32767, -32768])).to_f32_vec();
        assert_eq!(out, vec![1.0, -1.0]);

        let out = dequantize(&TypedData::U16(vec![65535])).to_f32_vec();
        assert_eq!(out, vec![1.0]);
    }

    #[test]
    fn interleaved_view_and_deinterlace() {
        // Two VEC2 floats interleaved with one padding float each (stride 12)
        let bytes = f32_bytes(&[1.0, 2.0, 99.0, 3.0, 4.0, 99.0]);
        let (views, buffers) = single_buffer(bytes, Some(12));
        let accessor = Accessor::new(Some(0), ComponentType::Float, 2, AccessorType::Vec2);

        // stride/size * (count - 1) + components = 3 * 1 + 2
        assert_eq!(accessor.typed_view(&views, &buffers).len(), 5);
        assert_eq!(
            accessor.deinterlaced_view(&views, &buffers).to_f32_vec(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn truncates_when_buffer_too_short() {
        let bytes = f32_bytes(&[1.0, 2.0]);
        let (views, buffers) = single_buffer(bytes, None);
        let accessor = Accessor::new(Some(0), ComponentType::Float, 4, AccessorType::Scalar);
        assert_eq!(accessor.typed_view(&views, &buffers).to_f32_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn sparse_patch_overrides_base_values() {
        // base: 4 scalars, indices (u16): [1, 3], values: [10, 30]
        let mut bytes = f32_bytes(&[0.0, 1.0, 2.0, 3.0]);
        let index_offset = bytes.len();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&3u16.to_le_bytes());
        let value_offset = bytes.len();
        bytes.extend(f32_bytes(&[10.0, 30.0]));

        let buffers = vec![Buffer {
            byte_length: bytes.len(),
            data: bytes,
            ..Default::default()
        }];
        let views = vec![
            BufferView { buffer: 0, byte_offset: 0, byte_length: 16, ..Default::default() },
            BufferView { buffer: 0, byte_offset: index_offset, byte_length: 4, ..Default::default() },
            BufferView { buffer: 0, byte_offset: value_offset, byte_length: 8, ..Default::default() },
        ];

        let mut accessor = Accessor::new(Some(0), ComponentType::Float, 4, AccessorType::Scalar);
        accessor.sparse = Some(Sparse {
            count: 2,
            indices: SparseIndices {
                buffer_view: 1,
                byte_offset: 0,
                component_type: ComponentType::UnsignedShort,
            },
            values: SparseValues { buffer_view: 2, byte_offset: 0 },
        });

        assert_eq!(
            accessor.typed_view(&views, &buffers).to_f32_vec(),
            vec![0.0, 10.0, 2.0, 30.0]
        );
    }

    #[test]
    fn sparse_without_buffer_view_patches_zeros() {
        let mut bytes = vec![2u8];
        bytes.extend(f32_bytes(&[7.0, 8.0, 9.0]));
        let buffers = vec![Buffer { byte_length: bytes.len(), data: bytes, ..Default::default() }];
        let views = vec![
            BufferView { buffer: 0, byte_offset: 0, byte_length: 1, ..Default::default() },
            BufferView { buffer: 0, byte_offset: 1, byte_length: 12, ..Default::default() },
        ];

        let mut accessor = Accessor::new(None, ComponentType::Float, 3, AccessorType::Vec3);
        accessor.sparse = Some(Sparse {
            count: 1,
            indices: SparseIndices {
                buffer_view: 0,
                byte_offset: 0,
                component_type: ComponentType::UnsignedByte,
            },
            values: SparseValues { buffer_view: 1, byte_offset: 0 },
        });

        let view = accessor.typed_view(&views, &buffers).to_f32_vec();
        assert_eq!(view.len(), 9);
        assert_eq!(&view[6..9], &[7.0, 8.0, 9.0]);
        assert!(view[..6].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn views_are_cached() {
        let (views, buffers) = single_buffer(f32_bytes(&[1.0]), None);
        let accessor = Accessor::new(Some(0), ComponentType::Float, 1, AccessorType::Scalar);
        let first = accessor.typed_view(&views, &buffers) as *const TypedData;
        let second = accessor.typed_view(&[], &[]) as *const TypedData;
        assert_eq!(first, second);
    }

    #[test]
    fn component_type_from_json() {
        let accessor: Accessor = serde_json::from_str(
            r#"{"bufferView":0,"componentType":5123,"count":3,"type":"SCALAR"}"#,
        )
        .unwrap();
        assert_eq!(accessor.component_type, ComponentType::UnsignedShort);
        assert!(
            serde_json::from_str::<Accessor>(r#"{"componentType":5124,"count":1,"type":"SCALAR"}"#)
                .is_err()
        );
    }
}
