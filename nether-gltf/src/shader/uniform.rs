//! Uniform values
//!
//! A tagged union covering every value the renderer uploads. Struct and array
//! variants nest; the program walks them recursively and uploads each leaf by
//! its fully qualified name (`u_Lights[1].color`).

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    /// Flat float array (`uniform float u_morphWeights[N]`)
    FloatArray(Vec<f32>),
    IntArray(Vec<i32>),
    /// Named members uploaded as `name.member`
    Struct(Vec<(String, UniformValue)>),
    /// Elements uploaded as `name[i]` when they are structs, flattened otherwise
    Array(Vec<UniformValue>),
}

/// Flattened leaf data
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flat {
    Float(Vec<f32>),
    Int(Vec<i32>),
}

impl UniformValue {
    /// Build a struct value from `(member, value)` pairs
    pub fn structure<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (S, UniformValue)>,
        S: Into<String>,
    {
        UniformValue::Struct(
            members
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, UniformValue::Struct(_))
    }

    /// Flatten a non-struct value (arrays of vectors or matrices included)
    pub(crate) fn flatten(&self) -> Option<Flat> {
        Some(match self {
            UniformValue::Float(v) => Flat::Float(vec![*v]),
            UniformValue::Vec2(v) => Flat::Float(v.to_array().to_vec()),
            UniformValue::Vec3(v) => Flat::Float(v.to_array().to_vec()),
            UniformValue::Vec4(v) => Flat::Float(v.to_array().to_vec()),
            UniformValue::Mat3(m) => Flat::Float(m.to_cols_array().to_vec()),
            UniformValue::Mat4(m) => Flat::Float(m.to_cols_array().to_vec()),
            UniformValue::Int(v) => Flat::Int(vec![*v]),
            UniformValue::IVec2(v) => Flat::Int(v.to_vec()),
            UniformValue::IVec3(v) => Flat::Int(v.to_vec()),
            UniformValue::IVec4(v) => Flat::Int(v.to_vec()),
            UniformValue::FloatArray(v) => Flat::Float(v.clone()),
            UniformValue::IntArray(v) => Flat::Int(v.clone()),
            UniformValue::Struct(_) => return None,
            UniformValue::Array(items) => {
                let mut floats = Vec::new();
                let mut ints = Vec::new();
                for item in items {
                    match item.flatten()? {
                        Flat::Float(f) => floats.extend(f),
                        Flat::Int(i) => ints.extend(i),
                    }
                }
                if ints.is_empty() {
                    Flat::Float(floats)
                } else if floats.is_empty() {
                    Flat::Int(ints)
                } else {
                    return None;
                }
            }
        })
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Int(v as i32)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(v: Mat3) -> Self {
        UniformValue::Mat3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(Vec3::from(v))
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(Vec4::from(v))
    }
}
