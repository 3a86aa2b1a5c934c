//! Math kernel
//!
//! Thin layer over `glam` for the handful of operations whose edge cases the
//! scene runtime depends on: singular inversion, degenerate look-at, near-parallel
//! slerp and matrix decomposition. All matrices are column-major.

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

/// Distance below which `look_at` treats eye and center as coincident.
pub const LOOK_AT_EPSILON: f32 = 1e-6;

/// `1 - cos(theta)` below which `slerp` falls back to normalized lerp.
pub const SLERP_EPSILON: f32 = 1e-6;

/// Invert a matrix, returning `None` when the determinant is exactly zero.
///
/// Callers must skip whatever depends on the inverse instead of feeding NaNs
/// into the rest of the frame.
pub fn invert(m: &Mat4) -> Option<Mat4> {
    let det = m.determinant();
    if det == 0.0 {
        return None;
    }
    Some(m.inverse())
}

/// Normal matrix for a world transform: `transpose(inverse(world))`.
pub fn normal_matrix(world: &Mat4) -> Option<Mat4> {
    invert(world).map(|inv| inv.transpose())
}

/// Right-handed view matrix.
///
/// Returns identity when `eye` and `center` coincide (within [`LOOK_AT_EPSILON`]
/// on every axis) since the forward vector would have zero length.
pub fn look_at(eye: Vec3, center: Vec3, up: Vec3) -> Mat4 {
    let delta = (eye - center).abs();
    if delta.x < LOOK_AT_EPSILON && delta.y < LOOK_AT_EPSILON && delta.z < LOOK_AT_EPSILON {
        return Mat4::IDENTITY;
    }

    let z = (eye - center).normalize();
    let mut x = up.cross(z);
    if x.length_squared() == 0.0 {
        x = Vec3::ZERO;
    } else {
        x = x.normalize();
    }
    let mut y = z.cross(x);
    if y.length_squared() != 0.0 {
        y = y.normalize();
    }

    Mat4::from_cols(
        Vec4::new(x.x, y.x, z.x, 0.0),
        Vec4::new(x.y, y.y, z.y, 0.0),
        Vec4::new(x.z, y.z, z.z, 0.0),
        Vec4::new(-x.dot(eye), -y.dot(eye), -z.dot(eye), 1.0),
    )
}

/// OpenGL-convention perspective projection (clip z in `[-1, 1]`).
///
/// A `None` far plane produces the infinite projection glTF cameras use when
/// `zfar` is omitted.
pub fn perspective(yfov: f32, aspect_ratio: f32, znear: f32, zfar: Option<f32>) -> Mat4 {
    match zfar {
        Some(zfar) => Mat4::perspective_rh_gl(yfov, aspect_ratio, znear, zfar),
        None => {
            let f = 1.0 / (yfov / 2.0).tan();
            Mat4::from_cols(
                Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
                Vec4::new(0.0, f, 0.0, 0.0),
                Vec4::new(0.0, 0.0, -1.0, -1.0),
                Vec4::new(0.0, 0.0, -2.0 * znear, 0.0),
            )
        }
    }
}

/// OpenGL-convention orthographic projection from glTF magnifications.
pub fn orthographic(xmag: f32, ymag: f32, znear: f32, zfar: f32) -> Mat4 {
    Mat4::orthographic_rh_gl(-xmag, xmag, -ymag, ymag, znear, zfar)
}

/// Spherical linear interpolation between two quaternions.
///
/// Takes the shortest arc. When the inputs are nearly parallel the sine ratio
/// is numerically unstable, so the result degrades to a normalized lerp.
pub fn slerp(a: Quat, b: Quat, t: f32) -> Quat {
    let a = a.normalize();
    let mut b = b.normalize();

    let mut cos_theta = a.dot(b);
    if cos_theta < 0.0 {
        cos_theta = -cos_theta;
        b = -b;
    }

    if 1.0 - cos_theta <= SLERP_EPSILON {
        return a.lerp(b, t).normalize();
    }

    let theta = cos_theta.acos();
    let sin_theta = theta.sin();
    let scale_a = ((1.0 - t) * theta).sin() / sin_theta;
    let scale_b = (t * theta).sin() / sin_theta;
    let v = Vec4::from(a) * scale_a + Vec4::from(b) * scale_b;
    Quat::from_vec4(v).normalize()
}

/// Decompose an affine matrix into translation, rotation and scale.
///
/// A negative determinant is folded into the x scale so the rotation stays a
/// proper rotation.
pub fn decompose(m: &Mat4) -> (Vec3, Quat, Vec3) {
    let translation = m.w_axis.truncate();
    let mut scale = Vec3::new(
        m.x_axis.truncate().length(),
        m.y_axis.truncate().length(),
        m.z_axis.truncate().length(),
    );
    if m.determinant() < 0.0 {
        scale.x = -scale.x;
    }

    let inv = Vec3::new(
        if scale.x != 0.0 { 1.0 / scale.x } else { 0.0 },
        if scale.y != 0.0 { 1.0 / scale.y } else { 0.0 },
        if scale.z != 0.0 { 1.0 / scale.z } else { 0.0 },
    );
    let rotation_matrix = Mat3::from_cols(
        m.x_axis.truncate() * inv.x,
        m.y_axis.truncate() * inv.y,
        m.z_axis.truncate() * inv.z,
    );
    let rotation = Quat::from_mat3(&rotation_matrix).normalize();

    (translation, rotation, scale)
}

/// Compose a local transform from TRS (`T * R * S`).
pub fn compose(translation: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Column-major matrix as a flat array.
pub fn mat4_to_array(m: &Mat4) -> [f32; 16] {
    m.to_cols_array()
}
