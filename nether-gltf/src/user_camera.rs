//! Orbit camera used when no glTF camera is selected
//!
//! Orbits `target` at `distance` with yaw around +Y and pitch towards +Y.
//! [`UserCamera::fit_view_to_scene`] frames the accessor bounds of a scene
//! and derives clip planes and pan speed from their extent.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

use crate::gltf::{Camera, Gltf};
use crate::math;

/// Keeps pitch away from the poles where `look_at` loses its up vector
const PITCH_LIMIT: f32 = FRAC_PI_2 - 1e-3;

/// Bounds diagonal divided by this gives the pan distance per input unit
const PAN_SPEED_DENOMINATOR: f32 = 1200.0;

const MIN_ZOOM_EXPONENT: f32 = -5.0;
const MAX_ZOOM_EXPONENT: f32 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct UserCamera {
    pub target: Vec3,
    /// Rotation around +Y, radians
    pub yaw: f32,
    /// Elevation, radians
    pub pitch: f32,
    pub distance: f32,
    pub yfov: f32,
    pub znear: f32,
    pub zfar: f32,
    /// Radians per input unit
    pub orbit_speed: f32,
    /// World units per input unit
    pub pan_speed: f32,
    /// Zoom exponent change per input unit
    pub zoom_factor: f32,
    base_distance: f32,
    zoom_exponent: f32,
}

impl Default for UserCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            distance: 1.0,
            yfov: 45f32.to_radians(),
            znear: 0.01,
            zfar: 100.0,
            orbit_speed: 1.0 / 180.0,
            pan_speed: 1.0,
            zoom_factor: 0.04,
            base_distance: 1.0,
            zoom_exponent: 0.0,
        }
    }
}

impl UserCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit vector from the target towards the eye
    fn orbit_direction(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    pub fn position(&self) -> Vec3 {
        self.target + self.orbit_direction() * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        math::look_at(self.position(), self.target, Vec3::Y)
    }

    /// Camera-to-world transform
    pub fn world_transform(&self) -> Mat4 {
        math::invert(&self.view_matrix()).unwrap_or(Mat4::IDENTITY)
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        math::perspective(self.yfov, aspect_ratio, self.znear, Some(self.zfar))
    }

    /// Rotate around the target
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * self.orbit_speed;
        self.pitch = (self.pitch + dy * self.orbit_speed).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Move the target in the view plane
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let world = self.world_transform();
        let right = world.x_axis.truncate();
        let up = world.y_axis.truncate();
        self.target += (right * -dx + up * dy) * self.pan_speed;
    }

    /// Exponential zoom relative to the fitted distance
    pub fn zoom_by(&mut self, delta: f32) {
        self.zoom_exponent =
            (self.zoom_exponent + delta * self.zoom_factor).clamp(MIN_ZOOM_EXPONENT, MAX_ZOOM_EXPONENT);
        self.distance = self.base_distance * 2f32.powf(self.zoom_exponent);
    }

    /// Frame the accessor bounds of `scene`; leaves the camera unchanged for empty scenes
    pub fn fit_view_to_scene(&mut self, gltf: &Gltf, scene: usize, aspect_ratio: f32) {
        let Some((min, max)) = gltf.scene_bounds(scene) else {
            tracing::debug!("Scene {} has no bounds to fit", scene);
            return;
        };
        self.fit_to_extents(min, max, aspect_ratio);
    }

    pub fn fit_to_extents(&mut self, min: Vec3, max: Vec3, aspect_ratio: f32) {
        self.target = (min + max) * 0.5;

        let extent = max - min;
        let max_axis = extent.x.max(extent.y);
        let xfov = self.yfov * aspect_ratio;
        let y_zoom = max_axis / 2.0 / (self.yfov / 2.0).tan();
        let x_zoom = max_axis / 2.0 / (xfov / 2.0).tan();
        // Flat extents still need room in front of the geometry
        self.distance = y_zoom.max(x_zoom).max(extent.z).max(f32::EPSILON);
        self.base_distance = self.distance;
        self.zoom_exponent = 0.0;

        let diagonal = min.distance(max);
        let reach = 10.0 * diagonal * 0.6;
        self.zfar = (self.distance + reach).max(f32::EPSILON);
        self.znear = (self.distance - reach).max(self.zfar / 10_000.0);
        self.pan_speed = diagonal / PAN_SPEED_DENOMINATOR;
    }

    /// Equivalent glTF perspective camera (placed by [`Self::world_transform`])
    pub fn to_gltf_camera(&self) -> Camera {
        let mut camera = Camera::perspective(self.yfov, self.znear, Some(self.zfar));
        camera.name = Some("user camera".to_string());
        camera
    }
}
