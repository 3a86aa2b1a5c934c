//! Viewer state
//!
//! Everything a frame depends on: the loaded asset, its environment, which
//! scene/camera/animations/variant are active, and the rendering parameters.

use std::time::Instant;

use glam::Mat4;

use crate::config::RenderingParameters;
use crate::gltf::Gltf;
use crate::gpu::GpuDevice;
use crate::ibl::Environment;
use crate::user_camera::UserCamera;

/// Wall-clock animation time.
///
/// `elapsed_secs` is `None` until the timer is started; a fixed time
/// overrides the clock while set.
#[derive(Debug, Clone, Default)]
pub struct AnimationTimer {
    started_at: Option<Instant>,
    /// Time accumulated before the last pause or resume
    accumulated: f32,
    paused: bool,
    fixed_time: Option<f32>,
}

impl AnimationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds of animation time, `None` when no timer is active
    pub fn elapsed_secs(&self) -> Option<f32> {
        if let Some(fixed) = self.fixed_time {
            return Some(fixed);
        }
        match self.started_at {
            Some(start) if !self.paused => Some(self.accumulated + start.elapsed().as_secs_f32()),
            Some(_) => Some(self.accumulated),
            None if self.paused => Some(self.accumulated),
            None => None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Start (or restart) from zero
    pub fn start(&mut self) {
        self.accumulated = 0.0;
        self.paused = false;
        self.started_at = Some(Instant::now());
    }

    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        if let Some(start) = self.started_at.take() {
            self.accumulated += start.elapsed().as_secs_f32();
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.started_at = Some(Instant::now());
    }

    pub fn toggle(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Stop and forget elapsed time
    pub fn reset(&mut self) {
        *self = Self {
            fixed_time: self.fixed_time,
            ..Self::default()
        };
    }

    /// Pin animation time, or return to the clock with `None`
    pub fn set_fixed_time(&mut self, time: Option<f32>) {
        self.fixed_time = time;
    }
}

/// State rendered by [`GltfView`](crate::view::GltfView)
#[derive(Debug, Default)]
pub struct GltfState {
    pub(crate) gltf: Option<Gltf>,
    /// Bumped whenever the asset is replaced
    generation: u64,
    pub environment: Option<Environment>,
    pub user_camera: UserCamera,
    pub scene_index: usize,
    /// glTF camera to view through; `None` selects the user camera
    pub camera_index: Option<usize>,
    pub animation_indices: Vec<usize>,
    pub animation_timer: AnimationTimer,
    /// Active `KHR_materials_variants` name
    pub variant: Option<String>,
    pub rendering_parameters: RenderingParameters,
}

impl GltfState {
    pub fn new(rendering_parameters: RenderingParameters) -> Self {
        Self {
            rendering_parameters,
            ..Self::default()
        }
    }

    pub fn gltf(&self) -> Option<&Gltf> {
        self.gltf.as_ref()
    }

    pub fn gltf_mut(&mut self) -> Option<&mut Gltf> {
        self.gltf.as_mut()
    }

    /// Identifies the current asset for GPU resource caches
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the asset and reset scene, camera, animation and variant selection
    pub fn set_gltf(&mut self, mut gltf: Gltf, aspect_ratio: f32) {
        self.scene_index = gltf.default_scene();
        if self.scene_index < gltf.scenes.len() {
            gltf.apply_transform_hierarchy(self.scene_index, Mat4::IDENTITY);
        }
        self.camera_index = None;
        self.animation_indices = (0..gltf.animations.len()).collect();
        self.variant = None;
        self.user_camera = UserCamera::new();
        self.user_camera
            .fit_view_to_scene(&gltf, self.scene_index, aspect_ratio);
        self.gltf = Some(gltf);
        self.generation += 1;
    }

    /// Drop the asset
    pub fn clear_gltf(&mut self) -> Option<Gltf> {
        self.generation += 1;
        self.animation_indices.clear();
        self.gltf.take()
    }

    /// Replace the environment, releasing the old one's textures
    pub fn set_environment(&mut self, device: &mut dyn GpuDevice, environment: Option<Environment>) {
        if let Some(old) = std::mem::replace(&mut self.environment, environment) {
            old.destroy(device);
        }
    }

    /// Active variant id, if the name matches one of the asset's variants
    pub fn active_variant(&self) -> Option<usize> {
        let name = self.variant.as_deref()?;
        let index = self.gltf.as_ref()?.variant_index(name);
        if index.is_none() {
            tracing::warn!("Variant '{}' does not exist", name);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_is_inactive_until_started() {
        let mut timer = AnimationTimer::new();
        assert_eq!(timer.elapsed_secs(), None);
        timer.start();
        assert!(timer.elapsed_secs().is_some());
    }

    #[test]
    fn paused_timer_holds_time() {
        let mut timer = AnimationTimer::new();
        timer.start();
        timer.pause();
        let held = timer.elapsed_secs().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(timer.elapsed_secs(), Some(held));
        timer.resume();
        assert!(timer.elapsed_secs().unwrap() >= held);
    }

    #[test]
    fn fixed_time_overrides_clock() {
        let mut timer = AnimationTimer::new();
        timer.set_fixed_time(Some(1.25));
        assert_eq!(timer.elapsed_secs(), Some(1.25));
        timer.reset();
        assert_eq!(timer.elapsed_secs(), Some(1.25));
        timer.set_fixed_time(None);
        assert_eq!(timer.elapsed_secs(), None);
    }

    #[test]
    fn set_gltf_selects_defaults() {
        let json = br#"{
            "asset": { "version": "2.0" },
            "scene": 1,
            "scenes": [ {}, {} ],
            "extensions": { "KHR_materials_variants": { "variants": [ { "name": "red" } ] } }
        }"#;
        let mut gltf = Gltf::from_json_slice(json).unwrap();
        gltf.initialize();

        let mut state = GltfState::new(RenderingParameters::default());
        state.variant = Some("blue".into());
        state.set_gltf(gltf, 1.0);
        assert_eq!(state.scene_index, 1);
        assert_eq!(state.generation(), 1);
        assert_eq!(state.variant, None);

        state.variant = Some("red".into());
        assert_eq!(state.active_variant(), Some(0));
        state.variant = Some("green".into());
        assert_eq!(state.active_variant(), None);
    }
}
