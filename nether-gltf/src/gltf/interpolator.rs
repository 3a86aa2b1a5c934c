//! Keyframe interpolation
//!
//! Each channel owns an [`Interpolator`] that remembers the last bracketing
//! keyframe, so forward playback resolves keys without rescanning. Querying an
//! earlier time than the previous query restarts the scan from the first key.

use glam::Quat;
use serde::{Deserialize, Serialize};

use crate::math;

/// Channel sampler interpolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    #[serde(rename = "LINEAR")]
    Linear,
    #[serde(rename = "STEP")]
    Step,
    #[serde(rename = "CUBICSPLINE")]
    CubicSpline,
}

/// Animated node property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

/// Memoized keyframe search state for one channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpolator {
    prev_key: usize,
    prev_t: f32,
}

fn segment(output: &[f32], start: usize, len: usize) -> Option<&[f32]> {
    output.get(start..start + len)
}

fn quat(values: &[f32]) -> Quat {
    Quat::from_xyzw(values[0], values[1], values[2], values[3])
}

/// Hermite spline over one component group.
///
/// Output is laid out per key as `[in tangent, value, out tangent]`, each `stride` wide.
fn cubic_spline(
    output: &[f32],
    prev_key: usize,
    next_key: usize,
    key_delta: f32,
    t: f32,
    stride: usize,
) -> Option<Vec<f32>> {
    let prev = prev_key * stride * 3;
    let next = next_key * stride * 3;
    let (in_tangent, value, out_tangent) = (0, stride, 2 * stride);

    let t2 = t * t;
    let t3 = t2 * t;

    (0..stride)
        .map(|i| {
            let v0 = *output.get(prev + value + i)?;
            let b = key_delta * output.get(prev + out_tangent + i)?;
            let v1 = *output.get(next + value + i)?;
            let a = key_delta * output.get(next + in_tangent + i)?;
            Some(
                (2.0 * t3 - 3.0 * t2 + 1.0) * v0
                    + (t3 - 2.0 * t2 + t) * b
                    + (-2.0 * t3 + 3.0 * t2) * v1
                    + (t3 - t2) * a,
            )
        })
        .collect()
}

impl Interpolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the memoized keyframe
    pub fn reset(&mut self) {
        self.prev_key = 0;
        self.prev_t = 0.0;
    }

    /// Sample `output` at time `t`.
    ///
    /// Returns `None` when there is no time (no running timer) or the data is
    /// too short; the caller keeps the authored value in that case.
    pub fn interpolate(
        &mut self,
        input: &[f32],
        output: &[f32],
        interpolation: Interpolation,
        path: TargetPath,
        stride: usize,
        t: Option<f32>,
        max_time: f32,
    ) -> Option<Vec<f32>> {
        let t = t?;
        if input.is_empty() || stride == 0 {
            return None;
        }

        let value_offset = match interpolation {
            Interpolation::CubicSpline => stride,
            _ => 0,
        };
        let key_width = match interpolation {
            Interpolation::CubicSpline => stride * 3,
            _ => stride,
        };

        if input.len() == 1 {
            return segment(output, value_offset, stride).map(<[f32]>::to_vec);
        }

        let mut t = if max_time > 0.0 { t.rem_euclid(max_time) } else { t };
        let last = input.len() - 1;
        t = t.clamp(input[0], input[last]);

        if self.prev_t > t {
            self.prev_key = 0;
        }
        self.prev_t = t;

        let mut next_key = last;
        for (i, &time) in input.iter().enumerate().skip(self.prev_key) {
            if t <= time {
                next_key = i;
                break;
            }
        }
        let next_key = next_key.clamp(1, last);
        self.prev_key = next_key - 1;
        let prev_key = self.prev_key;

        let key_delta = input[next_key] - input[prev_key];
        let tn = if key_delta > 0.0 {
            (t - input[prev_key]) / key_delta
        } else {
            0.0
        };

        match (path, interpolation) {
            (_, Interpolation::Step) => {
                segment(output, prev_key * key_width + value_offset, stride).map(<[f32]>::to_vec)
            }
            (TargetPath::Rotation, Interpolation::CubicSpline) => {
                let result = cubic_spline(output, prev_key, next_key, key_delta, tn, stride)?;
                if result.len() < 4 {
                    return None;
                }
                Some(quat(&result).normalize().to_array().to_vec())
            }
            (TargetPath::Rotation, Interpolation::Linear) => {
                let q0 = quat(segment(output, prev_key * 4, 4)?);
                let q1 = quat(segment(output, next_key * 4, 4)?);
                Some(math::slerp(q0, q1, tn).to_array().to_vec())
            }
            (_, Interpolation::CubicSpline) => {
                cubic_spline(output, prev_key, next_key, key_delta, tn, stride)
            }
            (_, Interpolation::Linear) => {
                let a = segment(output, prev_key * stride, stride)?;
                let b = segment(output, next_key * stride, stride)?;
                Some(
                    a.iter()
                        .zip(b)
                        .map(|(a, b)| a * (1.0 - tn) + b * tn)
                        .collect(),
                )
            }
        }
    }
}
