//! Animations
//!
//! Evaluation writes into node animation overrides; it must run before the
//! transform hierarchy pass of the same frame.

use glam::{Quat, Vec3};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use super::interpolator::{Interpolation, Interpolator, TargetPath};
use super::{Accessor, Buffer, BufferView, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<usize>,
    pub path: TargetPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationChannel {
    pub sampler: usize,
    pub target: ChannelTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationSampler {
    pub input: usize,
    pub output: usize,
    #[serde(default)]
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Animation {
    pub channels: Vec<AnimationChannel>,
    pub samplers: Vec<AnimationSampler>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Largest input time over all samplers
    #[serde(skip)]
    pub max_time: f32,
    /// Other animations that animate no common (node, path) pair
    #[serde(skip)]
    pub disjoint_animations: Vec<usize>,
    #[serde(skip)]
    interpolators: Vec<Interpolator>,
}

impl Animation {
    /// Compute `max_time` and reset per-channel interpolators
    pub fn initialize(&mut self, accessors: &[Accessor], views: &[BufferView], buffers: &[Buffer]) {
        self.max_time = self
            .samplers
            .iter()
            .filter_map(|s| accessors.get(s.input))
            .filter_map(|a| a.read_f32(views, buffers).last().copied())
            .fold(0.0, f32::max);
        self.interpolators = vec![Interpolator::new(); self.channels.len()];
    }

    /// (node, path) pairs this animation writes
    pub fn targets(&self) -> HashSet<(usize, TargetPath)> {
        self.channels
            .iter()
            .filter_map(|c| c.target.node.map(|n| (n, c.target.path)))
            .collect()
    }

    /// Sample every channel at `t` and write node overrides.
    ///
    /// With `t == None` nothing is written and authored values stay in effect.
    pub fn advance(
        &mut self,
        accessors: &[Accessor],
        views: &[BufferView],
        buffers: &[Buffer],
        nodes: &mut [Node],
        t: Option<f32>,
    ) {
        if self.interpolators.len() != self.channels.len() {
            self.interpolators = vec![Interpolator::new(); self.channels.len()];
        }

        for (channel, interpolator) in self.channels.iter().zip(self.interpolators.iter_mut()) {
            let Some(node_index) = channel.target.node else {
                continue;
            };
            let Some(sampler) = self.samplers.get(channel.sampler) else {
                tracing::warn!("Animation channel references missing sampler {}", channel.sampler);
                continue;
            };
            let (Some(input), Some(output)) = (accessors.get(sampler.input), accessors.get(sampler.output)) else {
                tracing::warn!("Animation sampler references missing accessors");
                continue;
            };
            let input = input.read_f32(views, buffers);
            let output = output.read_f32(views, buffers);

            let stride = match channel.target.path {
                TargetPath::Translation | TargetPath::Scale => 3,
                TargetPath::Rotation => 4,
                TargetPath::Weights => {
                    let per_key = match sampler.interpolation {
                        Interpolation::CubicSpline => 3,
                        _ => 1,
                    };
                    if input.is_empty() {
                        0
                    } else {
                        output.len() / input.len() / per_key
                    }
                }
            };

            let Some(value) = interpolator.interpolate(
                &input,
                &output,
                sampler.interpolation,
                channel.target.path,
                stride,
                t,
                self.max_time,
            ) else {
                continue;
            };

            let Some(node) = nodes.get_mut(node_index) else {
                tracing::warn!("Animation targets missing node {}", node_index);
                continue;
            };
            match channel.target.path {
                TargetPath::Translation => node.apply_animation_translation(Vec3::from_slice(&value)),
                TargetPath::Rotation => node.apply_animation_rotation(Quat::from_slice(&value)),
                TargetPath::Scale => node.apply_animation_scale(Vec3::from_slice(&value)),
                TargetPath::Weights => node.animation_weights = Some(value),
            }
        }
    }

    /// Restart keyframe searches from the first key
    pub fn reset(&mut self) {
        self.interpolators.iter_mut().for_each(Interpolator::reset);
    }
}

/// For each animation, the other animations sharing no (node, path) target
pub fn compute_disjoint_animations(animations: &[Animation]) -> Vec<Vec<usize>> {
    let targets: Vec<HashSet<(usize, TargetPath)>> = animations.iter().map(Animation::targets).collect();
    (0..animations.len())
        .map(|i| {
            (0..animations.len())
                .filter(|&j| j != i && targets[i].is_disjoint(&targets[j]))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::{AccessorType, ComponentType};

    fn channel(node: usize, path: TargetPath) -> AnimationChannel {
        AnimationChannel {
            sampler: 0,
            target: ChannelTarget {
                node: Some(node),
                path,
            },
        }
    }

    #[test]
    fn disjoint_sets_exclude_self_and_conflicts() {
        let a = Animation {
            channels: vec![channel(0, TargetPath::Translation)],
            ..Default::default()
        };
        let b = Animation {
            channels: vec![channel(0, TargetPath::Rotation)],
            ..Default::default()
        };
        let c = Animation {
            channels: vec![channel(0, TargetPath::Translation), channel(1, TargetPath::Scale)],
            ..Default::default()
        };
        let disjoint = compute_disjoint_animations(&[a, b, c]);
        assert_eq!(disjoint[0], vec![1]);
        assert_eq!(disjoint[1], vec![0, 2]);
        assert_eq!(disjoint[2], vec![1]);
    }

    #[test]
    fn advance_writes_translation_override() {
        let mut data: Vec<u8> = [0.0f32, 1.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        data.extend(
            [0.0f32, 0.0, 0.0, 10.0, 0.0, 0.0]
                .iter()
                .flat_map(|v| v.to_le_bytes()),
        );
        let buffers = vec![Buffer {
            byte_length: data.len(),
            data,
            ..Default::default()
        }];
        let views = vec![
            BufferView { buffer: 0, byte_offset: 0, byte_length: 8, ..Default::default() },
            BufferView { buffer: 0, byte_offset: 8, byte_length: 24, ..Default::default() },
        ];
        let accessors = vec![
            Accessor::new(Some(0), ComponentType::Float, 2, AccessorType::Scalar),
            Accessor::new(Some(1), ComponentType::Float, 2, AccessorType::Vec3),
        ];

        let mut animation = Animation {
            channels: vec![channel(0, TargetPath::Translation)],
            samplers: vec![AnimationSampler {
                input: 0,
                output: 1,
                interpolation: Interpolation::Linear,
            }],
            ..Default::default()
        };
        animation.initialize(&accessors, &views, &buffers);
        assert_eq!(animation.max_time, 1.0);

        let mut nodes = vec![Node::default()];
        animation.advance(&accessors, &views, &buffers, &mut nodes, None);
        assert!(nodes[0].animation_translation.is_none());

        animation.advance(&accessors, &views, &buffers, &mut nodes, Some(0.5));
        assert_eq!(nodes[0].animation_translation, Some(Vec3::new(5.0, 0.0, 0.0)));
    }
}
