//! KHR_lights_punctual lights

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::shader::UniformValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

impl LightType {
    /// Matches the `LightType_*` constants in the fragment shader
    fn shader_value(self) -> i32 {
        match self {
            LightType::Directional => 0,
            LightType::Point => 1,
            LightType::Spot => 2,
        }
    }
}

fn outer_cone() -> f32 {
    std::f32::consts::FRAC_PI_4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    #[serde(default)]
    pub inner_cone_angle: f32,
    #[serde(default = "outer_cone")]
    pub outer_cone_angle: f32,
}

impl Default for Spot {
    fn default() -> Self {
        Self {
            inner_cone_angle: 0.0,
            outer_cone_angle: outer_cone(),
        }
    }
}

fn white() -> [f32; 3] {
    [1.0; 3]
}

fn unit() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    #[serde(rename = "type")]
    pub ty: LightType,
    #[serde(default = "white")]
    pub color: [f32; 3],
    #[serde(default = "unit")]
    pub intensity: f32,
    /// Absent means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot: Option<Spot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Node carrying this light, resolved on load
    #[serde(skip)]
    pub node: Option<usize>,
}

impl Light {
    pub fn directional(color: [f32; 3], intensity: f32) -> Self {
        Self {
            ty: LightType::Directional,
            color,
            intensity,
            range: None,
            spot: None,
            name: None,
            node: None,
        }
    }

    /// `u_Lights[i]` struct value for a light placed by `world`
    pub fn to_uniform(&self, world: &Mat4) -> UniformValue {
        let direction = world
            .transform_vector3(Vec3::NEG_Z)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z);
        let position = world.w_axis.truncate();
        let spot = self.spot.clone().unwrap_or_default();

        UniformValue::structure([
            ("direction", UniformValue::Vec3(direction)),
            ("range", UniformValue::Float(self.range.unwrap_or(-1.0))),
            ("color", UniformValue::Vec3(Vec3::from(self.color))),
            ("intensity", UniformValue::Float(self.intensity)),
            ("position", UniformValue::Vec3(position)),
            ("innerConeCos", UniformValue::Float(spot.inner_cone_angle.cos())),
            ("outerConeCos", UniformValue::Float(spot.outer_cone_angle.cos())),
            ("type", UniformValue::Int(self.ty.shader_value())),
        ])
    }
}

/// Key and fill directional lights used when a scene has no lights and IBL is off
pub fn fallback_lights() -> [(Light, Mat4); 2] {
    let key = Mat4::from_quat(
        Quat::from_rotation_y(std::f32::consts::FRAC_PI_4) * Quat::from_rotation_x(-0.6154797),
    );
    let fill = Mat4::from_quat(
        Quat::from_rotation_y(-3.0 * std::f32::consts::FRAC_PI_4) * Quat::from_rotation_x(0.6154797),
    );
    [
        (Light::directional([1.0; 3], 1.0), key),
        (Light::directional([1.0; 3], 0.5), fill),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member<'a>(value: &'a UniformValue, name: &str) -> &'a UniformValue {
        match value {
            UniformValue::Struct(members) => &members.iter().find(|(n, _)| n == name).unwrap().1,
            _ => panic!("not a struct"),
        }
    }

    #[test]
    fn spot_light_uniform() {
        let light: Light = serde_json::from_str(
            r#"{ "type": "spot", "intensity": 5, "spot": { "outerConeAngle": 0.5 } }"#,
        )
        .unwrap();
        let value = light.to_uniform(&Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)));

        assert_eq!(member(&value, "type"), &UniformValue::Int(2));
        assert_eq!(member(&value, "range"), &UniformValue::Float(-1.0));
        assert_eq!(member(&value, "position"), &UniformValue::Vec3(Vec3::new(0.0, 3.0, 0.0)));
        assert_eq!(member(&value, "innerConeCos"), &UniformValue::Float(1.0));
        assert_eq!(member(&value, "outerConeCos"), &UniformValue::Float(0.5f32.cos()));
        assert_eq!(member(&value, "direction"), &UniformValue::Vec3(Vec3::NEG_Z));
    }

    #[test]
    fn fallback_key_light_points_down_and_fill_opposes_it() {
        let [(key, key_world), (fill, fill_world)] = fallback_lights();
        assert_eq!(key.ty, LightType::Directional);
        assert!(fill.intensity < key.intensity);
        let key_dir = key_world.transform_vector3(Vec3::NEG_Z);
        let fill_dir = fill_world.transform_vector3(Vec3::NEG_Z);
        assert!(key_dir.y < 0.0);
        assert!(key_dir.dot(fill_dir) < 0.0);
    }
}
