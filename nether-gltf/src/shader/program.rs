//! Linked shader programs
//!
//! Holds the introspected uniform and attribute tables of one program and
//! uploads [`UniformValue`]s by name. Unknown names are reported once per
//! program and otherwise ignored.

use hashbrown::{HashMap, HashSet};

use super::uniform::{Flat, UniformValue};
use crate::gpu::{ActiveUniform, GpuDevice, ProgramHandle, UniformData};

pub struct ShaderProgram {
    handle: ProgramHandle,
    uniforms: HashMap<String, ActiveUniform>,
    attributes: HashMap<String, u32>,
    warned: HashSet<String>,
}

impl ShaderProgram {
    /// Introspect a freshly linked program.
    ///
    /// Array uniforms are reported as `name[0]`; they are also registered under
    /// `name` so whole arrays can be uploaded in one call.
    pub fn new(device: &dyn GpuDevice, handle: ProgramHandle) -> Self {
        let mut uniforms = HashMap::new();
        for uniform in device.active_uniforms(handle) {
            if let Some(base) = uniform.name.strip_suffix("[0]") {
                uniforms.insert(base.to_string(), uniform.clone());
            }
            uniforms.insert(uniform.name.clone(), uniform);
        }

        let attributes = device
            .active_attributes(handle)
            .into_iter()
            .map(|a| (a.name, a.location))
            .collect();

        Self {
            handle,
            uniforms,
            attributes,
            warned: HashSet::new(),
        }
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn uniform(&self, name: &str) -> Option<&ActiveUniform> {
        self.uniforms.get(name)
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    /// Attribute location, reporting unknown names once
    pub fn attribute_location(&mut self, name: &str) -> Option<u32> {
        let location = self.attributes.get(name).copied();
        if location.is_none() {
            self.warn_once(name, "Attribute");
        }
        location
    }

    /// Attribute location without reporting
    pub fn try_attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    fn warn_once(&mut self, name: &str, kind: &str) {
        if self.warned.insert(name.to_string()) {
            tracing::warn!("{} '{}' not found in program {}", kind, name, self.handle.0);
        }
    }

    /// Upload `value` to the uniform `name`.
    ///
    /// Structs recurse into `name.member`; arrays of structs into `name[i]`;
    /// any other array is flattened and uploaded as one block.
    pub fn upload_uniform(&mut self, device: &mut dyn GpuDevice, name: &str, value: &UniformValue) {
        match value {
            UniformValue::Struct(members) => {
                for (member, member_value) in members {
                    self.upload_uniform(device, &format!("{}.{}", name, member), member_value);
                }
            }
            UniformValue::Array(items) if items.first().is_some_and(UniformValue::is_struct) => {
                for (i, item) in items.iter().enumerate() {
                    self.upload_uniform(device, &format!("{}[{}]", name, i), item);
                }
            }
            _ => {
                let Some((location, ty)) = self.uniforms.get(name).map(|u| (u.location, u.ty)) else {
                    self.warn_once(name, "Uniform");
                    return;
                };
                let Some(flat) = value.flatten() else {
                    tracing::warn!("Uniform '{}' has a value that cannot be flattened", name);
                    return;
                };
                match (ty.is_integer(), flat) {
                    (true, Flat::Int(v)) => device.set_uniform(location, ty, UniformData::Int(&v)),
                    (true, Flat::Float(v)) => {
                        let v: Vec<i32> = v.into_iter().map(|f| f as i32).collect();
                        device.set_uniform(location, ty, UniformData::Int(&v));
                    }
                    (false, Flat::Float(v)) => device.set_uniform(location, ty, UniformData::Float(&v)),
                    (false, Flat::Int(v)) => {
                        let v: Vec<f32> = v.into_iter().map(|i| i as f32).collect();
                        device.set_uniform(location, ty, UniformData::Float(&v));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCommand, HeadlessDevice, ShaderStage, UniformType};
    use glam::Vec3;

    const VERTEX: &str = "in vec3 a_position;
uniform mat4 u_ModelMatrix;
uniform float u_morphWeights[2];
void main() {}
";

    const FRAGMENT: &str = "struct Light {
    vec3 color;
    int type;
};
uniform Light u_Lights[2];
uniform sampler2D u_BaseColorSampler;
void main() {}
";

    fn program(device: &mut HeadlessDevice) -> ShaderProgram {
        let vs = device.compile_shader(ShaderStage::Vertex, VERTEX).unwrap();
        let fs = device.compile_shader(ShaderStage::Fragment, FRAGMENT).unwrap();
        let handle = device.link_program(vs, fs).unwrap();
        ShaderProgram::new(device, handle)
    }

    fn uploads(device: &HeadlessDevice) -> Vec<(UniformType, Vec<f32>)> {
        device
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::SetUniform { ty, values, .. } => Some((*ty, values.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn array_base_name_is_registered() {
        let mut device = HeadlessDevice::new();
        let mut program = program(&mut device);
        assert!(program.has_uniform("u_morphWeights"));
        program.upload_uniform(&mut device, "u_morphWeights", &UniformValue::FloatArray(vec![0.25, 0.75]));
        assert_eq!(uploads(&device), vec![(UniformType::Float, vec![0.25, 0.75])]);
    }

    #[test]
    fn struct_arrays_recurse_per_member() {
        let mut device = HeadlessDevice::new();
        let mut program = program(&mut device);
        let light = |r: f32| {
            UniformValue::structure([
                ("color", UniformValue::Vec3(Vec3::new(r, 0.0, 0.0))),
                ("type", UniformValue::Int(1)),
            ])
        };
        program.upload_uniform(&mut device, "u_Lights", &UniformValue::Array(vec![light(1.0), light(2.0)]));

        let uploads = uploads(&device);
        assert_eq!(uploads.len(), 4);
        assert_eq!(uploads[2], (UniformType::Vec3, vec![2.0, 0.0, 0.0]));
        assert_eq!(uploads[3], (UniformType::Int, vec![1.0]));
    }

    #[test]
    fn sampler_units_go_through_integer_path() {
        let mut device = HeadlessDevice::new();
        let mut program = program(&mut device);
        program.upload_uniform(&mut device, "u_BaseColorSampler", &UniformValue::Float(3.0));
        assert_eq!(uploads(&device), vec![(UniformType::Sampler2D, vec![3.0])]);
    }

    #[test]
    fn unknown_names_are_skipped() {
        let mut device = HeadlessDevice::new();
        let mut program = program(&mut device);
        program.upload_uniform(&mut device, "u_Missing", &UniformValue::Float(1.0));
        program.upload_uniform(&mut device, "u_Missing", &UniformValue::Float(1.0));
        assert!(uploads(&device).is_empty());
        assert_eq!(program.warned.len(), 1);
        assert_eq!(program.attribute_location("a_position"), Some(0));
        assert_eq!(program.attribute_location("a_normal"), None);
    }
}
