use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

/// Flat-shaded material: instance color is multiplied by `tint`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    pub label: String,
    pub tint: [f32; 4],
    /// Fraction of light that reaches faces turned away from the light.
    pub ambient: f32,
}

impl MaterialDesc {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tint: [1.0; 4],
            ambient: 0.25,
        }
    }

    pub fn with_tint(mut self, tint: [f32; 4]) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_ambient(mut self, ambient: f32) -> Self {
        self.ambient = ambient.clamp(0.0, 1.0);
        self
    }

    fn uniform(&self) -> MaterialUniform {
        MaterialUniform {
            tint: self.tint,
            params: [self.ambient, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct MaterialUniform {
    pub tint: [f32; 4],
    pub params: [f32; 4],
}

pub(super) struct GpuMaterial {
    // Kept alive for the bind group.
    _ubo: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl GpuMaterial {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, desc: &MaterialDesc) -> Self {
        let ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("swarm material ubo ({})", desc.label)),
            contents: bytemuck::bytes_of(&desc.uniform()),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("swarm material bind group ({})", desc.label)),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        });
        Self { _ubo: ubo, bind_group }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_is_clamped() {
        assert_eq!(MaterialDesc::new("m").with_ambient(3.0).ambient, 1.0);
        assert_eq!(MaterialDesc::new("m").with_ambient(-1.0).ambient, 0.0);
    }

    #[test]
    fn uniform_packs_ambient_in_params() {
        let u = MaterialDesc::new("m").with_tint([0.5, 0.25, 1.0, 1.0]).with_ambient(0.4).uniform();
        assert_eq!(u.tint, [0.5, 0.25, 1.0, 1.0]);
        assert_eq!(u.params[0], 0.4);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 32);
    }
}
