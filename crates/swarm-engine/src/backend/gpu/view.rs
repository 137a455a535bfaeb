use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Camera and per-frame visibility settings for [`WgpuBackend::render_frame`].
///
/// [`WgpuBackend::render_frame`]: super::WgpuBackend::render_frame
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct View {
    pub view_proj: Mat4,
    /// Direction the light travels, world space.
    pub light_dir: Vec3,
    /// Ranges whose layer mask shares no bit with this are skipped.
    pub culling_mask: u32,
    pub clear_color: wgpu::Color,
}

impl View {
    /// Right-handed perspective camera looking from `eye` at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y_radians: f32, aspect: f32) -> Self {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let proj = Mat4::perspective_rh(fov_y_radians, aspect.max(1e-3), 0.1, 1000.0);
        Self {
            view_proj: proj * view,
            ..Self::default()
        }
    }

    pub fn with_culling_mask(mut self, mask: u32) -> Self {
        self.culling_mask = mask;
        self
    }

    pub fn with_clear_color(mut self, color: wgpu::Color) -> Self {
        self.clear_color = color;
        self
    }

    #[inline]
    pub fn accepts_layer(&self, layer_mask: u32) -> bool {
        self.culling_mask & layer_mask != 0
    }

    pub(super) fn uniform(&self) -> CameraUniform {
        let l = self.light_dir.normalize_or_zero();
        CameraUniform {
            view_proj: self.view_proj.to_cols_array_2d(),
            light_dir: [l.x, l.y, l.z, 0.0],
        }
    }
}

impl Default for View {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY,
            light_dir: Vec3::new(-0.4, -1.0, -0.3),
            culling_mask: u32::MAX,
            clear_color: wgpu::Color {
                r: 0.02,
                g: 0.02,
                b: 0.03,
                a: 1.0,
            },
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub light_dir: [f32; 4],
}
