use crate::instancing::{BufferKind, FLOAT4_SIZE};

use super::material::MaterialUniform;
use super::mesh::MeshVertex;
use super::view::CameraUniform;

pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const SHADER_TEMPLATE: &str = include_str!("shaders/instanced.wgsl");

/// Everything that is baked into a pipeline's shader or state.
///
/// Bounded windows size the uniform array, so every distinct window size gets
/// its own pipeline. Storage buffers only depend on capacity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub bounded: bool,
    pub capacity: u32,
    pub window_float4s: u64,
    pub format: wgpu::TextureFormat,
}

impl PipelineKey {
    pub fn new(kind: BufferKind, capacity: u32, window_size: u64, format: wgpu::TextureFormat) -> Self {
        let bounded = kind.is_bounded();
        Self {
            bounded,
            capacity,
            window_float4s: if bounded { window_size / FLOAT4_SIZE } else { 0 },
            format,
        }
    }
}

pub(super) fn shader_source(key: &PipelineKey) -> String {
    let instances = if key.bounded {
        format!(
            "@group(1) @binding(0) var<uniform> instances: array<vec4<f32>, {}>;",
            key.window_float4s
        )
    } else {
        "@group(1) @binding(0) var<storage, read> instances: array<vec4<f32>>;".to_string()
    };
    SHADER_TEMPLATE
        .replace("{{INSTANCES}}", &instances)
        .replace("{{CAPACITY}}", &key.capacity.to_string())
}

/// Bind group layouts shared by every pipeline.
pub(super) struct Layouts {
    pub camera: wgpu::BindGroupLayout,
    pub instances_uniform: wgpu::BindGroupLayout,
    pub instances_storage: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let camera = uniform_layout(
            device,
            "swarm camera bgl",
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            wgpu::BufferSize::new(std::mem::size_of::<CameraUniform>() as u64),
        );
        let instances_uniform =
            uniform_layout(device, "swarm instance window bgl", wgpu::ShaderStages::VERTEX, None);
        let instances_storage = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("swarm instance storage bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let material = uniform_layout(
            device,
            "swarm material bgl",
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            wgpu::BufferSize::new(std::mem::size_of::<MaterialUniform>() as u64),
        );

        Self {
            camera,
            instances_uniform,
            instances_storage,
            material,
        }
    }

    pub fn instances(&self, kind: BufferKind) -> &wgpu::BindGroupLayout {
        if kind.is_bounded() {
            &self.instances_uniform
        } else {
            &self.instances_storage
        }
    }
}

fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
    min_binding_size: Option<wgpu::BufferSize>,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size,
            },
            count: None,
        }],
    })
}

/// Per-instance visibility-list entry, consumed as vertex attribute 2.
const SLOT_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Uint32];

fn slot_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<u32>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &SLOT_ATTRS,
    }
}

pub(super) fn build(device: &wgpu::Device, layouts: &Layouts, key: &PipelineKey) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("swarm instanced shader"),
        source: wgpu::ShaderSource::Wgsl(shader_source(key).into()),
    });

    let instances = if key.bounded {
        &layouts.instances_uniform
    } else {
        &layouts.instances_storage
    };

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("swarm instanced pipeline layout"),
        bind_group_layouts: &[&layouts.camera, instances, &layouts.material],
        immediate_size: 0,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("swarm instanced pipeline"),
        layout: Some(&pipeline_layout),

        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[MeshVertex::layout(), slot_layout()],
        },

        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Debris fragments are thin and tumble; draw both faces.
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),

        multiview_mask: None,
        cache: None,
    })
}
