//! The render pipeline [`GpuInstancePass`](crate::rendering::GpuInstancePass)
//! draws with.
//!
//! Group 0 holds the camera, group 1 the material of the sub-mesh being drawn.

use crate::assets::VisualVertex;
use crate::rendering::instance_descriptor;
use bon::Builder;
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Vector4};
use std::borrow::Cow;
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, BlendState, Buffer, BufferBindingType, BufferUsages,
    ColorTargetState, ColorWrites, CompareFunction, DepthBiasState, DepthStencilState, Device,
    Face, FragmentState, MultisampleState, PipelineCompilationOptions, PipelineLayoutDescriptor,
    PrimitiveState, PrimitiveTopology, Queue, RenderPipeline, RenderPipelineDescriptor,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, StencilFaceState, StencilState,
    TextureFormat, VertexBufferLayout, VertexState,
};

pub const INSTANCING_SHADER: &str = include_str!("shaders/instancing.wgsl");

const BUFFERS: [VertexBufferLayout; 2] = [
    VisualVertex::continuous_descriptor(),
    instance_descriptor(),
];

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: Matrix4<f32>,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct MaterialUniform {
    pub color: Vector4<f32>,
}

#[derive(Debug, Clone, Builder)]
pub struct InstancePipelineOptions {
    #[builder(default = "Instanced Mesh Pipeline".to_string(), into)]
    pub label: String,
    #[builder(default = TextureFormat::Bgra8UnormSrgb)]
    pub color_format: TextureFormat,
    #[builder(default = TextureFormat::Depth32Float)]
    pub depth_format: TextureFormat,
    /// Off draws without a depth attachment.
    #[builder(default = true)]
    pub depth_test: bool,
    #[builder(default = true)]
    pub cull_back_faces: bool,
    #[builder(default = true)]
    pub alpha_blending: bool,
}

impl Default for InstancePipelineOptions {
    fn default() -> Self {
        InstancePipelineOptions::builder().build()
    }
}

impl InstancePipelineOptions {
    pub fn color_target(&self) -> ColorTargetState {
        ColorTargetState {
            format: self.color_format,
            blend: self.alpha_blending.then_some(BlendState::ALPHA_BLENDING),
            write_mask: ColorWrites::all(),
        }
    }

    pub fn depth_stencil(&self) -> Option<DepthStencilState> {
        self.depth_test.then(|| DepthStencilState {
            format: self.depth_format,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState {
                front: StencilFaceState::IGNORE,
                back: StencilFaceState::IGNORE,
                read_mask: 0,
                write_mask: 0,
            },
            bias: DepthBiasState {
                constant: 0,
                slope_scale: 0.0,
                clamp: 0.0,
            },
        })
    }

    pub fn primitive(&self) -> PrimitiveState {
        PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            cull_mode: self.cull_back_faces.then_some(Face::Back),
            ..PrimitiveState::default()
        }
    }
}

fn uniform_layout_entry(visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub struct InstancePipeline {
    pub pipeline: RenderPipeline,
    pub camera_layout: BindGroupLayout,
    pub material_layout: BindGroupLayout,
}

impl InstancePipeline {
    pub fn new(device: &Device, options: &InstancePipelineOptions) -> Self {
        let camera_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Instancing Camera Bind Group Layout"),
            entries: &[uniform_layout_entry(ShaderStages::VERTEX)],
        });
        let material_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Instancing Material Bind Group Layout"),
            entries: &[uniform_layout_entry(ShaderStages::FRAGMENT)],
        });

        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Instancing Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &material_layout],
            immediate_size: 0,
        });

        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Instancing Shader"),
            source: ShaderSource::Wgsl(Cow::Borrowed(INSTANCING_SHADER)),
        });

        let targets = [Some(options.color_target())];
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&options.label),
            layout: Some(&layout),
            vertex: VertexState {
                module: &module,
                entry_point: None,
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &BUFFERS,
            },
            primitive: options.primitive(),
            depth_stencil: options.depth_stencil(),
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                module: &module,
                entry_point: None,
                compilation_options: PipelineCompilationOptions::default(),
                targets: &targets,
            }),
            multiview_mask: None,
            cache: None,
        });

        InstancePipeline {
            pipeline,
            camera_layout,
            material_layout,
        }
    }
}

/// Camera uniform buffer and the group 0 bind group pointing at it.
pub struct CameraBinding {
    buffer: Buffer,
    pub bind_group: BindGroup,
}

impl CameraBinding {
    pub fn new(device: &Device, pipeline: &InstancePipeline, view_proj: Matrix4<f32>) -> Self {
        let buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("Instancing Camera Buffer"),
            contents: bytemuck::bytes_of(&CameraUniform { view_proj }),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Instancing Camera Bind Group"),
            layout: &pipeline.camera_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        CameraBinding { buffer, bind_group }
    }

    pub fn write(&self, queue: &Queue, view_proj: Matrix4<f32>) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&CameraUniform { view_proj }));
    }
}
