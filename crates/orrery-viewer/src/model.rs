//! GPU-side mesh: buffers, pipeline, and per-frame draw.
//!
//! GPU resources are created lazily on the first frame, once a device exists;
//! the CPU mesh is owned from construction.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use orrery_engine::core::RenderCtx;

use crate::camera::Camera;
use crate::loader::{Mesh, MeshVertex};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
}

impl MeshVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[derive(Debug)]
struct ModelGpu {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    camera_ubo: wgpu::Buffer,
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
    index_count: u32,
    surface_format: wgpu::TextureFormat,
}

/// The loaded renderable model.
#[derive(Debug)]
pub struct Model {
    mesh: Mesh,
    gpu: Option<ModelGpu>,
}

impl Model {
    pub fn new(mesh: Mesh) -> Self {
        Self { mesh, gpu: None }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Draws the mesh with the camera's current matrices.
    pub fn draw(&mut self, ctx: &RenderCtx<'_>, rpass: &mut wgpu::RenderPass<'_>, camera: &Camera) {
        self.ensure_gpu(ctx);

        let Some(gpu) = self.gpu.as_ref() else { return };

        let uniform = CameraUniform {
            view_proj: camera.view_projection().into(),
            view: camera.view_matrix().into(),
        };
        ctx.queue
            .write_buffer(&gpu.camera_ubo, 0, bytemuck::bytes_of(&uniform));

        rpass.set_pipeline(&gpu.pipeline);
        rpass.set_bind_group(0, &gpu.bind_group, &[]);
        rpass.set_vertex_buffer(0, gpu.vbo.slice(..));
        rpass.set_index_buffer(gpu.ibo.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..gpu.index_count, 0, 0..1);
    }

    fn ensure_gpu(&mut self, ctx: &RenderCtx<'_>) {
        if let Some(gpu) = &self.gpu {
            if gpu.surface_format == ctx.surface_format {
                return;
            }
        }

        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("orrery model shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/model.wgsl").into()),
        });

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("orrery model bgl"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: camera_ubo_min_binding_size(),
                        },
                        count: None,
                    }],
                });

        let pipeline_layout =
            ctx.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("orrery model pipeline layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    immediate_size: 0,
                });

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("orrery model pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[MeshVertex::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // STL winding is unreliable; shade both faces instead of culling.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: ctx.depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        let camera_ubo = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("orrery camera ubo"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("orrery model bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_ubo.as_entire_binding(),
            }],
        });

        let vbo = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("orrery model vbo"),
                contents: bytemuck::cast_slice(&self.mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let ibo = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("orrery model ibo"),
                contents: bytemuck::cast_slice(&self.mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        log::debug!(
            "model pipeline ready: {} triangles, format {:?}",
            self.mesh.triangle_count(),
            ctx.surface_format
        );

        self.gpu = Some(ModelGpu {
            pipeline,
            bind_group,
            camera_ubo,
            vbo,
            ibo,
            index_count: self.mesh.indices.len() as u32,
            surface_format: ctx.surface_format,
        });
    }
}

/// `CameraUniform` holds two mat4s (128 bytes), so its size is non-zero.
fn camera_ubo_min_binding_size() -> Option<std::num::NonZeroU64> {
    std::num::NonZeroU64::new(std::mem::size_of::<CameraUniform>() as u64)
}
