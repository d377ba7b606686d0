//! Background gradient.
//!
//! Drawn first each frame as a full-screen triangle with depth writes off, so
//! the model always renders on top of it.

use bytemuck::{Pod, Zeroable};

use orrery_engine::core::RenderCtx;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct BackdropUniform {
    top: [f32; 4],
    bottom: [f32; 4],
}

#[derive(Debug)]
struct BackdropGpu {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    ubo: wgpu::Buffer,
    surface_format: wgpu::TextureFormat,
}

/// Background rendering state: a vertical two-color gradient.
#[derive(Debug)]
pub struct Backdrop {
    top: [f32; 4],
    bottom: [f32; 4],
    dirty: bool,
    gpu: Option<BackdropGpu>,
}

impl Backdrop {
    pub fn new(top: [f32; 4], bottom: [f32; 4]) -> Self {
        Self {
            top,
            bottom,
            dirty: true,
            gpu: None,
        }
    }

    pub fn set_colors(&mut self, top: [f32; 4], bottom: [f32; 4]) {
        self.top = top;
        self.bottom = bottom;
        self.dirty = true;
    }

    /// Draws the gradient across the whole target.
    pub fn draw(&mut self, ctx: &RenderCtx<'_>, rpass: &mut wgpu::RenderPass<'_>) {
        self.ensure_gpu(ctx);

        let Some(gpu) = self.gpu.as_ref() else { return };

        if self.dirty {
            let uniform = BackdropUniform {
                top: self.top,
                bottom: self.bottom,
            };
            ctx.queue
                .write_buffer(&gpu.ubo, 0, bytemuck::bytes_of(&uniform));
            self.dirty = false;
        }

        rpass.set_pipeline(&gpu.pipeline);
        rpass.set_bind_group(0, &gpu.bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }

    fn ensure_gpu(&mut self, ctx: &RenderCtx<'_>) {
        if let Some(gpu) = &self.gpu {
            if gpu.surface_format == ctx.surface_format {
                return;
            }
            // Surface format changed; rebuild and re-upload.
            self.dirty = true;
        }

        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("orrery backdrop shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/backdrop.wgsl").into()),
        });

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("orrery backdrop bgl"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: std::num::NonZeroU64::new(
                                std::mem::size_of::<BackdropUniform>() as u64,
                            ),
                        },
                        count: None,
                    }],
                });

        let pipeline_layout =
            ctx.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("orrery backdrop pipeline layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    immediate_size: 0,
                });

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("orrery backdrop pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
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
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            // Shares the frame pass with the model; passes depth test always,
            // writes nothing.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: ctx.depth_format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        let ubo = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("orrery backdrop ubo"),
            size: std::mem::size_of::<BackdropUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("orrery backdrop bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        });

        self.gpu = Some(BackdropGpu {
            pipeline,
            bind_group,
            ubo,
            surface_format: ctx.surface_format,
        });
    }
}

impl Default for Backdrop {
    fn default() -> Self {
        // Dim blue-grey fading to near-black, linear color.
        Self::new([0.17, 0.20, 0.26, 1.0], [0.015, 0.017, 0.022, 1.0])
    }
}
