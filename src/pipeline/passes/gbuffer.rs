//! G-Buffer Pass
//!
//! Rasterizes the opaque queue once, with no lighting: albedo, world-space
//! normal, and material parameters into the G-buffer targets plus depth.
//! Forward+ builds only the depth attachment here (the tile culler needs a
//! depth buffer; shading happens in the accumulation pass).

use crate::scene::query::RenderItem;
use crate::settings::PipelineSettings;

use super::super::context::{FrameContext, ModelUniforms};
use super::super::node::RenderNode;
use super::super::{align_to, vertex_buffer_layout};

const GBUFFER_SHADER: &str = include_str!("../shaders/gbuffer.wgsl");

#[derive(Debug, Clone, Copy)]
struct DrawRecord {
    item_index: usize,
    model_offset: u32,
}

pub struct GBufferPass {
    full_gbuffer: bool,

    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_capacity: u32,
    model_stride: u32,
    model_bind_group: wgpu::BindGroup,

    pipeline: wgpu::RenderPipeline,
    draws: Vec<DrawRecord>,
}

impl GBufferPass {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        globals_layout: &wgpu::BindGroupLayout,
        settings: &PipelineSettings,
    ) -> Self {
        let min_alignment = device.limits().min_uniform_buffer_offset_alignment.max(1);
        let stride = align_to(std::mem::size_of::<ModelUniforms>() as u32, min_alignment);
        let full_gbuffer = settings.path.uses_gbuffer();

        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GBuffer Model Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ModelUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        let model_buffer = Self::create_model_buffer(device, stride, 1);
        let model_bind_group =
            Self::create_model_bind_group(device, &model_layout, &model_buffer);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("GBuffer Shader"),
            source: wgpu::ShaderSource::Wgsl(GBUFFER_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GBuffer Pipeline Layout"),
            bind_group_layouts: &[globals_layout, &model_layout],
            immediate_size: 0,
        });

        let gbuffer_targets = [
            Some(wgpu::ColorTargetState {
                format: super::super::targets::GBUFFER_ALBEDO_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(wgpu::ColorTargetState {
                format: super::super::targets::GBUFFER_NORMAL_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(wgpu::ColorTargetState {
                format: super::super::targets::GBUFFER_MATERIAL_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            }),
        ];

        let fragment = if full_gbuffer {
            Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &gbuffer_targets,
                compilation_options: Default::default(),
            })
        } else {
            None // depth prepass only
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("GBuffer Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_buffer_layout()],
                compilation_options: Default::default(),
            },
            fragment,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: settings.depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Self {
            full_gbuffer,
            model_layout,
            model_buffer,
            model_capacity: 1,
            model_stride: stride,
            model_bind_group,
            pipeline,
            draws: Vec::new(),
        }
    }

    fn create_model_buffer(device: &wgpu::Device, stride: u32, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("GBuffer Model Uniforms"),
            size: u64::from(stride) * u64::from(capacity),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_model_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GBuffer Model BG"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniforms>() as u64),
                }),
            }],
        })
    }

    fn ensure_model_capacity(&mut self, device: &wgpu::Device, required: u32) {
        if required <= self.model_capacity {
            return;
        }
        let mut capacity = self.model_capacity.max(1);
        while capacity < required {
            capacity = capacity.saturating_mul(2);
        }
        self.model_buffer = Self::create_model_buffer(device, self.model_stride, capacity);
        self.model_bind_group =
            Self::create_model_bind_group(device, &self.model_layout, &self.model_buffer);
        self.model_capacity = capacity;
    }

    /// Writes one [`ModelUniforms`] slot per item and records the draws.
    fn upload_models(&mut self, ctx: &FrameContext<'_>, items: &[RenderItem]) {
        self.ensure_model_capacity(ctx.device, items.len() as u32);
        let mut bytes = vec![0u8; self.model_stride as usize * items.len()];
        for (slot, item) in items.iter().enumerate() {
            let offset = slot * self.model_stride as usize;
            let uniforms = ModelUniforms::from_item(item);
            bytes[offset..offset + std::mem::size_of::<ModelUniforms>()]
                .copy_from_slice(bytemuck::bytes_of(&uniforms));
            self.draws.push(DrawRecord {
                item_index: slot,
                model_offset: slot as u32 * self.model_stride,
            });
        }
        if !bytes.is_empty() {
            ctx.queue.write_buffer(&self.model_buffer, 0, &bytes);
        }
    }
}

impl RenderNode for GBufferPass {
    fn name(&self) -> &str {
        "GBuffer Pass"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        self.draws.clear();
        self.upload_models(ctx, &ctx.snapshot.items);
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let targets = ctx.targets;

        fn clear(view: &wgpu::TextureView) -> Option<wgpu::RenderPassColorAttachment<'_>> {
            Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })
        }

        let color_attachments = if self.full_gbuffer {
            vec![
                clear(&targets.gbuffer_albedo.as_ref().expect("gbuffer layout").view),
                clear(&targets.gbuffer_normal.as_ref().expect("gbuffer layout").view),
                clear(&targets.gbuffer_material.as_ref().expect("gbuffer layout").view),
            ]
        } else {
            Vec::new()
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("GBuffer Pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, ctx.globals.bind_group(), &[]);

        for draw in &self.draws {
            let item = &ctx.snapshot.items[draw.item_index];
            pass.set_bind_group(1, &self.model_bind_group, &[draw.model_offset]);
            pass.set_vertex_buffer(0, item.mesh.vertex_buffer.slice(..));
            if let Some(index_buffer) = &item.mesh.index_buffer {
                pass.set_index_buffer(index_buffer.slice(..), item.mesh.index_format);
                pass.draw_indexed(item.mesh.draw_range.clone(), 0, 0..1);
            } else {
                pass.draw(item.mesh.draw_range.clone(), 0..1);
            }
        }
    }
}
