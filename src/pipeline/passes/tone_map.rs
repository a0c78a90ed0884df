//! Tone Map Pass
//!
//! Final fullscreen resolve: HDR scene color, scaled by exposure and mapped
//! with the ACES filmic curve, into the caller's output view.

use bytemuck::{Pod, Zeroable};

use crate::settings::PipelineSettings;

use super::super::context::FrameContext;
use super::super::node::RenderNode;

const TONE_MAP_SHADER: &str = include_str!("../shaders/tone_map.wgsl");

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ToneMapUniforms {
    exposure: f32,
    _pad: [f32; 3],
}

pub struct ToneMapPass {
    exposure: f32,
    uploaded_exposure: Option<f32>,
    uniforms: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    pipeline: wgpu::RenderPipeline,
}

impl ToneMapPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, settings: &PipelineSettings) -> Self {
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Tone Map Uniforms"),
            size: std::mem::size_of::<ToneMapUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tone Map Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Tone Map Shader"),
            source: wgpu::ShaderSource::Wgsl(TONE_MAP_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Tone Map Pipeline Layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Tone Map Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: settings.output_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Self {
            exposure: settings.exposure,
            uploaded_exposure: None,
            uniforms,
            layout,
            bind_group: None,
            pipeline,
        }
    }

    /// Linear exposure multiplier applied before the tone curve.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure.max(0.0);
    }
}

impl RenderNode for ToneMapPass {
    fn name(&self) -> &str {
        "Tone Map"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        if self.uploaded_exposure != Some(self.exposure) {
            let uniforms = ToneMapUniforms {
                exposure: self.exposure,
                _pad: [0.0; 3],
            };
            ctx.queue
                .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));
            self.uploaded_exposure = Some(self.exposure);
        }

        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tone Map BG"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&ctx.targets.scene_color.view),
                },
            ],
        }));
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Tone Map"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.output,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
