//! Shading Composite Pass
//!
//! Resolves the accumulated lighting into the HDR scene color target. For
//! deferred paths the accumulation buffer holds irradiance and gets
//! multiplied by G-buffer albedo here; forward paths already shaded with
//! albedo, so the buffer passes through. Pixels with no geometry (depth at
//! the far plane) receive the background color.

use bytemuck::{Pod, Zeroable};

use crate::settings::PipelineSettings;

use super::super::context::FrameContext;
use super::super::node::RenderNode;
use super::super::targets::HDR_FORMAT;

const COMPOSITE_SHADER: &str = include_str!("../shaders/composite.wgsl");

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CompositeUniforms {
    background: [f32; 4],
    /// 1 = multiply by albedo (deferred), 0 = pass through (forward).
    mode: u32,
    _pad: [u32; 3],
}

pub struct ShadingCompositePass {
    multiply_albedo: bool,
    background: [f32; 4],
    uniforms: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    pipeline: wgpu::RenderPipeline,
}

impl ShadingCompositePass {
    #[must_use]
    pub fn new(device: &wgpu::Device, settings: &PipelineSettings) -> Self {
        let multiply_albedo = settings.path.uses_gbuffer();

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Composite Uniforms"),
            size: std::mem::size_of::<CompositeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let texture_entry = |binding: u32, sample_type: wgpu::TextureSampleType| {
            wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Layout"),
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
                texture_entry(1, wgpu::TextureSampleType::Float { filterable: false }), // accum
                texture_entry(2, wgpu::TextureSampleType::Float { filterable: false }), // albedo
                texture_entry(3, wgpu::TextureSampleType::Depth),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Composite Shader"),
            source: wgpu::ShaderSource::Wgsl(COMPOSITE_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Composite Pipeline Layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Composite Pipeline"),
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
                    format: HDR_FORMAT,
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
            multiply_albedo,
            background: [0.0, 0.0, 0.0, 1.0],
            uniforms,
            layout,
            bind_group: None,
            pipeline,
        }
    }

    /// Background color, linear space, used where no geometry was drawn.
    pub fn set_background(&mut self, color: [f32; 4]) {
        self.background = color;
    }
}

impl RenderNode for ShadingCompositePass {
    fn name(&self) -> &str {
        "Shading Composite"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        let uniforms = CompositeUniforms {
            background: self.background,
            mode: u32::from(self.multiply_albedo),
            _pad: [0; 3],
        };
        ctx.queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));

        // Forward paths have no albedo target; the accumulation view fills
        // the slot and the shader never reads it in mode 0.
        let albedo = ctx
            .targets
            .gbuffer_albedo
            .as_ref()
            .map_or(&ctx.targets.light_accum.view, |target| &target.view);

        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite BG"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&ctx.targets.light_accum.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(albedo),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&ctx.targets.depth.view),
                },
            ],
        }));
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shading Composite"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &ctx.targets.scene_color.view,
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
