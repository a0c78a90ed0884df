//! Shadow Depth Pass
//!
//! Renders every shadow view of the frame plan into its assigned layer of
//! the shadow arena: the directional cascades in ascending order, then one
//! perspective view per shadow-casting spot light. Each view binds its own
//! view-projection via a dynamic offset into a single uniform buffer, so
//! many small per-view uniforms share one allocation.
//!
//! Casters are culled per view against the plan's caster frustums, so a
//! mesh far outside one cascade's footprint is only drawn into the views
//! it can actually shadow.
//!
//! Writes only shadow layers; the main color/depth targets are untouched.

use glam::Mat4;
use smallvec::SmallVec;

use crate::scene::aabb::Aabb;
use crate::scene::camera::Frustum;
use crate::scene::light::ShadowFilter;

use super::super::context::FrameContext;
use super::super::node::RenderNode;
use super::super::{align_to, vertex_buffer_layout};

const SHADOW_SHADER: &str = include_str!("../shaders/shadow_depth.wgsl");

/// Whether an item's world bounds can cast into a shadow view. Empty bounds
/// are conservative: the item is drawn into every view.
#[must_use]
pub fn caster_visible(bounds: &Aabb, frustum: &Frustum) -> bool {
    if bounds.is_empty() {
        return true;
    }
    let radius = 0.5 * (bounds.max - bounds.min).length();
    frustum.intersects_sphere(bounds.center(), radius)
}

/// One recorded shadow view: shadow array layer, dynamic offset of its
/// view-projection matrix, and the casters that survived its frustum.
#[derive(Debug, Clone)]
struct ViewRecord {
    layer: u32,
    vp_offset: u32,
    draws: Vec<DrawRecord>,
}

/// One caster draw: index into the frame snapshot items + dynamic offset of
/// its model matrix.
#[derive(Debug, Clone, Copy)]
struct DrawRecord {
    item_index: usize,
    model_offset: u32,
}

pub struct ShadowPass {
    view_layout: wgpu::BindGroupLayout,
    view_buffer: wgpu::Buffer,
    view_capacity: u32,
    view_stride: u32,
    view_bind_group: wgpu::BindGroup,

    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_capacity: u32,
    model_stride: u32,
    model_bind_group: wgpu::BindGroup,

    pipeline_layout: wgpu::PipelineLayout,
    pipeline: Option<wgpu::RenderPipeline>,
    pipeline_filter: Option<ShadowFilter>,

    views: SmallVec<[ViewRecord; 8]>,
}

impl ShadowPass {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let min_alignment = device.limits().min_uniform_buffer_offset_alignment.max(1);
        let stride = align_to(std::mem::size_of::<Mat4>() as u32, min_alignment);

        let uniform_layout_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Mat4>() as u64),
            },
            count: None,
        };

        let view_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow View Layout"),
            entries: &[uniform_layout_entry],
        });
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Model Layout"),
            entries: &[uniform_layout_entry],
        });

        let view_buffer = Self::create_uniform_buffer(device, "Shadow View VPs", stride, 1);
        let model_buffer = Self::create_uniform_buffer(device, "Shadow Model Matrices", stride, 1);

        let view_bind_group = Self::create_bind_group(
            device,
            "Shadow View BG",
            &view_layout,
            &view_buffer,
        );
        let model_bind_group = Self::create_bind_group(
            device,
            "Shadow Model BG",
            &model_layout,
            &model_buffer,
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&view_layout, &model_layout],
            immediate_size: 0,
        });

        Self {
            view_layout,
            view_buffer,
            view_capacity: 1,
            view_stride: stride,
            view_bind_group,
            model_layout,
            model_buffer,
            model_capacity: 1,
            model_stride: stride,
            model_bind_group,
            pipeline_layout,
            pipeline: None,
            pipeline_filter: None,
            views: SmallVec::new(),
        }
    }

    fn create_uniform_buffer(
        device: &wgpu::Device,
        label: &str,
        stride: u32,
        capacity: u32,
    ) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: u64::from(stride) * u64::from(capacity),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<Mat4>() as u64),
                }),
            }],
        })
    }

    fn ensure_view_capacity(&mut self, device: &wgpu::Device, required: u32) {
        if required <= self.view_capacity {
            return;
        }
        let mut capacity = self.view_capacity.max(1);
        while capacity < required {
            capacity = capacity.saturating_mul(2);
        }
        self.view_buffer =
            Self::create_uniform_buffer(device, "Shadow View VPs", self.view_stride, capacity);
        self.view_bind_group =
            Self::create_bind_group(device, "Shadow View BG", &self.view_layout, &self.view_buffer);
        self.view_capacity = capacity;
    }

    fn ensure_model_capacity(&mut self, device: &wgpu::Device, required: u32) {
        if required <= self.model_capacity {
            return;
        }
        let mut capacity = self.model_capacity.max(1);
        while capacity < required {
            capacity = capacity.saturating_mul(2);
        }
        self.model_buffer = Self::create_uniform_buffer(
            device,
            "Shadow Model Matrices",
            self.model_stride,
            capacity,
        );
        self.model_bind_group = Self::create_bind_group(
            device,
            "Shadow Model BG",
            &self.model_layout,
            &self.model_buffer,
        );
        self.model_capacity = capacity;
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, filter: ShadowFilter) {
        if self.pipeline_filter == Some(filter) {
            return;
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Depth Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADOW_SHADER.into()),
        });

        // Moment filters rasterize depth into a color target; plain PCF is
        // depth-only with no fragment stage at all.
        let fragment = match filter {
            ShadowFilter::Pcf => None,
            ShadowFilter::Vsm | ShadowFilter::Evsm => Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(if filter == ShadowFilter::Vsm {
                    "fs_vsm"
                } else {
                    "fs_evsm"
                }),
                targets: &[Some(wgpu::ColorTargetState {
                    format: filter.texture_format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
        };

        self.pipeline = Some(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Depth Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_buffer_layout()],
                compilation_options: Default::default(),
            },
            fragment,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // Front-face culling trades peter-panning for less acne on
                // closed casters.
                cull_mode: Some(wgpu::Face::Front),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        }));
        self.pipeline_filter = Some(filter);
    }
}

impl RenderNode for ShadowPass {
    fn name(&self) -> &str {
        "Shadow Pass"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        self.views.clear();

        let plan = ctx.plan;
        if !plan.has_shadows() {
            return;
        }

        self.ensure_pipeline(ctx.device, plan.shadow_filter);

        // Collect view-projections and caster frustums: cascades first
        // (ascending), then spots.
        let mut vps: SmallVec<[(u32, Mat4, Frustum); 8]> = SmallVec::new();
        if let Some(dir) = &plan.directional {
            for cascade in &dir.cascades {
                vps.push((
                    cascade.layer,
                    cascade.bound.view_projection,
                    cascade.caster_frustum,
                ));
            }
        }
        for spot in &plan.spot_shadows {
            vps.push((spot.layer, spot.view_projection, spot.caster_frustum));
        }

        // One model matrix per casting item, shared by every view that
        // draws it.
        let casters: Vec<DrawRecord> = ctx
            .snapshot
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.casts_shadows)
            .map(|(i, _)| i)
            .enumerate()
            .map(|(slot, item_index)| DrawRecord {
                item_index,
                model_offset: slot as u32 * self.model_stride,
            })
            .collect();

        self.ensure_model_capacity(ctx.device, casters.len() as u32);
        let mut model_bytes = vec![0u8; self.model_stride as usize * casters.len()];
        for (slot, draw) in casters.iter().enumerate() {
            let offset = slot * self.model_stride as usize;
            let model = ctx.snapshot.items[draw.item_index].world_matrix;
            model_bytes[offset..offset + 64].copy_from_slice(bytemuck::bytes_of(&model));
        }
        if !model_bytes.is_empty() {
            ctx.queue.write_buffer(&self.model_buffer, 0, &model_bytes);
        }

        self.ensure_view_capacity(ctx.device, vps.len() as u32);
        let mut view_bytes = vec![0u8; self.view_stride as usize * vps.len()];
        for (i, (layer, vp, frustum)) in vps.iter().enumerate() {
            let offset = i * self.view_stride as usize;
            view_bytes[offset..offset + 64].copy_from_slice(bytemuck::bytes_of(vp));

            let draws = casters
                .iter()
                .filter(|draw| {
                    caster_visible(&ctx.snapshot.items[draw.item_index].bounds, frustum)
                })
                .copied()
                .collect();
            self.views.push(ViewRecord {
                layer: *layer,
                vp_offset: i as u32 * self.view_stride,
                draws,
            });
        }
        ctx.queue.write_buffer(&self.view_buffer, 0, &view_bytes);
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        if self.views.is_empty() {
            return;
        }
        let Some(pipeline) = &self.pipeline else {
            return;
        };

        let moments = ctx.shadows.is_moment_storage();

        for view in &self.views {
            // Moment formats: layer is a color attachment, depth is scratch.
            // PCF: layer is the depth attachment itself.
            let color_attachments = [moments.then(|| wgpu::RenderPassColorAttachment {
                view: ctx.shadows.layer_view(view.layer),
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
            })];
            let depth_view = if moments {
                ctx.shadows
                    .moment_depth_view()
                    .unwrap_or_else(|| ctx.shadows.layer_view(view.layer))
            } else {
                ctx.shadows.layer_view(view.layer)
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Depth Pass"),
                color_attachments: if moments { &color_attachments } else { &[] },
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
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

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.view_bind_group, &[view.vp_offset]);

            for draw in &view.draws {
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
}
