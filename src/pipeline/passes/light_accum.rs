//! Light Accumulation Pass
//!
//! Accumulates lighting into the HDR accumulation target. The work depends
//! on the render path:
//!
//! - `Deferred`: fullscreen directional pass (shadowed), then one proxy
//!   volume draw per point/spot light, additively blended.
//! - `TiledDeferred`: fullscreen directional pass, then a fullscreen tiled
//!   pass that walks each pixel's tile light list.
//! - `Forward`: the opaque queue is drawn once with full shading, looping
//!   every packed light per fragment.
//! - `ForwardPlus`: same, but the fragment walks its tile's light list.
//!
//! Volume proxies render back faces with the depth test reversed, so a
//! camera inside the volume still shades every covered pixel. This replaces
//! the classic stencil z-fail trick with the same covered-pixel set.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use crate::scene::light::MAX_CASCADES;
use crate::settings::{PipelineSettings, RenderPathKind};

use super::super::context::{FrameContext, ModelUniforms};
use super::super::node::RenderNode;
use super::super::targets::HDR_FORMAT;
use super::super::{align_to, vertex_buffer_layout};
use super::proxy::{create_cone_proxy, create_sphere_proxy, proxy_vertex_layout, ProxyMesh};

const DEFERRED_DIR_SHADER: &str = include_str!("../shaders/deferred_dir.wgsl");
const DEFERRED_VOLUME_SHADER: &str = include_str!("../shaders/deferred_volume.wgsl");
const DEFERRED_TILED_SHADER: &str = include_str!("../shaders/deferred_tiled.wgsl");
const FORWARD_SHADER: &str = include_str!("../shaders/forward.wgsl");

/// Shading constants shared by every accumulation variant: the directional
/// light, its cascade remap vectors, and the packed-light count.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ShadingUniforms {
    pub light_view: [[f32; 4]; 4],
    pub cascade_scale: [[f32; 4]; MAX_CASCADES as usize],
    pub cascade_offset: [[f32; 4]; MAX_CASCADES as usize],
    /// Far boundary of each cascade slab in camera view depth.
    pub splits: [f32; 4],
    /// xyz = direction, w = shadow map size.
    pub dir_direction: [f32; 4],
    /// rgb = color * intensity, w = 1.0 when a directional light is active.
    pub dir_color: [f32; 4],
    /// (bias, normal_bias, tile_size, tiles_x)
    pub bias: [f32; 4],
    /// (light_count, cascade_count, filter_mode, tiled: 0/1)
    pub counts: [u32; 4],
}

/// Per-volume constants, written with dynamic offsets.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct VolumeUniforms {
    model: [[f32; 4]; 4],
    light_index: u32,
    _pad: [u32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccumMode {
    Volumes,
    Tiled,
    Forward,
    ForwardTiled,
}

impl AccumMode {
    fn of(kind: RenderPathKind) -> Self {
        match kind {
            RenderPathKind::Deferred => Self::Volumes,
            RenderPathKind::TiledDeferred => Self::Tiled,
            RenderPathKind::Forward => Self::Forward,
            RenderPathKind::ForwardPlus => Self::ForwardTiled,
        }
    }

    fn is_deferred(self) -> bool {
        matches!(self, Self::Volumes | Self::Tiled)
    }
}

#[derive(Debug, Clone, Copy)]
enum VolumeKind {
    Sphere,
    Cone,
}

#[derive(Debug, Clone, Copy)]
struct VolumeDraw {
    kind: VolumeKind,
    offset: u32,
}

#[derive(Debug, Clone, Copy)]
struct DrawRecord {
    item_index: usize,
    model_offset: u32,
}

pub struct LightAccumulationPass {
    mode: AccumMode,
    depth_format: wgpu::TextureFormat,

    shading_buffer: wgpu::Buffer,
    shadow_layout: wgpu::BindGroupLayout,
    shadow_bind_group: Option<wgpu::BindGroup>,

    lights_layout: wgpu::BindGroupLayout,
    lights_bind_group: Option<wgpu::BindGroup>,

    // Deferred resources
    gbuffer_layout: Option<wgpu::BindGroupLayout>,
    gbuffer_bind_group: Option<wgpu::BindGroup>,
    dir_pipeline: Option<wgpu::RenderPipeline>,

    // Deferred: proxy volumes
    volume_pipeline: Option<wgpu::RenderPipeline>,
    volume_layout: Option<wgpu::BindGroupLayout>,
    volume_buffer: Option<wgpu::Buffer>,
    volume_capacity: u32,
    volume_stride: u32,
    volume_bind_group: Option<wgpu::BindGroup>,
    sphere: Option<ProxyMesh>,
    cone: Option<ProxyMesh>,
    volume_draws: Vec<VolumeDraw>,

    // Tiled deferred
    tiled_pipeline: Option<wgpu::RenderPipeline>,

    // Forward variants
    forward_pipeline: Option<wgpu::RenderPipeline>,
    model_layout: Option<wgpu::BindGroupLayout>,
    model_buffer: Option<wgpu::Buffer>,
    model_capacity: u32,
    model_stride: u32,
    model_bind_group: Option<wgpu::BindGroup>,
    draws: Vec<DrawRecord>,
}

impl LightAccumulationPass {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        globals_layout: &wgpu::BindGroupLayout,
        settings: &PipelineSettings,
    ) -> Self {
        let mode = AccumMode::of(settings.path);
        let min_alignment = device.limits().min_uniform_buffer_offset_alignment.max(1);

        let shading_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shading Uniforms"),
            size: std::mem::size_of::<ShadingUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Shadow resources: the shading constants plus the shadow array,
        // bound as unfilterable float so one layout serves every filter
        // mode (the shader filters manually).
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Accum Shadow Layout"),
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
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        // Packed lights + (for tiled modes) the tile buffers.
        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        // The tile and spot-shadow buffers always exist, so one layout serves
        // every variant; a shader only declares the bindings it reads. The
        // shadow array rides along at binding 4 for the volume shader, whose
        // four bind groups are all spoken for.
        let lights_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Accum Lights Layout"),
            entries: &[
                storage_entry(0),
                storage_entry(1),
                storage_entry(2),
                storage_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let mut pass = Self {
            mode,
            depth_format: settings.depth_format,
            shading_buffer,
            shadow_layout,
            shadow_bind_group: None,
            lights_layout,
            lights_bind_group: None,
            gbuffer_layout: None,
            gbuffer_bind_group: None,
            dir_pipeline: None,
            volume_pipeline: None,
            volume_layout: None,
            volume_buffer: None,
            volume_capacity: 1,
            volume_stride: align_to(std::mem::size_of::<VolumeUniforms>() as u32, min_alignment),
            volume_bind_group: None,
            sphere: None,
            cone: None,
            volume_draws: Vec::new(),
            tiled_pipeline: None,
            forward_pipeline: None,
            model_layout: None,
            model_buffer: None,
            model_capacity: 1,
            model_stride: align_to(std::mem::size_of::<ModelUniforms>() as u32, min_alignment),
            model_bind_group: None,
            draws: Vec::new(),
        };

        if mode.is_deferred() {
            pass.init_deferred(device, globals_layout);
        } else {
            pass.init_forward(device, globals_layout);
        }
        pass
    }

    fn additive_target() -> Option<wgpu::ColorTargetState> {
        Some(wgpu::ColorTargetState {
            format: HDR_FORMAT,
            blend: Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::REPLACE,
            }),
            write_mask: wgpu::ColorWrites::ALL,
        })
    }

    fn init_deferred(&mut self, device: &wgpu::Device, globals_layout: &wgpu::BindGroupLayout) {
        // G-buffer inputs are read with textureLoad, no samplers involved.
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
        let gbuffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Accum GBuffer Layout"),
            entries: &[
                texture_entry(0, wgpu::TextureSampleType::Float { filterable: false }), // normal
                texture_entry(1, wgpu::TextureSampleType::Float { filterable: false }), // material
                texture_entry(2, wgpu::TextureSampleType::Depth), // depth
            ],
        });

        let dir_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Deferred Directional Shader"),
            source: wgpu::ShaderSource::Wgsl(DEFERRED_DIR_SHADER.into()),
        });
        let dir_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Deferred Directional Layout"),
            bind_group_layouts: &[globals_layout, &gbuffer_layout, &self.shadow_layout],
            immediate_size: 0,
        });
        self.dir_pipeline = Some(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Deferred Directional Pipeline"),
            layout: Some(&dir_layout),
            vertex: wgpu::VertexState {
                module: &dir_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &dir_shader,
                entry_point: Some("fs_main"),
                targets: &[Self::additive_target()],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        }));

        match self.mode {
            AccumMode::Volumes => {
                let volume_layout =
                    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("Volume Uniforms Layout"),
                        entries: &[wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: true,
                                min_binding_size: wgpu::BufferSize::new(
                                    std::mem::size_of::<VolumeUniforms>() as u64,
                                ),
                            },
                            count: None,
                        }],
                    });

                let volume_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Deferred Volume Shader"),
                    source: wgpu::ShaderSource::Wgsl(DEFERRED_VOLUME_SHADER.into()),
                });
                let volume_pipeline_layout =
                    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("Deferred Volume Pipeline Layout"),
                        bind_group_layouts: &[
                            globals_layout,
                            &gbuffer_layout,
                            &self.lights_layout,
                            &volume_layout,
                        ],
                        immediate_size: 0,
                    });
                self.volume_pipeline =
                    Some(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some("Deferred Volume Pipeline"),
                        layout: Some(&volume_pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &volume_shader,
                            entry_point: Some("vs_main"),
                            buffers: &[proxy_vertex_layout()],
                            compilation_options: Default::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &volume_shader,
                            entry_point: Some("fs_main"),
                            targets: &[Self::additive_target()],
                            compilation_options: Default::default(),
                        }),
                        primitive: wgpu::PrimitiveState {
                            topology: wgpu::PrimitiveTopology::TriangleList,
                            // Back faces + reversed depth test keep the
                            // volume visible with the camera inside it.
                            cull_mode: Some(wgpu::Face::Front),
                            ..Default::default()
                        },
                        depth_stencil: Some(wgpu::DepthStencilState {
                            format: self.depth_format,
                            depth_write_enabled: false,
                            depth_compare: wgpu::CompareFunction::GreaterEqual,
                            stencil: wgpu::StencilState::default(),
                            bias: wgpu::DepthBiasState::default(),
                        }),
                        multisample: wgpu::MultisampleState::default(),
                        multiview_mask: None,
                        cache: None,
                    }));

                self.volume_buffer = Some(Self::create_volume_buffer(
                    device,
                    self.volume_stride,
                    self.volume_capacity,
                ));
                self.volume_bind_group = Some(Self::create_volume_bind_group(
                    device,
                    &volume_layout,
                    self.volume_buffer.as_ref().expect("just created"),
                ));
                self.volume_layout = Some(volume_layout);
                self.sphere = Some(create_sphere_proxy(device));
                self.cone = Some(create_cone_proxy(device));
            }
            AccumMode::Tiled => {
                let tiled_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Deferred Tiled Shader"),
                    source: wgpu::ShaderSource::Wgsl(DEFERRED_TILED_SHADER.into()),
                });
                let tiled_layout =
                    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("Deferred Tiled Pipeline Layout"),
                        bind_group_layouts: &[
                            globals_layout,
                            &gbuffer_layout,
                            &self.shadow_layout,
                            &self.lights_layout,
                        ],
                        immediate_size: 0,
                    });
                self.tiled_pipeline =
                    Some(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some("Deferred Tiled Pipeline"),
                        layout: Some(&tiled_layout),
                        vertex: wgpu::VertexState {
                            module: &tiled_shader,
                            entry_point: Some("vs_main"),
                            buffers: &[],
                            compilation_options: Default::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &tiled_shader,
                            entry_point: Some("fs_main"),
                            targets: &[Self::additive_target()],
                            compilation_options: Default::default(),
                        }),
                        primitive: wgpu::PrimitiveState::default(),
                        depth_stencil: None,
                        multisample: wgpu::MultisampleState::default(),
                        multiview_mask: None,
                        cache: None,
                    }));
            }
            AccumMode::Forward | AccumMode::ForwardTiled => unreachable!(),
        }

        self.gbuffer_layout = Some(gbuffer_layout);
    }

    fn init_forward(&mut self, device: &wgpu::Device, globals_layout: &wgpu::BindGroupLayout) {
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Forward Model Layout"),
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

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Forward Shader"),
            source: wgpu::ShaderSource::Wgsl(FORWARD_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Forward Pipeline Layout"),
            bind_group_layouts: &[
                globals_layout,
                &model_layout,
                &self.shadow_layout,
                &self.lights_layout,
            ],
            immediate_size: 0,
        });

        // Plain forward owns the depth buffer; Forward+ reuses the prepass
        // depth and only tests against it.
        let prepass_depth = self.mode == AccumMode::ForwardTiled;
        self.forward_pipeline =
            Some(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Forward Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[vertex_buffer_layout()],
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
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: self.depth_format,
                    depth_write_enabled: !prepass_depth,
                    depth_compare: if prepass_depth {
                        wgpu::CompareFunction::LessEqual
                    } else {
                        wgpu::CompareFunction::Less
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            }));

        self.model_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Forward Model Uniforms"),
            size: u64::from(self.model_stride),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.model_bind_group = Some(Self::create_model_bind_group(
            device,
            &model_layout,
            self.model_buffer.as_ref().expect("just created"),
        ));
        self.model_layout = Some(model_layout);
    }

    fn create_volume_buffer(device: &wgpu::Device, stride: u32, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Volume Uniforms"),
            size: u64::from(stride) * u64::from(capacity),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_volume_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Volume Uniforms BG"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<VolumeUniforms>() as u64),
                }),
            }],
        })
    }

    fn create_model_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Forward Model BG"),
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

    fn upload_shading_uniforms(&self, ctx: &FrameContext<'_>) {
        let plan = ctx.plan;
        let mut uniforms = ShadingUniforms {
            counts: [
                plan.lights_gpu.len() as u32,
                0,
                plan.shadow_filter.shader_index(),
                u32::from(plan.tile.is_some()),
            ],
            splits: [f32::MAX; 4],
            ..ShadingUniforms::default()
        };

        if let Some(tile) = &plan.tile {
            uniforms.bias[2] = tile.grid.tile_size as f32;
            uniforms.bias[3] = tile.grid.tiles_x as f32;
        }

        if let Some(dir) = &plan.directional {
            uniforms.light_view = dir.light_view.to_cols_array_2d();
            for (i, cascade) in dir.cascades.iter().enumerate() {
                uniforms.cascade_scale[i] = cascade.bound.scale.to_array();
                uniforms.cascade_offset[i] = cascade.bound.offset.to_array();
                uniforms.splits[i] = cascade.bound.split_far;
            }
            uniforms.dir_direction = dir
                .direction
                .extend(dir.config.map_size as f32)
                .to_array();
            uniforms.dir_color = dir.color.extend(1.0).to_array();
            uniforms.bias[0] = dir.config.bias;
            uniforms.bias[1] = dir.config.normal_bias;
            uniforms.counts[1] = dir.cascades.len() as u32;
        }

        ctx.queue
            .write_buffer(&self.shading_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    fn rebuild_frame_bind_groups(&mut self, ctx: &FrameContext<'_>) {
        self.shadow_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Accum Shadow BG"),
            layout: &self.shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.shading_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(ctx.shadows.array_view()),
                },
            ],
        }));

        self.lights_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Accum Lights BG"),
            layout: &self.lights_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ctx.lights.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: ctx.tiles.ranges().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: ctx.tiles.indices().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: ctx.lights.spot_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(ctx.shadows.array_view()),
                },
            ],
        }));

        if let Some(gbuffer_layout) = &self.gbuffer_layout {
            let normal = &ctx.targets.gbuffer_normal.as_ref().expect("gbuffer layout").view;
            let material = &ctx
                .targets
                .gbuffer_material
                .as_ref()
                .expect("gbuffer layout")
                .view;
            self.gbuffer_bind_group =
                Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Accum GBuffer BG"),
                    layout: gbuffer_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(normal),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(material),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(&ctx.targets.depth.view),
                        },
                    ],
                }));
        }
    }

    fn prepare_volumes(&mut self, ctx: &FrameContext<'_>) {
        self.volume_draws.clear();
        let records = &ctx.plan.lights_gpu;
        if records.is_empty() {
            return;
        }

        let required = records.len() as u32;
        if required > self.volume_capacity {
            let mut capacity = self.volume_capacity.max(1);
            while capacity < required {
                capacity = capacity.saturating_mul(2);
            }
            let buffer = Self::create_volume_buffer(ctx.device, self.volume_stride, capacity);
            self.volume_bind_group = Some(Self::create_volume_bind_group(
                ctx.device,
                self.volume_layout.as_ref().expect("volume mode"),
                &buffer,
            ));
            self.volume_buffer = Some(buffer);
            self.volume_capacity = capacity;
        }

        let mut bytes = vec![0u8; self.volume_stride as usize * records.len()];
        for (i, record) in records.iter().enumerate() {
            let position = Vec3::from_array(record.position);
            let model = if record.kind == super::super::lights::LIGHT_KIND_SPOT {
                let direction = Vec3::from_array(record.direction);
                let base_radius = record.range
                    * (record.cone_cos_outer.clamp(0.05, 0.999)).acos().tan();
                Mat4::from_translation(position)
                    * Mat4::from_quat(Quat::from_rotation_arc(Vec3::NEG_Z, direction))
                    * Mat4::from_scale(Vec3::new(base_radius, base_radius, record.range))
            } else {
                Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(record.range))
            };
            let uniforms = VolumeUniforms {
                model: model.to_cols_array_2d(),
                light_index: i as u32,
                _pad: [0; 3],
            };
            let offset = i * self.volume_stride as usize;
            bytes[offset..offset + std::mem::size_of::<VolumeUniforms>()]
                .copy_from_slice(bytemuck::bytes_of(&uniforms));

            self.volume_draws.push(VolumeDraw {
                kind: if record.kind == super::super::lights::LIGHT_KIND_SPOT {
                    VolumeKind::Cone
                } else {
                    VolumeKind::Sphere
                },
                offset: i as u32 * self.volume_stride,
            });
        }
        ctx.queue
            .write_buffer(self.volume_buffer.as_ref().expect("volume mode"), 0, &bytes);
    }

    fn prepare_forward(&mut self, ctx: &FrameContext<'_>) {
        self.draws.clear();
        let items = &ctx.snapshot.items;
        if items.is_empty() {
            return;
        }

        let required = items.len() as u32;
        if required > self.model_capacity {
            let mut capacity = self.model_capacity.max(1);
            while capacity < required {
                capacity = capacity.saturating_mul(2);
            }
            let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Forward Model Uniforms"),
                size: u64::from(self.model_stride) * u64::from(capacity),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.model_bind_group = Some(Self::create_model_bind_group(
                ctx.device,
                self.model_layout.as_ref().expect("forward mode"),
                &buffer,
            ));
            self.model_buffer = Some(buffer);
            self.model_capacity = capacity;
        }

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
        ctx.queue
            .write_buffer(self.model_buffer.as_ref().expect("forward mode"), 0, &bytes);
    }

    fn run_deferred(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let color_attachment = Some(wgpu::RenderPassColorAttachment {
            view: &ctx.targets.light_accum.view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        });

        // Directional + tiled work runs without a depth attachment; the
        // volume draws need the G-buffer depth for their reversed test.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Light Accumulation (fullscreen)"),
                color_attachments: &[color_attachment],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let (Some(pipeline), Some(gbuffer), Some(shadow)) = (
                &self.dir_pipeline,
                &self.gbuffer_bind_group,
                &self.shadow_bind_group,
            ) {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, ctx.globals.bind_group(), &[]);
                pass.set_bind_group(1, gbuffer, &[]);
                pass.set_bind_group(2, shadow, &[]);
                pass.draw(0..3, 0..1);
            }

            if let (Some(pipeline), Some(gbuffer), Some(shadow), Some(lights)) = (
                &self.tiled_pipeline,
                &self.gbuffer_bind_group,
                &self.shadow_bind_group,
                &self.lights_bind_group,
            ) {
                if !ctx.plan.lights_gpu.is_empty() {
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, ctx.globals.bind_group(), &[]);
                    pass.set_bind_group(1, gbuffer, &[]);
                    pass.set_bind_group(2, shadow, &[]);
                    pass.set_bind_group(3, lights, &[]);
                    pass.draw(0..3, 0..1);
                }
            }
        }

        if self.volume_draws.is_empty() {
            return;
        }
        let (Some(pipeline), Some(gbuffer), Some(lights), Some(volume_bg)) = (
            &self.volume_pipeline,
            &self.gbuffer_bind_group,
            &self.lights_bind_group,
            &self.volume_bind_group,
        ) else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Light Accumulation (volumes)"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &ctx.targets.light_accum.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.targets.depth.view,
                depth_ops: None, // read-only
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, ctx.globals.bind_group(), &[]);
        pass.set_bind_group(1, gbuffer, &[]);
        pass.set_bind_group(2, lights, &[]);

        for draw in &self.volume_draws {
            let mesh = match draw.kind {
                VolumeKind::Sphere => self.sphere.as_ref().expect("volume mode"),
                VolumeKind::Cone => self.cone.as_ref().expect("volume mode"),
            };
            pass.set_bind_group(3, volume_bg, &[draw.offset]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn run_forward(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let (Some(pipeline), Some(model_bg), Some(shadow), Some(lights)) = (
            &self.forward_pipeline,
            &self.model_bind_group,
            &self.shadow_bind_group,
            &self.lights_bind_group,
        ) else {
            return;
        };

        let prepass_depth = self.mode == AccumMode::ForwardTiled;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Light Accumulation (forward)"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &ctx.targets.light_accum.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.targets.depth.view,
                depth_ops: if prepass_depth {
                    None // read-only, filled by the depth prepass
                } else {
                    Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    })
                },
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, ctx.globals.bind_group(), &[]);
        pass.set_bind_group(2, shadow, &[]);
        pass.set_bind_group(3, lights, &[]);

        for draw in &self.draws {
            let item = &ctx.snapshot.items[draw.item_index];
            pass.set_bind_group(1, model_bg, &[draw.model_offset]);
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

impl RenderNode for LightAccumulationPass {
    fn name(&self) -> &str {
        "Light Accumulation"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        self.upload_shading_uniforms(ctx);
        self.rebuild_frame_bind_groups(ctx);
        match self.mode {
            AccumMode::Volumes => self.prepare_volumes(ctx),
            AccumMode::Tiled => {}
            AccumMode::Forward | AccumMode::ForwardTiled => self.prepare_forward(ctx),
        }
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        if self.mode.is_deferred() {
            self.run_deferred(ctx, encoder);
        } else {
            self.run_forward(ctx, encoder);
        }
    }
}
