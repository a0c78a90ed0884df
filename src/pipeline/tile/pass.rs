//! Tile Light Cull Pass
//!
//! One compute workgroup per tile: reduce the tile's depth range from the
//! G-buffer depth, build the tile frustum, test every packed light, and
//! append passing indices into the global index list. The global append
//! counter is reset to zero in `prepare` so offsets are unambiguous between
//! frames.

use bytemuck::{Pod, Zeroable};

use super::super::context::FrameContext;
use super::super::node::RenderNode;
use super::math::{TileGrid, TileRange};

const CULL_SHADER: &str = include_str!("../shaders/tile_cull.wgsl");

/// Dispatch constants for the culling shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TileCullUniforms {
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub tile_size: u32,
    pub light_count: u32,
    pub max_lights_per_tile: u32,
    pub width: u32,
    pub height: u32,
    pub _pad: u32,
}

/// GPU buffers of the tile partition: per-tile ranges, the compacted index
/// list, and the append counter. Sized by grid and per-tile budget;
/// reallocated only when those change.
pub struct TileBuffers {
    grid: TileGrid,
    max_lights_per_tile: u32,
    ranges: wgpu::Buffer,
    indices: wgpu::Buffer,
    counter: wgpu::Buffer,
    uniforms: wgpu::Buffer,
}

impl TileBuffers {
    #[must_use]
    pub fn new(device: &wgpu::Device, grid: TileGrid, max_lights_per_tile: u32) -> Self {
        let tile_count = u64::from(grid.tile_count().max(1));
        let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;

        Self {
            ranges: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Tile Ranges"),
                size: tile_count * std::mem::size_of::<TileRange>() as u64,
                usage: storage,
                mapped_at_creation: false,
            }),
            indices: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Tile Light Indices"),
                size: tile_count * u64::from(max_lights_per_tile.max(1)) * 4,
                usage: storage,
                mapped_at_creation: false,
            }),
            counter: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Tile Light Counter"),
                size: 4,
                usage: storage,
                mapped_at_creation: false,
            }),
            uniforms: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Tile Cull Uniforms"),
                size: std::mem::size_of::<TileCullUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            grid,
            max_lights_per_tile,
        }
    }

    /// Reallocates when the grid or the per-tile budget changed. Idempotent
    /// otherwise. Returns `true` on rebuild.
    pub fn ensure(
        &mut self,
        device: &wgpu::Device,
        grid: TileGrid,
        max_lights_per_tile: u32,
    ) -> bool {
        if self.grid == grid && self.max_lights_per_tile == max_lights_per_tile {
            return false;
        }
        *self = Self::new(device, grid, max_lights_per_tile);
        true
    }

    #[must_use]
    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    #[must_use]
    pub fn ranges(&self) -> &wgpu::Buffer {
        &self.ranges
    }

    #[must_use]
    pub fn indices(&self) -> &wgpu::Buffer {
        &self.indices
    }

    #[must_use]
    pub fn counter(&self) -> &wgpu::Buffer {
        &self.counter
    }

    #[must_use]
    pub fn uniforms(&self) -> &wgpu::Buffer {
        &self.uniforms
    }
}

pub struct TileLightCullPass {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
    bind_group: Option<wgpu::BindGroup>,
    dispatch: (u32, u32),
}

impl TileLightCullPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, globals_layout: &wgpu::BindGroupLayout) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Tile Cull Shader"),
            source: wgpu::ShaderSource::Wgsl(CULL_SHADER.into()),
        });

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tile Cull Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),  // packed lights
                storage_entry(2, false), // tile ranges
                storage_entry(3, false), // index list
                storage_entry(4, false), // append counter
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Tile Cull Pipeline Layout"),
            bind_group_layouts: &[globals_layout, &layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Tile Cull Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            layout,
            pipeline,
            bind_group: None,
            dispatch: (0, 0),
        }
    }
}

impl RenderNode for TileLightCullPass {
    fn name(&self) -> &str {
        "Tile Light Cull"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        self.bind_group = None;
        self.dispatch = (0, 0);

        let Some(tile) = &ctx.plan.tile else {
            return;
        };

        let uniforms = TileCullUniforms {
            tiles_x: tile.grid.tiles_x,
            tiles_y: tile.grid.tiles_y,
            tile_size: tile.grid.tile_size,
            light_count: tile.light_count,
            max_lights_per_tile: tile.max_lights_per_tile,
            width: tile.grid.width,
            height: tile.grid.height,
            _pad: 0,
        };
        ctx.queue
            .write_buffer(ctx.tiles.uniforms(), 0, bytemuck::bytes_of(&uniforms));

        // Fresh counter each frame, otherwise append offsets are ambiguous.
        ctx.queue
            .write_buffer(ctx.tiles.counter(), 0, bytemuck::bytes_of(&0u32));

        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tile Cull BG"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ctx.tiles.uniforms().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: ctx.lights.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: ctx.tiles.ranges().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: ctx.tiles.indices().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: ctx.tiles.counter().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&ctx.targets.depth.view),
                },
            ],
        }));
        self.dispatch = (tile.grid.tiles_x, tile.grid.tiles_y);
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };

        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Tile Cull Pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.pipeline);
        cpass.set_bind_group(0, ctx.globals.bind_group(), &[]);
        cpass.set_bind_group(1, bind_group, &[]);
        cpass.dispatch_workgroups(self.dispatch.0, self.dispatch.1, 1);
    }
}
