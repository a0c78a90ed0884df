//! Frame Context
//!
//! Read-only view over everything a pass may touch during one frame. Built
//! by [`RenderPath`] after the shared resources are prepared, then handed to
//! every node's `prepare`/`run`. Passes receive their collaborators here
//! instead of reaching for globals.
//!
//! [`RenderPath`]: super::path::RenderPath

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::settings::PipelineSettings;

use super::frame::{FramePlan, FrameSnapshot};
use super::lights::LightBuffers;
use super::shadow::storage::ShadowMapStorage;
use super::targets::RenderTargets;
use super::tile::pass::TileBuffers;

/// Per-frame camera constants, bound at group 0 by every pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    pub inv_projection: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub position: [f32; 4],
    /// (near, far, width, height)
    pub near_far_extent: [f32; 4],
    /// (exposure, 0, 0, 0)
    pub exposure: [f32; 4],
}

/// The camera uniform buffer and its bind group, shared by all passes.
pub struct FrameGlobals {
    buffer: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl FrameGlobals {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniforms"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Uniforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX
                    | wgpu::ShaderStages::FRAGMENT
                    | wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Uniforms BG"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            buffer,
            layout,
            bind_group,
        }
    }

    /// Rewrites the camera constants for this frame.
    pub fn upload(
        &self,
        queue: &wgpu::Queue,
        snapshot: &FrameSnapshot,
        extent: (u32, u32),
        exposure: f32,
    ) {
        let cam = &snapshot.camera;
        let uniforms = CameraUniforms {
            view: cam.view_matrix.to_cols_array_2d(),
            projection: cam.projection_matrix.to_cols_array_2d(),
            view_projection: cam.view_projection_matrix.to_cols_array_2d(),
            inv_projection: cam.projection_matrix.inverse().to_cols_array_2d(),
            inv_view: cam.view_matrix.inverse().to_cols_array_2d(),
            position: cam.position.extend(1.0).to_array(),
            near_far_extent: [cam.near, cam.far, extent.0 as f32, extent.1 as f32],
            exposure: [exposure, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    #[must_use]
    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    #[must_use]
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// Model (per-draw) uniforms written with dynamic offsets.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    /// (metallic, roughness, 0, 0)
    pub material: [f32; 4],
    pub emissive: [f32; 4],
}

impl ModelUniforms {
    #[must_use]
    pub fn from_item(item: &crate::scene::query::RenderItem) -> Self {
        let params = &item.material.params;
        Self {
            model: item.world_matrix.to_cols_array_2d(),
            normal_matrix: normal_matrix(&item.world_matrix).to_cols_array_2d(),
            base_color: params.base_color,
            material: [params.metallic, params.roughness, 0.0, 0.0],
            emissive: [params.emissive[0], params.emissive[1], params.emissive[2], 0.0],
        }
    }
}

fn normal_matrix(model: &Mat4) -> Mat4 {
    model.inverse().transpose()
}

/// Everything a pass may read during one frame.
pub struct FrameContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub settings: &'a PipelineSettings,
    pub snapshot: &'a FrameSnapshot,
    pub plan: &'a FramePlan,
    pub targets: &'a RenderTargets,
    pub shadows: &'a ShadowMapStorage,
    pub lights: &'a LightBuffers,
    pub tiles: &'a TileBuffers,
    pub globals: &'a FrameGlobals,
    /// The caller's surface view; only the tone-map pass writes it.
    pub output: &'a wgpu::TextureView,
}
