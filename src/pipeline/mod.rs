//! The Lighting Pipeline
//!
//! Everything between the per-frame scene snapshot and the presented image:
//! cascaded shadow maps, tiled light culling, G-buffer rendering, light
//! accumulation, compositing, and tone mapping, sequenced by [`RenderPath`].

pub mod context;
pub mod frame;
pub mod lights;
pub mod node;
pub mod passes;
pub mod path;
pub mod shadow;
pub mod targets;
pub mod tile;

pub use context::{FrameContext, FrameGlobals};
pub use frame::{FramePlan, FrameSnapshot};
pub use node::RenderNode;
pub use path::RenderPath;

/// Interleaved vertex stride expected from scene meshes:
/// position (3 f32), normal (3 f32), uv (2 f32).
pub const VERTEX_STRIDE: u64 = 32;

/// The vertex layout every geometry pass consumes.
#[must_use]
pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x3, // normal
        2 => Float32x2, // uv
    ];
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Rounds `value` up to a multiple of `alignment`.
#[must_use]
pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}
