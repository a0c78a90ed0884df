//! Read-only interface to the external scene/query system.
//!
//! The pipeline receives a [`SceneQuery`] at construction and pulls visible
//! geometry and lights through it once per frame (per camera view). All
//! results are snapshotted into the frame before any pass runs.

use std::ops::Range;
use std::sync::Arc;

use glam::Mat4;

use super::aabb::Aabb;
use super::camera::RenderCamera;
use super::light::Light;

/// GPU-resident mesh data for one draw. Buffers are owned by the external
/// resource system; the pipeline only binds them.
#[derive(Debug, Clone)]
pub struct MeshBuffers {
    pub vertex_buffer: Arc<wgpu::Buffer>,
    pub index_buffer: Option<Arc<wgpu::Buffer>>,
    pub index_format: wgpu::IndexFormat,
    /// Index range when indexed, vertex range otherwise.
    pub draw_range: Range<u32>,
}

/// Scalar material inputs sampled by the G-buffer and forward shaders.
#[derive(Debug, Clone, Copy)]
pub struct MaterialParams {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            emissive: [0.0, 0.0, 0.0],
        }
    }
}

/// Material as the pipeline sees it: scalar parameters plus a stable key
/// for sort/batching. Texture binding stays in the host's own passes; this
/// core shades from the scalar channels.
#[derive(Debug, Clone)]
pub struct MaterialBinding {
    /// Stable sort key; items sharing a key share pipeline state.
    pub key: u64,
    pub params: MaterialParams,
}

/// One visible opaque draw: material, mesh, and world transform.
#[derive(Debug, Clone)]
pub struct RenderItem {
    pub material: MaterialBinding,
    pub mesh: MeshBuffers,
    pub world_matrix: Mat4,
    /// World-space bounds of the transformed mesh. The shadow pass tests
    /// these against each shadow view's caster frustum; [`Aabb::EMPTY`] is
    /// treated conservatively (the item is drawn into every view).
    pub bounds: Aabb,
    pub casts_shadows: bool,
}

/// Per-frame scene access. Implemented by the host engine; injected into
/// [`crate::RenderPath`] at construction so no pass reaches for globals.
pub trait SceneQuery {
    /// Visible opaque geometry for a camera view, front-to-back ordered.
    /// Called once per frame; every pass, shadow views included, draws from
    /// the same snapshot (shadow views re-cull it per cascade by bounds).
    fn visible_opaque_items(&self, camera: &RenderCamera) -> Vec<RenderItem>;

    /// Lights affecting the view. Read-only for the duration of the frame.
    fn visible_lights(&self, camera: &RenderCamera) -> Vec<Light>;

    /// World-space bounds of all shadow-casting geometry. May be
    /// [`Aabb::EMPTY`] for a scene with no geometry.
    fn scene_bounds(&self) -> Aabb;
}
