//! Frame Snapshot & Frame Plan
//!
//! Two immutable per-frame structures decouple planning from execution:
//!
//! - [`FrameSnapshot`] captures everything the pipeline reads from the scene
//!   at the start of the frame. No pass touches the live scene afterwards,
//!   so mid-frame scene mutation by the host cannot skew a pass.
//! - [`FramePlan`] is derived from the snapshot and the settings by pure
//!   math: cascade bounds, shadow layer assignment, packed light records,
//!   and the tile dispatch dimensions. Building a plan touches no GPU
//!   resources, which is what makes the geometric pipeline testable without
//!   a device.

use glam::{Mat4, Vec3};
use smallvec::SmallVec;

use crate::scene::aabb::Aabb;
use crate::scene::camera::{Frustum, RenderCamera};
use crate::scene::light::{Light, LightKind, ShadowConfig, ShadowFilter, MAX_CASCADES};
use crate::scene::query::{RenderItem, SceneQuery};
use crate::settings::PipelineSettings;

use super::lights::{pack_lights, LightGpu, SpotShadowGpu};
use super::shadow::cascade::{
    build_cascade_set, build_spot_view_projection, cascade_caster_frustum,
};
use super::tile::math::TileGrid;

/// Immutable capture of the scene for one frame.
pub struct FrameSnapshot {
    pub camera: RenderCamera,
    pub items: Vec<RenderItem>,
    pub lights: Vec<Light>,
    pub scene_bounds: Aabb,
}

impl FrameSnapshot {
    /// Pulls the frame's inputs through the injected [`SceneQuery`].
    #[must_use]
    pub fn capture(scene: &dyn SceneQuery, camera: RenderCamera) -> Self {
        Self {
            items: scene.visible_opaque_items(&camera),
            lights: scene.visible_lights(&camera),
            scene_bounds: scene.scene_bounds(),
            camera,
        }
    }
}

/// One shadow cascade ready to render: its storage layer, light-space bound,
/// and the frustum used to cull casters for it.
#[derive(Debug, Clone, Copy)]
pub struct CascadeView {
    pub layer: u32,
    pub bound: super::shadow::cascade::CascadeBound,
    pub caster_frustum: Frustum,
}

/// The directional light's shadow work for this frame.
#[derive(Debug, Clone)]
pub struct DirectionalPlan {
    /// Index into [`FrameSnapshot::lights`].
    pub light_index: usize,
    pub direction: Vec3,
    /// Color premultiplied by intensity.
    pub color: Vec3,
    pub light_view: Mat4,
    pub cascades: SmallVec<[CascadeView; MAX_CASCADES as usize]>,
    /// Far boundary of each cascade slab in camera view depth; entries past
    /// the active count stay pinned to camera far.
    pub splits: [f32; MAX_CASCADES as usize + 1],
    pub config: ShadowConfig,
}

/// One spot-light shadow view (single perspective layer, no splits).
#[derive(Debug, Clone, Copy)]
pub struct SpotShadowView {
    pub light_index: usize,
    pub layer: u32,
    pub view_projection: Mat4,
    pub caster_frustum: Frustum,
}

/// Tile-cull dispatch parameters for this frame.
#[derive(Debug, Clone, Copy)]
pub struct TilePlan {
    pub grid: TileGrid,
    pub max_lights_per_tile: u32,
    pub light_count: u32,
}

/// Everything the passes need, derived once per frame by pure math.
pub struct FramePlan {
    pub extent: (u32, u32),
    pub directional: Option<DirectionalPlan>,
    pub spot_shadows: Vec<SpotShadowView>,
    /// Shadow array layers this frame needs (cascades + spot views).
    pub shadow_layer_count: u32,
    /// Shadow map layout for the storage arena. Falls back to the default
    /// config when no light casts shadows this frame.
    pub shadow_map_size: u32,
    pub shadow_filter: ShadowFilter,
    /// Packed point/spot records, upload order = index order.
    pub lights_gpu: Vec<LightGpu>,
    /// Spot shadow view records, slot order matches [`FramePlan::spot_shadows`].
    pub spot_shadows_gpu: Vec<SpotShadowGpu>,
    pub lights_dropped: u32,
    pub tile: Option<TilePlan>,
}

impl FramePlan {
    /// Builds the plan for one frame. Degenerate inputs (no shadow casters,
    /// empty scene bound, zero lights) yield a plan whose affected parts are
    /// simply absent; nothing here is an error.
    #[must_use]
    pub fn build(
        settings: &PipelineSettings,
        snapshot: &FrameSnapshot,
        extent: (u32, u32),
    ) -> Self {
        let camera = &snapshot.camera;

        // First shadow-casting directional light takes the cascade budget.
        let directional = snapshot
            .lights
            .iter()
            .enumerate()
            .find(|(_, l)| l.cast_shadows && l.is_directional() && l.shadow.is_some())
            .and_then(|(light_index, light)| {
                let config = light.shadow.clone()?;
                let set =
                    build_cascade_set(camera, light.direction, &snapshot.scene_bounds, &config)?;
                let splits = super::shadow::splits::compute_frustum_splits(
                    config.cascade_count,
                    camera.near.max(0.1),
                    camera.far,
                    config.cascade_split_lambda,
                );
                let cascades = set
                    .bounds
                    .iter()
                    .enumerate()
                    .map(|(i, bound)| CascadeView {
                        layer: i as u32,
                        bound: *bound,
                        caster_frustum: cascade_caster_frustum(bound),
                    })
                    .collect();
                Some(DirectionalPlan {
                    light_index,
                    direction: light.direction,
                    color: light.color * light.intensity,
                    light_view: set.light_view,
                    cascades,
                    splits,
                    config,
                })
            });

        let cascade_layers = directional
            .as_ref()
            .map_or(0, |d| d.cascades.len() as u32);

        // Spot shadow views stack after the cascades in the same array.
        let mut spot_shadows = Vec::new();
        for (light_index, light) in snapshot.lights.iter().enumerate() {
            if !light.cast_shadows || light.shadow.is_none() {
                continue;
            }
            if let LightKind::Spot(spot) = &light.kind {
                let vp = build_spot_view_projection(
                    light.position,
                    light.direction,
                    spot.outer_cone,
                    spot.range,
                );
                spot_shadows.push(SpotShadowView {
                    light_index,
                    layer: cascade_layers + spot_shadows.len() as u32,
                    view_projection: vp,
                    caster_frustum: Frustum::from_matrix(vp),
                });
            }
        }

        let shadow_config = directional
            .as_ref()
            .map(|d| d.config.clone())
            .or_else(|| {
                spot_shadows
                    .first()
                    .and_then(|s| snapshot.lights[s.light_index].shadow.clone())
            })
            .unwrap_or_default();

        let mut packed = pack_lights(&snapshot.lights, &camera.frustum, settings.max_lights);

        // Join the spot shadow views back onto the packed records so the
        // shaders can reach each spot light's layer and projection. A view
        // whose light was culled or dropped still renders, nothing samples it.
        let mut spot_shadows_gpu = Vec::with_capacity(spot_shadows.len());
        for (slot, spot) in spot_shadows.iter().enumerate() {
            let light = &snapshot.lights[spot.light_index];
            let config = light.shadow.clone().unwrap_or_default();
            spot_shadows_gpu.push(SpotShadowGpu {
                view_projection: spot.view_projection.to_cols_array_2d(),
                params: [
                    config.bias,
                    config.normal_bias,
                    shadow_config.map_size as f32,
                    shadow_config.filter.shader_index() as f32,
                ],
            });
            if let Some(pos) = packed
                .source_indices
                .iter()
                .position(|&i| i == spot.light_index)
            {
                packed.records[pos].shadow_layer = spot.layer as i32;
                packed.records[pos].shadow_slot = slot as i32;
            }
        }

        let tile = settings.path.uses_tile_culling().then(|| TilePlan {
            grid: TileGrid::new(extent.0, extent.1, settings.tile_size),
            max_lights_per_tile: settings.max_lights_per_tile,
            light_count: packed.records.len() as u32,
        });

        Self {
            extent,
            shadow_layer_count: cascade_layers + spot_shadows.len() as u32,
            shadow_map_size: shadow_config.map_size,
            shadow_filter: shadow_config.filter,
            directional,
            spot_shadows,
            lights_gpu: packed.records,
            spot_shadows_gpu,
            lights_dropped: packed.dropped,
            tile,
        }
    }

    /// Whether any shadow rendering happens this frame.
    #[must_use]
    pub fn has_shadows(&self) -> bool {
        self.shadow_layer_count > 0
    }
}
