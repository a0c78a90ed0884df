//! Cascade Bounds
//!
//! Builds the light-space bound and orthographic projection for each shadow
//! cascade. Pure math: no GPU resources are touched here.
//!
//! The pipeline is: slab corners (from [`splits`]) → light view space →
//! AABB → z-range replaced by the global scene z-range → blur margin →
//! texel snap → orthographic projection + packed scale/offset vectors.
//!
//! [`splits`]: super::splits

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::scene::aabb::Aabb;
use crate::scene::camera::{Frustum, RenderCamera};
use crate::scene::light::ShadowConfig;

use super::splits::{compute_frustum_corners_world, compute_frustum_splits};

/// One cascade's light-space bound and the matrices/vectors derived from it.
#[derive(Debug, Clone, Copy)]
pub struct CascadeBound {
    /// Light-space AABB after z-sharing, margin, and snapping.
    pub min: Vec3,
    pub max: Vec3,
    /// Orthographic projection over `min..max`.
    pub projection: Mat4,
    /// `projection * light_view` for the depth pass.
    pub view_projection: Mat4,
    /// Packed remap so shaders compute
    /// `shadow_uvz = light_view_pos * scale + offset` without a per-sample
    /// matrix multiply. `w` components are unused padding.
    pub scale: Vec4,
    pub offset: Vec4,
    /// Far boundary of this cascade's slab in camera view depth, used by the
    /// shading shader to select the cascade.
    pub split_far: f32,
}

/// All cascades of one directional light for one frame, sharing a single
/// light view matrix.
#[derive(Debug, Clone)]
pub struct CascadeSet {
    pub light_view: Mat4,
    pub bounds: Vec<CascadeBound>,
}

/// View matrix of a directional light: looks along `direction` from the
/// world origin. Directional lights have no position, only an orientation.
#[must_use]
pub fn directional_light_view(direction: Vec3) -> Mat4 {
    let safe_dir = if direction.length_squared() > 1e-6 {
        direction.normalize()
    } else {
        -Vec3::Z
    };
    let up = if safe_dir.y.abs() > 0.99 { Vec3::X } else { Vec3::Y };
    Mat4::look_at_rh(Vec3::ZERO, safe_dir, up)
}

/// Light-space z-range of the scene bound. Every cascade adopts this range
/// so neighboring cascades can never disagree about shadow depth (the
/// cause of visible seams at cascade boundaries).
#[must_use]
pub fn scene_z_range(light_view: &Mat4, scene_bounds: &Aabb) -> (f32, f32) {
    let mut z_min = f32::MAX;
    let mut z_max = f32::MIN;
    for corner in scene_bounds.corners() {
        let z = light_view.transform_point3(corner).z;
        z_min = z_min.min(z);
        z_max = z_max.max(z);
    }
    (z_min, z_max)
}

/// Snaps a light-space XY bound to whole-texel increments.
///
/// The texel step is `extent / map_size` per axis. The extent is preserved
/// and only the min corner is translated, so snapping an already-snapped
/// bound is a no-op and camera translation moves the shadow by whole texels
/// only (no sub-pixel shimmer).
#[must_use]
pub fn snap_bounds_to_texels(min: Vec2, max: Vec2, map_size: u32) -> (Vec2, Vec2) {
    let extent = max - min;
    let texels = map_size.max(1) as f32;
    let step = extent / texels;

    let mut snapped_min = min;
    if step.x > 0.0 {
        snapped_min.x = (min.x / step.x).round() * step.x;
    }
    if step.y > 0.0 {
        snapped_min.y = (min.y / step.y).round() * step.y;
    }
    (snapped_min, snapped_min + extent)
}

/// Builds one cascade bound from a frustum slab.
///
/// `z_range` is the shared scene z-range from [`scene_z_range`].
/// `margin_texels` is the extra border (in shadow-map texels) reserved for
/// the blur kernel so filtering never reads outside the cascade.
#[must_use]
pub fn build_cascade_bound(
    light_view: &Mat4,
    slab_corners: &[Vec3; 8],
    z_range: (f32, f32),
    config: &ShadowConfig,
    split_far: f32,
) -> CascadeBound {
    let mut ls_min = Vec3::splat(f32::MAX);
    let mut ls_max = Vec3::splat(f32::MIN);
    for c in slab_corners {
        let ls = light_view.transform_point3(*c);
        ls_min = ls_min.min(ls);
        ls_max = ls_max.max(ls);
    }

    // All cascades share the scene z-range.
    ls_min.z = z_range.0;
    ls_max.z = z_range.1;

    // Reserve a blur-kernel border so filtering stays inside the cascade.
    let margin_texels = (config.blur_kernel_size / 2 + 1) as f32;
    let map_size = config.map_size.max(1) as f32;
    let margin = Vec2::new(
        (ls_max.x - ls_min.x) * margin_texels / map_size,
        (ls_max.y - ls_min.y) * margin_texels / map_size,
    );
    ls_min.x -= margin.x;
    ls_max.x += margin.x;
    ls_min.y -= margin.y;
    ls_max.y += margin.y;

    // Snap before building the projection; snapping afterwards would leave
    // the projection itself unstable under camera translation.
    if config.texel_snap {
        let (snapped_min, snapped_max) = snap_bounds_to_texels(
            Vec2::new(ls_min.x, ls_min.y),
            Vec2::new(ls_max.x, ls_max.y),
            config.map_size,
        );
        ls_min.x = snapped_min.x;
        ls_min.y = snapped_min.y;
        ls_max.x = snapped_max.x;
        ls_max.y = snapped_max.y;
    }

    let projection = Mat4::orthographic_rh(
        ls_min.x, ls_max.x, ls_min.y, ls_max.y, -ls_max.z,
        -ls_min.z, // glam orthographic_rh: near/far are positive distances
    );

    let extent = ls_max - ls_min;
    // Remap light-view-space position to (u, v, depth): u grows with +x,
    // v grows downward against +y, depth runs from the light toward -z.
    let scale = Vec4::new(1.0 / extent.x, -1.0 / extent.y, -1.0 / extent.z, 0.0);
    let offset = Vec4::new(
        -ls_min.x / extent.x,
        ls_max.y / extent.y,
        ls_max.z / extent.z,
        0.0,
    );

    CascadeBound {
        min: ls_min,
        max: ls_max,
        projection,
        view_projection: projection * *light_view,
        scale,
        offset,
        split_far,
    }
}

/// Builds the full cascade set for a directional light.
///
/// Returns `None` when the scene bound is degenerate (empty scene): shadows
/// are skipped for the frame rather than projecting a zero-volume box.
#[must_use]
pub fn build_cascade_set(
    camera: &RenderCamera,
    light_direction: Vec3,
    scene_bounds: &Aabb,
    config: &ShadowConfig,
) -> Option<CascadeSet> {
    if scene_bounds.is_empty() {
        return None;
    }

    let light_view = directional_light_view(light_direction);
    let z_range = scene_z_range(&light_view, scene_bounds);
    if z_range.1 - z_range.0 <= 0.0 {
        return None;
    }

    let near = camera.near.max(0.1);
    let far = camera.far.max(near + 0.1);
    let splits = compute_frustum_splits(
        config.cascade_count,
        near,
        far,
        config.cascade_split_lambda,
    );

    let count = config.cascade_count as usize;
    let mut bounds = Vec::with_capacity(count);
    for i in 0..count {
        let corners = compute_frustum_corners_world(camera, splits[i], splits[i + 1]);
        bounds.push(build_cascade_bound(
            &light_view,
            &corners,
            z_range,
            config,
            splits[i + 1],
        ));
    }

    Some(CascadeSet { light_view, bounds })
}

/// Caster-culling frustum for one cascade. The near plane is disabled so
/// geometry between the light and the slab still casts into it.
#[must_use]
pub fn cascade_caster_frustum(bound: &CascadeBound) -> Frustum {
    Frustum::from_matrix_shadow_caster(bound.view_projection)
}

/// Perspective view-projection for a spot light shadow.
#[must_use]
pub fn build_spot_view_projection(
    position: Vec3,
    direction: Vec3,
    outer_cone: f32,
    range: f32,
) -> Mat4 {
    let safe_dir = if direction.length_squared() > 1e-6 {
        direction.normalize()
    } else {
        -Vec3::Z
    };
    let up = if safe_dir.y.abs() > 0.99 { Vec3::X } else { Vec3::Y };
    let view = Mat4::look_at_rh(position, position + safe_dir, up);
    let fov = (outer_cone * 2.0).clamp(0.1, std::f32::consts::PI - 0.01);
    let far = range.max(1.0);
    let proj = Mat4::perspective_rh(fov, 1.0, 0.1, far);
    proj * view
}
