//! Frustum Splitting
//!
//! Pure math for partitioning the camera frustum into cascade slabs,
//! extracted from the shadow pass for reuse and testability.
//!
//! The split boundaries follow the practical split scheme: a `lambda`-blend
//! of logarithmic and uniform spacing along the view depth axis.

use glam::Vec3;

use crate::scene::camera::RenderCamera;
use crate::scene::light::MAX_CASCADES;

/// Computes the `N + 1` cascade split boundaries for the practical split
/// scheme.
///
/// `lambda` blends between uniform (`0.0`) and logarithmic (`1.0`)
/// distribution. The result is strictly increasing with the first element
/// pinned to `near` and the last to `far`.
///
/// `cascade_count` is clamped to `[1, MAX_CASCADES]`; out-of-range counts
/// are rejected earlier, at configuration time.
#[must_use]
pub fn compute_frustum_splits(
    cascade_count: u32,
    near: f32,
    far: f32,
    lambda: f32,
) -> [f32; MAX_CASCADES as usize + 1] {
    let n = cascade_count.clamp(1, MAX_CASCADES) as usize;
    let mut splits = [far; MAX_CASCADES as usize + 1];
    splits[0] = near;

    for i in 1..n {
        let p = i as f32 / n as f32;
        let log_split = near * (far / near).powf(p);
        let uni_split = near + (far - near) * p;
        splits[i] = lambda * log_split + (1.0 - lambda) * uni_split;
    }

    // Boundaries past the active count stay pinned to far.
    splits[n] = far;
    splits
}

/// Computes the 8 corners of the view-space frustum slab between
/// `slice_near` and `slice_far`, in world space.
///
/// FOV and aspect ratio are recovered from the camera's projection matrix,
/// so the same code serves the main camera regardless of how it was built.
#[must_use]
pub fn compute_frustum_corners_world(
    camera: &RenderCamera,
    slice_near: f32,
    slice_far: f32,
) -> [Vec3; 8] {
    let proj = camera.projection_matrix;
    let tan_half_fov = 1.0 / proj.y_axis.y;
    let aspect = proj.y_axis.y / proj.x_axis.x;

    let h_near = tan_half_fov * slice_near;
    let w_near = h_near * aspect;
    let h_far = tan_half_fov * slice_far;
    let w_far = h_far * aspect;

    // Corners in view space (RH: -Z is forward)
    let corners_view = [
        // Near face (z = -slice_near)
        Vec3::new(-w_near, -h_near, -slice_near),
        Vec3::new(w_near, -h_near, -slice_near),
        Vec3::new(w_near, h_near, -slice_near),
        Vec3::new(-w_near, h_near, -slice_near),
        // Far face (z = -slice_far)
        Vec3::new(-w_far, -h_far, -slice_far),
        Vec3::new(w_far, -h_far, -slice_far),
        Vec3::new(w_far, h_far, -slice_far),
        Vec3::new(-w_far, h_far, -slice_far),
    ];

    let inv_view = camera.view_matrix.inverse();
    let mut corners_world = [Vec3::ZERO; 8];
    for (i, c) in corners_view.iter().enumerate() {
        corners_world[i] = inv_view.transform_point3(*c);
    }
    corners_world
}
