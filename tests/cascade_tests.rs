//! Cascade bound construction tests: shared z-range, texel snapping, and the
//! packed scale/offset remap.

use glam::{Vec2, Vec3, Vec4Swizzles};

use lumen::pipeline::shadow::cascade::{
    build_cascade_set, build_spot_view_projection, cascade_caster_frustum,
    directional_light_view, scene_z_range, snap_bounds_to_texels,
};
use lumen::pipeline::shadow::caster_visible;
use lumen::scene::camera::Camera;
use lumen::{Aabb, ShadowConfig};

fn assert_close(a: f32, b: f32, eps: f32, what: &str) {
    assert!((a - b).abs() <= eps, "{what}: {a} vs {b} (eps {eps})");
}

fn test_scene() -> Aabb {
    Aabb::from_points(&[Vec3::splat(-50.0), Vec3::splat(50.0)])
}

fn test_camera() -> Camera {
    let mut camera = Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 200.0);
    camera.look_at(Vec3::new(0.0, 5.0, 10.0), Vec3::ZERO, Vec3::Y);
    camera
}

#[test]
fn cascades_share_the_scene_z_range() {
    let camera = test_camera().render_camera();
    let direction = Vec3::new(-0.4, -1.0, -0.3).normalize();
    let config = ShadowConfig::default();

    let set = build_cascade_set(&camera, direction, &test_scene(), &config)
        .expect("non-degenerate scene");
    assert_eq!(set.bounds.len(), config.cascade_count as usize);

    let (z_min, z_max) = scene_z_range(&set.light_view, &test_scene());
    for bound in &set.bounds {
        assert_close(bound.min.z, z_min, 1e-4, "cascade z min");
        assert_close(bound.max.z, z_max, 1e-4, "cascade z max");
    }
}

#[test]
fn cascade_split_fars_ascend() {
    let camera = test_camera().render_camera();
    let config = ShadowConfig::default();
    let set = build_cascade_set(&camera, Vec3::NEG_Y, &test_scene(), &config)
        .expect("non-degenerate scene");

    for pair in set.bounds.windows(2) {
        assert!(pair[0].split_far < pair[1].split_far);
    }
    assert_close(
        set.bounds.last().expect("cascades").split_far,
        camera.far,
        1e-2,
        "last cascade reaches camera far",
    );
}

#[test]
fn empty_scene_yields_no_cascades() {
    let camera = test_camera().render_camera();
    let config = ShadowConfig::default();
    assert!(build_cascade_set(&camera, Vec3::NEG_Y, &Aabb::EMPTY, &config).is_none());
}

#[test]
fn snapping_preserves_extent() {
    let min = Vec2::new(-13.37, 7.77);
    let max = Vec2::new(29.11, 55.5);
    let (s_min, s_max) = snap_bounds_to_texels(min, max, 1024);

    assert_close((s_max - s_min).x, (max - min).x, 1e-4, "x extent");
    assert_close((s_max - s_min).y, (max - min).y, 1e-4, "y extent");
}

#[test]
fn snapping_is_idempotent() {
    let (min1, max1) =
        snap_bounds_to_texels(Vec2::new(-3.21, 4.56), Vec2::new(17.0, 21.9), 2048);
    let (min2, max2) = snap_bounds_to_texels(min1, max1, 2048);

    assert_close(min1.x, min2.x, 1e-4, "snapped min x");
    assert_close(min1.y, min2.y, 1e-4, "snapped min y");
    assert_close(max1.x, max2.x, 1e-4, "snapped max x");
    assert_close(max1.y, max2.y, 1e-4, "snapped max y");
}

#[test]
fn snapping_moves_min_by_whole_texels_under_translation() {
    let map_size = 1024;
    let min = Vec2::new(-10.0, -10.0);
    let max = Vec2::new(10.0, 10.0);
    let step = (max - min) / map_size as f32;

    let (a_min, _) = snap_bounds_to_texels(min, max, map_size);
    // Shift by a fraction of a texel; the snapped bound must land on the
    // same texel lattice.
    let shift = Vec2::splat(step.x * 0.3);
    let (b_min, _) = snap_bounds_to_texels(min + shift, max + shift, map_size);

    let moved = (b_min - a_min) / step;
    assert_close(moved.x, moved.x.round(), 1e-3, "whole-texel x motion");
    assert_close(moved.y, moved.y.round(), 1e-3, "whole-texel y motion");
}

#[test]
fn scale_offset_remap_bound_corners() {
    let camera = test_camera().render_camera();
    let config = ShadowConfig::default();
    let set = build_cascade_set(&camera, Vec3::new(-1.0, -1.0, 0.0), &test_scene(), &config)
        .expect("non-degenerate scene");

    for bound in &set.bounds {
        // (min.x, max.y, max.z) is the shadow-map origin: u = 0 at min x,
        // v = 0 at max y (v grows downward), depth 0 nearest the light.
        let origin = Vec3::new(bound.min.x, bound.max.y, bound.max.z);
        let uvz = origin * bound.scale.xyz() + bound.offset.xyz();
        assert_close(uvz.x, 0.0, 1e-4, "origin u");
        assert_close(uvz.y, 0.0, 1e-4, "origin v");
        assert_close(uvz.z, 0.0, 1e-4, "origin depth");

        let opposite = Vec3::new(bound.max.x, bound.min.y, bound.min.z);
        let uvz = opposite * bound.scale.xyz() + bound.offset.xyz();
        assert_close(uvz.x, 1.0, 1e-4, "opposite u");
        assert_close(uvz.y, 1.0, 1e-4, "opposite v");
        assert_close(uvz.z, 1.0, 1e-4, "opposite depth");
    }
}

#[test]
fn remap_matches_projection() {
    // The packed scale/offset must agree with the orthographic projection:
    // same uv (after the ndc-to-uv transform) and same depth.
    let camera = test_camera().render_camera();
    let config = ShadowConfig::default();
    let set = build_cascade_set(&camera, Vec3::new(-0.5, -1.0, -0.2), &test_scene(), &config)
        .expect("non-degenerate scene");

    let bound = &set.bounds[0];
    let sample_light = Vec3::new(
        bound.min.x * 0.25 + bound.max.x * 0.75,
        bound.min.y * 0.6 + bound.max.y * 0.4,
        bound.min.z * 0.3 + bound.max.z * 0.7,
    );

    let clip = bound.projection.project_point3(sample_light);
    let uv_from_proj = Vec2::new(clip.x * 0.5 + 0.5, 0.5 - clip.y * 0.5);

    let uvz = sample_light * bound.scale.xyz() + bound.offset.xyz();
    assert_close(uvz.x, uv_from_proj.x, 1e-4, "u against projection");
    assert_close(uvz.y, uv_from_proj.y, 1e-4, "v against projection");
    assert_close(uvz.z, clip.z, 1e-4, "depth against projection");
}

#[test]
fn caster_frustum_keeps_geometry_behind_the_slab() {
    let camera = test_camera().render_camera();
    let config = ShadowConfig::default();
    let direction = Vec3::NEG_Y;
    let set = build_cascade_set(&camera, direction, &test_scene(), &config)
        .expect("non-degenerate scene");

    let bound = &set.bounds[0];
    let frustum = cascade_caster_frustum(bound);

    // A caster floating far above the visible slab (toward the light) must
    // not be culled: the caster frustum has no near plane.
    let center_light = (bound.min + bound.max) * 0.5;
    let above_light = Vec3::new(center_light.x, center_light.y, bound.max.z + 500.0);
    let above_world = set.light_view.inverse().transform_point3(above_light);
    assert!(frustum.intersects_sphere(above_world, 1.0));
}

#[test]
fn shadow_views_cull_casters_by_bounds() {
    let camera = test_camera().render_camera();
    let config = ShadowConfig::default();
    let set = build_cascade_set(&camera, Vec3::NEG_Y, &test_scene(), &config)
        .expect("non-degenerate scene");

    let bound = &set.bounds[0];
    let frustum = cascade_caster_frustum(bound);
    let to_world = set.light_view.inverse();

    // A caster inside the cascade slab stays in the view's draw list.
    let center = to_world.transform_point3((bound.min + bound.max) * 0.5);
    let inside = Aabb::from_points(&[center - Vec3::ONE, center + Vec3::ONE]);
    assert!(caster_visible(&inside, &frustum));

    // One far outside the slab's lateral extent does not.
    let aside_light = Vec3::new(
        bound.max.x + 5000.0,
        (bound.min.y + bound.max.y) * 0.5,
        (bound.min.z + bound.max.z) * 0.5,
    );
    let aside = to_world.transform_point3(aside_light);
    let outside = Aabb::from_points(&[aside - Vec3::ONE, aside + Vec3::ONE]);
    assert!(!caster_visible(&outside, &frustum));

    // Unknown bounds are conservative: always drawn.
    assert!(caster_visible(&Aabb::EMPTY, &frustum));
}

#[test]
fn directional_view_handles_vertical_light() {
    // Straight-down light hits the up-vector degeneracy; the fallback axis
    // must keep the matrix finite.
    let view = directional_light_view(Vec3::NEG_Y);
    assert!(view.is_finite());
    let view = directional_light_view(Vec3::Y);
    assert!(view.is_finite());
}

#[test]
fn spot_projection_contains_the_cone() {
    let position = Vec3::new(2.0, 4.0, -1.0);
    let direction = Vec3::new(0.0, -1.0, 0.0);
    let outer = 0.5;
    let range = 30.0;
    let vp = build_spot_view_projection(position, direction, outer, range);

    // A surface point down the axis at half range lands inside clip space.
    let p = vp.project_point3(position + direction * (range * 0.5));
    assert!(p.x.abs() <= 1.0 && p.y.abs() <= 1.0);
    assert!(p.z > 0.0 && p.z < 1.0);

    // A point just inside the cone edge stays inside.
    let edge_dir = Vec3::new(outer.tan() * 0.95, -1.0, 0.0).normalize();
    let p = vp.project_point3(position + edge_dir * (range * 0.5));
    assert!(p.x.abs() <= 1.0 && p.y.abs() <= 1.0);
}
