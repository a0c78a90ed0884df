//! Frustum split scheme tests: monotonicity, pinned boundaries, and the
//! uniform/logarithmic limit cases.

use lumen::pipeline::shadow::splits::{compute_frustum_corners_world, compute_frustum_splits};
use lumen::scene::camera::Camera;
use lumen::MAX_CASCADES;

use glam::Vec3;

fn assert_close(a: f32, b: f32, eps: f32, what: &str) {
    assert!(
        (a - b).abs() <= eps,
        "{what}: {a} vs {b} (eps {eps})"
    );
}

#[test]
fn splits_pin_near_and_far() {
    for count in 1..=MAX_CASCADES {
        for lambda in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let splits = compute_frustum_splits(count, 0.1, 500.0, lambda);
            assert_close(splits[0], 0.1, 1e-6, "first boundary");
            assert_close(splits[count as usize], 500.0, 1e-3, "last boundary");
            // Entries past the active count stay pinned to far.
            for s in &splits[count as usize..] {
                assert_close(*s, 500.0, 1e-3, "pinned tail");
            }
        }
    }
}

#[test]
fn splits_strictly_increase() {
    for count in 1..=MAX_CASCADES {
        for lambda in [0.0, 0.3, 0.5, 0.7, 1.0] {
            let splits = compute_frustum_splits(count, 0.5, 1000.0, lambda);
            for i in 0..count as usize {
                assert!(
                    splits[i] < splits[i + 1],
                    "boundaries must increase: splits[{i}]={} >= splits[{}]={} (n={count}, lambda={lambda})",
                    splits[i],
                    i + 1,
                    splits[i + 1],
                );
            }
        }
    }
}

#[test]
fn lambda_zero_is_uniform() {
    let splits = compute_frustum_splits(4, 1.0, 101.0, 0.0);
    assert_close(splits[1], 26.0, 1e-3, "uniform 1/4");
    assert_close(splits[2], 51.0, 1e-3, "uniform 2/4");
    assert_close(splits[3], 76.0, 1e-3, "uniform 3/4");
}

#[test]
fn lambda_one_is_logarithmic() {
    let near = 1.0;
    let far = 256.0;
    let splits = compute_frustum_splits(4, near, far, 1.0);
    for i in 1..4 {
        let expected = near * (far / near).powf(i as f32 / 4.0);
        assert_close(splits[i], expected, 1e-2, "log split");
    }
}

#[test]
fn logarithmic_splits_front_load_resolution() {
    // The log scheme concentrates boundaries near the camera, so the first
    // slab must be thinner than the uniform first slab.
    let uniform = compute_frustum_splits(4, 0.1, 400.0, 0.0);
    let log = compute_frustum_splits(4, 0.1, 400.0, 1.0);
    assert!(log[1] < uniform[1]);
}

#[test]
fn slab_corners_sit_on_slice_planes() {
    let mut camera = Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 100.0);
    camera.look_at(Vec3::new(3.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
    let rc = camera.render_camera();

    let corners = compute_frustum_corners_world(&rc, 2.0, 20.0);

    // Transformed back to view space, the near face sits at z = -2 and the
    // far face at z = -20.
    for (i, corner) in corners.iter().enumerate() {
        let view = rc.view_matrix.transform_point3(*corner);
        let expected = if i < 4 { -2.0 } else { -20.0 };
        assert_close(view.z, expected, 1e-3, "slice plane depth");
    }
}

#[test]
fn slab_corners_widen_with_depth() {
    let camera = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    let rc = camera.render_camera();
    let corners = compute_frustum_corners_world(&rc, 1.0, 10.0);

    let near_width = (corners[1] - corners[0]).length();
    let far_width = (corners[5] - corners[4]).length();
    assert_close(far_width / near_width, 10.0, 1e-3, "perspective widening");
}
