//! Tile culling tests against the CPU reference culler, which shares its
//! semantics with the compute shader: compacted index list, per-tile ranges,
//! and a global counter equal to the list length.

use glam::Vec3;

use lumen::pipeline::lights::{pack_lights, LightGpu, LIGHT_KIND_POINT};
use lumen::pipeline::tile::math::{cull_lights_cpu, TileGrid};
use lumen::scene::camera::Camera;
use lumen::Light;

fn point_record(position: Vec3, range: f32) -> LightGpu {
    LightGpu {
        position: position.to_array(),
        range,
        color: [1.0, 1.0, 1.0],
        attenuation_begin: 0.0,
        direction: [0.0, -1.0, 0.0],
        kind: LIGHT_KIND_POINT,
        cone_cos_inner: -1.0,
        cone_cos_outer: -1.0,
        shadow_layer: -1,
        shadow_slot: -1,
    }
}

fn forward_camera() -> Camera {
    // Identity view: camera at origin looking down -Z.
    Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 500.0)
}

// Small deterministic generator, no rng dependency needed.
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        ((self.0 >> 33) as f32) / ((1u64 << 31) as f32)
    }

    fn in_range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }
}

#[test]
fn grid_partitions_1080p_into_120_by_68() {
    let grid = TileGrid::new(1920, 1080, 16);
    assert_eq!(grid.tiles_x, 120);
    assert_eq!(grid.tiles_y, 68);
    assert_eq!(grid.tile_count(), 8160);

    // Bottom edge tiles are partial but still full tiles of the grid.
    let (_, y0, _, y1) = grid.tile_rect(0, 67);
    assert_eq!(y0, 1072);
    assert_eq!(y1, 1080);
}

#[test]
fn grid_index_is_row_major() {
    let grid = TileGrid::new(640, 480, 16);
    assert_eq!(grid.index(0, 0), 0);
    assert_eq!(grid.index(5, 0), 5);
    assert_eq!(grid.index(0, 1), grid.tiles_x);
    assert_eq!(grid.index(3, 2), 2 * grid.tiles_x + 3);
}

#[test]
fn centered_light_lands_in_the_center_tile() {
    let camera = forward_camera().render_camera();
    let grid = TileGrid::new(1920, 1080, 16);

    // Straight ahead of the camera: projects to the screen center.
    let lights = [point_record(Vec3::new(0.0, 0.0, -50.0), 2.0)];
    let out = cull_lights_cpu(&grid, &camera, &lights, 64);

    let center = grid.index(grid.tiles_x / 2, grid.tiles_y / 2) as usize;
    assert!(out.ranges[center].count > 0, "center tile must see the light");

    // A corner tile must not: the light's 2-unit sphere covers only a few
    // pixels around the center at that distance.
    assert_eq!(out.ranges[grid.index(0, 0) as usize].count, 0);
}

#[test]
fn light_behind_the_camera_is_nowhere() {
    let camera = forward_camera().render_camera();
    let grid = TileGrid::new(1280, 720, 16);

    let lights = [point_record(Vec3::new(0.0, 0.0, 100.0), 5.0)];
    let out = cull_lights_cpu(&grid, &camera, &lights, 64);

    assert_eq!(out.counter, 0);
    assert!(out.ranges.iter().all(|r| r.count == 0));
}

#[test]
fn huge_light_covers_every_tile() {
    let camera = forward_camera().render_camera();
    let grid = TileGrid::new(640, 360, 32);

    let lights = [point_record(Vec3::new(0.0, 0.0, -20.0), 10_000.0)];
    let out = cull_lights_cpu(&grid, &camera, &lights, 64);

    assert!(out.ranges.iter().all(|r| r.count == 1));
    assert_eq!(out.counter, grid.tile_count());
}

#[test]
fn compaction_invariants_hold_for_many_lights() {
    let camera = forward_camera().render_camera();
    let grid = TileGrid::new(1920, 1080, 16);
    let max_per_tile = 64;

    let mut lcg = Lcg(0x5eed);
    let lights: Vec<LightGpu> = (0..200)
        .map(|_| {
            point_record(
                Vec3::new(
                    lcg.in_range(-80.0, 80.0),
                    lcg.in_range(-40.0, 40.0),
                    lcg.in_range(-180.0, -5.0),
                ),
                lcg.in_range(1.0, 25.0),
            )
        })
        .collect();

    let out = cull_lights_cpu(&grid, &camera, &lights, max_per_tile);

    // Counter equals the compacted list length equals the sum of counts.
    assert_eq!(out.counter as usize, out.indices.len());
    let total: u32 = out.ranges.iter().map(|r| r.count).sum();
    assert_eq!(out.counter, total);

    assert_eq!(out.ranges.len() as u32, grid.tile_count());
    for range in &out.ranges {
        assert!(range.count <= max_per_tile);
        // The slice is in bounds of the compacted list.
        assert!((range.offset + range.count) as usize <= out.indices.len());
    }
    for index in &out.indices {
        assert!((*index as usize) < lights.len());
    }
}

#[test]
fn per_tile_budget_overflow_is_counted() {
    let camera = forward_camera().render_camera();
    let grid = TileGrid::new(320, 180, 16);

    // Three co-located lights, budget of one.
    let light = point_record(Vec3::new(0.0, 0.0, -30.0), 3.0);
    let lights = [light, light, light];
    let out = cull_lights_cpu(&grid, &camera, &lights, 1);

    assert!(out.overflow > 0);
    assert!(out.ranges.iter().all(|r| r.count <= 1));
}

#[test]
fn packing_skips_directionals_and_culls_offscreen() {
    let camera = forward_camera().render_camera();
    let lights = vec![
        Light::new_directional(Vec3::ONE, 2.0, Vec3::NEG_Y),
        Light::new_point(Vec3::ONE, 10.0, Vec3::new(0.0, 0.0, -20.0), 5.0),
        // Far behind the camera, outside the frustum.
        Light::new_point(Vec3::ONE, 10.0, Vec3::new(0.0, 0.0, 300.0), 5.0),
    ];

    let packed = pack_lights(&lights, &camera.frustum, 1024);
    assert_eq!(packed.records.len(), 1);
    assert_eq!(packed.culled, 1);
    assert_eq!(packed.dropped, 0);
}

#[test]
fn packing_enforces_the_global_budget() {
    let camera = forward_camera().render_camera();
    let lights: Vec<Light> = (0..10)
        .map(|i| {
            Light::new_point(
                Vec3::ONE,
                1.0,
                Vec3::new(i as f32, 0.0, -30.0),
                4.0,
            )
        })
        .collect();

    let packed = pack_lights(&lights, &camera.frustum, 4);
    assert_eq!(packed.records.len(), 4);
    assert_eq!(packed.dropped, 6);
}
