//! Tile Culling Math
//!
//! Pure geometry for the screen-space tile partition, plus a CPU reference
//! culler with the exact semantics of the GPU compute pass. The reference
//! culler backs the integration tests and debug validation; per frame only
//! the GPU path runs.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

use crate::pipeline::lights::LightGpu;
use crate::scene::camera::RenderCamera;

/// Per-tile slice of the global light-index list.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TileRange {
    pub count: u32,
    pub offset: u32,
}

/// The screen-space tile partition for one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl TileGrid {
    /// Partitions a `width x height` screen into `tile_size` tiles. Edge
    /// tiles may be partial; they still get a full tile frustum clamped to
    /// the screen rect.
    #[must_use]
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        Self {
            width,
            height,
            tile_size,
            tiles_x: width.div_ceil(tile_size),
            tiles_y: height.div_ceil(tile_size),
        }
    }

    #[must_use]
    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    /// Flat tile index, row-major.
    #[must_use]
    pub fn index(&self, tx: u32, ty: u32) -> u32 {
        ty * self.tiles_x + tx
    }

    /// Pixel rect of one tile, clamped to the screen.
    #[must_use]
    pub fn tile_rect(&self, tx: u32, ty: u32) -> (u32, u32, u32, u32) {
        let x0 = tx * self.tile_size;
        let y0 = ty * self.tile_size;
        let x1 = (x0 + self.tile_size).min(self.width);
        let y1 = (y0 + self.tile_size).min(self.height);
        (x0, y0, x1, y1)
    }
}

fn unproject_ndc(inv_projection: &Mat4, ndc: Vec3) -> Vec3 {
    let v = *inv_projection * ndc.extend(1.0);
    v.xyz() / v.w
}

/// The four side planes of a tile's view-space frustum, all passing through
/// the eye with normals pointing into the tile volume.
#[must_use]
pub fn tile_side_planes(grid: &TileGrid, tx: u32, ty: u32, inv_projection: &Mat4) -> [Vec4; 4] {
    let (x0, y0, x1, y1) = grid.tile_rect(tx, ty);
    let w = grid.width as f32;
    let h = grid.height as f32;

    let ndc_x0 = 2.0 * x0 as f32 / w - 1.0;
    let ndc_x1 = 2.0 * x1 as f32 / w - 1.0;
    let ndc_y0 = 1.0 - 2.0 * y0 as f32 / h;
    let ndc_y1 = 1.0 - 2.0 * y1 as f32 / h;

    // Tile corners on the far plane (z_ndc = 1), in view space.
    let tl = unproject_ndc(inv_projection, Vec3::new(ndc_x0, ndc_y0, 1.0));
    let tr = unproject_ndc(inv_projection, Vec3::new(ndc_x1, ndc_y0, 1.0));
    let bl = unproject_ndc(inv_projection, Vec3::new(ndc_x0, ndc_y1, 1.0));
    let br = unproject_ndc(inv_projection, Vec3::new(ndc_x1, ndc_y1, 1.0));
    let center = (tl + tr + bl + br) * 0.25;

    let plane = |a: Vec3, b: Vec3| -> Vec4 {
        let mut n = a.cross(b).normalize_or_zero();
        // Orient the normal into the tile volume.
        if n.dot(center) < 0.0 {
            n = -n;
        }
        n.extend(0.0) // planes pass through the eye, so d = 0
    };

    [
        plane(tl, bl), // left
        plane(tr, br), // right
        plane(tl, tr), // top
        plane(bl, br), // bottom
    ]
}

/// Sphere-vs-tile-frustum test in view space. `depth_range` is the tile's
/// positive view depth slab (min, max).
#[must_use]
pub fn sphere_intersects_tile(
    planes: &[Vec4; 4],
    depth_range: (f32, f32),
    center_view: Vec3,
    radius: f32,
) -> bool {
    let depth = -center_view.z;
    if depth + radius < depth_range.0 || depth - radius > depth_range.1 {
        return false;
    }
    for plane in planes {
        let n = plane.xyz();
        if n.length_squared() < f32::EPSILON {
            continue;
        }
        if n.dot(center_view) < -radius {
            return false;
        }
    }
    true
}

/// Output of the CPU reference culler, mirroring the GPU buffers.
#[derive(Debug, Default)]
pub struct CullOutput {
    /// One [`TileRange`] per tile, row-major.
    pub ranges: Vec<TileRange>,
    /// Compacted light-index list; each tile's slice is
    /// `indices[offset..offset + count]`.
    pub indices: Vec<u32>,
    /// Global append counter after culling; equals `indices.len()`.
    pub counter: u32,
    /// Assignments discarded because a tile hit `max_lights_per_tile`.
    pub overflow: u32,
}

/// CPU reference implementation of the tile light cull.
///
/// Semantically identical to the compute shader: the counter starts at zero
/// and every passing (tile, light) pair appends one index. Lacking a depth
/// buffer, every tile uses the full camera depth slab, which is
/// conservative: it can only add false positives, never lose a light.
#[must_use]
pub fn cull_lights_cpu(
    grid: &TileGrid,
    camera: &RenderCamera,
    lights: &[LightGpu],
    max_lights_per_tile: u32,
) -> CullOutput {
    let inv_projection = camera.projection_matrix.inverse();
    let depth_range = (camera.near, camera.far);

    let mut out = CullOutput {
        ranges: Vec::with_capacity(grid.tile_count() as usize),
        ..CullOutput::default()
    };

    for ty in 0..grid.tiles_y {
        for tx in 0..grid.tiles_x {
            let planes = tile_side_planes(grid, tx, ty, &inv_projection);
            let offset = out.indices.len() as u32;
            let mut count = 0u32;

            for (light_index, light) in lights.iter().enumerate() {
                let center_view = camera
                    .view_matrix
                    .transform_point3(Vec3::from_array(light.position));
                if !sphere_intersects_tile(&planes, depth_range, center_view, light.range) {
                    continue;
                }
                if count >= max_lights_per_tile {
                    out.overflow += 1;
                    continue;
                }
                out.indices.push(light_index as u32);
                count += 1;
            }

            out.ranges.push(TileRange { count, offset });
        }
    }

    out.counter = out.indices.len() as u32;
    out
}
