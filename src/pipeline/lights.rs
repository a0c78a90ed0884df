//! Packed Light Records & GPU Buffers
//!
//! Point and spot lights are packed once per frame into [`LightGpu`] records
//! and uploaded in index order. The index of a record in the upload is the
//! join key used by the tile light-index list and the shading shaders.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use log::warn;

use crate::scene::camera::Frustum;
use crate::scene::light::{Light, LightKind};

pub const LIGHT_KIND_POINT: u32 = 0;
pub const LIGHT_KIND_SPOT: u32 = 1;

/// One point/spot light as the GPU sees it. 64 bytes, `array<LightGpu>` in
/// WGSL with no implicit padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct LightGpu {
    pub position: [f32; 3],
    /// Influence radius; attenuation reaches zero here. The record carries
    /// no separate attenuation end: the falloff window is
    /// `attenuation_begin..range`.
    pub range: f32,
    /// Color premultiplied by intensity.
    pub color: [f32; 3],
    /// Distance where attenuation starts falling off.
    pub attenuation_begin: f32,
    pub direction: [f32; 3],
    pub kind: u32,
    pub cone_cos_inner: f32,
    pub cone_cos_outer: f32,
    /// Shadow arena layer of this light's shadow view, -1 when it has none.
    pub shadow_layer: i32,
    /// Index into the spot shadow view array, -1 when it has none.
    pub shadow_slot: i32,
}

/// One spot shadow view as the shading shaders see it: the projective
/// matrix plus (bias, normal_bias, map_size, filter_mode) packed in a vec4.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SpotShadowGpu {
    pub view_projection: [[f32; 4]; 4],
    pub params: [f32; 4],
}

/// Result of packing a frame's light queue.
#[derive(Debug, Default)]
pub struct PackedLights {
    pub records: Vec<LightGpu>,
    /// Index into the snapshot light list per record, same order. The plan
    /// uses this to join shadow layers back onto the packed records.
    pub source_indices: Vec<usize>,
    /// Lights discarded because the global budget was exceeded.
    pub dropped: u32,
    /// Lights culled by the camera frustum before upload.
    pub culled: u32,
}

/// Packs visible point/spot lights into GPU records.
///
/// Lights whose bounding sphere misses the camera frustum are dropped before
/// upload; lights past `max_lights` are dropped with a warning. Directional
/// lights are not packed here, they take the fullscreen path.
#[must_use]
pub fn pack_lights(lights: &[Light], frustum: &Frustum, max_lights: u32) -> PackedLights {
    let mut packed = PackedLights::default();

    for (index, light) in lights.iter().enumerate() {
        let (range, attenuation_begin) = match &light.kind {
            LightKind::Directional(_) => continue,
            LightKind::Point(p) => (p.range, p.attenuation_begin),
            LightKind::Spot(s) => (s.range, s.attenuation_begin),
        };

        if !frustum.intersects_sphere(light.position, range) {
            packed.culled += 1;
            continue;
        }

        if packed.records.len() as u32 >= max_lights {
            packed.dropped += 1;
            continue;
        }

        let record = match &light.kind {
            LightKind::Point(_) => LightGpu {
                position: light.position.to_array(),
                range,
                color: (light.color * light.intensity).to_array(),
                attenuation_begin,
                direction: Vec3::NEG_Y.to_array(),
                kind: LIGHT_KIND_POINT,
                cone_cos_inner: -1.0,
                cone_cos_outer: -1.0,
                shadow_layer: -1,
                shadow_slot: -1,
            },
            LightKind::Spot(s) => LightGpu {
                position: light.position.to_array(),
                range,
                color: (light.color * light.intensity).to_array(),
                attenuation_begin,
                direction: light.direction.to_array(),
                kind: LIGHT_KIND_SPOT,
                cone_cos_inner: s.inner_cone.cos(),
                cone_cos_outer: s.outer_cone.cos(),
                shadow_layer: -1,
                shadow_slot: -1,
            },
            LightKind::Directional(_) => unreachable!(),
        };
        packed.records.push(record);
        packed.source_indices.push(index);
    }

    if packed.dropped > 0 {
        warn!(
            "light budget exceeded: dropped {} of {} visible lights",
            packed.dropped,
            packed.dropped + packed.records.len() as u32
        );
    }

    packed
}

/// GPU-side storage for the packed light records.
///
/// The buffer grows by doubling and never shrinks; contents are rewritten
/// every frame.
pub struct LightBuffers {
    buffer: wgpu::Buffer,
    capacity: u32,
    spot_buffer: wgpu::Buffer,
    spot_capacity: u32,
}

impl LightBuffers {
    const LABEL: &'static str = "Light Records";
    const SPOT_LABEL: &'static str = "Spot Shadow Views";

    #[must_use]
    pub fn new(device: &wgpu::Device, initial_capacity: u32) -> Self {
        let capacity = initial_capacity.max(1);
        let spot_capacity = 4;
        Self {
            buffer: Self::create_buffer(device, capacity),
            capacity,
            spot_buffer: Self::create_spot_buffer(device, spot_capacity),
            spot_capacity,
        }
    }

    fn create_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(Self::LABEL),
            size: u64::from(capacity) * std::mem::size_of::<LightGpu>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_spot_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(Self::SPOT_LABEL),
            size: u64::from(capacity) * std::mem::size_of::<SpotShadowGpu>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Uploads this frame's records, doubling the buffers first if needed.
    /// Returns `true` when either buffer was reallocated (bind groups holding
    /// the old buffers are stale).
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        records: &[LightGpu],
        spots: &[SpotShadowGpu],
    ) -> bool {
        let needed = records.len() as u32;
        let mut reallocated = false;
        if needed > self.capacity {
            while self.capacity < needed {
                self.capacity *= 2;
            }
            self.buffer = Self::create_buffer(device, self.capacity);
            reallocated = true;
        }

        let spots_needed = spots.len() as u32;
        if spots_needed > self.spot_capacity {
            while self.spot_capacity < spots_needed {
                self.spot_capacity *= 2;
            }
            self.spot_buffer = Self::create_spot_buffer(device, self.spot_capacity);
            reallocated = true;
        }

        if !records.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(records));
        }
        if !spots.is_empty() {
            queue.write_buffer(&self.spot_buffer, 0, bytemuck::cast_slice(spots));
        }
        reallocated
    }

    #[must_use]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    #[must_use]
    pub fn spot_buffer(&self) -> &wgpu::Buffer {
        &self.spot_buffer
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
