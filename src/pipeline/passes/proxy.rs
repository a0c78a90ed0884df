//! Light Volume Proxies
//!
//! Low-poly bounding geometry rendered by the deferred accumulation pass to
//! restrict shading work to pixels a light can reach: a unit sphere for
//! point lights, a unit cone (apex at origin, opening along -Z, base at
//! z = -1 with radius 1) for spot lights. Both are scaled per light in the
//! vertex shader.
//!
//! Vertices are position-only; the fragment shader reads everything it
//! needs from the G-buffer.

use std::f32::consts::PI;

use wgpu::util::DeviceExt;

/// GPU-resident proxy mesh.
pub struct ProxyMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl ProxyMesh {
    fn upload(device: &wgpu::Device, label: &str, positions: &[[f32; 3]], indices: &[u16]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }
}

/// Position-only vertex layout for proxy volumes.
#[must_use]
pub fn proxy_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
    wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Unit sphere, coarse segments. The volume is inflated slightly so the
/// faceted hull never clips inside the true sphere.
#[must_use]
pub fn create_sphere_proxy(device: &wgpu::Device) -> ProxyMesh {
    let width_segments = 12u32;
    let height_segments = 8u32;
    // Circumscribe the facets around the unit sphere.
    let radius = 1.0 / (PI / width_segments as f32).cos();

    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for y in 0..=height_segments {
        let theta = y as f32 / height_segments as f32 * PI;
        let py = -radius * theta.cos();
        let ring_radius = radius * theta.sin();

        for x in 0..=width_segments {
            let phi = x as f32 / width_segments as f32 * 2.0 * PI;
            positions.push([-ring_radius * phi.cos(), py, ring_radius * phi.sin()]);
        }
    }

    let stride = width_segments + 1;
    for y in 0..height_segments {
        for x in 0..width_segments {
            let v0 = y * stride + x;
            let v1 = v0 + 1;
            let v2 = (y + 1) * stride + x;
            let v3 = v2 + 1;

            indices.push(v0 as u16);
            indices.push(v1 as u16);
            indices.push(v2 as u16);

            indices.push(v1 as u16);
            indices.push(v3 as u16);
            indices.push(v2 as u16);
        }
    }

    ProxyMesh::upload(device, "Point Light Proxy", &positions, &indices)
}

/// Unit cone: apex at the origin, base circle of radius 1 at z = -1. Scaled
/// in the shader by (range * tan(outer), range * tan(outer), range) and
/// oriented along the light direction.
#[must_use]
pub fn create_cone_proxy(device: &wgpu::Device) -> ProxyMesh {
    let segments = 16u32;
    // Circumscribe, same reasoning as the sphere.
    let radius = 1.0 / (PI / segments as f32).cos();

    let mut positions = vec![[0.0f32, 0.0, 0.0]]; // apex
    for x in 0..=segments {
        let phi = x as f32 / segments as f32 * 2.0 * PI;
        positions.push([radius * phi.cos(), radius * phi.sin(), -1.0]);
    }
    let base_center = positions.len() as u16;
    positions.push([0.0, 0.0, -1.0]);

    let mut indices = Vec::new();
    for x in 0..segments {
        let a = 1 + x as u16;
        let b = 2 + x as u16;
        // side
        indices.push(0);
        indices.push(a);
        indices.push(b);
        // base cap
        indices.push(base_center);
        indices.push(b);
        indices.push(a);
    }

    ProxyMesh::upload(device, "Spot Light Proxy", &positions, &indices)
}
