use glam::{Affine3A, Mat4, Vec3, Vec3A, Vec4};
use std::borrow::Cow;
use uuid::Uuid;

/// Scene camera. Owned by the frame/viewport; the pipeline only reads the
/// per-frame [`RenderCamera`] snapshot taken from it.
#[derive(Debug, Clone)]
pub struct Camera {
    pub uuid: Uuid,
    pub name: Cow<'static, str>,

    pub projection_type: ProjectionType,
    /// Vertical field of view in radians (perspective only).
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Half-height of the view volume (orthographic only).
    pub ortho_size: f32,

    // Cached matrices, recomputed when any input changes.
    world_matrix: Affine3A,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    frustum: Frustum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

impl Camera {
    /// Creates a perspective camera. `fov` is the vertical field of view in
    /// degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            uuid: Uuid::new_v4(),
            name: Cow::Borrowed("Camera"),
            projection_type: ProjectionType::Perspective,
            fov: fov.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,

            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        cam.update_projection_matrix();
        cam
    }

    #[must_use]
    pub fn new_orthographic(ortho_size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::new_perspective(60.0, aspect, near, far);
        cam.projection_type = ProjectionType::Orthographic;
        cam.ortho_size = ortho_size;
        cam.update_projection_matrix();
        cam
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => {
                // glam's perspective_rh targets the WGPU/Vulkan depth range [0, 1]
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let h = self.ortho_size;
                let w = h * self.aspect;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };
        self.refresh_derived();
    }

    /// Updates the cached view matrix from a scene-owned world transform.
    pub fn update_view_transform(&mut self, world_transform: &Affine3A) {
        self.world_matrix = *world_transform;
        self.view_matrix = Mat4::from(*world_transform).inverse();
        self.refresh_derived();
    }

    /// Positions the camera at `eye` looking at `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.view_matrix = Mat4::look_at_rh(eye, target, up);
        self.world_matrix = Affine3A::from_mat4(self.view_matrix.inverse());
        self.refresh_derived();
    }

    fn refresh_derived(&mut self) {
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.world_matrix.translation.into()
    }

    /// Takes the immutable per-frame snapshot the pipeline consumes.
    #[must_use]
    pub fn render_camera(&self) -> RenderCamera {
        RenderCamera {
            view_matrix: self.view_matrix,
            projection_matrix: self.projection_matrix,
            view_projection_matrix: self.view_projection_matrix,
            position: self.world_matrix.translation,
            frustum: self.frustum,
            near: self.near,
            far: self.far,
        }
    }
}

/// Flat snapshot of a camera's derived state for one frame.
///
/// Every pass reads this snapshot instead of the live [`Camera`], so mid-frame
/// mutation of the scene camera cannot desynchronize the passes.
#[derive(Debug, Clone, Copy)]
pub struct RenderCamera {
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub view_projection_matrix: Mat4,
    pub position: Vec3A,
    pub frustum: Frustum,
    pub near: f32,
    pub far: f32,
}

/// View frustum as six inward-facing planes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Gribb-Hartmann plane extraction for a WGPU-style `[0, 1]` depth range.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0], // Left
            rows[3] - rows[0], // Right
            rows[3] + rows[1], // Bottom
            rows[3] - rows[1], // Top
            rows[2],           // Near (z >= 0 in NDC)
            rows[3] - rows[2], // Far
        ];

        for plane in &mut planes {
            let length = Vec3::new(plane.x, plane.y, plane.z).length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }

        Self { planes }
    }

    /// Like [`Frustum::from_matrix`] but with the near plane disabled, so
    /// shadow casters between the light and the visible volume are never
    /// culled. Only the XY bounds and far plane limit the caster set.
    #[must_use]
    pub fn from_matrix_shadow_caster(m: Mat4) -> Self {
        let mut frustum = Self::from_matrix(m);
        frustum.planes[4] = Vec4::ZERO;
        frustum
    }

    /// Sphere-frustum intersection. Conservative: may report an intersection
    /// for spheres near a frustum corner, never misses a true intersection.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        for plane in &self.planes {
            if plane.length_squared() < f32::EPSILON {
                continue; // disabled plane
            }
            let dist = plane.x * center.x + plane.y * center.y + plane.z * center.z + plane.w;
            if dist < -radius {
                return false;
            }
        }
        true
    }

    #[must_use]
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.intersects_sphere(p, 0.0)
    }
}
