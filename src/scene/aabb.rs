use glam::Vec3;

/// Axis-aligned bounding box in world space.
///
/// An empty box (min > max on any axis) is a valid value and marks a scene
/// with no geometry; consumers must treat it as "skip", never as a zero-size
/// box at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// The empty box. Growing it by any point yields that point.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.grow(*p);
        }
        aabb
    }

    /// Returns `true` when the box contains no volume (degenerate scene).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The 8 corners, min-corner first.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (n, x) = (self.min, self.max);
        [
            Vec3::new(n.x, n.y, n.z),
            Vec3::new(x.x, n.y, n.z),
            Vec3::new(n.x, x.y, n.z),
            Vec3::new(x.x, x.y, n.z),
            Vec3::new(n.x, n.y, x.z),
            Vec3::new(x.x, n.y, x.z),
            Vec3::new(n.x, x.y, x.z),
            Vec3::new(x.x, x.y, x.z),
        ]
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}
