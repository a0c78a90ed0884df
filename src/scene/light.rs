use glam::Vec3;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use crate::error::{LumenError, Result};

/// Maximum number of directional shadow cascades.
pub const MAX_CASCADES: u32 = 4;

/// Shadow map filtering mode. Selects both the runtime filter and the storage
/// format of the shadow atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowFilter {
    /// Percentage-closer filtering over the raw depth map.
    #[default]
    Pcf,
    /// Variance shadow maps: two-channel moments, blurrable.
    Vsm,
    /// Exponential variance shadow maps: four-channel warped moments.
    Evsm,
}

impl ShadowFilter {
    /// Texture format of the shadow map this filter samples.
    #[must_use]
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            Self::Pcf => wgpu::TextureFormat::Depth32Float,
            Self::Vsm => wgpu::TextureFormat::Rg32Float,
            Self::Evsm => wgpu::TextureFormat::Rgba32Float,
        }
    }

    /// Moment-based filters render depth into a color target and can be
    /// pre-blurred; plain PCF samples the depth attachment directly.
    #[must_use]
    pub fn uses_moments(self) -> bool {
        !matches!(self, Self::Pcf)
    }

    /// Filter selector as the shaders read it from the shading uniforms and
    /// the per-view shadow records.
    #[must_use]
    pub fn shader_index(self) -> u32 {
        match self {
            Self::Pcf => 0,
            Self::Vsm => 1,
            Self::Evsm => 2,
        }
    }
}

/// Per-light shadow rendering parameters.
#[derive(Debug, Clone)]
pub struct ShadowConfig {
    pub bias: f32,
    pub normal_bias: f32,
    /// Resolution of one shadow map layer. Must be a non-zero power of two.
    pub map_size: u32,
    /// Number of cascades (directional lights only), 1 to [`MAX_CASCADES`].
    pub cascade_count: u32,
    /// Blend between logarithmic (1.0) and uniform (0.0) cascade splits.
    pub cascade_split_lambda: f32,
    pub filter: ShadowFilter,
    /// Separable blur kernel width for moment-based filters. Odd, <= 15.
    pub blur_kernel_size: u32,
    /// Snap cascade bounds to texel increments to stop shimmer under camera
    /// translation.
    pub texel_snap: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            bias: 0.005,
            normal_bias: 0.02,
            map_size: 1024,
            cascade_count: MAX_CASCADES,
            cascade_split_lambda: 0.5,
            filter: ShadowFilter::Pcf,
            blur_kernel_size: 5,
            texel_snap: true,
        }
    }
}

impl ShadowConfig {
    /// Rejects unusable configurations up front, at light creation or config
    /// change time, never per frame.
    pub fn validate(&self) -> Result<()> {
        if self.cascade_count == 0 || self.cascade_count > MAX_CASCADES {
            return Err(LumenError::InvalidCascadeCount {
                count: self.cascade_count,
                max: MAX_CASCADES,
            });
        }
        if self.map_size == 0 || !self.map_size.is_power_of_two() {
            return Err(LumenError::InvalidShadowMapSize(self.map_size));
        }
        if self.blur_kernel_size % 2 == 0 || self.blur_kernel_size > 15 {
            return Err(LumenError::InvalidBlurKernel(self.blur_kernel_size));
        }
        if !(0.0..=1.0).contains(&self.cascade_split_lambda) {
            return Err(LumenError::InvalidSplitLambda(self.cascade_split_lambda));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DirectionalLight {}

#[derive(Debug, Clone)]
pub struct PointLight {
    pub range: f32,
    /// Distance at which attenuation starts falling off toward zero at
    /// `range`.
    pub attenuation_begin: f32,
}

#[derive(Debug, Clone)]
pub struct SpotLight {
    pub range: f32,
    pub attenuation_begin: f32,
    /// Inner cone half-angle in radians (full intensity inside).
    pub inner_cone: f32,
    /// Outer cone half-angle in radians (zero intensity outside).
    pub outer_cone: f32,
}

// High-level abstraction: light component in the scene
#[derive(Debug, Clone)]
pub enum LightKind {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
}

#[derive(Debug, Clone)]
pub struct Light {
    pub uuid: Uuid,
    pub id: u64,
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,

    /// World-space position. Ignored for directional lights.
    pub position: Vec3,
    /// Normalized direction the light points along. Ignored for point lights.
    pub direction: Vec3,

    pub cast_shadows: bool,
    pub shadow: Option<ShadowConfig>,
}

impl Light {
    fn generate_id_from_uuid(uuid: &Uuid) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        uuid.hash(&mut hasher);
        hasher.finish()
    }

    #[must_use]
    pub fn new_directional(color: Vec3, intensity: f32, direction: Vec3) -> Self {
        let uuid = Uuid::new_v4();
        Self {
            uuid,
            id: Self::generate_id_from_uuid(&uuid),
            color,
            intensity,
            kind: LightKind::Directional(DirectionalLight {}),
            position: Vec3::ZERO,
            direction: direction.normalize_or_zero(),
            cast_shadows: false,
            shadow: Some(ShadowConfig::default()),
        }
    }

    #[must_use]
    pub fn new_point(color: Vec3, intensity: f32, position: Vec3, range: f32) -> Self {
        let uuid = Uuid::new_v4();
        Self {
            uuid,
            id: Self::generate_id_from_uuid(&uuid),
            color,
            intensity,
            kind: LightKind::Point(PointLight {
                range,
                attenuation_begin: 0.0,
            }),
            position,
            direction: Vec3::NEG_Y,
            cast_shadows: false,
            shadow: Some(ShadowConfig::default()),
        }
    }

    #[must_use]
    pub fn new_spot(
        color: Vec3,
        intensity: f32,
        position: Vec3,
        direction: Vec3,
        range: f32,
        inner_cone: f32,
        outer_cone: f32,
    ) -> Self {
        let uuid = Uuid::new_v4();
        Self {
            uuid,
            id: Self::generate_id_from_uuid(&uuid),
            color,
            intensity,
            kind: LightKind::Spot(SpotLight {
                range,
                attenuation_begin: 0.0,
                inner_cone,
                outer_cone,
            }),
            position,
            direction: direction.normalize_or_zero(),
            cast_shadows: false,
            shadow: Some(ShadowConfig::default()),
        }
    }

    /// Bounding-sphere radius of the light's influence volume. Directional
    /// lights are unbounded and return `None`.
    #[must_use]
    pub fn influence_radius(&self) -> Option<f32> {
        match &self.kind {
            LightKind::Directional(_) => None,
            LightKind::Point(p) => Some(p.range),
            LightKind::Spot(s) => Some(s.range),
        }
    }

    #[must_use]
    pub fn is_directional(&self) -> bool {
        matches!(self.kind, LightKind::Directional(_))
    }
}
