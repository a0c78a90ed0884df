//! Resolution-Scoped Render Targets
//!
//! One arena owns every screen-sized texture: the G-buffer, the HDR
//! accumulation target, and the scene color target. Targets are rebuilt as
//! a unit when the layout changes and never individually; a resize with an
//! unchanged layout is a no-op.

use crate::error::{LumenError, Result};
use crate::settings::PipelineSettings;

/// HDR working format for light accumulation and scene color.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// G-buffer albedo (sRGB) + occlusion in alpha.
pub const GBUFFER_ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// G-buffer world-space normal, encoded in RGB.
pub const GBUFFER_NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// G-buffer metallic/roughness/emissive-strength.
pub const GBUFFER_MATERIAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// The pure description of a target set: compare two layouts to decide
/// whether a rebuild is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLayout {
    pub width: u32,
    pub height: u32,
    pub depth_format: wgpu::TextureFormat,
    /// Full G-buffer (deferred paths) or depth-only (forward paths).
    pub full_gbuffer: bool,
}

impl TargetLayout {
    pub fn new(settings: &PipelineSettings, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LumenError::InvalidExtent { width, height });
        }
        Ok(Self {
            width,
            height,
            depth_format: settings.depth_format,
            full_gbuffer: settings.path.uses_gbuffer(),
        })
    }
}

/// One screen-sized texture with its default view.
pub struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Target {
    fn new(
        device: &wgpu::Device,
        label: &str,
        layout: &TargetLayout,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: layout.width,
                height: layout.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// The target arena. Exclusively owned by one [`RenderPath`]; passes borrow
/// views through the frame context.
///
/// [`RenderPath`]: super::path::RenderPath
pub struct RenderTargets {
    layout: TargetLayout,
    pub depth: Target,
    /// `None` on depth-only layouts (forward path).
    pub gbuffer_albedo: Option<Target>,
    pub gbuffer_normal: Option<Target>,
    pub gbuffer_material: Option<Target>,
    /// Additive light accumulation target.
    pub light_accum: Target,
    /// Composited HDR scene color, input to tone mapping.
    pub scene_color: Target,
}

impl RenderTargets {
    #[must_use]
    pub fn new(device: &wgpu::Device, layout: TargetLayout) -> Self {
        let attach = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;

        let (gbuffer_albedo, gbuffer_normal, gbuffer_material) = if layout.full_gbuffer {
            (
                Some(Target::new(device, "GBuffer Albedo", &layout, GBUFFER_ALBEDO_FORMAT, attach)),
                Some(Target::new(device, "GBuffer Normal", &layout, GBUFFER_NORMAL_FORMAT, attach)),
                Some(Target::new(
                    device,
                    "GBuffer Material",
                    &layout,
                    GBUFFER_MATERIAL_FORMAT,
                    attach,
                )),
            )
        } else {
            (None, None, None)
        };

        Self {
            depth: Target::new(device, "Scene Depth", &layout, layout.depth_format, attach),
            gbuffer_albedo,
            gbuffer_normal,
            gbuffer_material,
            light_accum: Target::new(device, "Light Accumulation", &layout, HDR_FORMAT, attach),
            scene_color: Target::new(device, "Scene Color", &layout, HDR_FORMAT, attach),
            layout,
        }
    }

    /// Rebuilds the arena only when `layout` differs from the current one.
    /// Returns `true` on rebuild so dependent bind groups can refresh.
    pub fn ensure(&mut self, device: &wgpu::Device, layout: TargetLayout) -> bool {
        if self.layout == layout {
            return false;
        }
        *self = Self::new(device, layout);
        true
    }

    #[must_use]
    pub fn layout(&self) -> TargetLayout {
        self.layout
    }

    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.layout.width, self.layout.height)
    }
}
