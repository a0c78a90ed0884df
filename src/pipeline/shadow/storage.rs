//! Shadow Map Storage
//!
//! Arena for the shadow texture array and its per-layer views. Layers are
//! assigned by the frame plan: directional cascades first, then one layer
//! per shadow-casting spot light.
//!
//! The storage is keyed by a [`ShadowLayout`]; `ensure` compares layouts and
//! re-derives everything on a mismatch. Nothing here is mutated in place: a
//! filter-mode change (which changes the texture format) or a cascade-count
//! change produces a whole new arena.

use crate::scene::light::ShadowFilter;

/// The pure description of a shadow arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowLayout {
    pub map_size: u32,
    pub layer_count: u32,
    pub filter: ShadowFilter,
}

/// Shadow texture array plus render/sample views and samplers.
pub struct ShadowMapStorage {
    layout: ShadowLayout,
    /// Depth array for PCF; moment color array for VSM/EVSM.
    texture: wgpu::Texture,
    /// One render-attachment view per layer.
    layer_views: Vec<wgpu::TextureView>,
    /// Whole-array view bound by the shading shaders.
    array_view: wgpu::TextureView,
    /// Scratch depth attachment shared by all layers of moment formats.
    moment_depth: Option<wgpu::Texture>,
    moment_depth_view: Option<wgpu::TextureView>,
    comparison_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
}

impl ShadowMapStorage {
    #[must_use]
    pub fn new(device: &wgpu::Device, layout: ShadowLayout) -> Self {
        let layer_count = layout.layer_count.max(1);
        let format = layout.filter.texture_format();

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map Array"),
            size: wgpu::Extent3d {
                width: layout.map_size,
                height: layout.map_size,
                depth_or_array_layers: layer_count,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let layer_views = (0..layer_count)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Shadow Layer"),
                    format: None,
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    aspect: wgpu::TextureAspect::All,
                    base_mip_level: 0,
                    mip_level_count: Some(1),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    usage: Some(wgpu::TextureUsages::RENDER_ATTACHMENT),
                })
            })
            .collect();

        let array_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Shadow Array View"),
            format: None,
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: Some(1),
            base_array_layer: 0,
            array_layer_count: Some(layer_count),
            usage: Some(wgpu::TextureUsages::TEXTURE_BINDING),
        });

        // Moment formats render depth into color and still need a real depth
        // attachment for occlusion among casters.
        let (moment_depth, moment_depth_view) = if layout.filter.uses_moments() {
            let depth = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Shadow Moment Depth"),
                size: wgpu::Extent3d {
                    width: layout.map_size,
                    height: layout.map_size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Depth32Float,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = depth.create_view(&wgpu::TextureViewDescriptor::default());
            (Some(depth), Some(view))
        } else {
            (None, None)
        };

        let comparison_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Comparison Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Moment Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            layout: ShadowLayout { layer_count, ..layout },
            texture,
            layer_views,
            array_view,
            moment_depth,
            moment_depth_view,
            comparison_sampler,
            linear_sampler,
        }
    }

    /// Lazily re-derives the arena when the layout changed. Idempotent for
    /// an unchanged layout. Returns `true` on rebuild so bind groups holding
    /// the old views can refresh.
    pub fn ensure(&mut self, device: &wgpu::Device, layout: ShadowLayout) -> bool {
        let wanted = ShadowLayout {
            layer_count: layout.layer_count.max(1),
            ..layout
        };
        if self.layout == wanted {
            return false;
        }
        *self = Self::new(device, wanted);
        true
    }

    #[must_use]
    pub fn layout(&self) -> ShadowLayout {
        self.layout
    }

    /// Render-attachment view of one layer.
    #[must_use]
    pub fn layer_view(&self, layer: u32) -> &wgpu::TextureView {
        &self.layer_views[layer as usize]
    }

    #[must_use]
    pub fn array_view(&self) -> &wgpu::TextureView {
        &self.array_view
    }

    /// Shared scratch depth attachment for moment formats.
    #[must_use]
    pub fn moment_depth_view(&self) -> Option<&wgpu::TextureView> {
        self.moment_depth_view.as_ref()
    }

    #[must_use]
    pub fn comparison_sampler(&self) -> &wgpu::Sampler {
        &self.comparison_sampler
    }

    #[must_use]
    pub fn linear_sampler(&self) -> &wgpu::Sampler {
        &self.linear_sampler
    }

    #[must_use]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[must_use]
    pub fn is_moment_storage(&self) -> bool {
        self.moment_depth.is_some()
    }
}
