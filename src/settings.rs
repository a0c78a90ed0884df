//! Pipeline Settings & Render Path Configuration
//!
//! This module defines the configuration consumed once at [`RenderPath`]
//! construction (and on explicit reconfiguration) to select the pipeline
//! topology and size the per-resolution resources.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lumen::{PipelineSettings, RenderPathKind};
//!
//! // Default: tiled deferred with 16x16 tiles
//! let settings = PipelineSettings::default();
//!
//! // Forward+ with bigger tiles for a low-end target
//! let settings = PipelineSettings {
//!     path: RenderPathKind::ForwardPlus,
//!     tile_size: 32,
//!     ..Default::default()
//! };
//! settings.validate()?;
//! ```
//!
//! [`RenderPath`]: crate::RenderPath

use crate::error::{LumenError, Result};

/// Maximum lights a single tile may reference. Hard cap imposed by the
/// culling shader's workgroup-shared staging list.
pub const MAX_LIGHTS_PER_TILE_LIMIT: u32 = 256;

// ---------------------------------------------------------------------------
// RenderPathKind
// ---------------------------------------------------------------------------

/// Selects the pipeline topology: which optional stages run and in what
/// fixed order.
///
/// # Path Comparison
///
/// | Stage            | `Forward` | `Deferred` | `TiledDeferred` | `ForwardPlus` |
/// |------------------|-----------|------------|-----------------|---------------|
/// | Shadow           | ✅        | ✅         | ✅              | ✅            |
/// | G-Buffer         | ❌        | ✅         | ✅              | ✅ (depth)    |
/// | Tile Light Cull  | ❌        | ❌         | ✅              | ✅            |
/// | Light Accumulate | ✅        | ✅         | ✅              | ✅            |
/// | Composite        | ✅        | ✅         | ✅              | ✅            |
/// | Tone Map         | ✅        | ✅         | ✅              | ✅            |
///
/// Every variant is a fixed, statically known stage sequence; no per-pass
/// runtime branching decides what runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPathKind {
    /// Single-pass forward shading. Every visible light is evaluated for
    /// every fragment. Cheapest setup, scales poorly with light count.
    Forward,
    /// Classic deferred: G-buffer, then one fullscreen directional pass plus
    /// one proxy-volume draw per local light.
    Deferred,
    /// Deferred shading with a compute-based tile light cull feeding the
    /// accumulation pass. Best for hundreds of point lights.
    #[default]
    TiledDeferred,
    /// Forward shading with the same tile cull (a depth-only G-buffer
    /// provides the tile depth ranges). Keeps MSAA/transparency options open.
    ForwardPlus,
}

/// One stage of a frame. The active [`RenderPathKind`] maps to a fixed
/// sequence of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Shadow,
    GBuffer,
    LightCull,
    LightAccumulate,
    Composite,
    ToneMap,
}

impl RenderPathKind {
    /// The stage sequence for this path. Order is a hard contract: shadow
    /// writes land before accumulation reads them, and the tile cull dispatch
    /// lands before the accumulation pass reads the tile buffers.
    #[must_use]
    pub fn stages(self) -> &'static [Stage] {
        match self {
            Self::Forward => &[
                Stage::Shadow,
                Stage::LightAccumulate,
                Stage::Composite,
                Stage::ToneMap,
            ],
            Self::Deferred => &[
                Stage::Shadow,
                Stage::GBuffer,
                Stage::LightAccumulate,
                Stage::Composite,
                Stage::ToneMap,
            ],
            Self::TiledDeferred | Self::ForwardPlus => &[
                Stage::Shadow,
                Stage::GBuffer,
                Stage::LightCull,
                Stage::LightAccumulate,
                Stage::Composite,
                Stage::ToneMap,
            ],
        }
    }

    /// Whether this path renders the full G-buffer (albedo/normal/material).
    /// Forward+ runs the G-buffer stage too, but depth-only: the tile culler
    /// needs the depth buffer while shading stays in the accumulation pass,
    /// so its composite must not multiply by albedo a second time.
    #[must_use]
    pub fn uses_gbuffer(self) -> bool {
        matches!(self, Self::Deferred | Self::TiledDeferred)
    }

    /// Whether this path runs the tile light cull dispatch.
    #[must_use]
    pub fn uses_tile_culling(self) -> bool {
        matches!(self, Self::TiledDeferred | Self::ForwardPlus)
    }
}

// ---------------------------------------------------------------------------
// PipelineSettings
// ---------------------------------------------------------------------------

/// Global configuration for pipeline initialization.
///
/// Consumed once by [`RenderPath::new`] and again on explicit
/// reconfiguration. All fields are validated up front; a frame never sees an
/// invalid configuration.
///
/// # Fields
///
/// | Field                 | Description                                | Default        |
/// |-----------------------|--------------------------------------------|----------------|
/// | `path`                | Pipeline topology                          | `TiledDeferred`|
/// | `tile_size`           | Cull tile edge in pixels (pow2, 8..=64)    | `16`           |
/// | `max_lights`          | Global per-frame light budget              | `1024`         |
/// | `max_lights_per_tile` | Per-tile index budget (<= 256)             | `64`           |
/// | `output_format`       | Format of the presented target             | `Bgra8UnormSrgb` |
/// | `depth_format`        | Depth attachment format                    | `Depth32Float` |
/// | `exposure`            | Tone-map exposure multiplier               | `1.0`          |
///
/// [`RenderPath::new`]: crate::RenderPath::new
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// The pipeline topology. See [`RenderPathKind`] for the stage tables.
    pub path: RenderPathKind,

    /// Edge length of one culling tile in screen pixels. Must be a power of
    /// two between 8 and 64. The screen is covered by
    /// `ceil(w/tile) x ceil(h/tile)` tiles; partial edge tiles are valid.
    pub tile_size: u32,

    /// Maximum point/spot lights packed into the GPU light buffer per frame.
    /// Excess lights are dropped with a warning, never reallocated mid-frame.
    pub max_lights: u32,

    /// Maximum light indices one tile may hold. Overflowing lights are
    /// dropped for that tile only.
    pub max_lights_per_tile: u32,

    /// Format of the final tone-mapped target handed back to the caller.
    pub output_format: wgpu::TextureFormat,

    /// Depth attachment format for the G-buffer and forward passes.
    pub depth_format: wgpu::TextureFormat,

    /// Exposure multiplier applied before the tone-map curve.
    pub exposure: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            path: RenderPathKind::default(),
            tile_size: 16,
            max_lights: 1024,
            max_lights_per_tile: 64,
            output_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            depth_format: wgpu::TextureFormat::Depth32Float,
            exposure: 1.0,
        }
    }
}

impl PipelineSettings {
    /// Rejects configurations the pipeline cannot honor. Called at init and
    /// on reconfiguration; frames never re-validate.
    pub fn validate(&self) -> Result<()> {
        if !self.tile_size.is_power_of_two() || !(8..=64).contains(&self.tile_size) {
            return Err(LumenError::InvalidTileSize(self.tile_size));
        }
        if self.max_lights == 0 {
            return Err(LumenError::InvalidMaxLights);
        }
        if self.max_lights_per_tile == 0 || self.max_lights_per_tile > MAX_LIGHTS_PER_TILE_LIMIT {
            return Err(LumenError::InvalidMaxLightsPerTile(
                self.max_lights_per_tile,
                MAX_LIGHTS_PER_TILE_LIMIT,
            ));
        }
        Ok(())
    }
}
