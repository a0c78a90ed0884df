//! Error Types
//!
//! The main error type [`LumenError`] covers all failure modes of the
//! lighting pipeline:
//! - Configuration errors, rejected at init / config-change time
//! - Pipeline state errors (rendering before targets exist)
//! - Device failures, which are fatal since rendering cannot proceed
//!
//! Resource staleness (a buffer whose size no longer matches the current
//! resolution or cascade count) is *not* an error: it is recovered by lazy
//! reallocation at the start of the next use and never surfaces to callers.

use thiserror::Error;

/// The main error type for the lumen pipeline.
#[derive(Error, Debug)]
pub enum LumenError {
    // ========================================================================
    // Configuration Errors (fatal at init / config change, never per frame)
    // ========================================================================
    /// Cascade count outside the supported range.
    #[error("invalid cascade count {count}: must be between 1 and {max}")]
    InvalidCascadeCount {
        /// The rejected count.
        count: u32,
        /// Maximum supported cascades.
        max: u32,
    },

    /// Shadow map size is zero or not a power of two.
    #[error("invalid shadow map size {0}: must be a non-zero power of two")]
    InvalidShadowMapSize(u32),

    /// Blur kernel must be odd so the filter has a center texel.
    #[error("invalid blur kernel size {0}: must be odd and at most 15")]
    InvalidBlurKernel(u32),

    /// Cascade split lambda outside `[0, 1]`.
    #[error("invalid cascade split lambda {0}: must be within [0, 1]")]
    InvalidSplitLambda(f32),

    /// Tile size unusable for screen partitioning.
    #[error("invalid tile size {0}: must be a power of two between 8 and 64")]
    InvalidTileSize(u32),

    /// Per-tile light budget outside the supported range.
    #[error("invalid max lights per tile {0}: must be between 1 and {1}")]
    InvalidMaxLightsPerTile(u32, u32),

    /// Global light budget is zero.
    #[error("invalid max light count: must be non-zero")]
    InvalidMaxLights,

    // ========================================================================
    // Pipeline State Errors
    // ========================================================================
    /// A zero-sized surface was requested.
    #[error("invalid surface extent {width}x{height}")]
    InvalidExtent {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// `render_scene` was called before the first `resize`.
    #[error("render targets not initialized: call resize() before render_scene()")]
    TargetsNotInitialized,

    // ========================================================================
    // Device / API Failures (fatal)
    // ========================================================================
    /// GPU device error.
    #[error("GPU device error: {0}")]
    Device(String),
}

/// Alias for `Result<T, LumenError>`.
pub type Result<T> = std::result::Result<T, LumenError>;
