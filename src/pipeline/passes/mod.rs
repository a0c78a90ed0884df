//! Shading Passes
//!
//! The screen-facing half of the pipeline: G-buffer rasterization, light
//! accumulation, compositing, and tone mapping.

pub mod composite;
pub mod gbuffer;
pub mod light_accum;
pub mod proxy;
pub mod tone_map;

pub use composite::ShadingCompositePass;
pub use gbuffer::GBufferPass;
pub use light_accum::LightAccumulationPass;
pub use tone_map::ToneMapPass;
